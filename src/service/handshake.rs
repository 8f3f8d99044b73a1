//! Start-up protocol between the connector and a freshly launched service.
//!
//! The connector writes one JSON [`ServiceBootstrap`] line to the service's
//! stdin; the service answers with a single `READY <addr>` line on stdout once
//! it is listening. Keeping stdin open afterwards is what keeps the service
//! alive: EOF on stdin shuts it down.

use crate::config::{CacheConfig, Config, DatabaseConfig};
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

pub const READY_PREFIX: &str = "READY ";

#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceBootstrap {
    /// Bearer token every request must present.
    pub token: String,
    pub listen_addr: IpAddr,
    pub loglevel: String,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
}

impl ServiceBootstrap {
    pub fn from_config(cfg: &Config, token: String) -> Self {
        Self {
            token,
            listen_addr: cfg.basic.listen_addr,
            loglevel: cfg.basic.loglevel.clone(),
            database: cfg.database.clone(),
            cache: cfg.cache.clone(),
        }
    }
}

/// 256 bits => 43 chars base64url (no padding).
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

pub fn ready_line(addr: SocketAddr) -> String {
    format!("{READY_PREFIX}{addr}\n")
}

pub fn parse_ready_line(line: &str) -> Option<SocketAddr> {
    line.trim_end()
        .strip_prefix(READY_PREFIX)
        .and_then(|addr| addr.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_line_parses_back() {
        let addr: SocketAddr = "127.0.0.1:41234".parse().unwrap();
        assert_eq!(parse_ready_line(&ready_line(addr)), Some(addr));
    }

    #[test]
    fn su_banners_are_not_ready_lines() {
        assert_eq!(parse_ready_line("Permission denied"), None);
        assert_eq!(parse_ready_line("READY not-an-address"), None);
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
