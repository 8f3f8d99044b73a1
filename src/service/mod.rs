//! The privileged side: everything that runs inside the root process.

pub mod cache;
pub mod handshake;
pub mod serve;

pub use cache::{CacheOutcome, PhenotypeCache};
pub use handshake::{READY_PREFIX, ServiceBootstrap};
pub use serve::run;
