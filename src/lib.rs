pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod flagsfile;
pub mod server;
pub mod service;
pub mod utils;

pub use client::{GmsRepository, InitializationState, RootConnector, RootDatabase};
pub use error::FlagsError;
