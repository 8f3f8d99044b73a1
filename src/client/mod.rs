//! The unprivileged side: launching the root service and talking to it.

pub mod connector;
pub mod remote;
pub mod repository;

pub use connector::{InitializationState, RootConnector};
pub use remote::RootDatabase;
pub use repository::{GmsRepository, OverrideReportExt};
