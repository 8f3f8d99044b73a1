//! Types shared by the privileged flag service and its unprivileged callers.
//!
//! Everything here crosses the process boundary as JSON, so the serde shape of
//! these types is the wire contract between `gmsflags serve` and the client.

pub mod file;
pub mod flag;
pub mod rpc;

pub use file::{LoadedFlags, OverriddenFlags};
pub use flag::{FlagType, FlagValue, ParseFlagError};
pub use rpc::{
    AndroidPackageResponse, ApiErrorBody, ApiErrorObject, ClearCacheReport, DeleteReport,
    FlagQuery, FlagsResponse, HealthResponse, OverrideReport, OverrideRequest, UserOverrideResult,
    UsersResponse,
};
