pub mod flags;
pub mod maintenance;
pub mod overrides;
