//! Database module: the privileged side's exclusive handle on `phenotype.db`.
//!
//! Layout:
//! - `actor.rs`: the actor owning the pool; every statement runs through it
//! - `models.rs`: mapping between typed flag values and the value columns
//! - `schema.rs`: DDL for scratch databases (the device file is never migrated)

pub mod actor;
pub mod models;
pub mod schema;

pub use actor::{DbActorHandle, FlagLookup, spawn};
pub use schema::PHENOTYPE_INIT;
