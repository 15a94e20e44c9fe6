//! The `services` module is the only way the rest of the crate touches the catalog
//! tables. Public functions from the sub-modules are re-exported here so callers use
//! `crate::db::services::*`.

pub mod link_service;
pub mod tag_service;

pub use link_service::*;
pub use tag_service::*;
