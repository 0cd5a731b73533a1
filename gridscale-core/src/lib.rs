//! Gridscale Core
//!
//! Host-side contract shared by the gridscale provider and its tooling:
//! attribute values, schemas, per-invocation resource data and the
//! `Provider` trait that resource handlers are driven through.

pub mod differ;
pub mod provider;
pub mod resource;
pub mod resource_data;
pub mod schema;
