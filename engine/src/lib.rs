//! Achievement and progression engine.
//!
//! Grants XP, resolves levels, awards badges, tracks recurring tasks and
//! fans committed achievements out to real-time, audit and chained-effect
//! subscribers. The [`domain`] owns the rules; [`outbound`] adapters store
//! state in PostgreSQL or memory; [`inbound`] adapters expose HTTP and the
//! reset scheduler. [`wiring`] assembles the graph for the binaries.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod outbound;
pub mod seed;
pub mod settings;
pub mod wiring;

#[cfg(test)]
mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
