//! HTTP inbound adapter exposing the progression REST endpoints.

pub mod error;
pub mod health;
pub mod progression;
pub mod schemas;
pub mod state;
pub mod validation;

pub use error::ApiResult;
