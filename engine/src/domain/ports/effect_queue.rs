//! Ports for deferred side effects.
//!
//! [`EffectQueue`] accepts work from the fan-out; [`EffectHandler`] is the
//! domain entry point a queue worker calls to execute it.

use async_trait::async_trait;

use crate::domain::{DeferredEffect, Error};

use super::define_port_error;

define_port_error! {
    /// Errors raised while handing work to the queue.
    pub enum EffectQueueError {
        /// The worker side of the queue has shut down.
        Closed => "effect queue is closed",
    }
}

/// Queue accepting deferred work for eventual, at-least-once execution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EffectQueue: Send + Sync {
    /// Schedule `effect`; waits for room when the queue is at capacity.
    async fn enqueue(&self, effect: DeferredEffect) -> Result<(), EffectQueueError>;
}

/// Executes one deferred effect.
///
/// Client-category errors (see [`crate::domain::ErrorCode::is_client_error`])
/// are permanent; workers retry everything else.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EffectHandler: Send + Sync {
    /// Run the effect to completion.
    async fn apply(&self, effect: &DeferredEffect) -> Result<(), Error>;
}
