//! Panel relay channel.
//!
//! The opaque boundary to the presentation surface. The dispatcher only
//! sees the [`PanelChannel`] trait; the `stdio` module provides the
//! JSON-lines implementation used by the CLI host, and tests substitute
//! capturing or disposed doubles.

pub mod events;
pub mod stdio;

use async_trait::async_trait;
use thiserror::Error;

use events::PanelReply;

/// Returned by a channel whose surface has been disposed.
///
/// Callers treat this as "the user closed the panel": the outcome is
/// dropped silently, never escalated as a failure.
#[derive(Debug, Error)]
#[error("panel channel closed")]
pub struct ChannelClosed;

/// Outbound half of the panel message channel.
#[async_trait]
pub trait PanelChannel: Send + Sync {
    async fn post(&self, reply: PanelReply) -> Result<(), ChannelClosed>;
}
