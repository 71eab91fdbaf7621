//! JSON-lines panel channel over stdout.
//!
//! The CLI host's presentation surface: one serialized [`PanelReply`]
//! per line, flushed per message so an interactive caller sees partials
//! as they arrive.

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;
use tracing::debug;

use super::events::PanelReply;
use super::{ChannelClosed, PanelChannel};

pub struct StdioPanel {
    stdout: Mutex<Stdout>,
}

impl StdioPanel {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for StdioPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PanelChannel for StdioPanel {
    async fn post(&self, reply: PanelReply) -> Result<(), ChannelClosed> {
        let mut line = serde_json::to_string(&reply).map_err(|_| ChannelClosed)?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            debug!("stdout closed, treating panel as disposed");
            return Err(ChannelClosed);
        }
        Ok(())
    }
}
