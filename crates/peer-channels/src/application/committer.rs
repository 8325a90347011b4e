//! Ledger committer.
//!
//! Appends validated blocks to the channel ledger. A config block is checked
//! against the live configuration first and never reaches the ledger if it
//! cannot be applied; once written, its configuration goes live.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use shared_types::Block;
use tracing::{error, info};

use crate::application::channel::ChannelState;
use crate::domain::{ChannelError, ChannelResult};
use crate::ports::inbound::Committer;
use crate::ports::outbound::PeerLedger;

pub struct LedgerCommitter {
    channel_id: String,
    ledger: Arc<dyn PeerLedger>,
    channel: Weak<ChannelState>,
}

impl LedgerCommitter {
    pub fn new(channel_id: &str, ledger: Arc<dyn PeerLedger>, channel: Weak<ChannelState>) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ledger,
            channel,
        }
    }

    fn ledger_error(&self, source: crate::domain::LedgerError) -> ChannelError {
        ChannelError::Ledger {
            channel: self.channel_id.clone(),
            source,
        }
    }
}

#[async_trait]
impl Committer for LedgerCommitter {
    async fn commit(&self, block: Block) -> ChannelResult<()> {
        let number = block.number();
        let accepted = if block.is_config_block() {
            let channel = self
                .channel
                .upgrade()
                .ok_or_else(|| ChannelError::UnknownChannel(self.channel_id.clone()))?;
            match channel.check_config_update(&block.data.envelopes[0]) {
                Ok(next) => Some((channel, next)),
                Err(e) => {
                    error!(
                        channel = %self.channel_id,
                        block = number,
                        "Config block rejected before commit: {}",
                        e
                    );
                    return Err(e);
                }
            }
        } else {
            None
        };

        self.ledger
            .commit(block)
            .await
            .map_err(|e| self.ledger_error(e))?;

        if let Some((channel, next)) = accepted {
            channel.install(next);
            info!("[{}] config block {} committed and applied", self.channel_id, number);
        }
        Ok(())
    }

    async fn ledger_height(&self) -> ChannelResult<u64> {
        self.ledger
            .blockchain_info()
            .await
            .map(|info| info.height)
            .map_err(|e| self.ledger_error(e))
    }

    async fn get_blocks(&self, numbers: &[u64]) -> ChannelResult<Vec<Block>> {
        let height = self.ledger_height().await?;
        let mut blocks = Vec::with_capacity(numbers.len());
        for &number in numbers.iter().filter(|&&n| n < height) {
            blocks.push(
                self.ledger
                    .block_by_number(number)
                    .await
                    .map_err(|e| self.ledger_error(e))?,
            );
        }
        Ok(blocks)
    }
}
