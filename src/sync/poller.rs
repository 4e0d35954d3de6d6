//! Snapshot Poller Module
//!
//! Runs a background loop that periodically refreshes the snapshot store.
//!
//! # Flow
//! 1. Fetch the token list, the sender's balances and the transfer fees
//! 2. Replace the store contents (balances are re-keyed from token id to symbol)
//! 3. Notify the validator so the open dialog revalidates its amount

use crate::{
    TokenBalance, relayer::RelayerClient, state::SnapshotStore, validation::TransferValidator,
};
use std::collections::HashMap;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

/// Periodic balance / fee / token refresher
pub struct SnapshotPoller {
    client: RelayerClient,
    store: SnapshotStore,
    validator: TransferValidator,
    /// Account whose balances and fees are tracked
    account_id: u64,
    interval: Duration,
}

impl SnapshotPoller {
    /// Creates a new poller
    ///
    /// # Arguments
    /// * `client` - Relayer client used for the fetches
    /// * `store` - Snapshot store shared with the validator
    /// * `validator` - Dialog to notify after each refresh
    /// * `account_id` - Sender account id
    /// * `interval_ms` - Delay between refreshes
    pub fn new(
        client: RelayerClient,
        store: SnapshotStore,
        validator: TransferValidator,
        account_id: u64,
        interval_ms: u64,
    ) -> Self {
        Self {
            client,
            store,
            validator,
            account_id,
            interval: Duration::from_millis(interval_ms),
        }
    }

    /// Refresh once, then keep refreshing every `interval`
    ///
    /// Failures are logged and retried on the next tick; this never returns.
    pub async fn start(self) -> anyhow::Result<()> {
        info!(
            "Snapshot poller starting for account {} (every {}ms)",
            self.account_id,
            self.interval.as_millis()
        );

        loop {
            match self.refresh().await {
                Ok(()) => self.validator.on_external_snapshot_changed().await,
                Err(e) => warn!("Snapshot refresh failed: {:?}", e),
            }
            sleep(self.interval).await;
        }
    }

    /// Fetch everything and replace the store contents
    pub async fn refresh(&self) -> anyhow::Result<()> {
        let tokens = self.client.get_tokens().await?;
        let balances = self.client.get_balances(self.account_id).await?;
        let fees = self.client.get_transfer_fees(self.account_id).await?;

        let token_count = tokens.len();
        self.store.replace_tokens(tokens).await;

        // Balances arrive keyed by token id; the store is keyed by symbol
        let mut by_symbol: HashMap<String, TokenBalance> = HashMap::new();
        for (token_id, balance) in balances {
            match self.store.token_by_id(token_id).await {
                Some(token) => {
                    by_symbol.insert(token.symbol, balance);
                }
                None => debug!("Skipping balance for unlisted token {}", token_id),
            }
        }

        debug!(
            "Snapshot: {} tokens, {} balances, {} fees",
            token_count,
            by_symbol.len(),
            fees.len()
        );

        self.store.replace_balances(by_symbol).await;
        self.store.replace_fees(fees).await;
        Ok(())
    }
}
