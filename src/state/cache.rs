use crate::{
    TokenBalance, TokenInfo,
    collaborators::{BalanceSnapshot, FeeSchedule, TokenCatalog},
};
use async_trait::async_trait;
use ethers::types::U256;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read-mostly snapshot of token metadata, balances and transfer fees
///
/// Keys are upper-cased symbols, so lookups are case-insensitive. Cloning the
/// store clones the handle, not the data.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    tokens: Arc<RwLock<HashMap<String, TokenInfo>>>,
    balances: Arc<RwLock<HashMap<String, TokenBalance>>>,
    fees: Arc<RwLock<HashMap<String, U256>>>,
}

fn key(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_token(&self, token: TokenInfo) {
        let mut tokens = self.tokens.write().await;
        tokens.insert(key(&token.symbol), token);
    }

    pub async fn set_balance(&self, symbol: &str, balance: TokenBalance) {
        let mut balances = self.balances.write().await;
        balances.insert(key(symbol), balance);
    }

    pub async fn set_fee(&self, symbol: &str, fee: U256) {
        let mut fees = self.fees.write().await;
        fees.insert(key(symbol), fee);
    }

    pub async fn replace_tokens(&self, tokens: Vec<TokenInfo>) {
        let mut current = self.tokens.write().await;
        *current = tokens.into_iter().map(|t| (key(&t.symbol), t)).collect();
    }

    pub async fn replace_balances(&self, balances: HashMap<String, TokenBalance>) {
        let mut current = self.balances.write().await;
        *current = balances.into_iter().map(|(s, b)| (key(&s), b)).collect();
    }

    pub async fn replace_fees(&self, fees: HashMap<String, U256>) {
        let mut current = self.fees.write().await;
        *current = fees.into_iter().map(|(s, f)| (key(&s), f)).collect();
    }

    /// Find a token by its exchange id
    pub async fn token_by_id(&self, token_id: u32) -> Option<TokenInfo> {
        let tokens = self.tokens.read().await;
        tokens.values().find(|t| t.token_id == token_id).cloned()
    }

    pub async fn balance(&self, symbol: &str) -> Option<TokenBalance> {
        let balances = self.balances.read().await;
        balances.get(&key(symbol)).copied()
    }
}

#[async_trait]
impl TokenCatalog for SnapshotStore {
    async fn token(&self, symbol: &str) -> Option<TokenInfo> {
        let tokens = self.tokens.read().await;
        tokens.get(&key(symbol)).cloned()
    }
}

#[async_trait]
impl FeeSchedule for SnapshotStore {
    /// Tokens without a published fee transfer for free
    async fn fee_for(&self, symbol: &str) -> U256 {
        let fees = self.fees.read().await;
        fees.get(&key(symbol)).copied().unwrap_or_default()
    }
}

#[async_trait]
impl BalanceSnapshot for SnapshotStore {
    async fn available_for(&self, symbol: &str) -> U256 {
        self.balance(symbol)
            .await
            .map(|b| b.available())
            .unwrap_or_default()
    }
}
