//! Collaborator Interfaces
//!
//! The transfer validator never performs I/O itself. Everything it needs from
//! the outside world (token metadata, balances, fees, account lookups, name
//! resolution, signing, submission) comes through the traits defined here.
//!
//! # Implementations
//! - `state::SnapshotStore`: `TokenCatalog`, `FeeSchedule`, `BalanceSnapshot`
//! - `relayer::RelayerClient`: `AccountLookup`, `TransferSubmitter`
//! - `l1::EnsResolver`: `NameResolver`
//! - `signing::EcdsaTransferSigner`: `TransferSigner`

use crate::{
    AccountRecord, LookupError, ResolutionError, SenderAccount, SignedTransfer, SigningError,
    SubmissionError, SubmissionReceipt, TokenInfo, TransferRequest,
};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Token metadata lookup by symbol (case-insensitive)
#[async_trait]
pub trait TokenCatalog: Send + Sync {
    async fn token(&self, symbol: &str) -> Option<TokenInfo>;
}

/// Transfer fee per token, in base units
#[async_trait]
pub trait FeeSchedule: Send + Sync {
    async fn fee_for(&self, symbol: &str) -> U256;
}

/// Spendable balance of the sender per token, in base units
#[async_trait]
pub trait BalanceSnapshot: Send + Sync {
    async fn available_for(&self, symbol: &str) -> U256;
}

/// Resolves an address to its layer-2 account
///
/// Fails with `LookupError::NotFound` when the address has no account.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    async fn resolve_account(&self, address: Address) -> Result<AccountRecord, LookupError>;
}

/// Resolves name-service names (e.g. `alice.eth`) to addresses
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_name(&self, name: &str) -> Result<Address, ResolutionError>;
}

/// Produces the opaque signature for a transfer request
#[async_trait]
pub trait TransferSigner: Send + Sync {
    async fn sign(&self, request: &TransferRequest) -> Result<SignedTransfer, SigningError>;
}

/// Hands a signed transfer to the relayer
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    async fn submit(
        &self,
        signed: &SignedTransfer,
        api_key: &str,
    ) -> Result<SubmissionReceipt, SubmissionError>;
}

/// Notified after every submission attempt so transfer history can be reloaded
#[async_trait]
pub trait HistoryRefresher: Send + Sync {
    async fn refresh(&self, sender: &SenderAccount);
}

/// Every collaborator a validator needs, bundled for construction
#[derive(Clone)]
pub struct Collaborators {
    pub tokens: Arc<dyn TokenCatalog>,
    pub fees: Arc<dyn FeeSchedule>,
    pub balances: Arc<dyn BalanceSnapshot>,
    pub accounts: Arc<dyn AccountLookup>,
    pub names: Arc<dyn NameResolver>,
    pub signer: Arc<dyn TransferSigner>,
    pub submitter: Arc<dyn TransferSubmitter>,
    pub history: Option<Arc<dyn HistoryRefresher>>,
}
