//! Shared test fixtures
//!
//! In-memory collaborators and a ready-made validator over a two-token
//! snapshot (USDC and LRC), used by the validator and JSON-RPC tests.

use crate::{
    AccountRecord, LookupError, RecipientStatus, RecipientUpdate, ResolutionError, SenderAccount,
    SignedTransfer, SigningError, SubmissionError, SubmissionReceipt, TokenBalance, TokenInfo,
    TransferPhase, TransferRequest,
    collaborators::{
        AccountLookup, Collaborators, HistoryRefresher, NameResolver, TransferSigner,
        TransferSubmitter,
    },
    config::{ExchangeConfig, ValidatorConfig},
    state::SnapshotStore,
    validation::{TransferValidator, amount::parse_units_lossy},
};
use async_trait::async_trait;
use ethers::types::{Address, Signature, U256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, sleep};

pub(crate) const SENDER_ID: u64 = 10_001;
pub(crate) const RECIPIENT_ID: u64 = 20_002;
pub(crate) const OTHER_ID: u64 = 30_003;

pub(crate) fn units(raw: &str, decimals: u8) -> U256 {
    parse_units_lossy(raw, decimals).unwrap()
}

pub(crate) fn sender_address() -> Address {
    Address::from_low_u64_be(1)
}

pub(crate) fn recipient_address() -> Address {
    Address::from_low_u64_be(2)
}

pub(crate) fn other_address() -> Address {
    Address::from_low_u64_be(3)
}

pub(crate) fn hex(address: Address) -> String {
    format!("{:?}", address)
}

pub(crate) fn sender() -> SenderAccount {
    SenderAccount {
        address: sender_address(),
        account_id: SENDER_ID,
        api_key: "test-key".to_string(),
    }
}

pub(crate) fn usdc() -> TokenInfo {
    TokenInfo {
        token_id: 6,
        symbol: "USDC".to_string(),
        decimals: 6,
    }
}

pub(crate) fn lrc() -> TokenInfo {
    TokenInfo {
        token_id: 1,
        symbol: "LRC".to_string(),
        decimals: 18,
    }
}

/// Account registry with optional per-address latency
#[derive(Default)]
pub(crate) struct MockAccounts {
    pub(crate) records: Mutex<HashMap<Address, AccountRecord>>,
    pub(crate) delays: Mutex<HashMap<Address, Duration>>,
    pub(crate) lookups: AtomicUsize,
    pub(crate) offline: AtomicBool,
}

impl MockAccounts {
    pub(crate) fn register(&self, address: Address, account_id: u64, nonce: u64) {
        self.records
            .lock()
            .insert(address, AccountRecord { account_id, nonce });
    }

    pub(crate) fn set_nonce(&self, address: Address, nonce: u64) {
        if let Some(record) = self.records.lock().get_mut(&address) {
            record.nonce = nonce;
        }
    }

    pub(crate) fn bump_nonce(&self, address: Address) {
        if let Some(record) = self.records.lock().get_mut(&address) {
            record.nonce += 1;
        }
    }

    pub(crate) fn delay(&self, address: Address, delay: Duration) {
        self.delays.lock().insert(address, delay);
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountLookup for MockAccounts {
    async fn resolve_account(&self, address: Address) -> Result<AccountRecord, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().get(&address).copied();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LookupError::Transport("offline".to_string()));
        }
        self.records
            .lock()
            .get(&address)
            .copied()
            .ok_or(LookupError::NotFound(address))
    }
}

#[derive(Default)]
pub(crate) struct MockNames {
    pub(crate) names: Mutex<HashMap<String, Address>>,
    pub(crate) calls: Mutex<Vec<String>>,
}

impl MockNames {
    pub(crate) fn insert(&self, name: &str, address: Address) {
        self.names.lock().insert(name.to_string(), address);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl NameResolver for MockNames {
    async fn resolve_name(&self, name: &str) -> Result<Address, ResolutionError> {
        self.calls.lock().push(name.to_string());
        self.names
            .lock()
            .get(name)
            .copied()
            .ok_or_else(|| ResolutionError {
                name: name.to_string(),
                message: "no resolver".to_string(),
            })
    }
}

#[derive(Default)]
pub(crate) struct MockSigner {
    pub(crate) fail: AtomicBool,
}

#[async_trait]
impl TransferSigner for MockSigner {
    async fn sign(&self, request: &TransferRequest) -> Result<SignedTransfer, SigningError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SigningError("wallet locked".to_string()));
        }
        Ok(SignedTransfer {
            request: request.clone(),
            hash: request.hash(),
            signature: Signature {
                r: U256::one(),
                s: U256::one(),
                v: 27,
            },
        })
    }
}

/// Relayer stand-in; consumes the sender nonce on success
pub(crate) struct MockSubmitter {
    pub(crate) accounts: Arc<MockAccounts>,
    pub(crate) fail: AtomicBool,
    pub(crate) latency: Mutex<Option<Duration>>,
    pub(crate) submitted: Mutex<Vec<SignedTransfer>>,
}

impl MockSubmitter {
    pub(crate) fn new(accounts: Arc<MockAccounts>) -> Self {
        Self {
            accounts,
            fail: AtomicBool::new(false),
            latency: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TransferSubmitter for MockSubmitter {
    async fn submit(
        &self,
        signed: &SignedTransfer,
        api_key: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        assert_eq!(api_key, "test-key");
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            sleep(latency).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SubmissionError::Rejected {
                code: 102_024,
                message: "invalid nonce".to_string(),
            });
        }
        self.submitted.lock().push(signed.clone());
        self.accounts.bump_nonce(signed.request.sender);
        Ok(SubmissionReceipt {
            hash: format!("{:?}", signed.hash),
            status: "processing".to_string(),
            timestamp: 0,
        })
    }
}

#[derive(Default)]
pub(crate) struct MockHistory {
    pub(crate) refreshes: AtomicUsize,
}

#[async_trait]
impl HistoryRefresher for MockHistory {
    async fn refresh(&self, sender: &SenderAccount) {
        assert_eq!(sender.account_id, SENDER_ID);
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct Harness {
    pub(crate) validator: TransferValidator,
    pub(crate) store: SnapshotStore,
    pub(crate) accounts: Arc<MockAccounts>,
    pub(crate) names: Arc<MockNames>,
    pub(crate) signer: Arc<MockSigner>,
    pub(crate) submitter: Arc<MockSubmitter>,
    pub(crate) history: Arc<MockHistory>,
}

/// USDC: balance 100, fee 1, 6 decimals. LRC: balance 10, fee 3, 18 decimals.
pub(crate) async fn harness() -> Harness {
    let store = SnapshotStore::new();
    store.upsert_token(usdc()).await;
    store.upsert_token(lrc()).await;
    store
        .set_balance(
            "USDC",
            TokenBalance {
                total: units("100", 6),
                frozen: U256::zero(),
            },
        )
        .await;
    store.set_fee("USDC", units("1", 6)).await;
    store
        .set_balance(
            "LRC",
            TokenBalance {
                total: units("12", 18),
                frozen: units("2", 18),
            },
        )
        .await;
    store.set_fee("LRC", units("3", 18)).await;

    let accounts = Arc::new(MockAccounts::default());
    accounts.register(sender_address(), SENDER_ID, 5);
    accounts.register(recipient_address(), RECIPIENT_ID, 0);

    let names = Arc::new(MockNames::default());
    names.insert("alice.eth", recipient_address());
    names.insert("me.xyz", sender_address());

    let signer = Arc::new(MockSigner::default());
    let submitter = Arc::new(MockSubmitter::new(accounts.clone()));
    let history = Arc::new(MockHistory::default());

    let collaborators = Collaborators {
        tokens: Arc::new(store.clone()),
        fees: Arc::new(store.clone()),
        balances: Arc::new(store.clone()),
        accounts: accounts.clone(),
        names: names.clone(),
        signer: signer.clone(),
        submitter: submitter.clone(),
        history: Some(history.clone()),
    };

    let validator = TransferValidator::new(
        ValidatorConfig::default(),
        ExchangeConfig {
            exchange_id: 2,
            label: 0,
        },
        collaborators,
    );
    validator.open(sender(), "USDC").await.unwrap();

    Harness {
        validator,
        store,
        accounts,
        names,
        signer,
        submitter,
        history,
    }
}

/// Enter a valid amount and a valid recipient
pub(crate) async fn make_ready(h: &Harness) {
    h.validator.set_amount("10").unwrap();
    let update = h.validator.set_recipient(&hex(recipient_address())).await;
    assert!(matches!(update, RecipientUpdate::Applied(RecipientStatus::Resolved { .. })));
    assert_eq!(h.validator.state().phase(), TransferPhase::Ready);
}
