use ethers::types::{Address, H256, Signature, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token metadata as published by the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token_id: u32,
    pub symbol: String,
    pub decimals: u8,
}

/// Balance of one token held by the sender, in base units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub total: U256,
    pub frozen: U256,
}

impl TokenBalance {
    /// Spendable part of the balance (`total - frozen`, floored at zero)
    pub fn available(&self) -> U256 {
        self.total.saturating_sub(self.frozen)
    }
}

/// The layer-2 account that sends the transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderAccount {
    pub address: Address,
    pub account_id: u64,
    #[serde(skip_serializing)]
    pub api_key: String,
}

/// Account record returned by an account lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account_id: u64,
    pub nonce: u64,
}

/// Transfer request handed to the signer and then to the relayer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub exchange_id: u32,
    pub sender: Address,
    pub sender_account_id: u64,
    pub receiver: Address,
    pub receiver_account_id: u64,
    pub token: TokenInfo,
    pub amount: U256,
    pub fee_token: TokenInfo,
    pub fee_amount: U256,
    pub nonce: u64,
    pub memo: String,
    pub label: u32,
}

impl TransferRequest {
    /// Compute the hash of the request for signing
    pub fn hash(&self) -> H256 {
        // Note: the relayer verifies this ECDSA digest alongside its own layer-2 signature
        let mut data = Vec::new();
        data.extend_from_slice(&self.exchange_id.to_be_bytes());
        data.extend_from_slice(self.sender.as_bytes());
        data.extend_from_slice(&self.sender_account_id.to_be_bytes());
        data.extend_from_slice(self.receiver.as_bytes());
        data.extend_from_slice(&self.receiver_account_id.to_be_bytes());
        data.extend_from_slice(&self.token.token_id.to_be_bytes());

        let mut amount_bytes = [0u8; 32];
        self.amount.to_big_endian(&mut amount_bytes);
        data.extend_from_slice(&amount_bytes);

        data.extend_from_slice(&self.fee_token.token_id.to_be_bytes());

        let mut fee_bytes = [0u8; 32];
        self.fee_amount.to_big_endian(&mut fee_bytes);
        data.extend_from_slice(&fee_bytes);

        data.extend_from_slice(&self.nonce.to_be_bytes());
        data.extend_from_slice(&self.label.to_be_bytes());
        data.extend_from_slice(&keccak256(self.memo.as_bytes()));

        H256::from_slice(&keccak256(data))
    }
}

/// A transfer request together with its opaque signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub request: TransferRequest,
    pub hash: H256,
    pub signature: Signature,
}

/// Relayer acknowledgement of a submitted transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub hash: String,
    pub status: String,
    pub timestamp: u64,
}

/// Why an entered amount is not acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum AmountError {
    #[error("amount must be a positive number")]
    NotPositive,
    #[error("insufficient balance: required {required}, available {available}")]
    ExceedsBalance { required: U256, available: U256 },
    #[error("maximum input decimal places is {max_decimals}")]
    TooManyDecimals { max_decimals: u8 },
}

/// Why a recipient is not acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressError {
    #[error("invalid recipient address")]
    InvalidFormat,
    #[error("the recipient doesn't have a layer-2 account")]
    NotRegistered,
    #[error("sender and receiver are the same")]
    SameAsSender,
}

/// Resolution state of the recipient field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RecipientStatus {
    /// Nothing has been resolved yet
    #[default]
    Empty,
    /// Input changed, resolution has not completed
    Pending,
    Resolved {
        address: Address,
        account_id: u64,
    },
    Rejected {
        address: Option<Address>,
        account_id: Option<u64>,
        error: AddressError,
    },
}

/// Phase of a transfer dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferPhase {
    Idle,
    NotReady,
    Ready,
    Submitting,
}

/// Why `submit` refused to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum SubmitRejection {
    #[error("transfer is not ready (amount valid: {amount_valid}, address valid: {address_valid})")]
    NotReady {
        amount_valid: bool,
        address_valid: bool,
    },
    #[error("a submission is already in flight")]
    AlreadySubmitting,
}

/// Result of a `submit` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Accepted {
        request: TransferRequest,
        receipt: SubmissionReceipt,
    },
    Rejected(SubmitRejection),
    Failed(TransferError),
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionOutcome::Accepted { .. })
    }
}

/// Result of a `set_recipient` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientUpdate {
    /// The resolution ran against the current input and was written to state
    Applied(RecipientStatus),
    /// A newer input (or a reset) made this call obsolete
    Superseded,
    /// No dialog is open; the input was ignored
    Closed,
}

/// Errors surfaced by validator operations and submissions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error("no transfer dialog is open")]
    NotOpen,
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("unknown token: {0}")]
    UnknownToken(String),
    #[error("could not fetch sender nonce: {0}")]
    NonceUnavailable(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("submission failed: {0}")]
    Submission(String),
}

/// Account lookup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("account not found for {0:?}")]
    NotFound(Address),
    #[error("account lookup failed: {0}")]
    Transport(String),
}

/// Name-service resolution failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not resolve {name}: {message}")]
pub struct ResolutionError {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("signer error: {0}")]
pub struct SigningError(pub String);

/// Relayer rejected or failed to accept a transfer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("relayer rejected transfer ({code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("relayer request failed: {0}")]
    Transport(String),
}
