use super::{address, amount};
use crate::{
    AddressError, AmountError, RecipientStatus, RecipientUpdate, SenderAccount, SubmissionOutcome,
    SubmissionReceipt, SubmitRejection, TokenInfo, TransferError, TransferPhase, TransferRequest,
    collaborators::Collaborators,
    config::{ExchangeConfig, ValidatorConfig},
};
use ethers::types::{Address, U256};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{debug, info, warn};

/// State of one transfer dialog
///
/// Validity is never stored: `amount_valid`, `address_valid` and `phase` are
/// derived from the raw inputs and the latest snapshot values on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferRequestState {
    pub sender: Option<SenderAccount>,
    pub token: Option<TokenInfo>,
    pub raw_amount: Option<String>,
    pub fee: U256,
    pub available_balance: U256,
    pub recipient_input: String,
    pub recipient: RecipientStatus,
    /// `None` until fetched
    pub nonce: Option<u64>,
    pub memo: String,
    pub submission_in_flight: bool,
    #[serde(skip)]
    session: u64,
    #[serde(skip)]
    recipient_seq: u64,
}

impl TransferRequestState {
    /// Back to the empty form, invalidating every async completion still pending
    fn reset(&mut self) {
        *self = Self {
            session: self.session + 1,
            recipient_seq: self.recipient_seq + 1,
            ..Self::default()
        };
    }

    fn evaluate_amount(&self, raw: &str) -> Result<U256, AmountError> {
        let decimals = self.token.as_ref().map_or(0, |t| t.decimals);
        amount::check_amount(raw, decimals, self.fee, self.available_balance)
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.session == ticket.session && self.recipient_seq == ticket.seq
    }

    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Result of validating the entered amount, `None` while nothing is entered
    pub fn amount_check(&self) -> Option<Result<U256, AmountError>> {
        self.raw_amount
            .as_deref()
            .map(|raw| self.evaluate_amount(raw))
    }

    pub fn amount_valid(&self) -> bool {
        matches!(self.amount_check(), Some(Ok(_)))
    }

    pub fn amount_error(&self) -> Option<AmountError> {
        self.amount_check().and_then(Result::err)
    }

    pub fn address_valid(&self) -> bool {
        matches!(self.recipient, RecipientStatus::Resolved { .. })
    }

    pub fn address_error(&self) -> Option<AddressError> {
        match self.recipient {
            RecipientStatus::Rejected { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn resolved_address(&self) -> Option<Address> {
        match self.recipient {
            RecipientStatus::Resolved { address, .. } => Some(address),
            RecipientStatus::Rejected { address, .. } => address,
            _ => None,
        }
    }

    pub fn resolved_account_id(&self) -> Option<u64> {
        match self.recipient {
            RecipientStatus::Resolved { account_id, .. } => Some(account_id),
            RecipientStatus::Rejected { account_id, .. } => account_id,
            _ => None,
        }
    }

    pub fn phase(&self) -> TransferPhase {
        if !self.is_open() {
            TransferPhase::Idle
        } else if self.submission_in_flight {
            TransferPhase::Submitting
        } else if self.amount_valid() && self.address_valid() {
            TransferPhase::Ready
        } else {
            TransferPhase::NotReady
        }
    }

    /// Flatten the state and its derived flags for a presentation layer
    pub fn view(&self) -> TransferView {
        let decimals = self.token.as_ref().map_or(0, |t| t.decimals);
        TransferView {
            phase: self.phase(),
            token: self.token.as_ref().map(|t| t.symbol.clone()),
            decimals,
            raw_amount: self.raw_amount.clone(),
            fee: amount::format_base_units(self.fee, decimals),
            available_balance: amount::format_base_units(self.available_balance, decimals),
            amount_valid: self.amount_valid(),
            amount_error: self.amount_error(),
            recipient_input: self.recipient_input.clone(),
            resolved_address: self.resolved_address(),
            resolved_account_id: self.resolved_account_id(),
            address_valid: self.address_valid(),
            address_error: self.address_error(),
            address_pending: self.recipient == RecipientStatus::Pending,
            nonce: self.nonce,
            memo: self.memo.clone(),
            submission_in_flight: self.submission_in_flight,
        }
    }
}

/// Render-ready snapshot of a transfer dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    pub phase: TransferPhase,
    pub token: Option<String>,
    pub decimals: u8,
    pub raw_amount: Option<String>,
    pub fee: String,
    pub available_balance: String,
    pub amount_valid: bool,
    pub amount_error: Option<AmountError>,
    pub recipient_input: String,
    pub resolved_address: Option<Address>,
    pub resolved_account_id: Option<u64>,
    pub address_valid: bool,
    pub address_error: Option<AddressError>,
    pub address_pending: bool,
    pub nonce: Option<u64>,
    pub memo: String,
    pub submission_in_flight: bool,
}

/// Identifies one recipient resolution request
#[derive(Debug, Clone, Copy)]
struct Ticket {
    session: u64,
    seq: u64,
}

/// Everything captured from state when a submission starts
struct SubmissionDraft {
    session: u64,
    sender: SenderAccount,
    token: TokenInfo,
    amount: U256,
    fee: U256,
    receiver: Address,
    receiver_account_id: u64,
    nonce: Option<u64>,
    memo: String,
}

/// Clears the in-flight flag even when the submit future is dropped part-way
struct InFlightGuard<'a> {
    state: &'a Mutex<TransferRequestState>,
    session: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.session == self.session {
            state.submission_in_flight = false;
        }
    }
}

struct Inner {
    config: ValidatorConfig,
    exchange: ExchangeConfig,
    collaborators: Collaborators,
    state: Mutex<TransferRequestState>,
}

/// Transfer request validator
///
/// Owns the lifecycle of one pending transfer: token selection, amount entry,
/// recipient resolution and submission. Cloning yields another handle to the
/// same dialog, so a presentation layer can spawn recipient resolutions while
/// it keeps dispatching edits.
///
/// The state lock is never held across an `.await`; async steps re-check the
/// session (and, for recipients, the request sequence number) before writing.
#[derive(Clone)]
pub struct TransferValidator {
    inner: Arc<Inner>,
}

impl TransferValidator {
    /// Creates a validator for a closed dialog
    ///
    /// # Arguments
    /// * `config` - Debounce window, memo limit and name-service suffixes
    /// * `exchange` - Exchange id and label stamped into every request
    /// * `collaborators` - Data sources, resolvers, signer and submitter
    pub fn new(
        config: ValidatorConfig,
        exchange: ExchangeConfig,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                exchange,
                collaborators,
                state: Mutex::new(TransferRequestState::default()),
            }),
        }
    }

    /// Copy of the current state
    pub fn state(&self) -> TransferRequestState {
        self.inner.state.lock().clone()
    }

    pub fn view(&self) -> TransferView {
        self.inner.state.lock().view()
    }

    /// Open the dialog for `sender` with `token_symbol` selected
    ///
    /// Any previous dialog state is discarded first.
    pub async fn open(
        &self,
        sender: SenderAccount,
        token_symbol: &str,
    ) -> Result<(), TransferError> {
        {
            let mut state = self.inner.state.lock();
            state.reset();
            info!(
                "Transfer dialog opened for account {} with {}",
                sender.account_id, token_symbol
            );
            state.sender = Some(sender);
        }
        self.select_token(token_symbol).await
    }

    /// Close the dialog and return to the empty state
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        if state.is_open() {
            info!("Transfer dialog closed");
        }
        state.reset();
    }

    /// Switch the sending account, resetting the dialog when it actually changes
    pub async fn change_sender(&self, sender: SenderAccount) -> Result<(), TransferError> {
        let token = {
            let mut state = self.inner.state.lock();
            if state.sender.as_ref() == Some(&sender) {
                return Ok(());
            }
            let token = state.token.as_ref().map(|t| t.symbol.clone());
            if token.is_none() {
                state.reset();
                state.sender = Some(sender.clone());
            }
            token
        };

        match token {
            Some(symbol) => self.open(sender, &symbol).await,
            None => Ok(()),
        }
    }

    /// Select the asset to transfer
    ///
    /// Loads token metadata, fee and available balance, clears the entered
    /// amount (fee and precision differ per token) and refreshes the nonce.
    ///
    /// # Returns
    /// * `Err(TransferError::NotOpen)` when no dialog is open, or it was
    ///   closed while the snapshot was being read
    /// * `Err(TransferError::UnknownToken)` when the catalog has no such
    ///   symbol; state is left untouched
    pub async fn select_token(&self, symbol: &str) -> Result<(), TransferError> {
        let (session, sender) = {
            let state = self.inner.state.lock();
            let sender = state.sender.clone().ok_or(TransferError::NotOpen)?;
            (state.session, sender)
        };

        let collaborators = &self.inner.collaborators;
        let token = collaborators
            .tokens
            .token(symbol)
            .await
            .ok_or_else(|| TransferError::UnknownToken(symbol.to_string()))?;
        let fee = collaborators.fees.fee_for(&token.symbol).await;
        let available = collaborators.balances.available_for(&token.symbol).await;

        {
            let mut state = self.inner.state.lock();
            if state.session != session {
                return Err(TransferError::NotOpen);
            }
            debug!(
                "Selected {}: fee {}, available {}",
                token.symbol, fee, available
            );
            state.token = Some(token);
            state.fee = fee;
            state.available_balance = available;
            state.raw_amount = None;
        }

        self.refresh_nonce(session, &sender).await;
        Ok(())
    }

    /// Re-read fee and balance for the selected token after the snapshot changed
    ///
    /// The entered amount is kept; its validity follows the new values.
    pub async fn on_external_snapshot_changed(&self) {
        let (session, symbol) = {
            let state = self.inner.state.lock();
            match (&state.sender, &state.token) {
                (Some(_), Some(token)) => (state.session, token.symbol.clone()),
                _ => return,
            }
        };

        let collaborators = &self.inner.collaborators;
        let token = collaborators.tokens.token(&symbol).await;
        let fee = collaborators.fees.fee_for(&symbol).await;
        let available = collaborators.balances.available_for(&symbol).await;

        let mut state = self.inner.state.lock();
        let same_token = state.token.as_ref().is_some_and(|t| t.symbol == symbol);
        if state.session != session || !same_token {
            return;
        }
        if let Some(token) = token {
            state.token = Some(token);
        }
        state.fee = fee;
        state.available_balance = available;
        debug!(
            "Snapshot refreshed for {}: fee {}, available {}",
            symbol, fee, available
        );
    }

    /// Record the entered amount and validate it
    ///
    /// # Returns
    /// * `Err(TransferError::NotOpen)` without touching state when no dialog is open
    /// * `Err(TransferError::Amount)` when the amount is recorded but invalid
    pub fn set_amount(&self, raw: &str) -> Result<U256, TransferError> {
        let mut state = self.inner.state.lock();
        if !state.is_open() {
            debug!("Amount {:?} ignored: dialog closed", raw);
            return Err(TransferError::NotOpen);
        }
        state.raw_amount = Some(raw.to_string());
        let result = state.evaluate_amount(raw);
        if let Err(e) = &result {
            debug!("Amount {:?} rejected: {}", raw, e);
        }
        Ok(result?)
    }

    /// Fill in the largest amount the balance covers after the fee
    pub fn set_all_available(&self) -> Result<U256, TransferError> {
        let mut state = self.inner.state.lock();
        if !state.is_open() {
            return Err(TransferError::NotOpen);
        }
        let decimals = state.token.as_ref().map_or(0, |t| t.decimals);
        let max = state.available_balance.saturating_sub(state.fee);
        let raw = amount::format_base_units(max, decimals);
        let result = state.evaluate_amount(&raw);
        state.raw_amount = Some(raw);
        Ok(result?)
    }

    /// Update the memo
    ///
    /// Returns `false` (and keeps the old memo) when it is too long or no
    /// dialog is open.
    pub fn set_memo(&self, memo: &str) -> bool {
        if memo.chars().count() > self.inner.config.memo_max_len {
            debug!(
                "Memo of {} characters ignored (limit {})",
                memo.chars().count(),
                self.inner.config.memo_max_len
            );
            return false;
        }
        let mut state = self.inner.state.lock();
        if !state.is_open() {
            return false;
        }
        state.memo = memo.to_string();
        true
    }

    /// Record recipient input and resolve it once typing has settled
    ///
    /// The input is stored immediately and the recipient marked pending. After
    /// the debounce window, only the most recent call goes on to resolve; and
    /// a resolution is written only if no newer input or reset arrived while
    /// it was in flight. Resolution failures end up in state as an
    /// `AddressError`, never as an error for the caller.
    pub async fn set_recipient(&self, raw: &str) -> RecipientUpdate {
        let ticket = {
            let mut state = self.inner.state.lock();
            if !state.is_open() {
                debug!("Recipient input {:?} ignored: dialog closed", raw);
                return RecipientUpdate::Closed;
            }
            state.recipient_seq += 1;
            state.recipient_input = raw.to_string();
            state.recipient = RecipientStatus::Pending;
            Ticket {
                session: state.session,
                seq: state.recipient_seq,
            }
        };

        sleep(Duration::from_millis(self.inner.config.debounce_ms)).await;

        let sender_account_id = {
            let state = self.inner.state.lock();
            if !state.is_current(ticket) {
                debug!("Recipient input {:?} superseded before resolution", raw);
                return RecipientUpdate::Superseded;
            }
            match &state.sender {
                Some(sender) => sender.account_id,
                None => return RecipientUpdate::Closed,
            }
        };

        let status = self.resolve_recipient(raw, sender_account_id).await;

        let mut state = self.inner.state.lock();
        if !state.is_current(ticket) || state.recipient_input != raw {
            debug!("Discarding stale resolution for {:?}", raw);
            return RecipientUpdate::Superseded;
        }
        state.recipient = status.clone();
        RecipientUpdate::Applied(status)
    }

    async fn resolve_recipient(&self, raw: &str, sender_account_id: u64) -> RecipientStatus {
        let collaborators = &self.inner.collaborators;

        let address = if address::is_name_service(raw, &self.inner.config.name_suffixes) {
            match collaborators.names.resolve_name(raw.trim()).await {
                Ok(address) => {
                    debug!("Resolved {} to {:?}", raw.trim(), address);
                    Some(address)
                }
                Err(e) => {
                    // Transient: the recipient stays unresolved, the dialog keeps working
                    warn!("Name resolution failed: {}", e);
                    None
                }
            }
        } else {
            address::parse_address(raw)
        };

        let Some(address) = address else {
            return RecipientStatus::Rejected {
                address: None,
                account_id: None,
                error: AddressError::InvalidFormat,
            };
        };

        match collaborators.accounts.resolve_account(address).await {
            Ok(record) if record.account_id == sender_account_id => {
                RecipientStatus::Rejected {
                    address: Some(address),
                    account_id: Some(record.account_id),
                    error: AddressError::SameAsSender,
                }
            }
            Ok(record) => RecipientStatus::Resolved {
                address,
                account_id: record.account_id,
            },
            Err(e) => {
                debug!("Recipient {:?} has no account: {}", address, e);
                RecipientStatus::Rejected {
                    address: Some(address),
                    account_id: None,
                    error: AddressError::NotRegistered,
                }
            }
        }
    }

    /// Sign and submit the transfer
    ///
    /// Refused without side effects unless both the amount and the recipient
    /// are valid and no other submission is in flight. Once started, the
    /// nonce is refreshed, the amount cleared and the history refreshed
    /// whatever the outcome, so a failed attempt never leaves a stale nonce
    /// behind.
    pub async fn submit(&self) -> SubmissionOutcome {
        let draft = {
            let mut state = self.inner.state.lock();
            if state.submission_in_flight {
                warn!("Submit ignored: a submission is already in flight");
                return SubmissionOutcome::Rejected(SubmitRejection::AlreadySubmitting);
            }

            let amount = state.amount_check().and_then(Result::ok);
            let recipient = match state.recipient {
                RecipientStatus::Resolved {
                    address,
                    account_id,
                } => Some((address, account_id)),
                _ => None,
            };
            let (Some(sender), Some(token), Some(amount), Some((receiver, receiver_account_id))) =
                (state.sender.clone(), state.token.clone(), amount, recipient)
            else {
                return SubmissionOutcome::Rejected(SubmitRejection::NotReady {
                    amount_valid: state.amount_valid(),
                    address_valid: state.address_valid(),
                });
            };

            state.submission_in_flight = true;
            SubmissionDraft {
                session: state.session,
                sender,
                token,
                amount,
                fee: state.fee,
                receiver,
                receiver_account_id,
                nonce: state.nonce,
                memo: state.memo.clone(),
            }
        };
        let _guard = InFlightGuard {
            state: &self.inner.state,
            session: draft.session,
        };

        info!(
            "Submitting transfer of {} {} to account {}",
            amount::format_base_units(draft.amount, draft.token.decimals),
            draft.token.symbol,
            draft.receiver_account_id
        );

        let result = self.execute(&draft).await;
        self.finish_submission(&draft).await;

        match result {
            Ok((request, receipt)) => {
                info!("Transfer accepted by relayer: {}", receipt.hash);
                SubmissionOutcome::Accepted { request, receipt }
            }
            Err(e) => {
                warn!("Transfer failed: {}", e);
                SubmissionOutcome::Failed(e)
            }
        }
    }

    async fn execute(
        &self,
        draft: &SubmissionDraft,
    ) -> Result<(TransferRequest, SubmissionReceipt), TransferError> {
        let collaborators = &self.inner.collaborators;

        let nonce = match draft.nonce {
            Some(nonce) => nonce,
            None => collaborators
                .accounts
                .resolve_account(draft.sender.address)
                .await
                .map(|record| record.nonce)
                .map_err(|e| TransferError::NonceUnavailable(e.to_string()))?,
        };

        let request = TransferRequest {
            exchange_id: self.inner.exchange.exchange_id,
            sender: draft.sender.address,
            sender_account_id: draft.sender.account_id,
            receiver: draft.receiver,
            receiver_account_id: draft.receiver_account_id,
            token: draft.token.clone(),
            amount: draft.amount,
            fee_token: draft.token.clone(),
            fee_amount: draft.fee,
            nonce,
            memo: draft.memo.clone(),
            label: self.inner.exchange.label,
        };

        let signed = collaborators
            .signer
            .sign(&request)
            .await
            .map_err(|e| TransferError::Signing(e.to_string()))?;

        let receipt = collaborators
            .submitter
            .submit(&signed, &draft.sender.api_key)
            .await
            .map_err(|e| TransferError::Submission(e.to_string()))?;

        Ok((request, receipt))
    }

    /// Cleanup shared by every submission path
    async fn finish_submission(&self, draft: &SubmissionDraft) {
        let collaborators = &self.inner.collaborators;

        let nonce = match collaborators
            .accounts
            .resolve_account(draft.sender.address)
            .await
        {
            Ok(record) => Some(record.nonce),
            Err(e) => {
                warn!("Nonce refresh after submission failed: {}", e);
                None
            }
        };

        {
            let mut state = self.inner.state.lock();
            if state.session == draft.session {
                state.nonce = nonce;
                state.raw_amount = None;
                state.submission_in_flight = false;
            }
        }

        if let Some(history) = &collaborators.history {
            history.refresh(&draft.sender).await;
        }
    }

    async fn refresh_nonce(&self, session: u64, sender: &SenderAccount) {
        let nonce = match self
            .inner
            .collaborators
            .accounts
            .resolve_account(sender.address)
            .await
        {
            Ok(record) => Some(record.nonce),
            Err(e) => {
                warn!(
                    "Nonce refresh failed for account {}: {}",
                    sender.account_id, e
                );
                None
            }
        };

        let mut state = self.inner.state.lock();
        if state.session == session {
            state.nonce = nonce;
        }
    }
}
