//! Relayer REST client
//!
//! Talks to the exchange relayer for everything the transfer workflow needs
//! over HTTP: account lookup (id + nonce), transfer submission, and the
//! token / balance / fee data that feeds the snapshot store.

use crate::{
    AccountRecord, LookupError, SenderAccount, SignedTransfer, SubmissionError, SubmissionReceipt, TokenBalance,
    TokenInfo,
    collaborators::{AccountLookup, HistoryRefresher, TransferSubmitter},
    config::RelayerConfig,
};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Offchain fee request type for transfers
const TRANSFER_FEE_REQUEST_TYPE: u8 = 3;

/// Entries fetched when the transfer history is refreshed
const HISTORY_PAGE_SIZE: u32 = 20;

#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: StatusCode, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type Result<T> = std::result::Result<T, RelayerError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    account_id: u64,
    nonce: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token_id: u32,
    symbol: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    token_id: u32,
    total: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct FeeEntry {
    token: String,
    fee: String,
}

#[derive(Debug, Deserialize)]
struct FeeResponse {
    fees: Vec<FeeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultInfo {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    result_info: ResultInfo,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    hash: String,
    status: String,
}

/// One entry of the sender's transfer history
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub hash: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferHistoryResponse {
    #[serde(default)]
    total_num: u64,
    transactions: Vec<TransferRecord>,
}

/// Token amount as the relayer expects it on the wire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenVolume {
    token_id: u32,
    volume: String,
}

/// Wire form of a signed transfer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferPayload {
    exchange: u32,
    payer_id: u64,
    payer_addr: String,
    payee_id: u64,
    payee_addr: String,
    token: TokenVolume,
    max_fee: TokenVolume,
    storage_id: u64,
    memo: String,
    label: u32,
    hash: String,
    ecdsa_signature: String,
}

impl TransferPayload {
    fn from_signed(signed: &SignedTransfer) -> Self {
        let request = &signed.request;
        Self {
            exchange: request.exchange_id,
            payer_id: request.sender_account_id,
            payer_addr: format!("{:?}", request.sender),
            payee_id: request.receiver_account_id,
            payee_addr: format!("{:?}", request.receiver),
            token: TokenVolume {
                token_id: request.token.token_id,
                volume: request.amount.to_string(),
            },
            max_fee: TokenVolume {
                token_id: request.fee_token.token_id,
                volume: request.fee_amount.to_string(),
            },
            storage_id: request.nonce,
            memo: request.memo.clone(),
            label: request.label,
            hash: format!("{:?}", signed.hash),
            ecdsa_signature: format!("0x{}", signed.signature),
        }
    }
}

fn parse_base_units(raw: &str) -> Result<U256> {
    U256::from_dec_str(raw)
        .map_err(|e| RelayerError::InvalidResponse(format!("bad amount {raw:?}: {e}")))
}

/// REST client for the exchange relayer
#[derive(Clone)]
pub struct RelayerClient {
    base_url: String,
    client: Client,
}

impl RelayerClient {
    /// Creates a client for the configured relayer
    pub fn new(config: &RelayerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Turn a non-success response into an `ApiError`, keeping the relayer message if any
    async fn api_error(response: reqwest::Response) -> RelayerError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| format!("{} ({})", e.result_info.message, e.result_info.code))
            .unwrap_or(body);
        RelayerError::ApiError { status, message }
    }

    /// Look up the account registered for an owner address
    ///
    /// # Returns
    /// * `Ok(None)` if the relayer has no account for the address
    pub async fn get_account(&self, owner: Address) -> Result<Option<AccountRecord>> {
        let url = format!("{}/api/v2/account", self.base_url);
        let owner = format!("{:?}", owner);
        debug!("GET {} owner={}", url, owner);

        let response = self
            .client
            .get(&url)
            .query(&[("owner", owner.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let account: AccountResponse = response
            .json()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))?;

        Ok(Some(AccountRecord {
            account_id: account.account_id,
            nonce: account.nonce,
        }))
    }

    /// Fetch the exchange token list
    pub async fn get_tokens(&self) -> Result<Vec<TokenInfo>> {
        let url = format!("{}/api/v2/exchange/tokens", self.base_url);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let tokens: Vec<TokenResponse> = response
            .json()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))?;

        Ok(tokens
            .into_iter()
            .map(|t| TokenInfo {
                token_id: t.token_id,
                symbol: t.symbol,
                decimals: t.decimals,
            })
            .collect())
    }

    /// Fetch the account's balances keyed by token id
    ///
    /// `locked` amounts are reported as frozen.
    pub async fn get_balances(&self, account_id: u64) -> Result<HashMap<u32, TokenBalance>> {
        let url = format!("{}/api/v2/user/balances", self.base_url);
        debug!("GET {} accountId={}", url, account_id);

        let response = self
            .client
            .get(&url)
            .query(&[("accountId", account_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let balances: Vec<BalanceResponse> = response
            .json()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))?;

        let mut result = HashMap::with_capacity(balances.len());
        for balance in balances {
            result.insert(
                balance.token_id,
                TokenBalance {
                    total: parse_base_units(&balance.total)?,
                    frozen: parse_base_units(&balance.locked)?,
                },
            );
        }
        Ok(result)
    }

    /// Fetch transfer fees keyed by token symbol, in base units
    pub async fn get_transfer_fees(&self, account_id: u64) -> Result<HashMap<String, U256>> {
        let url = format!("{}/api/v2/user/offchainFee", self.base_url);
        debug!("GET {} accountId={}", url, account_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("accountId", account_id.to_string()),
                ("requestType", TRANSFER_FEE_REQUEST_TYPE.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let fees: FeeResponse = response
            .json()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))?;

        fees.fees
            .into_iter()
            .map(|entry| -> Result<(String, U256)> {
                Ok((entry.token, parse_base_units(&entry.fee)?))
            })
            .collect()
    }

    /// Post a signed transfer
    pub async fn post_transfer(
        &self,
        signed: &SignedTransfer,
        api_key: &str,
    ) -> Result<SubmissionReceipt> {
        let url = format!("{}/api/v2/transfer", self.base_url);
        let payload = TransferPayload::from_signed(signed);
        info!(
            "POST {} payer={} payee={} storageId={}",
            url, payload.payer_id, payload.payee_id, payload.storage_id
        );

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", api_key)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let error = Self::api_error(response).await;
            warn!("Transfer rejected: {}", error);
            return Err(error);
        }

        let body: TransferResponse = response
            .json()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))?;

        Ok(SubmissionReceipt {
            hash: body.hash,
            status: body.status,
            timestamp: chrono::Utc::now().timestamp() as u64,
        })
    }

    /// Most recent transfers of an account, newest first
    pub async fn get_transfers(
        &self,
        account_id: u64,
        api_key: &str,
        limit: u32,
    ) -> Result<Vec<TransferRecord>> {
        let url = format!("{}/api/v2/user/transfers", self.base_url);
        debug!("GET {} accountId={} limit={}", url, account_id, limit);

        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", api_key)
            .query(&[("accountId", account_id), ("limit", u64::from(limit))])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: TransferHistoryResponse = response
            .json()
            .await
            .map_err(|e| RelayerError::InvalidResponse(e.to_string()))?;
        debug!(
            "Fetched {} of {} transfers for account {}",
            body.transactions.len(),
            body.total_num,
            account_id
        );
        Ok(body.transactions)
    }
}

#[async_trait]
impl HistoryRefresher for RelayerClient {
    async fn refresh(&self, sender: &SenderAccount) {
        match self
            .get_transfers(sender.account_id, &sender.api_key, HISTORY_PAGE_SIZE)
            .await
        {
            Ok(records) => {
                if let Some(latest) = records.first() {
                    info!(
                        "Transfer history refreshed: latest {} is {}",
                        latest.hash, latest.status
                    );
                }
            }
            Err(e) => warn!("Transfer history refresh failed: {}", e),
        }
    }
}

#[async_trait]
impl AccountLookup for RelayerClient {
    async fn resolve_account(
        &self,
        address: Address,
    ) -> std::result::Result<AccountRecord, LookupError> {
        match self.get_account(address).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(LookupError::NotFound(address)),
            Err(e) => Err(LookupError::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl TransferSubmitter for RelayerClient {
    async fn submit(
        &self,
        signed: &SignedTransfer,
        api_key: &str,
    ) -> std::result::Result<SubmissionReceipt, SubmissionError> {
        self.post_transfer(signed, api_key)
            .await
            .map_err(|e| match e {
                RelayerError::ApiError { status, message } => SubmissionError::Rejected {
                    code: i64::from(status.as_u16()),
                    message,
                },
                other => SubmissionError::Transport(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferRequest;
    use ethers::types::{H256, Signature};

    #[test]
    fn test_payload_uses_decimal_volumes() {
        let token = TokenInfo {
            token_id: 6,
            symbol: "USDC".to_string(),
            decimals: 6,
        };
        let request = TransferRequest {
            exchange_id: 2,
            sender: Address::from_low_u64_be(1),
            sender_account_id: 10_001,
            receiver: Address::from_low_u64_be(2),
            receiver_account_id: 20_002,
            token: token.clone(),
            amount: U256::from(10_000_000u64),
            fee_token: token,
            fee_amount: U256::from(1_000_000u64),
            nonce: 5,
            memo: "rent".to_string(),
            label: 0,
        };
        let signed = SignedTransfer {
            request,
            hash: H256::zero(),
            signature: Signature {
                r: U256::one(),
                s: U256::one(),
                v: 27,
            },
        };

        let payload = serde_json::to_value(TransferPayload::from_signed(&signed)).unwrap();
        assert_eq!(payload["token"]["volume"], "10000000");
        assert_eq!(payload["maxFee"]["volume"], "1000000");
        assert_eq!(payload["storageId"], 5);
        assert_eq!(payload["payeeId"], 20_002);
        assert_eq!(
            payload["payerAddr"],
            "0x0000000000000000000000000000000000000001"
        );
    }

    #[test]
    fn test_history_body_parsing() {
        let body = r#"{"totalNum":2,"transactions":[
            {"hash":"0xab","status":"processed","timestamp":1700000000},
            {"hash":"0xcd","status":"processing"}
        ]}"#;
        let parsed: TransferHistoryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.total_num, 2);
        assert_eq!(parsed.transactions[0].status, "processed");
        assert_eq!(parsed.transactions[1].timestamp, 0);
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"resultInfo":{"code":102024,"message":"invalid nonce"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.result_info.code, 102_024);
        assert_eq!(parsed.result_info.message, "invalid nonce");
    }
}
