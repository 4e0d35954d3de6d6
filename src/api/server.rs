//! API Server Module
//!
//! This module implements a JSON-RPC server that exposes the transfer dialog
//! to a presentation layer. Every method maps onto one validator operation and
//! answers with the current `TransferView`, so the caller can re-render from
//! the response alone.

use crate::{
    SenderAccount, SubmissionOutcome, TransferError, config::ApiConfig,
    validation::TransferValidator,
};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{error, info, warn};

const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const VALIDATOR_ERROR: i32 = -32000;

/// Shared application state that is accessible across all request handlers
///
/// - `validator`: Handle to the single transfer dialog this client drives
/// - `sender`: The account every dialog is opened for
#[derive(Clone)]
pub struct AppState {
    validator: TransferValidator,
    sender: SenderAccount,
}

/// The main API server struct
///
/// Holds the listening address and the state shared by every handler.
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    /// Creates a new API server instance
    ///
    /// # Arguments
    /// * `config` - Listening host and port
    /// * `validator` - The transfer validator the methods operate on
    /// * `sender` - Account used when a dialog is opened
    pub fn new(config: ApiConfig, validator: TransferValidator, sender: SenderAccount) -> Self {
        Self {
            config,
            state: AppState { validator, sender },
        }
    }

    /// Router with a single POST endpoint at "/"
    ///
    /// Exposed separately from `start` so the routes can be driven in-process.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_rpc))
            .with_state(self.state.clone())
    }

    /// Starts the API server and begins listening for incoming requests
    ///
    /// This method:
    /// 1. Builds the router with the JSON-RPC endpoint
    /// 2. Binds to the configured host and port
    /// 3. Serves requests until the listener closes
    ///
    /// # Returns
    /// `Ok(())` when the server shuts down, or an error if binding fails
    pub async fn start(self) -> anyhow::Result<()> {
        // Step 1: Router with the shared validator handle
        let app = self.router();

        // Step 2: Bind the configured address
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        // Step 3: Serve until shutdown
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
///
/// - `jsonrpc`: Protocol version (should be "2.0")
/// - `method`: One of the `transfer_*` methods (e.g., "transfer_setAmount")
/// - `params`: Method parameters; may be omitted for methods that take none
/// - `id`: Request identifier echoed back in the response
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

/// JSON-RPC 2.0 response structure
///
/// Either `result` or `error` is populated, never both:
/// - `jsonrpc`: Protocol version ("2.0")
/// - `result`: The transfer view, or a method-specific object wrapping it
/// - `error`: Error information if the request failed
/// - `id`: Request identifier matching the original request
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

/// JSON-RPC error object
///
/// - `code`: `-32601` unknown method, `-32602` bad params, `-32000` validator error
/// - `message`: Human-readable error description
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Json<Self> {
        Json(Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        })
    }

    fn failure(id: Value, code: i32, message: String) -> Json<Self> {
        Json(Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError { code, message }),
            id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenParams {
    token: String,
}

#[derive(Debug, Deserialize)]
struct AmountParams {
    amount: String,
}

#[derive(Debug, Deserialize)]
struct RecipientParams {
    recipient: String,
}

#[derive(Debug, Deserialize)]
struct MemoParams {
    memo: String,
}

/// Deserialize `params` or build the `-32602` response
fn parse_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, Json<JsonRpcResponse>> {
    serde_json::from_value(request.params.clone()).map_err(|e| {
        warn!("Invalid params for {}: {}", request.method, e);
        JsonRpcResponse::failure(
            request.id.clone(),
            INVALID_PARAMS,
            format!("Invalid params: {}", e),
        )
    })
}

/// Current view as a JSON value
fn view_value(state: &AppState) -> Value {
    match serde_json::to_value(state.validator.view()) {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to serialize transfer view: {}", e);
            Value::Null
        }
    }
}

/// Main RPC request handler
///
/// Routes the request to the validator operation named by `method`.
async fn handle_rpc(
    State(state): State<AppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    info!("Received RPC request: {}", request.method);

    match request.method.as_str() {
        "transfer_open" => handle_open(state, request).await,
        "transfer_close" => {
            state.validator.close();
            JsonRpcResponse::success(request.id, view_value(&state))
        }
        "transfer_selectToken" => handle_select_token(state, request).await,
        "transfer_setAmount" => {
            let params: AmountParams = match parse_params(&request) {
                Ok(params) => params,
                Err(response) => return response,
            };
            let result = state.validator.set_amount(&params.amount);
            amount_response(&state, request.id, result.map(|_| ()))
        }
        "transfer_setAllAvailable" => {
            let result = state.validator.set_all_available();
            amount_response(&state, request.id, result.map(|_| ()))
        }
        "transfer_setRecipient" => {
            let params: RecipientParams = match parse_params(&request) {
                Ok(params) => params,
                Err(response) => return response,
            };
            let validator = state.validator.clone();
            tokio::spawn(async move {
                validator.set_recipient(&params.recipient).await;
            });
            JsonRpcResponse::success(request.id, view_value(&state))
        }
        "transfer_setMemo" => {
            let params: MemoParams = match parse_params(&request) {
                Ok(params) => params,
                Err(response) => return response,
            };
            let accepted = state.validator.set_memo(&params.memo);
            JsonRpcResponse::success(
                request.id,
                json!({ "accepted": accepted, "state": view_value(&state) }),
            )
        }
        "transfer_submit" => handle_submit(state, request).await,
        "transfer_state" => JsonRpcResponse::success(request.id, view_value(&state)),
        _ => JsonRpcResponse::failure(
            request.id,
            METHOD_NOT_FOUND,
            "Method not found".to_string(),
        ),
    }
}

/// Response for the amount-editing methods
///
/// An invalid amount is still recorded and reported through the view; only a
/// closed dialog is an RPC error.
fn amount_response(
    state: &AppState,
    id: Value,
    result: Result<(), TransferError>,
) -> Json<JsonRpcResponse> {
    match result {
        Ok(()) => JsonRpcResponse::success(id, view_value(state)),
        Err(TransferError::Amount(e)) => {
            info!("Amount not accepted: {}", e);
            JsonRpcResponse::success(id, view_value(state))
        }
        Err(e) => {
            warn!("Amount edit refused: {}", e);
            JsonRpcResponse::failure(id, VALIDATOR_ERROR, e.to_string())
        }
    }
}

/// Handles "transfer_open": reset the dialog for the configured sender
async fn handle_open(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let params: TokenParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state
        .validator
        .open(state.sender.clone(), &params.token)
        .await
    {
        Ok(()) => JsonRpcResponse::success(request.id, view_value(&state)),
        Err(e) => {
            warn!("Failed to open transfer for {}: {}", params.token, e);
            JsonRpcResponse::failure(request.id, VALIDATOR_ERROR, e.to_string())
        }
    }
}

/// Handles "transfer_selectToken"
async fn handle_select_token(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let params: TokenParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state.validator.select_token(&params.token).await {
        Ok(()) => JsonRpcResponse::success(request.id, view_value(&state)),
        Err(e) => {
            warn!("Failed to select token {}: {}", params.token, e);
            JsonRpcResponse::failure(request.id, VALIDATOR_ERROR, e.to_string())
        }
    }
}

/// Handles "transfer_submit"
///
/// A refused or failed submission is still a successful JSON-RPC call; the
/// `status` field tells the three outcomes apart.
async fn handle_submit(state: AppState, request: JsonRpcRequest) -> Json<JsonRpcResponse> {
    let outcome = state.validator.submit().await;

    let result = match outcome {
        SubmissionOutcome::Accepted { request: transfer, receipt } => {
            info!("Transfer {} accepted by relayer", receipt.hash);
            json!({
                "status": "accepted",
                "hash": receipt.hash,
                "relayerStatus": receipt.status,
                "nonce": transfer.nonce,
                "state": view_value(&state),
            })
        }
        SubmissionOutcome::Rejected(rejection) => json!({
            "status": "rejected",
            "reason": rejection.to_string(),
            "state": view_value(&state),
        }),
        SubmissionOutcome::Failed(e) => json!({
            "status": "failed",
            "error": e.to_string(),
            "state": view_value(&state),
        }),
    };

    JsonRpcResponse::success(request.id, result)
}
