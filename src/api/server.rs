//! API Server Module
//!
//! This module implements a JSON-RPC server through which co-located peer
//! logic reaches the validator. Byte strings (transactions in wire form,
//! messages, signatures, ids) travel hex-encoded.

use crate::{Transaction, config::ApiConfig, error::Error, validation::Validator};
use axum::{Json, Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// JSON-RPC error code for a request the validator refused
pub const VALIDATION_FAILED: i32 = -32000;
/// JSON-RPC error code for a validator that could not serve the request
/// (not initialized, storage or directory failures)
pub const INTERNAL_ERROR: i32 = -32603;
const INVALID_PARAMS: i32 = -32602;
const METHOD_NOT_FOUND: i32 = -32601;

/// Shared application state that is accessible across all request handlers
#[derive(Clone)]
pub struct AppState {
    validator: Arc<Validator>,
}

/// The main API server struct
pub struct Server {
    config: ApiConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ApiConfig, validator: Arc<Validator>) -> Self {
        Self {
            config,
            state: AppState { validator },
        }
    }

    /// Router with a single POST endpoint at "/"
    pub fn router(&self) -> Router {
        Router::new().route("/", post(handle_rpc)).with_state(self.state.clone())
    }

    /// Binds to the configured address and serves until `shutdown` resolves
    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> anyhow::Result<()> {
        let app = self.router();

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        Ok(())
    }
}

/// JSON-RPC 2.0 request structure
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
/// Either `result` or `error` will be populated, but not both.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// Why a call failed before or inside the validator
enum CallError {
    InvalidParams(String),
    Validator(Error),
}

impl From<Error> for CallError {
    fn from(e: Error) -> Self {
        CallError::Validator(e)
    }
}

#[derive(Deserialize)]
struct TransactionParams {
    transaction: String,
}

#[derive(Deserialize)]
struct SignParams {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyParams {
    #[serde(default)]
    verifier_id: Option<String>,
    signature: String,
    message: String,
}

/// Main RPC request handler
///
/// Routes the request to the appropriate handler based on the method name.
async fn handle_rpc(State(state): State<AppState>, Json(request): Json<JsonRpcRequest>) -> Json<JsonRpcResponse> {
    debug!("Received RPC request: {}", request.method);

    let outcome = match request.method.as_str() {
        "validator_id" => handle_id(&state).await,
        "validator_preValidate" => handle_pre_validate(&state, request.params).await,
        "validator_preExecute" => handle_pre_execute(&state, request.params).await,
        "validator_sign" => handle_sign(&state, request.params).await,
        "validator_verify" => handle_verify(&state, request.params).await,
        _ => {
            return Json(JsonRpcResponse::failure(request.id, METHOD_NOT_FOUND, "Method not found"));
        }
    };

    Json(match outcome {
        Ok(result) => JsonRpcResponse::success(request.id, result),
        Err(CallError::InvalidParams(reason)) => {
            JsonRpcResponse::failure(request.id, INVALID_PARAMS, format!("Invalid params: {}", reason))
        }
        Err(CallError::Validator(e)) if e.is_rejection() => {
            warn!("RPC {} rejected: {}", request.method, e);
            JsonRpcResponse::failure(request.id, VALIDATION_FAILED, e.to_string())
        }
        Err(CallError::Validator(e)) => {
            error!("RPC {} failed: {}", request.method, e);
            JsonRpcResponse::failure(request.id, INTERNAL_ERROR, e.to_string())
        }
    })
}

fn parse_params<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T, CallError> {
    serde_json::from_value(params).map_err(|e| CallError::InvalidParams(e.to_string()))
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, CallError> {
    hex::decode(value).map_err(|e| CallError::InvalidParams(format!("{}: {}", field, e)))
}

fn decode_transaction(params: Value) -> Result<Transaction, CallError> {
    let params: TransactionParams = parse_params(params)?;
    let bytes = decode_hex("transaction", &params.transaction)?;
    Transaction::from_bytes(&bytes).map_err(|e| CallError::InvalidParams(format!("transaction: {}", e)))
}

async fn handle_id(state: &AppState) -> Result<Value, CallError> {
    let id = state.validator.id().await?;
    let enrollment_id = state.validator.enrollment_id().await?;
    Ok(json!({ "id": hex::encode(id), "enrollmentId": enrollment_id }))
}

async fn handle_pre_validate(state: &AppState, params: Value) -> Result<Value, CallError> {
    let tx = decode_transaction(params)?;
    state.validator.transaction_pre_validation(&tx).await?;
    info!("Transaction [{}] pre-validated", tx.uuid);
    Ok(json!({ "valid": true }))
}

async fn handle_pre_execute(state: &AppState, params: Value) -> Result<Value, CallError> {
    let tx = decode_transaction(params)?;
    let tx = state.validator.transaction_pre_execution(tx).await?;
    let bytes = tx.to_bytes().map_err(Error::from)?;
    Ok(json!({ "transaction": hex::encode(bytes) }))
}

async fn handle_sign(state: &AppState, params: Value) -> Result<Value, CallError> {
    let params: SignParams = parse_params(params)?;
    let message = decode_hex("message", &params.message)?;
    let signature = state.validator.sign(&message).await?;
    Ok(json!({ "signature": hex::encode(signature) }))
}

async fn handle_verify(state: &AppState, params: Value) -> Result<Value, CallError> {
    let params: VerifyParams = parse_params(params)?;
    let verifier_id = params
        .verifier_id
        .as_deref()
        .map(|id| decode_hex("verifierId", id))
        .transpose()?;
    let signature = decode_hex("signature", &params.signature)?;
    let message = decode_hex("message", &params.message)?;

    state
        .validator
        .verify(verifier_id.as_deref(), &signature, &message)
        .await?;
    Ok(json!({ "valid": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        TransactionKind,
        config::SecurityConfig,
        enrollment::LocalAuthority,
        store::SqliteCredentialStore,
        validation::{ValidatorContext, confidentiality},
    };
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn uninitialized() -> (Server, Arc<LocalAuthority>) {
        let authority = Arc::new(LocalAuthority::new().unwrap());
        let validator = Arc::new(Validator::new(
            SecurityConfig::default(),
            ValidatorContext {
                store: Arc::new(SqliteCredentialStore::new("sqlite::memory:")),
                enrollment: authority.clone(),
                directory: authority.clone(),
            },
        ));
        (Server::new(ApiConfig::default(), validator), authority)
    }

    async fn server() -> (Server, Arc<LocalAuthority>) {
        let (server, authority) = uninitialized();
        authority.register_user("validator-0", "pw").await;

        let validator = &server.state.validator;
        validator.register("validator-0", "pw").await.unwrap();
        validator.init().await.unwrap();

        (server, authority)
    }

    async fn call(server: &Server, method: &str, params: Value) -> Value {
        let body = json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        let response = server
            .router()
            .oneshot(
                Request::post("/")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_id() {
        let (server, _) = server().await;
        let response = call(&server, "validator_id", Value::Null).await;

        assert_eq!(response["result"]["enrollmentId"], "validator-0");
        assert_eq!(response["result"]["id"].as_str().unwrap().len(), 96);
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let (server, _) = server().await;
        let message = hex::encode(b"hello");

        let signed = call(&server, "validator_sign", json!({ "message": message })).await;
        let signature = signed["result"]["signature"].as_str().unwrap().to_string();

        let verified = call(
            &server,
            "validator_verify",
            json!({ "signature": signature, "message": message }),
        )
        .await;
        assert_eq!(verified["result"]["valid"], true);

        let rejected = call(
            &server,
            "validator_verify",
            json!({ "signature": signature, "message": hex::encode(b"goodbye") }),
        )
        .await;
        assert_eq!(rejected["error"]["code"], VALIDATION_FAILED);
        assert_eq!(rejected["error"]["message"], "invalid signature");
    }

    #[tokio::test]
    async fn test_confidential_transaction_round() {
        let (server, authority) = server().await;
        let validator = server.state.validator.clone();

        let tx = Transaction::new(TransactionKind::Invoke, "tx-1", b"cc".to_vec(), b"payload".to_vec());
        let mut tx = confidentiality::seal_transaction(authority.chain_key(), tx).unwrap();
        tx.cert = validator.enrollment_certificate().await.unwrap();
        tx.signature = validator.sign(&tx.canonical_bytes().unwrap()).await.unwrap();
        let wire = hex::encode(tx.to_bytes().unwrap());

        let validated = call(&server, "validator_preValidate", json!({ "transaction": wire })).await;
        assert_eq!(validated["result"]["valid"], true);

        let executed = call(&server, "validator_preExecute", json!({ "transaction": wire })).await;
        let bytes = hex::decode(executed["result"]["transaction"].as_str().unwrap()).unwrap();
        let executed = Transaction::from_bytes(&bytes).unwrap();
        assert_eq!(executed.payload, b"payload");
        assert_eq!(executed.chaincode_id, b"cc");
    }

    #[tokio::test]
    async fn test_missing_certificate_is_reported() {
        let (server, _) = server().await;
        let tx = Transaction::new(TransactionKind::Query, "tx-2", b"cc".to_vec(), Vec::new());

        let response = call(
            &server,
            "validator_preValidate",
            json!({ "transaction": hex::encode(tx.to_bytes().unwrap()) }),
        )
        .await;
        assert_eq!(response["error"]["code"], VALIDATION_FAILED);
        assert_eq!(response["error"]["message"], "missing transaction certificate");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (server, _) = server().await;

        let unknown = call(&server, "validator_explode", Value::Null).await;
        assert_eq!(unknown["error"]["code"], METHOD_NOT_FOUND);

        let not_hex = call(&server, "validator_sign", json!({ "message": "zz" })).await;
        assert_eq!(not_hex["error"]["code"], INVALID_PARAMS);

        let missing = call(&server, "validator_verify", json!({ "message": "00" })).await;
        assert_eq!(missing["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_service_failures_are_internal_errors() {
        let (idle, _) = uninitialized();

        let response = call(&idle, "validator_sign", json!({ "message": "00" })).await;
        assert_eq!(response["error"]["code"], INTERNAL_ERROR);
        assert_eq!(response["error"]["message"], "validator security module not initialized");

        let (ready, _) = server().await;
        let unknown = hex::encode([0xab; 48]);
        let response = call(
            &ready,
            "validator_verify",
            json!({ "verifierId": unknown, "signature": "00", "message": "00" }),
        )
        .await;
        assert_eq!(response["error"]["code"], VALIDATION_FAILED);
    }
}
