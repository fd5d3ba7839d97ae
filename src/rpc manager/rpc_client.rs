//! JSON-RPC client with ordered endpoint fallback
//!
//! Every call is a single `{ jsonrpc, id, method, params }` POST, tried
//! against the configured endpoints in order. Idempotent reads are
//! additionally retried with jittered backoff once the whole list has
//! failed; `sendTransaction` is not (the provider retries it server-side).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_retry::RetryIf;
use tracing::{debug, instrument};

use super::rpc_config::RpcClientConfig;
use super::rpc_errors::RpcManagerError;
use super::ChainRpc;
use crate::base58;
use crate::fallback::{redact_endpoint, try_endpoints};
use crate::metrics::metrics;
use crate::tx_builder::SignedTransaction;
use crate::wallet::Address;

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ContextValue<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
}

/// JSON-RPC client over `reqwest`
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    config: RpcClientConfig,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(config: RpcClientConfig) -> Result<Self, RpcManagerError> {
        config
            .validate()
            .map_err(|e| RpcManagerError::Configuration(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RpcManagerError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RpcClientConfig {
        &self.config
    }

    /// Issue one JSON-RPC call, falling back across endpoints
    pub async fn call(&self, method: &'static str, params: Value) -> Result<Value, RpcManagerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let start = Instant::now();
        let result = try_endpoints("rpc", &self.config.endpoints, |endpoint| {
            self.call_endpoint(endpoint, method, &payload)
        })
        .await;

        metrics()
            .rpc_latency
            .with_label_values(&[method])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn call_endpoint(
        &self,
        endpoint: String,
        method: &'static str,
        payload: &Value,
    ) -> Result<Value, RpcManagerError> {
        let response = self
            .http
            .post(&endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| RpcManagerError::transport(&endpoint, &e, self.config.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcManagerError::HttpStatus {
                endpoint: redact_endpoint(&endpoint),
                status: status.as_u16(),
            });
        }

        let envelope: RpcEnvelope = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RpcManagerError::transport(&endpoint, &e, self.config.timeout_ms)
            } else {
                RpcManagerError::InvalidResponse {
                    endpoint: redact_endpoint(&endpoint),
                    message: format!("{}: {}", method, e),
                }
            }
        })?;

        if let Some(error) = envelope.error {
            return Err(RpcManagerError::RpcResponse {
                endpoint: redact_endpoint(&endpoint),
                message: error.message,
                code: error.code,
            });
        }

        envelope
            .result
            .ok_or_else(|| RpcManagerError::InvalidResponse {
                endpoint: redact_endpoint(&endpoint),
                message: format!("{}: missing result", method),
            })
    }

    /// Retry an idempotent read with jittered backoff when retryable
    async fn read(&self, method: &'static str, params: Value) -> Result<Value, RpcManagerError> {
        RetryIf::start(
            self.config.retry_policy().delays(),
            || self.call(method, params.clone()),
            |err: &RpcManagerError| err.is_retryable(),
        )
        .await
    }
}

fn invalid(method: &str, message: impl Into<String>) -> RpcManagerError {
    RpcManagerError::InvalidResponse {
        endpoint: "-".to_string(),
        message: format!("{}: {}", method, message.into()),
    }
}

/// Extract the raw token amount of the first account in a
/// `getTokenAccountsByOwner` (jsonParsed) result; no accounts means zero
fn parse_token_amount(result: &Value) -> Result<u64, RpcManagerError> {
    let accounts = result
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("getTokenAccountsByOwner", "missing value array"))?;

    let Some(first) = accounts.first() else {
        return Ok(0);
    };

    let amount = first
        .pointer("/account/data/parsed/info/tokenAmount/amount")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("getTokenAccountsByOwner", "missing tokenAmount.amount"))?;

    amount
        .parse::<u64>()
        .map_err(|e| invalid("getTokenAccountsByOwner", e.to_string()))
}

#[async_trait]
impl ChainRpc for JsonRpcClient {
    #[instrument(skip(self))]
    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcManagerError> {
        let result = self
            .read(
                "getLatestBlockhash",
                json!([{ "commitment": self.config.commitment }]),
            )
            .await?;

        let parsed: ContextValue<BlockhashValue> = serde_json::from_value(result)
            .map_err(|e| invalid("getLatestBlockhash", e.to_string()))?;
        let blockhash = base58::decode_32(&parsed.value.blockhash)
            .map_err(|e| invalid("getLatestBlockhash", e.to_string()))?;

        debug!(blockhash = %parsed.value.blockhash, "Fetched latest blockhash");
        Ok(blockhash)
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn get_balance(&self, address: &Address) -> Result<u64, RpcManagerError> {
        let result = self
            .read(
                "getBalance",
                json!([address.to_string(), { "commitment": self.config.commitment }]),
            )
            .await?;

        let parsed: ContextValue<u64> =
            serde_json::from_value(result).map_err(|e| invalid("getBalance", e.to_string()))?;
        Ok(parsed.value)
    }

    #[instrument(skip(self), fields(owner = %owner, mint = %mint))]
    async fn get_token_balance(&self, owner: &Address, mint: &Address) -> Result<u64, RpcManagerError> {
        let result = self
            .read(
                "getTokenAccountsByOwner",
                json!([
                    owner.to_string(),
                    { "mint": mint.to_string() },
                    { "encoding": "jsonParsed", "commitment": self.config.commitment }
                ]),
            )
            .await?;

        parse_token_amount(&result)
    }

    #[instrument(skip(self, tx), fields(signature = %tx.signature_base58()))]
    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, RpcManagerError> {
        let result = self
            .call(
                "sendTransaction",
                json!([
                    tx.to_base64(),
                    {
                        "encoding": "base64",
                        "skipPreflight": true,
                        "maxRetries": self.config.send_max_retries,
                    }
                ]),
            )
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| invalid("sendTransaction", "result is not a signature string"))
    }
}
