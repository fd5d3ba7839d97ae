//! Jupiter-compatible aggregator client

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{ExternalOpaque, PriorityFee, QuoteRequest, SwapAggregator, SwapClientConfig, SwapError};
use crate::fallback::{redact_endpoint, try_endpoints};
use crate::wallet::Address;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    #[serde(default)]
    swap_transaction: Option<String>,
}

/// HTTP client for the `/quote` and `/swap` endpoints
#[derive(Debug)]
pub struct JupiterClient {
    http: reqwest::Client,
    config: SwapClientConfig,
}

impl JupiterClient {
    pub fn new(config: SwapClientConfig) -> Result<Self, SwapError> {
        config
            .validate()
            .map_err(|e| SwapError::Configuration(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SwapError::Configuration(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &SwapClientConfig {
        &self.config
    }

    fn url(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }

    fn with_api_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Send a request and parse a 2xx JSON body, mapping failures to
    /// endpoint-level errors
    async fn fetch_json(
        &self,
        base: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, SwapError> {
        let timeout_ms = self.config.timeout_ms;
        let response = self
            .with_api_key(request)
            .send()
            .await
            .map_err(|e| SwapError::transport(base, &e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwapError::HttpStatus {
                endpoint: redact_endpoint(base),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                SwapError::transport(base, &e, timeout_ms)
            } else {
                SwapError::InvalidResponse {
                    endpoint: redact_endpoint(base),
                    message: e.to_string(),
                }
            }
        })
    }

    async fn quote_at(&self, base: String, request: &QuoteRequest) -> Result<ExternalOpaque, SwapError> {
        let http_request = self.http.get(Self::url(&base, "quote")).query(&[
            ("inputMint", request.input_mint.to_string()),
            ("outputMint", request.output_mint.to_string()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ]);

        let body = self.fetch_json(&base, http_request).await?;
        if !body.is_object() {
            return Err(SwapError::InvalidResponse {
                endpoint: redact_endpoint(&base),
                message: "quote is not a JSON object".to_string(),
            });
        }

        let quote = ExternalOpaque::new(body);
        if let Some(error) = quote.get("error") {
            let reason = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(SwapError::NoRouteAvailable { reason });
        }
        match quote.out_amount() {
            Some(amount) if amount > 0 => Ok(quote),
            _ => Err(SwapError::NoRouteAvailable {
                reason: "quote has no output amount".to_string(),
            }),
        }
    }

    async fn swap_at(
        &self,
        base: String,
        quote: &ExternalOpaque,
        signer: &Address,
        priority_fee: PriorityFee,
    ) -> Result<Vec<u8>, SwapError> {
        let payload = json!({
            "quoteResponse": quote,
            "userPublicKey": signer.to_string(),
            "wrapAndUnwrapSol": true,
            "dynamicComputeUnitLimit": true,
            "prioritizationFeeLamports": priority_fee,
        });
        let http_request = self.http.post(Self::url(&base, "swap")).json(&payload);

        let body = self.fetch_json(&base, http_request).await?;
        let response: SwapResponse =
            serde_json::from_value(body).map_err(|e| SwapError::InvalidResponse {
                endpoint: redact_endpoint(&base),
                message: e.to_string(),
            })?;

        let encoded = response
            .swap_transaction
            .filter(|tx| !tx.is_empty())
            .ok_or_else(|| SwapError::MissingSwapTransaction {
                endpoint: redact_endpoint(&base),
            })?;

        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| SwapError::InvalidResponse {
                endpoint: redact_endpoint(&base),
                message: format!("swapTransaction is not base64: {}", e),
            })
    }
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    #[instrument(skip(self, request), fields(
        input = %request.input_mint,
        output = %request.output_mint,
        amount = request.amount,
        slippage_bps = request.slippage_bps
    ))]
    async fn quote(&self, request: &QuoteRequest) -> Result<ExternalOpaque, SwapError> {
        let quote = try_endpoints("swap", &self.config.endpoints, |base| {
            self.quote_at(base, request)
        })
        .await?;
        debug!(out_amount = ?quote.out_amount(), "Received quote");
        Ok(quote)
    }

    #[instrument(skip(self, quote), fields(signer = %signer))]
    async fn build_swap_transaction(
        &self,
        quote: &ExternalOpaque,
        signer: &Address,
        priority_fee: PriorityFee,
    ) -> Result<Vec<u8>, SwapError> {
        let tx = try_endpoints("swap", &self.config.endpoints, |base| {
            self.swap_at(base, quote, signer, priority_fee)
        })
        .await?;
        debug!(len = tx.len(), "Received unsigned swap transaction");
        Ok(tx)
    }
}
