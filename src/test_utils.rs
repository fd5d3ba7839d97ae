//! Test Utilities Module
//!
//! In-process implementations of [`ChainRpc`] and [`SwapAggregator`] with
//! call counters and injectable per-wallet failures. Only compiled when
//! running tests or when the `test_utils` feature is enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::rpc_manager::{ChainRpc, RpcManagerError};
use crate::swap::{ExternalOpaque, PriorityFee, QuoteRequest, SwapAggregator, SwapError};
use crate::tx_builder::SignedTransaction;
use crate::wallet::Address;

/// Mock chain RPC
///
/// Balances default to `default_balance`; sends fail for any transaction
/// whose bytes contain an address registered with `fail_sends_involving`.
#[derive(Debug, Default)]
pub struct MockRpc {
    default_balance: AtomicU64,
    balances: DashMap<Address, u64>,
    token_balances: DashMap<Address, u64>,
    failing_addresses: DashSet<Address>,
    blockhash_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    token_balance_calls: AtomicUsize,
    send_calls: AtomicUsize,
    send_latency_ms: AtomicU64,
    sends_in_flight: AtomicUsize,
    max_sends_in_flight: AtomicUsize,
}

impl MockRpc {
    pub fn new(default_balance: u64) -> Self {
        let mock = Self::default();
        mock.default_balance.store(default_balance, Ordering::SeqCst);
        mock
    }

    pub fn set_balance(&self, address: Address, lamports: u64) {
        self.balances.insert(address, lamports);
    }

    pub fn set_token_balance(&self, owner: Address, amount: u64) {
        self.token_balances.insert(owner, amount);
    }

    pub fn fail_sends_involving(&self, address: Address) {
        self.failing_addresses.insert(address);
    }

    pub fn blockhash_calls(&self) -> usize {
        self.blockhash_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn token_balance_calls(&self) -> usize {
        self.token_balance_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Make every `send_transaction` take `latency` before answering
    pub fn set_send_latency(&self, latency: Duration) {
        self.send_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// High-water mark of concurrent `send_transaction` calls
    pub fn max_sends_in_flight(&self) -> usize {
        self.max_sends_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcManagerError> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok([42u8; 32])
    }

    async fn get_balance(&self, address: &Address) -> Result<u64, RpcManagerError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .balances
            .get(address)
            .map(|b| *b)
            .unwrap_or_else(|| self.default_balance.load(Ordering::SeqCst)))
    }

    async fn get_token_balance(&self, owner: &Address, _mint: &Address) -> Result<u64, RpcManagerError> {
        self.token_balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.token_balances.get(owner).map(|b| *b).unwrap_or(0))
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, RpcManagerError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.sends_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_sends_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let latency = self.send_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        self.sends_in_flight.fetch_sub(1, Ordering::SeqCst);

        let bytes = tx.as_bytes();
        let involved = self
            .failing_addresses
            .iter()
            .any(|addr| bytes.windows(32).any(|w| w == addr.as_bytes()));
        if involved {
            return Err(RpcManagerError::RpcResponse {
                endpoint: "mock".to_string(),
                message: "Transaction simulation failed".to_string(),
                code: Some(-32002),
            });
        }
        Ok(tx.signature_base58())
    }
}

/// Mock swap aggregator
///
/// Swap transactions are a single empty signature slot followed by a
/// message that embeds the signer and input mint, so `MockRpc` can fail
/// only one direction of a swap.
#[derive(Debug, Default)]
pub struct MockAggregator {
    failing_signers: DashSet<Address>,
    no_route: AtomicBool,
    quote_calls: AtomicUsize,
    swap_calls: AtomicUsize,
    last_priority_fee: DashMap<Address, PriorityFee>,
    quoted: DashMap<(Address, Address), u64>,
}

impl MockAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every swap-build for `signer` fails as if all endpoints were down
    pub fn fail_swaps_for(&self, signer: Address) {
        self.failing_signers.insert(signer);
    }

    pub fn set_no_route(&self, no_route: bool) {
        self.no_route.store(no_route, Ordering::SeqCst);
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn swap_calls(&self) -> usize {
        self.swap_calls.load(Ordering::SeqCst)
    }

    pub fn priority_fee_for(&self, signer: &Address) -> Option<PriorityFee> {
        self.last_priority_fee.get(signer).map(|f| *f)
    }

    /// Last quoted amount for an input/output pair
    pub fn quoted_amount(&self, input: &Address, output: &Address) -> Option<u64> {
        self.quoted.get(&(*input, *output)).map(|a| *a)
    }

    /// Unsigned transaction embedding the signer and the swap's input mint
    pub fn unsigned_transaction(signer: &Address, input_mint: &Address) -> Vec<u8> {
        let mut tx = vec![1u8];
        tx.extend_from_slice(&[0u8; 64]);
        tx.push(0x80);
        tx.extend_from_slice(signer.as_bytes());
        tx.extend_from_slice(input_mint.as_bytes());
        tx.extend_from_slice(&[0xAB; 16]);
        tx
    }
}

#[async_trait]
impl SwapAggregator for MockAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<ExternalOpaque, SwapError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        if self.no_route.load(Ordering::SeqCst) {
            return Err(SwapError::NoRouteAvailable {
                reason: "Could not find any route".to_string(),
            });
        }
        self.quoted
            .insert((request.input_mint, request.output_mint), request.amount);
        Ok(ExternalOpaque::new(json!({
            "inputMint": request.input_mint.to_string(),
            "outputMint": request.output_mint.to_string(),
            "inAmount": request.amount.to_string(),
            "outAmount": (request.amount / 2 + 1).to_string(),
            "slippageBps": request.slippage_bps,
        })))
    }

    async fn build_swap_transaction(
        &self,
        quote: &ExternalOpaque,
        signer: &Address,
        priority_fee: PriorityFee,
    ) -> Result<Vec<u8>, SwapError> {
        self.swap_calls.fetch_add(1, Ordering::SeqCst);
        self.last_priority_fee.insert(*signer, priority_fee);
        if self.failing_signers.contains(signer) {
            return Err(SwapError::AllEndpointsFailed {
                attempted: 2,
                last_error: Box::new(SwapError::HttpStatus {
                    endpoint: "mock".to_string(),
                    status: 500,
                }),
            });
        }
        let input_mint = quote
            .get("inputMint")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        Ok(Self::unsigned_transaction(signer, &input_mint))
    }
}

/// HTTP endpoint that accepts connections and never answers
///
/// Returns its base URL; connections stay open for the life of the runtime.
pub async fn silent_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent endpoint");
    let addr = listener.local_addr().expect("silent endpoint address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}
