//! End-to-end session flow against in-process chain and aggregator stubs
//!
//! Drives generate → fund → buy → sell through the public API and checks
//! per-wallet results, session state and what reached the chain.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bundler::notify::Notifier;
use bundler::session::SessionStatus;
use bundler::swap::{ExternalOpaque, PriorityFee, QuoteRequest};
use bundler::tx_builder::SignedTransaction;
use bundler::{
    Address, BundleEngine, ChainRpc, EngineConfig, EngineError, FailureKind, Keypair,
    RpcManagerError, SwapAggregator, SwapError,
};

const ASSET: Address = Address::new([42u8; 32]);
const WALLET_BALANCE: u64 = 50_000_000;

/// Chain stub: fixed balances, records submitted transactions
#[derive(Default)]
struct StubChain {
    sent: Mutex<Vec<Vec<u8>>>,
    rejected: Mutex<HashSet<Address>>,
}

impl StubChain {
    fn reject(&self, address: Address) {
        self.rejected.lock().unwrap().insert(address);
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[async_trait]
impl ChainRpc for StubChain {
    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcManagerError> {
        Ok([9u8; 32])
    }

    async fn get_balance(&self, _address: &Address) -> Result<u64, RpcManagerError> {
        Ok(WALLET_BALANCE)
    }

    async fn get_token_balance(
        &self,
        _owner: &Address,
        _mint: &Address,
    ) -> Result<u64, RpcManagerError> {
        Ok(1_000)
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<String, RpcManagerError> {
        let bytes = tx.as_bytes();
        let rejected = self
            .rejected
            .lock()
            .unwrap()
            .iter()
            .any(|address| contains(bytes, address.as_bytes()));
        if rejected {
            return Err(RpcManagerError::RpcResponse {
                endpoint: "stub".to_string(),
                message: "Transaction simulation failed".to_string(),
                code: Some(-32002),
            });
        }
        self.sent.lock().unwrap().push(bytes.to_vec());
        Ok(tx.signature_base58())
    }
}

/// Aggregator stub returning a one-slot versioned transaction per swap
#[derive(Default)]
struct StubAggregator {
    quotes: AtomicUsize,
    swaps: AtomicUsize,
}

#[async_trait]
impl SwapAggregator for StubAggregator {
    async fn quote(&self, request: &QuoteRequest) -> Result<ExternalOpaque, SwapError> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        Ok(ExternalOpaque::new(json!({
            "inputMint": request.input_mint.to_string(),
            "outputMint": request.output_mint.to_string(),
            "inAmount": request.amount.to_string(),
            "outAmount": "777",
            "slippageBps": request.slippage_bps,
        })))
    }

    async fn build_swap_transaction(
        &self,
        _quote: &ExternalOpaque,
        signer: &Address,
        _priority_fee: PriorityFee,
    ) -> Result<Vec<u8>, SwapError> {
        self.swaps.fetch_add(1, Ordering::SeqCst);
        let mut tx = vec![0x80, 1];
        tx.extend_from_slice(&[0u8; 64]);
        tx.extend_from_slice(signer.as_bytes());
        tx.extend_from_slice(&[0xCD; 24]);
        Ok(tx)
    }
}

fn engine(chain: Arc<StubChain>, aggregator: Arc<StubAggregator>) -> BundleEngine {
    let config = EngineConfig {
        batch_size: 4,
        ..EngineConfig::default()
    };
    BundleEngine::new(chain, aggregator, config, Notifier::new(None)).unwrap()
}

#[tokio::test]
async fn test_full_session_flow() {
    let chain = Arc::new(StubChain::default());
    let aggregator = Arc::new(StubAggregator::default());
    let engine = engine(Arc::clone(&chain), Arc::clone(&aggregator));

    let generated = engine.generate_wallets(10).unwrap();
    assert_eq!(generated.wallets.len(), 10);
    let session_id = generated.session_id;

    // One wallet cannot receive funds
    let blocked = generated.wallets[6].public_key;
    chain.reject(blocked);

    let source = Keypair::from_seed(&[11u8; 32]);
    let funded = engine
        .fund_wallets(session_id, &source.to_base58(), 0.05)
        .await
        .unwrap();
    assert_eq!(funded.len(), 10);
    assert_eq!(funded.iter().filter(|r| r.success).count(), 9);
    let failed = funded.iter().find(|r| !r.success).unwrap();
    assert_eq!(failed.wallet_index, 6);
    assert_eq!(failed.failure, Some(FailureKind::RpcError));
    assert_eq!(chain.sent_count(), 9);

    // Results come back in wallet order with matching keys
    for (result, wallet) in funded.iter().zip(&generated.wallets) {
        assert_eq!(result.wallet_index, wallet.index);
        assert_eq!(result.public_key, wallet.public_key);
    }

    let snapshot = engine.session(session_id).unwrap();
    assert_eq!(snapshot.status, SessionStatus::Funded);
    assert_eq!(snapshot.funding_wallet, Some(source.address()));

    let bought = engine
        .buy_asset(session_id, &ASSET.to_string(), Some(0.01))
        .await
        .unwrap();
    assert_eq!(bought.len(), 10);
    assert_eq!(bought.iter().filter(|r| r.success).count(), 9);
    assert_eq!(aggregator.quotes.load(Ordering::SeqCst), 10);
    assert_eq!(aggregator.swaps.load(Ordering::SeqCst), 10);

    let snapshot = engine.session(session_id).unwrap();
    assert_eq!(snapshot.status, SessionStatus::Bought);
    assert_eq!(snapshot.target_asset, Some(ASSET));

    let sold = engine.sell_all(session_id).await.unwrap();
    assert_eq!(sold.iter().filter(|r| r.success).count(), 9);
    assert_eq!(engine.session(session_id).unwrap().status, SessionStatus::Sold);

    // 9 transfers + 9 buys + 9 sells
    assert_eq!(chain.sent_count(), 27);

    let listed = engine.list_sessions();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, session_id);
}

#[tokio::test]
async fn test_session_results_serialize_without_secrets() {
    let chain = Arc::new(StubChain::default());
    let aggregator = Arc::new(StubAggregator::default());
    let engine = engine(chain, aggregator);

    let generated = engine.generate_wallets(2).unwrap();
    let secret = generated.wallets[0].private_key.clone();

    let source = Keypair::from_seed(&[12u8; 32]);
    let funded = engine
        .fund_wallets(generated.session_id, &source.to_base58(), 0.01)
        .await
        .unwrap();

    let results = serde_json::to_string(&funded).unwrap();
    assert!(results.contains("walletIndex"));
    assert!(results.contains("txSignature"));
    assert!(!results.contains(&secret));

    let snapshot = serde_json::to_string(&engine.session(generated.session_id).unwrap()).unwrap();
    assert!(!snapshot.contains(&secret));
    assert!(!format!("{:?}", generated.wallets[0]).contains(&secret));
}

#[tokio::test]
async fn test_operations_on_unknown_session() {
    let engine = engine(
        Arc::new(StubChain::default()),
        Arc::new(StubAggregator::default()),
    );
    let missing = uuid::Uuid::new_v4();

    assert!(matches!(
        engine.sell_all(missing).await,
        Err(EngineError::Session(_))
    ));
    assert!(matches!(
        engine.buy_asset(missing, &ASSET.to_string(), None).await,
        Err(EngineError::Session(_))
    ));
    assert!(engine.session(missing).is_err());
}
