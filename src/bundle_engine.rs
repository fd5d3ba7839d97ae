//! Bundle engine: batch execution over a session's wallets
//!
//! Funding, buying and selling each walk the session's wallets in fixed-size
//! batches. Every wallet in a batch runs in its own task; the next batch
//! starts only after all tasks of the current one have settled. A wallet's
//! error is captured into its [`BatchResult`] and never aborts siblings.
//!
//! Only configuration problems (unknown session, bad source key, invalid
//! amount, illegal status transition) escape a batch call as `Err`.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::{metrics, Timer};
use crate::notify::Notifier;
use crate::observability::OperationContext;
use crate::rpc_manager::{ChainRpc, RpcManagerError};
use crate::session::{
    Session, SessionError, SessionSnapshot, SessionStatus, SessionStore, WalletRecord,
};
use crate::swap::{PriorityFee, QuoteRequest, SwapAggregator, SwapError, SOL_MINT};
use crate::tx_builder::{
    build_transfer, lamports_from_sol, sign_versioned, CryptoError, EncodingError,
    TransactionBuilderError,
};
use crate::types::{
    success_count, BatchResult, CycleOutcome, FailureKind, GeneratedSession, WalletExport,
};
use crate::wallet::{Address, Keypair};

/// Most sessions returned by [`BundleEngine::list_sessions`]
pub const SESSION_LIST_LIMIT: usize = 10;

/// Engine error types
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid source key: {0}")]
    InvalidSourceKey(CryptoError),

    /// Balance at or below the fee reserve
    #[error("InsufficientBalance")]
    InsufficientBalance { balance: u64, required: u64 },

    #[error("No tokens to sell")]
    NoTokensToSell,

    #[error(transparent)]
    Rpc(#[from] RpcManagerError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Transaction(#[from] TransactionBuilderError),

    #[error("Wallet task failed: {0}")]
    TaskFailed(String),
}

impl From<EncodingError> for EngineError {
    fn from(err: EncodingError) -> Self {
        EngineError::Transaction(err.into())
    }
}

impl EngineError {
    /// Structured reason recorded on a failed [`BatchResult`]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            EngineError::InsufficientBalance { .. } => FailureKind::InsufficientBalance,
            EngineError::NoTokensToSell => FailureKind::NoTokensToSell,
            EngineError::Swap(SwapError::NoRouteAvailable { .. }) => FailureKind::NoRouteAvailable,
            EngineError::Swap(SwapError::AllEndpointsFailed { .. })
            | EngineError::Rpc(RpcManagerError::AllEndpointsFailed { .. }) => {
                FailureKind::AllEndpointsFailed
            }
            EngineError::Rpc(RpcManagerError::RpcResponse { .. }) => FailureKind::RpcError,
            EngineError::Rpc(_) | EngineError::Swap(_) => FailureKind::Network,
            EngineError::Transaction(TransactionBuilderError::Encoding(_)) => FailureKind::Encoding,
            EngineError::Transaction(TransactionBuilderError::Crypto(_))
            | EngineError::InvalidSourceKey(_) => FailureKind::Crypto,
            EngineError::Configuration(_) | EngineError::Session(_) | EngineError::TaskFailed(_) => {
                FailureKind::TaskFailed
            }
        }
    }

    /// Get the error category for metrics and observability
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) | EngineError::Session(_) => "configuration",
            other => other.failure_kind().as_str(),
        }
    }

    /// Low-balance, no-route and nothing-to-sell are normal outcomes
    pub fn is_expected(&self) -> bool {
        self.failure_kind().is_expected()
    }
}

/// Batch engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wallets processed concurrently per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_wallets_per_session")]
    pub wallets_per_session: usize,

    /// Lamports left in each wallet for fees when buying with the full balance
    #[serde(default = "default_fee_reserve_lamports")]
    pub fee_reserve_lamports: u64,

    #[serde(default = "default_buy_slippage_bps")]
    pub buy_slippage_bps: u16,

    /// Wider than buys so that unwinding rarely fails on price movement
    #[serde(default = "default_sell_slippage_bps")]
    pub sell_slippage_bps: u16,

    #[serde(default = "default_base_mint")]
    pub base_mint: Address,

    /// Taken from the swap section of the configuration file
    #[serde(skip)]
    pub priority_fee: PriorityFee,
}

fn default_batch_size() -> usize {
    5
}

fn default_wallets_per_session() -> usize {
    25
}

fn default_fee_reserve_lamports() -> u64 {
    5_000_000
}

fn default_buy_slippage_bps() -> u16 {
    500
}

fn default_sell_slippage_bps() -> u16 {
    5_000
}

fn default_base_mint() -> Address {
    SOL_MINT.parse().unwrap_or_default()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            wallets_per_session: default_wallets_per_session(),
            fee_reserve_lamports: default_fee_reserve_lamports(),
            buy_slippage_bps: default_buy_slippage_bps(),
            sell_slippage_bps: default_sell_slippage_bps(),
            base_mint: default_base_mint(),
            priority_fee: PriorityFee::Auto,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch_size == 0 {
            return Err(EngineError::Configuration("batch_size must be > 0".to_string()));
        }
        if self.wallets_per_session == 0 {
            return Err(EngineError::Configuration(
                "wallets_per_session must be > 0".to_string(),
            ));
        }
        for (name, bps) in [
            ("buy_slippage_bps", self.buy_slippage_bps),
            ("sell_slippage_bps", self.sell_slippage_bps),
        ] {
            if bps > 10_000 {
                return Err(EngineError::Configuration(format!(
                    "{} must be <= 10000, got {}",
                    name, bps
                )));
            }
        }
        Ok(())
    }
}

/// Parameters of one automated buy-then-sell cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleParams {
    pub buy_lamports: u64,
    /// Applied to both legs
    pub slippage_bps: u16,
    pub priority_fee: PriorityFee,
    pub settle_delay_min_ms: u64,
    pub settle_delay_max_ms: u64,
}

impl CycleParams {
    /// Uniform in `[min, max)`; `min` when the window is empty
    pub fn settle_delay(&self) -> Duration {
        let ms = if self.settle_delay_max_ms > self.settle_delay_min_ms {
            fastrand::u64(self.settle_delay_min_ms..self.settle_delay_max_ms)
        } else {
            self.settle_delay_min_ms
        };
        Duration::from_millis(ms)
    }
}

/// Single-wallet operations: one quote/build/sign/submit or
/// blockhash/encode/sign/submit sequence each
#[derive(Clone)]
pub struct WalletExecutor {
    rpc: Arc<dyn ChainRpc>,
    swap: Arc<dyn SwapAggregator>,
    config: Arc<EngineConfig>,
}

impl WalletExecutor {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        swap: Arc<dyn SwapAggregator>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { rpc, swap, config }
    }

    pub fn rpc(&self) -> &Arc<dyn ChainRpc> {
        &self.rpc
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Native transfer from `source` to `recipient`
    pub async fn transfer(
        &self,
        source: &Keypair,
        recipient: &Address,
        lamports: u64,
    ) -> Result<String, EngineError> {
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = build_transfer(source, &recipient.to_string(), lamports, &blockhash)?;
        let signature = self.rpc.send_transaction(&tx).await?;
        debug!(%signature, lamports, "Transfer submitted");
        Ok(signature)
    }

    /// Quote, build, sign and submit one aggregator swap
    pub async fn swap(
        &self,
        keypair: &Keypair,
        input_mint: Address,
        output_mint: Address,
        amount: u64,
        slippage_bps: u16,
        priority_fee: PriorityFee,
    ) -> Result<String, EngineError> {
        let signer = keypair.address();
        let quote = self
            .swap
            .quote(&QuoteRequest {
                input_mint,
                output_mint,
                amount,
                slippage_bps,
            })
            .await?;

        let unsigned = self
            .swap
            .build_swap_transaction(&quote, &signer, priority_fee)
            .await?;

        let tx = sign_versioned(unsigned, keypair)?;
        let signature = self.rpc.send_transaction(&tx).await?;
        debug!(%signature, amount, "Swap submitted");
        Ok(signature)
    }

    /// Buy `asset` with a fixed amount, or with everything above the fee
    /// reserve when `fixed_lamports` is `None`
    pub async fn buy(
        &self,
        keypair: &Keypair,
        asset: Address,
        fixed_lamports: Option<u64>,
    ) -> Result<String, EngineError> {
        let amount = match fixed_lamports {
            Some(amount) => amount,
            None => {
                let balance = self.rpc.get_balance(&keypair.address()).await?;
                let reserve = self.config.fee_reserve_lamports;
                if balance <= reserve {
                    return Err(EngineError::InsufficientBalance {
                        balance,
                        required: reserve,
                    });
                }
                balance - reserve
            }
        };

        self.swap(
            keypair,
            self.config.base_mint,
            asset,
            amount,
            self.config.buy_slippage_bps,
            self.config.priority_fee,
        )
        .await
    }

    /// Sell the wallet's whole balance of `asset` back to the base asset
    pub async fn sell(&self, keypair: &Keypair, asset: Address) -> Result<String, EngineError> {
        self.sell_with(
            keypair,
            asset,
            self.config.sell_slippage_bps,
            self.config.priority_fee,
        )
        .await
    }

    async fn sell_with(
        &self,
        keypair: &Keypair,
        asset: Address,
        slippage_bps: u16,
        priority_fee: PriorityFee,
    ) -> Result<String, EngineError> {
        let tokens = self
            .rpc
            .get_token_balance(&keypair.address(), &asset)
            .await?;
        if tokens == 0 {
            return Err(EngineError::NoTokensToSell);
        }

        self.swap(
            keypair,
            asset,
            self.config.base_mint,
            tokens,
            slippage_bps,
            priority_fee,
        )
        .await
    }

    /// Buy, wait a jittered settle delay, then sell what was received
    ///
    /// A failed sell still reports the buy-side volume as `BuyOnly`.
    pub async fn buy_then_sell_cycle(
        &self,
        keypair: &Keypair,
        asset: Address,
        params: &CycleParams,
    ) -> CycleOutcome {
        let buy_signature = match self
            .swap(
                keypair,
                self.config.base_mint,
                asset,
                params.buy_lamports,
                params.slippage_bps,
                params.priority_fee,
            )
            .await
        {
            Ok(signature) => signature,
            Err(err) => {
                warn!(error = %err, "Cycle buy failed");
                return CycleOutcome::Failed {
                    error: err.to_string(),
                    kind: err.failure_kind(),
                };
            }
        };

        let delay = params.settle_delay();
        debug!(delay_ms = delay.as_millis() as u64, "Waiting before sell");
        tokio::time::sleep(delay).await;

        match self
            .sell_with(keypair, asset, params.slippage_bps, params.priority_fee)
            .await
        {
            Ok(sell_signature) => CycleOutcome::Complete {
                buy_signature,
                sell_signature,
            },
            Err(EngineError::NoTokensToSell) => CycleOutcome::Failed {
                error: EngineError::NoTokensToSell.to_string(),
                kind: FailureKind::NoTokensToSell,
            },
            Err(err) => {
                warn!(error = %err, "Cycle sell failed, keeping buy-side volume");
                CycleOutcome::BuyOnly {
                    buy_signature,
                    sell_error: err.to_string(),
                }
            }
        }
    }
}

/// Batch execution coordinator
pub struct BundleEngine {
    executor: WalletExecutor,
    sessions: SessionStore,
    notifier: Notifier,
}

impl BundleEngine {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        swap: Arc<dyn SwapAggregator>,
        config: EngineConfig,
        notifier: Notifier,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            executor: WalletExecutor::new(rpc, swap, Arc::new(config)),
            sessions: SessionStore::new(),
            notifier,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.executor.config()
    }

    pub fn executor(&self) -> &WalletExecutor {
        &self.executor
    }

    /// Create a session with `count` fresh wallets
    ///
    /// This is the only call that returns private keys.
    pub fn generate_wallets(&self, count: usize) -> Result<GeneratedSession, EngineError> {
        if count == 0 {
            return Err(EngineError::Configuration(
                "wallet count must be > 0".to_string(),
            ));
        }

        let records: Vec<WalletRecord> = (0..count)
            .map(|index| WalletRecord::new(index, Keypair::generate()))
            .collect();
        let wallets = records
            .iter()
            .map(|record| WalletExport {
                index: record.index,
                public_key: record.public_key(),
                private_key: record.keypair().to_base58().as_str().to_owned(),
            })
            .collect();

        let session_id = self.sessions.insert(Session::new(records));
        info!(%session_id, wallet_count = count, "Session created");
        self.notifier.notify_session_created(session_id, count);

        Ok(GeneratedSession {
            session_id,
            wallets,
        })
    }

    /// Transfer `sol_per_wallet` from the source key to every wallet
    pub async fn fund_wallets(
        &self,
        session_id: Uuid,
        source_private_key: &str,
        sol_per_wallet: f64,
    ) -> Result<Vec<BatchResult>, EngineError> {
        let source = Keypair::from_base58(source_private_key.trim())
            .map_err(|e| EngineError::InvalidSourceKey(CryptoError::KeyImport(e)))?;
        let lamports = positive_lamports(sol_per_wallet)?;
        let wallets = self.wallets_for(&session_id, SessionStatus::Funded)?;

        let funding_wallet = source.address();
        self.sessions
            .update(&session_id, |s| s.funding_wallet = Some(funding_wallet))?;

        let ctx = OperationContext::new("fund", session_id);
        let source = Arc::new(source);
        let executor = self.executor.clone();
        let results = self
            .run_batches(&ctx, &wallets, move |wallet| {
                let executor = executor.clone();
                let source = Arc::clone(&source);
                async move {
                    executor
                        .transfer(&source, &wallet.public_key(), lamports)
                        .await
                }
            })
            .instrument(ctx.span())
            .await;

        self.sessions.transition(&session_id, SessionStatus::Funded)?;
        Ok(results)
    }

    /// Swap the base asset into `asset_address` from every wallet
    pub async fn buy_asset(
        &self,
        session_id: Uuid,
        asset_address: &str,
        sol_per_wallet: Option<f64>,
    ) -> Result<Vec<BatchResult>, EngineError> {
        let asset: Address = asset_address
            .trim()
            .parse()
            .map_err(|e| EngineError::Configuration(format!("Invalid asset address: {}", e)))?;
        let fixed = sol_per_wallet.map(positive_lamports).transpose()?;
        let wallets = self.wallets_for(&session_id, SessionStatus::Buying)?;

        self.sessions.transition(&session_id, SessionStatus::Buying)?;
        self.sessions
            .update(&session_id, |s| s.target_asset = Some(asset))?;

        let ctx = OperationContext::new("buy", session_id);
        let executor = self.executor.clone();
        let results = self
            .run_batches(&ctx, &wallets, move |wallet| {
                let executor = executor.clone();
                async move { executor.buy(wallet.keypair(), asset, fixed).await }
            })
            .instrument(ctx.span())
            .await;

        self.sessions.transition(&session_id, SessionStatus::Bought)?;
        Ok(results)
    }

    /// Sell every wallet's balance of the session's target asset
    pub async fn sell_all(&self, session_id: Uuid) -> Result<Vec<BatchResult>, EngineError> {
        let asset = self
            .sessions
            .target_asset(&session_id)?
            .ok_or_else(|| EngineError::Configuration("No token address set".to_string()))?;
        let wallets = self.wallets_for(&session_id, SessionStatus::Selling)?;

        self.sessions.transition(&session_id, SessionStatus::Selling)?;

        let ctx = OperationContext::new("sell", session_id);
        let executor = self.executor.clone();
        let results = self
            .run_batches(&ctx, &wallets, move |wallet| {
                let executor = executor.clone();
                async move { executor.sell(wallet.keypair(), asset).await }
            })
            .instrument(ctx.span())
            .await;

        self.sessions.transition(&session_id, SessionStatus::Sold)?;
        Ok(results)
    }

    /// One automated buy-then-sell cycle for a single wallet
    pub async fn buy_then_sell_cycle(
        &self,
        wallet: &Keypair,
        asset: Address,
        params: &CycleParams,
    ) -> CycleOutcome {
        self.executor
            .buy_then_sell_cycle(wallet, asset, params)
            .await
    }

    pub fn session(&self, session_id: Uuid) -> Result<SessionSnapshot, EngineError> {
        Ok(self.sessions.snapshot(&session_id)?)
    }

    /// Newest first, at most [`SESSION_LIST_LIMIT`]
    pub fn list_sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions.list(SESSION_LIST_LIMIT)
    }

    /// Session wallets, after checking that `next` is reachable
    fn wallets_for(
        &self,
        session_id: &Uuid,
        next: SessionStatus,
    ) -> Result<Arc<Vec<WalletRecord>>, EngineError> {
        let current = self.sessions.status(session_id)?;
        if !current.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: current,
                to: next,
            }
            .into());
        }

        let wallets = self.sessions.wallets(session_id)?;
        if wallets.is_empty() {
            return Err(EngineError::Configuration("No wallets found".to_string()));
        }
        Ok(wallets)
    }

    /// Run `op` for every wallet, `batch_size` tasks at a time
    async fn run_batches<F, Fut>(
        &self,
        ctx: &OperationContext,
        wallets: &[WalletRecord],
        op: F,
    ) -> Vec<BatchResult>
    where
        F: Fn(WalletRecord) -> Fut,
        Fut: Future<Output = Result<String, EngineError>> + Send + 'static,
    {
        let batch_size = self.config().batch_size.max(1);
        let mut results = Vec::with_capacity(wallets.len());

        for (batch_index, batch) in wallets.chunks(batch_size).enumerate() {
            let timer = Timer::new();
            let handles: Vec<_> = batch
                .iter()
                .map(|wallet| {
                    let span = info_span!(
                        "wallet",
                        wallet_index = wallet.index,
                        wallet = %wallet.public_key()
                    );
                    tokio::spawn(op(wallet.clone()).instrument(span))
                })
                .collect();

            // Settle the whole batch before starting the next one
            let settled = join_all(handles).await;

            for (wallet, outcome) in batch.iter().zip(settled) {
                let result = match outcome {
                    Ok(Ok(signature)) => {
                        BatchResult::succeeded(wallet.index, wallet.public_key(), signature)
                    }
                    Ok(Err(err)) => {
                        if err.is_expected() {
                            info!(wallet_index = wallet.index, reason = %err, "Wallet skipped");
                        } else {
                            warn!(
                                wallet_index = wallet.index,
                                error = %err,
                                category = err.category(),
                                "Wallet operation failed"
                            );
                        }
                        BatchResult::failed(
                            wallet.index,
                            wallet.public_key(),
                            err.to_string(),
                            err.failure_kind(),
                        )
                    }
                    Err(join_err) => {
                        warn!(wallet_index = wallet.index, error = %join_err, "Wallet task aborted");
                        let err = EngineError::TaskFailed(join_err.to_string());
                        BatchResult::failed(
                            wallet.index,
                            wallet.public_key(),
                            err.to_string(),
                            err.failure_kind(),
                        )
                    }
                };

                let outcome = result.failure.map_or("success", FailureKind::as_str);
                metrics().record_wallet_operation(ctx.operation, outcome);
                results.push(result);
            }

            timer.observe_duration(&metrics().batch_duration.with_label_values(&[ctx.operation]));
            debug!(batch_index, batch_len = batch.len(), "Batch settled");
        }

        info!(
            total = results.len(),
            succeeded = success_count(&results),
            "Batch operation finished"
        );
        results
    }
}

/// Caller-supplied SOL amount as non-zero lamports
fn positive_lamports(sol: f64) -> Result<u64, EngineError> {
    let lamports = lamports_from_sol(sol)?;
    if lamports == 0 {
        return Err(EngineError::Configuration(format!(
            "amount must be > 0 lamports, got {} SOL",
            sol
        )));
    }
    Ok(lamports)
}
