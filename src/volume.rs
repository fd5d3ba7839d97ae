//! Automated volume sessions
//!
//! A volume session repeatedly buys a small fixed amount of an asset from
//! one wallet and sells it back after a jittered delay. Counters are only
//! touched after a cycle completes, with atomic adds; `is_active` is
//! checked between cycles, never inside one.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::bundle_engine::{CycleParams, EngineError, WalletExecutor};
use crate::metrics::metrics;
use crate::notify::Notifier;
use crate::rpc_manager::RpcManagerError;
use crate::swap::PriorityFee;
use crate::tx_builder::{lamports_from_sol, LAMPORTS_PER_SOL};
use crate::types::CycleOutcome;
use crate::wallet::{Address, Keypair};

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("Trade size must be {min}-{max} SOL, got {got}")]
    TradeSizeOutOfRange { got: f64, min: f64, max: f64 },

    #[error("InsufficientBalance: need {required} lamports, have {balance}")]
    InsufficientBalance { balance: u64, required: u64 },

    #[error("Volume session is not running")]
    NotRunning,

    #[error("Volume session is already running")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Rpc(#[from] RpcManagerError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Volume session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConfig {
    #[serde(default = "default_min_trade_sol")]
    pub min_trade_sol: f64,

    #[serde(default = "default_max_trade_sol")]
    pub max_trade_sol: f64,

    /// Delay between cycles
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,

    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    /// Delay between the buy and sell legs of one cycle
    #[serde(default = "default_settle_delay_min_ms")]
    pub settle_delay_min_ms: u64,

    #[serde(default = "default_settle_delay_max_ms")]
    pub settle_delay_max_ms: u64,

    #[serde(default = "default_max_cycles")]
    pub max_cycles: u64,

    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    #[serde(default = "default_priority_fee_lamports")]
    pub priority_fee_lamports: u64,
}

fn default_min_trade_sol() -> f64 {
    0.001
}

fn default_max_trade_sol() -> f64 {
    0.01
}

fn default_min_interval_secs() -> u64 {
    30
}

fn default_max_interval_secs() -> u64 {
    120
}

fn default_settle_delay_min_ms() -> u64 {
    3_000
}

fn default_settle_delay_max_ms() -> u64 {
    8_000
}

fn default_max_cycles() -> u64 {
    100
}

fn default_slippage_bps() -> u16 {
    500
}

fn default_priority_fee_lamports() -> u64 {
    300_000
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            min_trade_sol: default_min_trade_sol(),
            max_trade_sol: default_max_trade_sol(),
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            settle_delay_min_ms: default_settle_delay_min_ms(),
            settle_delay_max_ms: default_settle_delay_max_ms(),
            max_cycles: default_max_cycles(),
            slippage_bps: default_slippage_bps(),
            priority_fee_lamports: default_priority_fee_lamports(),
        }
    }
}

impl VolumeConfig {
    pub fn validate(&self) -> Result<(), VolumeError> {
        if !(self.min_trade_sol > 0.0 && self.min_trade_sol <= self.max_trade_sol) {
            return Err(VolumeError::Configuration(format!(
                "invalid trade window {}-{} SOL",
                self.min_trade_sol, self.max_trade_sol
            )));
        }
        if self.min_interval_secs > self.max_interval_secs {
            return Err(VolumeError::Configuration(
                "min_interval_secs must be <= max_interval_secs".to_string(),
            ));
        }
        if self.settle_delay_min_ms > self.settle_delay_max_ms {
            return Err(VolumeError::Configuration(
                "settle_delay_min_ms must be <= settle_delay_max_ms".to_string(),
            ));
        }
        if self.slippage_bps > 10_000 {
            return Err(VolumeError::Configuration(format!(
                "slippage_bps must be <= 10000, got {}",
                self.slippage_bps
            )));
        }
        Ok(())
    }
}

/// Why a session stopped itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PauseReason {
    MaxCyclesReached { cycles: u64 },
    LowBalance { balance: u64, required: u64 },
}

/// Result of one `run_cycle` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    Ran(CycleOutcome),
    Paused(PauseReason),
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeTotals {
    pub cycles_completed: u64,
    pub volume_lamports: u64,
    pub is_active: bool,
}

impl VolumeTotals {
    pub fn volume_sol(&self) -> f64 {
        self.volume_lamports as f64 / LAMPORTS_PER_SOL as f64
    }
}

/// One wallet trading one asset
pub struct VolumeSession {
    id: Uuid,
    wallet: Keypair,
    asset: Address,
    config: VolumeConfig,
    executor: WalletExecutor,
    notifier: Notifier,
    trade_size_lamports: AtomicU64,
    is_active: AtomicBool,
    cycles_completed: AtomicU64,
    volume_lamports: AtomicU64,
    stopped: Notify,
}

impl VolumeSession {
    pub fn new(
        executor: WalletExecutor,
        config: VolumeConfig,
        notifier: Notifier,
        wallet: Keypair,
        asset: Address,
    ) -> Result<Self, VolumeError> {
        config.validate()?;
        let trade_size = lamports_from_sol(config.min_trade_sol).map_err(EngineError::from)?;
        Ok(Self {
            id: Uuid::new_v4(),
            wallet,
            asset,
            config,
            executor,
            notifier,
            trade_size_lamports: AtomicU64::new(trade_size),
            is_active: AtomicBool::new(false),
            cycles_completed: AtomicU64::new(0),
            volume_lamports: AtomicU64::new(0),
            stopped: Notify::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet.address()
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    pub fn trade_size_lamports(&self) -> u64 {
        self.trade_size_lamports.load(Ordering::SeqCst)
    }

    pub fn totals(&self) -> VolumeTotals {
        VolumeTotals {
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            volume_lamports: self.volume_lamports.load(Ordering::SeqCst),
            is_active: self.is_active(),
        }
    }

    /// Accepts only `[min_trade_sol, max_trade_sol]`
    pub fn set_trade_size(&self, sol: f64) -> Result<u64, VolumeError> {
        let (min, max) = (self.config.min_trade_sol, self.config.max_trade_sol);
        if !(sol >= min && sol <= max) {
            return Err(VolumeError::TradeSizeOutOfRange { got: sol, min, max });
        }
        let lamports = lamports_from_sol(sol).map_err(EngineError::from)?;
        self.trade_size_lamports.store(lamports, Ordering::SeqCst);
        Ok(lamports)
    }

    /// Requires a balance of at least twice the trade size
    #[instrument(skip(self), fields(session_id = %self.id, wallet = %self.wallet.address()))]
    pub async fn start(&self) -> Result<(), VolumeError> {
        if self.is_active() {
            return Err(VolumeError::AlreadyRunning);
        }

        let trade_size = self.trade_size_lamports();
        let required = trade_size.saturating_mul(2);
        let balance = self
            .executor
            .rpc()
            .get_balance(&self.wallet.address())
            .await?;
        if balance < required {
            return Err(VolumeError::InsufficientBalance { balance, required });
        }

        if self
            .is_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(VolumeError::AlreadyRunning);
        }
        self.cycles_completed.store(0, Ordering::SeqCst);
        self.volume_lamports.store(0, Ordering::SeqCst);
        metrics().active_volume_sessions.inc();

        info!(trade_size, balance, asset = %self.asset, "Volume session started");
        self.notifier.notify_volume_started(
            &self.wallet.address().to_string(),
            &self.asset.to_string(),
            trade_size as f64 / LAMPORTS_PER_SOL as f64,
        );
        Ok(())
    }

    /// Stop a running session and report its totals
    pub fn stop(&self) -> Result<VolumeTotals, VolumeError> {
        if !self.deactivate() {
            return Err(VolumeError::NotRunning);
        }
        let totals = self.totals();
        info!(
            session_id = %self.id,
            cycles = totals.cycles_completed,
            volume_sol = totals.volume_sol(),
            "Volume session stopped"
        );
        Ok(totals)
    }

    /// `true` if this call flipped the session from active to inactive
    fn deactivate(&self) -> bool {
        let was_active = self.is_active.swap(false, Ordering::SeqCst);
        if was_active {
            metrics().active_volume_sessions.dec();
            self.stopped.notify_waiters();
        }
        was_active
    }

    pub fn cycle_params(&self) -> CycleParams {
        CycleParams {
            buy_lamports: self.trade_size_lamports(),
            slippage_bps: self.config.slippage_bps,
            priority_fee: PriorityFee::Lamports(self.config.priority_fee_lamports),
            settle_delay_min_ms: self.config.settle_delay_min_ms,
            settle_delay_max_ms: self.config.settle_delay_max_ms,
        }
    }

    /// One iteration: pause checks, then a buy-then-sell cycle
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn run_cycle(&self) -> Result<CycleReport, VolumeError> {
        if !self.is_active() {
            return Ok(CycleReport::Inactive);
        }

        let cycles = self.cycles_completed.load(Ordering::SeqCst);
        if cycles >= self.config.max_cycles {
            self.deactivate();
            info!(cycles, "Max cycles reached, pausing");
            return Ok(CycleReport::Paused(PauseReason::MaxCyclesReached { cycles }));
        }

        let params = self.cycle_params();
        let required = params.buy_lamports.saturating_mul(3) / 2;
        let balance = self
            .executor
            .rpc()
            .get_balance(&self.wallet.address())
            .await?;
        if balance < required {
            self.deactivate();
            warn!(balance, required, "Low balance, pausing");
            return Ok(CycleReport::Paused(PauseReason::LowBalance { balance, required }));
        }

        let outcome = self
            .executor
            .buy_then_sell_cycle(&self.wallet, self.asset, &params)
            .await;

        if outcome.is_counted() {
            self.cycles_completed.fetch_add(1, Ordering::SeqCst);
            self.volume_lamports
                .fetch_add(params.buy_lamports.saturating_mul(outcome.legs()), Ordering::SeqCst);
        }
        metrics()
            .volume_cycles
            .with_label_values(&[outcome.label()])
            .inc();

        Ok(CycleReport::Ran(outcome))
    }
}

/// Drives a volume session until it becomes inactive
#[derive(Debug, Clone)]
pub struct VolumeRunner {
    min_interval: Duration,
    max_interval: Duration,
}

impl VolumeRunner {
    pub fn new(config: &VolumeConfig) -> Self {
        Self {
            min_interval: Duration::from_secs(config.min_interval_secs),
            max_interval: Duration::from_secs(config.max_interval_secs),
        }
    }

    /// Uniform in `[min, max)`
    fn next_interval(&self) -> Duration {
        let (min, max) = (self.min_interval.as_millis() as u64, self.max_interval.as_millis() as u64);
        if max > min {
            Duration::from_millis(fastrand::u64(min..max))
        } else {
            self.min_interval
        }
    }

    pub async fn run(&self, session: Arc<VolumeSession>) -> VolumeTotals {
        while session.is_active() {
            match session.run_cycle().await {
                Ok(CycleReport::Ran(outcome)) => {
                    info!(
                        session_id = %session.id(),
                        outcome = outcome.label(),
                        cycles = session.totals().cycles_completed,
                        "Volume cycle finished"
                    );
                }
                Ok(CycleReport::Paused(reason)) => {
                    info!(session_id = %session.id(), ?reason, "Volume session paused");
                    break;
                }
                Ok(CycleReport::Inactive) => break,
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "Volume cycle skipped");
                }
            }

            // Registered before the check so a stop in between still wakes us
            let stopped = session.stopped.notified();
            tokio::pin!(stopped);
            stopped.as_mut().enable();
            if !session.is_active() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.next_interval()) => {}
                _ = &mut stopped => {}
            }
        }
        session.totals()
    }

    /// Like [`run`](Self::run), but stops the session once `shutdown`
    /// resolves. A cycle in flight at that point is finished and counted.
    pub async fn run_until<S>(&self, session: Arc<VolumeSession>, shutdown: S) -> VolumeTotals
    where
        S: Future<Output = ()>,
    {
        let run = self.run(Arc::clone(&session));
        tokio::pin!(run);

        tokio::select! {
            totals = &mut run => totals,
            _ = shutdown => {
                info!(session_id = %session.id(), "Shutdown requested, finishing current cycle");
                if let Err(e) = session.stop() {
                    debug!(session_id = %session.id(), error = %e, "Session already inactive");
                }
                run.await
            }
        }
    }
}
