//! Shared settlement handle and the passive accrual timer.
//!
//! Player actions and the timer serialize on one mutex. The timer task keeps
//! only a weak reference and the epoch it was started under; `stop_accrual`
//! bumps the epoch while holding the lock, so no fire can land after it
//! returns.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::engine::{ConfigError, Settlement};
use crate::ledger::Shortfall;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccrualError {
    #[error("passive accrual needs a running tokio runtime")]
    NoRuntime,
    #[error("settlement does not use the passive tick policy")]
    NotPassive,
    #[error("tick policy defines no accrual upgrade")]
    NoUpgrade,
    #[error(transparent)]
    InsufficientResources(#[from] Shortfall),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Accrual(#[from] AccrualError),
}

/// Owned handle to a spawned accrual task. Dropping it aborts the task.
#[derive(Debug)]
pub struct AccrualTimer {
    handle: JoinHandle<()>,
}

impl Drop for AccrualTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[derive(Debug, Clone)]
pub struct SharedSettlement {
    inner: Arc<Mutex<Settlement>>,
}

impl SharedSettlement {
    pub fn new(settlement: Settlement) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settlement)),
        }
    }

    /// Builds a settlement and starts its tick policy. Passive settlements
    /// begin accruing immediately, so this must run inside a tokio runtime
    /// for them; turn-based ones wait for `advance_tick`.
    pub fn initialize(
        player_name: &str,
        settlement_name: &str,
        catalog: Arc<Catalog>,
        config: EngineConfig,
    ) -> Result<Self, StartError> {
        let passive = config.tick.is_passive();
        let shared = Self::new(Settlement::initialize(
            player_name,
            settlement_name,
            catalog,
            config,
        )?);
        if passive {
            shared.start_accrual()?;
        }
        Ok(shared)
    }

    /// Every mutation is validated before it is applied, so a panic while
    /// the lock was held cannot leave half-applied state behind.
    pub fn lock(&self) -> MutexGuard<'_, Settlement> {
        lock(&self.inner)
    }

    /// Starts the accrual timer on the current tokio runtime. A second call
    /// while the timer runs does nothing.
    pub fn start_accrual(&self) -> Result<(), AccrualError> {
        let mut settlement = self.lock();
        let period = settlement.accrual_period().ok_or(AccrualError::NotPassive)?;
        if settlement.accrual_timer.is_some() {
            return Ok(());
        }
        let runtime = Handle::try_current().map_err(|_| AccrualError::NoRuntime)?;
        let epoch = settlement.accrual_epoch;
        let weak = Arc::downgrade(&self.inner);
        let handle = runtime.spawn(run_accrual(weak, epoch, period));
        settlement.accrual_timer = Some(AccrualTimer { handle });
        info!(
            settlement = settlement.settlement_name(),
            interval_ms = period.as_millis() as u64,
            "accrual started"
        );
        Ok(())
    }

    /// Stops the timer. Takes effect before returning; repeated calls are
    /// harmless.
    pub fn stop_accrual(&self) {
        let mut settlement = self.lock();
        settlement.accrual_epoch = settlement.accrual_epoch.wrapping_add(1);
        if settlement.accrual_timer.take().is_some() {
            info!(settlement = settlement.settlement_name(), "accrual stopped");
        }
    }

    pub fn is_accruing(&self) -> bool {
        self.lock().is_accruing()
    }
}

fn lock(inner: &Mutex<Settlement>) -> MutexGuard<'_, Settlement> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_accrual(weak: Weak<Mutex<Settlement>>, epoch: u64, period: Duration) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(shared) = weak.upgrade() else {
            break;
        };
        let keep_running = {
            let mut settlement = lock(&shared);
            if settlement.accrual_epoch != epoch {
                false
            } else {
                if let Err(err) = settlement.accrue() {
                    warn!(%err, "accrual tick failed");
                }
                true
            }
        };
        if !keep_running {
            break;
        }
    }
}
