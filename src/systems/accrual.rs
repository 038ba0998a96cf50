use anyhow::Result;

use crate::engine::{SettlementState, System, SystemContext};

/// Credits the passive per-interval rate.
pub struct AccrualSystem;

impl AccrualSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AccrualSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AccrualSystem {
    fn name(&self) -> &str {
        "accrual"
    }

    fn run(&mut self, _ctx: &SystemContext, state: &mut SettlementState) -> Result<()> {
        if let Some(accrual) = &state.accrual {
            if accrual.rate > 0 {
                state.ledger.credit_resource(&accrual.resource, accrual.rate)?;
            }
        }
        Ok(())
    }
}
