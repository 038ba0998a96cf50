use anyhow::Result;
use tracing::warn;

use crate::engine::{SettlementState, System, SystemContext};

/// Credits net income (income minus upkeep) to the policy's currency. Runs
/// under both tick policies; a passive policy without a currency skips it.
pub struct IncomeSystem;

impl IncomeSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IncomeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for IncomeSystem {
    fn name(&self) -> &str {
        "income"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut SettlementState) -> Result<()> {
        let Some(currency) = ctx.policy.income_currency() else {
            return Ok(());
        };
        let income = state.ledger.stat(ctx.catalog.income_stat()).unwrap_or(0);
        let upkeep = state.ledger.stat(ctx.catalog.upkeep_stat()).unwrap_or(0);
        let net = income.saturating_sub(upkeep);
        if net > 0 {
            state.ledger.credit_resource(currency, net)?;
        } else if net < 0 {
            let owed = net.saturating_neg();
            let taken = state.ledger.debit_saturating(currency, owed)?;
            if taken < owed {
                warn!(
                    tick = ctx.tick,
                    resource = currency,
                    owed,
                    taken,
                    "upkeep exceeds treasury; balance held at floor"
                );
            }
        }
        Ok(())
    }
}
