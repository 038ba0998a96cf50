use anyhow::Result;
use tracing::debug;

use crate::{
    config::TickPolicy,
    engine::{SettlementState, System, SystemContext},
};

/// Draws the turn consumable in proportion to a population stat. The
/// consumable may be declared without a floor, in which case it can go
/// negative; there is no starvation effect.
pub struct ConsumptionSystem;

impl ConsumptionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsumptionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ConsumptionSystem {
    fn name(&self) -> &str {
        "consumption"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut SettlementState) -> Result<()> {
        let TickPolicy::Turn(turn) = ctx.policy else {
            return Ok(());
        };
        let Some(consumption) = &turn.consumption else {
            return Ok(());
        };
        let population = state.ledger.stat(&consumption.per_stat).unwrap_or(0).max(0);
        let draw = population.saturating_mul(consumption.rate);
        if draw == 0 {
            return Ok(());
        }
        let taken = state.ledger.debit_saturating(&consumption.resource, draw)?;
        debug!(
            tick = ctx.tick,
            resource = %consumption.resource,
            draw,
            taken,
            "consumable drawn"
        );
        Ok(())
    }
}
