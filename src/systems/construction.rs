use anyhow::Result;

use crate::engine::{SettlementState, System, SystemContext};

/// Moves every pending structure forward by the policy's fixed increment.
pub struct ConstructionSystem;

impl ConstructionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConstructionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ConstructionSystem {
    fn name(&self) -> &str {
        "construction"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut SettlementState) -> Result<()> {
        let step = ctx.policy.progress_per_tick();
        let completed = state
            .registry
            .advance_all(ctx.catalog, &mut state.ledger, step);
        state.completed.extend(completed);
        Ok(())
    }
}
