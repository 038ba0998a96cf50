use anyhow::Result;
use tracing::info;

use crate::{
    config::LevelPolicy,
    engine::{SettlementState, System, SystemContext},
};

/// Applies the level policy. Returns the new level when it went up.
pub(crate) fn settle_level(policy: &LevelPolicy, tick: u64, state: &mut SettlementState) -> Option<u32> {
    let target = match policy {
        LevelPolicy::StructureCount { per_level } => {
            LevelPolicy::level_for_count(*per_level, state.registry.len())
        }
        LevelPolicy::Elapsed { every_ticks } => LevelPolicy::level_for_ticks(*every_ticks, tick),
    };
    if state.ledger.raise_level(target) {
        info!(level = target, tick, "settlement level raised");
        Some(target)
    } else {
        None
    }
}

pub struct LevelSystem;

impl LevelSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LevelSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for LevelSystem {
    fn name(&self) -> &str {
        "level"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut SettlementState) -> Result<()> {
        settle_level(ctx.level, ctx.tick, state);
        Ok(())
    }
}
