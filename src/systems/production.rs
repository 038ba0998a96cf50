use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

use crate::{
    catalog::Catalog,
    engine::{SettlementState, System, SystemContext},
    ledger::LedgerError,
};

/// Output of every complete structure: its own `produces` table plus the
/// yields of the terrain under its footprint.
pub(crate) fn collect(
    catalog: &Catalog,
    state: &mut SettlementState,
) -> Result<BTreeMap<String, i64>, LedgerError> {
    let mut gained: BTreeMap<String, i64> = BTreeMap::new();
    for structure in state.registry.iter().filter(|s| s.is_complete()) {
        let Ok(building) = catalog.lookup_building(structure.kind) else {
            continue;
        };
        for (resource, amount) in &building.produces {
            let total = gained.entry(resource.clone()).or_insert(0);
            *total = total.saturating_add(*amount);
        }
        let terrain = structure
            .footprint
            .iter()
            .filter_map(|pos| state.grid.tile_at(*pos))
            .filter_map(|tile| catalog.lookup_terrain(tile.terrain).ok());
        for data in terrain {
            for (resource, amount) in &data.yields {
                let total = gained.entry(resource.clone()).or_insert(0);
                *total = total.saturating_add(*amount);
            }
        }
    }
    gained.retain(|_, amount| *amount > 0);
    for (resource, amount) in &gained {
        state.ledger.credit_resource(resource, *amount)?;
    }
    Ok(gained)
}

pub struct ProductionSystem;

impl ProductionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProductionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for ProductionSystem {
    fn name(&self) -> &str {
        "production"
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut SettlementState) -> Result<()> {
        let gained = collect(ctx.catalog, state)?;
        if !gained.is_empty() {
            debug!(tick = ctx.tick, ?gained, "production collected");
        }
        Ok(())
    }
}
