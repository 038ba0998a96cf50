use anyhow::Result;

use crate::{
    catalog::Catalog,
    config::{LevelPolicy, TickPolicy},
    ledger::Ledger,
    registry::{BuildingRegistry, StructureId},
    world::WorldGrid,
};

mod settlement;

pub use settlement::{
    ConfigError, LedgerDrift, Selection, SelectionError, Settlement, StatDrift, TickError,
};

/// Passive accrual parameters that change at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualRate {
    pub resource: String,
    pub rate: i64,
    pub upgrade_level: u32,
}

/// Mutable simulation state the tick pipeline works on. Fields are readable
/// by every system; mutation goes through the ledger and registry APIs.
#[derive(Debug, Clone)]
pub struct SettlementState {
    pub(crate) grid: WorldGrid,
    pub(crate) ledger: Ledger,
    pub(crate) registry: BuildingRegistry,
    pub(crate) accrual: Option<AccrualRate>,
    pub(crate) completed: Vec<StructureId>,
}

impl SettlementState {
    pub fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn registry(&self) -> &BuildingRegistry {
        &self.registry
    }

    pub fn accrual(&self) -> Option<&AccrualRate> {
        self.accrual.as_ref()
    }

    /// Structures that completed during the tick in progress.
    pub fn completed(&self) -> &[StructureId] {
        &self.completed
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub catalog: &'a Catalog,
    pub policy: &'a TickPolicy,
    pub level: &'a LevelPolicy,
    pub settlement_name: &'a str,
}

/// One stage of the tick pipeline.
pub trait System: Send {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, state: &mut SettlementState) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct TickSummary {
    pub tick: u64,
    pub level: u32,
    pub completed: Vec<StructureId>,
    pub system_reports: Vec<SystemRunReport>,
}
