use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    accrual::{AccrualError, AccrualTimer},
    catalog::{BuildingKind, Catalog, CatalogError},
    config::{EngineConfig, TickPolicy},
    ledger::{Ledger, LedgerError},
    registry::{
        self, BuildingRegistry, Orientation, PlacementError, PlacementRequest, Placer,
        Progress, ProgressError, ProgressOutcome, RemovalError, StructureId,
    },
    snapshot::Snapshot,
    systems::{self, level::settle_level},
    world::{GridError, GridSpec, TilePos, WorldGrid},
};

use super::{AccrualRate, SettlementState, System, SystemContext, SystemRunReport, TickSummary};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} name must not be empty")]
    EmptyName(&'static str),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("invalid tick policy: {0}")]
    TickPolicy(String),
    #[error("starting structure could not be placed: {0}")]
    Starter(#[from] PlacementError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error("the configured tick policy does not drive this operation")]
    WrongPolicy,
    #[error("system '{name}' failed: {message}")]
    System { name: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unknown building kind {0}")]
    UnknownKind(String),
    #[error("{0} does not exist")]
    NotFound(StructureId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatDrift {
    pub stat: String,
    pub expected: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} stat channel(s) disagree with structure contributions", .channels.len())]
pub struct LedgerDrift {
    pub channels: Vec<StatDrift>,
}

/// What the player currently has highlighted. At most one thing at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Kind(BuildingKind),
    Structure(StructureId),
}

/// One running settlement: grid, ledger, registry and the tick pipeline that
/// drives them.
pub struct Settlement {
    player_name: String,
    settlement_name: String,
    catalog: Arc<Catalog>,
    config: EngineConfig,
    state: SettlementState,
    systems: Vec<Box<dyn System>>,
    baseline: BTreeMap<String, i64>,
    selection: Selection,
    tick: u64,
    pub(crate) accrual_epoch: u64,
    pub(crate) accrual_timer: Option<AccrualTimer>,
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("player_name", &self.player_name)
            .field("settlement_name", &self.settlement_name)
            .field("tick", &self.tick)
            .field("level", &self.state.ledger.level())
            .field("structures", &self.state.registry.len())
            .finish_non_exhaustive()
    }
}

impl Settlement {
    pub fn initialize(
        player_name: &str,
        settlement_name: &str,
        catalog: Arc<Catalog>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let player_name = player_name.trim();
        let settlement_name = settlement_name.trim();
        if player_name.is_empty() {
            return Err(ConfigError::EmptyName("player"));
        }
        if settlement_name.is_empty() {
            return Err(ConfigError::EmptyName("settlement"));
        }
        validate_tick_policy(&catalog, &config.tick)?;

        let weights = config
            .terrain_weights
            .iter()
            .map(|(key, weight)| catalog.terrain_kind(key).map(|kind| (kind, *weight)))
            .collect::<Result<Vec<_>, CatalogError>>()?;
        let mut grid = WorldGrid::generate(&GridSpec {
            width: config.grid.width,
            height: config.grid.height,
            weights,
            infrastructure_lines: config.grid.infrastructure_lines(),
            fast_traversal: catalog.fast_traversal(),
            seed: config.seed,
        })?;
        let center = grid.center();
        grid.reserve_center(
            center.x as u32,
            center.z as u32,
            config.grid.reserve_radius,
            catalog.reserve_terrain(),
        );

        let mut ledger = Ledger::new(&catalog, &config.starting_resources, &config.starting_stats)?;
        let baseline = ledger.stats().clone();

        let starter = catalog.lookup_building(catalog.starter())?;
        let origin = TilePos::new(
            center.x - (starter.footprint.width / 2) as i32,
            center.z - (starter.footprint.length / 2) as i32,
        );
        let mut registry = BuildingRegistry::new();
        registry.place(
            &catalog,
            &mut grid,
            &mut ledger,
            PlacementRequest {
                kind: starter.kind,
                origin,
                orientation: Orientation::North,
                placer: Placer::Starter,
                construction: config.construction,
            },
        )?;

        let accrual = match &config.tick {
            TickPolicy::Passive(passive) => Some(AccrualRate {
                resource: passive.resource.clone(),
                rate: passive.rate,
                upgrade_level: 1,
            }),
            TickPolicy::Turn(_) => None,
        };
        let mut state = SettlementState {
            grid,
            ledger,
            registry,
            accrual,
            completed: Vec::new(),
        };
        settle_level(&config.level, 0, &mut state);

        info!(
            player = player_name,
            settlement = settlement_name,
            width = config.grid.width,
            height = config.grid.height,
            seed = config.seed,
            passive = config.tick.is_passive(),
            "settlement initialized"
        );

        Ok(Self {
            player_name: player_name.to_string(),
            settlement_name: settlement_name.to_string(),
            systems: systems::pipeline(&config.tick),
            catalog,
            config,
            state,
            baseline,
            selection: Selection::None,
            tick: 0,
            accrual_epoch: 0,
            accrual_timer: None,
        })
    }

    /// Appends a stage to the end of the tick pipeline.
    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn settlement_name(&self) -> &str {
        &self.settlement_name
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &SettlementState {
        &self.state
    }

    pub fn grid(&self) -> &WorldGrid {
        &self.state.grid
    }

    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    pub fn registry(&self) -> &BuildingRegistry {
        &self.state.registry
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Stat values before any structure contributed.
    pub fn baseline(&self) -> &BTreeMap<String, i64> {
        &self.baseline
    }

    pub fn is_accruing(&self) -> bool {
        self.accrual_timer.is_some()
    }

    pub fn accrual_period(&self) -> Option<Duration> {
        match &self.config.tick {
            TickPolicy::Passive(passive) => Some(Duration::from_millis(passive.interval_ms)),
            TickPolicy::Turn(_) => None,
        }
    }

    pub fn request_placement(
        &mut self,
        kind: BuildingKind,
        origin: TilePos,
        orientation: Orientation,
    ) -> Result<StructureId, PlacementError> {
        let result = self.state.registry.place(
            &self.catalog,
            &mut self.state.grid,
            &mut self.state.ledger,
            PlacementRequest {
                kind,
                origin,
                orientation,
                placer: Placer::Player,
                construction: self.config.construction,
            },
        );
        match &result {
            Ok(_) => self.settle_level(),
            Err(err) => debug!(%kind, x = origin.x, z = origin.z, %err, "placement rejected"),
        }
        result
    }

    pub fn request_removal(&mut self, id: StructureId) -> Result<(), RemovalError> {
        let result = self.state.registry.remove(
            &self.catalog,
            &mut self.state.grid,
            &mut self.state.ledger,
            id,
        );
        match result {
            Ok(_) => {
                if self.selection == Selection::Structure(id) {
                    self.selection = Selection::None;
                }
                self.settle_level();
                Ok(())
            }
            Err(err) => {
                debug!(structure = %id, %err, "removal rejected");
                Err(err)
            }
        }
    }

    /// Moves one structure's construction forward outside the tick
    /// pipeline. Progress never goes backwards and completion bonuses are
    /// applied on the call that reaches 100.
    pub fn advance_progress(
        &mut self,
        id: StructureId,
        step: Progress,
    ) -> Result<ProgressOutcome, ProgressError> {
        let outcome =
            self.state
                .registry
                .advance_progress(&self.catalog, &mut self.state.ledger, id, step)?;
        if outcome.completed_now {
            self.settle_level();
        }
        Ok(outcome)
    }

    pub fn select_building_kind(&mut self, kind: Option<BuildingKind>) -> Result<(), SelectionError> {
        self.selection = match kind {
            Some(kind) => {
                self.catalog
                    .lookup_building(kind)
                    .map_err(|_| SelectionError::UnknownKind(kind.to_string()))?;
                Selection::Kind(kind)
            }
            None => Selection::None,
        };
        Ok(())
    }

    pub fn select_structure(&mut self, id: Option<StructureId>) -> Result<(), SelectionError> {
        self.selection = match id {
            Some(id) => {
                if self.state.registry.get(id).is_none() {
                    return Err(SelectionError::NotFound(id));
                }
                Selection::Structure(id)
            }
            None => Selection::None,
        };
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self)
    }

    /// Runs one explicit turn.
    pub fn advance_tick(&mut self) -> Result<TickSummary, TickError> {
        if self.config.tick.is_passive() {
            return Err(TickError::WrongPolicy);
        }
        self.run_pipeline()
    }

    /// One accrual interval; called by the accrual timer.
    pub(crate) fn accrue(&mut self) -> Result<TickSummary, TickError> {
        if !self.config.tick.is_passive() {
            return Err(TickError::WrongPolicy);
        }
        self.run_pipeline()
    }

    /// Credits building output and terrain yields of every complete
    /// structure once. Returns what was credited.
    pub fn collect_resources(&mut self) -> Result<BTreeMap<String, i64>, LedgerError> {
        systems::production::collect(&self.catalog, &mut self.state)
    }

    /// Buys the next accrual upgrade and returns the new per-interval rate.
    pub fn upgrade_accrual(&mut self) -> Result<i64, AccrualError> {
        let TickPolicy::Passive(passive) = &self.config.tick else {
            return Err(AccrualError::NotPassive);
        };
        let upgrade = passive.upgrade.as_ref().ok_or(AccrualError::NoUpgrade)?;
        let accrual = self.state.accrual.as_mut().ok_or(AccrualError::NotPassive)?;
        let cost = upgrade
            .base_cost
            .saturating_mul(i64::from(accrual.upgrade_level));
        self.state
            .ledger
            .debit_all(&BTreeMap::from([(accrual.resource.clone(), cost)]))?;
        accrual.upgrade_level += 1;
        accrual.rate = accrual.rate.saturating_add(upgrade.rate_step);
        info!(
            upgrade_level = accrual.upgrade_level,
            rate = accrual.rate,
            cost,
            "accrual upgraded"
        );
        Ok(accrual.rate)
    }

    /// Checks that every stat equals its starting value plus the
    /// contributions of the structures currently complete. The level stat
    /// is not checked.
    pub fn audit(&self) -> Result<(), LedgerDrift> {
        let mut expected = self.baseline.clone();
        for structure in self.state.registry.iter().filter(|s| s.is_complete()) {
            if let Ok(building) = self.catalog.lookup_building(structure.kind) {
                for (stat, delta) in self.catalog.contributions(building) {
                    *expected.entry(stat).or_insert(0) += delta;
                }
            }
        }
        let channels: Vec<StatDrift> = self
            .catalog
            .stats()
            .iter()
            .filter(|def| self.catalog.level_stat() != Some(def.key.as_str()))
            .filter_map(|def| {
                let expected = expected.get(&def.key).copied().unwrap_or(0);
                let actual = self.state.ledger.stat(&def.key).unwrap_or(0);
                (expected != actual).then(|| StatDrift {
                    stat: def.key.clone(),
                    expected,
                    actual,
                })
            })
            .collect();
        if channels.is_empty() {
            Ok(())
        } else {
            Err(LedgerDrift { channels })
        }
    }

    /// Kinds the current level and completed structures allow, ignoring site
    /// and cost.
    pub fn buildable_kinds(&self) -> Vec<BuildingKind> {
        let level = self.state.ledger.level();
        self.catalog
            .buildings()
            .iter()
            .filter(|building| building.unlock_level <= level)
            .filter(|building| self.state.registry.missing_prerequisite(building).is_none())
            .map(|building| building.kind)
            .collect()
    }

    /// Tiles `kind` would cover if placed at `origin`.
    pub fn footprint(
        &self,
        kind: BuildingKind,
        origin: TilePos,
        orientation: Orientation,
    ) -> Result<Vec<TilePos>, CatalogError> {
        let building = self.catalog.lookup_building(kind)?;
        Ok(registry::footprint(building, origin, orientation))
    }

    fn settle_level(&mut self) {
        settle_level(&self.config.level, self.tick, &mut self.state);
    }

    /// Runs every stage against a staged copy of the state. The copy and the
    /// new tick count are committed only when all stages succeed.
    fn run_pipeline(&mut self) -> Result<TickSummary, TickError> {
        let tick = self.tick + 1;
        let mut staged = self.state.clone();
        staged.completed.clear();
        let ctx = SystemContext {
            tick,
            catalog: &self.catalog,
            policy: &self.config.tick,
            level: &self.config.level,
            settlement_name: &self.settlement_name,
        };
        let mut system_reports = Vec::with_capacity(self.systems.len());
        for system in &mut self.systems {
            let start = Instant::now();
            if let Err(err) = system.run(&ctx, &mut staged) {
                let message = format!("{err:#}");
                warn!(tick, system = system.name(), %message, "tick rolled back");
                return Err(TickError::System {
                    name: system.name().to_string(),
                    message,
                });
            }
            system_reports.push(SystemRunReport {
                name: system.name().to_string(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            });
        }
        self.state = staged;
        self.tick = tick;
        let summary = TickSummary {
            tick,
            level: self.state.ledger.level(),
            completed: self.state.completed.clone(),
            system_reports,
        };
        debug!(
            tick = summary.tick,
            level = summary.level,
            completed = summary.completed.len(),
            "tick finished"
        );
        Ok(summary)
    }
}

fn validate_tick_policy(catalog: &Catalog, policy: &TickPolicy) -> Result<(), ConfigError> {
    let invalid = |reason: String| Err(ConfigError::TickPolicy(reason));
    if policy.progress_per_tick() == 0 {
        return invalid("progress_per_tick must be positive".into());
    }
    match policy {
        TickPolicy::Turn(turn) => {
            if !catalog.has_resource(&turn.currency) {
                return invalid(format!("unknown currency resource '{}'", turn.currency));
            }
            if let Some(consumption) = &turn.consumption {
                if !catalog.has_resource(&consumption.resource) {
                    return invalid(format!(
                        "unknown consumable resource '{}'",
                        consumption.resource
                    ));
                }
                if !catalog.has_stat(&consumption.per_stat) {
                    return invalid(format!("unknown consumption stat '{}'", consumption.per_stat));
                }
                if consumption.rate < 0 {
                    return invalid("consumption rate must not be negative".into());
                }
            }
        }
        TickPolicy::Passive(passive) => {
            if !catalog.has_resource(&passive.resource) {
                return invalid(format!("unknown accrual resource '{}'", passive.resource));
            }
            if passive.interval_ms == 0 {
                return invalid("interval_ms must be positive".into());
            }
            if passive.rate < 0 {
                return invalid("accrual rate must not be negative".into());
            }
            if let Some(currency) = &passive.currency {
                if !catalog.has_resource(currency) {
                    return invalid(format!("unknown currency resource '{currency}'"));
                }
            }
            if let Some(upgrade) = &passive.upgrade {
                if upgrade.base_cost < 0 || upgrade.rate_step < 0 {
                    return invalid("upgrade cost and step must not be negative".into());
                }
            }
        }
    }
    Ok(())
}
