use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn default_seed() -> u64 {
    7
}

fn default_reserve_radius() -> u32 {
    2
}

fn default_progress_per_tick() -> u8 {
    5
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_per_level() -> u32 {
    3
}

/// Everything an engine instance needs besides the catalog. Plain data;
/// one value per settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub grid: GridConfig,
    #[serde(default)]
    pub starting_resources: BTreeMap<String, i64>,
    #[serde(default)]
    pub starting_stats: BTreeMap<String, i64>,
    /// Relative probability of each terrain key during generation.
    pub terrain_weights: BTreeMap<String, f64>,
    pub tick: TickPolicy,
    #[serde(default)]
    pub level: LevelPolicy,
    #[serde(default)]
    pub construction: ConstructionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    /// Straight fast-traversal lines carved after sampling; defaults to
    /// half the shorter side.
    #[serde(default)]
    pub infrastructure_lines: Option<u32>,
    #[serde(default = "default_reserve_radius")]
    pub reserve_radius: u32,
}

impl GridConfig {
    pub fn infrastructure_lines(&self) -> u32 {
        self.infrastructure_lines
            .unwrap_or(self.width.min(self.height) / 2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TickPolicy {
    /// Explicit "advance one period" calls.
    Turn(TurnPolicy),
    /// Wall-clock accrual on a fixed interval.
    Passive(PassivePolicy),
}

impl TickPolicy {
    pub fn progress_per_tick(&self) -> u8 {
        match self {
            TickPolicy::Turn(turn) => turn.progress_per_tick,
            TickPolicy::Passive(passive) => passive.progress_per_tick,
        }
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, TickPolicy::Passive(_))
    }

    /// Resource that receives net income each tick, if any.
    pub fn income_currency(&self) -> Option<&str> {
        match self {
            TickPolicy::Turn(turn) => Some(&turn.currency),
            TickPolicy::Passive(passive) => passive.currency.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnPolicy {
    #[serde(default = "default_progress_per_tick")]
    pub progress_per_tick: u8,
    /// Resource credited with net income each turn.
    pub currency: String,
    #[serde(default)]
    pub consumption: Option<Consumption>,
}

/// Per-turn draw of a consumable, proportional to a population stat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumption {
    pub resource: String,
    pub per_stat: String,
    pub rate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassivePolicy {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    pub resource: String,
    pub rate: i64,
    #[serde(default = "default_progress_per_tick")]
    pub progress_per_tick: u8,
    /// Resource credited with net income each interval. Without one,
    /// income and upkeep stats only feed the ledger.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub upgrade: Option<AccrualUpgrade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualUpgrade {
    /// Cost of the next upgrade is `base_cost * current upgrade level`.
    pub base_cost: i64,
    pub rate_step: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LevelPolicy {
    StructureCount {
        #[serde(default = "default_per_level")]
        per_level: u32,
    },
    Elapsed {
        every_ticks: u64,
    },
}

impl Default for LevelPolicy {
    fn default() -> Self {
        LevelPolicy::StructureCount {
            per_level: default_per_level(),
        }
    }
}

impl LevelPolicy {
    pub fn level_for_count(per_level: u32, structures: usize) -> u32 {
        let per_level = per_level.max(1) as usize;
        let level = structures / per_level + 1;
        u32::try_from(level).unwrap_or(u32::MAX).max(1)
    }

    pub fn level_for_ticks(every_ticks: u64, tick: u64) -> u32 {
        let level = tick / every_ticks.max(1) + 1;
        u32::try_from(level).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionMode {
    /// Structures start pending and complete through ticks.
    #[default]
    Timed,
    /// Every structure is complete the moment it is placed.
    Instant,
}
