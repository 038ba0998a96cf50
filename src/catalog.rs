//! Static terrain and building tables.
//!
//! Theme files name kinds and channels by string key. `Catalog::from_spec`
//! resolves every key once into dense `TerrainKind` / `BuildingKind` ids and
//! rejects dangling references, so the rest of the engine never falls back on
//! a string lookup that can miss.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerrainKind(u16);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingKind(u16);

impl TerrainKind {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BuildingKind {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terrain#{}", self.0)
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown kind '{0}'")]
    UnknownKind(String),
    #[error("{owner} references unknown {channel_type} channel '{channel}'")]
    UnknownChannel {
        owner: String,
        channel_type: &'static str,
        channel: String,
    },
    #[error("key '{0}' is defined more than once")]
    Duplicate(String),
    #[error("invalid catalog entry '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

fn default_unlock_level() -> u32 {
    1
}

fn default_floor() -> Option<i64> {
    Some(0)
}

fn default_income_stat() -> String {
    "income".to_string()
}

fn default_upkeep_stat() -> String {
    "upkeep".to_string()
}

/// Footprint in whole tiles, before rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub length: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSpec {
    pub terrain: Vec<TerrainSpec>,
    pub buildings: Vec<BuildingSpec>,
    pub resources: Vec<ResourceSpec>,
    pub stats: Vec<StatSpec>,
    /// Building placed at settlement start; exempt from cost and terrain
    /// checks and never removable.
    pub starter: String,
    /// Terrain carved along infrastructure lines during generation.
    pub fast_traversal: String,
    /// Terrain forced around the grid centre so the starter has a site.
    pub reserve_terrain: String,
    #[serde(default)]
    pub economy: EconomySpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EconomySpec {
    #[serde(default = "default_income_stat")]
    pub income_stat: String,
    #[serde(default = "default_upkeep_stat")]
    pub upkeep_stat: String,
    /// Stat kept equal to the settlement level.
    #[serde(default)]
    pub level_stat: Option<String>,
}

impl Default for EconomySpec {
    fn default() -> Self {
        Self {
            income_stat: default_income_stat(),
            upkeep_stat: default_upkeep_stat(),
            level_stat: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerrainSpec {
    pub key: String,
    pub name: String,
    pub buildable: bool,
    pub movement_cost: f64,
    #[serde(default)]
    pub yields: BTreeMap<String, i64>,
    #[serde(default)]
    pub display: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildingSpec {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub footprint: Footprint,
    #[serde(default)]
    pub cost: BTreeMap<String, i64>,
    /// Nominal construction time. Zero means the building is complete on
    /// placement; any other value builds at the tick policy's fixed
    /// `progress_per_tick`, so the figure itself does not set the pace.
    #[serde(default)]
    pub build_ticks: u32,
    #[serde(default = "default_unlock_level")]
    pub unlock_level: u32,
    #[serde(default)]
    pub income: Option<i64>,
    #[serde(default)]
    pub upkeep: Option<i64>,
    #[serde(default)]
    pub provides: BTreeMap<String, i64>,
    #[serde(default)]
    pub produces: BTreeMap<String, i64>,
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    pub key: String,
    /// Lowest balance a debit may leave behind; `~` means unbounded.
    #[serde(default = "default_floor")]
    pub floor: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatSpec {
    pub key: String,
    /// Companion capacity stat raised in step with this one.
    #[serde(default)]
    pub capacity: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerrainData {
    pub kind: TerrainKind,
    pub key: String,
    pub name: String,
    pub buildable: bool,
    pub movement_cost: f64,
    pub yields: BTreeMap<String, i64>,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingData {
    pub kind: BuildingKind,
    pub key: String,
    pub name: String,
    pub description: String,
    pub footprint: Footprint,
    pub cost: BTreeMap<String, i64>,
    pub build_ticks: u32,
    pub unlock_level: u32,
    pub income: Option<i64>,
    pub upkeep: Option<i64>,
    pub provides: BTreeMap<String, i64>,
    pub produces: BTreeMap<String, i64>,
    pub requires: Vec<BuildingKind>,
    pub exempt: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDef {
    pub key: String,
    pub floor: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatDef {
    pub key: String,
    pub capacity: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    terrain: Vec<TerrainData>,
    buildings: Vec<BuildingData>,
    terrain_keys: HashMap<String, TerrainKind>,
    building_keys: HashMap<String, BuildingKind>,
    resources: Vec<ResourceDef>,
    stats: Vec<StatDef>,
    starter: BuildingKind,
    fast_traversal: TerrainKind,
    reserve_terrain: TerrainKind,
    income_stat: String,
    upkeep_stat: String,
    level_stat: Option<String>,
}

impl Catalog {
    pub fn from_spec(spec: CatalogSpec) -> Result<Self, CatalogError> {
        let resources = collect_resources(&spec.resources)?;
        let stats = collect_stats(&spec.stats)?;
        let has_resource = |key: &str| resources.iter().any(|r| r.key == key);
        let has_stat = |key: &str| stats.iter().any(|s| s.key == key);

        for stat in &spec.stats {
            if let Some(capacity) = &stat.capacity {
                if !has_stat(capacity) {
                    return Err(unknown_channel(&stat.key, "stat", capacity));
                }
            }
        }
        for stat in [&spec.economy.income_stat, &spec.economy.upkeep_stat] {
            if !has_stat(stat) {
                return Err(unknown_channel("economy", "stat", stat));
            }
        }
        if let Some(stat) = &spec.economy.level_stat {
            if !has_stat(stat) {
                return Err(unknown_channel("economy", "stat", stat));
            }
        }

        let mut terrain = Vec::with_capacity(spec.terrain.len());
        let mut terrain_keys = HashMap::new();
        for (index, entry) in spec.terrain.into_iter().enumerate() {
            let kind = TerrainKind(dense_index(&entry.key, index)?);
            if terrain_keys.insert(entry.key.clone(), kind).is_some() {
                return Err(CatalogError::Duplicate(entry.key));
            }
            if entry.movement_cost.is_nan() || entry.movement_cost <= 0.0 {
                return Err(CatalogError::Invalid {
                    key: entry.key,
                    reason: "movement cost must be positive".into(),
                });
            }
            for (resource, amount) in &entry.yields {
                if !has_resource(resource) {
                    return Err(unknown_channel(&entry.key, "resource", resource));
                }
                if *amount < 0 {
                    return Err(CatalogError::Invalid {
                        key: entry.key,
                        reason: format!("negative yield for '{resource}'"),
                    });
                }
            }
            terrain.push(TerrainData {
                kind,
                key: entry.key,
                name: entry.name,
                buildable: entry.buildable,
                movement_cost: entry.movement_cost,
                yields: entry.yields,
                display: entry.display,
            });
        }

        let mut building_keys = HashMap::new();
        for (index, entry) in spec.buildings.iter().enumerate() {
            let kind = BuildingKind(dense_index(&entry.key, index)?);
            if building_keys.insert(entry.key.clone(), kind).is_some() {
                return Err(CatalogError::Duplicate(entry.key.clone()));
            }
        }

        let starter = *building_keys
            .get(&spec.starter)
            .ok_or_else(|| CatalogError::UnknownKind(spec.starter.clone()))?;

        let mut buildings = Vec::with_capacity(spec.buildings.len());
        for (index, entry) in spec.buildings.into_iter().enumerate() {
            if entry.footprint.width == 0 || entry.footprint.length == 0 {
                return Err(CatalogError::Invalid {
                    key: entry.key,
                    reason: "footprint must cover at least one tile".into(),
                });
            }
            for (resource, amount) in entry.cost.iter().chain(entry.produces.iter()) {
                if !has_resource(resource) {
                    return Err(unknown_channel(&entry.key, "resource", resource));
                }
                if *amount < 0 {
                    return Err(CatalogError::Invalid {
                        key: entry.key,
                        reason: format!("negative amount for '{resource}'"),
                    });
                }
            }
            for stat in entry.provides.keys() {
                if !has_stat(stat) {
                    return Err(unknown_channel(&entry.key, "stat", stat));
                }
                if spec.economy.level_stat.as_ref() == Some(stat) {
                    return Err(CatalogError::Invalid {
                        key: entry.key,
                        reason: format!("'{stat}' follows the settlement level"),
                    });
                }
            }
            let mut requires = Vec::with_capacity(entry.requires.len());
            for required in &entry.requires {
                let kind = building_keys
                    .get(required)
                    .copied()
                    .ok_or_else(|| CatalogError::UnknownKind(required.clone()))?;
                requires.push(kind);
            }
            let kind = BuildingKind(index as u16);
            buildings.push(BuildingData {
                kind,
                key: entry.key,
                name: entry.name,
                description: entry.description,
                footprint: entry.footprint,
                cost: entry.cost,
                build_ticks: entry.build_ticks,
                unlock_level: entry.unlock_level,
                income: entry.income,
                upkeep: entry.upkeep,
                provides: entry.provides,
                produces: entry.produces,
                requires,
                exempt: kind == starter,
            });
        }

        let fast_traversal = *terrain_keys
            .get(&spec.fast_traversal)
            .ok_or_else(|| CatalogError::UnknownKind(spec.fast_traversal.clone()))?;
        let reserve_terrain = *terrain_keys
            .get(&spec.reserve_terrain)
            .ok_or_else(|| CatalogError::UnknownKind(spec.reserve_terrain.clone()))?;
        if !terrain[reserve_terrain.index()].buildable {
            return Err(CatalogError::Invalid {
                key: spec.reserve_terrain,
                reason: "reserve terrain must be buildable".into(),
            });
        }

        Ok(Self {
            terrain,
            buildings,
            terrain_keys,
            building_keys,
            resources,
            stats,
            starter,
            fast_traversal,
            reserve_terrain,
            income_stat: spec.economy.income_stat,
            upkeep_stat: spec.economy.upkeep_stat,
            level_stat: spec.economy.level_stat,
        })
    }

    pub fn lookup_terrain(&self, kind: TerrainKind) -> Result<&TerrainData, CatalogError> {
        self.terrain
            .get(kind.index())
            .ok_or_else(|| CatalogError::UnknownKind(kind.to_string()))
    }

    pub fn lookup_building(&self, kind: BuildingKind) -> Result<&BuildingData, CatalogError> {
        self.buildings
            .get(kind.index())
            .ok_or_else(|| CatalogError::UnknownKind(kind.to_string()))
    }

    pub fn terrain_kind(&self, key: &str) -> Result<TerrainKind, CatalogError> {
        self.terrain_keys
            .get(key)
            .copied()
            .ok_or_else(|| CatalogError::UnknownKind(key.to_string()))
    }

    pub fn building_kind(&self, key: &str) -> Result<BuildingKind, CatalogError> {
        self.building_keys
            .get(key)
            .copied()
            .ok_or_else(|| CatalogError::UnknownKind(key.to_string()))
    }

    pub fn terrain(&self) -> &[TerrainData] {
        &self.terrain
    }

    pub fn buildings(&self) -> &[BuildingData] {
        &self.buildings
    }

    pub fn resources(&self) -> &[ResourceDef] {
        &self.resources
    }

    pub fn stats(&self) -> &[StatDef] {
        &self.stats
    }

    pub fn starter(&self) -> BuildingKind {
        self.starter
    }

    pub fn fast_traversal(&self) -> TerrainKind {
        self.fast_traversal
    }

    pub fn reserve_terrain(&self) -> TerrainKind {
        self.reserve_terrain
    }

    pub fn income_stat(&self) -> &str {
        &self.income_stat
    }

    pub fn upkeep_stat(&self) -> &str {
        &self.upkeep_stat
    }

    pub fn level_stat(&self) -> Option<&str> {
        self.level_stat.as_deref()
    }

    pub fn has_resource(&self, key: &str) -> bool {
        self.resources.iter().any(|r| r.key == key)
    }

    pub fn has_stat(&self, key: &str) -> bool {
        self.stats.iter().any(|s| s.key == key)
    }

    /// Stat deltas a building applies on completion: each provision plus its
    /// capacity companion, then income and upkeep.
    pub fn contributions(&self, building: &BuildingData) -> BTreeMap<String, i64> {
        let mut deltas = BTreeMap::new();
        for (stat, amount) in &building.provides {
            *deltas.entry(stat.clone()).or_insert(0) += amount;
            let capacity = self
                .stats
                .iter()
                .find(|def| &def.key == stat)
                .and_then(|def| def.capacity.as_ref());
            if let Some(capacity) = capacity {
                *deltas.entry(capacity.clone()).or_insert(0) += amount;
            }
        }
        if let Some(income) = building.income {
            *deltas.entry(self.income_stat.clone()).or_insert(0) += income;
        }
        if let Some(upkeep) = building.upkeep {
            *deltas.entry(self.upkeep_stat.clone()).or_insert(0) += upkeep;
        }
        deltas
    }
}

fn dense_index(key: &str, index: usize) -> Result<u16, CatalogError> {
    u16::try_from(index).map_err(|_| CatalogError::Invalid {
        key: key.to_string(),
        reason: "catalog has too many entries".into(),
    })
}

fn unknown_channel(owner: &str, channel_type: &'static str, channel: &str) -> CatalogError {
    CatalogError::UnknownChannel {
        owner: owner.to_string(),
        channel_type,
        channel: channel.to_string(),
    }
}

fn collect_resources(specs: &[ResourceSpec]) -> Result<Vec<ResourceDef>, CatalogError> {
    let mut defs: Vec<ResourceDef> = Vec::with_capacity(specs.len());
    for spec in specs {
        if defs.iter().any(|d| d.key == spec.key) {
            return Err(CatalogError::Duplicate(spec.key.clone()));
        }
        defs.push(ResourceDef {
            key: spec.key.clone(),
            floor: spec.floor,
        });
    }
    Ok(defs)
}

fn collect_stats(specs: &[StatSpec]) -> Result<Vec<StatDef>, CatalogError> {
    let mut defs: Vec<StatDef> = Vec::with_capacity(specs.len());
    for spec in specs {
        if defs.iter().any(|d| d.key == spec.key) {
            return Err(CatalogError::Duplicate(spec.key.clone()));
        }
        defs.push(StatDef {
            key: spec.key.clone(),
            capacity: spec.capacity.clone(),
        });
    }
    Ok(defs)
}
