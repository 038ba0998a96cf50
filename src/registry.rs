//! Placed structures and their construction lifecycle.
//!
//! The registry is the only writer of grid occupancy and the only place
//! completion bonuses are applied or reversed. Every public operation either
//! commits fully or leaves grid, ledger and registry untouched.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::catalog::{BuildingData, BuildingKind, Catalog};
use crate::config::ConstructionMode;
use crate::ledger::{Ledger, Shortfall};
use crate::world::{OutOfBounds, TilePos, WorldGrid};

pub const COMPLETE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StructureId(u64);

impl StructureId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "structure-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    North,
    East,
    South,
    West,
}

impl Orientation {
    pub fn degrees(self) -> u16 {
        match self {
            Orientation::North => 0,
            Orientation::East => 90,
            Orientation::South => 180,
            Orientation::West => 270,
        }
    }

    /// East and west swap a footprint's width and length.
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Orientation::East | Orientation::West)
    }
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "north" | "n" | "0" => Ok(Orientation::North),
            "east" | "e" | "90" => Ok(Orientation::East),
            "south" | "s" | "180" => Ok(Orientation::South),
            "west" | "w" | "270" => Ok(Orientation::West),
            other => Err(format!("unknown orientation '{other}'")),
        }
    }
}

/// Tiles covered by `building` placed at `origin`. The origin is the
/// footprint's minimum corner.
pub fn footprint(building: &BuildingData, origin: TilePos, orientation: Orientation) -> Vec<TilePos> {
    let (width, length) = if orientation.is_quarter_turn() {
        (building.footprint.length, building.footprint.width)
    } else {
        (building.footprint.width, building.footprint.length)
    };
    let mut tiles = Vec::with_capacity(width as usize * length as usize);
    for dz in 0..length {
        for dx in 0..width {
            let x = origin.x.saturating_add(dx as i32);
            let z = origin.z.saturating_add(dz as i32);
            tiles.push(TilePos::new(x, z));
        }
    }
    tiles
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedStructure {
    pub id: StructureId,
    pub kind: BuildingKind,
    pub origin: TilePos,
    pub orientation: Orientation,
    pub progress: u8,
    pub footprint: Vec<TilePos>,
}

impl PlacedStructure {
    pub fn is_complete(&self) -> bool {
        self.progress >= COMPLETE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    By(u8),
    To(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressOutcome {
    pub progress: u8,
    /// True only for the call that crossed into completion.
    pub completed_now: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("unknown building kind {0}")]
    UnknownKind(String),
    #[error(transparent)]
    OutOfBounds(#[from] OutOfBounds),
    #[error("tile {tile} is occupied by {occupant}")]
    TileOccupied { tile: TilePos, occupant: StructureId },
    #[error("terrain at {0} is not buildable")]
    TerrainNotBuildable(TilePos),
    #[error("requires settlement level {required}, currently {current}")]
    BelowUnlockLevel { required: u32, current: u32 },
    #[error("requires a completed {0}")]
    PrerequisiteMissing(String),
    #[error(transparent)]
    InsufficientResources(#[from] Shortfall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RemovalError {
    #[error("{0} is the settlement's starting structure and cannot be removed")]
    ProtectedStructure(StructureId),
    #[error("{0} does not exist")]
    NotFound(StructureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("{0} does not exist")]
    NotFound(StructureId),
}

/// Who is asking for a placement. Only the settlement's own starter request
/// gets the cost and terrain waivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placer {
    Player,
    Starter,
}

pub(crate) struct PlacementRequest {
    pub kind: BuildingKind,
    pub origin: TilePos,
    pub orientation: Orientation,
    pub placer: Placer,
    pub construction: ConstructionMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildingRegistry {
    structures: BTreeMap<StructureId, PlacedStructure>,
    next_id: u64,
    protected: Option<StructureId>,
}

impl BuildingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: StructureId) -> Option<&PlacedStructure> {
        self.structures.get(&id)
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedStructure> {
        self.structures.values()
    }

    pub fn protected(&self) -> Option<StructureId> {
        self.protected
    }

    pub fn has_complete(&self, kind: BuildingKind) -> bool {
        self.structures
            .values()
            .any(|structure| structure.kind == kind && structure.is_complete())
    }

    pub fn pending(&self) -> Vec<StructureId> {
        self.structures
            .values()
            .filter(|structure| !structure.is_complete())
            .map(|structure| structure.id)
            .collect()
    }

    /// First unmet prerequisite of `building`, if any.
    pub fn missing_prerequisite(&self, building: &BuildingData) -> Option<BuildingKind> {
        building
            .requires
            .iter()
            .copied()
            .find(|required| !self.has_complete(*required))
    }

    pub(crate) fn place(
        &mut self,
        catalog: &Catalog,
        grid: &mut WorldGrid,
        ledger: &mut Ledger,
        request: PlacementRequest,
    ) -> Result<StructureId, PlacementError> {
        let building = catalog
            .lookup_building(request.kind)
            .map_err(|_| PlacementError::UnknownKind(request.kind.to_string()))?;
        let waived =
            request.placer == Placer::Starter && building.exempt && self.protected.is_none();
        let tiles = footprint(building, request.origin, request.orientation);

        if let Some(tile) = tiles.iter().find(|tile| !grid.is_in_bounds(**tile)) {
            return Err(OutOfBounds(*tile).into());
        }
        for tile in &tiles {
            if let Some(occupant) = grid.tile_at(*tile).and_then(|t| t.occupant) {
                return Err(PlacementError::TileOccupied {
                    tile: *tile,
                    occupant,
                });
            }
        }
        if !waived {
            if let Some(tile) = tiles.iter().find(|tile| !grid.is_buildable(**tile, catalog)) {
                return Err(PlacementError::TerrainNotBuildable(*tile));
            }
        }
        if ledger.level() < building.unlock_level {
            return Err(PlacementError::BelowUnlockLevel {
                required: building.unlock_level,
                current: ledger.level(),
            });
        }
        if let Some(missing) = self.missing_prerequisite(building) {
            let name = catalog
                .lookup_building(missing)
                .map(|data| data.key.clone())
                .unwrap_or_else(|_| missing.to_string());
            return Err(PlacementError::PrerequisiteMissing(name));
        }
        if !waived {
            ledger.debit_all(&building.cost)?;
        }

        // Validation is complete; nothing below can fail.
        let id = StructureId(self.next_id);
        self.next_id += 1;
        grid.occupy(&tiles, id)?;
        let instant = waived
            || building.build_ticks == 0
            || request.construction == ConstructionMode::Instant;
        let progress = if instant { COMPLETE } else { 0 };
        if instant {
            ledger.apply_completion_bonuses(catalog, building);
        }
        if waived {
            self.protected = Some(id);
        }
        self.structures.insert(
            id,
            PlacedStructure {
                id,
                kind: request.kind,
                origin: request.origin,
                orientation: request.orientation,
                progress,
                footprint: tiles,
            },
        );
        info!(
            structure = %id,
            kind = %building.key,
            x = request.origin.x,
            z = request.origin.z,
            complete = instant,
            "structure placed"
        );
        Ok(id)
    }

    pub(crate) fn advance_progress(
        &mut self,
        catalog: &Catalog,
        ledger: &mut Ledger,
        id: StructureId,
        step: Progress,
    ) -> Result<ProgressOutcome, ProgressError> {
        let structure = self
            .structures
            .get_mut(&id)
            .ok_or(ProgressError::NotFound(id))?;
        if structure.is_complete() {
            return Ok(ProgressOutcome {
                progress: structure.progress,
                completed_now: false,
            });
        }
        let target = match step {
            Progress::By(delta) => structure.progress.saturating_add(delta),
            Progress::To(value) => value.max(structure.progress),
        };
        structure.progress = target.min(COMPLETE);
        let completed_now = structure.is_complete();
        if completed_now {
            match catalog.lookup_building(structure.kind) {
                Ok(building) => {
                    ledger.apply_completion_bonuses(catalog, building);
                    info!(structure = %id, kind = %building.key, "construction complete");
                }
                Err(err) => error!(structure = %id, %err, "completed structure has no catalog entry"),
            }
        }
        Ok(ProgressOutcome {
            progress: structure.progress,
            completed_now,
        })
    }

    /// Advances every pending structure by `step` and returns those that
    /// completed, in id order.
    pub(crate) fn advance_all(
        &mut self,
        catalog: &Catalog,
        ledger: &mut Ledger,
        step: u8,
    ) -> Vec<StructureId> {
        let mut completed = Vec::new();
        for id in self.pending() {
            if let Ok(outcome) = self.advance_progress(catalog, ledger, id, Progress::By(step)) {
                if outcome.completed_now {
                    completed.push(id);
                }
            }
        }
        completed
    }

    pub(crate) fn remove(
        &mut self,
        catalog: &Catalog,
        grid: &mut WorldGrid,
        ledger: &mut Ledger,
        id: StructureId,
    ) -> Result<PlacedStructure, RemovalError> {
        if self.protected == Some(id) {
            debug!(structure = %id, "refusing to remove starting structure");
            return Err(RemovalError::ProtectedStructure(id));
        }
        let structure = self
            .structures
            .remove(&id)
            .ok_or(RemovalError::NotFound(id))?;
        if let Err(err) = grid.vacate(&structure.footprint) {
            error!(structure = %id, %err, "stored footprint no longer fits the grid");
        }
        if structure.is_complete() {
            match catalog.lookup_building(structure.kind) {
                Ok(building) => ledger.reverse_completion_bonuses(catalog, building),
                Err(err) => error!(structure = %id, %err, "removed structure has no catalog entry"),
            }
        }
        info!(structure = %id, complete = structure.is_complete(), "structure removed");
        Ok(structure)
    }
}
