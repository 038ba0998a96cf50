//! Read-only projection of a settlement for UI layers.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::BuildingKind;
use crate::engine::{Selection, Settlement};
use crate::registry::{Orientation, StructureId};
use crate::world::TilePos;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub player_name: String,
    pub settlement_name: String,
    pub tick: u64,
    pub level: u32,
    pub accrual: Option<AccrualView>,
    pub resources: BTreeMap<String, i64>,
    pub stats: BTreeMap<String, i64>,
    pub width: u32,
    pub height: u32,
    pub structures: Vec<StructureView>,
    pub tiles: Vec<TileView>,
    pub selection: SelectionView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccrualView {
    pub resource: String,
    pub rate: i64,
    pub upgrade_level: u32,
    pub running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureView {
    pub id: StructureId,
    pub kind: String,
    pub origin: TilePos,
    pub orientation: Orientation,
    pub progress: u8,
    pub complete: bool,
    pub footprint: Vec<TilePos>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileView {
    pub x: u32,
    pub z: u32,
    pub terrain: String,
    pub occupant: Option<StructureId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionView {
    None,
    Kind { kind: String },
    Structure { id: StructureId },
}

impl Snapshot {
    pub fn capture(settlement: &Settlement) -> Self {
        let catalog = settlement.catalog();
        let building_key = |kind: BuildingKind| {
            catalog
                .lookup_building(kind)
                .map(|data| data.key.clone())
                .unwrap_or_else(|_| kind.to_string())
        };

        let structures = settlement
            .registry()
            .iter()
            .map(|structure| StructureView {
                id: structure.id,
                kind: building_key(structure.kind),
                origin: structure.origin,
                orientation: structure.orientation,
                progress: structure.progress,
                complete: structure.is_complete(),
                footprint: structure.footprint.clone(),
            })
            .collect();

        let tiles = settlement
            .grid()
            .tiles()
            .iter()
            .map(|tile| TileView {
                x: tile.x,
                z: tile.z,
                terrain: catalog
                    .lookup_terrain(tile.terrain)
                    .map(|data| data.key.clone())
                    .unwrap_or_else(|_| tile.terrain.to_string()),
                occupant: tile.occupant,
            })
            .collect();

        let selection = match settlement.selection() {
            Selection::None => SelectionView::None,
            Selection::Kind(kind) => SelectionView::Kind {
                kind: building_key(kind),
            },
            Selection::Structure(id) => SelectionView::Structure { id },
        };

        let accrual = settlement.state().accrual().map(|accrual| AccrualView {
            resource: accrual.resource.clone(),
            rate: accrual.rate,
            upgrade_level: accrual.upgrade_level,
            running: settlement.is_accruing(),
        });

        Self {
            player_name: settlement.player_name().to_string(),
            settlement_name: settlement.settlement_name().to_string(),
            tick: settlement.tick(),
            level: settlement.ledger().level(),
            accrual,
            resources: settlement.ledger().resources(),
            stats: settlement.ledger().stats().clone(),
            width: settlement.grid().width(),
            height: settlement.grid().height(),
            structures,
            tiles,
            selection,
        }
    }

    pub fn structure(&self, id: StructureId) -> Option<&StructureView> {
        self.structures.iter().find(|structure| structure.id == id)
    }

    pub fn tile(&self, x: u32, z: u32) -> Option<&TileView> {
        if x >= self.width || z >= self.height {
            return None;
        }
        self.tiles.get(z as usize * self.width as usize + x as usize)
    }
}
