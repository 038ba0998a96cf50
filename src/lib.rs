pub mod accrual;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod ledger;
pub mod registry;
pub mod rng;
pub mod scenario;
pub mod snapshot;
pub mod systems;
pub mod world;

pub use accrual::{AccrualError, SharedSettlement, StartError};
pub use catalog::{BuildingKind, Catalog, TerrainKind};
pub use config::EngineConfig;
pub use engine::{Selection, Settlement, TickSummary};
pub use registry::{Orientation, PlacementError, Progress, RemovalError, StructureId};
pub use scenario::{ScenarioLoader, Theme};
pub use snapshot::Snapshot;
pub use world::TilePos;
