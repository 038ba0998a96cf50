use hearthgrid::{
    config::ConstructionMode,
    engine::{ConfigError, Selection, SelectionError},
    ledger::Shortfall,
    world::OutOfBounds,
    EngineConfig, Orientation, PlacementError, Progress, RemovalError, Settlement, StructureId,
    Theme, TilePos,
};

const HAMLET: &str = r#"
name: hamlet
catalog:
  starter: hall
  fast_traversal: road
  reserve_terrain: grass
  resources:
    - key: gold
    - key: grain
      floor: ~
  stats:
    - key: population
      capacity: housing
    - key: housing
    - key: security
    - key: income
    - key: upkeep
  terrain:
    - { key: grass, name: Grass, buildable: true, movement_cost: 1.0 }
    - { key: rock, name: Rock, buildable: false, movement_cost: 3.0 }
    - { key: road, name: Road, buildable: false, movement_cost: 0.5 }
  buildings:
    - key: hall
      name: Hall
      footprint: { width: 3, length: 3 }
      cost: { gold: 500 }
      build_ticks: 40
    - key: house
      name: House
      footprint: { width: 1, length: 1 }
      cost: { gold: 20 }
      build_ticks: 4
      provides: { population: 5 }
    - key: watchtower
      name: Watchtower
      footprint: { width: 1, length: 1 }
      cost: { gold: 30 }
      build_ticks: 10
      provides: { security: 10 }
      income: 5
    - key: vault
      name: Vault
      footprint: { width: 2, length: 2 }
      cost: { gold: 100 }
      build_ticks: 10
    - key: chapel
      name: Chapel
      footprint: { width: 2, length: 1 }
      cost: { gold: 10 }
      build_ticks: 0
      requires: [house]
    - key: keep
      name: Keep
      footprint: { width: 1, length: 1 }
      cost: { gold: 10 }
      build_ticks: 5
      unlock_level: 2
config:
  seed: 11
  grid: { width: 10, height: 10, infrastructure_lines: 0 }
  starting_resources: { gold: 50, grain: 10 }
  terrain_weights: { grass: 1.0 }
  tick:
    mode: turn
    currency: gold
    progress_per_tick: 25
"#;

fn hamlet() -> Theme {
    Theme::from_yaml(HAMLET).unwrap()
}

fn settle(theme: &Theme, config: EngineConfig) -> Settlement {
    Settlement::initialize("Ada", "Lovelace Rest", theme.catalog.clone(), config).unwrap()
}

fn kind(settlement: &Settlement, key: &str) -> hearthgrid::BuildingKind {
    settlement.catalog().building_kind(key).unwrap()
}

#[test]
fn starter_sits_on_the_centre_and_is_complete() {
    let theme = hamlet();
    let settlement = settle(&theme, theme.config.clone());
    let hall = settlement.registry().iter().next().unwrap();
    assert_eq!(settlement.registry().len(), 1);
    assert!(hall.is_complete());
    assert_eq!(hall.origin, TilePos::new(4, 4));
    assert_eq!(settlement.ledger().resource("gold"), Some(50));
    assert_eq!(settlement.registry().protected(), Some(hall.id));
}

#[test]
fn centre_reserve_allows_starter_on_hostile_terrain() {
    let theme = hamlet();
    let mut config = theme.config.clone();
    config.terrain_weights = [("rock".to_string(), 0.95), ("grass".to_string(), 0.05)]
        .into_iter()
        .collect();
    let settlement = settle(&theme, config);
    for x in 3..=7 {
        for z in 3..=7 {
            assert!(settlement.grid().is_buildable(TilePos::new(x, z), settlement.catalog()));
        }
    }
    assert_eq!(settlement.grid().center(), TilePos::new(5, 5));
    assert_eq!(settlement.registry().len(), 1);
}

#[test]
fn starter_ignores_terrain_without_a_reserve() {
    let theme = hamlet();
    let mut config = theme.config.clone();
    config.terrain_weights = [("rock".to_string(), 1.0)].into_iter().collect();
    config.grid.reserve_radius = 0;
    let settlement = settle(&theme, config);
    assert!(!settlement.grid().is_buildable(TilePos::new(4, 4), settlement.catalog()));
    assert!(settlement.registry().iter().next().unwrap().is_complete());
}

#[test]
fn successful_placement_marks_every_footprint_tile() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let chapel_site = settlement
        .footprint(kind(&settlement, "chapel"), TilePos::new(0, 8), Orientation::East)
        .unwrap();
    assert_eq!(chapel_site, vec![TilePos::new(0, 8), TilePos::new(0, 9)]);

    let house = settlement
        .request_placement(kind(&settlement, "house"), TilePos::new(1, 1), Orientation::North)
        .unwrap();
    let tile = settlement.grid().tile_at(TilePos::new(1, 1)).unwrap();
    assert_eq!(tile.occupant, Some(house));
    assert_eq!(settlement.ledger().resource("gold"), Some(30));

    let structure = settlement.registry().get(house).unwrap();
    assert_eq!(structure.progress, 0);
    for pos in &structure.footprint {
        assert_eq!(settlement.grid().tile_at(*pos).unwrap().occupant, Some(house));
    }
}

#[test]
fn failed_placements_leave_no_trace() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let before = settlement.snapshot();

    let vault = kind(&settlement, "vault");
    let err = settlement
        .request_placement(vault, TilePos::new(0, 0), Orientation::North)
        .unwrap_err();
    assert_eq!(
        err,
        PlacementError::InsufficientResources(Shortfall {
            resource: "gold".into(),
            required: 100,
            available: 50,
        })
    );
    assert_eq!(settlement.ledger().resource("gold"), Some(50));

    let err = settlement
        .request_placement(vault, TilePos::new(9, 9), Orientation::North)
        .unwrap_err();
    assert_eq!(err, PlacementError::OutOfBounds(OutOfBounds(TilePos::new(10, 9))));

    let err = settlement
        .request_placement(vault, TilePos::new(-1, 0), Orientation::North)
        .unwrap_err();
    assert!(matches!(err, PlacementError::OutOfBounds(_)));

    assert_eq!(settlement.snapshot(), before);
}

#[test]
fn validation_runs_in_a_fixed_order() {
    let theme = hamlet();
    let mut config = theme.config.clone();
    config.terrain_weights = [("rock".to_string(), 1.0)].into_iter().collect();
    let mut settlement = settle(&theme, config);
    let hall = settlement.registry().protected().unwrap();
    let before = settlement.snapshot();

    // Occupied beats unaffordable.
    let err = settlement
        .request_placement(kind(&settlement, "vault"), TilePos::new(5, 5), Orientation::North)
        .unwrap_err();
    assert_eq!(
        err,
        PlacementError::TileOccupied {
            tile: TilePos::new(5, 5),
            occupant: hall,
        }
    );
    assert_eq!(settlement.snapshot(), before);

    // Rock beats the unlock level.
    let err = settlement
        .request_placement(kind(&settlement, "keep"), TilePos::new(0, 0), Orientation::North)
        .unwrap_err();
    assert_eq!(err, PlacementError::TerrainNotBuildable(TilePos::new(0, 0)));
    assert_eq!(settlement.snapshot(), before);

    // On reserved grass the unlock level is next.
    let err = settlement
        .request_placement(kind(&settlement, "keep"), TilePos::new(3, 3), Orientation::North)
        .unwrap_err();
    assert_eq!(
        err,
        PlacementError::BelowUnlockLevel {
            required: 2,
            current: 1,
        }
    );
    assert_eq!(settlement.snapshot(), before);
}

#[test]
fn player_pays_full_price_for_another_starter() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let err = settlement
        .request_placement(kind(&settlement, "hall"), TilePos::new(0, 0), Orientation::North)
        .unwrap_err();
    assert!(matches!(err, PlacementError::InsufficientResources(_)));
}

#[test]
fn prerequisite_needs_a_complete_structure() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let chapel = kind(&settlement, "chapel");
    let before = settlement.snapshot();

    let err = settlement
        .request_placement(chapel, TilePos::new(0, 0), Orientation::North)
        .unwrap_err();
    assert_eq!(err, PlacementError::PrerequisiteMissing("house".into()));
    assert_eq!(settlement.snapshot(), before);

    let house = settlement
        .request_placement(kind(&settlement, "house"), TilePos::new(9, 9), Orientation::North)
        .unwrap();
    let pending = settlement.snapshot();
    let err = settlement
        .request_placement(chapel, TilePos::new(0, 0), Orientation::North)
        .unwrap_err();
    assert_eq!(err, PlacementError::PrerequisiteMissing("house".into()));
    assert_eq!(settlement.snapshot(), pending);

    settlement.advance_progress(house, Progress::To(100)).unwrap();
    let id = settlement
        .request_placement(chapel, TilePos::new(0, 0), Orientation::North)
        .unwrap();
    assert!(settlement.registry().get(id).unwrap().is_complete());
    assert_eq!(settlement.ledger().resource("gold"), Some(20));
}

#[test]
fn completion_bonuses_apply_once() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let house = settlement
        .request_placement(kind(&settlement, "house"), TilePos::new(0, 0), Orientation::North)
        .unwrap();
    assert_eq!(settlement.ledger().stat("population"), Some(0));

    let mut completions = 0;
    for _ in 0..6 {
        let outcome = settlement.advance_progress(house, Progress::By(40)).unwrap();
        if outcome.completed_now {
            completions += 1;
        }
    }
    settlement.advance_progress(house, Progress::To(100)).unwrap();
    assert_eq!(completions, 1);
    assert_eq!(settlement.ledger().stat("population"), Some(5));
    assert_eq!(settlement.ledger().stat("housing"), Some(5));
    settlement.audit().unwrap();
}

#[test]
fn removing_a_complete_structure_restores_the_stats() {
    let theme = hamlet();
    let mut config = theme.config.clone();
    config.construction = ConstructionMode::Instant;
    let mut settlement = settle(&theme, config);
    let stats_before = settlement.ledger().stats().clone();
    let level_before = settlement.ledger().level();

    let tower = settlement
        .request_placement(kind(&settlement, "watchtower"), TilePos::new(2, 2), Orientation::North)
        .unwrap();
    assert_eq!(settlement.ledger().stat("security"), Some(10));
    assert_eq!(settlement.ledger().stat("income"), Some(5));

    settlement.request_removal(tower).unwrap();
    assert_eq!(settlement.ledger().stats(), &stats_before);
    assert_eq!(settlement.ledger().level(), level_before);
    assert!(settlement.grid().is_free(TilePos::new(2, 2)));
    assert_eq!(settlement.ledger().resource("gold"), Some(20));
    settlement.audit().unwrap();
}

#[test]
fn removing_a_pending_structure_changes_no_stats() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let stats_before = settlement.ledger().stats().clone();
    let tower = settlement
        .request_placement(kind(&settlement, "watchtower"), TilePos::new(2, 2), Orientation::North)
        .unwrap();
    settlement.advance_progress(tower, Progress::To(60)).unwrap();
    settlement.request_removal(tower).unwrap();
    assert_eq!(settlement.ledger().stats(), &stats_before);
}

#[test]
fn starter_and_unknown_ids_cannot_be_removed() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let hall = settlement.registry().protected().unwrap();
    for _ in 0..2 {
        assert_eq!(
            settlement.request_removal(hall),
            Err(RemovalError::ProtectedStructure(hall))
        );
    }
    let ghost = StructureId::new(999);
    assert_eq!(settlement.request_removal(ghost), Err(RemovalError::NotFound(ghost)));
    assert_eq!(settlement.registry().len(), 1);
}

#[test]
fn selection_is_exclusive_and_cleared_on_removal() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let house_kind = kind(&settlement, "house");
    let house = settlement
        .request_placement(house_kind, TilePos::new(0, 0), Orientation::North)
        .unwrap();

    settlement.select_building_kind(Some(house_kind)).unwrap();
    assert_eq!(settlement.selection(), Selection::Kind(house_kind));
    settlement.select_structure(Some(house)).unwrap();
    assert_eq!(settlement.selection(), Selection::Structure(house));

    let ghost = StructureId::new(42);
    assert_eq!(
        settlement.select_structure(Some(ghost)),
        Err(SelectionError::NotFound(ghost))
    );
    assert_eq!(settlement.selection(), Selection::Structure(house));

    settlement.request_removal(house).unwrap();
    assert_eq!(settlement.selection(), Selection::None);
}

#[test]
fn count_policy_levels_up_on_placement_and_never_drops() {
    let theme = hamlet();
    let mut settlement = settle(&theme, theme.config.clone());
    let house = kind(&settlement, "house");
    assert!(!settlement.buildable_kinds().contains(&kind(&settlement, "keep")));

    let first = settlement
        .request_placement(house, TilePos::new(0, 0), Orientation::North)
        .unwrap();
    assert_eq!(settlement.ledger().level(), 1);
    settlement
        .request_placement(house, TilePos::new(1, 0), Orientation::North)
        .unwrap();
    assert_eq!(settlement.ledger().level(), 2);
    assert!(settlement.buildable_kinds().contains(&kind(&settlement, "keep")));

    settlement.request_removal(first).unwrap();
    assert_eq!(settlement.ledger().level(), 2);
}

#[test]
fn initialize_rejects_bad_configuration() {
    let theme = hamlet();

    let err = Settlement::initialize("  ", "Town", theme.catalog.clone(), theme.config.clone()).unwrap_err();
    assert_eq!(err, ConfigError::EmptyName("player"));

    let mut config = theme.config.clone();
    config.terrain_weights.insert("lava".into(), 1.0);
    let err = Settlement::initialize("Ada", "Town", theme.catalog.clone(), config).unwrap_err();
    assert!(matches!(err, ConfigError::Catalog(_)));

    let mut config = theme.config.clone();
    config.starting_resources.insert("mana".into(), 3);
    let err = Settlement::initialize("Ada", "Town", theme.catalog.clone(), config).unwrap_err();
    assert!(matches!(err, ConfigError::Ledger(_)));

    let mut config = theme.config.clone();
    config.grid.width = 0;
    let err = Settlement::initialize("Ada", "Town", theme.catalog.clone(), config).unwrap_err();
    assert!(matches!(err, ConfigError::Grid(_)));

    let mut config = theme.config.clone();
    config.grid.width = 2;
    config.grid.height = 2;
    let err = Settlement::initialize("Ada", "Town", theme.catalog.clone(), config).unwrap_err();
    assert!(matches!(err, ConfigError::Starter(PlacementError::OutOfBounds(_))));
}
