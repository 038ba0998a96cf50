use std::time::Duration;

use hearthgrid::{
    config::ConstructionMode, ledger::Shortfall, AccrualError, BuildingKind, Orientation,
    Settlement, SharedSettlement, StartError, StructureId, Theme, TilePos,
};

fn startup() -> SharedSettlement {
    let theme = Theme::builtin("startup").unwrap();
    let settlement =
        Settlement::initialize("Grace", "Hopper Labs", theme.catalog.clone(), theme.config.clone())
            .unwrap();
    SharedSettlement::new(settlement)
}

fn cash(shared: &SharedSettlement) -> i64 {
    shared.lock().ledger().resource("cash").unwrap()
}

fn place_anywhere(settlement: &mut Settlement, kind: BuildingKind) -> StructureId {
    let (width, height) = (settlement.grid().width() as i32, settlement.grid().height() as i32);
    (0..height)
        .flat_map(|z| (0..width).map(move |x| TilePos::new(x, z)))
        .find_map(|origin| settlement.request_placement(kind, origin, Orientation::North).ok())
        .expect("campus has room")
}

#[tokio::test(start_paused = true)]
async fn accrual_credits_once_per_interval() {
    let shared = startup();
    let before = cash(&shared);
    shared.start_accrual().unwrap();
    assert!(shared.is_accruing());

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(cash(&shared), before + 30);
    assert_eq!(shared.lock().tick(), 3);
    shared.stop_accrual();
}

#[tokio::test(start_paused = true)]
async fn stop_is_immediate_and_idempotent() {
    let shared = startup();
    shared.start_accrual().unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    shared.stop_accrual();
    let frozen = cash(&shared);

    shared.stop_accrual();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(cash(&shared), frozen);
    assert!(!shared.is_accruing());

    shared.start_accrual().unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(cash(&shared), frozen + 10);
    shared.stop_accrual();
}

#[tokio::test(start_paused = true)]
async fn construction_advances_with_accrual() {
    let shared = startup();
    let office = {
        let mut settlement = shared.lock();
        let kind = settlement.catalog().building_kind("dev_office").unwrap();
        (0..50)
            .flat_map(|z| (0..50).map(move |x| TilePos::new(x, z)))
            .find_map(|origin| {
                settlement
                    .request_placement(kind, origin, Orientation::North)
                    .ok()
            })
            .expect("campus has room for an office")
    };
    let employees = shared.lock().ledger().stat("employees").unwrap();

    shared.start_accrual().unwrap();
    tokio::time::sleep(Duration::from_millis(9_500)).await;
    assert_eq!(shared.lock().registry().get(office).unwrap().progress, 90);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    shared.stop_accrual();
    let settlement = shared.lock();
    assert!(settlement.registry().get(office).unwrap().is_complete());
    assert_eq!(settlement.ledger().stat("employees"), Some(employees + 8));
    settlement.audit().unwrap();
}

#[test]
fn upgrades_cost_more_each_level() {
    let shared = startup();
    let mut settlement = shared.lock();
    assert_eq!(settlement.ledger().resource("cash"), Some(1_000));

    assert_eq!(settlement.upgrade_accrual(), Ok(20));
    assert_eq!(settlement.ledger().resource("cash"), Some(0));

    assert_eq!(
        settlement.upgrade_accrual(),
        Err(AccrualError::InsufficientResources(Shortfall {
            resource: "cash".into(),
            required: 2_000,
            available: 0,
        }))
    );
    assert_eq!(settlement.state().accrual().unwrap().rate, 20);
    assert_eq!(settlement.snapshot().accrual.unwrap().upgrade_level, 2);
}

#[test]
fn turn_based_settlements_have_no_accrual() {
    let theme = Theme::builtin("kingdom").unwrap();
    let settlement =
        Settlement::initialize("Arthur", "Camelot", theme.catalog.clone(), theme.config.clone())
            .unwrap();
    let shared = SharedSettlement::new(settlement);
    assert_eq!(shared.start_accrual(), Err(AccrualError::NotPassive));
    assert_eq!(shared.lock().upgrade_accrual(), Err(AccrualError::NotPassive));
    assert!(shared.lock().snapshot().accrual.is_none());
}

#[tokio::test(start_paused = true)]
async fn shared_initialize_starts_passive_accrual() {
    let theme = Theme::builtin("startup").unwrap();
    let shared =
        SharedSettlement::initialize("Grace", "Hopper Labs", theme.catalog.clone(), theme.config.clone())
            .unwrap();
    assert!(shared.is_accruing());
    let before = cash(&shared);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert_eq!(cash(&shared), before + 30);
    shared.stop_accrual();
}

#[tokio::test(start_paused = true)]
async fn shared_initialize_leaves_turn_settlements_idle() {
    let theme = Theme::builtin("kingdom").unwrap();
    let shared =
        SharedSettlement::initialize("Arthur", "Camelot", theme.catalog.clone(), theme.config.clone())
            .unwrap();
    assert!(!shared.is_accruing());
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(shared.lock().tick(), 0);
}

#[test]
fn shared_initialize_needs_a_runtime_for_passive_themes() {
    let theme = Theme::builtin("startup").unwrap();
    let err =
        SharedSettlement::initialize("Grace", "Hopper Labs", theme.catalog.clone(), theme.config.clone())
            .unwrap_err();
    assert_eq!(err, StartError::Accrual(AccrualError::NoRuntime));
}

#[tokio::test(start_paused = true)]
async fn passive_ticks_pay_net_income() {
    let theme = Theme::builtin("startup").unwrap();
    let mut config = theme.config.clone();
    config.construction = ConstructionMode::Instant;
    let mut settlement =
        Settlement::initialize("Grace", "Hopper Labs", theme.catalog.clone(), config).unwrap();
    let office = settlement.catalog().building_kind("dev_office").unwrap();
    place_anywhere(&mut settlement, office);
    assert_eq!(settlement.ledger().stat("income"), Some(25));
    assert_eq!(settlement.ledger().stat("upkeep"), Some(10));
    let tokens = settlement.ledger().resource("data_tokens").unwrap();

    let shared = SharedSettlement::new(settlement);
    shared.start_accrual().unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    shared.stop_accrual();

    // Net income 15 plus the headquarters' 5 tokens, three times.
    assert_eq!(
        shared.lock().ledger().resource("data_tokens"),
        Some(tokens + 3 * 20)
    );
}

#[test]
fn processing_power_tracks_the_level() {
    let theme = Theme::builtin("startup").unwrap();
    let mut config = theme.config.clone();
    config.construction = ConstructionMode::Instant;
    let mut settlement =
        Settlement::initialize("Grace", "Hopper Labs", theme.catalog.clone(), config).unwrap();
    assert_eq!(settlement.ledger().stat("processing_power"), Some(1));

    let office = settlement.catalog().building_kind("dev_office").unwrap();
    place_anywhere(&mut settlement, office);
    place_anywhere(&mut settlement, office);
    assert_eq!(settlement.ledger().level(), 2);
    assert_eq!(settlement.ledger().stat("processing_power"), Some(2));
    settlement.audit().unwrap();
}
