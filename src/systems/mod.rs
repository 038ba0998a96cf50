mod accrual;
mod consumption;
mod construction;
mod income;
pub(crate) mod level;
pub(crate) mod production;

pub use accrual::AccrualSystem;
pub use consumption::ConsumptionSystem;
pub use construction::ConstructionSystem;
pub use income::IncomeSystem;
pub use level::LevelSystem;
pub use production::ProductionSystem;

use crate::{config::TickPolicy, engine::System};

/// Default stage order for a tick policy.
pub fn pipeline(policy: &TickPolicy) -> Vec<Box<dyn System>> {
    match policy {
        TickPolicy::Turn(_) => vec![
            Box::new(IncomeSystem::new()),
            Box::new(ProductionSystem::new()),
            Box::new(ConsumptionSystem::new()),
            Box::new(ConstructionSystem::new()),
            Box::new(LevelSystem::new()),
        ],
        TickPolicy::Passive(_) => vec![
            Box::new(AccrualSystem::new()),
            Box::new(IncomeSystem::new()),
            Box::new(ProductionSystem::new()),
            Box::new(ConstructionSystem::new()),
            Box::new(LevelSystem::new()),
        ],
    }
}
