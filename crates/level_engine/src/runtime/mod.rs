mod clock;
mod easing;
mod edits;
mod metrics;
mod moves;
mod sections;
mod store;
mod world;

pub use clock::{plan_sim_steps, FixedStepClock, StepPlan};
pub use easing::Easing;
pub use edits::{EditQueueError, EditSender, LevelEdit};
pub use metrics::{MetricsAccumulator, MetricsHandle, SimulationMetricsSnapshot};
pub use moves::{
    MoveCommand, MoveHandle, MoveScheduler, MoveState, TickReport, FINISHED_HISTORY,
};
pub use sections::{SectionIndex, MAX_SECTION};
pub use store::{GroupTable, ObjectStore, PlacedObject};
pub use world::{RuntimeLevel, WorldTickReport};
