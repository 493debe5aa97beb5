//! Application services for definition management, dispatch and scheduling.

mod coordinator;
mod definitions;
mod registry;
mod resolver;
mod scheduler;

pub use coordinator::{ExecutionCoordinator, ExecutionError, ExecutionResult, RunDispatcher};
pub use definitions::{
    BackupDefinitionService, DefinitionServiceError, DefinitionServiceResult, validate_cron,
};
pub use registry::{DueFire, ScheduleRegistry, ScheduleState};
pub use resolver::{DestinationError, DestinationResolver, DestinationResult};
pub use scheduler::{BackupScheduler, ScheduleSink, TriggerError};
