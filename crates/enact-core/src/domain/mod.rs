//! Domain model (ids, task, outcome, decision, retry policy, status).

pub mod decision;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod retry;
pub mod state;
pub mod status;
pub mod task;

pub use self::decision::{Decision, DefaultDecider};
pub use self::errors::{DeliveryError, PolicyError, StoreError, TaskError};
pub use self::ids::{ErrorId, TaskId};
pub use self::outcome::Outcome;
pub use self::retry::RetryPolicy;
pub use self::state::DispatchState;
pub use self::status::{FailureDetail, StatusKind, StatusRecord, TerminalStatus};
pub use self::task::Task;
