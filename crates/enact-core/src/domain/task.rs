use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::TaskId;

/// A unit of work submitted for remote processing.
///
/// Wire shape is a JSON object with at least `id`; any other fields are kept
/// in `payload` and forwarded to the worker untouched.
/// Immutable once built: the dispatcher only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Task {
    pub fn new(id: TaskId, mut payload: Map<String, Value>) -> Self {
        // `id` is owned by the typed field; a second one would collide on the wire.
        payload.remove("id");
        Self { id, payload }
    }

    pub fn with_id(id: TaskId) -> Self {
        Self::new(id, Map::new())
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}
