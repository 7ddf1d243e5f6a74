use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::request::fields;
use crate::journey::JourneyStop;

/// Form state keyed by field name.
pub type FormPayload = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DraftId(pub String);

impl DraftId {
    pub fn generate() -> Self {
        Self(format!("DRAFT-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSource {
    Local,
    Remote,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequestDraft {
    pub id: DraftId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source: DraftSource,
    /// Bumped by the writer on every save; lower revisions are stale.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub current_step: usize,
    pub payload: FormPayload,
}

impl ServiceRequestDraft {
    pub fn new(id: DraftId, payload: FormPayload, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            source: DraftSource::Local,
            revision: 0,
            current_step: 0,
            payload,
        }
    }

    pub fn with_source(mut self, source: DraftSource) -> Self {
        self.source = source;
        self
    }

    /// Structured fields that must decode for the draft to be resumable.
    pub fn integrity_problem(&self) -> Option<String> {
        if let Some(stops) = self.payload.get(fields::JOURNEY_STOPS) {
            if !stops.is_null() {
                if let Err(error) = serde_json::from_value::<Vec<JourneyStop>>(stops.clone()) {
                    return Some(format!("`{}` does not decode: {error}", fields::JOURNEY_STOPS));
                }
            }
        }

        if let Some(items) = self.payload.get(fields::ITEMS) {
            if !items.is_null() && !items.is_array() {
                return Some(format!("`{}` must be a list", fields::ITEMS));
            }
        }

        None
    }
}
