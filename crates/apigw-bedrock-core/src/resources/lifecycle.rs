//! Bucket lifecycle rule and its per-object evaluation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

pub const EXPIRATION_DAYS: i64 = 60;
pub const ABORT_INCOMPLETE_MULTIPART_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    #[default]
    Standard,
    IntelligentTiering,
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageClass::Standard => write!(f, "STANDARD"),
            StorageClass::IntelligentTiering => write!(f, "INTELLIGENT_TIERING"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub storage_class: StorageClass,
    pub after_days: i64,
}

/// What the rule does to one stored object at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAction {
    Keep,
    Transition(StorageClass),
    Expire,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleRule {
    pub id: String,
    pub expiration_days: i64,
    pub abort_incomplete_multipart_days: i64,
    pub transitions: Vec<Transition>,
}

impl Default for LifecycleRule {
    fn default() -> Self {
        Self {
            id: "ExpireAndTier".to_string(),
            expiration_days: EXPIRATION_DAYS,
            abort_incomplete_multipart_days: ABORT_INCOMPLETE_MULTIPART_DAYS,
            transitions: vec![Transition {
                storage_class: StorageClass::IntelligentTiering,
                after_days: 0,
            }],
        }
    }
}

impl LifecycleRule {
    /// Expiration takes precedence over any pending transition.
    pub fn object_action(
        &self,
        created: DateTime<Utc>,
        current: StorageClass,
        now: DateTime<Utc>,
    ) -> ObjectAction {
        let age = now.signed_duration_since(created);
        if age >= Duration::days(self.expiration_days) {
            return ObjectAction::Expire;
        }
        self.transitions
            .iter()
            .filter(|t| age >= Duration::days(t.after_days))
            .max_by_key(|t| t.after_days)
            .filter(|t| t.storage_class != current)
            .map_or(ObjectAction::Keep, |t| ObjectAction::Transition(t.storage_class))
    }

    pub fn should_abort_upload(&self, initiated: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(initiated) >= Duration::days(self.abort_incomplete_multipart_days)
    }

    /// `LifecycleConfiguration.Rules[]` entry.
    pub fn to_template(&self) -> Value {
        let transitions: Vec<Value> = self
            .transitions
            .iter()
            .map(|t| {
                json!({
                    "StorageClass": t.storage_class.to_string(),
                    "TransitionInDays": t.after_days,
                })
            })
            .collect();
        json!({
            "Id": self.id,
            "Status": "Enabled",
            "ExpirationInDays": self.expiration_days,
            "AbortIncompleteMultipartUpload": {
                "DaysAfterInitiation": self.abort_incomplete_multipart_days,
            },
            "Transitions": transitions,
        })
    }
}
