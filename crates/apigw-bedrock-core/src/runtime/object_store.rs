//! In-memory model of the result bucket with lifecycle evaluation.

use super::capability::ObjectStore;
use crate::error::{Result, StackError};
use crate::resources::{LifecycleRule, ObjectAction, StorageClass};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

/// Time source for object ages.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc.timestamp_opt(1_704_067_200, 0).single().unwrap_or_default())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: usize,
    pub created: DateTime<Utc>,
    pub storage_class: StorageClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadInfo {
    pub upload_id: String,
    pub key: String,
    pub initiated: DateTime<Utc>,
}

/// What one lifecycle pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleReport {
    pub transitioned: Vec<String>,
    pub expired: Vec<String>,
    pub aborted_uploads: Vec<String>,
}

#[derive(Debug)]
struct StoredObject {
    body: Vec<u8>,
    created: DateTime<Utc>,
    storage_class: StorageClass,
}

#[derive(Debug)]
struct MultipartUpload {
    key: String,
    initiated: DateTime<Utc>,
    parts: BTreeMap<u32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<String, StoredObject>,
    uploads: BTreeMap<String, MultipartUpload>,
}

#[derive(Debug)]
pub struct MemoryObjectStore {
    bucket: String,
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new(bucket: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            bucket: bucket.to_string(),
            clock,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, key: &str, body: Vec<u8>) {
        let object = StoredObject {
            body,
            created: self.clock.now(),
            storage_class: StorageClass::Standard,
        };
        self.state().objects.insert(key.to_string(), object);
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.state().objects.get(key).map(|o| o.body.clone())
    }

    pub fn head(&self, key: &str) -> Option<ObjectInfo> {
        self.state().objects.get(key).map(|o| info_for(key, o))
    }

    pub fn remove(&self, key: &str) -> bool {
        self.state().objects.remove(key).is_some()
    }

    pub fn list(&self, prefix: &str) -> Vec<ObjectInfo> {
        self.state()
            .objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, o)| info_for(key, o))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state();
        state.objects.is_empty() && state.uploads.is_empty()
    }

    pub fn create_multipart_upload(&self, key: &str) -> String {
        let upload_id = Uuid::new_v4().simple().to_string();
        let upload = MultipartUpload {
            key: key.to_string(),
            initiated: self.clock.now(),
            parts: BTreeMap::new(),
        };
        self.state().uploads.insert(upload_id.clone(), upload);
        upload_id
    }

    pub fn upload_part(&self, upload_id: &str, part_number: u32, body: Vec<u8>) -> Result<()> {
        if !(1..=10_000).contains(&part_number) {
            return Err(StackError::storage(format!(
                "part number {} outside 1..=10000",
                part_number
            )));
        }
        let mut state = self.state();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| no_such_upload(upload_id))?;
        upload.parts.insert(part_number, body);
        Ok(())
    }

    /// Assemble parts in part-number order into a visible object.
    pub fn complete_multipart_upload(&self, upload_id: &str) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state();
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| no_such_upload(upload_id))?;
        if upload.parts.is_empty() {
            state.uploads.insert(upload_id.to_string(), upload);
            return Err(StackError::storage(format!(
                "upload {} has no parts",
                upload_id
            )));
        }
        let body = upload.parts.into_values().flatten().collect();
        state.objects.insert(
            upload.key,
            StoredObject {
                body,
                created: now,
                storage_class: StorageClass::Standard,
            },
        );
        Ok(())
    }

    pub fn abort_multipart_upload(&self, upload_id: &str) -> Result<()> {
        self.state()
            .uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| no_such_upload(upload_id))
    }

    pub fn list_multipart_uploads(&self) -> Vec<UploadInfo> {
        self.state()
            .uploads
            .iter()
            .map(|(id, upload)| UploadInfo {
                upload_id: id.clone(),
                key: upload.key.clone(),
                initiated: upload.initiated,
            })
            .collect()
    }

    /// Run one lifecycle pass at the current clock time.
    pub fn apply_lifecycle(&self, rule: &LifecycleRule) -> LifecycleReport {
        let now = self.clock.now();
        let mut report = LifecycleReport::default();
        let mut state = self.state();

        state.objects.retain(|key, object| {
            match rule.object_action(object.created, object.storage_class, now) {
                ObjectAction::Expire => {
                    report.expired.push(key.clone());
                    false
                }
                ObjectAction::Transition(class) => {
                    object.storage_class = class;
                    report.transitioned.push(key.clone());
                    true
                }
                ObjectAction::Keep => true,
            }
        });
        state.uploads.retain(|id, upload| {
            let abort = rule.should_abort_upload(upload.initiated, now);
            if abort {
                report.aborted_uploads.push(id.clone());
            }
            !abort
        });

        debug!(
            bucket = %self.bucket,
            transitioned = report.transitioned.len(),
            expired = report.expired.len(),
            aborted = report.aborted_uploads.len(),
            "Lifecycle pass"
        );
        report
    }

    /// Delete every object and pending upload. Returns how many objects went.
    pub fn purge(&self) -> usize {
        let mut state = self.state();
        let removed = state.objects.len();
        state.objects.clear();
        state.uploads.clear();
        info!(bucket = %self.bucket, objects = removed, "Emptied bucket");
        removed
    }
}

fn info_for(key: &str, object: &StoredObject) -> ObjectInfo {
    ObjectInfo {
        key: key.to_string(),
        size: object.body.len(),
        created: object.created,
        storage_class: object.storage_class,
    }
}

fn no_such_upload(upload_id: &str) -> StackError {
    StackError::storage(format!("no such upload: {}", upload_id))
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.put(key, body);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        self.get(key)
            .ok_or_else(|| StackError::storage(format!("no such key: {}", key)))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self.list(prefix).into_iter().map(|o| o.key).collect())
    }
}
