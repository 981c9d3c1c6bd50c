//! Notification sink that records every published batch.

use std::sync::Arc;

use berth_core::{ObjectId, ObjectInfo};
use berth_store::NotificationSink;
use parking_lot::Mutex;

/// Records notification batches for later assertions.
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<ObjectInfo>>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce the boxed callback to hand to the directory.
    #[must_use]
    pub fn sink(&self) -> NotificationSink {
        let batches = Arc::clone(&self.batches);
        Box::new(move |infos: &[ObjectInfo]| {
            batches.lock().push(infos.to_vec());
        })
    }

    /// Every batch, in publication order.
    #[must_use]
    pub fn batches(&self) -> Vec<Vec<ObjectInfo>> {
        self.batches.lock().clone()
    }

    /// Every record, flattened across batches.
    #[must_use]
    pub fn records(&self) -> Vec<ObjectInfo> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Ids announced as deleted, in order.
    #[must_use]
    pub fn deletions(&self) -> Vec<ObjectId> {
        self.records()
            .into_iter()
            .filter(|info| info.is_deletion)
            .map(|info| info.object_id)
            .collect()
    }

    /// Ids announced as created/sealed, in order.
    #[must_use]
    pub fn announcements(&self) -> Vec<ObjectId> {
        self.records()
            .into_iter()
            .filter(|info| !info.is_deletion)
            .map(|info| info.object_id)
            .collect()
    }

    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}
