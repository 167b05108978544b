use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::api::storage::{ObjectLocation, ObjectStore};

/// Buckets held in memory
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashSet<ObjectLocation>>,
    mutations: Mutex<usize>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, bucket: &str, name: &str) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(ObjectLocation::new(bucket, name));
        self
    }

    pub fn contains(&self, bucket: &str, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains(&ObjectLocation::new(bucket, name))
    }

    /// Number of copy and delete calls that succeeded
    pub fn mutations(&self) -> usize {
        *self.mutations.lock().unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains(from) {
            bail!("No such object: {}", from);
        }
        objects.insert(to.clone());
        *self.mutations.lock().unwrap() += 1;
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        if !self.objects.lock().unwrap().remove(location) {
            bail!("No such object: {}", location);
        }
        *self.mutations.lock().unwrap() += 1;
        Ok(())
    }
}
