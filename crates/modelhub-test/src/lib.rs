//! Helpers for testing the metadata cache.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all
//!    console output is captured by the test runner.
//!
//!  - The [`InMemoryStore`] counts `head` and `get` calls. Tests asserting
//!    on fetch behavior should read the counters rather than poke at cache
//!    internals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

use modelhub_sources::{ObjectStore, StoreError};

/// Setup the test environment.
///
///  - Initializes logs: the logger only captures logs from the modelhub
///    crates and mutes everything else.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("modelhub_service=trace,modelhub_cache=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// An [`ObjectStore`] holding objects in memory.
///
/// Content hashes are SHA-256 digests, so rewriting an object under the same
/// key always changes its hash. All `head`/`get` calls are counted.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    head_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an object, replacing any previous contents.
    pub fn put(&self, bucket: &str, key: &str, contents: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_owned(), key.to_owned()), contents.into());
    }

    /// Deletes an object. Deleting a missing object is fine.
    pub fn remove(&self, bucket: &str, key: &str) {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_owned(), key.to_owned()));
    }

    /// How many `head` calls the store has served so far.
    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::Relaxed)
    }

    /// How many `get` calls the store has served so far.
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::Relaxed)
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

impl ObjectStore for InMemoryStore {
    fn head<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move {
            self.head_calls.fetch_add(1, Ordering::Relaxed);
            let contents = self.lookup(bucket, key)?;
            Ok(format!("{:x}", Sha256::digest(&contents)))
        })
    }

    fn get<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, StoreError>> {
        Box::pin(async move {
            self.get_calls.fetch_add(1, Ordering::Relaxed);
            self.lookup(bucket, key)
        })
    }
}

/// The spec key a [`header_json`] entry points at.
pub fn spec_key_for(model_id: &str, version: &str) -> String {
    format!("specs/{model_id}/{version}.json")
}

/// Builds one manifest row.
pub fn header_json(model_id: &str, version: &str, min_version: &str) -> serde_json::Value {
    json!({
        "model_id": model_id,
        "version": version,
        "min_version": min_version,
        "spec_key": spec_key_for(model_id, version),
    })
}

/// Serializes manifest rows into a manifest document.
pub fn manifest_json(headers: &[serde_json::Value]) -> Vec<u8> {
    serde_json::to_vec(&headers).unwrap()
}

/// Builds a spec document for one concrete model version.
pub fn specs_json(model_id: &str, version: &str) -> Vec<u8> {
    let specs = json!({
        "model_id": model_id,
        "version": version,
        "min_sdk_version": "1.0.0",
        "training_supported": true,
        "incremental_training_supported": false,
        "hosting_ecr_specs": {
            "framework": "pytorch",
            "framework_version": "1.5.0",
            "py_version": "py3"
        },
        "hosting_artifact_key": format!("artifacts/{model_id}/{version}/infer.tar.gz"),
        "hosting_script_key": format!("scripts/{model_id}/{version}/sourcedir.tar.gz"),
        "hyperparameters": [
            {
                "name": "epochs",
                "type": "int",
                "default": 3,
                "min": 1,
                "max": 1000,
                "scope": "algorithm"
            }
        ],
        "inference_environment_variables": [
            {
                "name": "MODEL_SERVER_WORKERS",
                "type": "int",
                "default": 1,
                "scope": "container"
            }
        ],
        "inference_vulnerable": false,
        "training_vulnerable": false,
        "deprecated": false
    });
    serde_json::to_vec(&specs).unwrap()
}
