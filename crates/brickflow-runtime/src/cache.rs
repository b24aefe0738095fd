//! Memoizing invocation cache.
//!
//! Owns the fingerprint-to-result map used by the memo brick. The cache
//! guarantees at most one concurrent execution per fingerprint: concurrent
//! callers with the same fingerprint await the single in-flight computation
//! instead of re-executing. Completed results are retained for a bounded,
//! configurable period; errors are fanned out to current waiters but never
//! retained.
//!
//! All slot state lives behind one `std::sync::Mutex` that is never held
//! across a suspension point, replacing the ambient module-level promise
//! maps of older designs with a single-writer discipline. An in-flight slot
//! is released if its computation is dropped before settling, so an aborted
//! run never wedges later callers with the same fingerprint.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use brickflow_types::{BrickError, Result};

use crate::brick::ResolvedArgs;

enum Slot {
    InFlight {
        sender: broadcast::Sender<std::result::Result<Value, String>>,
        generation: u64,
    },
    Ready {
        value: Value,
        stored_at: Instant,
    },
}

enum Action {
    Hit(Value),
    Wait(broadcast::Receiver<std::result::Result<Value, String>>),
    Run {
        sender: broadcast::Sender<std::result::Result<Value, String>>,
        generation: u64,
    },
}

/// Fingerprint-keyed cache with single-flight semantics.
pub struct InvocationCache {
    ttl: Duration,
    generation: AtomicU64,
    slots: Mutex<HashMap<String, Slot>>,
}

/// Removes the in-flight slot if the initiating computation is dropped
/// before it settles. The generation check makes sure a late drop never
/// evicts a successor's slot under the same fingerprint.
struct InFlightGuard<'a> {
    cache: &'a InvocationCache,
    key: Option<String>,
    generation: u64,
}

impl InFlightGuard<'_> {
    fn disarm(&mut self) {
        self.key = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let mut slots = self.cache.lock_slots();
        let stale = matches!(
            slots.get(&key),
            Some(Slot::InFlight { generation, .. }) if *generation == self.generation
        );
        if stale {
            slots.remove(&key);
        }
    }
}

impl InvocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            generation: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stable digest of a step's evaluated arguments.
    ///
    /// Object keys are serialized in sorted order, so semantically equal
    /// argument maps always produce the same fingerprint. Pipeline-valued
    /// arguments are included: a different branch body never shares a cache
    /// entry.
    pub fn fingerprint(args: &ResolvedArgs) -> String {
        let mut canonical = String::new();
        canonical.push('{');
        let mut names: Vec<&String> = args.values.keys().collect();
        names.sort();
        for name in names {
            canonical.push_str(name);
            canonical.push('=');
            canonical_json(&args.values[name.as_str()], &mut canonical);
            canonical.push(';');
        }
        for (name, pipeline) in &args.pipelines {
            canonical.push_str(name);
            canonical.push('~');
            let as_value = serde_json::to_value(pipeline).unwrap_or(Value::Null);
            canonical_json(&as_value, &mut canonical);
            canonical.push(';');
        }
        canonical.push('}');

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Return the cached value for `key`, await the in-flight computation
    /// for it, or run `f` and record its result.
    ///
    /// Waiting is a suspension point and observes `cancel`. A failed
    /// computation is delivered to waiters as an unclassified error carrying
    /// the original message; only the initiating caller sees the structured
    /// error.
    pub async fn get_or_run<F, Fut>(
        &self,
        key: String,
        cancel: &CancellationToken,
        f: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let action = {
            let mut slots = self.lock_slots();
            match slots.get(&key) {
                Some(Slot::Ready { value, stored_at }) if stored_at.elapsed() < self.ttl => {
                    Action::Hit(value.clone())
                }
                Some(Slot::InFlight { sender, .. }) => Action::Wait(sender.subscribe()),
                _ => {
                    let (sender, _) = broadcast::channel(1);
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    slots.insert(
                        key.clone(),
                        Slot::InFlight {
                            sender: sender.clone(),
                            generation,
                        },
                    );
                    Action::Run { sender, generation }
                }
            }
        };

        match action {
            Action::Hit(value) => {
                tracing::debug!(fingerprint = %key, "Cache hit");
                Ok(value)
            }
            Action::Wait(mut receiver) => {
                tracing::debug!(fingerprint = %key, "Awaiting in-flight computation");
                tokio::select! {
                    _ = cancel.cancelled() => Err(BrickError::Cancelled),
                    received = receiver.recv() => match received {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(message)) => Err(BrickError::Other(message)),
                        Err(_) => Err(BrickError::Other(
                            "in-flight computation was dropped".to_string(),
                        )),
                    },
                }
            }
            Action::Run { sender, generation } => {
                let mut guard = InFlightGuard {
                    cache: self,
                    key: Some(key.clone()),
                    generation,
                };
                let result = f().await;
                {
                    let mut slots = self.lock_slots();
                    match &result {
                        Ok(value) => {
                            slots.insert(
                                key,
                                Slot::Ready {
                                    value: value.clone(),
                                    stored_at: Instant::now(),
                                },
                            );
                            let _ = sender.send(Ok(value.clone()));
                        }
                        Err(error) => {
                            slots.remove(&key);
                            let _ = sender.send(Err(error.to_string()));
                        }
                    }
                }
                guard.disarm();
                result
            }
        }
    }

    /// Drop completed entries older than the retention period.
    pub fn purge_expired(&self) {
        let mut slots = self.lock_slots();
        slots.retain(|_, slot| match slot {
            Slot::Ready { stored_at, .. } => stored_at.elapsed() < self.ttl,
            Slot::InFlight { .. } => true,
        });
    }

    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_slots().is_empty()
    }
}

impl Default for InvocationCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Serialize a value with object keys in sorted order.
fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for key in keys {
                out.push('"');
                out.push_str(key);
                out.push_str("\":");
                canonical_json(&map[key], out);
                out.push(',');
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for item in items {
                canonical_json(item, out);
                out.push(',');
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
