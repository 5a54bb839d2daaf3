//! Serialized rule applier
//!
//! Rule updates are grouped under a key. Per key at most one update runs at
//! a time; later ones wait in FIFO order. An update whose payload digest
//! equals the last successfully applied one for its key is skipped.
//!
//! Failures are returned to the caller that scheduled the failing job only.
//! Each job runs in its own task, so a panicking job fails like any other.
//! The lane keeps draining and the failed payload is not recorded, so an
//! identical retry runs again.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::hash::Hasher;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use twox_hash::XxHash64;

use crate::error::{ApplyError, RuleEngineError};

type JobFuture = Pin<Box<dyn Future<Output = Result<(), RuleEngineError>> + Send>>;
type Callable = Box<dyn FnOnce() -> JobFuture + Send>;

/// Digest of a payload, stable across processes.
pub fn payload_digest(payload: &Value) -> u64 {
    // Object keys are sorted, so equal values serialize identically
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(&bytes);
    hasher.finish()
}

/// A rule update waiting to run.
pub struct Job {
    payload: Value,
    digest: u64,
    callable: Callable,
}

impl Job {
    /// Build a job from the payload it applies and the call applying it.
    pub fn new<P, F, Fut>(payload: &P, callable: F) -> Result<Self, ApplyError>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), RuleEngineError>> + Send + 'static,
    {
        let payload = serde_json::to_value(payload).map_err(|e| ApplyError::Payload(e.to_string()))?;
        let digest = payload_digest(&payload);

        Ok(Self {
            payload,
            digest,
            callable: Box::new(move || Box::pin(callable())),
        })
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn digest(&self) -> u64 {
        self.digest
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("payload", &self.payload)
            .field("digest", &self.digest)
            .finish_non_exhaustive()
    }
}

/// How a scheduled job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Identical to the last applied payload, nothing was called
    Skipped,
}

struct Queued {
    job: Job,
    reply: oneshot::Sender<Result<Outcome, ApplyError>>,
}

#[derive(Default)]
struct Lane {
    locked: bool,
    queue: VecDeque<Queued>,
    last_applied: Option<u64>,
}

/// Per-key single-flight job queue. Clones share the same lanes.
#[derive(Clone, Default)]
pub struct Scheduler {
    lanes: Arc<Mutex<HashMap<String, Lane>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<String, Lane>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `job` under `key` and wait for it to finish.
    pub async fn schedule(&self, key: &str, job: Job) -> Result<Outcome, ApplyError> {
        let (reply, result) = oneshot::channel();

        let start_worker = {
            let mut lanes = self.lanes();
            let lane = lanes.entry(key.to_string()).or_default();
            lane.queue.push_back(Queued { job, reply });

            !std::mem::replace(&mut lane.locked, true)
        };

        if start_worker {
            tokio::spawn(self.clone().drain(key.to_string()));
        }

        result.await.map_err(|_| ApplyError::Dropped(key.to_string()))?
    }

    /// Digest of the last payload applied under `key`.
    pub fn last_applied(&self, key: &str) -> Option<u64> {
        self.lanes().get(key).and_then(|lane| lane.last_applied)
    }

    /// True when nothing runs or waits under `key`.
    pub fn is_idle(&self, key: &str) -> bool {
        self.lanes()
            .get(key)
            .map_or(true, |lane| !lane.locked && lane.queue.is_empty())
    }

    async fn drain(self, key: String) {
        loop {
            let (queued, last_applied) = {
                let mut lanes = self.lanes();
                let Some(lane) = lanes.get_mut(&key) else {
                    return;
                };

                match lane.queue.pop_front() {
                    Some(queued) => (queued, lane.last_applied),
                    None => {
                        lane.locked = false;
                        return;
                    }
                }
            };

            let Queued { job, reply } = queued;
            let digest = job.digest;

            let result = if last_applied == Some(digest) {
                log::debug!("Skipping unchanged rule update for \"{key}\"");
                Ok(Outcome::Skipped)
            } else {
                let callable = job.callable;
                match tokio::spawn(async move { callable().await }).await {
                    Ok(Ok(())) => {
                        if let Some(lane) = self.lanes().get_mut(&key) {
                            lane.last_applied = Some(digest);
                        }
                        Ok(Outcome::Applied)
                    }
                    Ok(Err(e)) => {
                        log::warn!("Rule update for \"{key}\" failed: {e}");
                        Err(ApplyError::Engine(e))
                    }
                    Err(e) => {
                        log::error!("Rule update for \"{key}\" did not finish: {e}");
                        Err(ApplyError::Panicked(key.clone()))
                    }
                }
            };

            // The caller may have stopped waiting
            let _ = reply.send(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_digest_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"a": 1, "b": [1, 2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b": [1, 2], "a": 1}"#).unwrap();
        assert_eq!(payload_digest(&a), payload_digest(&b));
        assert_ne!(payload_digest(&a), payload_digest(&json!({"a": 2, "b": [1, 2]})));
    }

    #[tokio::test]
    async fn test_skips_repeated_payload() {
        let scheduler = Scheduler::new();

        let job = Job::new(&json!({"ids": [1]}), || async { Ok(()) }).unwrap();
        assert_eq!(scheduler.schedule("whitelist", job).await, Ok(Outcome::Applied));

        let job = Job::new(&json!({"ids": [1]}), || async { Ok(()) }).unwrap();
        assert_eq!(scheduler.schedule("whitelist", job).await, Ok(Outcome::Skipped));

        // Another key has its own history
        let job = Job::new(&json!({"ids": [1]}), || async { Ok(()) }).unwrap();
        assert_eq!(scheduler.schedule("xhr", job).await, Ok(Outcome::Applied));

        assert!(scheduler.is_idle("whitelist"));
    }

    #[tokio::test]
    async fn test_failure_is_not_recorded() {
        let scheduler = Scheduler::new();

        let job = Job::new(&json!(1), || async { Err(RuleEngineError::Rejected("quota".to_string())) }).unwrap();
        let err = scheduler.schedule("xhr", job).await.unwrap_err();
        assert_eq!(err.to_string(), "Rule update rejected: quota");
        assert_eq!(scheduler.last_applied("xhr"), None);

        let job = Job::new(&json!(1), || async { Ok(()) }).unwrap();
        assert_eq!(scheduler.schedule("xhr", job).await, Ok(Outcome::Applied));
        assert_eq!(scheduler.last_applied("xhr"), Some(payload_digest(&json!(1))));
    }
}
