// Copyright 2022 Spanfile
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::debug;

/// How long an unclaimed cancellation, or the record of a finished job, is remembered.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(10);

/// Upper bound on remembered ids; the oldest entry is evicted first.
pub const MAX_REMEMBERED_IDS: usize = 1024;

/// Tracks in-flight compute jobs so they can be cancelled from another thread.
///
/// Besides the per-job flag, cancellation requests for ids that aren't registered yet are kept for a
/// while, so a cancel that overtakes its compute request still takes effect once the job registers.
/// A cancel for a job that finished recently is considered late and dropped, so it can't leak into
/// the next request that reuses the id.
#[derive(Debug)]
pub struct JobRegistry {
    active: Mutex<HashMap<String, Arc<AtomicBool>>>,
    pending: Mutex<RecentIds>,
    finished: Mutex<RecentIds>,
    ttl: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_pending_ttl(DEFAULT_PENDING_TTL)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_ttl(ttl: Duration) -> Self {
        Self {
            active: Mutex::default(),
            pending: Mutex::default(),
            finished: Mutex::default(),
            ttl,
        }
    }

    /// Register a job. It stays registered until the returned guard is dropped.
    pub fn register(&self, id: &str) -> JobGuard<'_> {
        let now = Instant::now();

        // lock order is active, pending, finished everywhere
        let mut active = self.active.lock();
        let cancelled = self.pending.lock().take(id, now, self.ttl);
        self.finished.lock().remove(id);

        let flag = Arc::new(AtomicBool::new(cancelled));
        active.insert(id.to_string(), Arc::clone(&flag));
        drop(active);

        debug!(job = id, cancelled, "registered job");

        JobGuard {
            registry: self,
            id: id.to_string(),
            flag,
        }
    }

    /// Request cancellation of a job. Returns whether a registered job was flagged.
    pub fn cancel(&self, id: &str) -> bool {
        let now = Instant::now();
        let active = self.active.lock();

        if let Some(flag) = active.get(id) {
            flag.store(true, Ordering::Relaxed);
            debug!(job = id, "cancellation flagged");
            return true;
        }

        let mut pending = self.pending.lock();
        if self.finished.lock().contains(id, now, self.ttl) {
            debug!(job = id, "ignoring cancellation of a finished job");
        } else {
            pending.insert(id, now, self.ttl);
            debug!(job = id, "cancellation pending");
        }

        false
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.lock().contains_key(id)
    }

    pub fn active_jobs(&self) -> usize {
        self.active.lock().len()
    }

    /// Whether an unexpired cancellation for `id` is waiting for the job to register.
    pub fn is_cancel_pending(&self, id: &str) -> bool {
        self.pending.lock().contains(id, Instant::now(), self.ttl)
    }

    /// Number of remembered cancellations, expired ones included until the next insertion.
    pub fn pending_cancels(&self) -> usize {
        self.pending.lock().len()
    }

    fn remove(&self, id: &str, flag: &Arc<AtomicBool>) {
        let now = Instant::now();
        let mut active = self.active.lock();

        // a newer registration under the same id keeps its entry
        if !active.get(id).map_or(false, |current| Arc::ptr_eq(current, flag)) {
            return;
        }

        active.remove(id);
        self.pending.lock().remove(id);
        self.finished.lock().insert(id, now, self.ttl);
    }
}

/// Ids with the time they were recorded, bounded by age and by [`MAX_REMEMBERED_IDS`].
#[derive(Debug, Default)]
struct RecentIds {
    entries: HashMap<String, Instant>,
}

impl RecentIds {
    fn insert(&mut self, id: &str, now: Instant, ttl: Duration) {
        self.entries
            .retain(|_, recorded| now.saturating_duration_since(*recorded) < ttl);

        if self.entries.len() >= MAX_REMEMBERED_IDS && !self.entries.contains_key(id) {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, recorded)| **recorded)
                .map(|(oldest, _)| oldest.clone());

            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(id.to_string(), now);
    }

    fn contains(&self, id: &str, now: Instant, ttl: Duration) -> bool {
        self.entries
            .get(id)
            .map_or(false, |recorded| now.saturating_duration_since(*recorded) < ttl)
    }

    fn take(&mut self, id: &str, now: Instant, ttl: Duration) -> bool {
        self.entries
            .remove(id)
            .map_or(false, |recorded| now.saturating_duration_since(recorded) < ttl)
    }

    fn remove(&mut self, id: &str) {
        self.entries.remove(id);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A registered job. Dropping the guard removes the job from its registry.
#[derive(Debug)]
pub struct JobGuard<'a> {
    registry: &'a JobRegistry,
    id: String,
    flag: Arc<AtomicBool>,
}

impl JobGuard<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(&self.id, &self.flag);
    }
}
