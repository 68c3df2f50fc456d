use crate::diff::{Diff, TagWrite};
use crate::error::StoreError;
use crate::record::{RecId, Record};
use crate::store::{Filter, RecordStore};
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};
use zeroize::Zeroizing;

#[derive(Default)]
struct StoreState {
    records: BTreeMap<RecId, Record>,
    secrets: HashMap<String, HashMap<String, String>>,
    next_seq: u64,
}

impl StoreState {
    fn take_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

#[derive(Default)]
struct ApplyQueue {
    pending: VecDeque<Diff>,
    enqueued: u64,
    applied: u64,
    failures: u64,
    shutdown: bool,
}

struct Shared {
    state: Mutex<StoreState>,
    queue: Mutex<ApplyQueue>,
    cv: Condvar,
}

/// In-process record store. Versioned records behind a lock, a FIFO apply
/// worker for asynchronous commits, and a condvar barrier that waits for the
/// queue to drain to the submission point.
pub struct MemStore {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(StoreState::default()),
            queue: Mutex::new(ApplyQueue::default()),
            cv: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("recstore-apply".into())
            .spawn(move || apply_worker(worker_shared))
            .expect("apply worker thread");
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Asynchronous applies that were rejected (e.g. version conflicts that
    /// surfaced while draining the queue). They are logged and counted, never
    /// retried.
    pub fn async_apply_failures(&self) -> u64 {
        self.shared.queue.lock().failures
    }

    pub fn record_count(&self) -> usize {
        self.shared.state.lock().records.len()
    }

    pub fn secret(&self, project: &str, key: &str) -> Option<String> {
        self.shared
            .state
            .lock()
            .secrets
            .get(project)
            .and_then(|scope| scope.get(key))
            .cloned()
    }
}

impl Drop for MemStore {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            self.shared.cv.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn apply_worker(shared: Arc<Shared>) {
    loop {
        let diff = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(diff) = queue.pending.pop_front() {
                    break diff;
                }
                if queue.shutdown {
                    return;
                }
                shared.cv.wait(&mut queue);
            }
        };

        let result = {
            let mut state = shared.state.lock();
            apply_diff(&mut state, diff)
        };

        let mut queue = shared.queue.lock();
        queue.applied += 1;
        if let Err(err) = result {
            queue.failures += 1;
            warn!(error = %err, "asynchronous apply rejected a diff");
        }
        shared.cv.notify_all();
    }
}

fn apply_diff(state: &mut StoreState, diff: Diff) -> Result<Record, StoreError> {
    if diff.is_add() {
        let id = diff
            .new_id()
            .ok_or_else(|| StoreError::Argument("add diff carries no id".into()))?;
        if state.records.contains_key(&id) {
            return Err(StoreError::Conflict(format!("record {id} already exists")));
        }
        let mut tags = BTreeMap::new();
        for (name, write) in diff.changes() {
            if let TagWrite::Value(value) = write {
                tags.insert(name.clone(), value.clone());
            }
        }
        let seq = state.take_seq();
        let record = Record::new(id, seq, tags, Default::default());
        state.records.insert(id, record.clone());
        return Ok(record);
    }

    let orig = diff
        .orig()
        .ok_or_else(|| StoreError::Argument("non-add diff carries no original snapshot".into()))?;
    let id = orig.id();
    let current = state
        .records
        .get(&id)
        .cloned()
        .ok_or_else(|| StoreError::record_not_found(id))?;
    if current.seq() != orig.seq() && !diff.is_forced() {
        return Err(StoreError::Conflict(format!(
            "record {id} changed since it was read (seq {} != {})",
            current.seq(),
            orig.seq()
        )));
    }

    if diff.is_remove() {
        state.records.remove(&id);
        return Ok(current);
    }

    let mut tags = current.tags().clone();
    let mut transient = current.transient_tag_names().clone();
    for (name, write) in diff.changes() {
        match write {
            TagWrite::Value(value) => {
                tags.insert(name.clone(), value.clone());
                if diff.is_transient() {
                    transient.insert(name.clone());
                } else {
                    transient.remove(name.as_str());
                }
            }
            TagWrite::Remove => {
                tags.remove(name.as_str());
                transient.remove(name.as_str());
            }
        }
    }
    let seq = state.take_seq();
    let record = Record::new(id, seq, tags, transient);
    state.records.insert(id, record.clone());
    Ok(record)
}

struct ScanIter<'a> {
    shared: &'a Shared,
    filter: &'a Filter,
    cursor: Option<RecId>,
}

impl Iterator for ScanIter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let state = self.shared.state.lock();
        let lower = match self.cursor {
            None => Bound::Unbounded,
            Some(id) => Bound::Excluded(id),
        };
        for (id, record) in state.records.range((lower, Bound::Unbounded)) {
            if self.filter.matches(record) {
                self.cursor = Some(*id);
                return Some(record.clone());
            }
        }
        // Remember the exhausted position so a drained iterator stays drained
        // even if records are inserted behind it.
        self.cursor = state.records.keys().next_back().copied().or(self.cursor);
        None
    }
}

impl RecordStore for MemStore {
    fn read_by_id(&self, id: RecId) -> Result<Option<Record>, StoreError> {
        Ok(self.shared.state.lock().records.get(&id).cloned())
    }

    fn scan<'a>(&'a self, filter: &'a Filter) -> Box<dyn Iterator<Item = Record> + 'a> {
        Box::new(ScanIter {
            shared: &*self.shared,
            filter,
            cursor: None,
        })
    }

    fn read_count(&self, filter: &Filter) -> Result<u64, StoreError> {
        let state = self.shared.state.lock();
        Ok(state
            .records
            .values()
            .filter(|record| filter.matches(record))
            .count() as u64)
    }

    fn commit(&self, diff: Diff) -> Result<Record, StoreError> {
        let mut state = self.shared.state.lock();
        apply_diff(&mut state, diff)
    }

    fn commit_all(&self, diffs: Vec<Diff>) -> Result<Vec<Record>, StoreError> {
        let mut state = self.shared.state.lock();
        // Stage against a copy so a failing diff leaves nothing applied.
        let mut staged = StoreState {
            records: state.records.clone(),
            secrets: HashMap::new(),
            next_seq: state.next_seq,
        };
        let mut updated = Vec::with_capacity(diffs.len());
        for diff in diffs {
            updated.push(apply_diff(&mut staged, diff)?);
        }
        state.records = staged.records;
        state.next_seq = staged.next_seq;
        Ok(updated)
    }

    fn commit_async(&self, diff: Diff) -> Result<(), StoreError> {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return Err(StoreError::Store("store is shutting down".into()));
        }
        queue.pending.push_back(diff);
        queue.enqueued += 1;
        self.shared.cv.notify_all();
        Ok(())
    }

    fn barrier(&self) -> Result<(), StoreError> {
        let mut queue = self.shared.queue.lock();
        let target = queue.enqueued;
        while queue.applied < target {
            if queue.shutdown && queue.pending.is_empty() {
                return Err(StoreError::Store(
                    "store shut down with unapplied diffs".into(),
                ));
            }
            self.shared.cv.wait(&mut queue);
        }
        debug!(applied = queue.applied, "barrier drained async queue");
        Ok(())
    }

    fn secret_set(
        &self,
        project: &str,
        key: &str,
        value: Zeroizing<String>,
    ) -> Result<(), StoreError> {
        let mut state = self.shared.state.lock();
        state
            .secrets
            .entry(project.to_string())
            .or_default()
            .insert(key.to_string(), value.as_str().to_string());
        Ok(())
    }
}
