pub mod memory;

use crate::diff::Diff;
use crate::error::StoreError;
use crate::record::{RecId, Record};
use zeroize::Zeroizing;

/// An opaque predicate over record tags. The core never inspects it; it is
/// handed to the store as a black box. Filters typically originate in an
/// external expression-language evaluator.
pub struct Filter(Box<dyn Fn(&Record) -> bool + Send + Sync>);

impl Filter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self(Box::new(predicate))
    }

    /// Matches every record.
    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn matches(&self, record: &Record) -> bool {
        (self.0)(record)
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Filter(..)")
    }
}

/// The record store the core commits through. Reads and the two commit forms
/// are synchronous and block until the store answers; `commit_async` only
/// enqueues, and `barrier` blocks until everything enqueued so far has been
/// applied.
///
/// Diffs enqueued by one caller are applied in submission order relative to
/// each other; nothing is guaranteed across concurrent callers.
pub trait RecordStore: Send + Sync {
    fn read_by_id(&self, id: RecId) -> Result<Option<Record>, StoreError>;

    /// Lazy scan in the store's natural order. Each matching record is
    /// visited at most once; nothing is buffered ahead of the iterator.
    fn scan<'a>(&'a self, filter: &'a Filter) -> Box<dyn Iterator<Item = Record> + 'a>;

    fn read_count(&self, filter: &Filter) -> Result<u64, StoreError>;

    /// Applies one diff synchronously; returns the updated record (the last
    /// stored snapshot for removals). Rejects with a conflict error when the
    /// record's version diverged from the diff's snapshot and `force` is
    /// absent.
    fn commit(&self, diff: Diff) -> Result<Record, StoreError>;

    /// Applies a batch atomically as a unit; returns updated records in
    /// input order.
    fn commit_all(&self, diffs: Vec<Diff>) -> Result<Vec<Record>, StoreError>;

    /// Enqueues a diff for asynchronous apply. Acceptance is not
    /// application; pair with `barrier` for confirmation.
    fn commit_async(&self, diff: Diff) -> Result<(), StoreError>;

    /// Blocks until every diff enqueued through `commit_async` before this
    /// call has been applied. No timeout at this layer.
    fn barrier(&self) -> Result<(), StoreError>;

    /// Per-project key/value secret store. The value is wiped from memory
    /// once the store has taken it over.
    fn secret_set(
        &self,
        project: &str,
        key: &str,
        value: Zeroizing<String>,
    ) -> Result<(), StoreError>;
}
