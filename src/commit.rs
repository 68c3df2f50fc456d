use crate::config::StoreConfig;
use crate::diff::Diff;
use crate::error::StoreError;
use crate::permission::CallerContext;
use crate::record::Record;
use crate::store::RecordStore;
use crate::stream::sink::CommitSink;
use crate::stream::{CancelToken, Source, run_stream};
use tracing::debug;

/// What a commit call applies. The union is exhaustive: every call site
/// handles each shape at compile time.
pub enum CommitInput<'a> {
    /// One diff, applied synchronously.
    Single(Diff),
    /// A homogeneous batch, atomic as a unit.
    Batch(Vec<Diff>),
    /// A lazy diff stream, applied through the streaming commit terminal.
    Stream {
        source: Box<dyn Source<Item = Diff> + 'a>,
        token: CancelToken,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The updated record of a single commit.
    Updated(Record),
    /// Updated records of a batch commit, in input order.
    UpdatedBatch(Vec<Record>),
    /// Total diffs processed by a stream commit.
    Streamed(u64),
}

/// Applies diffs to the store. Privileged: the caller's context is expected
/// to already carry administrator rights when this is invoked; unlike the
/// secret-store write there is no local re-check.
///
/// No retries, no rollback. A partially completed stream leaves
/// already-applied diffs applied; recovery belongs to the caller.
pub fn commit(
    ctx: &CallerContext,
    store: &dyn RecordStore,
    config: &StoreConfig,
    input: CommitInput<'_>,
) -> Result<CommitOutcome, StoreError> {
    match input {
        CommitInput::Single(diff) => {
            let updated = store.commit(diff)?;
            debug!(caller = %ctx.caller_id, id = %updated.id(), "committed one diff");
            Ok(CommitOutcome::Updated(updated))
        }
        CommitInput::Batch(diffs) => {
            let count = diffs.len();
            let updated = store.commit_all(diffs)?;
            debug!(caller = %ctx.caller_id, count, "committed diff batch");
            Ok(CommitOutcome::UpdatedBatch(updated))
        }
        CommitInput::Stream { source, token } => {
            let sink = CommitSink::new(store, config.commit_watermark);
            let total = run_stream(source, sink, &token)?;
            debug!(caller = %ctx.caller_id, total, "committed diff stream");
            Ok(CommitOutcome::Streamed(total))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CommitInput, CommitOutcome, commit};
    use crate::config::StoreConfig;
    use crate::diff::{Diff, TagWrite};
    use crate::permission::CallerContext;
    use crate::record::{TagName, TagValue};
    use crate::store::RecordStore;
    use crate::store::memory::MemStore;
    use crate::stream::{CancelToken, Items};
    use std::collections::BTreeMap;

    fn name_change(value: &str) -> BTreeMap<TagName, TagWrite> {
        [(
            TagName::from("name"),
            TagWrite::Value(TagValue::Text(value.into())),
        )]
        .into()
    }

    #[test]
    fn single_commit_returns_exactly_one_updated_record() {
        let store = MemStore::new();
        let ctx = CallerContext::admin("ops");
        let diff = Diff::build(None, Some(name_change("a")), &["add"]).expect("build");
        let outcome =
            commit(&ctx, &store, &StoreConfig::default(), CommitInput::Single(diff)).expect("commit");
        let CommitOutcome::Updated(record) = outcome else {
            panic!("single diff must yield a single record");
        };
        assert_eq!(record.get("name"), Some(&TagValue::Text("a".into())));
    }

    #[test]
    fn batch_commit_preserves_input_order() {
        let store = MemStore::new();
        let ctx = CallerContext::admin("ops");
        let diffs: Vec<_> = (0..3)
            .map(|i| {
                Diff::build(None, Some(name_change(&format!("r{i}"))), &["add"]).expect("build")
            })
            .collect();
        let outcome = commit(
            &ctx,
            &store,
            &StoreConfig::default(),
            CommitInput::Batch(diffs),
        )
        .expect("commit");
        let CommitOutcome::UpdatedBatch(records) = outcome else {
            panic!("batch must yield a batch");
        };
        let names: Vec<_> = records
            .iter()
            .map(|r| r.get("name").cloned().expect("name"))
            .collect();
        assert_eq!(
            names,
            vec![
                TagValue::Text("r0".into()),
                TagValue::Text("r1".into()),
                TagValue::Text("r2".into()),
            ]
        );
    }

    #[test]
    fn stream_commit_returns_processed_count() {
        let store = MemStore::new();
        let ctx = CallerContext::admin("ops");
        let diffs: Vec<_> = (0..25)
            .map(|i| {
                Diff::build(None, Some(name_change(&format!("r{i}"))), &["add"]).expect("build")
            })
            .collect();
        let outcome = commit(
            &ctx,
            &store,
            &StoreConfig::default(),
            CommitInput::Stream {
                source: Box::new(Items::new(diffs)),
                token: CancelToken::new(),
            },
        )
        .expect("commit");
        assert_eq!(outcome, CommitOutcome::Streamed(25));
        assert_eq!(store.read_count(&crate::store::Filter::all()).expect("count"), 25);
    }
}
