use crate::error::StoreError;
use crate::record::{RecId, Record};
use crate::store::{Filter, RecordStore};
use crate::stream::{CancelToken, Source};
use tracing::debug;

/// Lazy producer over records matching a filter. Pulls from the store's scan
/// one record at a time, with nothing buffered ahead of the consumer, and
/// observes the token after each emission, so cancellation stops the scan at
/// the next record boundary without touching the store again.
pub struct FilterScan<'a> {
    store: &'a dyn RecordStore,
    filter: &'a Filter,
}

impl<'a> FilterScan<'a> {
    pub fn new(store: &'a dyn RecordStore, filter: &'a Filter) -> Self {
        Self { store, filter }
    }
}

impl Source for FilterScan<'_> {
    type Item = Record;

    fn produce(
        &mut self,
        emit: &mut dyn FnMut(Record) -> Result<(), StoreError>,
        token: &CancelToken,
    ) -> Result<(), StoreError> {
        for record in self.store.scan(self.filter) {
            emit(record)?;
            if token.is_cancelled() {
                break;
            }
        }
        Ok(())
    }
}

/// Lazy producer over a caller-supplied ordered id list. Ids absent from the
/// store are silently skipped (no emission, no error) in both checked and
/// unchecked mode; emission order preserves input order among found records.
/// This intentionally differs from the non-streaming batch read, whose
/// checked mode errors on the first missing id.
pub struct IdScan<'a> {
    store: &'a dyn RecordStore,
    ids: std::vec::IntoIter<RecId>,
    checked: bool,
}

impl<'a> IdScan<'a> {
    pub fn new(store: &'a dyn RecordStore, ids: Vec<RecId>, checked: bool) -> Self {
        Self {
            store,
            ids: ids.into_iter(),
            checked,
        }
    }
}

impl Source for IdScan<'_> {
    type Item = Record;

    fn produce(
        &mut self,
        emit: &mut dyn FnMut(Record) -> Result<(), StoreError>,
        token: &CancelToken,
    ) -> Result<(), StoreError> {
        for id in self.ids.by_ref() {
            match self.store.read_by_id(id)? {
                Some(record) => {
                    emit(record)?;
                    if token.is_cancelled() {
                        break;
                    }
                }
                None => {
                    if self.checked {
                        debug!(%id, "checked id stream skipping missing record");
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FilterScan, IdScan};
    use crate::diff::Diff;
    use crate::record::RecId;
    use crate::store::memory::MemStore;
    use crate::store::{Filter, RecordStore};
    use crate::stream::{CancelToken, Collect, run_stream};

    fn seed(store: &MemStore, n: usize) -> Vec<RecId> {
        (0..n)
            .map(|_| {
                store
                    .commit(Diff::build(None, None, &["add"]).expect("build"))
                    .expect("commit")
                    .id()
            })
            .collect()
    }

    #[test]
    fn filter_scan_emits_every_match() {
        let store = MemStore::new();
        seed(&store, 5);
        let filter = Filter::all();
        let token = CancelToken::new();
        let records = run_stream(
            FilterScan::new(&store, &filter),
            Collect::new(),
            &token,
        )
        .expect("run");
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn id_scan_skips_missing_ids_and_preserves_order() {
        let store = MemStore::new();
        let ids = seed(&store, 2);
        let token = CancelToken::new();
        let records = run_stream(
            IdScan::new(&store, vec![ids[0], RecId::fresh(), ids[1]], true),
            Collect::new(),
            &token,
        )
        .expect("run");
        let emitted: Vec<_> = records.iter().map(|r| r.id()).collect();
        assert_eq!(emitted, vec![ids[0], ids[1]]);
    }
}
