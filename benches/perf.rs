use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use recstore::store::memory::MemStore;
use recstore::{
    CallerContext, CancelToken, Collect, CommitInput, Diff, Filter, Items, RecordStore,
    StoreConfig, TagValue, TagWrite, commit, run_stream,
};
use recstore::api::read_all_stream;
use std::collections::BTreeMap;

const SEEDED_RECORDS: usize = 10_000;
const STREAM_DIFFS: usize = 1_000;

fn add_diff(i: usize) -> Diff {
    let changes: BTreeMap<_, _> = [
        (
            "name".into(),
            TagWrite::Value(TagValue::Text(format!("rec-{i}").into())),
        ),
        ("rank".into(), TagWrite::Value(TagValue::Integer(i as i64))),
    ]
    .into();
    Diff::build(None, Some(changes), &["add"]).expect("build")
}

fn seeded_store() -> MemStore {
    let store = MemStore::new();
    for i in 0..SEEDED_RECORDS {
        store.commit(add_diff(i)).expect("seed");
    }
    store
}

fn bench_stream_commit(c: &mut Criterion) {
    let ctx = CallerContext::admin("bench");
    let config = StoreConfig::default();
    c.bench_function("stream_commit_1k", |b| {
        b.iter_batched(
            || {
                let store = MemStore::new();
                let diffs: Vec<_> = (0..STREAM_DIFFS).map(add_diff).collect();
                (store, diffs)
            },
            |(store, diffs)| {
                let outcome = commit(
                    &ctx,
                    &store,
                    &config,
                    CommitInput::Stream {
                        source: Box::new(Items::new(diffs)),
                        token: CancelToken::new(),
                    },
                )
                .expect("commit");
                black_box(outcome);
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_filter_scan(c: &mut Criterion) {
    let store = seeded_store();
    let filter = Filter::new(|record| {
        matches!(record.get("rank"), Some(TagValue::Integer(rank)) if rank % 7 == 0)
    });
    c.bench_function("filter_scan_10k", |b| {
        b.iter(|| {
            let token = CancelToken::new();
            let records =
                run_stream(read_all_stream(&store, &filter), Collect::new(), &token)
                    .expect("run");
            black_box(records.len());
        })
    });
}

criterion_group!(benches, bench_stream_commit, bench_filter_scan);
criterion_main!(benches);
