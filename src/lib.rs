//! Tagged-record store core.
//!
//! Callers read and mutate immutable, tag-mapped records through a small
//! function surface. Mutation is always expressed as a [`diff::Diff`] (an
//! original snapshot, proposed changes, and flags) committed synchronously,
//! as an atomic batch, or as a lazy stream whose in-flight asynchronous
//! applies are bounded by a backpressure watermark. Bulk reads run through
//! the same stream engine with cooperative cancellation.

pub mod api;
pub mod commit;
pub mod config;
pub mod diff;
pub mod error;
pub mod permission;
pub mod record;
pub mod registry;
pub mod store;
pub mod stream;

pub use crate::commit::{CommitInput, CommitOutcome, commit};
pub use crate::config::StoreConfig;
pub use crate::diff::{Diff, DiffFlags, TagWrite};
pub use crate::error::{StoreError, StoreErrorCode};
pub use crate::permission::CallerContext;
pub use crate::record::{RecId, Record, Table, TagName, TagValue, ValueKind};
pub use crate::store::{Filter, RecordStore};
pub use crate::stream::{CancelToken, Collect, Items, Sink, Source, run_stream};
