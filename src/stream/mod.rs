//! Generic linear pipeline for bulk operations: a lazy source produces items
//! one at a time, a terminal sink consumes them and finalizes into a single
//! result. One stream run is one logical flow of control; there is no
//! internal fan-out, and stages are single-use.

pub mod sink;
pub mod source;

use crate::error::StoreError;
use crate::record::Record;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation handle shared between a consumer and a producer.
/// Producers check it at item boundaries only; a set token never interrupts
/// the evaluation of the item in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A producer stage. `produce` owns the iteration: it pushes each item into
/// `emit`, checks the token after every emission, and returns once the input
/// is exhausted, the token is set, or `emit` fails.
pub trait Source {
    type Item;

    fn produce(
        &mut self,
        emit: &mut dyn FnMut(Self::Item) -> Result<(), StoreError>,
        token: &CancelToken,
    ) -> Result<(), StoreError>;
}

impl<S: Source + ?Sized> Source for Box<S> {
    type Item = S::Item;

    fn produce(
        &mut self,
        emit: &mut dyn FnMut(Self::Item) -> Result<(), StoreError>,
        token: &CancelToken,
    ) -> Result<(), StoreError> {
        (**self).produce(emit, token)
    }
}

/// A consumer stage. `on_start` runs once before production begins,
/// `on_data` once per arriving item, and `on_run` once after upstream
/// finishes (exhausted or cancelled) to compute the final result.
pub trait Sink<T> {
    type Out;

    fn on_start(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn on_data(&mut self, item: T) -> Result<(), StoreError>;

    fn on_run(&mut self) -> Result<Self::Out, StoreError>;
}

/// Drives one stream run to completion. Consumes both stages; a finished
/// stream cannot be reused.
pub fn run_stream<S, K>(
    mut source: S,
    mut sink: K,
    token: &CancelToken,
) -> Result<K::Out, StoreError>
where
    S: Source,
    K: Sink<S::Item>,
{
    sink.on_start()?;
    source.produce(&mut |item| sink.on_data(item), token)?;
    sink.on_run()
}

/// Source over an in-memory sequence. Used to feed diff streams into the
/// commit terminal and as the trivial producer in tests.
pub struct Items<T> {
    items: std::vec::IntoIter<T>,
}

impl<T> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T> Source for Items<T> {
    type Item = T;

    fn produce(
        &mut self,
        emit: &mut dyn FnMut(T) -> Result<(), StoreError>,
        token: &CancelToken,
    ) -> Result<(), StoreError> {
        for item in self.items.by_ref() {
            emit(item)?;
            if token.is_cancelled() {
                break;
            }
        }
        Ok(())
    }
}

/// Terminal that accumulates records into a vector. The bulk-read consumer.
#[derive(Default)]
pub struct Collect {
    records: Vec<Record>,
}

impl Collect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink<Record> for Collect {
    type Out = Vec<Record>;

    fn on_data(&mut self, record: Record) -> Result<(), StoreError> {
        self.records.push(record);
        Ok(())
    }

    fn on_run(&mut self) -> Result<Vec<Record>, StoreError> {
        Ok(std::mem::take(&mut self.records))
    }
}
