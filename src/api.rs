//! The callable operation surface: reads over the record store, identifier
//! coercion, uncommittable-tag stripping, the privileged secret write, and
//! introspection. Mutations live in [`crate::commit`] and [`crate::diff`].

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::permission::CallerContext;
use crate::record::{ID_COLUMN, RecId, Record, Table, TagName, TagValue, ValueKind};
use crate::store::{Filter, RecordStore};
use crate::stream::source::{FilterScan, IdScan};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// First record matching the filter; not-found error when nothing matches.
pub fn read(store: &dyn RecordStore, filter: &Filter) -> Result<Record, StoreError> {
    read_unchecked(store, filter)?.ok_or(StoreError::NotFound {
        entity: "match",
        key: "filter".into(),
    })
}

pub fn read_unchecked(
    store: &dyn RecordStore,
    filter: &Filter,
) -> Result<Option<Record>, StoreError> {
    Ok(store.scan(filter).next())
}

pub fn read_by_id(store: &dyn RecordStore, id: RecId) -> Result<Record, StoreError> {
    store
        .read_by_id(id)?
        .ok_or_else(|| StoreError::record_not_found(id))
}

pub fn read_by_id_unchecked(
    store: &dyn RecordStore,
    id: RecId,
) -> Result<Option<Record>, StoreError> {
    store.read_by_id(id)
}

/// The record's restart-surviving tags only.
pub fn read_by_id_persistent_tags(
    store: &dyn RecordStore,
    id: RecId,
) -> Result<Record, StoreError> {
    Ok(read_by_id(store, id)?.persistent_view())
}

/// The record's transient tags only.
pub fn read_by_id_transient_tags(
    store: &dyn RecordStore,
    id: RecId,
) -> Result<Record, StoreError> {
    Ok(read_by_id(store, id)?.transient_view())
}

/// Single-row tabular result for the first match, columns in record-defined
/// order.
pub fn read_link(store: &dyn RecordStore, filter: &Filter) -> Result<Table, StoreError> {
    Ok(Table::single(&read(store, filter)?))
}

/// Ordered tabular read over explicit ids. Checked mode errors on the first
/// missing id; unchecked mode yields an all-null placeholder row for each
/// missing id. The streaming variant behaves differently; see
/// [`crate::stream::source::IdScan`].
pub fn read_by_ids(
    store: &dyn RecordStore,
    ids: &[RecId],
    checked: bool,
) -> Result<Table, StoreError> {
    let mut found = Vec::with_capacity(ids.len());
    for id in ids {
        let record = store.read_by_id(*id)?;
        if checked && record.is_none() {
            return Err(StoreError::record_not_found(id));
        }
        found.push(record);
    }
    // Columns come from the found records; each missing id becomes an
    // all-null placeholder row in its requested position.
    let template = Table::from_records(found.iter().flatten());
    let rows = found
        .iter()
        .map(|record| match record {
            Some(record) => Table::row_for(&template.columns, record),
            None => template.null_row(),
        })
        .collect();
    Ok(Table {
        columns: template.columns,
        rows,
    })
}

#[derive(Debug, Clone, Default)]
pub struct ReadAllOptions {
    /// Sort rows by each record's display name (the `name` tag's text,
    /// falling back to the id). Ties keep scan order.
    pub sort_by_display_name: bool,
}

/// All matching records as a tabular result.
pub fn read_all(
    store: &dyn RecordStore,
    filter: &Filter,
    options: &ReadAllOptions,
) -> Result<Table, StoreError> {
    let mut records: Vec<Record> = store.scan(filter).collect();
    if options.sort_by_display_name {
        records.sort_by_key(|record| record.display_name());
    }
    Ok(Table::from_records(records.iter()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagUsage {
    pub name: TagName,
    /// Union of value kinds observed under this tag across the matches.
    pub kinds: BTreeSet<ValueKind>,
    /// Number of matching records carrying this tag.
    pub count: u64,
}

/// Tag names across the matching set with observed value kinds and
/// occurrence counts.
pub fn read_all_tag_names(
    store: &dyn RecordStore,
    filter: &Filter,
) -> Result<Vec<TagUsage>, StoreError> {
    let mut usage: BTreeMap<TagName, TagUsage> = BTreeMap::new();
    for record in store.scan(filter) {
        for (name, value) in record.tags() {
            let entry = usage.entry(name.clone()).or_insert_with(|| TagUsage {
                name: name.clone(),
                kinds: BTreeSet::new(),
                count: 0,
            });
            entry.kinds.insert(value.kind());
            entry.count += 1;
        }
    }
    Ok(usage.into_values().collect())
}

/// Distinct values of one tag across the matching set, capped by
/// configuration.
pub fn read_all_tag_vals(
    store: &dyn RecordStore,
    filter: &Filter,
    tag: &str,
    config: &StoreConfig,
) -> Result<Vec<TagValue>, StoreError> {
    let mut distinct = BTreeSet::new();
    for record in store.scan(filter) {
        if let Some(value) = record.get(tag) {
            distinct.insert(value.clone());
            if distinct.len() >= config.tag_vals_cap {
                debug!(tag, cap = config.tag_vals_cap, "tag value enumeration capped");
                break;
            }
        }
    }
    Ok(distinct.into_iter().collect())
}

pub fn read_count(store: &dyn RecordStore, filter: &Filter) -> Result<u64, StoreError> {
    store.read_count(filter)
}

/// Lazy bulk-read source over a filter. Drive it with
/// [`crate::stream::run_stream`] and a consumer of your choice.
pub fn read_all_stream<'a>(store: &'a dyn RecordStore, filter: &'a Filter) -> FilterScan<'a> {
    FilterScan::new(store, filter)
}

/// Lazy bulk-read source over explicit ids; missing ids are skipped.
pub fn read_by_ids_stream(
    store: &dyn RecordStore,
    ids: Vec<RecId>,
    checked: bool,
) -> IdScan<'_> {
    IdScan::new(store, ids, checked)
}

/// Input accepted by identifier coercion: a plain value, a record, or a
/// tabular result.
#[derive(Debug, Clone)]
pub enum CoerceInput {
    Value(TagValue),
    Record(Record),
    Table(Table),
}

/// Coerces the input into a single record id. Value inputs must be id values
/// (or id-formatted text); every other value kind is an argument error.
/// Tables contribute their first row's id.
pub fn to_rec_id(input: &CoerceInput) -> Result<RecId, StoreError> {
    match input {
        CoerceInput::Value(value) => value_to_id(value),
        CoerceInput::Record(record) => Ok(record.id()),
        CoerceInput::Table(table) => table_row_id(table, 0),
    }
}

/// Coerces the input into a list of record ids: one for a value or a record,
/// one per row for a table.
pub fn to_rec_id_list(input: &CoerceInput) -> Result<Vec<RecId>, StoreError> {
    match input {
        CoerceInput::Value(value) => Ok(vec![value_to_id(value)?]),
        CoerceInput::Record(record) => Ok(vec![record.id()]),
        CoerceInput::Table(table) => (0..table.rows.len())
            .map(|row| table_row_id(table, row))
            .collect(),
    }
}

fn value_to_id(value: &TagValue) -> Result<RecId, StoreError> {
    match value {
        TagValue::Id(id) => Ok(*id),
        TagValue::Text(text) => RecId::parse(text).ok_or_else(|| {
            StoreError::Argument(format!("text is not a record id: {text}"))
        }),
        other => Err(StoreError::Argument(format!(
            "cannot coerce {:?} value into a record id",
            other.kind()
        ))),
    }
}

fn table_row_id(table: &Table, row: usize) -> Result<RecId, StoreError> {
    let column = table
        .column_index(ID_COLUMN)
        .ok_or_else(|| StoreError::Argument("table has no id column".into()))?;
    let value = table
        .rows
        .get(row)
        .and_then(|cells| cells.get(column))
        .ok_or_else(|| StoreError::Argument(format!("table has no row {row}")))?;
    value_to_id(value)
}

/// Inputs accepted by uncommittable-tag stripping.
#[derive(Debug, Clone)]
pub enum Strippable {
    Record(Record),
    Records(Vec<Record>),
    Table(Table),
}

/// Removes fields that cannot be persisted: transient tags from records, the
/// synthetic id column from tabular results.
pub fn strip_uncommittable(input: Strippable) -> Strippable {
    match input {
        Strippable::Record(record) => Strippable::Record(record.persistent_view()),
        Strippable::Records(records) => Strippable::Records(
            records
                .into_iter()
                .map(|record| record.persistent_view())
                .collect(),
        ),
        Strippable::Table(mut table) => {
            if let Some(column) = table.column_index(ID_COLUMN) {
                table.columns.remove(column);
                for row in &mut table.rows {
                    if column < row.len() {
                        row.remove(column);
                    }
                }
            }
            Strippable::Table(table)
        }
    }
}

/// Privileged secret-store write. Even when the dispatching layer has
/// already vetted the caller, administrator rights are re-checked here
/// before the store is touched.
pub fn password_set(
    ctx: &CallerContext,
    store: &dyn RecordStore,
    project: &str,
    key: &str,
    value: Zeroizing<String>,
) -> Result<(), StoreError> {
    if !ctx.is_admin() {
        warn!(caller = %ctx.caller_id, "secret write denied");
        return Err(StoreError::PermissionDenied(format!(
            "caller {} lacks administrator rights for secret writes",
            ctx.caller_id
        )));
    }
    store.secret_set(project, key, value)
}

/// Server identity and version facts as a record.
pub fn about() -> Record {
    let mut tags = BTreeMap::new();
    tags.insert(
        TagName::from("server"),
        TagValue::Text(env!("CARGO_PKG_NAME").into()),
    );
    tags.insert(
        TagName::from("version"),
        TagValue::Text(env!("CARGO_PKG_VERSION").into()),
    );
    tags.insert(
        TagName::from("os"),
        TagValue::Text(std::env::consts::OS.into()),
    );
    Record::new(RecId::fresh(), 0, tags, BTreeSet::new())
}

/// The caller's identity and locale as a record.
pub fn context(ctx: &CallerContext) -> Record {
    let mut tags = BTreeMap::new();
    tags.insert(
        TagName::from("caller"),
        TagValue::Text(ctx.caller_id.as_str().into()),
    );
    tags.insert(
        TagName::from("locale"),
        TagValue::Text(ctx.locale.clone()),
    );
    tags.insert(TagName::from("admin"), TagValue::Boolean(ctx.is_admin()));
    Record::new(RecId::fresh(), 0, tags, BTreeSet::new())
}
