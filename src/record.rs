use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

pub type TagName = CompactString;

/// Globally unique record identifier.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct RecId(uuid::Uuid);

impl RecId {
    /// Generates a fresh v4 id. Uniqueness across calls is what makes
    /// add-diffs without an explicit id safe.
    pub fn fresh() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn parse(text: &str) -> Option<Self> {
        uuid::Uuid::parse_str(text).ok().map(Self)
    }
}

impl std::fmt::Display for RecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Timestamp,
    Float,
    Text,
    Id,
    Blob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TagValue {
    Text(CompactString),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(i64),
    Blob(Vec<u8>),
    Id(RecId),
    Null,
}

impl TagValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            TagValue::Null => ValueKind::Null,
            TagValue::Boolean(_) => ValueKind::Boolean,
            TagValue::Integer(_) => ValueKind::Integer,
            TagValue::Timestamp(_) => ValueKind::Timestamp,
            TagValue::Float(_) => ValueKind::Float,
            TagValue::Text(_) => ValueKind::Text,
            TagValue::Id(_) => ValueKind::Id,
            TagValue::Blob(_) => ValueKind::Blob,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }

    fn kind_rank(&self) -> u8 {
        match self {
            TagValue::Null => 0,
            TagValue::Boolean(_) => 1,
            TagValue::Integer(_) => 2,
            TagValue::Timestamp(_) => 3,
            TagValue::Float(_) => 4,
            TagValue::Text(_) => 5,
            TagValue::Id(_) => 6,
            TagValue::Blob(_) => 7,
        }
    }
}

impl PartialEq for TagValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TagValue {}

impl PartialOrd for TagValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank_cmp = self.kind_rank().cmp(&other.kind_rank());
        if rank_cmp != Ordering::Equal {
            return rank_cmp;
        }

        match (self, other) {
            (TagValue::Null, TagValue::Null) => Ordering::Equal,
            (TagValue::Boolean(a), TagValue::Boolean(b)) => a.cmp(b),
            (TagValue::Integer(a), TagValue::Integer(b)) => a.cmp(b),
            (TagValue::Timestamp(a), TagValue::Timestamp(b)) => a.cmp(b),
            (TagValue::Float(a), TagValue::Float(b)) => a.total_cmp(b),
            (TagValue::Text(a), TagValue::Text(b)) => a.cmp(b),
            (TagValue::Id(a), TagValue::Id(b)) => a.cmp(b),
            (TagValue::Blob(a), TagValue::Blob(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// An immutable id-keyed tag-value mapping plus the store-assigned version
/// sequence used for optimistic-concurrency checks. New versions are only
/// produced through commit; there is no in-place mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    id: RecId,
    seq: u64,
    tags: BTreeMap<TagName, TagValue>,
    /// Tag names whose current values are not required to survive a restart.
    transient: BTreeSet<TagName>,
}

impl Record {
    pub fn new(
        id: RecId,
        seq: u64,
        tags: BTreeMap<TagName, TagValue>,
        transient: BTreeSet<TagName>,
    ) -> Self {
        Self {
            id,
            seq,
            tags,
            transient,
        }
    }

    pub fn id(&self) -> RecId {
        self.id
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn get(&self, tag: &str) -> Option<&TagValue> {
        self.tags.get(tag)
    }

    pub fn tags(&self) -> &BTreeMap<TagName, TagValue> {
        &self.tags
    }

    pub fn tag_names(&self) -> impl Iterator<Item = &TagName> {
        self.tags.keys()
    }

    pub fn is_transient_tag(&self, tag: &str) -> bool {
        self.transient.contains(tag)
    }

    pub fn transient_tag_names(&self) -> &BTreeSet<TagName> {
        &self.transient
    }

    /// Projection containing only tags that survive a restart.
    pub fn persistent_view(&self) -> Record {
        let tags = self
            .tags
            .iter()
            .filter(|(name, _)| !self.transient.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Record::new(self.id, self.seq, tags, BTreeSet::new())
    }

    /// Projection containing only tags that do not survive a restart.
    pub fn transient_view(&self) -> Record {
        let tags: BTreeMap<TagName, TagValue> = self
            .tags
            .iter()
            .filter(|(name, _)| self.transient.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let transient = tags.keys().cloned().collect();
        Record::new(self.id, self.seq, tags, transient)
    }

    /// The `name` tag's text, falling back to the id's string form.
    pub fn display_name(&self) -> String {
        match self.tags.get("name") {
            Some(TagValue::Text(text)) => text.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// Column name of the synthetic id column carried by tabular results. The id
/// is derived, not a stored tag, which is why `strip_uncommittable` drops it.
pub const ID_COLUMN: &str = "id";

/// Tabular result used by the row-shaped read operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<TagName>,
    pub rows: Vec<Vec<TagValue>>,
}

impl Table {
    pub fn empty() -> Self {
        Self {
            columns: vec![TagName::from(ID_COLUMN)],
            rows: Vec::new(),
        }
    }

    /// Single-row table with columns in record-defined order, the synthetic
    /// id column first.
    pub fn single(record: &Record) -> Self {
        let mut columns = vec![TagName::from(ID_COLUMN)];
        columns.extend(record.tag_names().cloned());
        let mut row = vec![TagValue::Id(record.id())];
        row.extend(record.tags().values().cloned());
        Self {
            columns,
            rows: vec![row],
        }
    }

    /// Multi-record table. Columns are the synthetic id column followed by
    /// the union of tag names across the records in first-seen order; a tag
    /// absent from a record yields `Null` in that row.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let records: Vec<&Record> = records.into_iter().collect();
        let mut columns = vec![TagName::from(ID_COLUMN)];
        for record in &records {
            for name in record.tag_names() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| Self::row_for(&columns, record))
            .collect();
        Self { columns, rows }
    }

    pub(crate) fn row_for(columns: &[TagName], record: &Record) -> Vec<TagValue> {
        columns
            .iter()
            .map(|column| {
                if column.as_str() == ID_COLUMN {
                    TagValue::Id(record.id())
                } else {
                    record.get(column).cloned().unwrap_or(TagValue::Null)
                }
            })
            .collect()
    }

    pub(crate) fn null_row(&self) -> Vec<TagValue> {
        vec![TagValue::Null; self.columns.len()]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.as_str() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::{ID_COLUMN, RecId, Record, Table, TagValue, ValueKind};
    use std::collections::{BTreeMap, BTreeSet};

    fn record_with(tags: &[(&str, TagValue)], transient: &[&str]) -> Record {
        let map: BTreeMap<_, _> = tags
            .iter()
            .map(|(name, value)| ((*name).into(), value.clone()))
            .collect();
        let transient: BTreeSet<_> = transient.iter().map(|name| (*name).into()).collect();
        Record::new(RecId::fresh(), 1, map, transient)
    }

    #[test]
    fn persistent_and_transient_views_partition_tags() {
        let record = record_with(
            &[
                ("name", TagValue::Text("alpha".into())),
                ("cursor", TagValue::Integer(9)),
            ],
            &["cursor"],
        );
        let persistent = record.persistent_view();
        assert!(persistent.get("name").is_some());
        assert!(persistent.get("cursor").is_none());

        let transient = record.transient_view();
        assert!(transient.get("name").is_none());
        assert!(transient.get("cursor").is_some());
    }

    #[test]
    fn display_name_prefers_name_tag() {
        let named = record_with(&[("name", TagValue::Text("alpha".into()))], &[]);
        assert_eq!(named.display_name(), "alpha");

        let anonymous = record_with(&[], &[]);
        assert_eq!(anonymous.display_name(), anonymous.id().to_string());
    }

    #[test]
    fn single_row_table_keeps_record_defined_column_order() {
        let record = record_with(
            &[
                ("age", TagValue::Integer(3)),
                ("name", TagValue::Text("alpha".into())),
            ],
            &[],
        );
        let table = Table::single(&record);
        assert_eq!(table.columns[0].as_str(), ID_COLUMN);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], TagValue::Id(record.id()));
    }

    #[test]
    fn value_ordering_groups_by_kind() {
        let mut values = vec![
            TagValue::Text("b".into()),
            TagValue::Integer(2),
            TagValue::Null,
            TagValue::Integer(1),
        ];
        values.sort();
        assert_eq!(values[0], TagValue::Null);
        assert_eq!(values[1], TagValue::Integer(1));
        assert_eq!(values[3].kind(), ValueKind::Text);
    }
}
