use crate::error::StoreError;
use crate::record::{Record, RecId, TagName, TagValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A proposed per-tag change. `Value(Null)` entries mean "no-op, ignore" and
/// are stripped before a diff is finalized; removal is always this explicit
/// marker, never an absent or null value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum TagWrite {
    Value(TagValue),
    Remove,
}

/// Bitmask over the four diff flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DiffFlags(u8);

impl DiffFlags {
    pub const ADD: DiffFlags = DiffFlags(1 << 0);
    pub const REMOVE: DiffFlags = DiffFlags(1 << 1);
    pub const TRANSIENT: DiffFlags = DiffFlags(1 << 2);
    pub const FORCE: DiffFlags = DiffFlags(1 << 3);

    pub fn empty() -> Self {
        DiffFlags(0)
    }

    pub fn contains(self, other: DiffFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: DiffFlags) {
        self.0 |= other.0;
    }

    /// Translates lowercase flag names into the bitmask. Unknown names are
    /// argument errors.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, StoreError> {
        let mut flags = DiffFlags::empty();
        for name in names {
            match name.as_ref() {
                "add" => flags.insert(DiffFlags::ADD),
                "remove" => flags.insert(DiffFlags::REMOVE),
                "transient" => flags.insert(DiffFlags::TRANSIENT),
                "force" => flags.insert(DiffFlags::FORCE),
                other => {
                    return Err(StoreError::Argument(format!("unknown diff flag: {other}")));
                }
            }
        }
        Ok(flags)
    }
}

/// An immutable change descriptor: an optional original snapshot, the
/// proposed tag changes, and the flag set. Consumed exactly once by commit.
///
/// Invariants: `orig` is `None` iff the `add` flag is set; `changes` never
/// contains a `Value(Null)` entry; `new_id` is `Some` iff `add` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diff {
    orig: Option<Record>,
    changes: BTreeMap<TagName, TagWrite>,
    flags: DiffFlags,
    new_id: Option<RecId>,
}

impl Diff {
    /// Builds a diff from an optional original snapshot, a change map, and a
    /// set of flag names. This is pure construction; nothing is applied.
    pub fn build<S: AsRef<str>>(
        orig: Option<Record>,
        changes: Option<BTreeMap<TagName, TagWrite>>,
        flags: &[S],
    ) -> Result<Diff, StoreError> {
        let flags = DiffFlags::from_names(flags)?;
        let mut changes = changes.unwrap_or_default();
        changes.retain(|_, write| !matches!(write, TagWrite::Value(TagValue::Null)));

        if flags.contains(DiffFlags::ADD) {
            if orig.is_some() {
                return Err(StoreError::Argument(
                    "add flag cannot be combined with an original snapshot".into(),
                ));
            }
            let new_id = match changes.remove("id") {
                None => RecId::fresh(),
                Some(TagWrite::Value(TagValue::Id(id))) => id,
                Some(other) => {
                    return Err(StoreError::Argument(format!(
                        "id entry in an add diff must be an id value, got {other:?}"
                    )));
                }
            };
            // Flags other than `add` carry no meaning for a new record.
            return Ok(Diff {
                orig: None,
                changes,
                flags: DiffFlags::ADD,
                new_id: Some(new_id),
            });
        }

        Ok(Diff {
            orig,
            changes,
            flags,
            new_id: None,
        })
    }

    pub fn orig(&self) -> Option<&Record> {
        self.orig.as_ref()
    }

    pub fn changes(&self) -> &BTreeMap<TagName, TagWrite> {
        &self.changes
    }

    pub fn flags(&self) -> DiffFlags {
        self.flags
    }

    pub fn is_add(&self) -> bool {
        self.flags.contains(DiffFlags::ADD)
    }

    pub fn is_remove(&self) -> bool {
        self.flags.contains(DiffFlags::REMOVE)
    }

    pub fn is_transient(&self) -> bool {
        self.flags.contains(DiffFlags::TRANSIENT)
    }

    pub fn is_forced(&self) -> bool {
        self.flags.contains(DiffFlags::FORCE)
    }

    /// Id chosen for an add diff; `None` for every other diff.
    pub fn new_id(&self) -> Option<RecId> {
        self.new_id
    }

    /// Id of the record this diff targets.
    pub fn target_id(&self) -> Option<RecId> {
        self.new_id.or_else(|| self.orig.as_ref().map(|r| r.id()))
    }
}
