pub mod column;
pub mod constraint;
pub mod dependency;
pub mod id;
pub mod index;
pub mod triggers;

pub use column::ColumnDef;
pub use constraint::{ConstraintDef, ConstraintKind};
pub use dependency::DependencyEdge;
pub use id::{ObjectKey, ObjectType};
pub use index::IndexDef;
pub use triggers::TriggerDef;

use std::collections::{BTreeMap, BTreeSet};

/// Everything the reconciler needs to know about one side of the comparison,
/// loaded up front and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// All objects present, per tracked kind.
    pub objects: BTreeMap<ObjectType, BTreeSet<ObjectKey>>,
    /// Table columns in position order.
    pub columns: BTreeMap<ObjectKey, Vec<ColumnDef>>,
    /// Indexes per owning table.
    pub indexes: BTreeMap<ObjectKey, Vec<IndexDef>>,
    /// P/U/R constraints per owning table.
    pub constraints: BTreeMap<ObjectKey, Vec<ConstraintDef>>,
    /// Triggers per owning table, keyed by trigger name.
    pub triggers: BTreeMap<ObjectKey, BTreeMap<String, TriggerDef>>,
    /// Sequence names per schema.
    pub sequences: BTreeMap<String, BTreeSet<String>>,
    /// Cross-object dependency edges from the dictionary.
    pub dependencies: Vec<DependencyEdge>,
}

impl CatalogSnapshot {
    pub fn contains(&self, object_type: ObjectType, key: &ObjectKey) -> bool {
        self.objects
            .get(&object_type)
            .is_some_and(|set| set.contains(key))
    }

    pub fn objects_of(&self, object_type: ObjectType) -> impl Iterator<Item = &ObjectKey> {
        self.objects.get(&object_type).into_iter().flatten()
    }

    /// True if the object exists under any tracked kind.
    pub fn contains_any(&self, key: &ObjectKey) -> bool {
        self.objects.values().any(|set| set.contains(key))
    }

    pub fn add_object(&mut self, object_type: ObjectType, key: ObjectKey) {
        self.objects.entry(object_type).or_default().insert(key);
    }
}

/// Upper-case and de-duplicate a column list, preserving first occurrence
/// order. Index and constraint matching compares these sequences, never
/// object names.
pub fn normalize_column_sequence<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for col in columns {
        let upper = col.as_ref().trim().to_uppercase();
        if seen.insert(upper.clone()) {
            out.push(upper);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_column_sequence() {
        assert_eq!(
            normalize_column_sequence(&["b", "A", "B", "a"]),
            vec!["B", "A"]
        );
        assert_eq!(normalize_column_sequence::<&str>(&[]), Vec::<String>::new());
    }

    #[test]
    fn test_snapshot_contains() {
        let mut snap = CatalogSnapshot::default();
        snap.add_object(ObjectType::Table, ObjectKey::new("HR", "EMP"));

        assert!(snap.contains(ObjectType::Table, &ObjectKey::new("HR", "EMP")));
        assert!(!snap.contains(ObjectType::View, &ObjectKey::new("HR", "EMP")));
        assert!(snap.contains_any(&ObjectKey::new("HR", "EMP")));
        assert!(!snap.contains_any(&ObjectKey::new("HR", "DEPT")));
    }
}
