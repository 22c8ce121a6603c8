use crate::catalog::{CatalogSnapshot, ObjectKey, ObjectType};
use crate::config::LengthWindow;
use crate::mapping::{CheckItem, ObjectMapping, RemapRules};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub mod constraints;
pub mod dependencies;
pub mod indexes;
pub mod sequences;
pub mod tables;
pub mod triggers;

pub use constraints::ConstraintMismatch;
pub use dependencies::{DependencyIssue, DependencyPair, DependencyReport};
pub use indexes::IndexMismatch;
pub use sequences::{SequenceMismatch, SequenceResults};
pub use tables::{ColumnLengthIssue, LengthIssueKind, TableMismatch};
pub use triggers::{TriggerCheck, TriggerMismatch};

/// Source/target object counts for one tracked kind, scoped to the managed
/// schemas on each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectCount {
    pub object_type: ObjectType,
    pub source: usize,
    pub target: usize,
}

/// Everything the comparison pass produced, in the shape the report and the
/// fixup synthesizer consume.
#[derive(Debug, Clone, Default)]
pub struct ComparisonOutcome {
    /// Check items whose mapped target object does not exist.
    pub missing: Vec<CheckItem>,
    pub table_mismatches: Vec<TableMismatch>,
    pub index_mismatches: Vec<IndexMismatch>,
    pub constraint_mismatches: Vec<ConstraintMismatch>,
    pub trigger_mismatches: Vec<TriggerMismatch>,
    pub triggers_ok: usize,
    pub triggers_not_applicable: usize,
    pub sequences: SequenceResults,
    /// Target objects in managed schemas nothing maps onto, per primary kind.
    pub extra_targets: BTreeMap<ObjectType, BTreeSet<ObjectKey>>,
    pub counts: Vec<ObjectCount>,
    pub dependencies: DependencyReport,
    /// schema -> (privilege, object) grants implied by cross-schema edges.
    pub required_grants: BTreeMap<String, BTreeSet<(String, ObjectKey)>>,
    /// Remap rules whose source side matches nothing in the snapshot.
    pub extraneous_rules: Vec<String>,
}

impl ComparisonOutcome {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty()
            && self.table_mismatches.is_empty()
            && self.index_mismatches.is_empty()
            && self.constraint_mismatches.is_empty()
            && self.trigger_mismatches.is_empty()
            && self.sequences.mismatched.is_empty()
            && self.extra_targets.values().all(BTreeSet::is_empty)
            && self.dependencies.missing.is_empty()
            && self.dependencies.unexpected.is_empty()
    }
}

/// Existence pass over the whole check list, plus the column-level comparison
/// for tables. Returns the per-kind set of expected target keys so the extra
/// scan knows what is accounted for.
fn check_primary_objects(
    source: &CatalogSnapshot,
    target: &CatalogSnapshot,
    check_list: &[CheckItem],
    window: &LengthWindow,
    outcome: &mut ComparisonOutcome,
) -> BTreeMap<ObjectType, BTreeSet<ObjectKey>> {
    let mut expected: BTreeMap<ObjectType, BTreeSet<ObjectKey>> = BTreeMap::new();

    for item in check_list {
        expected
            .entry(item.object_type)
            .or_default()
            .insert(item.target.clone());

        if !target.contains(item.object_type, &item.target) {
            debug!(
                "target {} ({}) expected from {} is absent",
                item.target, item.object_type, item.source
            );
            outcome.missing.push(item.clone());
            continue;
        }

        if item.object_type == ObjectType::Table {
            let src_cols = source.columns.get(&item.source).map(Vec::as_slice);
            let tgt_cols = target
                .columns
                .get(&item.target)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            if let Some(mismatch) = tables::compare_columns(&item.target, src_cols, tgt_cols, window)
            {
                outcome.table_mismatches.push(mismatch);
            }
        }
    }

    expected
}

/// Flag target objects in managed schemas that no check item claims. Only the
/// primary kinds are scanned; indexes, constraints and triggers are covered by
/// their own per-table comparisons.
fn check_extra_targets(
    target: &CatalogSnapshot,
    target_schemas: &BTreeSet<String>,
    expected: &BTreeMap<ObjectType, BTreeSet<ObjectKey>>,
    outcome: &mut ComparisonOutcome,
) {
    for object_type in ObjectType::PRIMARY {
        let claimed = expected.get(&object_type);
        let extras: BTreeSet<ObjectKey> = target
            .objects_of(object_type)
            .filter(|key| target_schemas.contains(&key.schema))
            .filter(|key| claimed.is_none_or(|set| !set.contains(*key)))
            .cloned()
            .collect();
        if !extras.is_empty() {
            outcome.extra_targets.insert(object_type, extras);
        }
    }
}

fn compute_object_counts(
    source: &CatalogSnapshot,
    target: &CatalogSnapshot,
    source_schemas: &[String],
    target_schemas: &BTreeSet<String>,
) -> Vec<ObjectCount> {
    ObjectType::ALL
        .iter()
        .map(|object_type| {
            let source = source
                .objects_of(*object_type)
                .filter(|key| source_schemas.contains(&key.schema))
                .count();
            let target = target
                .objects_of(*object_type)
                .filter(|key| target_schemas.contains(&key.schema))
                .count();
            ObjectCount {
                object_type: *object_type,
                source,
                target,
            }
        })
        .collect()
}

/// Run every comparison over the two snapshots and aggregate the results.
///
/// The mapping is mutable because trigger comparison registers identity
/// entries for source triggers no remap rule covers; later phases rely on
/// those entries being resolvable.
pub fn run_comparison(
    source: &CatalogSnapshot,
    target: &CatalogSnapshot,
    check_list: &[CheckItem],
    rules: &RemapRules,
    mapping: &mut ObjectMapping,
    schemas: &[String],
    schema_mapping: &BTreeMap<String, String>,
    window: &LengthWindow,
) -> ComparisonOutcome {
    let mut outcome = ComparisonOutcome {
        extraneous_rules: rules.extraneous_rules(source),
        ..Default::default()
    };

    let expected_targets = check_primary_objects(source, target, check_list, window, &mut outcome);

    let empty_constraints = Vec::new();
    for item in check_list {
        if item.object_type != ObjectType::Table {
            continue;
        }
        if !target.contains(ObjectType::Table, &item.target) {
            continue;
        }

        let tgt_constraints = target
            .constraints
            .get(&item.target)
            .unwrap_or(&empty_constraints);

        if let Some(mismatch) = indexes::compare(
            &item.target,
            source.indexes.get(&item.source).map(Vec::as_slice),
            target
                .indexes
                .get(&item.target)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            tgt_constraints,
        ) {
            outcome.index_mismatches.push(mismatch);
        }

        if let Some(mismatch) = constraints::compare(
            &item.target,
            source.constraints.get(&item.source).map(Vec::as_slice),
            tgt_constraints,
        ) {
            outcome.constraint_mismatches.push(mismatch);
        }

        match triggers::compare(source, target, &item.source, &item.target, mapping) {
            TriggerCheck::Ok => outcome.triggers_ok += 1,
            TriggerCheck::NotApplicable => outcome.triggers_not_applicable += 1,
            TriggerCheck::Mismatch(mismatch) => outcome.trigger_mismatches.push(mismatch),
        }
    }

    outcome.sequences = sequences::compare_all(source, target, mapping, schemas, schema_mapping);

    let target_schemas = mapping.target_schemas();
    check_extra_targets(target, &target_schemas, &expected_targets, &mut outcome);
    outcome.counts = compute_object_counts(source, target, schemas, &target_schemas);

    let (expected_edges, skipped) = dependencies::project_expected(&source.dependencies, mapping);
    let actual_edges: BTreeSet<DependencyPair> = target
        .dependencies
        .iter()
        .map(|e| {
            (
                e.owner.clone(),
                e.owner_type,
                e.referenced.clone(),
                e.referenced_type,
            )
        })
        .collect();
    outcome.required_grants = dependencies::required_grants(&expected_edges);
    outcome.dependencies = dependencies::reconcile(&expected_edges, &actual_edges, skipped, target);

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use crate::mapping::{self, RemapRules};

    fn column(name: &str) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            data_type: "NUMBER".to_string(),
            char_length: None,
            data_precision: None,
            data_scale: None,
            nullable: true,
            default: None,
        }
    }

    fn snapshot_with_table(schema: &str, table: &str, cols: &[&str]) -> CatalogSnapshot {
        let mut snap = CatalogSnapshot::default();
        let key = ObjectKey::new(schema, table);
        snap.add_object(ObjectType::Table, key.clone());
        snap.columns
            .insert(key, cols.iter().map(|c| column(c)).collect());
        snap
    }

    fn run(
        source: &CatalogSnapshot,
        target: &CatalogSnapshot,
        rules: &RemapRules,
        schemas: &[&str],
    ) -> ComparisonOutcome {
        let mut mapping = ObjectMapping::build(source, rules);
        let check_list = mapping::master_check_list(source, rules).unwrap();
        let schema_list: Vec<String> = schemas.iter().map(|s| s.to_string()).collect();
        let schema_mapping = mapping::build_schema_mapping(&check_list);
        run_comparison(
            source,
            target,
            &check_list,
            rules,
            &mut mapping,
            &schema_list,
            &schema_mapping,
            &LengthWindow::default(),
        )
    }

    #[test]
    fn test_identical_snapshots_are_clean() {
        let source = snapshot_with_table("HR", "EMP", &["ID", "NAME"]);
        let target = snapshot_with_table("HR", "EMP", &["ID", "NAME"]);
        let outcome = run(&source, &target, &RemapRules::default(), &["HR"]);
        assert!(outcome.is_clean(), "{:?}", outcome);
        assert_eq!(outcome.triggers_not_applicable, 1);
    }

    #[test]
    fn test_missing_target_object_reported() {
        let source = snapshot_with_table("HR", "EMP", &["ID"]);
        let target = CatalogSnapshot::default();
        let outcome = run(&source, &target, &RemapRules::default(), &["HR"]);
        assert_eq!(outcome.missing.len(), 1);
        assert_eq!(outcome.missing[0].target, ObjectKey::new("HR", "EMP"));
        // a missing table is not also column-compared
        assert!(outcome.table_mismatches.is_empty());
    }

    #[test]
    fn test_extra_target_object_reported() {
        let source = snapshot_with_table("HR", "EMP", &["ID"]);
        let mut target = snapshot_with_table("HR2", "EMP", &["ID"]);
        target.add_object(ObjectType::Table, ObjectKey::new("HR2", "LEFTOVER"));

        let rules = RemapRules::from_lines(["HR.EMP=HR2.EMP"]);
        let outcome = run(&source, &target, &rules, &["HR"]);
        let extras = &outcome.extra_targets[&ObjectType::Table];
        assert_eq!(extras.len(), 1);
        assert!(extras.contains(&ObjectKey::new("HR2", "LEFTOVER")));
    }

    #[test]
    fn test_column_drift_surfaces_as_table_mismatch() {
        let source = snapshot_with_table("HR", "EMP", &["ID", "NAME"]);
        let target = snapshot_with_table("HR", "EMP", &["ID"]);
        let outcome = run(&source, &target, &RemapRules::default(), &["HR"]);
        assert_eq!(outcome.table_mismatches.len(), 1);
        assert!(outcome.table_mismatches[0].missing_columns.contains("NAME"));
    }

    #[test]
    fn test_creating_the_missing_table_resolves_the_finding() {
        let source = snapshot_with_table("HR", "EMP", &["ID", "NAME"]);
        let mut target = CatalogSnapshot::default();

        let outcome = run(&source, &target, &RemapRules::default(), &["HR"]);
        assert_eq!(outcome.missing.len(), 1);

        let key = ObjectKey::new("HR", "EMP");
        target.add_object(ObjectType::Table, key.clone());
        target
            .columns
            .insert(key, vec![column("ID"), column("NAME")]);
        let outcome = run(&source, &target, &RemapRules::default(), &["HR"]);
        assert!(outcome.is_clean(), "{:?}", outcome);
    }

    #[test]
    fn test_object_counts_scoped_to_managed_schemas() {
        let mut source = snapshot_with_table("HR", "EMP", &["ID"]);
        source.add_object(ObjectType::Table, ObjectKey::new("OTHER", "T"));
        let target = snapshot_with_table("HR", "EMP", &["ID"]);

        let outcome = run(&source, &target, &RemapRules::default(), &["HR"]);
        let table_count = outcome
            .counts
            .iter()
            .find(|c| c.object_type == ObjectType::Table)
            .unwrap();
        assert_eq!(table_count.source, 1);
        assert_eq!(table_count.target, 1);
    }
}
