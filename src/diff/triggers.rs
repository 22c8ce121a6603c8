use crate::catalog::{CatalogSnapshot, ObjectKey, ObjectType, TriggerDef};
use crate::mapping::ObjectMapping;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct TriggerMismatch {
    pub table: ObjectKey,
    /// Mapped trigger names absent on the target.
    pub missing: BTreeSet<String>,
    pub extra: BTreeSet<String>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum TriggerCheck {
    Ok,
    /// The source recorded no triggers for this table, nothing to verify.
    NotApplicable,
    Mismatch(TriggerMismatch),
}

/// Compare a table's triggers through the mapping. Trigger names without a
/// mapping entry get an identity entry registered on the fly so later phases
/// (fixups, dependency projection) can resolve them.
pub fn compare(
    source: &CatalogSnapshot,
    target: &CatalogSnapshot,
    src_table: &ObjectKey,
    tgt_table: &ObjectKey,
    mapping: &mut ObjectMapping,
) -> TriggerCheck {
    let Some(src_triggers) = source.triggers.get(src_table).filter(|t| !t.is_empty()) else {
        return TriggerCheck::NotApplicable;
    };

    let empty = BTreeMap::new();
    let tgt_triggers = target.triggers.get(tgt_table).unwrap_or(&empty);
    let tgt_names: BTreeSet<String> = tgt_triggers.keys().map(|n| n.to_uppercase()).collect();

    let mut mapped_names: BTreeSet<String> = BTreeSet::new();
    for name in src_triggers.keys() {
        let src_key = ObjectKey::new(&src_table.schema, name);
        match mapping.target_for(&src_key, ObjectType::Trigger) {
            Some(target_key) => {
                mapped_names.insert(target_key.name.clone());
            }
            None => {
                mapped_names.insert(name.to_uppercase());
                mapping.ensure_entry(
                    &src_key,
                    ObjectType::Trigger,
                    ObjectKey::new(&tgt_table.schema, name),
                );
            }
        }
    }

    let missing: BTreeSet<String> = mapped_names.difference(&tgt_names).cloned().collect();
    let extra: BTreeSet<String> = tgt_names.difference(&mapped_names).cloned().collect();

    let mut details = Vec::new();
    for name in mapped_names.intersection(&tgt_names) {
        let tgt_full = ObjectKey::new(&tgt_table.schema, name);
        let src_name = mapping
            .source_for_target(&tgt_full, ObjectType::Trigger)
            .map(|key| key.name.clone())
            .unwrap_or_else(|| name.clone());

        let Some(src_def) = src_triggers.get(&src_name) else {
            continue;
        };
        let tgt_def: &TriggerDef = &tgt_triggers[name];

        if src_def.event.trim() != tgt_def.event.trim() {
            details.push(format!(
                "{}: triggering event differs (source {}, target {})",
                name, src_def.event, tgt_def.event
            ));
        }
        if src_def.status.trim() != tgt_def.status.trim() {
            details.push(format!(
                "{}: status differs (source {}, target {})",
                name, src_def.status, tgt_def.status
            ));
        }
    }

    if missing.is_empty() && extra.is_empty() && details.is_empty() {
        TriggerCheck::Ok
    } else {
        TriggerCheck::Mismatch(TriggerMismatch {
            table: tgt_table.clone(),
            missing,
            extra,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::RemapRules;

    fn trigger(name: &str, event: &str, status: &str) -> TriggerDef {
        TriggerDef {
            name: name.to_string(),
            event: event.to_string(),
            status: status.to_string(),
        }
    }

    fn snapshot_with_triggers(table: &ObjectKey, triggers: &[TriggerDef]) -> CatalogSnapshot {
        let mut snap = CatalogSnapshot::default();
        let map: BTreeMap<String, TriggerDef> = triggers
            .iter()
            .map(|t| (t.name.to_uppercase(), t.clone()))
            .collect();
        snap.triggers.insert(table.clone(), map);
        snap
    }

    #[test]
    fn test_no_source_triggers_is_not_applicable() {
        let src_table = ObjectKey::new("HR", "EMP");
        let tgt_table = ObjectKey::new("HR2", "EMP");
        let source = CatalogSnapshot::default();
        let target = CatalogSnapshot::default();
        let mut mapping = ObjectMapping::default();

        assert!(matches!(
            compare(&source, &target, &src_table, &tgt_table, &mut mapping),
            TriggerCheck::NotApplicable
        ));
    }

    #[test]
    fn test_identical_triggers_match_and_register_mapping() {
        let src_table = ObjectKey::new("HR", "EMP");
        let tgt_table = ObjectKey::new("HR2", "EMP");
        let source =
            snapshot_with_triggers(&src_table, &[trigger("TRG_EMP", "INSERT", "ENABLED")]);
        let target =
            snapshot_with_triggers(&tgt_table, &[trigger("TRG_EMP", "INSERT", "ENABLED")]);
        let mut mapping = ObjectMapping::default();

        assert!(matches!(
            compare(&source, &target, &src_table, &tgt_table, &mut mapping),
            TriggerCheck::Ok
        ));
        // Identity entry registered for the unmapped trigger
        assert_eq!(
            mapping.target_for(&ObjectKey::new("HR", "TRG_EMP"), ObjectType::Trigger),
            Some(&ObjectKey::new("HR2", "TRG_EMP"))
        );
    }

    #[test]
    fn test_missing_trigger() {
        let src_table = ObjectKey::new("HR", "EMP");
        let tgt_table = ObjectKey::new("HR2", "EMP");
        let source =
            snapshot_with_triggers(&src_table, &[trigger("TRG_EMP", "INSERT", "ENABLED")]);
        let target = CatalogSnapshot::default();
        let mut mapping = ObjectMapping::default();

        match compare(&source, &target, &src_table, &tgt_table, &mut mapping) {
            TriggerCheck::Mismatch(mismatch) => {
                assert!(mismatch.missing.contains("TRG_EMP"));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_status_difference_is_detail() {
        let src_table = ObjectKey::new("HR", "EMP");
        let tgt_table = ObjectKey::new("HR2", "EMP");
        let source =
            snapshot_with_triggers(&src_table, &[trigger("TRG_EMP", "INSERT", "ENABLED")]);
        let target =
            snapshot_with_triggers(&tgt_table, &[trigger("TRG_EMP", "INSERT", "DISABLED")]);
        let mut mapping = ObjectMapping::default();

        match compare(&source, &target, &src_table, &tgt_table, &mut mapping) {
            TriggerCheck::Mismatch(mismatch) => {
                assert!(mismatch.missing.is_empty());
                assert_eq!(mismatch.details.len(), 1);
                assert!(mismatch.details[0].contains("status"));
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_remapped_trigger_name_resolves() {
        let src_table = ObjectKey::new("HR", "EMP");
        let tgt_table = ObjectKey::new("HR2", "EMP");
        let source =
            snapshot_with_triggers(&src_table, &[trigger("TRG_OLD", "UPDATE", "ENABLED")]);
        let target =
            snapshot_with_triggers(&tgt_table, &[trigger("TRG_NEW", "UPDATE", "ENABLED")]);

        let mut src_objects = CatalogSnapshot::default();
        src_objects.add_object(ObjectType::Trigger, ObjectKey::new("HR", "TRG_OLD"));
        let rules = RemapRules::from_lines(vec!["HR.TRG_OLD=HR2.TRG_NEW"]);
        let mut mapping = ObjectMapping::build(&src_objects, &rules);

        assert!(matches!(
            compare(&source, &target, &src_table, &tgt_table, &mut mapping),
            TriggerCheck::Ok
        ));
    }
}
