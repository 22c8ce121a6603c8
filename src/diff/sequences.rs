use crate::catalog::{CatalogSnapshot, ObjectKey, ObjectType};
use crate::mapping::ObjectMapping;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct SequenceMismatch {
    pub source_schema: String,
    pub target_schema: String,
    /// Source sequence names whose mapped target name is absent.
    pub missing: BTreeSet<String>,
    /// Target sequence names nothing maps onto.
    pub extra: BTreeSet<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SequenceResults {
    /// `SRC->TGT` schema pair labels that reconciled cleanly.
    pub ok: Vec<String>,
    pub mismatched: Vec<SequenceMismatch>,
}

/// Compare sequences per (source schema -> target schema) pair. Each sequence
/// resolves its own target through the mapping, so one source schema can fan
/// out to several pairs. A configured schema with no sequence metadata at all
/// is reported with a note rather than silently passing.
pub fn compare_all(
    source: &CatalogSnapshot,
    target: &CatalogSnapshot,
    mapping: &ObjectMapping,
    schemas: &[String],
    schema_mapping: &BTreeMap<String, String>,
) -> SequenceResults {
    let mut results = SequenceResults::default();

    let mut groups: BTreeMap<(String, String), Vec<(String, String)>> = BTreeMap::new();
    for (src_schema, names) in &source.sequences {
        for name in names {
            let src_key = ObjectKey::new(src_schema, name);
            let target_key = mapping
                .target_for(&src_key, ObjectType::Sequence)
                .cloned()
                .unwrap_or(src_key);
            groups
                .entry((src_schema.clone(), target_key.schema))
                .or_default()
                .push((name.clone(), target_key.name));
        }
    }

    let empty = BTreeSet::new();
    for ((src_schema, tgt_schema), entries) in &groups {
        let actual = target.sequences.get(tgt_schema).unwrap_or(&empty);
        let expected: BTreeSet<&String> = entries.iter().map(|(_, tgt)| tgt).collect();

        let missing: BTreeSet<String> = entries
            .iter()
            .filter(|(_, tgt)| !actual.contains(tgt))
            .map(|(src, _)| src.clone())
            .collect();
        let extra: BTreeSet<String> = actual
            .iter()
            .filter(|name| !expected.contains(name))
            .cloned()
            .collect();

        let label = format!("{}->{}", src_schema, tgt_schema);
        if missing.is_empty() && extra.is_empty() {
            results.ok.push(label);
        } else {
            results.mismatched.push(SequenceMismatch {
                source_schema: src_schema.clone(),
                target_schema: tgt_schema.clone(),
                missing,
                extra,
                note: None,
            });
        }
    }

    for schema in schemas {
        if source.sequences.contains_key(schema) {
            continue;
        }
        let tgt_schema = schema_mapping.get(schema).cloned().unwrap_or_else(|| schema.clone());
        results.mismatched.push(SequenceMismatch {
            source_schema: schema.clone(),
            target_schema: tgt_schema,
            missing: BTreeSet::new(),
            extra: BTreeSet::new(),
            note: Some(format!(
                "no sequence metadata returned for schema {}; verify whether it actually has sequences",
                schema
            )),
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::RemapRules;

    fn snapshot(sequences: &[(&str, &[&str])]) -> CatalogSnapshot {
        let mut snap = CatalogSnapshot::default();
        for (schema, names) in sequences {
            for name in *names {
                snap.add_object(ObjectType::Sequence, ObjectKey::new(schema, name));
                snap.sequences
                    .entry(schema.to_string())
                    .or_default()
                    .insert(name.to_string());
            }
        }
        snap
    }

    #[test]
    fn test_matching_sequences() {
        let src = snapshot(&[("HR", &["EMP_SEQ", "DEPT_SEQ"])]);
        let tgt = snapshot(&[("HR", &["EMP_SEQ", "DEPT_SEQ"])]);
        let mapping = ObjectMapping::build(&src, &RemapRules::default());

        let results = compare_all(
            &src,
            &tgt,
            &mapping,
            &["HR".to_string()],
            &BTreeMap::new(),
        );
        assert_eq!(results.ok, vec!["HR->HR"]);
        assert!(results.mismatched.is_empty());
    }

    #[test]
    fn test_missing_and_extra() {
        let src = snapshot(&[("HR", &["EMP_SEQ"])]);
        let tgt = snapshot(&[("HR", &["ROGUE_SEQ"])]);
        let mapping = ObjectMapping::build(&src, &RemapRules::default());

        let results = compare_all(&src, &tgt, &mapping, &["HR".to_string()], &BTreeMap::new());
        assert_eq!(results.mismatched.len(), 1);
        let mismatch = &results.mismatched[0];
        assert!(mismatch.missing.contains("EMP_SEQ"));
        assert!(mismatch.extra.contains("ROGUE_SEQ"));
    }

    #[test]
    fn test_remapped_sequence_resolves_target_schema() {
        let src = snapshot(&[("HR", &["EMP_SEQ"])]);
        let tgt = snapshot(&[("HR2", &["EMP_SEQ2"])]);
        let rules = RemapRules::from_lines(vec!["HR.EMP_SEQ=HR2.EMP_SEQ2"]);
        let mapping = ObjectMapping::build(&src, &rules);

        let results = compare_all(&src, &tgt, &mapping, &["HR".to_string()], &BTreeMap::new());
        assert_eq!(results.ok, vec!["HR->HR2"]);
    }

    #[test]
    fn test_schema_without_metadata_gets_note() {
        let src = CatalogSnapshot::default();
        let tgt = CatalogSnapshot::default();
        let mapping = ObjectMapping::default();
        let mut schema_map = BTreeMap::new();
        schema_map.insert("HR".to_string(), "HR2".to_string());

        let results = compare_all(&src, &tgt, &mapping, &["HR".to_string()], &schema_map);
        assert_eq!(results.mismatched.len(), 1);
        assert_eq!(results.mismatched[0].target_schema, "HR2");
        assert!(results.mismatched[0].note.is_some());
    }
}
