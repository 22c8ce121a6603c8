use crate::catalog::{ConstraintDef, ConstraintKind, IndexDef, ObjectKey};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct IndexMismatch {
    pub table: ObjectKey,
    /// Representative source index names whose column sequence is absent.
    pub missing: BTreeSet<String>,
    /// Target index names with no source counterpart.
    pub extra: BTreeSet<String>,
    pub details: Vec<String>,
}

struct SequenceBucket {
    names: BTreeSet<String>,
    unique_flags: BTreeSet<bool>,
}

fn bucket_by_sequence(indexes: &[IndexDef]) -> BTreeMap<Vec<String>, SequenceBucket> {
    let mut result: BTreeMap<Vec<String>, SequenceBucket> = BTreeMap::new();
    for index in indexes {
        let cols = index.column_sequence();
        if cols.is_empty() {
            continue;
        }
        let bucket = result.entry(cols).or_insert_with(|| SequenceBucket {
            names: BTreeSet::new(),
            unique_flags: BTreeSet::new(),
        });
        bucket.names.insert(index.name.to_uppercase());
        bucket.unique_flags.insert(index.unique);
    }
    result
}

fn representative_name(
    map: &BTreeMap<Vec<String>, SequenceBucket>,
    cols: &[String],
) -> String {
    map.get(cols)
        .and_then(|bucket| bucket.names.iter().next().cloned())
        .unwrap_or_else(|| format!("{:?}", cols))
}

/// Compare indexes by canonical column sequence, never by name. A missing
/// sequence is forgiven when a target PRIMARY KEY or UNIQUE constraint covers
/// exactly the same columns. Returns None when the sequences agree.
pub fn compare(
    table: &ObjectKey,
    source: Option<&[IndexDef]>,
    target: &[IndexDef],
    target_constraints: &[ConstraintDef],
) -> Option<IndexMismatch> {
    let Some(source) = source else {
        return Some(IndexMismatch {
            table: table.clone(),
            details: vec![
                "cannot compare: no source index metadata for this table".to_string(),
            ],
            ..Default::default()
        });
    };

    let src_map = bucket_by_sequence(source);
    let tgt_map = bucket_by_sequence(target);

    let constraint_sequences: BTreeSet<Vec<String>> = target_constraints
        .iter()
        .filter(|c| matches!(c.kind, ConstraintKind::Primary | ConstraintKind::Unique))
        .map(|c| c.column_sequence())
        .collect();

    let src_seqs: BTreeSet<&Vec<String>> = src_map.keys().collect();
    let tgt_seqs: BTreeSet<&Vec<String>> = tgt_map.keys().collect();

    let mut details = Vec::new();

    for cols in src_seqs.intersection(&tgt_seqs) {
        let src_uniq = &src_map[*cols].unique_flags;
        let tgt_uniq = &tgt_map[*cols].unique_flags;
        if src_uniq != tgt_uniq {
            details.push(format!(
                "index columns {:?}: uniqueness differs (source {:?}, target {:?})",
                cols,
                src_uniq.iter().collect::<Vec<_>>(),
                tgt_uniq.iter().collect::<Vec<_>>()
            ));
        }
    }

    let mut missing = BTreeSet::new();
    for cols in src_seqs.difference(&tgt_seqs) {
        // A P/U constraint over the same columns already enforces the access
        // path, no separate index is required.
        if constraint_sequences.contains(*cols) {
            continue;
        }
        missing.insert(representative_name(&src_map, cols));
        details.push(format!("index columns {:?} not found on the target", cols));
    }

    let mut extra = BTreeSet::new();
    for cols in tgt_seqs.difference(&src_seqs) {
        extra.insert(representative_name(&tgt_map, cols));
        details.push(format!("target has an extra index over columns {:?}", cols));
    }

    if missing.is_empty() && extra.is_empty() && details.is_empty() {
        None
    } else {
        Some(IndexMismatch {
            table: table.clone(),
            missing,
            extra,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(name: &str, unique: bool, columns: &[&str]) -> IndexDef {
        IndexDef {
            name: name.to_string(),
            unique,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn pk(name: &str, columns: &[&str]) -> ConstraintDef {
        ConstraintDef {
            name: name.to_string(),
            kind: ConstraintKind::Primary,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ref_owner: None,
            ref_constraint: None,
            ref_table: None,
        }
    }

    fn emp() -> ObjectKey {
        ObjectKey::new("HR2", "EMP")
    }

    #[test]
    fn test_renamed_index_with_same_columns_matches() {
        let src = vec![index("IX1", false, &["DEPT", "SAL"])];
        let tgt = vec![index("IX2", false, &["dept", "sal"])];
        assert!(compare(&emp(), Some(&src), &tgt, &[]).is_none());
    }

    #[test]
    fn test_missing_sequence_is_reported_by_source_name() {
        let src = vec![index("IX_EMP_DEPT", false, &["DEPT"])];
        let mismatch = compare(&emp(), Some(&src), &[], &[]).unwrap();
        assert!(mismatch.missing.contains("IX_EMP_DEPT"));
        assert!(mismatch.extra.is_empty());
    }

    #[test]
    fn test_constraint_covers_missing_index() {
        let src = vec![index("IX_EMP_ID", true, &["ID"])];
        let constraints = vec![pk("PK_EMP", &["ID"])];
        assert!(compare(&emp(), Some(&src), &[], &constraints).is_none());
    }

    #[test]
    fn test_constraint_with_different_columns_does_not_cover() {
        let src = vec![index("IX_EMP_DEPT", false, &["DEPT"])];
        let constraints = vec![pk("PK_EMP", &["ID"])];
        let mismatch = compare(&emp(), Some(&src), &[], &constraints).unwrap();
        assert!(mismatch.missing.contains("IX_EMP_DEPT"));
    }

    #[test]
    fn test_uniqueness_difference_is_detail_only() {
        let src = vec![index("IX1", true, &["CODE"])];
        let tgt = vec![index("IX1", false, &["CODE"])];
        let mismatch = compare(&emp(), Some(&src), &tgt, &[]).unwrap();
        assert!(mismatch.missing.is_empty());
        assert!(mismatch.extra.is_empty());
        assert_eq!(mismatch.details.len(), 1);
        assert!(mismatch.details[0].contains("uniqueness"));
    }

    #[test]
    fn test_extra_target_index() {
        let tgt = vec![index("IX_NEW", false, &["STATUS"])];
        let mismatch = compare(&emp(), Some(&[]), &tgt, &[]).unwrap();
        assert!(mismatch.extra.contains("IX_NEW"));
    }

    #[test]
    fn test_no_source_metadata() {
        let mismatch = compare(&emp(), None, &[], &[]).unwrap();
        assert!(mismatch.details[0].contains("cannot compare"));
    }
}
