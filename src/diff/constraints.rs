use crate::catalog::{ConstraintDef, ConstraintKind, ObjectKey};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct ConstraintMismatch {
    pub table: ObjectKey,
    /// Source constraint names with no target counterpart.
    pub missing: BTreeSet<String>,
    /// Target constraint names with no source counterpart of the same kind.
    pub extra: BTreeSet<String>,
    pub details: Vec<String>,
}

/// Compare P/U/R constraints by kind and exact column sequence, consuming
/// each target constraint at most once. An unmatched target constraint is
/// tolerated when its column sequence appears under any source constraint
/// kind (the migration may legitimately change the kind). Returns None when
/// everything matches.
pub fn compare(
    table: &ObjectKey,
    source: Option<&[ConstraintDef]>,
    target: &[ConstraintDef],
) -> Option<ConstraintMismatch> {
    let Some(source) = source else {
        return Some(ConstraintMismatch {
            table: table.clone(),
            details: vec![
                "cannot compare: no source constraint metadata for this table".to_string(),
            ],
            ..Default::default()
        });
    };

    let source_all_sequences: BTreeSet<Vec<String>> =
        source.iter().map(|c| c.column_sequence()).collect();

    let mut missing = BTreeSet::new();
    let mut extra = BTreeSet::new();
    let mut details = Vec::new();

    for kind in [
        ConstraintKind::Primary,
        ConstraintKind::Unique,
        ConstraintKind::Foreign,
    ] {
        let src_list: Vec<&ConstraintDef> = source.iter().filter(|c| c.kind == kind).collect();
        let tgt_list: Vec<&ConstraintDef> = target.iter().filter(|c| c.kind == kind).collect();
        let mut tgt_used = vec![false; tgt_list.len()];

        for src_cons in &src_list {
            let cols = src_cons.column_sequence();
            let found = tgt_list
                .iter()
                .enumerate()
                .find(|(idx, tgt_cons)| !tgt_used[*idx] && tgt_cons.column_sequence() == cols);
            match found {
                Some((idx, _)) => tgt_used[idx] = true,
                None => {
                    missing.insert(src_cons.name.to_uppercase());
                    details.push(format!(
                        "{}: source constraint {} over {:?} not found on the target",
                        kind.describe(),
                        src_cons.name,
                        cols
                    ));
                }
            }
        }

        for (idx, used) in tgt_used.iter().enumerate() {
            if *used {
                continue;
            }
            let tgt_cons = tgt_list[idx];
            let cols = tgt_cons.column_sequence();
            if source_all_sequences.contains(&cols) {
                continue;
            }
            extra.insert(tgt_cons.name.to_uppercase());
            details.push(format!(
                "{}: target has an extra constraint {} over {:?}",
                kind.describe(),
                tgt_cons.name,
                cols
            ));
        }
    }

    if missing.is_empty() && extra.is_empty() && details.is_empty() {
        None
    } else {
        Some(ConstraintMismatch {
            table: table.clone(),
            missing,
            extra,
            details,
        })
    }
}
