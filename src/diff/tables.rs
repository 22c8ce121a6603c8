use crate::catalog::{ColumnDef, ObjectKey};
use crate::config::LengthWindow;
use crate::constants::IGNORED_TARGET_COLUMNS;
use std::collections::{BTreeMap, BTreeSet};

/// Which side of the acceptable length window a column fell out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthIssueKind {
    /// Below the minimum expansion, data may truncate.
    Short,
    /// Above the cap, worth a review but not a correctness problem.
    Oversize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLengthIssue {
    pub column: String,
    pub source_length: u32,
    pub target_length: u32,
    /// The bound that was violated: minimum for Short, cap for Oversize.
    pub boundary: u32,
    pub kind: LengthIssueKind,
}

#[derive(Debug, Clone, Default)]
pub struct TableMismatch {
    pub target: ObjectKey,
    pub missing_columns: BTreeSet<String>,
    pub extra_columns: BTreeSet<String>,
    pub length_issues: Vec<ColumnLengthIssue>,
    /// Set when the source side gave us nothing to compare against.
    pub note: Option<String>,
}

/// Compare a table's columns. Returns None when the structures agree.
///
/// Bookkeeping columns appended by the migration service are ignored on both
/// sides. VARCHAR lengths on the target must land in
/// `[ceil(src * min), ceil(src * max)]`; anything below is flagged short,
/// anything above oversize.
pub fn compare_columns(
    target: &ObjectKey,
    source_columns: Option<&[ColumnDef]>,
    target_columns: &[ColumnDef],
    window: &LengthWindow,
) -> Option<TableMismatch> {
    let Some(source_columns) = source_columns else {
        return Some(TableMismatch {
            target: target.clone(),
            note: Some("cannot compare: no source column metadata for this table".to_string()),
            ..Default::default()
        });
    };

    let ignored: BTreeSet<String> = IGNORED_TARGET_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect();

    let src_map: BTreeMap<String, &ColumnDef> = source_columns
        .iter()
        .map(|c| (c.name.to_uppercase(), c))
        .filter(|(name, _)| !ignored.contains(name))
        .collect();
    let tgt_map: BTreeMap<String, &ColumnDef> = target_columns
        .iter()
        .map(|c| (c.name.to_uppercase(), c))
        .filter(|(name, _)| !ignored.contains(name))
        .collect();

    let src_names: BTreeSet<&String> = src_map.keys().collect();
    let tgt_names: BTreeSet<&String> = tgt_map.keys().collect();

    let missing_columns: BTreeSet<String> =
        src_names.difference(&tgt_names).map(|s| (*s).clone()).collect();
    let extra_columns: BTreeSet<String> =
        tgt_names.difference(&src_names).map(|s| (*s).clone()).collect();

    let mut length_issues = Vec::new();
    for name in src_names.intersection(&tgt_names) {
        let src = src_map[*name];
        let tgt = tgt_map[*name];
        if !src.is_varchar() {
            continue;
        }
        let (Some(src_len), Some(tgt_len)) = (src.char_length, tgt.char_length) else {
            continue;
        };
        let (min_len, cap_len) = window.bounds(src_len);
        if tgt_len < min_len {
            length_issues.push(ColumnLengthIssue {
                column: (*name).clone(),
                source_length: src_len,
                target_length: tgt_len,
                boundary: min_len,
                kind: LengthIssueKind::Short,
            });
        } else if tgt_len > cap_len {
            length_issues.push(ColumnLengthIssue {
                column: (*name).clone(),
                source_length: src_len,
                target_length: tgt_len,
                boundary: cap_len,
                kind: LengthIssueKind::Oversize,
            });
        }
    }

    if missing_columns.is_empty() && extra_columns.is_empty() && length_issues.is_empty() {
        None
    } else {
        Some(TableMismatch {
            target: target.clone(),
            missing_columns,
            extra_columns,
            length_issues,
            note: None,
        })
    }
}
