use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::diff::ComparisonOutcome;
use crate::fixup::FixupSummary;

/// Accumulates the plain-text report while echoing a styled copy to stdout.
struct ReportBuilder {
    lines: Vec<String>,
}

impl ReportBuilder {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn heading(&mut self, text: &str) {
        println!();
        println!("{}", style(text).bold());
        self.lines.push(String::new());
        self.lines.push(text.to_string());
        self.lines.push("-".repeat(text.len()));
    }

    fn plain(&mut self, text: impl Into<String>) {
        let text = text.into();
        println!("  {}", text);
        self.lines.push(format!("  {}", text));
    }

    fn ok(&mut self, text: impl Into<String>) {
        let text = text.into();
        println!("  {} {}", style("✓").green(), text);
        self.lines.push(format!("  [ok] {}", text));
    }

    fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        println!("  {} {}", style("⚠").yellow(), text);
        self.lines.push(format!("  [warn] {}", text));
    }

    fn fail(&mut self, text: impl Into<String>) {
        let text = text.into();
        println!("  {} {}", style("✗").red(), style(&text).red());
        self.lines.push(format!("  [fail] {}", text));
    }
}

fn render(outcome: &ComparisonOutcome, fixup: Option<&FixupSummary>) -> Vec<String> {
    let mut r = ReportBuilder::new();

    r.heading("Object counts (managed schemas)");
    for count in &outcome.counts {
        let line = format!(
            "{:<20} source {:>6}  target {:>6}",
            count.object_type.to_string(),
            count.source,
            count.target
        );
        if count.source == count.target {
            r.ok(line);
        } else {
            r.fail(line);
        }
    }

    r.heading("Missing target objects");
    if outcome.missing.is_empty() {
        r.ok("every mapped object exists on the target");
    } else {
        for item in &outcome.missing {
            r.fail(format!(
                "{} {} (expected from {})",
                item.object_type, item.target, item.source
            ));
        }
    }

    r.heading("Unexpected target objects");
    let extras: usize = outcome.extra_targets.values().map(|s| s.len()).sum();
    if extras == 0 {
        r.ok("no unclaimed objects in the managed target schemas");
    } else {
        for (object_type, keys) in &outcome.extra_targets {
            for key in keys {
                r.warn(format!("{} {} has no source counterpart", object_type, key));
            }
        }
    }

    r.heading("Table structure");
    if outcome.table_mismatches.is_empty() {
        r.ok("all compared tables match");
    } else {
        for mismatch in &outcome.table_mismatches {
            if let Some(note) = &mismatch.note {
                r.warn(format!("{}: {}", mismatch.target, note));
                continue;
            }
            for column in &mismatch.missing_columns {
                r.fail(format!("{}: column {} missing on target", mismatch.target, column));
            }
            for column in &mismatch.extra_columns {
                r.warn(format!("{}: column {} only exists on target", mismatch.target, column));
            }
            for issue in &mismatch.length_issues {
                r.fail(format!(
                    "{}: column {} length {} vs source {} (accepted bound {})",
                    mismatch.target,
                    issue.column,
                    issue.target_length,
                    issue.source_length,
                    issue.boundary
                ));
            }
        }
    }

    r.heading("Indexes");
    if outcome.index_mismatches.is_empty() {
        r.ok("index column sequences match");
    } else {
        for mismatch in &outcome.index_mismatches {
            for detail in &mismatch.details {
                r.fail(format!("{}: {}", mismatch.table, detail));
            }
        }
    }

    r.heading("Constraints");
    if outcome.constraint_mismatches.is_empty() {
        r.ok("constraints match");
    } else {
        for mismatch in &outcome.constraint_mismatches {
            for detail in &mismatch.details {
                r.fail(format!("{}: {}", mismatch.table, detail));
            }
        }
    }

    r.heading("Triggers");
    r.plain(format!(
        "{} table(s) matched, {} without triggers on either side",
        outcome.triggers_ok, outcome.triggers_not_applicable
    ));
    for mismatch in &outcome.trigger_mismatches {
        for detail in &mismatch.details {
            r.fail(format!("{}: {}", mismatch.table, detail));
        }
    }

    r.heading("Sequences");
    for pair in &outcome.sequences.ok {
        r.ok(format!("{} reconciled", pair));
    }
    for mismatch in &outcome.sequences.mismatched {
        let pair = format!("{}->{}", mismatch.source_schema, mismatch.target_schema);
        if let Some(note) = &mismatch.note {
            r.warn(format!("{}: {}", pair, note));
        }
        for name in &mismatch.missing {
            r.fail(format!("{}: sequence {} missing on target", pair, name));
        }
        for name in &mismatch.extra {
            r.warn(format!("{}: sequence {} only exists on target", pair, name));
        }
    }

    r.heading("Dependencies");
    if outcome.dependencies.missing.is_empty() && outcome.dependencies.unexpected.is_empty() {
        r.ok("expected dependency edges are all present");
    }
    for issue in &outcome.dependencies.missing {
        r.fail(format!(
            "{} {} no longer depends on {} {}: {}",
            issue.dependent_type, issue.dependent, issue.referenced_type, issue.referenced,
            issue.reason
        ));
    }
    for issue in &outcome.dependencies.unexpected {
        r.warn(format!(
            "{} {} depends on {} {} with no source counterpart: {}",
            issue.dependent_type, issue.dependent, issue.referenced_type, issue.referenced,
            issue.reason
        ));
    }
    if !outcome.dependencies.skipped.is_empty() {
        r.plain(format!(
            "{} dependency edge(s) could not be projected through the mapping",
            outcome.dependencies.skipped.len()
        ));
    }

    if !outcome.required_grants.is_empty() {
        r.heading("Suggested grants");
        for (grantee, entries) in &outcome.required_grants {
            for (privilege, object) in entries {
                r.plain(format!("GRANT {} ON {} TO {};", privilege, object, grantee));
            }
        }
    }

    if !outcome.extraneous_rules.is_empty() {
        r.heading("Extraneous remap rules");
        for rule in &outcome.extraneous_rules {
            r.warn(format!("{} matches nothing in the source snapshot", rule));
        }
    }

    if let Some(summary) = fixup {
        r.heading("Fixup scripts");
        r.plain(format!("{} script(s) written", summary.files.len()));
        r.plain(
            "grouped per category (sequence, table, table_alter, index, constraint, \
             trigger, compile, grant, one directory per code object kind); review \
             before executing",
        );
        for skipped in &summary.skipped {
            r.warn(skipped.clone());
        }
    }

    r.heading("Verdict");
    if outcome.is_clean() {
        r.ok("source and target catalogs reconcile");
    } else {
        r.fail("discrepancies found, review the sections above");
    }

    r.lines
}

/// Print the comparison report to stdout and persist a plain-text copy under
/// the configured report directory.
pub fn emit(
    outcome: &ComparisonOutcome,
    fixup: Option<&FixupSummary>,
    report_dir: &str,
) -> Result<PathBuf> {
    let lines = render(outcome, fixup);

    fs::create_dir_all(report_dir).with_context(|| format!("creating {}", report_dir))?;
    let filename = format!("report_{}.txt", Local::now().format("%Y%m%d_%H%M%S"));
    let path = PathBuf::from(report_dir).join(filename);
    fs::write(&path, lines.join("\n") + "\n")
        .with_context(|| format!("writing {}", path.display()))?;
    info!("report saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ObjectKey, ObjectType};
    use crate::mapping::CheckItem;

    #[test]
    fn test_clean_outcome_reports_reconciled() {
        let lines = render(&ComparisonOutcome::default(), None);
        let text = lines.join("\n");
        assert!(text.contains("[ok] source and target catalogs reconcile"));
        assert!(!text.contains("[fail]"));
    }

    #[test]
    fn test_missing_object_listed_with_its_source() {
        let mut outcome = ComparisonOutcome::default();
        outcome.missing.push(CheckItem {
            source: ObjectKey::new("HR", "EMP"),
            target: ObjectKey::new("HR2", "EMP"),
            object_type: ObjectType::Table,
        });
        let text = render(&outcome, None).join("\n");
        assert!(text.contains("[fail] TABLE HR2.EMP (expected from HR.EMP)"));
        assert!(text.contains("[fail] discrepancies found"));
    }

    #[test]
    fn test_report_file_written() {
        let mut summary = FixupSummary::default();
        summary.skipped.push("no DDL for TABLE HR.EMP".to_string());
        let dir = tempfile::tempdir().unwrap();
        let path = emit(
            &ComparisonOutcome::default(),
            Some(&summary),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("[warn] no DDL for TABLE HR.EMP"));
        assert!(text.contains("Verdict"));
    }
}
