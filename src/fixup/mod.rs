use anyhow::{Context, Result};
use itertools::Itertools;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::catalog::{CatalogSnapshot, ConstraintDef, ConstraintKind, ObjectKey, ObjectType};
use crate::constants::{
    COMPILE_SUBDIR, CONSTRAINT_SUBDIR, FIXUP_REVIEW_NOTE, GRANT_SUBDIR, INDEX_SUBDIR,
    SEQUENCE_SUBDIR, TABLE_ALTER_SUBDIR, TRIGGER_SUBDIR,
};
use crate::db::DdlFetcher;
use crate::diff::{ComparisonOutcome, LengthIssueKind, TableMismatch};
use crate::mapping::{CheckItem, ObjectMapping};
use crate::render;

/// What the synthesizer produced: every file written, plus the objects it had
/// to skip because no DDL could be obtained for them.
#[derive(Debug, Default)]
pub struct FixupSummary {
    pub files: Vec<PathBuf>,
    pub skipped: Vec<String>,
}

fn type_subdir(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Table => "table",
        ObjectType::View => "view",
        ObjectType::MaterializedView => "materialized_view",
        ObjectType::Procedure => "procedure",
        ObjectType::Function => "function",
        ObjectType::Package => "package",
        ObjectType::PackageBody => "package_body",
        ObjectType::Synonym => "synonym",
        ObjectType::Job => "job",
        ObjectType::Schedule => "schedule",
        ObjectType::Type => "type",
        ObjectType::TypeBody => "type_body",
        ObjectType::Sequence => SEQUENCE_SUBDIR,
        ObjectType::Trigger => TRIGGER_SUBDIR,
        ObjectType::Index => INDEX_SUBDIR,
    }
}

/// Write one fixup script: header comment, review note, the body, and a
/// guaranteed statement terminator so the batch runner never concatenates
/// two files into one statement.
fn write_fixup_file(
    base_dir: &Path,
    subdir: &str,
    filename: &str,
    content: &str,
    header: &str,
) -> Result<PathBuf> {
    let dir = base_dir.join(subdir);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(filename);

    let body = content.trim();
    let mut text = format!("-- {}\n-- {}\n\n{}\n", header, FIXUP_REVIEW_NOTE, body);
    if !body.is_empty() && !body.ends_with(';') && !body.ends_with('/') {
        text.push_str(";\n");
    }
    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("fixup script written: {}", path.display());
    Ok(path)
}

/// Stale scripts from a previous run must never survive into this one.
fn reset_fixup_dir(base_dir: &Path) -> Result<()> {
    fs::create_dir_all(base_dir).with_context(|| format!("creating {}", base_dir.display()))?;
    for entry in fs::read_dir(base_dir).with_context(|| format!("reading {}", base_dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

fn ensure_terminated(stmt: &str) -> String {
    let trimmed = stmt.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}

pub struct Synthesizer<'a> {
    base_dir: PathBuf,
    source: &'a CatalogSnapshot,
    target: &'a CatalogSnapshot,
    mapping: &'a ObjectMapping,
    outcome: &'a ComparisonOutcome,
    /// target table -> source table, for every TABLE in the check list
    table_sources: BTreeMap<ObjectKey, ObjectKey>,
    replacements: Vec<(ObjectKey, ObjectKey)>,
    summary: FixupSummary,
}

impl<'a> Synthesizer<'a> {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        source: &'a CatalogSnapshot,
        target: &'a CatalogSnapshot,
        mapping: &'a ObjectMapping,
        check_list: &'a [CheckItem],
        outcome: &'a ComparisonOutcome,
    ) -> Synthesizer<'a> {
        let table_sources = check_list
            .iter()
            .filter(|item| item.object_type == ObjectType::Table)
            .map(|item| (item.target.clone(), item.source.clone()))
            .collect();
        Synthesizer {
            base_dir: base_dir.into(),
            source,
            target,
            mapping,
            outcome,
            table_sources,
            replacements: mapping.replacement_pairs(),
            summary: FixupSummary::default(),
        }
    }

    /// Run all synthesis phases in execution order: sequences first, then
    /// tables, column alters, code objects, indexes, constraints, triggers,
    /// dependency recompiles, and grants last.
    pub fn generate(mut self, fetcher: &mut dyn DdlFetcher) -> Result<FixupSummary> {
        reset_fixup_dir(&self.base_dir)?;
        info!("fixup scripts will be written under {}", self.base_dir.display());

        self.emit_sequences(fetcher)?;
        self.emit_missing_tables(fetcher)?;
        self.emit_table_alters()?;
        self.emit_other_missing_objects(fetcher)?;
        self.emit_indexes(fetcher)?;
        let fk_grants = self.emit_constraints(fetcher)?;
        self.emit_triggers(fetcher)?;
        self.emit_compiles()?;
        self.emit_grants(fk_grants)?;

        Ok(self.summary)
    }

    fn record(&mut self, path: PathBuf) {
        self.summary.files.push(path);
    }

    fn skip(&mut self, what: String) {
        warn!("{}", what);
        self.summary.skipped.push(what);
    }

    /// Common text pipeline for a fetched full-object DDL body.
    fn adapt_ddl(&self, ddl: &str, tgt_schema: &str) -> String {
        let ddl = render::rewrite_identifiers(ddl, &self.replacements);
        let ddl = render::cleanup_converter_wrappers(&ddl);
        let ddl = render::prepend_set_schema(&ddl, tgt_schema);
        let ddl = render::strip_using_index(&ddl);
        render::strip_constraint_enable(&ddl)
    }

    fn emit_sequences(&mut self, fetcher: &mut dyn DdlFetcher) -> Result<()> {
        info!("(1/9) sequence scripts");
        let mut tasks = Vec::new();
        for mismatch in &self.outcome.sequences.mismatched {
            for name in &mismatch.missing {
                let src = ObjectKey::new(&mismatch.source_schema, name);
                let tgt = self
                    .mapping
                    .target_for(&src, ObjectType::Sequence)
                    .cloned()
                    .unwrap_or_else(|| ObjectKey::new(&mismatch.target_schema, name));
                tasks.push((src, tgt));
            }
        }

        for (src, tgt) in tasks {
            let Some(ddl) = fetcher.fetch(&src.schema, ObjectType::Sequence, &src.name)? else {
                self.skip(format!("no DDL for SEQUENCE {}", src));
                continue;
            };
            let content = self.adapt_ddl(&ddl, &tgt.schema);
            let path = write_fixup_file(
                &self.base_dir,
                SEQUENCE_SUBDIR,
                &format!("{}.{}.sql", tgt.schema, tgt.name),
                &content,
                &format!("Recreate missing SEQUENCE {} (source: {})", tgt, src),
            )?;
            self.record(path);
        }
        Ok(())
    }

    /// Order CREATE TABLE scripts so referenced tables come before their
    /// dependents. Cycles fall back to name order; the scripts are still
    /// correct, only their suggested execution order degrades.
    fn order_missing_tables(&self, missing: &[(ObjectKey, ObjectKey)]) -> Vec<(ObjectKey, ObjectKey)> {
        let mut graph: DiGraph<ObjectKey, ()> = DiGraph::new();
        let mut nodes: BTreeMap<ObjectKey, NodeIndex> = BTreeMap::new();
        for (_, tgt) in missing {
            let idx = graph.add_node(tgt.clone());
            nodes.insert(tgt.clone(), idx);
        }

        for (src, tgt) in missing {
            let Some(constraints) = self.source.constraints.get(src) else {
                continue;
            };
            for constraint in constraints {
                if constraint.kind != ConstraintKind::Foreign {
                    continue;
                }
                let Some(ref_src) = &constraint.ref_table else {
                    continue;
                };
                let ref_tgt = self
                    .mapping
                    .target_for(ref_src, ObjectType::Table)
                    .cloned()
                    .unwrap_or_else(|| ref_src.clone());
                if let (Some(&from), Some(&to)) = (nodes.get(&ref_tgt), nodes.get(tgt)) {
                    if from != to {
                        graph.add_edge(from, to, ());
                    }
                }
            }
        }

        let by_target: BTreeMap<&ObjectKey, &ObjectKey> =
            missing.iter().map(|(src, tgt)| (tgt, src)).collect();
        match toposort(&graph, None) {
            Ok(order) => order
                .into_iter()
                .map(|idx| {
                    let tgt = graph[idx].clone();
                    let src = (*by_target[&tgt]).clone();
                    (src, tgt)
                })
                .collect(),
            Err(_) => {
                warn!("foreign keys between missing tables form a cycle, using name order");
                let mut sorted = missing.to_vec();
                sorted.sort_by(|a, b| a.1.cmp(&b.1));
                sorted
            }
        }
    }

    fn emit_missing_tables(&mut self, fetcher: &mut dyn DdlFetcher) -> Result<()> {
        info!("(2/9) missing table CREATE scripts");
        let missing: Vec<(ObjectKey, ObjectKey)> = self
            .outcome
            .missing
            .iter()
            .filter(|item| item.object_type == ObjectType::Table)
            .map(|item| (item.source.clone(), item.target.clone()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut manifest = Vec::new();
        for (src, tgt) in self.order_missing_tables(&missing) {
            let Some(ddl) = fetcher.fetch(&src.schema, ObjectType::Table, &src.name)? else {
                self.skip(format!("no DDL for TABLE {}", src));
                continue;
            };
            let content = render::strip_enable_novalidate(&self.adapt_ddl(&ddl, &tgt.schema));
            let filename = format!("{}.{}.sql", tgt.schema, tgt.name);
            let path = write_fixup_file(
                &self.base_dir,
                type_subdir(ObjectType::Table),
                &filename,
                &content,
                &format!("Recreate missing TABLE {} (source: {})", tgt, src),
            )?;
            self.record(path);
            manifest.push(filename);
        }

        if manifest.len() > 1 {
            let path = self
                .base_dir
                .join(type_subdir(ObjectType::Table))
                .join("apply_order.txt");
            fs::write(&path, manifest.join("\n") + "\n")
                .with_context(|| format!("writing {}", path.display()))?;
        }
        Ok(())
    }

    fn alter_statements(&self, mismatch: &TableMismatch, src: &ObjectKey) -> Option<String> {
        let columns = self.source.columns.get(src)?;
        let by_name: BTreeMap<&str, _> = columns.iter().map(|c| (c.name.as_str(), c)).collect();
        let tgt = &mismatch.target;
        let mut lines: Vec<String> = Vec::new();

        if !mismatch.missing_columns.is_empty() {
            lines.push("-- Columns present on the source but absent on the target:".to_string());
            for name in &mismatch.missing_columns {
                let Some(col) = by_name.get(name.as_str()) else {
                    lines.push(format!(
                        "-- WARNING: no source definition found for column {}, add it manually.",
                        name
                    ));
                    continue;
                };
                let mut clause = format!(
                    "ALTER TABLE {}.{} ADD ({} {}",
                    tgt.schema,
                    tgt.name,
                    name,
                    col.type_clause()
                );
                if let Some(default) = col.default.as_deref().map(str::trim).filter(|d| !d.is_empty())
                {
                    clause.push_str(&format!(" DEFAULT {}", default));
                }
                if !col.nullable {
                    clause.push_str(" NOT NULL");
                }
                clause.push_str(");");
                lines.push(clause);
            }
        }

        if !mismatch.length_issues.is_empty() {
            lines.push(String::new());
            lines.push("-- Target lengths outside the accepted expansion window:".to_string());
            for issue in &mismatch.length_issues {
                let Some(col) = by_name.get(issue.column.as_str()) else {
                    continue;
                };
                match issue.kind {
                    LengthIssueKind::Short => {
                        let widened = col
                            .type_clause()
                            .replace("VARCHAR2", "VARCHAR")
                            .replace(
                                &format!("({})", issue.source_length),
                                &format!("({})", issue.boundary),
                            );
                        lines.push(format!(
                            "ALTER TABLE {}.{} MODIFY ({} {}); -- source: {}, target: {}, minimum: {}",
                            tgt.schema,
                            tgt.name,
                            issue.column,
                            widened,
                            issue.source_length,
                            issue.target_length,
                            issue.boundary
                        ));
                    }
                    LengthIssueKind::Oversize => {
                        lines.push(format!(
                            "-- WARNING: {} is wider than expected (source={}, target={}, cap={}), review whether to shrink it.",
                            issue.column, issue.source_length, issue.target_length, issue.boundary
                        ));
                    }
                }
            }
        }

        if !mismatch.extra_columns.is_empty() {
            lines.push(String::new());
            lines.push(
                "-- Columns only the target has; DROP suggestions are commented out for manual review:"
                    .to_string(),
            );
            for name in &mismatch.extra_columns {
                lines.push(format!(
                    "-- ALTER TABLE {}.{} DROP COLUMN {};",
                    tgt.schema, tgt.name, name
                ));
            }
        }

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn emit_table_alters(&mut self) -> Result<()> {
        info!("(3/9) column-level ALTER TABLE scripts");
        let mismatches: Vec<TableMismatch> = self
            .outcome
            .table_mismatches
            .iter()
            .filter(|m| m.note.is_none())
            .cloned()
            .collect();

        for mismatch in mismatches {
            let Some(src) = self.table_sources.get(&mismatch.target).cloned() else {
                continue;
            };
            let Some(body) = self.alter_statements(&mismatch, &src) else {
                self.skip(format!(
                    "no source column metadata for {}, ALTER generation skipped",
                    src
                ));
                continue;
            };
            let tgt = &mismatch.target;
            let content = render::prepend_set_schema(&body, &tgt.schema);
            let path = write_fixup_file(
                &self.base_dir,
                TABLE_ALTER_SUBDIR,
                &format!("{}.{}.alter_columns.sql", tgt.schema, tgt.name),
                &content,
                &format!("Column fixups for TABLE {} (source: {})", tgt, src),
            )?;
            self.record(path);
        }
        Ok(())
    }

    fn emit_other_missing_objects(&mut self, fetcher: &mut dyn DdlFetcher) -> Result<()> {
        info!("(4/9) view / code object scripts");
        let others: Vec<CheckItem> = self
            .outcome
            .missing
            .iter()
            .filter(|item| item.object_type != ObjectType::Table)
            .cloned()
            .collect();

        for item in others {
            let Some(ddl) = fetcher.fetch(&item.source.schema, item.object_type, &item.source.name)?
            else {
                self.skip(format!("no DDL for {} {}", item.object_type, item.source));
                continue;
            };
            let content = self.adapt_ddl(&ddl, &item.target.schema);
            let path = write_fixup_file(
                &self.base_dir,
                type_subdir(item.object_type),
                &format!("{}.{}.sql", item.target.schema, item.target.name),
                &content,
                &format!(
                    "Recreate missing {} {} (source: {})",
                    item.object_type, item.target, item.source
                ),
            )?;
            self.record(path);
        }
        Ok(())
    }

    /// Index fragments live inside the table's exported DDL; lift them out
    /// statement by statement.
    fn emit_indexes(&mut self, fetcher: &mut dyn DdlFetcher) -> Result<()> {
        info!("(5/9) index scripts");
        let mismatches = self.outcome.index_mismatches.clone();
        for mismatch in &mismatches {
            if mismatch.missing.is_empty() {
                continue;
            }
            let Some(src) = self.table_sources.get(&mismatch.table).cloned() else {
                continue;
            };
            let Some(table_ddl) = fetcher.fetch(&src.schema, ObjectType::Table, &src.name)? else {
                self.skip(format!("no DDL for TABLE {}, cannot rebuild its indexes", src));
                continue;
            };

            let extracted = render::extract_statements_for_names(
                &table_ddl,
                &mismatch.missing,
                |stmt| stmt.contains("CREATE") && stmt.contains(" INDEX "),
            );
            for name in &mismatch.missing {
                let statements = extracted.get(&name.to_uppercase()).cloned().unwrap_or_default();
                if statements.is_empty() {
                    self.skip(format!(
                        "index {} not found in the exported DDL of {}",
                        name, src
                    ));
                    continue;
                }
                let body = statements
                    .iter()
                    .map(|stmt| {
                        let stmt = render::rewrite_identifiers(stmt, &self.replacements);
                        ensure_terminated(&render::strip_using_index(&stmt))
                    })
                    .join("\n");
                let tgt_schema = &mismatch.table.schema;
                let content = render::prepend_set_schema(&body, tgt_schema);
                let path = write_fixup_file(
                    &self.base_dir,
                    INDEX_SUBDIR,
                    &format!("{}.{}.sql", tgt_schema, name),
                    &content,
                    &format!("Recreate missing INDEX {} (table: {})", name, mismatch.table),
                )?;
                self.record(path);
            }
        }
        Ok(())
    }

    fn source_constraint(&self, src_table: &ObjectKey, name: &str) -> Option<&ConstraintDef> {
        self.source
            .constraints
            .get(src_table)?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns extra REFERENCES grants needed by recreated cross-schema
    /// foreign keys, merged into the grant phase.
    fn emit_constraints(
        &mut self,
        fetcher: &mut dyn DdlFetcher,
    ) -> Result<BTreeMap<String, BTreeSet<(String, ObjectKey)>>> {
        info!("(6/9) constraint scripts");
        let mut fk_grants: BTreeMap<String, BTreeSet<(String, ObjectKey)>> = BTreeMap::new();
        let mismatches = self.outcome.constraint_mismatches.clone();

        for mismatch in &mismatches {
            if mismatch.missing.is_empty() {
                continue;
            }
            let Some(src) = self.table_sources.get(&mismatch.table).cloned() else {
                continue;
            };
            let table_ddl = fetcher.fetch(&src.schema, ObjectType::Table, &src.name)?;
            let extracted = table_ddl
                .as_deref()
                .map(|ddl| {
                    render::extract_statements_for_names(ddl, &mismatch.missing, |stmt| {
                        stmt.contains("ALTER TABLE") && stmt.contains("CONSTRAINT")
                    })
                })
                .unwrap_or_default();

            for name in &mismatch.missing {
                let tgt = &mismatch.table;
                let constraint = self.source_constraint(&src, name);

                if let Some(def) = constraint {
                    if def.kind == ConstraintKind::Foreign {
                        if let Some(ref_src) = &def.ref_table {
                            let ref_tgt = self
                                .mapping
                                .target_for(ref_src, ObjectType::Table)
                                .cloned()
                                .unwrap_or_else(|| ref_src.clone());
                            if ref_tgt.schema != tgt.schema {
                                fk_grants
                                    .entry(tgt.schema.clone())
                                    .or_default()
                                    .insert(("REFERENCES".to_string(), ref_tgt));
                            }
                        }
                    }
                }

                let mut statements =
                    extracted.get(&name.to_uppercase()).cloned().unwrap_or_default();
                // PRIMARY KEY / UNIQUE definitions are usually inlined in the
                // CREATE TABLE body; rebuild them from catalog metadata.
                if statements.is_empty() {
                    if let Some(def) = constraint {
                        if matches!(def.kind, ConstraintKind::Primary | ConstraintKind::Unique)
                            && !def.columns.is_empty()
                        {
                            statements.push(format!(
                                "ALTER TABLE {}.{} ADD CONSTRAINT {} {} ({})",
                                tgt.schema,
                                tgt.name,
                                name,
                                def.kind.describe(),
                                def.columns.join(", ")
                            ));
                        }
                    }
                }
                if statements.is_empty() {
                    self.skip(format!(
                        "constraint {} on {} has no extractable or rebuildable DDL",
                        name, src
                    ));
                    continue;
                }

                let body = statements
                    .iter()
                    .map(|stmt| {
                        let stmt = render::rewrite_identifiers(stmt, &self.replacements);
                        let stmt = render::strip_using_index(&stmt);
                        let stmt = render::strip_constraint_enable(&stmt);
                        ensure_terminated(&render::strip_enable_novalidate(&stmt))
                    })
                    .join("\n");
                let content = render::prepend_set_schema(&body, &tgt.schema);
                let path = write_fixup_file(
                    &self.base_dir,
                    CONSTRAINT_SUBDIR,
                    &format!("{}.{}.sql", tgt.schema, name),
                    &content,
                    &format!("Recreate missing constraint {} (table: {})", name, tgt),
                )?;
                self.record(path);
            }
        }
        Ok(fk_grants)
    }

    fn emit_triggers(&mut self, fetcher: &mut dyn DdlFetcher) -> Result<()> {
        info!("(7/9) trigger scripts");
        let mismatches = self.outcome.trigger_mismatches.clone();
        for mismatch in &mismatches {
            let Some(src_table) = self.table_sources.get(&mismatch.table).cloned() else {
                continue;
            };
            for name in &mismatch.missing {
                let src = ObjectKey::new(&src_table.schema, name);
                let tgt = self
                    .mapping
                    .target_for(&src, ObjectType::Trigger)
                    .cloned()
                    .unwrap_or_else(|| ObjectKey::new(&mismatch.table.schema, name));

                let Some(ddl) = fetcher.fetch(&src.schema, ObjectType::Trigger, &src.name)? else {
                    self.skip(format!("no DDL for TRIGGER {}", src));
                    continue;
                };
                let content = self.adapt_ddl(&ddl, &tgt.schema);
                let path = write_fixup_file(
                    &self.base_dir,
                    TRIGGER_SUBDIR,
                    &format!("{}.{}.sql", tgt.schema, tgt.name),
                    &content,
                    &format!("Recreate missing trigger {} (source: {})", tgt.name, src),
                )?;
                self.record(path);
            }
        }
        Ok(())
    }

    fn compile_statements(object_type: ObjectType, name: &str) -> Vec<String> {
        match object_type {
            ObjectType::Function | ObjectType::Procedure => {
                vec![format!("ALTER {} {} COMPILE;", object_type, name)]
            }
            ObjectType::Package | ObjectType::PackageBody => vec![
                format!("ALTER PACKAGE {} COMPILE;", name),
                format!("ALTER PACKAGE {} COMPILE BODY;", name),
            ],
            ObjectType::Trigger => vec![format!("ALTER TRIGGER {} COMPILE;", name)],
            ObjectType::View | ObjectType::MaterializedView => {
                vec![format!("ALTER {} {} COMPILE;", object_type, name)]
            }
            ObjectType::Type => vec![format!("ALTER TYPE {} COMPILE;", name)],
            ObjectType::TypeBody => vec![format!("ALTER TYPE {} COMPILE BODY;", name)],
            _ => Vec::new(),
        }
    }

    /// Recompile scripts only make sense for dependents that already exist on
    /// the target; absent objects are handled by the creation phases.
    fn emit_compiles(&mut self) -> Result<()> {
        info!("(8/9) dependency recompilation scripts");
        let mut tasks: BTreeMap<(ObjectKey, ObjectType), BTreeSet<String>> = BTreeMap::new();
        for issue in &self.outcome.dependencies.missing {
            if !self.target.contains(issue.dependent_type, &issue.dependent) {
                continue;
            }
            let statements = Self::compile_statements(issue.dependent_type, &issue.dependent.name);
            if statements.is_empty() {
                continue;
            }
            tasks
                .entry((issue.dependent.clone(), issue.dependent_type))
                .or_default()
                .extend(statements);
        }

        for ((key, object_type), statements) in tasks {
            let body = statements.iter().join("\n");
            let content = render::prepend_set_schema(&body, &key.schema);
            let path = write_fixup_file(
                &self.base_dir,
                COMPILE_SUBDIR,
                &format!("{}.{}.compile.sql", key.schema, key.name),
                &content,
                &format!("Recompile {} {} to re-establish its dependencies", object_type, key),
            )?;
            self.record(path);
        }
        Ok(())
    }

    fn emit_grants(
        &mut self,
        fk_grants: BTreeMap<String, BTreeSet<(String, ObjectKey)>>,
    ) -> Result<()> {
        info!("(9/9) grant scripts");
        let mut merged = self.outcome.required_grants.clone();
        for (grantee, entries) in fk_grants {
            merged.entry(grantee).or_default().extend(entries);
        }

        for (grantee, entries) in merged {
            if entries.is_empty() {
                continue;
            }
            let statements: BTreeSet<String> = entries
                .iter()
                .map(|(privilege, object)| format!("GRANT {} ON {} TO {};", privilege, object, grantee))
                .collect();
            let has_references = statements.iter().any(|s| s.starts_with("GRANT REFERENCES"));
            let header = if has_references {
                format!(
                    "Grants for {} covering remapped dependencies, including REFERENCES for cross-schema foreign keys",
                    grantee
                )
            } else {
                format!("Grants for {} covering remapped dependencies", grantee)
            };
            let path = write_fixup_file(
                &self.base_dir,
                GRANT_SUBDIR,
                &format!("{}_grants.sql", grantee),
                &statements.iter().join("\n"),
                &header,
            )?;
            self.record(path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnDef;
    use crate::config::LengthWindow;
    use crate::mapping::{self, RemapRules};
    use anyhow::Result;

    struct FakeFetcher {
        ddl: BTreeMap<(String, ObjectType, String), String>,
    }

    impl FakeFetcher {
        fn new(entries: Vec<(&str, ObjectType, &str, &str)>) -> FakeFetcher {
            FakeFetcher {
                ddl: entries
                    .into_iter()
                    .map(|(schema, object_type, name, body)| {
                        ((schema.to_string(), object_type, name.to_string()), body.to_string())
                    })
                    .collect(),
            }
        }
    }

    impl DdlFetcher for FakeFetcher {
        fn fetch(
            &mut self,
            schema: &str,
            object_type: ObjectType,
            name: &str,
        ) -> Result<Option<String>> {
            Ok(self
                .ddl
                .get(&(schema.to_uppercase(), object_type, name.to_uppercase()))
                .cloned())
        }
    }

    fn column(name: &str, data_type: &str, len: Option<u32>) -> ColumnDef {
        ColumnDef {
            name: name.to_string(),
            data_type: data_type.to_string(),
            char_length: len,
            data_precision: None,
            data_scale: None,
            nullable: true,
            default: None,
        }
    }

    fn run_synthesis(
        source: &CatalogSnapshot,
        target: &CatalogSnapshot,
        rules: &RemapRules,
        fetcher: &mut FakeFetcher,
        dir: &Path,
    ) -> FixupSummary {
        let mut mapping = ObjectMapping::build(source, rules);
        let check_list = mapping::master_check_list(source, rules).unwrap();
        let schemas: Vec<String> = vec!["HR".to_string()];
        let schema_mapping = mapping::build_schema_mapping(&check_list);
        let outcome = crate::diff::run_comparison(
            source,
            target,
            &check_list,
            rules,
            &mut mapping,
            &schemas,
            &schema_mapping,
            &LengthWindow::default(),
        );
        Synthesizer::new(dir, source, target, &mapping, &check_list, &outcome)
            .generate(fetcher)
            .unwrap()
    }

    #[test]
    fn test_missing_table_script_is_rewritten_and_terminated() {
        let mut source = CatalogSnapshot::default();
        let emp = ObjectKey::new("HR", "EMP");
        source.add_object(ObjectType::Table, emp.clone());
        source.columns.insert(emp, vec![column("ID", "NUMBER", None)]);
        let target = CatalogSnapshot::default();

        let rules = RemapRules::from_lines(["HR.EMP=HR2.EMP"]);
        let mut fetcher = FakeFetcher::new(vec![(
            "HR",
            ObjectType::Table,
            "EMP",
            "CREATE TABLE \"HR\".\"EMP\" (ID NUMBER)",
        )]);
        let dir = tempfile::tempdir().unwrap();
        let summary = run_synthesis(&source, &target, &rules, &mut fetcher, dir.path());

        assert_eq!(summary.files.len(), 1);
        let text = fs::read_to_string(&summary.files[0]).unwrap();
        assert!(summary.files[0].ends_with("table/HR2.EMP.sql"));
        assert!(text.contains("ALTER SESSION SET CURRENT_SCHEMA = HR2;"));
        assert!(text.contains("CREATE TABLE \"HR2\".\"EMP\""));
        assert!(text.trim_end().ends_with(';'));
    }

    #[test]
    fn test_missing_column_produces_add_statement() {
        let emp = ObjectKey::new("HR", "EMP");
        let mut source = CatalogSnapshot::default();
        source.add_object(ObjectType::Table, emp.clone());
        source.columns.insert(
            emp.clone(),
            vec![
                column("ID", "NUMBER", None),
                column("NAME", "VARCHAR2", Some(50)),
                column("SAL", "NUMBER", None),
            ],
        );
        let mut target = CatalogSnapshot::default();
        target.add_object(ObjectType::Table, emp.clone());
        target.columns.insert(
            emp,
            vec![column("ID", "NUMBER", None), column("NAME", "VARCHAR2", Some(100))],
        );

        let mut fetcher = FakeFetcher::new(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let summary =
            run_synthesis(&source, &target, &RemapRules::default(), &mut fetcher, dir.path());

        let alter = summary
            .files
            .iter()
            .find(|p| p.to_string_lossy().contains("alter_columns"))
            .expect("alter script");
        let text = fs::read_to_string(alter).unwrap();
        assert!(text.contains("ALTER TABLE HR.EMP ADD (SAL NUMBER);"));
    }

    #[test]
    fn test_missing_tables_ordered_by_foreign_keys() {
        let emp = ObjectKey::new("HR", "EMP");
        let orders = ObjectKey::new("HR", "ORDERS");
        let mut source = CatalogSnapshot::default();
        source.add_object(ObjectType::Table, emp.clone());
        source.add_object(ObjectType::Table, orders.clone());
        source.columns.insert(emp.clone(), vec![column("ID", "NUMBER", None)]);
        source
            .columns
            .insert(orders.clone(), vec![column("EMP_ID", "NUMBER", None)]);
        source.constraints.insert(
            orders.clone(),
            vec![ConstraintDef {
                name: "FK_ORD_EMP".to_string(),
                kind: ConstraintKind::Foreign,
                columns: vec!["EMP_ID".to_string()],
                ref_owner: Some("HR".to_string()),
                ref_constraint: Some("PK_EMP".to_string()),
                ref_table: Some(emp.clone()),
            }],
        );
        let target = CatalogSnapshot::default();

        let mut fetcher = FakeFetcher::new(vec![
            ("HR", ObjectType::Table, "EMP", "CREATE TABLE HR.EMP (ID NUMBER)"),
            ("HR", ObjectType::Table, "ORDERS", "CREATE TABLE HR.ORDERS (EMP_ID NUMBER)"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        run_synthesis(&source, &target, &RemapRules::default(), &mut fetcher, dir.path());

        let manifest = fs::read_to_string(dir.path().join("table/apply_order.txt")).unwrap();
        let emp_pos = manifest.find("HR.EMP.sql").unwrap();
        let orders_pos = manifest.find("HR.ORDERS.sql").unwrap();
        assert!(emp_pos < orders_pos, "referenced table must come first: {manifest}");
    }

    #[test]
    fn test_primary_key_rebuilt_from_metadata_when_not_in_ddl() {
        let emp = ObjectKey::new("HR", "EMP");
        let mut source = CatalogSnapshot::default();
        source.add_object(ObjectType::Table, emp.clone());
        source.columns.insert(emp.clone(), vec![column("ID", "NUMBER", None)]);
        source.constraints.insert(
            emp.clone(),
            vec![ConstraintDef {
                name: "PK_EMP".to_string(),
                kind: ConstraintKind::Primary,
                columns: vec!["ID".to_string()],
                ref_owner: None,
                ref_constraint: None,
                ref_table: None,
            }],
        );
        let mut target = CatalogSnapshot::default();
        target.add_object(ObjectType::Table, emp.clone());
        target.columns.insert(emp, vec![column("ID", "NUMBER", None)]);

        // table exists on target but has no constraints, and the exported
        // DDL inlines the PK, so the fallback path must kick in
        let mut fetcher = FakeFetcher::new(vec![(
            "HR",
            ObjectType::Table,
            "EMP",
            "CREATE TABLE HR.EMP (ID NUMBER PRIMARY KEY)",
        )]);
        let dir = tempfile::tempdir().unwrap();
        let summary =
            run_synthesis(&source, &target, &RemapRules::default(), &mut fetcher, dir.path());

        let script = summary
            .files
            .iter()
            .find(|p| p.to_string_lossy().contains("constraint/HR.PK_EMP.sql"))
            .expect("constraint script");
        let text = fs::read_to_string(script).unwrap();
        assert!(text.contains("ALTER TABLE HR.EMP ADD CONSTRAINT PK_EMP PRIMARY KEY (ID);"));
    }

    #[test]
    fn test_unfetchable_object_lands_in_skipped() {
        let mut source = CatalogSnapshot::default();
        source.add_object(ObjectType::View, ObjectKey::new("HR", "V_EMP"));
        let target = CatalogSnapshot::default();

        let mut fetcher = FakeFetcher::new(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let summary =
            run_synthesis(&source, &target, &RemapRules::default(), &mut fetcher, dir.path());

        assert!(summary.files.is_empty());
        assert!(summary.skipped.iter().any(|s| s.contains("HR.V_EMP")));
    }

    #[test]
    fn test_stale_scripts_removed_on_rerun() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("table");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("OLD.LEFTOVER.sql"), "-- stale").unwrap();

        let source = CatalogSnapshot::default();
        let target = CatalogSnapshot::default();
        let mut fetcher = FakeFetcher::new(vec![]);
        run_synthesis(&source, &target, &RemapRules::default(), &mut fetcher, dir.path());

        assert!(!stale.join("OLD.LEFTOVER.sql").exists());
    }
}
