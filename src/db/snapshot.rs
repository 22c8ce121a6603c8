use anyhow::{Context, Result};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use super::SqlRunner;
use crate::catalog::{
    CatalogSnapshot, ColumnDef, ConstraintDef, ConstraintKind, DependencyEdge, IndexDef,
    ObjectKey, ObjectType, TriggerDef,
};

fn owners_in(schemas: &BTreeSet<String>) -> String {
    schemas.iter().map(|s| format!("'{}'", s)).join(",")
}

fn tracked_types_in() -> String {
    ObjectType::ALL.iter().map(|t| format!("'{}'", t)).join(",")
}

/// Split the client's silent-mode output into rows of at least `min_fields`
/// tab-separated fields. Shorter rows are dictionary noise and dropped.
fn rows(output: &str, min_fields: usize) -> Vec<Vec<String>> {
    output
        .lines()
        .map(|line| {
            line.split('\t')
                .map(|f| f.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|fields| fields.len() >= min_fields)
        .collect()
}

/// Silent mode prints SQL NULL as the literal string `NULL`.
fn opt_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("NULL") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn opt_num<T: std::str::FromStr>(value: &str) -> Option<T> {
    opt_field(value).and_then(|v| v.parse().ok())
}

fn load_objects(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT OWNER, OBJECT_NAME, OBJECT_TYPE FROM ALL_OBJECTS \
         WHERE OWNER IN ({}) AND OBJECT_TYPE IN ({})",
        owners,
        tracked_types_in()
    );
    let out = runner.run(&sql).context("reading ALL_OBJECTS")?;
    for fields in rows(&out, 3) {
        let Some(object_type) = ObjectType::parse(&fields[2]) else {
            continue;
        };
        snapshot.add_object(object_type, ObjectKey::new(&fields[0], &fields[1]));
    }

    // Some targets omit TYPE / TYPE BODY from ALL_OBJECTS; ALL_TYPES fills
    // the gap. A failure here degrades the type check instead of aborting.
    let sql = format!(
        "SELECT OWNER, TYPE_NAME, TYPECODE FROM ALL_TYPES WHERE OWNER IN ({})",
        owners
    );
    match runner.run(&sql) {
        Ok(out) => {
            for fields in rows(&out, 3) {
                let key = ObjectKey::new(&fields[0], &fields[1]);
                snapshot.add_object(ObjectType::Type, key.clone());
                if fields[2].eq_ignore_ascii_case("OBJECT") {
                    snapshot.add_object(ObjectType::TypeBody, key);
                }
            }
        }
        Err(err) => warn!("ALL_TYPES unavailable, TYPE checks may be incomplete: {err:#}"),
    }

    dedup_materialized_views(runner, owners, snapshot)?;
    Ok(())
}

/// A materialized view shows up in ALL_OBJECTS as both MATERIALIZED VIEW and
/// TABLE. Drop the TABLE facet only when ALL_MVIEWS confirms it and ALL_TABLES
/// does not list a genuine table of the same name.
fn dedup_materialized_views(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT OWNER, MVIEW_NAME FROM ALL_MVIEWS WHERE OWNER IN ({})",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_MVIEWS")?;
    let mviews: BTreeSet<ObjectKey> = rows(&out, 2)
        .into_iter()
        .map(|f| ObjectKey::new(&f[0], &f[1]))
        .collect();
    if mviews.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "SELECT OWNER, TABLE_NAME FROM ALL_TABLES WHERE OWNER IN ({})",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_TABLES")?;
    let all_tables: BTreeSet<ObjectKey> = rows(&out, 2)
        .into_iter()
        .map(|f| ObjectKey::new(&f[0], &f[1]))
        .collect();
    let pure_tables: BTreeSet<&ObjectKey> = all_tables.difference(&mviews).collect();

    let mview_objects = snapshot.objects_of(ObjectType::MaterializedView).cloned().collect::<Vec<_>>();
    let mut dropped = 0usize;
    if let Some(tables) = snapshot.objects.get_mut(&ObjectType::Table) {
        for key in mview_objects {
            if tables.contains(&key) && mviews.contains(&key) && !pure_tables.contains(&key) {
                tables.remove(&key);
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        info!("removed {} duplicate TABLE facets of materialized views", dropped);
    }
    Ok(())
}

fn load_columns(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT OWNER, TABLE_NAME, COLUMN_NAME, DATA_TYPE, CHAR_LENGTH, \
         DATA_PRECISION, DATA_SCALE, NULLABLE, DATA_DEFAULT \
         FROM ALL_TAB_COLUMNS WHERE OWNER IN ({}) \
         ORDER BY OWNER, TABLE_NAME, COLUMN_ID",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_TAB_COLUMNS")?;
    for fields in rows(&out, 9) {
        let table = ObjectKey::new(&fields[0], &fields[1]);
        snapshot.columns.entry(table).or_default().push(ColumnDef {
            name: fields[2].to_uppercase(),
            data_type: fields[3].to_uppercase(),
            char_length: opt_num(&fields[4]),
            data_precision: opt_num(&fields[5]),
            data_scale: opt_num(&fields[6]),
            nullable: !fields[7].eq_ignore_ascii_case("N"),
            default: opt_field(&fields[8]),
        });
    }
    Ok(())
}

fn load_indexes(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT TABLE_OWNER, TABLE_NAME, INDEX_NAME, UNIQUENESS \
         FROM ALL_INDEXES WHERE TABLE_OWNER IN ({})",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_INDEXES")?;
    let mut by_table: BTreeMap<ObjectKey, BTreeMap<String, IndexDef>> = BTreeMap::new();
    for fields in rows(&out, 4) {
        let table = ObjectKey::new(&fields[0], &fields[1]);
        let name = fields[2].to_uppercase();
        by_table.entry(table).or_default().insert(
            name.clone(),
            IndexDef {
                name,
                unique: fields[3].eq_ignore_ascii_case("UNIQUE"),
                columns: Vec::new(),
            },
        );
    }

    let sql = format!(
        "SELECT TABLE_OWNER, TABLE_NAME, INDEX_NAME, COLUMN_NAME \
         FROM ALL_IND_COLUMNS WHERE TABLE_OWNER IN ({}) \
         ORDER BY TABLE_OWNER, TABLE_NAME, INDEX_NAME, COLUMN_POSITION",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_IND_COLUMNS")?;
    for fields in rows(&out, 4) {
        let table = ObjectKey::new(&fields[0], &fields[1]);
        let name = fields[2].to_uppercase();
        by_table
            .entry(table)
            .or_default()
            .entry(name.clone())
            .or_insert_with(|| IndexDef {
                name,
                unique: false,
                columns: Vec::new(),
            })
            .columns
            .push(fields[3].to_uppercase());
    }

    for (table, indexes) in by_table {
        snapshot
            .indexes
            .insert(table, indexes.into_values().collect());
    }
    Ok(())
}

fn load_constraints(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT OWNER, TABLE_NAME, CONSTRAINT_NAME, CONSTRAINT_TYPE, R_OWNER, R_CONSTRAINT_NAME \
         FROM ALL_CONSTRAINTS WHERE OWNER IN ({}) \
         AND CONSTRAINT_TYPE IN ('P','U','R') AND STATUS = 'ENABLED'",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_CONSTRAINTS")?;
    let mut by_table: BTreeMap<ObjectKey, BTreeMap<String, ConstraintDef>> = BTreeMap::new();
    for fields in rows(&out, 6) {
        let Some(kind) = ConstraintKind::from_code(&fields[3]) else {
            continue;
        };
        let table = ObjectKey::new(&fields[0], &fields[1]);
        let name = fields[2].to_uppercase();
        by_table.entry(table).or_default().insert(
            name.clone(),
            ConstraintDef {
                name,
                kind,
                columns: Vec::new(),
                ref_owner: opt_field(&fields[4]).map(|s| s.to_uppercase()),
                ref_constraint: opt_field(&fields[5]).map(|s| s.to_uppercase()),
                ref_table: None,
            },
        );
    }

    let sql = format!(
        "SELECT OWNER, TABLE_NAME, CONSTRAINT_NAME, COLUMN_NAME \
         FROM ALL_CONS_COLUMNS WHERE OWNER IN ({}) \
         ORDER BY OWNER, TABLE_NAME, CONSTRAINT_NAME, POSITION",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_CONS_COLUMNS")?;
    for fields in rows(&out, 4) {
        let table = ObjectKey::new(&fields[0], &fields[1]);
        let name = fields[2].to_uppercase();
        if let Some(def) = by_table
            .get_mut(&table)
            .and_then(|cons| cons.get_mut(&name))
        {
            def.columns.push(fields[3].to_uppercase());
        }
    }

    // Resolve each foreign key's referenced table from the P/U constraint it
    // points at, so CREATE TABLE fixups can be ordered by dependency.
    let mut constraint_tables: BTreeMap<(String, String), ObjectKey> = BTreeMap::new();
    for (table, cons) in &by_table {
        for def in cons.values() {
            if matches!(def.kind, ConstraintKind::Primary | ConstraintKind::Unique) {
                constraint_tables.insert((table.schema.clone(), def.name.clone()), table.clone());
            }
        }
    }
    for cons in by_table.values_mut() {
        for def in cons.values_mut() {
            if def.kind != ConstraintKind::Foreign {
                continue;
            }
            if let (Some(r_owner), Some(r_cons)) = (&def.ref_owner, &def.ref_constraint) {
                def.ref_table = constraint_tables
                    .get(&(r_owner.clone(), r_cons.clone()))
                    .cloned();
            }
        }
    }

    for (table, cons) in by_table {
        snapshot
            .constraints
            .insert(table, cons.into_values().collect());
    }
    Ok(())
}

fn load_triggers(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT TABLE_OWNER, TABLE_NAME, TRIGGER_NAME, TRIGGERING_EVENT, STATUS \
         FROM ALL_TRIGGERS WHERE TABLE_OWNER IN ({})",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_TRIGGERS")?;
    for fields in rows(&out, 5) {
        let table = ObjectKey::new(&fields[0], &fields[1]);
        let name = fields[2].to_uppercase();
        snapshot.triggers.entry(table).or_default().insert(
            name.clone(),
            TriggerDef {
                name,
                event: fields[3].clone(),
                status: fields[4].clone(),
            },
        );
    }
    Ok(())
}

fn load_sequences(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let sql = format!(
        "SELECT SEQUENCE_OWNER, SEQUENCE_NAME FROM ALL_SEQUENCES \
         WHERE SEQUENCE_OWNER IN ({})",
        owners
    );
    let out = runner.run(&sql).context("reading ALL_SEQUENCES")?;
    for fields in rows(&out, 2) {
        snapshot
            .sequences
            .entry(fields[0].to_uppercase())
            .or_default()
            .insert(fields[1].to_uppercase());
    }
    Ok(())
}

fn load_dependencies(
    runner: &dyn SqlRunner,
    owners: &str,
    snapshot: &mut CatalogSnapshot,
) -> Result<()> {
    let types = tracked_types_in();
    let sql = format!(
        "SELECT OWNER, NAME, TYPE, REFERENCED_OWNER, REFERENCED_NAME, REFERENCED_TYPE \
         FROM ALL_DEPENDENCIES WHERE OWNER IN ({owners}) \
         AND REFERENCED_OWNER IN ({owners}) \
         AND TYPE IN ({types}) AND REFERENCED_TYPE IN ({types})"
    );
    let out = runner.run(&sql).context("reading ALL_DEPENDENCIES")?;
    for fields in rows(&out, 6) {
        let (Some(owner_type), Some(referenced_type)) =
            (ObjectType::parse(&fields[2]), ObjectType::parse(&fields[5]))
        else {
            continue;
        };
        snapshot.dependencies.push(DependencyEdge {
            owner: ObjectKey::new(&fields[0], &fields[1]),
            owner_type,
            referenced: ObjectKey::new(&fields[3], &fields[4]),
            referenced_type,
        });
    }
    Ok(())
}

/// Dump one side's dictionary into a snapshot. Every pass is a single query
/// over the configured schemas, so a run costs a fixed number of round trips
/// regardless of object count.
pub fn load_snapshot(
    runner: &dyn SqlRunner,
    schemas: &BTreeSet<String>,
) -> Result<CatalogSnapshot> {
    let mut snapshot = CatalogSnapshot::default();
    if schemas.is_empty() {
        warn!("no schemas configured, returning an empty snapshot");
        return Ok(snapshot);
    }

    let owners = owners_in(schemas);
    load_objects(runner, &owners, &mut snapshot)?;
    load_columns(runner, &owners, &mut snapshot)?;
    load_indexes(runner, &owners, &mut snapshot)?;
    load_constraints(runner, &owners, &mut snapshot)?;
    load_triggers(runner, &owners, &mut snapshot)?;
    load_sequences(runner, &owners, &mut snapshot)?;
    load_dependencies(runner, &owners, &mut snapshot)?;

    info!(
        "snapshot loaded: {} object kinds, {} tables with columns, {} dependency edges",
        snapshot.objects.len(),
        snapshot.columns.len(),
        snapshot.dependencies.len()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::FakeRunner;

    fn schemas(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fake_catalog() -> FakeRunner {
        FakeRunner::new(vec![
            ("ALL_OBJECTS", "HR\tEMP\tTABLE\nHR\tV_EMP\tVIEW\nHR\tMV_SUM\tMATERIALIZED VIEW\nHR\tMV_SUM\tTABLE"),
            ("ALL_TYPES", "HR\tT_ADDR\tOBJECT"),
            ("ALL_MVIEWS", "HR\tMV_SUM"),
            ("ALL_TABLES", "HR\tEMP\nHR\tMV_SUM"),
            (
                "ALL_TAB_COLUMNS",
                "HR\tEMP\tID\tNUMBER\tNULL\t10\t0\tN\tNULL\nHR\tEMP\tNAME\tVARCHAR2\t50\tNULL\tNULL\tY\t'X'",
            ),
            ("ALL_INDEXES", "HR\tEMP\tIX_EMP_NAME\tNONUNIQUE"),
            ("ALL_IND_COLUMNS", "HR\tEMP\tIX_EMP_NAME\tNAME"),
            (
                "ALL_CONSTRAINTS",
                "HR\tEMP\tPK_EMP\tP\tNULL\tNULL\nHR\tORDERS\tFK_ORD_EMP\tR\tHR\tPK_EMP",
            ),
            (
                "ALL_CONS_COLUMNS",
                "HR\tEMP\tPK_EMP\tID\nHR\tORDERS\tFK_ORD_EMP\tEMP_ID",
            ),
            ("ALL_TRIGGERS", "HR\tEMP\tTRG_EMP_AUDIT\tINSERT OR UPDATE\tENABLED"),
            ("ALL_SEQUENCES", "HR\tSEQ_EMP"),
            (
                "ALL_DEPENDENCIES",
                "HR\tV_EMP\tVIEW\tHR\tEMP\tTABLE",
            ),
        ])
    }

    #[test]
    fn test_load_snapshot_assembles_all_sections() {
        let snapshot = load_snapshot(&fake_catalog(), &schemas(&["HR"])).unwrap();

        let emp = ObjectKey::new("HR", "EMP");
        assert!(snapshot.contains(ObjectType::Table, &emp));
        assert!(snapshot.contains(ObjectType::View, &ObjectKey::new("HR", "V_EMP")));
        assert!(snapshot.contains(ObjectType::Type, &ObjectKey::new("HR", "T_ADDR")));
        assert!(snapshot.contains(ObjectType::TypeBody, &ObjectKey::new("HR", "T_ADDR")));

        let cols = &snapshot.columns[&emp];
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "ID");
        assert_eq!(cols[0].data_precision, Some(10));
        assert!(!cols[0].nullable);
        assert_eq!(cols[1].char_length, Some(50));
        assert_eq!(cols[1].default.as_deref(), Some("'X'"));

        assert_eq!(snapshot.indexes[&emp][0].columns, vec!["NAME"]);
        assert_eq!(snapshot.triggers[&emp]["TRG_EMP_AUDIT"].status, "ENABLED");
        assert!(snapshot.sequences["HR"].contains("SEQ_EMP"));
        assert_eq!(snapshot.dependencies.len(), 1);
    }

    #[test]
    fn test_mview_table_facet_removed() {
        let snapshot = load_snapshot(&fake_catalog(), &schemas(&["HR"])).unwrap();
        let mv = ObjectKey::new("HR", "MV_SUM");
        assert!(snapshot.contains(ObjectType::MaterializedView, &mv));
        assert!(!snapshot.contains(ObjectType::Table, &mv));
    }

    #[test]
    fn test_foreign_key_ref_table_resolved() {
        let snapshot = load_snapshot(&fake_catalog(), &schemas(&["HR"])).unwrap();
        let orders = ObjectKey::new("HR", "ORDERS");
        let fk = snapshot.constraints[&orders]
            .iter()
            .find(|c| c.kind == ConstraintKind::Foreign)
            .unwrap();
        assert_eq!(fk.ref_table, Some(ObjectKey::new("HR", "EMP")));
    }

    #[test]
    fn test_empty_schema_set_short_circuits() {
        let runner = FakeRunner::new(vec![]);
        let snapshot = load_snapshot(&runner, &BTreeSet::new()).unwrap();
        assert!(snapshot.objects.is_empty());
    }
}
