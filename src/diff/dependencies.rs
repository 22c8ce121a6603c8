use crate::catalog::{CatalogSnapshot, DependencyEdge, ObjectKey, ObjectType};
use crate::mapping::ObjectMapping;
use std::collections::{BTreeMap, BTreeSet};

/// A dependency edge on the target side: (dependent, kind, referenced, kind).
pub type DependencyPair = (ObjectKey, ObjectType, ObjectKey, ObjectType);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyIssue {
    pub dependent: ObjectKey,
    pub dependent_type: ObjectType,
    pub referenced: ObjectKey,
    pub referenced_type: ObjectType,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyReport {
    pub missing: Vec<DependencyIssue>,
    pub unexpected: Vec<DependencyIssue>,
    pub skipped: Vec<DependencyIssue>,
}

/// Project source dependency edges through the mapping. Edges with an
/// unresolvable endpoint cannot be asserted on the target and are returned as
/// skipped, with the offending side named.
pub fn project_expected(
    edges: &[DependencyEdge],
    mapping: &ObjectMapping,
) -> (BTreeSet<DependencyPair>, Vec<DependencyIssue>) {
    let mut expected = BTreeSet::new();
    let mut skipped = Vec::new();

    for edge in edges {
        let dep_target = mapping.target_for(&edge.owner, edge.owner_type);
        let ref_target = mapping.target_for(&edge.referenced, edge.referenced_type);

        let reason = if dep_target.is_none() {
            Some("dependent object is unmanaged or lacks a remap rule, cannot project this edge")
        } else if ref_target.is_none() {
            Some("referenced object is unmanaged or lacks a remap rule, cannot project this edge")
        } else {
            None
        };

        if let Some(reason) = reason {
            skipped.push(DependencyIssue {
                dependent: edge.owner.clone(),
                dependent_type: edge.owner_type,
                referenced: edge.referenced.clone(),
                referenced_type: edge.referenced_type,
                reason: reason.to_string(),
            });
            continue;
        }

        expected.insert((
            dep_target.unwrap().clone(),
            edge.owner_type,
            ref_target.unwrap().clone(),
            edge.referenced_type,
        ));
    }

    (expected, skipped)
}

fn missing_reason(
    dependent: &ObjectKey,
    dependent_type: ObjectType,
    referenced: &ObjectKey,
    referenced_type: ObjectType,
) -> String {
    let ref_obj = format!("{} ({})", referenced, referenced_type);
    let action = match dependent_type {
        ObjectType::Function | ObjectType::Procedure => format!(
            "run ALTER {} {} COMPILE; if it still fails, review the call to {} and its grants",
            dependent_type, dependent, ref_obj
        ),
        ObjectType::Package | ObjectType::PackageBody => format!(
            "run ALTER PACKAGE {} COMPILE and ALTER PACKAGE {} COMPILE BODY, \
             verifying the package can access {}",
            dependent, dependent, ref_obj
        ),
        ObjectType::Trigger => format!(
            "run ALTER TRIGGER {} COMPILE after verifying {} exists and is accessible",
            dependent, ref_obj
        ),
        ObjectType::View | ObjectType::MaterializedView => format!(
            "recreate with CREATE OR REPLACE {} {} once {} exists, then ALTER {} {} COMPILE",
            dependent_type, dependent, ref_obj, dependent_type, dependent
        ),
        ObjectType::Synonym => format!(
            "recreate with CREATE OR REPLACE SYNONYM {} FOR {} and verify the remap target",
            dependent, referenced
        ),
        ObjectType::Type | ObjectType::TypeBody => {
            let body = if dependent_type == ObjectType::TypeBody {
                " BODY"
            } else {
                ""
            };
            format!(
                "verify the type definition, then run ALTER TYPE {} COMPILE{} with {} in place",
                dependent, body, ref_obj
            )
        }
        ObjectType::Index => format!(
            "rebuild index {} and check any expression referencing {}",
            dependent, ref_obj
        ),
        ObjectType::Sequence => format!(
            "recreate sequence {} and check synonyms or grants exposing {}",
            dependent, ref_obj
        ),
        _ => format!(
            "redeploy {} ({}) and verify its reference to {} against the remap rules",
            dependent, dependent_type, ref_obj
        ),
    };

    let mut reason = format!("dependency not established: {}", action);
    if dependent.schema != referenced.schema {
        reason.push_str(
            "; cross-schema dependency, confirm grants (SELECT/EXECUTE/REFERENCES) or synonyms \
             are in place after the remap",
        );
    }
    reason
}

/// Symmetric-difference the projected edges against the target's actual
/// edges. Missing edges get a diagnosis: object absence on either end takes
/// priority over recompilation guidance.
pub fn reconcile(
    expected: &BTreeSet<DependencyPair>,
    actual: &BTreeSet<DependencyPair>,
    skipped: Vec<DependencyIssue>,
    target: &CatalogSnapshot,
) -> DependencyReport {
    let mut report = DependencyReport {
        skipped,
        ..Default::default()
    };

    for (dependent, dependent_type, referenced, referenced_type) in expected.difference(actual) {
        let reason = if !target.contains(*dependent_type, dependent) {
            format!(
                "dependent object {} ({}) is missing on the target; create it first, then recompile",
                dependent, dependent_type
            )
        } else if !target.contains(*referenced_type, referenced) {
            format!(
                "referenced object {} ({}) is missing on the target; migrate it first, then \
                 redeploy {} ({})",
                referenced, referenced_type, dependent, dependent_type
            )
        } else {
            missing_reason(dependent, *dependent_type, referenced, *referenced_type)
        };
        report.missing.push(DependencyIssue {
            dependent: dependent.clone(),
            dependent_type: *dependent_type,
            referenced: referenced.clone(),
            referenced_type: *referenced_type,
            reason,
        });
    }

    for (dependent, dependent_type, referenced, referenced_type) in actual.difference(expected) {
        report.unexpected.push(DependencyIssue {
            dependent: dependent.clone(),
            dependent_type: *dependent_type,
            referenced: referenced.clone(),
            referenced_type: *referenced_type,
            reason: format!(
                "target has an unexpected dependency {} ({}) -> {} ({}); confirm whether to keep it",
                dependent, dependent_type, referenced, referenced_type
            ),
        });
    }

    report
}

/// Grants needed so cross-schema expected edges can resolve: the dependent
/// schema needs a privilege on the referenced object, picked by the referenced
/// kind. Table-to-table edges additionally need REFERENCES for foreign keys.
pub fn required_grants(
    expected: &BTreeSet<DependencyPair>,
) -> BTreeMap<String, BTreeSet<(String, ObjectKey)>> {
    let mut grants: BTreeMap<String, BTreeSet<(String, ObjectKey)>> = BTreeMap::new();

    for (dependent, dependent_type, referenced, referenced_type) in expected {
        if dependent.schema == referenced.schema {
            continue;
        }
        let privilege = referenced_type.grant_privilege();
        grants
            .entry(dependent.schema.clone())
            .or_default()
            .insert((privilege.to_string(), referenced.clone()));
        if *referenced_type == ObjectType::Table && *dependent_type == ObjectType::Table {
            grants
                .entry(dependent.schema.clone())
                .or_default()
                .insert(("REFERENCES".to_string(), referenced.clone()));
        }
    }

    grants
}
