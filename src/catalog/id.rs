use anyhow::{Result, anyhow};
use std::fmt;
use std::str::FromStr;

/// A schema-qualified object name, upper-cased on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub schema: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.trim().to_uppercase(),
            name: name.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (schema, name) = s
            .split_once('.')
            .ok_or_else(|| anyhow!("expected SCHEMA.OBJECT, got '{}'", s))?;
        if schema.trim().is_empty() || name.trim().is_empty() {
            return Err(anyhow!("expected SCHEMA.OBJECT, got '{}'", s));
        }
        Ok(ObjectKey::new(schema, name))
    }
}

/// Database object kinds tracked by the reconciler.
///
/// The primary kinds drive the missing/extra object check; the remaining
/// kinds only participate in structural comparison and dependency analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Table,
    View,
    MaterializedView,
    Procedure,
    Function,
    Package,
    PackageBody,
    Synonym,
    Job,
    Schedule,
    Type,
    TypeBody,
    Trigger,
    Sequence,
    Index,
}

impl ObjectType {
    pub const PRIMARY: [ObjectType; 12] = [
        ObjectType::Table,
        ObjectType::View,
        ObjectType::MaterializedView,
        ObjectType::Procedure,
        ObjectType::Function,
        ObjectType::Package,
        ObjectType::PackageBody,
        ObjectType::Synonym,
        ObjectType::Job,
        ObjectType::Schedule,
        ObjectType::Type,
        ObjectType::TypeBody,
    ];

    pub const ALL: [ObjectType; 15] = [
        ObjectType::Table,
        ObjectType::View,
        ObjectType::MaterializedView,
        ObjectType::Procedure,
        ObjectType::Function,
        ObjectType::Package,
        ObjectType::PackageBody,
        ObjectType::Synonym,
        ObjectType::Job,
        ObjectType::Schedule,
        ObjectType::Type,
        ObjectType::TypeBody,
        ObjectType::Trigger,
        ObjectType::Sequence,
        ObjectType::Index,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Table => "TABLE",
            ObjectType::View => "VIEW",
            ObjectType::MaterializedView => "MATERIALIZED VIEW",
            ObjectType::Procedure => "PROCEDURE",
            ObjectType::Function => "FUNCTION",
            ObjectType::Package => "PACKAGE",
            ObjectType::PackageBody => "PACKAGE BODY",
            ObjectType::Synonym => "SYNONYM",
            ObjectType::Job => "JOB",
            ObjectType::Schedule => "SCHEDULE",
            ObjectType::Type => "TYPE",
            ObjectType::TypeBody => "TYPE BODY",
            ObjectType::Trigger => "TRIGGER",
            ObjectType::Sequence => "SEQUENCE",
            ObjectType::Index => "INDEX",
        }
    }

    pub fn parse(s: &str) -> Option<ObjectType> {
        let normalized = s.trim().to_uppercase();
        ObjectType::ALL
            .iter()
            .find(|t| t.as_str() == normalized)
            .copied()
    }

    pub fn is_primary(&self) -> bool {
        ObjectType::PRIMARY.contains(self)
    }

    /// Privilege needed by a dependent object in another schema.
    pub fn grant_privilege(&self) -> &'static str {
        match self {
            ObjectType::Table
            | ObjectType::View
            | ObjectType::MaterializedView
            | ObjectType::Synonym
            | ObjectType::Sequence => "SELECT",
            _ => "EXECUTE",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_case() {
        let key = ObjectKey::new("hr", "employees");
        assert_eq!(key.to_string(), "HR.EMPLOYEES");
    }

    #[test]
    fn test_key_from_str() {
        let key: ObjectKey = "hr.emp".parse().unwrap();
        assert_eq!(key, ObjectKey::new("HR", "EMP"));

        assert!("no_dot".parse::<ObjectKey>().is_err());
        assert!(".name".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn test_type_parse_round_trip() {
        for t in ObjectType::ALL {
            assert_eq!(ObjectType::parse(t.as_str()), Some(t));
        }
        assert_eq!(
            ObjectType::parse("materialized view"),
            Some(ObjectType::MaterializedView)
        );
        assert_eq!(ObjectType::parse("LOB"), None);
    }

    #[test]
    fn test_grant_privilege() {
        assert_eq!(ObjectType::Table.grant_privilege(), "SELECT");
        assert_eq!(ObjectType::Sequence.grant_privilege(), "SELECT");
        assert_eq!(ObjectType::Procedure.grant_privilege(), "EXECUTE");
        assert_eq!(ObjectType::TypeBody.grant_privilege(), "EXECUTE");
    }
}
