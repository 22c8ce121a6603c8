use super::id::ObjectKey;

/// Constraint kinds the comparator reconciles. Check constraints are left to
/// the converted DDL and not bucketed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintKind {
    Primary,
    Unique,
    Foreign,
}

impl ConstraintKind {
    pub fn from_code(code: &str) -> Option<ConstraintKind> {
        match code.trim() {
            "P" => Some(ConstraintKind::Primary),
            "U" => Some(ConstraintKind::Unique),
            "R" => Some(ConstraintKind::Foreign),
            _ => None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ConstraintKind::Primary => "PRIMARY KEY",
            ConstraintKind::Unique => "UNIQUE",
            ConstraintKind::Foreign => "FOREIGN KEY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDef {
    pub name: String,
    pub kind: ConstraintKind,
    /// Column names in constraint position order.
    pub columns: Vec<String>,
    /// For foreign keys: the referenced constraint and its owner schema.
    pub ref_owner: Option<String>,
    pub ref_constraint: Option<String>,
    /// Resolved from ref_constraint against the owning table, when available.
    pub ref_table: Option<ObjectKey>,
}

impl ConstraintDef {
    pub fn column_sequence(&self) -> Vec<String> {
        super::normalize_column_sequence(&self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_code() {
        assert_eq!(ConstraintKind::from_code("P"), Some(ConstraintKind::Primary));
        assert_eq!(ConstraintKind::from_code("U"), Some(ConstraintKind::Unique));
        assert_eq!(ConstraintKind::from_code("R"), Some(ConstraintKind::Foreign));
        assert_eq!(ConstraintKind::from_code("C"), None);
    }
}
