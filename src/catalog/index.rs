#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub unique: bool,
    /// Column names in index position order.
    pub columns: Vec<String>,
}

impl IndexDef {
    /// Canonical de-duplicated column sequence used for matching.
    pub fn column_sequence(&self) -> Vec<String> {
        super::normalize_column_sequence(&self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_sequence_dedups_preserving_order() {
        let index = IndexDef {
            name: "IX_EMP".to_string(),
            unique: false,
            columns: vec!["dept".to_string(), "SAL".to_string(), "DEPT".to_string()],
        };
        assert_eq!(index.column_sequence(), vec!["DEPT", "SAL"]);
    }
}
