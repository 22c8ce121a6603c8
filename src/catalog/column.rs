/// Column metadata as reported by the dictionary views on either side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub char_length: Option<u32>,
    pub data_precision: Option<u32>,
    pub data_scale: Option<i32>,
    pub nullable: bool,
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn is_varchar(&self) -> bool {
        matches!(self.data_type.to_uppercase().as_str(), "VARCHAR" | "VARCHAR2")
    }

    /// Render the type for a synthesized ADD/MODIFY clause.
    pub fn type_clause(&self) -> String {
        let upper = self.data_type.to_uppercase();
        match upper.as_str() {
            "VARCHAR" | "VARCHAR2" | "CHAR" | "NVARCHAR2" | "NCHAR" | "RAW" => {
                match self.char_length {
                    Some(len) => format!("{}({})", upper, len),
                    None => upper,
                }
            }
            "NUMBER" => match (self.data_precision, self.data_scale) {
                (Some(p), Some(s)) if s != 0 => format!("NUMBER({},{})", p, s),
                (Some(p), _) => format!("NUMBER({})", p),
                _ => "NUMBER".to_string(),
            },
            _ => upper,
        }
    }
}
