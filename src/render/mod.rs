use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::ObjectKey;

static USING_INDEX_WITH_OPTIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)USING\s+INDEX\s*\((?:[^)(]+|\((?:[^)(]+|\([^)(]*\))*\))*\)\s*(ENABLE|DISABLE)")
        .unwrap()
});
static USING_INDEX_SIMPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)USING\s+INDEX\s+(ENABLE|DISABLE)").unwrap());
static ENABLE_VALIDATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+ENABLE\s+VALIDATE").unwrap());
static TRAILING_ENABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+ENABLE(\s*;)").unwrap());
static ENABLE_NOVALIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*\bENABLE\s+NOVALIDATE\b").unwrap());
static DELIMITER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*DELIMITER\b").unwrap());
static BLOCK_END_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\$\$\s*;?\s*$").unwrap());

/// Rewrite every `SRC_SCHEMA.SRC_NAME` reference to its target spelling, both
/// the quoted form the metadata exporter emits and bare word-boundary matches.
/// The full mapping is passed so DDL referencing other remapped objects (a
/// view over a renamed table, say) is corrected in the same pass.
pub fn rewrite_identifiers(ddl: &str, replacements: &[(ObjectKey, ObjectKey)]) -> String {
    let mut result = ddl.to_string();
    for (src, tgt) in replacements {
        if src == tgt {
            continue;
        }
        let quoted = Regex::new(&format!(
            r#"(?i)"{}"\."{}""#,
            regex::escape(&src.schema),
            regex::escape(&src.name)
        ))
        .expect("escaped identifier pattern");
        // NoExpand: identifiers may legitimately contain `$`
        result = quoted
            .replace_all(
                &result,
                regex::NoExpand(&format!(r#""{}"."{}""#, tgt.schema, tgt.name)),
            )
            .into_owned();

        let unquoted = Regex::new(&format!(
            r"(?i)\b{}\.{}\b",
            regex::escape(&src.schema),
            regex::escape(&src.name)
        ))
        .expect("escaped identifier pattern");
        result = unquoted
            .replace_all(
                &result,
                regex::NoExpand(&format!("{}.{}", tgt.schema, tgt.name)),
            )
            .into_owned();
    }
    result
}

/// The converter wraps PL/SQL in DELIMITER/$$ markers the target dialect does
/// not accept. Drop the DELIMITER lines and turn each block terminator into
/// the client's `/`.
pub fn cleanup_converter_wrappers(ddl: &str) -> String {
    ddl.lines()
        .filter(|line| !DELIMITER_LINE.is_match(line))
        .map(|line| if BLOCK_END_LINE.is_match(line) { "/" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prefix the script with a CURRENT_SCHEMA switch so unqualified identifiers
/// resolve in the right schema, unless one is already present near the top.
pub fn prepend_set_schema(ddl: &str, schema: &str) -> String {
    let head: String = ddl
        .lines()
        .take(3)
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();
    if head.contains("set current_schema") {
        return ddl.to_string();
    }
    format!(
        "ALTER SESSION SET CURRENT_SCHEMA = {};\n{}",
        schema.to_uppercase(),
        ddl
    )
}

/// Strip `USING INDEX ...` storage clauses the target rejects, keeping the
/// trailing ENABLE/DISABLE keyword they swallow.
pub fn strip_using_index(ddl: &str) -> String {
    let ddl = USING_INDEX_WITH_OPTIONS.replace_all(ddl, "$1");
    USING_INDEX_SIMPLE.replace_all(&ddl, "$1").into_owned()
}

/// `ENABLE VALIDATE` becomes plain `VALIDATE`; a bare trailing `ENABLE`
/// before the statement terminator is dropped entirely.
pub fn strip_constraint_enable(ddl: &str) -> String {
    let ddl = ENABLE_VALIDATE.replace_all(ddl, " VALIDATE");
    TRAILING_ENABLE.replace_all(&ddl, "$1").into_owned()
}

/// Remove inline `ENABLE NOVALIDATE` pairs from CREATE TABLE output.
pub fn strip_enable_novalidate(ddl: &str) -> String {
    ddl.lines()
        .map(|line| ENABLE_NOVALIDATE.replace_all(line, "").trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a script on `;`, keeping the terminator with each statement. The
/// final unterminated fragment, if any, is returned as-is.
pub fn split_statements(ddl: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    for ch in ddl.chars() {
        current.push(ch);
        if ch == ';' {
            let stmt = current.trim();
            if !stmt.is_empty() {
                statements.push(stmt.to_string());
            }
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

/// Pull out of a script the statements that satisfy `predicate` and mention
/// one of `names`, either quoted or as a whole word. Used to lift individual
/// CREATE INDEX / ADD CONSTRAINT statements from a full table export.
pub fn extract_statements_for_names<F>(
    ddl: &str,
    names: &BTreeSet<String>,
    predicate: F,
) -> BTreeMap<String, Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut result: BTreeMap<String, Vec<String>> =
        names.iter().map(|n| (n.to_uppercase(), Vec::new())).collect();
    if ddl.is_empty() {
        return result;
    }

    for stmt in split_statements(ddl) {
        let stmt_upper = stmt.to_uppercase();
        if !predicate(&stmt_upper) {
            continue;
        }
        for name in names {
            let name_upper = name.to_uppercase();
            let quoted = format!("\"{}\"", name_upper);
            let word = Regex::new(&format!(r"\b{}\b", regex::escape(&name_upper)))
                .expect("escaped name pattern");
            if stmt_upper.contains(&quoted) || word.is_match(&stmt_upper) {
                result.entry(name_upper).or_default().push(stmt.clone());
            }
        }
    }
    result
}
