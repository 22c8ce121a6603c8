use anyhow::{Context, Result, bail};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{info, warn};

use super::run_with_timeout;
use crate::catalog::ObjectType;
use crate::config::{DdlConverter, Endpoint};

/// Produces target-dialect DDL for one source object, or None when the
/// converter cannot supply it. Implementations may cache aggressively; the
/// synthesizer calls this once per object it needs to recreate.
pub trait DdlFetcher {
    fn fetch(&mut self, schema: &str, object_type: ObjectType, name: &str)
    -> Result<Option<String>>;
}

fn converter_option(object_type: ObjectType) -> Option<&'static str> {
    match object_type {
        ObjectType::Table => Some("--table"),
        ObjectType::View => Some("--view"),
        ObjectType::MaterializedView => Some("--mview"),
        ObjectType::Procedure => Some("--procedure"),
        ObjectType::Function => Some("--function"),
        ObjectType::Package => Some("--package"),
        ObjectType::PackageBody => Some("--package-body"),
        ObjectType::Synonym => Some("--synonym"),
        ObjectType::Sequence => Some("--sequence"),
        ObjectType::Trigger => Some("--trigger"),
        ObjectType::Type => Some("--type"),
        ObjectType::TypeBody => Some("--type-body"),
        ObjectType::Job | ObjectType::Schedule | ObjectType::Index => None,
    }
}

/// Directory names a converter run may place each kind under.
fn dir_hints(object_type: ObjectType) -> &'static [&'static str] {
    match object_type {
        ObjectType::Table => &["TABLE"],
        ObjectType::View => &["VIEW"],
        ObjectType::MaterializedView => &["MVIEW", "MATERIALIZED VIEW"],
        ObjectType::Procedure => &["PROCEDURE"],
        ObjectType::Function => &["FUNCTION"],
        ObjectType::Package => &["PACKAGE"],
        ObjectType::PackageBody => &["PACKAGE BODY", "PACKAGE_BODY"],
        ObjectType::Synonym => &["SYNONYM"],
        ObjectType::Sequence => &["SEQUENCE"],
        ObjectType::Trigger => &["TRIGGER"],
        ObjectType::Type => &["TYPE"],
        ObjectType::TypeBody => &["TYPE BODY", "TYPE_BODY"],
        ObjectType::Job | ObjectType::Schedule | ObjectType::Index => &[],
    }
}

/// A converter run nests its output either directly, under `<SCHEMA>/`, or
/// under a `<SCHEMA>_<timestamp>/` child.
fn locate_schema_dir(run_dir: &Path, schema: &str) -> Option<PathBuf> {
    let prefix = format!("{}_", schema.to_uppercase());
    let dir_matches = |path: &Path| {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.to_uppercase().starts_with(&prefix))
    };

    if dir_matches(run_dir) {
        return Some(run_dir.to_path_buf());
    }
    let direct = run_dir.join(schema);
    if direct.exists() {
        return Some(direct);
    }
    for entry in fs::read_dir(run_dir).ok()?.flatten() {
        let child = entry.path();
        if !child.is_dir() {
            continue;
        }
        if dir_matches(&child) {
            return Some(child);
        }
        let candidate = child.join(schema);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn walk_for_file(dir: &Path, file_name: &str, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk_for_file(&path, file_name, found);
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            found.push(path);
        }
    }
}

/// The converter writes one `<NAME>-schema.sql` per object. Prefer matches
/// under the kind's directory hint; an unhinted match is accepted only when
/// the kind has no hints at all.
fn find_object_file(schema_dir: &Path, object_type: ObjectType, name: &str) -> Option<PathBuf> {
    let file_name = format!("{}-schema.sql", name.to_uppercase());
    let hints = dir_hints(object_type);
    for hint in hints {
        let candidate = schema_dir.join(hint).join(&file_name);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let mut matches = Vec::new();
    walk_for_file(schema_dir, &file_name, &mut matches);
    if hints.is_empty() {
        return matches.into_iter().next();
    }
    matches.into_iter().find(|candidate| {
        candidate.ancestors().any(|parent| {
            parent
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| hints.iter().any(|h| h.eq_ignore_ascii_case(n)))
        })
    })
}

/// Shells out to the external conversion tool, one run per requested object,
/// writing each run into a fresh timestamped directory under the cache dir.
/// Prior runs are scanned first so repeated invocations of the tool never
/// re-export an object already on disk.
pub struct CliDdlFetcher {
    converter: DdlConverter,
    source: Endpoint,
    timeout: Duration,
    attempted: BTreeSet<(String, ObjectType, String)>,
}

impl CliDdlFetcher {
    pub fn new(converter: DdlConverter, source: Endpoint, timeout: Duration) -> CliDdlFetcher {
        CliDdlFetcher {
            converter,
            source,
            timeout,
            attempted: BTreeSet::new(),
        }
    }

    fn cache_dir(&self) -> &Path {
        Path::new(&self.converter.cache_dir)
    }

    /// Newest-first scan of prior run directories.
    fn find_cached(&self, schema: &str, object_type: ObjectType, name: &str) -> Option<PathBuf> {
        let mut run_dirs: Vec<PathBuf> = fs::read_dir(self.cache_dir())
            .ok()?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        run_dirs.sort();
        run_dirs
            .into_iter()
            .rev()
            .filter_map(|run_dir| locate_schema_dir(&run_dir, schema))
            .find_map(|schema_dir| find_object_file(&schema_dir, object_type, name))
    }

    fn convert(&self, schema: &str, object_type: ObjectType, name: &str) -> Result<PathBuf> {
        let Some(bin) = &self.converter.bin else {
            bail!("no DDL converter binary configured");
        };
        let Some(option) = converter_option(object_type) else {
            bail!("object kind {} has no converter option", object_type);
        };

        let run_dir = self.cache_dir().join(format!(
            "{}_{}_{}",
            schema,
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            &uuid::Uuid::new_v4().simple().to_string()[..6]
        ));
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("creating converter run dir {}", run_dir.display()))?;

        let mut command = Command::new(bin);
        command
            .arg("convert")
            .arg("-H")
            .arg(&self.source.host)
            .arg("-P")
            .arg(self.source.port.to_string())
            .arg("-u")
            .arg(&self.source.user)
            .arg("-p")
            .arg(&self.source.password)
            .arg("-D")
            .arg(schema);
        if let Some(from) = &self.converter.from {
            command.arg("--from").arg(from);
        }
        if let Some(to) = &self.converter.to {
            command.arg("--to").arg(to);
        }
        command
            .arg("--file-per-object")
            .arg("-f")
            .arg(&run_dir)
            .arg(option)
            .arg(name);

        info!("converting DDL for {}.{} ({})", schema, name, object_type);
        let (status, stdout, stderr) =
            run_with_timeout(command, self.timeout, &format!("DDL converter {bin}"))?;
        if !status.success() {
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            bail!("DDL converter failed for {}.{}: {}", schema, name, detail.trim());
        }
        Ok(run_dir)
    }
}

impl DdlFetcher for CliDdlFetcher {
    fn fetch(
        &mut self,
        schema: &str,
        object_type: ObjectType,
        name: &str,
    ) -> Result<Option<String>> {
        let schema = schema.to_uppercase();
        let name = name.to_uppercase();

        if let Some(path) = self.find_cached(&schema, object_type, &name) {
            let ddl = fs::read_to_string(&path)
                .with_context(|| format!("reading cached DDL {}", path.display()))?;
            return Ok(Some(ddl));
        }

        if self.converter.bin.is_none() {
            warn!(
                "no DDL converter configured, cannot produce DDL for {}.{} ({})",
                schema, name, object_type
            );
            return Ok(None);
        }
        if converter_option(object_type).is_none() {
            warn!("no converter support for {} {}.{}", object_type, schema, name);
            return Ok(None);
        }

        // One conversion attempt per object; a converter that cannot emit it
        // the first time will not emit it on retry either.
        let attempt_key = (schema.clone(), object_type, name.clone());
        if self.attempted.contains(&attempt_key) {
            return Ok(None);
        }
        self.attempted.insert(attempt_key);

        let run_dir = self.convert(&schema, object_type, &name)?;
        let Some(schema_dir) = locate_schema_dir(&run_dir, &schema) else {
            warn!(
                "converter run {} produced no directory for schema {}",
                run_dir.display(),
                schema
            );
            return Ok(None);
        };
        match find_object_file(&schema_dir, object_type, &name) {
            Some(path) => {
                let ddl = fs::read_to_string(&path)
                    .with_context(|| format!("reading converted DDL {}", path.display()))?;
                Ok(Some(ddl))
            }
            None => {
                warn!("converter emitted no file for {}.{} ({})", schema, name, object_type);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_find_object_file_prefers_hinted_directory() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("TABLE/EMP-schema.sql"), "CREATE TABLE ...");
        write(&dir.path().join("VIEW/EMP-schema.sql"), "CREATE VIEW ...");

        let path = find_object_file(dir.path(), ObjectType::Table, "emp").unwrap();
        assert!(path.ends_with("TABLE/EMP-schema.sql"));
    }

    #[test]
    fn test_find_object_file_accepts_alternate_hint_spelling() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("nested/PACKAGE_BODY/PKG-schema.sql"),
            "CREATE PACKAGE BODY ...",
        );
        let path = find_object_file(dir.path(), ObjectType::PackageBody, "PKG").unwrap();
        assert!(path.ends_with("PACKAGE_BODY/PKG-schema.sql"));
    }

    #[test]
    fn test_locate_schema_dir_variants() {
        let base = tempfile::tempdir().unwrap();

        let prefixed = base.path().join("HR_20260830_abc123");
        fs::create_dir_all(&prefixed).unwrap();
        assert_eq!(locate_schema_dir(&prefixed, "HR"), Some(prefixed.clone()));

        let nested = base.path().join("run2");
        fs::create_dir_all(nested.join("HR")).unwrap();
        assert_eq!(locate_schema_dir(&nested, "HR"), Some(nested.join("HR")));

        assert_eq!(locate_schema_dir(&base.path().join("absent"), "HR"), None);
    }

    #[test]
    fn test_fetch_serves_from_cache_without_converter() {
        let cache = tempfile::tempdir().unwrap();
        write(
            &cache.path().join("HR_20260829_ffffff/HR/TABLE/EMP-schema.sql"),
            "CREATE TABLE \"HR\".\"EMP\" (ID NUMBER);",
        );

        let converter = DdlConverter {
            bin: None,
            from: None,
            to: None,
            cache_dir: cache.path().to_str().unwrap().to_string(),
        };
        let mut fetcher =
            CliDdlFetcher::new(converter, Endpoint::default(), Duration::from_secs(1));

        let ddl = fetcher.fetch("hr", ObjectType::Table, "emp").unwrap();
        assert!(ddl.unwrap().contains("CREATE TABLE"));
        // absent object without a converter binary degrades to None
        assert!(fetcher.fetch("HR", ObjectType::Table, "DEPT").unwrap().is_none());
    }
}
