use crate::catalog::{CatalogSnapshot, ObjectKey, ObjectType};
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// Remap rules loaded from a `SRC.OBJ=TGT.OBJ` file. Keys stay as raw
/// upper-cased strings because a PACKAGE BODY rule may carry a ` BODY`
/// suffix that is not part of the object name.
#[derive(Debug, Clone, Default)]
pub struct RemapRules {
    rules: BTreeMap<String, String>,
}

impl RemapRules {
    pub fn load(path: &str) -> RemapRules {
        info!("Loading remap rules from {}", path);
        if !Path::new(path).exists() {
            warn!("Remap file {} not found, continuing with 1:1 mapping", path);
            return RemapRules::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => RemapRules::from_lines(contents.lines()),
            Err(e) => {
                warn!("Failed to read remap file {}: {}, continuing with 1:1 mapping", path, e);
                RemapRules::default()
            }
        }
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> RemapRules {
        let mut rules = BTreeMap::new();
        for (i, raw) in lines.into_iter().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((src, tgt)) = line.split_once('=') else {
                warn!("Skipping malformed remap rule on line {}: {}", i + 1, line);
                continue;
            };
            let src = src.trim().to_uppercase();
            let tgt = tgt.trim().to_uppercase();
            if src.is_empty() || tgt.is_empty() || !src.contains('.') || !tgt.contains('.') {
                warn!(
                    "Skipping remap rule on line {} (both sides must be SCHEMA.OBJ): {}",
                    i + 1,
                    line
                );
                continue;
            }
            rules.insert(src, tgt);
        }
        info!("Loaded {} remap rules", rules.len());
        RemapRules { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose source object does not exist in the snapshot. `NAME BODY`
    /// aliases for existing PACKAGE BODY objects are accepted.
    pub fn extraneous_rules(&self, source: &CatalogSnapshot) -> Vec<String> {
        let mut known: BTreeSet<String> = BTreeSet::new();
        for (object_type, keys) in &source.objects {
            for key in keys {
                known.insert(key.to_string());
                if *object_type == ObjectType::PackageBody {
                    known.insert(format!("{} BODY", key));
                }
            }
        }

        let extraneous: Vec<String> = self
            .rules
            .keys()
            .filter(|k| !known.contains(*k))
            .cloned()
            .collect();
        for key in &extraneous {
            warn!("Remap rule references unknown source object: {}", key);
        }
        extraneous
    }

    /// Resolve the remapped target for a source object, or None when no rule
    /// applies. PACKAGE BODY consults the `NAME BODY` alias first and strips
    /// the suffix from the target.
    pub fn resolve(&self, src: &ObjectKey, object_type: ObjectType) -> Option<ObjectKey> {
        let plain = src.to_string();
        let mut candidates = Vec::with_capacity(2);
        if object_type == ObjectType::PackageBody {
            candidates.push(format!("{} BODY", plain));
        }
        candidates.push(plain);

        for key in candidates {
            if let Some(tgt) = self.rules.get(&key) {
                let (schema, name) = tgt.split_once('.')?;
                let name = if object_type == ObjectType::PackageBody {
                    strip_body_suffix(name)
                } else {
                    name
                };
                return Some(ObjectKey::new(schema, name));
            }
        }
        None
    }
}

fn strip_body_suffix(name: &str) -> &str {
    let trimmed = name.trim_end();
    if trimmed.to_uppercase().ends_with(" BODY") {
        trimmed[..trimmed.len() - 5].trim_end()
    } else {
        trimmed
    }
}

/// Source object to target object, per tracked kind. The same source name can
/// map differently per kind, so the key is composite.
#[derive(Debug, Clone, Default)]
pub struct ObjectMapping {
    map: BTreeMap<ObjectKey, BTreeMap<ObjectType, ObjectKey>>,
}

impl ObjectMapping {
    pub fn build(source: &CatalogSnapshot, rules: &RemapRules) -> ObjectMapping {
        let mut map: BTreeMap<ObjectKey, BTreeMap<ObjectType, ObjectKey>> = BTreeMap::new();
        for (object_type, keys) in &source.objects {
            for key in keys {
                let target = rules.resolve(key, *object_type).unwrap_or_else(|| key.clone());
                map.entry(key.clone()).or_default().insert(*object_type, target);
            }
        }
        ObjectMapping { map }
    }

    pub fn target_for(&self, src: &ObjectKey, object_type: ObjectType) -> Option<&ObjectKey> {
        self.map.get(src).and_then(|by_type| by_type.get(&object_type))
    }

    /// Insert an identity-or-explicit entry discovered after the build, such
    /// as a trigger name seen only in the dictionary dump.
    pub fn ensure_entry(&mut self, src: &ObjectKey, object_type: ObjectType, target: ObjectKey) {
        self.map
            .entry(src.clone())
            .or_default()
            .insert(object_type, target);
    }

    pub fn source_for_target(&self, target: &ObjectKey, object_type: ObjectType) -> Option<&ObjectKey> {
        self.map
            .iter()
            .find(|(_, by_type)| by_type.get(&object_type) == Some(target))
            .map(|(src, _)| src)
    }

    /// Every distinct rename in the mapping, for DDL identifier rewriting.
    /// Identity entries carry no rewrite and are omitted.
    pub fn replacement_pairs(&self) -> Vec<(ObjectKey, ObjectKey)> {
        let mut seen: BTreeSet<(ObjectKey, ObjectKey)> = BTreeSet::new();
        for (src, by_type) in &self.map {
            for tgt in by_type.values() {
                if src != tgt {
                    seen.insert((src.clone(), tgt.clone()));
                }
            }
        }
        seen.into_iter().collect()
    }

    /// All schemas any source object maps into.
    pub fn target_schemas(&self) -> BTreeSet<String> {
        self.map
            .values()
            .flat_map(|by_type| by_type.values())
            .map(|key| key.schema.clone())
            .collect()
    }
}

/// One row of the master check list: a primary source object, where it should
/// be on the target, and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub source: ObjectKey,
    pub target: ObjectKey,
    pub object_type: ObjectType,
}

/// Build the primary-object check list, failing on any many-to-one mapping.
/// Two sources landing on the same (target, kind) would make every later
/// comparison ambiguous, so nothing is generated past this point.
pub fn master_check_list(source: &CatalogSnapshot, rules: &RemapRules) -> Result<Vec<CheckItem>> {
    info!("Building master check list");
    let mut items = Vec::new();
    let mut target_tracker: BTreeMap<(ObjectKey, ObjectType), ObjectKey> = BTreeMap::new();

    for (object_type, keys) in &source.objects {
        if !object_type.is_primary() {
            continue;
        }
        for key in keys {
            let target = rules.resolve(key, *object_type).unwrap_or_else(|| key.clone());
            let tracker_key = (target.clone(), *object_type);
            if let Some(existing) = target_tracker.get(&tracker_key) {
                bail!(
                    "many-to-one mapping: target {} ({}) is claimed by both {} and {}; \
                     fix the remap rules so every target has a single source",
                    target,
                    object_type,
                    existing,
                    key
                );
            }
            target_tracker.insert(tracker_key, key.clone());
            items.push(CheckItem {
                source: key.clone(),
                target,
                object_type: *object_type,
            });
        }
    }

    info!("Master check list has {} entries", items.len());
    Ok(items)
}

/// Schema-level mapping derived from TABLE entries: a source schema whose
/// tables all land in one target schema maps there, anything else falls back
/// to identity.
pub fn build_schema_mapping(master_list: &[CheckItem]) -> BTreeMap<String, String> {
    let mut candidates: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for item in master_list {
        if item.object_type != ObjectType::Table {
            continue;
        }
        candidates
            .entry(item.source.schema.clone())
            .or_default()
            .insert(item.target.schema.clone());
    }

    candidates
        .into_iter()
        .map(|(src, targets)| {
            let resolved = if targets.len() == 1 {
                targets.into_iter().next().unwrap()
            } else {
                src.clone()
            };
            (src, resolved)
        })
        .collect()
}
