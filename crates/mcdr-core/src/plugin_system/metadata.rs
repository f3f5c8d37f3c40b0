//! Plugin metadata, read from the JSON object a plugin's code reports.
//!
//! Nothing here is fatal. Missing or invalid fields fall back to defaults
//! with a warning so a sloppy plugin still loads.
use serde_json::Value;

use crate::logging::TARGET_PLUGIN;
use crate::plugin_system::version::{Version, VersionRequirement};
use crate::translation::Translator;

pub const FALLBACK_VERSION: &str = "0.0.0";
pub const MAX_ID_LENGTH: usize = 64;

/// Whether `id` is a usable plugin id: 1 to 64 characters of `[a-z0-9_]`
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[derive(Debug, Clone)]
pub struct PluginMetadata {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub author: Vec<String>,
    pub link: Option<String>,
    pub version: Version,
    pub dependencies: Vec<(String, VersionRequirement)>,
}

impl PluginMetadata {
    /// Build metadata from the raw object, using `fallback_id` (the file
    /// name without the plugin suffix) when the id is missing or invalid.
    pub fn from_value(data: Option<&Value>, fallback_id: &str, tr: &dyn Translator) -> Self {
        let empty = serde_json::Map::new();
        let data = match data {
            Some(Value::Object(map)) => map,
            Some(_) => {
                log::warn!(target: TARGET_PLUGIN, "Metadata of {} is not an object, ignored", fallback_id);
                &empty
            }
            None => &empty,
        };
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        let id = match text("id") {
            Some(id) if is_valid_id(&id) => id,
            Some(id) => {
                log::warn!(target: TARGET_PLUGIN, "{}", tr.tr("metadata.id_invalid", &[&id, &fallback_id, &fallback_id]));
                fallback_id.to_string()
            }
            None => {
                log::warn!(target: TARGET_PLUGIN, "{}", tr.tr("metadata.id_missing", &[&fallback_id, &fallback_id]));
                fallback_id.to_string()
            }
        };

        let version = match text("version") {
            Some(raw) => match Version::parse(&raw, false) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!(
                        target: TARGET_PLUGIN,
                        "{}",
                        tr.tr("metadata.version_invalid", &[&raw, &id, &e, &FALLBACK_VERSION])
                    );
                    Version::new(0, 0, 0)
                }
            },
            None => {
                log::warn!(target: TARGET_PLUGIN, "{}", tr.tr("metadata.version_missing", &[&id, &FALLBACK_VERSION]));
                Version::new(0, 0, 0)
            }
        };

        let author = match data.get("author") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            _ => Vec::new(),
        };

        let mut dependencies = Vec::new();
        if let Some(Value::Object(deps)) = data.get("dependencies") {
            for (dep_id, raw) in deps {
                let parsed = raw
                    .as_str()
                    .ok_or_else(|| "requirement is not a string".to_string())
                    .and_then(|s| VersionRequirement::parse(s).map_err(|e| e.to_string()));
                match parsed {
                    Ok(req) => dependencies.push((dep_id.clone(), req)),
                    Err(e) => log::warn!(
                        target: TARGET_PLUGIN,
                        "{}",
                        tr.tr("metadata.dependency_invalid", &[dep_id, raw, &id, &e])
                    ),
                }
            }
        }

        Self {
            name: text("name").unwrap_or_else(|| id.clone()),
            description: text("description"),
            link: text("link"),
            id,
            author,
            version,
            dependencies,
        }
    }

    pub fn dependency(&self, plugin_id: &str) -> Option<&VersionRequirement> {
        self.dependencies.iter().find(|(id, _)| id == plugin_id).map(|(_, req)| req)
    }
}
