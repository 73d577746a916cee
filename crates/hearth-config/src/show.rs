//! Resolved configuration display.

use std::fmt::Write as _;

use crate::merge::FieldSources;
use crate::types::Config;

/// The merged configuration plus provenance.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Which layer supplied each dotted field path.
    pub field_sources: FieldSources,
    /// Config files that were found and merged, in load order.
    pub loaded_files: Vec<String>,
}

impl ResolvedConfig {
    /// Render the configuration as TOML.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(&self.config).unwrap_or_default()
    }

    /// Render one `path = value  # source` line per leaf field.
    #[must_use]
    pub fn annotated(&self) -> String {
        let mut out = String::new();
        let Ok(tree) = toml::Value::try_from(&self.config) else {
            return out;
        };
        let mut leaves = Vec::new();
        flatten(&tree, "", &mut leaves);
        for (path, value) in leaves {
            let source = self
                .field_sources
                .get(&path)
                .map_or_else(|| "defaults".to_owned(), ToString::to_string);
            let _ = writeln!(out, "{path} = {value}  # {source}");
        }
        out
    }
}

fn flatten(val: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    if let toml::Value::Table(table) = val {
        for (key, child) in table {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            flatten(child, &path, out);
        }
    } else {
        out.push((prefix.to_owned(), val.to_string()));
    }
}
