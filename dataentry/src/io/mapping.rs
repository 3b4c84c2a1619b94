//! Mapping document loading (YAML or TOML, chosen by extension).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::rules::{Mapping, RawMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MappingFormat {
    Yaml,
    Toml,
}

impl MappingFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => MappingFormat::Toml,
            _ => MappingFormat::Yaml,
        }
    }
}

/// Load and validate the mapping at `path`.
///
/// Shape errors and rule errors both fail here, before any row is touched.
pub fn load_mapping(path: &Path) -> Result<Mapping> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read mapping {}", path.display()))?;
    let mapping = parse_mapping(&contents, MappingFormat::for_path(path))
        .with_context(|| format!("load mapping {}", path.display()))?;
    for (column, kind) in mapping.unknown_validators() {
        warn!(column, kind, "ignoring validator with unknown type");
    }
    debug!(
        path = %path.display(),
        fields = mapping.fields.len(),
        browser = mapping.browser.label(),
        "mapping loaded"
    );
    Ok(mapping)
}

fn parse_mapping(contents: &str, format: MappingFormat) -> Result<Mapping> {
    let raw: RawMapping = match format {
        MappingFormat::Yaml => serde_yaml::from_str(contents).context("parse yaml")?,
        MappingFormat::Toml => toml::from_str(contents).context("parse toml")?,
    };
    Ok(Mapping::from_raw(raw)?)
}
