// ⚙️ Configuration - which price lists to read and which JSON files to write
// Loaded from TOML; relative paths resolve against the config file's directory

use crate::offer::Grade;
use crate::output::METADATA_KEYS;
use crate::parser::{
    detect_source, BPlusPolicy, DeviceFamily, GradeColumns, ParserOptions, SourceKind,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,

    #[serde(rename = "output", default)]
    pub outputs: Vec<OutputConfig>,

    #[serde(default)]
    pub summary: SummaryConfig,
}

/// One vendor file
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Vendor tag written into offers ("SA", "KT iPhone", ...)
    pub name: String,

    /// Detected from the file name when omitted
    #[serde(default)]
    pub kind: Option<SourceKind>,

    pub path: PathBuf,

    #[serde(default)]
    pub family: DeviceFamily,

    /// Workbook sheet title (KT Excel only)
    #[serde(default)]
    pub sheet: Option<String>,

    /// Sell Atlas only
    #[serde(default)]
    pub b_plus: BPlusPolicy,

    /// Column index (as a string key) -> grade; replaces the vendor default
    #[serde(default)]
    pub grade_columns: BTreeMap<String, Grade>,
}

impl SourceConfig {
    pub fn kind(&self) -> Result<SourceKind> {
        match self.kind {
            Some(kind) => Ok(kind),
            None => detect_source(&self.path)
                .with_context(|| format!("Source '{}' has no kind", self.name)),
        }
    }

    pub fn grade_columns(&self) -> Result<Option<GradeColumns>> {
        if self.grade_columns.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::new();
        for (idx, grade) in &self.grade_columns {
            let idx: usize = idx.trim().parse().with_context(|| {
                format!("Source '{}': invalid column index '{}'", self.name, idx)
            })?;
            columns.push((idx, *grade));
        }

        Ok(Some(GradeColumns::new(columns)))
    }

    pub fn parser_options(&self) -> Result<ParserOptions> {
        Ok(ParserOptions {
            family: self.family,
            columns: self.grade_columns()?,
            sheet: self.sheet.clone(),
            b_plus: self.b_plus,
        })
    }
}

/// One JSON file built from a subset of the sources
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Source names merged into this file; empty means all of them
    #[serde(default)]
    pub sources: Vec<String>,

    /// Write last_updated + sources
    #[serde(default = "default_true")]
    pub metadata: bool,

    /// Keep per-vendor quotes on each device
    #[serde(default = "default_true")]
    pub vendor_breakdown: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "default_top_models")]
    pub top_models: usize,

    #[serde(default = "default_samples")]
    pub samples: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        SummaryConfig {
            top_models: default_top_models(),
            samples: default_samples(),
        }
    }
}

fn default_collection() -> String {
    "devices".to_string()
}

fn default_true() -> bool {
    true
}

fn default_top_models() -> usize {
    15
}

fn default_samples() -> usize {
    5
}

impl Config {
    /// Load, resolve relative paths against the file's directory, validate
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }

        Ok(config)
    }

    /// Parse and validate a TOML string; paths are kept as written
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("Config declares no [[source]] entries");
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                anyhow::bail!("Source with path {} has an empty name", source.path.display());
            }
            if !names.insert(source.name.as_str()) {
                anyhow::bail!("Duplicate source name: {}", source.name);
            }
            source.kind()?;
            source.grade_columns()?;
        }

        for output in &self.outputs {
            if output.collection.trim().is_empty() {
                anyhow::bail!("Output {} has an empty collection key", output.path.display());
            }
            if METADATA_KEYS.contains(&output.collection.as_str()) {
                anyhow::bail!(
                    "Output {}: collection '{}' is a reserved metadata key",
                    output.path.display(),
                    output.collection
                );
            }
            for name in &output.sources {
                if !names.contains(name.as_str()) {
                    anyhow::bail!(
                        "Output {} refers to unknown source '{}'",
                        output.path.display(),
                        name
                    );
                }
            }
        }

        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for source in &mut self.sources {
            if source.path.is_relative() {
                source.path = base.join(&source.path);
            }
        }
        for output in &mut self.outputs {
            if output.path.is_relative() {
                output.path = base.join(&output.path);
            }
        }
    }

    /// Sources feeding an output, in declaration order
    pub fn sources_for<'a>(&'a self, output: &'a OutputConfig) -> Vec<&'a SourceConfig> {
        self.sources
            .iter()
            .filter(|s| output.sources.is_empty() || output.sources.contains(&s.name))
            .collect()
    }
}
