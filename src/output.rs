// 💾 Output Document - merged devices as JSON
// { "last_updated": ..., "sources": [...], "<collection>": [...] }

use crate::offer::MergedDevice;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Top-level keys written next to the collection array
pub const METADATA_KEYS: [&str; 2] = ["last_updated", "sources"];

#[derive(Debug, Clone, PartialEq)]
pub struct PricingDocument {
    /// Array key: "devices", "iphones", "androids"
    pub collection: String,
    pub devices: Vec<MergedDevice>,

    // Metadata, written only when present
    pub last_updated: Option<DateTime<Utc>>,
    pub sources: Vec<String>,
}

impl PricingDocument {
    pub fn new(collection: impl Into<String>, devices: Vec<MergedDevice>) -> Self {
        PricingDocument {
            collection: collection.into(),
            devices,
            last_updated: None,
            sources: Vec::new(),
        }
    }

    /// Builder pattern: stamp with run time and contributing vendors
    pub fn with_metadata(mut self, last_updated: DateTime<Utc>, sources: Vec<String>) -> Self {
        self.last_updated = Some(last_updated);
        self.sources = sources;
        self
    }

    pub fn to_json(&self) -> Result<Value> {
        let mut root = Map::new();

        if let Some(ts) = &self.last_updated {
            root.insert("last_updated".to_string(), Value::String(ts.to_rfc3339()));
        }
        if !self.sources.is_empty() {
            root.insert("sources".to_string(), serde_json::to_value(&self.sources)?);
        }

        let devices = serde_json::to_value(&self.devices)
            .context("Failed to serialize merged devices")?;
        root.insert(self.collection.clone(), devices);

        Ok(Value::Object(root))
    }

    pub fn from_json(value: Value, collection: &str) -> Result<Self> {
        let mut root = match value {
            Value::Object(map) => map,
            _ => anyhow::bail!("Pricing document must be a JSON object"),
        };

        let devices = root
            .remove(collection)
            .ok_or_else(|| anyhow::anyhow!("JSON missing '{}' array", collection))?;
        let devices: Vec<MergedDevice> = serde_json::from_value(devices)
            .with_context(|| format!("Failed to decode '{}' entries", collection))?;

        let last_updated = match root.get("last_updated").and_then(|v| v.as_str()) {
            Some(ts) => Some(
                DateTime::parse_from_rfc3339(ts)
                    .with_context(|| format!("Invalid last_updated timestamp: {}", ts))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        let sources = match root.remove("sources") {
            Some(v) => serde_json::from_value(v).context("Invalid 'sources' list")?,
            None => Vec::new(),
        };

        Ok(PricingDocument {
            collection: collection.to_string(),
            devices,
            last_updated,
            sources,
        })
    }

    /// Pretty-print to `path`, replacing any previous file
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, &self.to_json()?)
            .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        Ok(())
    }
}

/// Read a document written by [`PricingDocument::write`]
pub fn read_document(path: &Path, collection: &str) -> Result<PricingDocument> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;

    PricingDocument::from_json(value, collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergeEngine;
    use crate::offer::{DeviceOffer, Grade, LockStatus, Prices};
    use chrono::TimeZone;

    fn sample_devices() -> Vec<MergedDevice> {
        let offers = vec![
            DeviceOffer::new(
                "iPhone 15".to_string(),
                "128GB".to_string(),
                LockStatus::Unlocked,
                [(Grade::A, 350.0), (Grade::BPlus, 335.0), (Grade::B, 320.0)]
                    .into_iter()
                    .collect::<Prices>(),
            )
            .with_source("SA"),
            DeviceOffer::new(
                "iPhone 15".to_string(),
                "1TB".to_string(),
                LockStatus::CarrierLocked,
                [(Grade::B, 610.5), (Grade::D, 220.0)].into_iter().collect::<Prices>(),
            )
            .with_source("KT"),
        ];
        MergeEngine::new().merge(&offers)
    }

    #[test]
    fn test_to_json_shape() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 5, 10, 0, 0).unwrap();
        let doc = PricingDocument::new("devices", sample_devices())
            .with_metadata(ts, vec!["SA".to_string(), "KT".to_string()]);

        let json = doc.to_json().unwrap();
        assert_eq!(json["last_updated"], "2025-11-05T10:00:00+00:00");
        assert_eq!(json["sources"][1], "KT");
        assert_eq!(json["devices"][0]["model"], "iPhone 15");
        assert_eq!(json["devices"][0]["lock_status"], "Unlocked");
        assert_eq!(json["devices"][0]["prices"]["B+"], 335.0);
        assert_eq!(json["devices"][1]["lock_status"], "Carrier Locked");
    }

    #[test]
    fn test_to_json_without_metadata() {
        let doc = PricingDocument::new("androids", sample_devices());
        let json = doc.to_json().unwrap();

        assert!(json.get("last_updated").is_none());
        assert!(json.get("sources").is_none());
        assert!(json["androids"].is_array());
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("pricing-iphones.json");

        let ts = Utc.with_ymd_and_hms(2025, 11, 5, 10, 0, 0).unwrap();
        let doc = PricingDocument::new("iphones", sample_devices())
            .with_metadata(ts, vec!["SA".to_string()]);
        doc.write(&path).unwrap();

        let back = read_document(&path, "iphones").unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        PricingDocument::new("devices", sample_devices()).write(&path).unwrap();
        PricingDocument::new("devices", Vec::new()).write(&path).unwrap();

        let back = read_document(&path, "devices").unwrap();
        assert!(back.devices.is_empty());
    }

    #[test]
    fn test_read_wrong_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        PricingDocument::new("devices", sample_devices()).write(&path).unwrap();

        assert!(read_document(&path, "androids").is_err());
    }
}
