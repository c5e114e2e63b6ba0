// 🚚 Import Pipeline - sources → offers → merged JSON files
// Each source runs independently; a failing source contributes nothing

use crate::config::{Config, OutputConfig, SourceConfig};
use crate::merge::MergeEngine;
use crate::offer::{DeviceOffer, Grade, MergedDevice};
use crate::output::PricingDocument;
use crate::parser::{get_parser, FileValidator, SourceKind};
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ============================================================================
// SOURCE RUN
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SourceStatus {
    Parsed,
    /// Input file not found
    Missing,
    /// Reading or decoding failed; message carries the context chain
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SourceRun {
    pub name: String,
    pub kind: Option<SourceKind>,
    pub status: SourceStatus,
    pub offers: Vec<DeviceOffer>,
}

/// Parse one configured source. Never fails: problems are logged and the
/// source yields no offers.
pub fn load_source(source: &SourceConfig) -> SourceRun {
    let mut run = SourceRun {
        name: source.name.clone(),
        kind: None,
        status: SourceStatus::Parsed,
        offers: Vec::new(),
    };

    if !source.path.exists() {
        warn!("⚠️  {} file not found: {}", source.name, source.path.display());
        run.status = SourceStatus::Missing;
        return run;
    }

    let parsed = source.kind().and_then(|kind| {
        run.kind = Some(kind);
        let parser = get_parser(kind, &source.parser_options()?);
        if !parser.can_parse(&source.path) {
            anyhow::bail!(
                "{} parser does not accept {}",
                kind.name(),
                source.path.display()
            );
        }
        parser.parse(&source.path)
    });

    match parsed {
        Ok(offers) => {
            info!(
                "📱 {}: {} offers from {} ({})",
                source.name,
                offers.len(),
                source.path.display(),
                run.kind.map(|k| k.name().to_string()).unwrap_or_default()
            );
            run.offers = offers
                .into_iter()
                .map(|o| o.with_source(source.name.clone()))
                .collect();
        }
        Err(e) => {
            error!("❌ {} failed: {:#}", source.name, e);
            run.status = SourceStatus::Failed(format!("{:#}", e));
        }
    }

    run
}

// ============================================================================
// OUTPUTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct OutputReport {
    pub path: PathBuf,
    pub collection: String,
    pub devices: Vec<MergedDevice>,
    /// Keys quoted by more than one offer
    pub overlapping_keys: usize,
}

/// Merge the offers of the sources feeding `output`
pub fn build_document(
    config: &Config,
    output: &OutputConfig,
    runs: &[SourceRun],
    now: DateTime<Utc>,
) -> (PricingDocument, usize) {
    let wanted: Vec<&str> = config
        .sources_for(output)
        .iter()
        .map(|s| s.name.as_str())
        .collect();

    let offers: Vec<&DeviceOffer> = runs
        .iter()
        .filter(|r| wanted.contains(&r.name.as_str()))
        .flat_map(|r| r.offers.iter())
        .collect();

    let engine = if output.vendor_breakdown {
        MergeEngine::new()
    } else {
        MergeEngine::without_vendors()
    };

    let overlapping = engine.overlapping_keys(offers.iter().copied());
    let devices = engine.merge(offers.iter().copied());

    let mut document = PricingDocument::new(output.collection.clone(), devices);
    if output.metadata {
        document = document.with_metadata(now, wanted.iter().map(|s| s.to_string()).collect());
    }

    (document, overlapping)
}

// ============================================================================
// RUN
// ============================================================================

#[derive(Debug, Clone)]
pub struct RunReport {
    pub sources: Vec<SourceRun>,
    pub outputs: Vec<OutputReport>,
}

impl RunReport {
    pub fn total_offers(&self) -> usize {
        self.sources.iter().map(|s| s.offers.len()).sum()
    }

    pub fn failed_sources(&self) -> Vec<&str> {
        self.sources
            .iter()
            .filter(|s| s.status != SourceStatus::Parsed)
            .map(|s| s.name.as_str())
            .collect()
    }
}

pub fn run(config: &Config) -> Result<RunReport> {
    run_at(config, Utc::now())
}

/// Full batch: every source, then every output file. Only output write
/// failures are errors.
pub fn run_at(config: &Config, now: DateTime<Utc>) -> Result<RunReport> {
    let sources: Vec<SourceRun> = config.sources.iter().map(load_source).collect();

    let mut outputs = Vec::new();
    for output in &config.outputs {
        let (document, overlapping_keys) = build_document(config, output, &sources, now);
        document.write(&output.path)?;

        info!(
            "💾 Saved {} {} to {} ({} merged across vendors)",
            document.devices.len(),
            document.collection,
            output.path.display(),
            overlapping_keys
        );

        outputs.push(OutputReport {
            path: output.path.clone(),
            collection: document.collection,
            devices: document.devices,
            overlapping_keys,
        });
    }

    Ok(RunReport { sources, outputs })
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub model: String,
    /// Mean grade B price over the model's variants (missing B counts as 0)
    pub average_b: f64,
    pub variants: usize,
}

/// Models ranked by average grade B price, highest first
pub fn top_models(devices: &[MergedDevice], limit: usize) -> Vec<ModelSummary> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for device in devices {
        groups
            .entry(device.model.as_str())
            .or_default()
            .push(device.prices.get(Grade::B).unwrap_or(0.0));
    }

    let mut summaries: Vec<ModelSummary> = groups
        .into_iter()
        .map(|(model, prices)| ModelSummary {
            model: model.to_string(),
            average_b: prices.iter().sum::<f64>() / prices.len() as f64,
            variants: prices.len(),
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.average_b
            .total_cmp(&a.average_b)
            .then_with(|| a.model.cmp(&b.model))
    });
    summaries.truncate(limit);
    summaries
}

/// One log line per device: merged grade B and what each vendor quoted
pub fn sample_lines(devices: &[MergedDevice], limit: usize) -> Vec<String> {
    devices
        .iter()
        .take(limit)
        .map(|d| {
            let best = d
                .prices
                .get(Grade::B)
                .map(|p| format!("${:.0}", p))
                .unwrap_or_else(|| "N/A".to_string());
            let vendors: Vec<String> = d
                .vendors
                .iter()
                .map(|(name, prices)| {
                    let quote = prices
                        .get(Grade::B)
                        .map(|p| format!("${:.0}", p))
                        .unwrap_or_else(|| "N/A".to_string());
                    format!("{} {}", name, quote)
                })
                .collect();

            if vendors.is_empty() {
                format!("{} {} {}: B {}", d.model, d.storage, d.lock_status, best)
            } else {
                format!(
                    "{} {} {}: B {} ({})",
                    d.model,
                    d.storage,
                    d.lock_status,
                    best,
                    vendors.join(", ")
                )
            }
        })
        .collect()
}

pub fn log_summary(report: &RunReport, config: &Config) {
    for output in &report.outputs {
        info!("📊 {} ({} configurations)", output.path.display(), output.devices.len());

        for (i, model) in top_models(&output.devices, config.summary.top_models)
            .iter()
            .enumerate()
        {
            info!(
                "  {:2}. {:30} ${:6.0} avg - {} variants",
                i + 1,
                model.model,
                model.average_b,
                model.variants
            );
        }

        for line in sample_lines(&output.devices, config.summary.samples) {
            info!("  {}", line);
        }
    }

    let failed = report.failed_sources();
    if !failed.is_empty() {
        warn!("⚠️  Sources with no data: {}", failed.join(", "));
    }
}

// ============================================================================
// TESTS
// ============================================================================
