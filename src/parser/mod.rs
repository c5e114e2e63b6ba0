// 🏗️ Parser Framework
// Polymorphic vendor parsers: KT Corp (CSV + Excel) and Sell Atlas (CSV)

use crate::offer::{DeviceOffer, Grade, Prices};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

pub mod kt_csv;
pub mod kt_excel;
pub mod sell_atlas;

pub use kt_csv::KtCsvParser;
pub use kt_excel::KtExcelParser;
pub use sell_atlas::SellAtlasParser;

// ============================================================================
// CORE TYPES
// ============================================================================

/// SourceKind - which vendor/file-format pairing a document comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    KtCsv,
    KtExcel,
    SellAtlasCsv,
}

impl SourceKind {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceKind::KtCsv => "KT Corp (CSV)",
            SourceKind::KtExcel => "KT Corp (Excel)",
            SourceKind::SellAtlasCsv => "Sell Atlas (CSV)",
        }
    }

    /// Default vendor tag written into offers
    pub fn code(&self) -> &str {
        match self {
            SourceKind::KtCsv | SourceKind::KtExcel => "KT",
            SourceKind::SellAtlasCsv => "SA",
        }
    }
}

/// Device family a price list section covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    #[default]
    Iphone,
    Android,
}

impl DeviceFamily {
    /// Sheet title KT uses for this family
    pub fn kt_sheet_name(&self) -> &'static str {
        match self {
            DeviceFamily::Iphone => "Used iPhone",
            DeviceFamily::Android => "Used Android",
        }
    }

    /// Word a Sell Atlas description must contain
    pub fn keyword(&self) -> &'static str {
        match self {
            DeviceFamily::Iphone => "iPhone",
            DeviceFamily::Android => "Galaxy",
        }
    }
}

/// Raw table row: one string per cell
pub type Row = Vec<String>;

// ============================================================================
// MODEL CONTEXT - sequential scan state
// ============================================================================

/// Current device model while scanning rows top to bottom.
/// Price rows only count once a model header has been seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelContext {
    #[default]
    NoModel,
    InModel(String),
}

impl ModelContext {
    /// A model header supersedes whatever came before
    pub fn enter(&mut self, model: impl Into<String>) {
        *self = ModelContext::InModel(model.into());
    }

    pub fn current(&self) -> Option<&str> {
        match self {
            ModelContext::NoModel => None,
            ModelContext::InModel(name) => Some(name.as_str()),
        }
    }
}

// ============================================================================
// GRADE COLUMNS - column index -> grade table
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeColumns(BTreeMap<usize, Grade>);

impl GradeColumns {
    pub fn new(columns: impl IntoIterator<Item = (usize, Grade)>) -> Self {
        GradeColumns(columns.into_iter().collect())
    }

    /// KT layout: storage/variant in column 1, A..D in columns 2-6
    pub fn kt_default() -> Self {
        GradeColumns::new([
            (2, Grade::A),
            (3, Grade::BPlus),
            (4, Grade::B),
            (5, Grade::C),
            (6, Grade::D),
        ])
    }

    /// Sell Atlas layout: Model, SWAP/HSO, Grade A, Grade B, Grade C, Grade D, DOA
    pub fn sell_atlas_default() -> Self {
        GradeColumns::new([(3, Grade::A), (4, Grade::B), (5, Grade::C), (6, Grade::D)])
    }

    /// Build the table from a header row whose cells are grade labels.
    /// Needs at least two labelled columns to count as a header.
    pub fn from_header_row(row: &[String]) -> Option<Self> {
        let columns: BTreeMap<usize, Grade> = row
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| Grade::from_label(cell).map(|g| (idx, g)))
            .collect();

        if columns.len() >= 2 {
            Some(GradeColumns(columns))
        } else {
            None
        }
    }

    /// Clean every mapped cell; missing or non-numeric cells yield no entry
    pub fn extract(&self, row: &[String]) -> Prices {
        self.0
            .iter()
            .filter_map(|(idx, grade)| {
                let price = crate::fields::clean_price(row.get(*idx)?)?;
                Some((*grade, price))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, Grade)> + '_ {
        self.0.iter().map(|(i, g)| (*i, *g))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// B+ SYNTHESIS
// ============================================================================

/// How to fill grade B+ when a vendor does not quote it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BPlusPolicy {
    /// round((A + B) / 2)
    #[default]
    Average,
    /// Vendor's grade A is treated as B+
    CopyA,
    Omit,
}

impl BPlusPolicy {
    pub fn apply(&self, prices: &mut Prices) {
        if prices.contains(Grade::BPlus) {
            return;
        }

        match self {
            BPlusPolicy::Average => {
                if let (Some(a), Some(b)) = (prices.get(Grade::A), prices.get(Grade::B)) {
                    prices.set(Grade::BPlus, ((a + b) / 2.0).round());
                }
            }
            BPlusPolicy::CopyA => {
                if let Some(a) = prices.get(Grade::A) {
                    prices.set(Grade::BPlus, a);
                }
            }
            BPlusPolicy::Omit => {}
        }
    }
}

// ============================================================================
// COMPOSABLE TRAITS
// ============================================================================

/// VendorParser - core trait: turn one vendor file into offers
pub trait VendorParser: FileValidator + Send + Sync {
    /// Parse a file and return viable offers.
    /// Malformed rows are skipped, only I/O and decode failures are errors.
    fn parse(&self, file_path: &Path) -> Result<Vec<DeviceOffer>>;

    /// Get the source kind this parser handles
    fn source_kind(&self) -> SourceKind;
}

/// RowParser - the row-classification heuristics, independent of file I/O
pub trait RowParser {
    fn parse_rows(&self, rows: &[Row]) -> Vec<DeviceOffer>;
}

/// FileValidator - extension check run before a file is opened
pub trait FileValidator {
    fn can_parse(&self, file_path: &Path) -> bool;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Knobs shared by every parser; `None` fields use the vendor default
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    pub family: DeviceFamily,
    pub columns: Option<GradeColumns>,
    pub sheet: Option<String>,
    pub b_plus: BPlusPolicy,
}

/// Detect source kind from the file name
///
/// "KT Corp - PPL ( USED ) #20251105.xlsx" → KtExcel
/// "SA_11.5.2025 - iPhone Used.csv" → SellAtlasCsv
/// "KT_9.30 - Sheet1.csv" → KtCsv
pub fn detect_source(file_path: &Path) -> Result<SourceKind> {
    let filename = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    let filename_lower = filename.to_lowercase();
    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if extension == "xlsx" || extension == "xls" {
        return Ok(SourceKind::KtExcel);
    }

    if filename_lower.starts_with("sa_")
        || filename_lower.contains("sell atlas")
        || filename_lower.contains("sellatlas")
        || filename_lower.contains("sell_atlas")
    {
        return Ok(SourceKind::SellAtlasCsv);
    }

    if filename_lower.starts_with("kt") || filename_lower.contains("kt corp") {
        return Ok(SourceKind::KtCsv);
    }

    Err(anyhow::anyhow!(
        "Could not detect source kind from filename: {}",
        filename
    ))
}

/// Get the parser for a source kind
pub fn get_parser(kind: SourceKind, options: &ParserOptions) -> Box<dyn VendorParser> {
    match kind {
        SourceKind::KtCsv => {
            let mut parser = KtCsvParser::new(options.family);
            if let Some(columns) = &options.columns {
                parser = parser.with_columns(columns.clone());
            }
            Box::new(parser)
        }
        SourceKind::KtExcel => {
            let mut parser = KtExcelParser::new(options.family);
            if let Some(sheet) = &options.sheet {
                parser = parser.with_sheet(sheet.clone());
            }
            if let Some(columns) = &options.columns {
                parser = parser.with_columns(columns.clone());
            }
            Box::new(parser)
        }
        SourceKind::SellAtlasCsv => {
            let mut parser = SellAtlasParser::new(options.family).with_b_plus(options.b_plus);
            if let Some(columns) = &options.columns {
                parser = parser.with_columns(columns.clone());
            }
            Box::new(parser)
        }
    }
}

// ============================================================================
// ROW READERS
// ============================================================================

/// Read a delimited file as raw rows (no header, ragged rows allowed).
/// Cells that are not valid UTF-8 are decoded lossily.
pub fn read_csv_rows(file_path: &Path) -> Result<Vec<Row>> {
    use csv::ReaderBuilder;

    let file = File::open(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for (line_num, result) in reader.byte_records().enumerate() {
        let record = result.with_context(|| {
            format!(
                "Failed to parse CSV line {} in {}",
                line_num + 1,
                file_path.display()
            )
        })?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect(),
        );
    }

    Ok(rows)
}

/// Assemble an offer from a classified price row; None unless it has a grade B price
pub(crate) fn viable_offer(
    model: &str,
    storage: String,
    lock_status: crate::offer::LockStatus,
    prices: Prices,
) -> Option<DeviceOffer> {
    let offer = DeviceOffer::new(normalize_model(model), storage, lock_status, prices);
    if offer.is_viable() {
        Some(offer)
    } else {
        None
    }
}

/// Collapse runs of whitespace; case is left as the vendor wrote it
pub fn normalize_model(model: &str) -> String {
    model.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_extension(file_path: &Path, allowed: &[&str]) -> bool {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| allowed.iter().any(|a| e.eq_ignore_ascii_case(a)))
        .unwrap_or(false)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) fn rows(lines: &[&str]) -> Vec<Row> {
    lines
        .iter()
        .map(|line| line.split(',').map(|s| s.to_string()).collect())
        .collect()
}
