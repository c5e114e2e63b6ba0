// KT Corp Excel workbook ("KT Corp - PPL ( USED ) #<date>.xlsx")
// One sheet per family, selected by exact title

use super::{
    has_extension, viable_offer, DeviceFamily, FileValidator, GradeColumns, ModelContext, Row,
    RowParser, SourceKind, VendorParser,
};
use crate::fields::{cell, contains_any, extract_storage, has_storage_token, is_blank_row};
use crate::offer::{DeviceOffer, LockStatus};
use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Annotation rows listing price deductions rather than prices
const DEDUCTION_MARKERS: [&str; 4] = ["DEDUCTION", "MISSING", "MDM LOCKED", "UNKNOWN PARTS"];

/// "USED IPHONE ..." rows that are sheet notes, not model headers
const IPHONE_NOTE_MARKERS: [&str; 3] = ["MDM", "UNKNOWN", "ALL DEVICES"];

/// "GALAXY ..." rows that are sheet notes, not model headers
const ANDROID_NOTE_MARKERS: [&str; 3] = ["ALL ANDROID", "PLEASE", "FALLS INTO"];

pub struct KtExcelParser {
    family: DeviceFamily,
    sheet: String,
    columns: GradeColumns,
}

impl KtExcelParser {
    pub fn new(family: DeviceFamily) -> Self {
        KtExcelParser {
            family,
            sheet: family.kt_sheet_name().to_string(),
            columns: GradeColumns::kt_default(),
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = sheet.into();
        self
    }

    pub fn with_columns(mut self, columns: GradeColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    fn parse_iphone_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        let mut offers = Vec::new();
        let mut model = ModelContext::NoModel;
        let mut lock_status = LockStatus::Unlocked;
        let mut columns = self.columns.clone();

        for row in rows {
            if is_blank_row(row) {
                continue;
            }

            let first = cell(row, 0).trim();
            let first_upper = first.to_uppercase();

            if let Some(rest) = text_after_ignore_case(first, "USED IPHONE") {
                let name = rest.trim();
                if !contains_any(&first_upper, &IPHONE_NOTE_MARKERS) && !name.is_empty() {
                    model.enter(format!("iPhone {}", name));
                    lock_status = LockStatus::Unlocked;
                }
                continue;
            }

            if contains_any(&row.join(","), &DEDUCTION_MARKERS) {
                continue;
            }

            // Section headers may also carry the grade labels
            if contains_any(&first_upper, &["SIM LOCKED", "CARRIER"]) {
                lock_status = LockStatus::CarrierLocked;
            } else if first_upper.contains("UNLOCKED") {
                lock_status = LockStatus::Unlocked;
            }

            if let Some(header) = GradeColumns::from_header_row(row) {
                columns = header;
                continue;
            }

            let variant = cell(row, 1);
            let Some(current) = model.current() else {
                continue;
            };
            if !has_storage_token(variant) {
                continue;
            }

            let storage = extract_storage(variant).unwrap_or_else(|| variant.trim().to_string());
            if let Some(offer) = viable_offer(current, storage, lock_status, columns.extract(row)) {
                offers.push(offer);
            }
        }

        offers
    }

    fn parse_android_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        let mut offers = Vec::new();
        let mut model = ModelContext::NoModel;
        let mut columns = self.columns.clone();

        for row in rows {
            if is_blank_row(row) {
                continue;
            }

            let first = cell(row, 0).trim();
            let first_upper = first.to_uppercase();

            if first_upper.contains("GALAXY")
                && !contains_any(&first_upper, &ANDROID_NOTE_MARKERS)
                && !contains_any(&first_upper, &DEDUCTION_MARKERS)
            {
                model.enter(strip_brand(first));
                continue;
            }

            if let Some(header) = GradeColumns::from_header_row(row) {
                columns = header;
                continue;
            }

            if contains_any(&row.join(","), &DEDUCTION_MARKERS) {
                continue;
            }

            let Some(current) = model.current() else {
                continue;
            };

            let variant = cell(row, 1);
            if !has_storage_token(variant) {
                continue;
            }

            let variant_upper = variant.to_uppercase();
            let lock_status = if variant_upper.contains("UNLOCKED") {
                LockStatus::Unlocked
            } else if variant_upper.contains("LOCKED") {
                LockStatus::CarrierLocked
            } else {
                continue;
            };

            let Some(storage) = extract_storage(variant) else {
                continue;
            };

            if let Some(offer) = viable_offer(current, storage, lock_status, columns.extract(row)) {
                offers.push(offer);
            }
        }

        offers
    }
}

impl RowParser for KtExcelParser {
    fn parse_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        match self.family {
            DeviceFamily::Iphone => self.parse_iphone_rows(rows),
            DeviceFamily::Android => self.parse_android_rows(rows),
        }
    }
}

impl VendorParser for KtExcelParser {
    fn parse(&self, file_path: &Path) -> Result<Vec<DeviceOffer>> {
        let rows = read_sheet_rows(file_path, &self.sheet)?;
        Ok(self.parse_rows(&rows))
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::KtExcel
    }
}

impl FileValidator for KtExcelParser {
    fn can_parse(&self, file_path: &Path) -> bool {
        has_extension(file_path, &["xlsx", "xlsm", "xls"])
    }
}

/// Read one worksheet (exact title) as rows of cell text
pub fn read_sheet_rows(file_path: &Path, sheet: &str) -> Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(file_path)
        .with_context(|| format!("Failed to open workbook: {}", file_path.display()))?;

    let range = workbook.worksheet_range(sheet).with_context(|| {
        format!("Failed to read sheet '{}' in {}", sheet, file_path.display())
    })?;

    Ok(range
        .rows()
        .map(|cells| cells.iter().map(cell_text).collect())
        .collect())
}

/// Render a cell the way it reads in the sheet; 610.0 → "610"
fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Text following the first case-insensitive match of an ASCII `needle`
fn text_after_ignore_case<'a>(text: &'a str, needle: &str) -> Option<&'a str> {
    text.char_indices().find_map(|(i, _)| {
        let candidate = text.get(i..i + needle.len())?;
        if candidate.eq_ignore_ascii_case(needle) {
            text.get(i + needle.len()..)
        } else {
            None
        }
    })
}

/// "Samsung GALAXY S24" → "GALAXY S24"
fn strip_brand(model: &str) -> String {
    let trimmed = model.trim();
    match trimmed.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("samsung ") => trimmed[8..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}
