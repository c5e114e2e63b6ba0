// KT Corp CSV export
// iPhone sheet: "USED IPHONE <model>" headers, lock sections, deduction blocks
// Android sheet: "GALAXY <model>" headers, lock status inside the variant cell

use super::{
    has_extension, read_csv_rows, viable_offer, DeviceFamily, FileValidator, GradeColumns,
    ModelContext, Row, RowParser, SourceKind, VendorParser,
};
use crate::fields::{cell, contains_any, extract_storage, has_storage_token, is_blank_row};
use crate::offer::{DeviceOffer, LockStatus};
use anyhow::Result;
use std::path::Path;

/// Rows that open a deduction block in the iPhone export
const IPHONE_DEDUCTION_MARKERS: [&str; 2] = ["MDM Locked", "Unknown Parts"];

/// Annotation rows in the Android export
const ANDROID_DEDUCTION_MARKERS: [&str; 2] = ["DEDUCTION", "MISSING STYLUS"];

/// Minimum cells for a price row (variant + five grades)
const IPHONE_MIN_CELLS: usize = 7;
const ANDROID_MIN_CELLS: usize = 6;

/// Where the scan is inside the current model block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Idle,
    Deduction,
    Lock(LockStatus),
}

pub struct KtCsvParser {
    family: DeviceFamily,
    columns: GradeColumns,
}

impl KtCsvParser {
    pub fn new(family: DeviceFamily) -> Self {
        KtCsvParser {
            family,
            columns: GradeColumns::kt_default(),
        }
    }

    pub fn with_columns(mut self, columns: GradeColumns) -> Self {
        self.columns = columns;
        self
    }

    fn parse_iphone_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        let mut offers = Vec::new();
        let mut model = ModelContext::NoModel;
        let mut section = Section::Idle;

        for row in rows {
            if is_blank_row(row) {
                section = Section::Idle;
                continue;
            }

            let first = cell(row, 0).trim();
            let line = row.join(",");

            if let Some(rest) = strip_prefix_ignore_case(first, "USED IPHONE") {
                model.enter(format!("iPhone {}", rest.trim()));
                section = Section::Idle;
                continue;
            }

            if contains_any(&line, &IPHONE_DEDUCTION_MARKERS) {
                section = Section::Deduction;
                continue;
            }

            let variant = cell(row, 1);
            if !has_storage_token(variant) {
                if contains_any(&line, &["UNLOCKED"]) {
                    section = Section::Lock(LockStatus::Unlocked);
                } else if contains_any(&line, &["SIM LOCKED"]) {
                    section = Section::Lock(LockStatus::CarrierLocked);
                }
                continue;
            }

            let (Section::Lock(lock_status), Some(current)) = (section, model.current()) else {
                continue;
            };

            if row.len() < IPHONE_MIN_CELLS {
                continue;
            }

            let storage = extract_storage(variant).unwrap_or_else(|| variant.trim().to_string());
            if let Some(offer) =
                viable_offer(current, storage, lock_status, self.columns.extract(row))
            {
                offers.push(offer);
            }
        }

        offers
    }

    fn parse_android_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        let mut offers = Vec::new();
        let mut model = ModelContext::NoModel;

        for row in rows {
            if is_blank_row(row) {
                continue;
            }

            let first = cell(row, 0).trim();
            if first.to_uppercase().starts_with("GALAXY") {
                model.enter(first);
                continue;
            }

            if contains_any(&row.join(","), &ANDROID_DEDUCTION_MARKERS) {
                continue;
            }

            let Some(current) = model.current() else {
                continue;
            };

            let variant = cell(row, 1);
            if row.len() < ANDROID_MIN_CELLS || !contains_any(variant, &["LOCKED"]) {
                continue;
            }

            let Some(storage) = extract_storage(variant) else {
                continue;
            };

            let lock_status = if contains_any(variant, &["UNLOCKED"]) {
                LockStatus::Unlocked
            } else {
                LockStatus::CarrierLocked
            };

            if let Some(offer) =
                viable_offer(current, storage, lock_status, self.columns.extract(row))
            {
                offers.push(offer);
            }
        }

        offers
    }
}

impl RowParser for KtCsvParser {
    fn parse_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        match self.family {
            DeviceFamily::Iphone => self.parse_iphone_rows(rows),
            DeviceFamily::Android => self.parse_android_rows(rows),
        }
    }
}

impl VendorParser for KtCsvParser {
    fn parse(&self, file_path: &Path) -> Result<Vec<DeviceOffer>> {
        let rows = read_csv_rows(file_path)?;
        Ok(self.parse_rows(&rows))
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::KtCsv
    }
}

impl FileValidator for KtCsvParser {
    fn can_parse(&self, file_path: &Path) -> bool {
        has_extension(file_path, &["csv"])
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}
