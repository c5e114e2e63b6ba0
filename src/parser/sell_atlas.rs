// Sell Atlas CSV export ("SA_<date> - iPhone Used.csv")
// Preamble rows, then a "Grade A | Grade B | ..." header, then one row per
// configuration: "iPhone 15 Pro Max 256GB Carrier Locked"

use super::{
    has_extension, read_csv_rows, viable_offer, BPlusPolicy, DeviceFamily, FileValidator,
    GradeColumns, Row, RowParser, SourceKind, VendorParser,
};
use crate::fields::{cell, extract_storage, lock_status_from_text, storage_token_position};
use crate::offer::DeviceOffer;
use anyhow::Result;
use log::warn;
use std::path::Path;

/// Model, SWAP/HSO, Grade A, Grade B, Grade C, Grade D, DOA
const MIN_CELLS: usize = 7;

const HEADER_MARKER: &str = "grade a";

pub struct SellAtlasParser {
    family: DeviceFamily,
    columns: GradeColumns,
    b_plus: BPlusPolicy,
}

impl SellAtlasParser {
    pub fn new(family: DeviceFamily) -> Self {
        SellAtlasParser {
            family,
            columns: GradeColumns::sell_atlas_default(),
            b_plus: BPlusPolicy::default(),
        }
    }

    pub fn with_columns(mut self, columns: GradeColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_b_plus(mut self, policy: BPlusPolicy) -> Self {
        self.b_plus = policy;
        self
    }

    /// Split "iPhone 15 Pro 256GB Unlocked" into model, storage and lock text
    fn classify(&self, description: &str) -> Option<(String, String, String)> {
        let keyword = self.family.keyword().to_lowercase();
        if !description.to_lowercase().contains(&keyword) {
            return None;
        }

        let (start, end) = storage_token_position(description)?;
        let model = description[..start].trim();
        if !model.to_lowercase().contains(&keyword) {
            return None;
        }

        let storage = extract_storage(description)?;
        let rest = description[end..].trim();
        Some((model.to_string(), storage, rest.to_string()))
    }
}

impl RowParser for SellAtlasParser {
    fn parse_rows(&self, rows: &[Row]) -> Vec<DeviceOffer> {
        let header = rows.iter().position(|row| {
            row.iter()
                .any(|c| c.to_lowercase().contains(HEADER_MARKER))
        });

        let Some(header) = header else {
            warn!("Sell Atlas export has no 'Grade A' header row, nothing parsed");
            return Vec::new();
        };

        let mut offers = Vec::new();
        for row in &rows[header + 1..] {
            if row.len() < MIN_CELLS {
                continue;
            }

            let Some((model, storage, rest)) = self.classify(cell(row, 1).trim()) else {
                continue;
            };

            let mut prices = self.columns.extract(row);
            self.b_plus.apply(&mut prices);

            if let Some(offer) = viable_offer(&model, storage, lock_status_from_text(&rest), prices)
            {
                offers.push(offer);
            }
        }

        offers
    }
}

impl VendorParser for SellAtlasParser {
    fn parse(&self, file_path: &Path) -> Result<Vec<DeviceOffer>> {
        let rows = read_csv_rows(file_path)?;
        Ok(self.parse_rows(&rows))
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::SellAtlasCsv
    }
}

impl FileValidator for SellAtlasParser {
    fn can_parse(&self, file_path: &Path) -> bool {
        has_extension(file_path, &["csv"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{Grade, LockStatus};
    use crate::parser::rows;
    use std::io::Write;

    fn sa_export() -> Vec<Row> {
        rows(&[
            "SELL ATLAS,,,,,,,",
            ",iPhone 9 64GB Unlocked,10,10,10,10,10,10",
            ",Model,SWAP/HSO,Grade A,Grade B,Grade C,Grade D,DOA",
            ",iPhone 15 Pro Max 256GB Unlocked,900,$820,$760,$640,$420,$90",
            ",iPhone 15 Pro Max 256GB Carrier Locked,850,$780,$720,$600,$400,$80",
            ",iPhone 15 1TB Unlocked,800,$700,CALL,$500,$300,$50",
            ",Galaxy S24 256GB Unlocked,600,$500,$450,$400,$300,$40",
            ",iPhone 13,500,$400,$350,$300,$200,$30",
            ",iPhone 12 64GB Unlocked,$300",
        ])
    }

    #[test]
    fn test_sell_atlas_parse_rows() {
        let parser = SellAtlasParser::new(DeviceFamily::Iphone);
        let offers = parser.parse_rows(&sa_export());

        assert_eq!(offers.len(), 2, "Only rows after the header with a grade B price");

        assert_eq!(offers[0].model, "iPhone 15 Pro Max");
        assert_eq!(offers[0].storage, "256GB");
        assert_eq!(offers[0].lock_status, LockStatus::Unlocked);
        assert_eq!(offers[0].prices.get(Grade::A), Some(820.0));
        assert_eq!(offers[0].prices.get(Grade::B), Some(760.0));
        assert_eq!(offers[0].prices.get(Grade::BPlus), Some(790.0));
        assert_eq!(offers[0].prices.get(Grade::D), Some(420.0));

        assert_eq!(offers[1].lock_status, LockStatus::CarrierLocked);
    }

    #[test]
    fn test_sell_atlas_android_family() {
        let parser = SellAtlasParser::new(DeviceFamily::Android);
        let offers = parser.parse_rows(&sa_export());

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].model, "Galaxy S24");
        assert_eq!(offers[0].prices.get(Grade::B), Some(450.0));
    }

    #[test]
    fn test_sell_atlas_copy_a_policy() {
        let parser = SellAtlasParser::new(DeviceFamily::Iphone).with_b_plus(BPlusPolicy::CopyA);
        let offers = parser.parse_rows(&sa_export());
        assert_eq!(offers[0].prices.get(Grade::BPlus), Some(820.0));
    }

    #[test]
    fn test_sell_atlas_missing_header() {
        let parser = SellAtlasParser::new(DeviceFamily::Iphone);
        let offers = parser.parse_rows(&rows(&[
            ",iPhone 15 Pro Max 256GB Unlocked,900,$820,$760,$640,$420,$90",
        ]));
        assert!(offers.is_empty());
    }

    #[test]
    fn test_sell_atlas_classify() {
        let parser = SellAtlasParser::new(DeviceFamily::Iphone);
        assert_eq!(
            parser.classify("iPhone 14 Plus 128 GB Carrier Locked"),
            Some((
                "iPhone 14 Plus".to_string(),
                "128GB".to_string(),
                "Carrier Locked".to_string()
            ))
        );
        assert_eq!(parser.classify("iPhone 14 Plus"), None);
        assert_eq!(parser.classify("128GB iPhone"), None);
    }

    #[test]
    fn test_sell_atlas_parse_file_with_quoted_prices() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, ",Model,SWAP/HSO,Grade A,Grade B,Grade C,Grade D,DOA").unwrap();
        writeln!(
            file,
            ",iPhone 16 Pro Max 1TB Unlocked,\"$1,350\",\"$1,299.00\",\"$1,200\",$900,$600,$100"
        )
        .unwrap();

        let parser = SellAtlasParser::new(DeviceFamily::Iphone);
        let offers = parser.parse(file.path()).unwrap();

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].storage, "1TB");
        assert_eq!(offers[0].prices.get(Grade::A), Some(1299.0));
        assert_eq!(offers[0].prices.get(Grade::B), Some(1200.0));
        assert_eq!(offers[0].prices.get(Grade::BPlus), Some(1250.0));
    }

    #[test]
    fn test_sell_atlas_non_utf8_note_row_keeps_prices() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, ",Model,SWAP/HSO,Grade A,Grade B,Grade C,Grade D,DOA").unwrap();
        writeln!(file, ",iPhone 15 128GB Unlocked,400,$350,$300,$250,$150,$40").unwrap();
        file.write_all(b"Note: prices in US\xA0dollars,,,\n").unwrap();

        let parser = SellAtlasParser::new(DeviceFamily::Iphone);
        let offers = parser.parse(file.path()).unwrap();

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].prices.get(Grade::B), Some(300.0));
    }
}
