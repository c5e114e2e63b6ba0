// 🧹 Field Cleaning - prices, storage labels, lock markers
// Pure functions shared by every vendor parser

use crate::offer::LockStatus;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STORAGE_TOKEN: Regex = Regex::new(r"(?i)(\d+)\s*(GB|TB)\b").unwrap();
    static ref LEADING_NUMBER: Regex = Regex::new(r"\d+").unwrap();
    static ref LOCKED_WORD: Regex = Regex::new(r"(?i)\bcarrier\b|\blocked\b").unwrap();
}

/// Placeholder words vendors put in price cells instead of a number
const NON_QUOTE_WORDS: [&str; 3] = ["OFFER", "CALL", "ASK"];

/// Clean a price cell into a positive amount
///
/// "$1,299.00" → Some(1299.0), "CALL" → None, "0" → None
pub fn clean_price(raw: &str) -> Option<f64> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let upper = text.to_uppercase();
    if NON_QUOTE_WORDS.iter().any(|w| upper.contains(w)) {
        return None;
    }

    let cleaned: String = text
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();

    let price: f64 = cleaned.parse().ok()?;
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

/// True when the text carries a capacity token like "128GB" or "1 TB"
pub fn has_storage_token(text: &str) -> bool {
    STORAGE_TOKEN.is_match(text)
}

/// First capacity token, normalized to "<digits><UNIT>" ("256 gb" → "256GB")
pub fn extract_storage(text: &str) -> Option<String> {
    let caps = STORAGE_TOKEN.captures(text)?;
    Some(format!("{}{}", &caps[1], caps[2].to_uppercase()))
}

/// Byte offset of the first capacity token
pub fn storage_token_position(text: &str) -> Option<(usize, usize)> {
    STORAGE_TOKEN.find(text).map(|m| (m.start(), m.end()))
}

/// Sortable capacity in GB; "1TB" → 1024, labels without a number → 0
pub fn storage_capacity_gb(label: &str) -> u64 {
    if let Some(caps) = STORAGE_TOKEN.captures(label) {
        let value: u64 = caps[1].parse().unwrap_or(0);
        return if caps[2].eq_ignore_ascii_case("TB") {
            value.saturating_mul(1024)
        } else {
            value
        };
    }

    LEADING_NUMBER
        .find(label)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Case-insensitive substring check against a marker list
pub fn contains_any(text: &str, markers: &[&str]) -> bool {
    let upper = text.to_uppercase();
    markers.iter().any(|m| upper.contains(&m.to_uppercase()))
}

/// Lock status from free text: "carrier" or a bare "locked" means Carrier Locked
///
/// "Unlocked" alone stays Unlocked since "locked" is only matched as a word.
pub fn lock_status_from_text(text: &str) -> LockStatus {
    if LOCKED_WORD.is_match(text) {
        LockStatus::CarrierLocked
    } else {
        LockStatus::Unlocked
    }
}

/// Row separator check: no cell has visible content
pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Cell text or "" when the row is too short
pub fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.as_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_price_currency_and_thousands() {
        assert_eq!(clean_price("$1,299.00"), Some(1299.0));
        assert_eq!(clean_price(" 450 "), Some(450.0));
        assert_eq!(clean_price("$ 85"), Some(85.0));
    }

    #[test]
    fn test_clean_price_absent_values() {
        assert_eq!(clean_price("CALL"), None);
        assert_eq!(clean_price("Make Offer"), None);
        assert_eq!(clean_price("ask"), None);
        assert_eq!(clean_price(""), None);
        assert_eq!(clean_price("N/A"), None);
        assert_eq!(clean_price("0"), None);
        assert_eq!(clean_price("-25"), None);
    }

    #[test]
    fn test_storage_token() {
        assert!(has_storage_token("128GB"));
        assert!(has_storage_token("256GB UNLOCKED"));
        assert!(has_storage_token("1 TB"));
        assert!(!has_storage_token("GALAXY S24"));
        assert!(!has_storage_token("Grade B"));
    }

    #[test]
    fn test_extract_storage_normalizes() {
        assert_eq!(extract_storage("256GB UNLOCKED"), Some("256GB".to_string()));
        assert_eq!(extract_storage("iPhone 15 Pro 1tb"), Some("1TB".to_string()));
        assert_eq!(extract_storage("512 GB Sim locked"), Some("512GB".to_string()));
        assert_eq!(extract_storage("no capacity"), None);
    }

    #[test]
    fn test_storage_capacity_scales_terabytes() {
        assert_eq!(storage_capacity_gb("128GB"), 128);
        assert_eq!(storage_capacity_gb("256GB"), 256);
        assert_eq!(storage_capacity_gb("1TB"), 1024);
        assert_eq!(storage_capacity_gb("64"), 64);
        assert_eq!(storage_capacity_gb("unknown"), 0);
    }

    #[test]
    fn test_lock_status_from_text() {
        assert_eq!(lock_status_from_text("Unlocked"), LockStatus::Unlocked);
        assert_eq!(lock_status_from_text("Carrier Locked"), LockStatus::CarrierLocked);
        assert_eq!(lock_status_from_text("SIM LOCKED"), LockStatus::CarrierLocked);
        assert_eq!(lock_status_from_text(""), LockStatus::Unlocked);
    }

    #[test]
    fn test_contains_any_ignores_case() {
        assert!(contains_any("Galaxy S23 DEDUCTION", &["deduction"]));
        assert!(contains_any("mdm locked devices", &["MDM Locked", "Unknown Parts"]));
        assert!(!contains_any("GALAXY S23", &["DEDUCTION"]));
    }

    #[test]
    fn test_blank_row() {
        assert!(is_blank_row(&["".to_string(), "  ".to_string()]));
        assert!(is_blank_row(&[]));
        assert!(!is_blank_row(&["".to_string(), "128GB".to_string()]));
    }
}
