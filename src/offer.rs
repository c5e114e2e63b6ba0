// 📱 Offer Model - one vendor's quote for one device configuration
// Grades, lock status, price sets and the merged aggregate

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// GRADE
// ============================================================================

/// Condition bucket for a used device, best (A) to worst (D)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Grade {
    A,
    BPlus,
    B,
    C,
    D,
}

impl Grade {
    pub const ALL: [Grade; 5] = [Grade::A, Grade::BPlus, Grade::B, Grade::C, Grade::D];

    /// Label used by vendors and in the JSON output
    pub fn label(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    /// Parse a grade label ("A", "B+", "Grade B", ...)
    pub fn from_label(label: &str) -> Option<Grade> {
        let label = label.trim();
        let label = label
            .strip_prefix("Grade ")
            .or_else(|| label.strip_prefix("GRADE "))
            .unwrap_or(label)
            .trim();

        Grade::ALL
            .into_iter()
            .find(|g| g.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for Grade {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Grade::from_label(&value).ok_or_else(|| format!("unknown grade: {}", value))
    }
}

impl From<Grade> for String {
    fn from(grade: Grade) -> Self {
        grade.label().to_string()
    }
}

// ============================================================================
// LOCK STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockStatus {
    #[serde(rename = "Unlocked")]
    Unlocked,

    #[serde(rename = "Carrier Locked")]
    CarrierLocked,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Unlocked => "Unlocked",
            LockStatus::CarrierLocked => "Carrier Locked",
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PRICES
// ============================================================================

/// Grade -> price. Only finite, strictly positive prices are ever stored;
/// a missing grade means "not quoted".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prices(BTreeMap<Grade, f64>);

impl Prices {
    pub fn new() -> Self {
        Prices(BTreeMap::new())
    }

    /// Store a price. Returns false (and stores nothing) for non-positive values.
    pub fn set(&mut self, grade: Grade, price: f64) -> bool {
        if !price.is_finite() || price <= 0.0 {
            return false;
        }
        self.0.insert(grade, price);
        true
    }

    pub fn get(&self, grade: Grade) -> Option<f64> {
        self.0.get(&grade).copied()
    }

    pub fn contains(&self, grade: Grade) -> bool {
        self.0.contains_key(&grade)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Grade, f64)> + '_ {
        self.0.iter().map(|(g, p)| (*g, *p))
    }

    /// Keep the running maximum for every grade quoted in `other`
    pub fn merge_max(&mut self, other: &Prices) {
        for (grade, price) in other.iter() {
            match self.0.get(&grade) {
                Some(current) if *current >= price => {}
                _ => {
                    self.0.insert(grade, price);
                }
            }
        }
    }
}

impl FromIterator<(Grade, f64)> for Prices {
    fn from_iter<I: IntoIterator<Item = (Grade, f64)>>(iter: I) -> Self {
        let mut prices = Prices::new();
        for (grade, price) in iter {
            prices.set(grade, price);
        }
        prices
    }
}

// ============================================================================
// DEVICE OFFER
// ============================================================================

/// DeviceOffer - output of a vendor parser, consumed once by the merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOffer {
    pub model: String,
    pub storage: String,
    pub lock_status: LockStatus,
    pub prices: Prices,

    /// Vendor tag, only used for the per-vendor breakdown and diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl DeviceOffer {
    pub fn new(model: String, storage: String, lock_status: LockStatus, prices: Prices) -> Self {
        DeviceOffer {
            model,
            storage,
            lock_status,
            prices,
            source: None,
        }
    }

    /// Builder pattern: tag with the originating vendor
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Every adapter applies the same minimum: a positive grade B price
    pub fn is_viable(&self) -> bool {
        self.prices.contains(Grade::B)
    }

    pub fn key(&self) -> MergeKey {
        MergeKey {
            model: self.model.clone(),
            storage: self.storage.clone(),
            lock_status: self.lock_status,
        }
    }
}

// ============================================================================
// MERGED DEVICE
// ============================================================================

/// Identifies one distinct sellable configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub model: String,
    pub storage: String,
    pub lock_status: LockStatus,
}

/// Best price per grade across every vendor quoting the same key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDevice {
    pub model: String,
    pub storage: String,
    pub lock_status: LockStatus,
    pub prices: Prices,

    /// Best quote per vendor for this key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vendors: BTreeMap<String, Prices>,
}

impl MergedDevice {
    pub fn from_offer(offer: &DeviceOffer) -> Self {
        let mut vendors = BTreeMap::new();
        if let Some(source) = &offer.source {
            vendors.insert(source.clone(), offer.prices.clone());
        }

        MergedDevice {
            model: offer.model.clone(),
            storage: offer.storage.clone(),
            lock_status: offer.lock_status,
            prices: offer.prices.clone(),
            vendors,
        }
    }

    /// Fold another offer for the same key into this aggregate
    pub fn absorb(&mut self, offer: &DeviceOffer) {
        self.prices.merge_max(&offer.prices);

        if let Some(source) = &offer.source {
            self.vendors
                .entry(source.clone())
                .or_default()
                .merge_max(&offer.prices);
        }
    }

    pub fn key(&self) -> MergeKey {
        MergeKey {
            model: self.model.clone(),
            storage: self.storage.clone(),
            lock_status: self.lock_status,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
