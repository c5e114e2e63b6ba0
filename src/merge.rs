// 🔀 Merge Engine - combine vendor offers into best-price devices
// Max-per-grade fold keyed by (model, storage, lock status)

use crate::fields::storage_capacity_gb;
use crate::offer::{DeviceOffer, MergeKey, MergedDevice};
use std::cmp::Ordering;
use std::collections::HashMap;

// ============================================================================
// MERGE ENGINE
// ============================================================================

pub struct MergeEngine {
    /// Keep the per-vendor quotes next to the merged prices (default: true)
    pub track_vendors: bool,
}

impl MergeEngine {
    pub fn new() -> Self {
        MergeEngine {
            track_vendors: true,
        }
    }

    pub fn without_vendors() -> Self {
        MergeEngine {
            track_vendors: false,
        }
    }

    /// Fold offers into one device per key, then sort for output.
    ///
    /// The result does not depend on offer order, and merging a collection
    /// with itself leaves every price unchanged.
    pub fn merge<'a, I>(&self, offers: I) -> Vec<MergedDevice>
    where
        I: IntoIterator<Item = &'a DeviceOffer>,
    {
        let mut index: HashMap<MergeKey, usize> = HashMap::new();
        let mut devices: Vec<MergedDevice> = Vec::new();

        for offer in offers {
            // Nothing to contribute
            if offer.prices.is_empty() {
                continue;
            }

            match index.get(&offer.key()) {
                Some(&pos) => devices[pos].absorb(offer),
                None => {
                    index.insert(offer.key(), devices.len());
                    devices.push(MergedDevice::from_offer(offer));
                }
            }
        }

        if !self.track_vendors {
            for device in &mut devices {
                device.vendors.clear();
            }
        }

        sort_devices(&mut devices);
        devices
    }

    /// Number of keys quoted by more than one offer
    pub fn overlapping_keys<'a, I>(&self, offers: I) -> usize
    where
        I: IntoIterator<Item = &'a DeviceOffer>,
    {
        let mut counts: HashMap<MergeKey, usize> = HashMap::new();
        for offer in offers {
            *counts.entry(offer.key()).or_default() += 1;
        }
        counts.values().filter(|c| **c > 1).count()
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Output order: model, capacity ascending, lock status string
pub fn sort_devices(devices: &mut [MergedDevice]) {
    devices.sort_by(compare_devices);
}

fn compare_devices(a: &MergedDevice, b: &MergedDevice) -> Ordering {
    a.model
        .cmp(&b.model)
        .then_with(|| storage_capacity_gb(&a.storage).cmp(&storage_capacity_gb(&b.storage)))
        .then_with(|| a.storage.cmp(&b.storage))
        .then_with(|| a.lock_status.as_str().cmp(b.lock_status.as_str()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offer::{Grade, LockStatus, Prices};

    fn create_test_offer(
        model: &str,
        storage: &str,
        lock_status: LockStatus,
        prices: &[(Grade, f64)],
        source: &str,
    ) -> DeviceOffer {
        DeviceOffer::new(
            model.to_string(),
            storage.to_string(),
            lock_status,
            prices.iter().copied().collect::<Prices>(),
        )
        .with_source(source)
    }

    fn as_offer(device: &MergedDevice) -> DeviceOffer {
        DeviceOffer::new(
            device.model.clone(),
            device.storage.clone(),
            device.lock_status,
            device.prices.clone(),
        )
    }

    fn sample_offers() -> Vec<DeviceOffer> {
        vec![
            create_test_offer(
                "iPhone 15",
                "128GB",
                LockStatus::Unlocked,
                &[(Grade::B, 300.0)],
                "SA",
            ),
            create_test_offer(
                "iPhone 15",
                "128GB",
                LockStatus::Unlocked,
                &[(Grade::B, 320.0), (Grade::C, 200.0)],
                "KT",
            ),
            create_test_offer(
                "iPhone 15",
                "128GB",
                LockStatus::CarrierLocked,
                &[(Grade::A, 280.0), (Grade::B, 250.0)],
                "KT",
            ),
            create_test_offer(
                "iPhone 14",
                "256GB",
                LockStatus::Unlocked,
                &[(Grade::A, 310.0), (Grade::B, 260.0), (Grade::D, 90.0)],
                "SA",
            ),
            create_test_offer(
                "iPhone 14",
                "256GB",
                LockStatus::Unlocked,
                &[(Grade::A, 330.0), (Grade::B, 240.0)],
                "KT",
            ),
        ]
    }

    fn price_tuples(devices: &[MergedDevice]) -> Vec<(String, String, LockStatus, Prices)> {
        devices
            .iter()
            .map(|d| (d.model.clone(), d.storage.clone(), d.lock_status, d.prices.clone()))
            .collect()
    }

    #[test]
    fn test_merge_takes_max_per_grade() {
        let engine = MergeEngine::new();
        let offers = sample_offers();
        let merged = engine.merge(&offers[..2]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].prices.get(Grade::B), Some(320.0));
        assert_eq!(merged[0].prices.get(Grade::C), Some(200.0));
        assert_eq!(merged[0].prices.len(), 2);
    }

    #[test]
    fn test_merge_grades_from_different_vendors() {
        let engine = MergeEngine::new();
        let merged = engine.merge(&sample_offers());

        let iphone_14 = merged.iter().find(|d| d.model == "iPhone 14").unwrap();
        assert_eq!(iphone_14.prices.get(Grade::A), Some(330.0));
        assert_eq!(iphone_14.prices.get(Grade::B), Some(260.0));
        assert_eq!(iphone_14.prices.get(Grade::D), Some(90.0));
        assert_eq!(iphone_14.vendors["SA"].get(Grade::A), Some(310.0));
        assert_eq!(iphone_14.vendors["KT"].get(Grade::A), Some(330.0));
    }

    #[test]
    fn test_merge_keeps_lock_status_apart() {
        let engine = MergeEngine::new();
        let merged = engine.merge(&sample_offers());

        assert_eq!(merged.len(), 3);
        let locked = merged
            .iter()
            .find(|d| d.lock_status == LockStatus::CarrierLocked)
            .unwrap();
        assert_eq!(locked.prices.get(Grade::B), Some(250.0));
    }

    #[test]
    fn test_merge_order_independent() {
        let engine = MergeEngine::new();
        let offers = sample_offers();

        let forward = engine.merge(&offers);
        let reversed: Vec<DeviceOffer> = offers.iter().rev().cloned().collect();
        let backward = engine.merge(&reversed);
        let rotated: Vec<DeviceOffer> =
            offers[2..].iter().chain(offers[..2].iter()).cloned().collect();
        let rotated = engine.merge(&rotated);

        assert_eq!(forward, backward);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn test_merge_grouping_is_associative() {
        let engine = MergeEngine::new();
        let offers = sample_offers();

        // (A + B) + C versus A + (B + C), re-expressed as offers
        let left: Vec<DeviceOffer> = engine
            .merge(&offers[..3])
            .iter()
            .map(as_offer)
            .chain(offers[3..].iter().cloned())
            .collect();
        let right: Vec<DeviceOffer> = offers[..1]
            .iter()
            .cloned()
            .chain(engine.merge(&offers[1..]).iter().map(as_offer))
            .collect();

        let all = MergeEngine::without_vendors();
        assert_eq!(price_tuples(&all.merge(&left)), price_tuples(&all.merge(&offers)));
        assert_eq!(price_tuples(&all.merge(&right)), price_tuples(&all.merge(&offers)));
    }

    #[test]
    fn test_merge_with_itself_is_idempotent() {
        let engine = MergeEngine::new();
        let offers = sample_offers();

        let once = engine.merge(&offers);
        let doubled: Vec<DeviceOffer> = offers.iter().chain(offers.iter()).cloned().collect();
        let twice = engine.merge(&doubled);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_skips_empty_price_sets() {
        let engine = MergeEngine::new();
        let empty = create_test_offer("iPhone 11", "64GB", LockStatus::Unlocked, &[], "SA");
        let zero = create_test_offer(
            "iPhone 11",
            "128GB",
            LockStatus::Unlocked,
            &[(Grade::B, 0.0), (Grade::C, -5.0)],
            "SA",
        );

        let merged = engine.merge([&empty, &zero]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_sort_by_numeric_storage() {
        let engine = MergeEngine::new();
        let offers = vec![
            create_test_offer(
                "iPhone 15",
                "256GB",
                LockStatus::Unlocked,
                &[(Grade::B, 400.0)],
                "SA",
            ),
            create_test_offer(
                "iPhone 15",
                "128GB",
                LockStatus::Unlocked,
                &[(Grade::B, 300.0)],
                "SA",
            ),
            create_test_offer("iPhone 15", "1TB", LockStatus::Unlocked, &[(Grade::B, 600.0)], "SA"),
            create_test_offer(
                "iPhone 15",
                "512GB",
                LockStatus::Unlocked,
                &[(Grade::B, 500.0)],
                "SA",
            ),
        ];

        let merged = engine.merge(&offers);
        let storages: Vec<&str> = merged.iter().map(|d| d.storage.as_str()).collect();
        assert_eq!(storages, vec!["128GB", "256GB", "512GB", "1TB"]);
    }

    #[test]
    fn test_sort_lock_status_lexicographic() {
        let engine = MergeEngine::new();
        let merged = engine.merge(&sample_offers());

        let iphone_15: Vec<LockStatus> = merged
            .iter()
            .filter(|d| d.model == "iPhone 15")
            .map(|d| d.lock_status)
            .collect();
        assert_eq!(iphone_15, vec![LockStatus::CarrierLocked, LockStatus::Unlocked]);
        assert_eq!(merged[0].model, "iPhone 14");
    }

    #[test]
    fn test_without_vendors_drops_breakdown() {
        let engine = MergeEngine::without_vendors();
        let merged = engine.merge(&sample_offers());
        assert!(merged.iter().all(|d| d.vendors.is_empty()));
    }

    #[test]
    fn test_overlapping_keys() {
        let engine = MergeEngine::new();
        assert_eq!(engine.overlapping_keys(&sample_offers()), 2);
    }
}
