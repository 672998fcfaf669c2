use std::collections::BTreeMap;

use metrics::counter;
use serde::{Deserialize, Serialize};

/// Maps categorical product-category labels to numeric codes.
///
/// Codes are assigned in sorted label order and are stable only within the
/// lifetime of one trained encoder; a retrain may reassign every code, which
/// is why the encoder travels inside the forecast artifact rather than on its
/// own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryEncoder {
    codes: BTreeMap<String, u32>,
}

impl CategoryEncoder {
    /// Fits the encoder over the given labels. Duplicates are fine; codes are
    /// assigned by sorted unique label.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: std::collections::BTreeSet<String> = labels
            .into_iter()
            .map(|label| label.as_ref().to_string())
            .collect();
        let codes = unique
            .into_iter()
            .enumerate()
            .map(|(idx, label)| (label, idx as u32))
            .collect();
        Self { codes }
    }

    /// Encodes a category, falling back to 0 for labels never seen during
    /// training. The fallback is degraded but non-fatal and is observable via
    /// the `optistock_ml_unseen_category_total` counter.
    pub fn encode(&self, category: &str) -> f64 {
        match self.codes.get(category) {
            Some(code) => f64::from(*code),
            None => {
                counter!("optistock_ml_unseen_category_total", 1);
                0.0
            }
        }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.codes.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_sorted_label_order() {
        let enc = CategoryEncoder::fit(["Snacks", "Beverages", "Dairy", "Beverages"]);
        assert_eq!(enc.len(), 3);
        assert_eq!(enc.encode("Beverages"), 0.0);
        assert_eq!(enc.encode("Dairy"), 1.0);
        assert_eq!(enc.encode("Snacks"), 2.0);
    }

    #[test]
    fn unseen_label_encodes_to_zero() {
        let enc = CategoryEncoder::fit(["Dairy"]);
        assert_eq!(enc.encode("Electronics"), 0.0);
        assert!(!enc.contains("Electronics"));
    }

    #[test]
    fn roundtrips_through_serde() {
        let enc = CategoryEncoder::fit(["A", "B"]);
        let blob = serde_json::to_vec(&enc).unwrap();
        let back: CategoryEncoder = serde_json::from_slice(&blob).unwrap();
        assert_eq!(back.encode("B"), enc.encode("B"));
    }
}
