use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ServiceError;
use crate::ml::scaler::StandardScaler;

/// Clusters in the customer partition; VIP / Regular / Budget.
pub const SEGMENT_CLUSTERS: usize = 3;

/// Recency/Frequency/Monetary summary of one customer's purchase history.
/// Defined only for customers with at least one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmVector {
    pub customer_id: i64,
    /// Days between the reference date and the customer's most recent
    /// purchase
    pub recency: i64,
    /// Transaction count
    pub frequency: i64,
    /// Sum of transaction amounts
    pub monetary: f64,
}

impl RfmVector {
    fn as_features(&self) -> [f64; 3] {
        [self.recency as f64, self.frequency as f64, self.monetary]
    }
}

/// Customer value segment. The durable semantic is the segment name, not the
/// underlying cluster id, which may permute between training runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum Segment {
    #[serde(rename = "VIP")]
    Vip,
    Regular,
    Budget,
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Vip => write!(f, "VIP"),
            Segment::Regular => write!(f, "Regular"),
            Segment::Budget => write!(f, "Budget"),
        }
    }
}

/// Builds training RFM vectors for every customer with history.
///
/// The reference date is the day after the most recent transaction in the
/// dataset, so the most recently active customers get recency 1.
pub fn rfm_for_training(
    purchases: &[(i64, DateTime<Utc>, f64)],
) -> Result<Vec<RfmVector>, ServiceError> {
    let snapshot = purchases
        .iter()
        .map(|(_, at, _)| *at)
        .max()
        .ok_or_else(|| {
            ServiceError::InsufficientData("no transactions to segment".to_string())
        })?
        + Duration::days(1);

    let mut per_customer: BTreeMap<i64, (DateTime<Utc>, i64, f64)> = BTreeMap::new();
    for (customer_id, at, amount) in purchases {
        per_customer
            .entry(*customer_id)
            .and_modify(|(last, count, total)| {
                *last = (*last).max(*at);
                *count += 1;
                *total += amount;
            })
            .or_insert((*at, 1, *amount));
    }

    Ok(per_customer
        .into_iter()
        .map(|(customer_id, (last, frequency, monetary))| RfmVector {
            customer_id,
            recency: (snapshot - last).num_days(),
            frequency,
            monetary,
        })
        .collect())
}

/// Builds the inference-time RFM vector for one customer.
///
/// Recency convention: anchored at the customer's own most recent purchase,
/// i.e. a queried customer is treated as current as of their last activity
/// and recency is 0. (The wall-clock alternative was rejected: it makes
/// segmentation irreproducible against a frozen dataset.) Returns `None` for
/// an empty history; segmentation is undefined without transactions.
pub fn rfm_for_inference(customer_id: i64, purchases: &[(DateTime<Utc>, f64)]) -> Option<RfmVector> {
    if purchases.is_empty() {
        return None;
    }

    Some(RfmVector {
        customer_id,
        recency: 0,
        frequency: purchases.len() as i64,
        monetary: purchases.iter().map(|(_, amount)| amount).sum(),
    })
}

/// K-means model, its paired scaler, and the cluster interpretation metadata
/// as one versioned artifact, hot-swapped as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationArtifact {
    pub kmeans: KMeans<f64, L2Dist>,
    pub scaler: StandardScaler,
    /// Cluster id with the highest mean raw monetary value at training time
    pub vip_cluster: usize,
    pub trained_at: DateTime<Utc>,
    pub customers: usize,
}

impl SegmentationArtifact {
    fn nearest_cluster(&self, rfm: &RfmVector) -> Result<usize, ServiceError> {
        let scaled = self.scaler.transform_row(&rfm.as_features());
        let records = Array2::from_shape_vec((1, scaled.len()), scaled)
            .map_err(|e| ServiceError::InternalError(format!("bad rfm shape: {}", e)))?;
        let dataset = DatasetBase::from(records);
        let assignments = self.kmeans.predict(&dataset);
        assignments
            .first()
            .copied()
            .ok_or_else(|| ServiceError::InternalError("empty cluster prediction".to_string()))
    }

    /// Maps a customer's RFM vector to a segment name. The budget threshold
    /// applies to raw (unscaled) monetary value and splits the two non-VIP
    /// clusters into distinguishable labels.
    pub fn classify(
        &self,
        rfm: &RfmVector,
        budget_threshold: f64,
    ) -> Result<Segment, ServiceError> {
        let cluster = self.nearest_cluster(rfm)?;
        if cluster == self.vip_cluster {
            Ok(Segment::Vip)
        } else if rfm.monetary < budget_threshold {
            Ok(Segment::Budget)
        } else {
            Ok(Segment::Regular)
        }
    }
}

/// Fits the scaler and k-means over training RFM vectors and tags the
/// highest-spend cluster as VIP.
pub fn train_segmentation(rfm: &[RfmVector]) -> Result<SegmentationArtifact, ServiceError> {
    if rfm.len() < SEGMENT_CLUSTERS {
        return Err(ServiceError::InsufficientData(format!(
            "need at least {} customers with history, have {}",
            SEGMENT_CLUSTERS,
            rfm.len()
        )));
    }

    let flat: Vec<f64> = rfm.iter().flat_map(|v| v.as_features()).collect();
    let records = Array2::from_shape_vec((rfm.len(), 3), flat)
        .map_err(|e| ServiceError::InternalError(format!("bad rfm matrix: {}", e)))?;

    let scaler = StandardScaler::fit(&records);
    let scaled = scaler.transform(&records);

    let dataset = DatasetBase::from(scaled);
    let kmeans: KMeans<f64, L2Dist> = KMeans::params(SEGMENT_CLUSTERS)
        .fit(&dataset)
        .map_err(|e| ServiceError::InsufficientData(format!("k-means fit failed: {}", e)))?;

    // Interpret clusters on raw monetary value; ids are arbitrary per run.
    let assignments = kmeans.predict(&dataset);
    let mut totals = vec![(0.0f64, 0usize); SEGMENT_CLUSTERS];
    for (vector, &cluster) in rfm.iter().zip(assignments.iter()) {
        totals[cluster].0 += vector.monetary;
        totals[cluster].1 += 1;
    }

    let vip_cluster = totals
        .iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .max_by(|(_, (sum_a, n_a)), (_, (sum_b, n_b))| {
            let mean_a = sum_a / *n_a as f64;
            let mean_b = sum_b / *n_b as f64;
            mean_a
                .partial_cmp(&mean_b)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(cluster, _)| cluster)
        .ok_or_else(|| ServiceError::InsufficientData("no populated clusters".to_string()))?;

    info!(
        customers = rfm.len(),
        vip_cluster, "segmentation model trained"
    );

    Ok(SegmentationArtifact {
        kmeans,
        scaler,
        vip_cluster,
        trained_at: Utc::now(),
        customers: rfm.len(),
    })
}
