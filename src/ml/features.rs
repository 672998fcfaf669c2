use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use metrics::counter;

use crate::errors::ServiceError;
use crate::ml::encoder::CategoryEncoder;

/// Number of features fed to the forecast model, in fixed order:
/// product_id, base_price, category_encoded, day_of_week, month, lag_1,
/// lag_7, rolling_mean_3.
pub const FEATURE_DIM: usize = 8;

const LAG_SHORT: usize = 1;
const LAG_LONG: usize = 7;
const ROLLING_WINDOW: usize = 3;

/// One (product, calendar day) row with at least one sale. Derived, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyAggregate {
    pub product_id: i64,
    pub date: NaiveDate,
    pub category: String,
    pub base_price: f64,
    pub quantity: i64,
}

/// A training row: one feature vector plus the observed quantity it should
/// predict.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub features: [f64; FEATURE_DIM],
    pub target: f64,
}

/// Groups raw sales into per-day aggregates for one product, ordered by date
/// ascending. Dates are strictly increasing by construction.
pub fn aggregate_daily(
    product_id: i64,
    category: &str,
    base_price: f64,
    sales: impl IntoIterator<Item = (NaiveDate, i64)>,
) -> Vec<DailyAggregate> {
    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for (date, quantity) in sales {
        *per_day.entry(date).or_insert(0) += quantity;
    }

    per_day
        .into_iter()
        .map(|(date, quantity)| DailyAggregate {
            product_id,
            date,
            category: category.to_string(),
            base_price,
            quantity,
        })
        .collect()
}

fn check_strictly_increasing(history: &[DailyAggregate]) -> Result<(), ServiceError> {
    for pair in history.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(ServiceError::ValidationError(format!(
                "history for product {} is not strictly increasing at {}",
                pair[1].product_id, pair[1].date
            )));
        }
    }
    Ok(())
}

fn rolling_mean(quantities: &[i64], upto: usize) -> f64 {
    let start = (upto + 1).saturating_sub(ROLLING_WINDOW);
    let window = &quantities[start..=upto];
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<i64>() as f64 / window.len() as f64
}

/// Builds training rows from one product's full ordered history.
///
/// Rows missing either lag (the first `LAG_LONG` observations) are dropped,
/// matching how the trainer discards rows without enough prior signal.
/// Calendar features come from each row's own date, never the wall clock.
pub fn training_rows(
    history: &[DailyAggregate],
    encoder: &CategoryEncoder,
) -> Result<Vec<FeatureRow>, ServiceError> {
    check_strictly_increasing(history)?;

    let quantities: Vec<i64> = history.iter().map(|a| a.quantity).collect();
    let mut rows = Vec::new();

    for (i, agg) in history.iter().enumerate() {
        if i < LAG_LONG {
            continue;
        }

        let features = [
            agg.product_id as f64,
            agg.base_price,
            encoder.encode(&agg.category),
            f64::from(agg.date.weekday().num_days_from_monday()),
            f64::from(agg.date.month()),
            quantities[i - LAG_SHORT] as f64,
            quantities[i - LAG_LONG] as f64,
            rolling_mean(&quantities, i),
        ];
        rows.push(FeatureRow {
            features,
            target: agg.quantity as f64,
        });
    }

    Ok(rows)
}

/// Builds the single inference vector for "the next period after the last
/// observation" of one product.
///
/// Calendar features derive from the reference date — the date of the most
/// recent known aggregate — so predictions stay reproducible against a frozen
/// dataset. With fewer than `LAG_LONG` points, lag_7 falls back to the mean
/// of available quantities (counted, not an error). Returns `None` on empty
/// history; the caller short-circuits to a zero-demand result without a
/// model call.
pub fn inference_vector(
    history: &[DailyAggregate],
    encoder: &CategoryEncoder,
    price_override: Option<f64>,
) -> Result<Option<[f64; FEATURE_DIM]>, ServiceError> {
    check_strictly_increasing(history)?;

    let last = match history.last() {
        Some(last) => last,
        None => return Ok(None),
    };

    let quantities: Vec<i64> = history.iter().map(|a| a.quantity).collect();
    let n = quantities.len();
    let mean_quantity = quantities.iter().sum::<i64>() as f64 / n as f64;

    let lag_1 = quantities[n - LAG_SHORT] as f64;
    let lag_7 = if n >= LAG_LONG {
        quantities[n - LAG_LONG] as f64
    } else {
        counter!("optistock_ml_lag_backfill_total", 1);
        mean_quantity
    };
    let rolling = rolling_mean(&quantities, n - 1);

    let reference_date = last.date;
    let features = [
        last.product_id as f64,
        price_override.unwrap_or(last.base_price),
        encoder.encode(&last.category),
        f64::from(reference_date.weekday().num_days_from_monday()),
        f64::from(reference_date.month()),
        lag_1,
        lag_7,
        rolling,
    ];

    Ok(Some(features))
}
