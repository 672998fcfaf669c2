use serde::{Deserialize, Serialize};

/// Default demand cushion in units, added on top of predicted demand when
/// sizing a reorder.
pub const DEFAULT_SAFETY_BUFFER: i64 = 5;

/// Stock health relative to predicted demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub enum StockStatus {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "OK")]
    Ok,
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockStatus::Critical => write!(f, "CRITICAL"),
            StockStatus::Low => write!(f, "LOW"),
            StockStatus::Ok => write!(f, "OK"),
        }
    }
}

/// Outcome of one stock assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAssessment {
    pub status: StockStatus,
    /// Units to order now; zero unless stock is below demand plus buffer
    pub recommended_order: i64,
}

/// Compares current stock against predicted demand.
///
/// CRITICAL when stock cannot cover demand alone, LOW when it covers demand
/// but not demand plus the buffer, OK otherwise. The recommendation tops
/// stock back up to demand plus buffer and is zero for OK.
pub fn assess_stock(current_stock: i64, predicted_demand: i64, safety_buffer: i64) -> StockAssessment {
    let target = predicted_demand + safety_buffer;
    if current_stock < predicted_demand {
        StockAssessment {
            status: StockStatus::Critical,
            recommended_order: target - current_stock,
        }
    } else if current_stock < target {
        StockAssessment {
            status: StockStatus::Low,
            recommended_order: target - current_stock,
        }
    } else {
        StockAssessment {
            status: StockStatus::Ok,
            recommended_order: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(3, 5, 5, StockStatus::Critical, 7; "below demand")]
    #[test_case(8, 5, 5, StockStatus::Low, 2; "covers demand but not buffer")]
    #[test_case(12, 5, 5, StockStatus::Ok, 0; "covers demand and buffer")]
    #[test_case(10, 5, 5, StockStatus::Ok, 0; "exactly at target")]
    #[test_case(5, 5, 5, StockStatus::Low, 5; "exactly at demand")]
    #[test_case(0, 0, 5, StockStatus::Low, 5; "zero demand still buffers")]
    #[test_case(0, 0, 0, StockStatus::Ok, 0; "all zero")]
    fn assessment_cases(
        stock: i64,
        demand: i64,
        buffer: i64,
        status: StockStatus,
        order: i64,
    ) {
        let got = assess_stock(stock, demand, buffer);
        assert_eq!(got.status, status);
        assert_eq!(got.recommended_order, order);
    }

    #[test]
    fn recommendation_always_restores_target_when_nonzero() {
        for stock in 0..30 {
            for demand in 0..20 {
                let got = assess_stock(stock, demand, DEFAULT_SAFETY_BUFFER);
                if got.recommended_order > 0 {
                    assert_eq!(
                        stock + got.recommended_order,
                        demand + DEFAULT_SAFETY_BUFFER
                    );
                } else {
                    assert_eq!(got.status, StockStatus::Ok);
                }
            }
        }
    }
}
