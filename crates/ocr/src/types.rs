use carbon_core::MeterReading;
use serde::{Deserialize, Serialize};

use crate::bill::BillError;

pub const MANUAL_ENTRY_MESSAGE: &str =
    "Could not read the meter reading from the bill. Please enter the units manually.";

/// Result of reading one bill photo. A missing numeral is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum BillOutcome {
    Detected(MeterReading),
    NotDetected(BillError),
}

impl BillOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, BillOutcome::Detected(_))
    }

    pub fn to_response(&self) -> BillResponse {
        match self {
            BillOutcome::Detected(r) => BillResponse::Success {
                success: true,
                units: r.units,
                bill_amount: r.bill_amount,
                co2_emissions: r.co2_emissions,
            },
            BillOutcome::NotDetected(e) => BillResponse::Failure {
                success: false,
                error: e.code().to_string(),
                message: MANUAL_ENTRY_MESSAGE.to_string(),
            },
        }
    }
}

/// Wire shape of a bill result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BillResponse {
    Success {
        success: bool,
        units: f64,
        bill_amount: f64,
        co2_emissions: f64,
    },
    Failure {
        success: bool,
        error: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detected_serializes_flat() {
        let outcome = BillOutcome::Detected(MeterReading {
            units: 250.0,
            bill_amount: 845.0,
            co2_emissions: 205.0,
        });
        let json = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "units": 250.0,
                "bill_amount": 845.0,
                "co2_emissions": 205.0
            })
        );
    }

    #[test]
    fn not_detected_carries_error_code() {
        let outcome = BillOutcome::NotDetected(BillError::UnitsNotDetected(String::new()));
        assert!(!outcome.is_detected());
        assert_eq!(outcome.clone(), outcome);
        let json = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "units_not_detected");
        assert_eq!(json["message"], MANUAL_ENTRY_MESSAGE);
    }

    #[test]
    fn response_reads_back_from_json() {
        let raw = r#"{"success":false,"error":"units_not_detected","message":"x"}"#;
        let parsed: BillResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed, BillResponse::Failure { .. }));
    }
}
