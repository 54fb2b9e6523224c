use carbon_core::TariffError;
use thiserror::Error;

/// Common OCR misreads on seven-segment style digits, applied in this order.
pub const CONFUSIONS: [(&str, &str); 5] = [("O", "0"), ("o", "0"), ("l", "1"), ("I", "1"), ("g", "9")];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BillError {
    #[error("No meter reading found in text '{0}'")]
    UnitsNotDetected(String),
    #[error(transparent)]
    OutOfRange(#[from] TariffError),
}

impl BillError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            BillError::UnitsNotDetected(_) => "units_not_detected",
            BillError::OutOfRange(_) => "units_out_of_range",
        }
    }
}

// ASCII digits only; `f64::from_str` rejects other numerals.
re!(re_reading, r"[0-9]+\.?[0-9]*");

/// One full replace pass per rule, in [`CONFUSIONS`] order.
pub fn correct_confusions(text: &str) -> String {
    CONFUSIONS
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// First numeral in the corrected text, as consumed units.
pub fn extract_units(text: &str) -> Result<f64, BillError> {
    let corrected = correct_confusions(text);
    tracing::debug!(raw = %text, %corrected, "Correcting meter text");
    re_reading()
        .find(&corrected)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or(BillError::UnitsNotDetected(corrected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusions_are_corrected() {
        assert_eq!(correct_confusions("l2O.5"), "120.5");
        assert_eq!(correct_confusions("Ig8o"), "1980");
    }

    #[test]
    fn corrections_are_case_sensitive() {
        // No rule for 'L' or 'G'.
        assert_eq!(correct_confusions("LG"), "LG");
    }

    #[test]
    fn units_from_confused_reading() {
        assert_eq!(extract_units("l2O.5"), Ok(120.5));
    }

    #[test]
    fn first_numeral_wins() {
        assert_eq!(extract_units("kWh 0342 prev 0298"), Ok(342.0));
    }

    #[test]
    fn trailing_dot_is_accepted() {
        assert_eq!(extract_units("units 87."), Ok(87.0));
    }

    #[test]
    fn non_ascii_digits_are_skipped() {
        // Arabic-Indic digits ahead of the real reading.
        assert_eq!(extract_units("\u{0663}\u{0664} 87"), Ok(87.0));
    }

    #[test]
    fn no_digits_is_not_detected() {
        let err = extract_units("METER READS").unwrap_err();
        assert_eq!(err.code(), "units_not_detected");
        assert!(extract_units("").is_err());
    }
}
