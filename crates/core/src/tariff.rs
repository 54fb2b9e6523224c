use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TariffError {
    #[error("Value {0} cannot be billed")]
    Unrepresentable(f64),
    #[error("Bill for {0} units overflows")]
    Overflow(f64),
}

/// Electricity bill derived from a single meter reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub units: f64,
    pub bill_amount: f64,
    pub co2_emissions: f64,
}

/// One consumption band. `size: None` is the open-ended final band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub size: Option<f64>,
    pub rate: f64,
}

/// Tiered tariff plus the grid carbon intensity used for the CO2 estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tariff {
    pub fixed_charge: f64,
    pub bands: Vec<Band>,
    /// kg CO2 per unit (kWh).
    pub carbon_intensity: f64,
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            fixed_charge: 20.0,
            bands: vec![
                Band { size: Some(200.0), rate: 3.0 },
                Band { size: Some(200.0), rate: 4.5 },
                Band { size: Some(400.0), rate: 6.5 },
                Band { size: Some(400.0), rate: 7.0 },
                Band { size: None, rate: 8.0 },
            ],
            carbon_intensity: 0.82,
        }
    }
}

fn dec(v: f64) -> Result<Decimal, TariffError> {
    Decimal::from_f64(v).ok_or(TariffError::Unrepresentable(v))
}

fn to_f64_2dp(v: Decimal) -> f64 {
    v.round_dp(2).to_f64().unwrap_or(0.0)
}

impl Tariff {
    /// Energy charge plus fixed charge, before rounding.
    fn amount(&self, units: f64, consumed: Decimal) -> Result<Decimal, TariffError> {
        let mut remaining = consumed;
        let mut total = dec(self.fixed_charge)?;
        for band in &self.bands {
            if remaining <= Decimal::ZERO {
                break;
            }
            let used = match band.size {
                Some(size) => remaining.min(dec(size)?),
                None => remaining,
            };
            total = used
                .checked_mul(dec(band.rate)?)
                .and_then(|charge| total.checked_add(charge))
                .ok_or(TariffError::Overflow(units))?;
            remaining -= used;
        }
        Ok(total)
    }

    /// Bill and CO2 for `units`. Negative or non-finite readings consume nothing.
    pub fn reading(&self, units: f64) -> Result<MeterReading, TariffError> {
        let consumed = if units.is_finite() && units > 0.0 { dec(units)? } else { Decimal::ZERO };
        let amount = self.amount(units, consumed)?;
        let co2 = consumed
            .checked_mul(dec(self.carbon_intensity)?)
            .ok_or(TariffError::Overflow(units))?;
        Ok(MeterReading {
            units,
            bill_amount: to_f64_2dp(amount),
            co2_emissions: to_f64_2dp(co2),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_two_bands() {
        let r = Tariff::default().reading(250.0).unwrap();
        assert_eq!(r.bill_amount, 845.0);
        assert_eq!(r.co2_emissions, 205.0);
        assert_eq!(r.units, 250.0);
    }

    #[test]
    fn zero_units_is_fixed_charge_only() {
        let r = Tariff::default().reading(0.0).unwrap();
        assert_eq!(r.bill_amount, 20.0);
        assert_eq!(r.co2_emissions, 0.0);
    }

    #[test]
    fn band_edges() {
        let t = Tariff::default();
        assert_eq!(t.reading(200.0).unwrap().bill_amount, 620.0);
        // 600 + 900
        assert_eq!(t.reading(400.0).unwrap().bill_amount, 1520.0);
        // 600 + 900 + 2600 + 2800 + 8 * 200
        assert_eq!(t.reading(1400.0).unwrap().bill_amount, 8520.0);
    }

    #[test]
    fn fractional_units_round_to_cents() {
        let r = Tariff::default().reading(120.5).unwrap();
        assert_eq!(r.bill_amount, 381.5);
        assert_eq!(r.co2_emissions, 98.81);
    }

    #[test]
    fn reading_is_idempotent() {
        let t = Tariff::default();
        assert_eq!(t.reading(987.65).unwrap(), t.reading(987.65).unwrap());
    }

    #[test]
    fn negative_units_consume_nothing() {
        let r = Tariff::default().reading(-5.0).unwrap();
        assert_eq!(r.bill_amount, 20.0);
        assert_eq!(r.co2_emissions, 0.0);
    }

    #[test]
    fn reading_beyond_decimal_range_is_rejected() {
        assert_eq!(
            Tariff::default().reading(1e30),
            Err(TariffError::Unrepresentable(1e30))
        );
    }

    #[test]
    fn reading_that_overflows_the_bill_is_rejected() {
        // Representable, but 8 * 2e28 is not.
        assert_eq!(Tariff::default().reading(2e28), Err(TariffError::Overflow(2e28)));
    }
}
