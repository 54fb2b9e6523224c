pub mod config;
pub mod emissions;
pub mod tariff;

pub use config::{Config, ConfigError, CropRegion};
pub use emissions::{
    estimate, total_emissions, EmissionResult, EmissionsTable, ParsedItem, TableError, Vocabulary,
};
pub use tariff::{Band, MeterReading, Tariff, TariffError};
