pub mod history;

pub use history::{HistoryError, HistoryLog, HistoryRecord, BILLS_LOG, RECEIPTS_LOG};
