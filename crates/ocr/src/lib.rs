// Compiled regex cache shared by the text parsers.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod bill;
pub mod pipeline;
pub mod preprocess;
pub mod receipt;
pub mod recognizer;
pub mod types;

pub use bill::{correct_confusions, extract_units, BillError};
pub use pipeline::{remove_best_effort, BillPipeline, PipelineError, ReceiptPipeline, ScratchDir};
pub use preprocess::{encode_png, prepare_bill, prepare_receipt, PreprocessError};
pub use receipt::parse_receipt;
pub use recognizer::{extract_text, MockRecognizer, NoEngine, OcrBackend, OcrError};
pub use types::{BillOutcome, BillResponse, MANUAL_ENTRY_MESSAGE};
