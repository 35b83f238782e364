pub mod report;

pub use report::{save_monte_carlo_json, save_report_json, ExportError};
