pub mod metadata;
pub mod naming;
pub mod workbook;

pub use metadata::{AnalysisCounts, RunMetadata, hash_total};
pub use naming::{OutputPaths, analysis_file_name, extracted_file_name, sanitize_client_name};
pub use workbook::{OutputError, write_analysis, write_extracted};
