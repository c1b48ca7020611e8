use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("unsupported input format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to read workbook {}: {message}", .path.display())]
    Workbook { path: PathBuf, message: String },

    #[error("sheet '{sheet}' not found in {}", .path.display())]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("required column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },
}
