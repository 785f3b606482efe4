use thiserror::Error;

/// Error taxonomy for the workflow interpreter: driver-level failures
/// (`LaunchError`/`NavigationError`/`ElementNotFound`/`JsError`/
/// `ScreenshotError`/`CdpError`/`IoError`) alongside the interpreter's own
/// failure modes (config, selector, assembly, and row-context errors).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    #[error("Navigation failed: {0}")]
    NavigationError(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Index {index} out of range (0..{count}) for: {selector}")]
    IndexOutOfRange {
        selector: String,
        index: usize,
        count: usize,
    },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotError(String),

    #[error("CDP error: {0}")]
    CdpError(#[from] chromiumoxide::error::CdpError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing or malformed step field.
    #[error("Step config error: {0}")]
    ConfigError(String),

    /// Spreadsheet read failure beyond plain IO.
    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(String),

    /// A fragment file is not a JSON array, or is unparseable JSON
    ///.
    #[error("Workflow assembly error: {0}")]
    AssemblerError(String),

    /// A step named an unsupported or unknown `type`.
    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    /// `write_excel` used outside a `group_excel` iteration.
    #[error("{0} used outside of a group_excel iteration")]
    NoRowContext(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// `true` for the selector-resolution failures (no matches / index out
    /// of range), as distinct from generic driver failures.
    pub fn is_selector_error(&self) -> bool {
        matches!(
            self,
            Error::ElementNotFound(_) | Error::IndexOutOfRange { .. }
        )
    }
}
