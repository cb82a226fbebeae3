//! Error types for the incarforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for all incarforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Selection errors ---
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    // --- Catalog errors ---
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    // --- Calculator errors ---
    #[error("Calculator error: {0}")]
    Calculator(#[from] CalculatorError),

    // --- Generation errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Export errors ---
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Constraint-engine failures. These indicate a catalog mismatch and must
/// never be swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown parameter section: {0}")]
    UnknownSection(String),

    #[error("Section '{0}' is always included and cannot be toggled")]
    ReservedSection(String),

    #[error("No custom parameter at index {0}")]
    NoSuchCustomParam(usize),
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Catalog fetch failed: {0}")]
    FetchFailed(String),

    #[error("Catalog has no task named '{0}'")]
    UnknownTask(String),

    #[error("Catalog request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid catalog payload: {0}")]
    InvalidPayload(String),
}

/// A derivation call failed. Always non-fatal: the trigger task stays
/// selected and contributes no derived parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalculatorError {
    #[error("Calculator '{calculator}' unavailable: {reason}")]
    Unavailable { calculator: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Generation failed: {cause}")]
    Failed { cause: String },

    #[error("Renderer returned no file content")]
    EmptyResult,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export to {target} failed: {reason}")]
    Failed { target: String, reason: String },

    #[error("Nothing to export, generate the file first")]
    EmptyContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_error_displays_task() {
        let err = Error::Selection(SelectionError::UnknownTask("PBE0".into()));
        assert!(err.to_string().contains("PBE0"));
    }

    #[test]
    fn unknown_category_names_the_input() {
        let err: Error = SelectionError::UnknownCategory("Funtional".into()).into();
        assert_eq!(err.to_string(), "Selection error: Unknown category: Funtional");
    }

    #[test]
    fn catalog_api_error_displays_status() {
        let err = Error::Catalog(CatalogError::Api {
            status_code: 400,
            message: "Invalid task: Foo".into(),
        });
        assert!(err.to_string().contains("400"));
        assert!(err.to_string().contains("Invalid task"));
    }

    #[test]
    fn calculator_error_names_calculator() {
        let err = CalculatorError::Unavailable {
            calculator: "magmom".into(),
            reason: "POSCAR file not found".into(),
        };
        assert!(err.to_string().contains("magmom"));
        assert!(err.to_string().contains("POSCAR"));
    }
}
