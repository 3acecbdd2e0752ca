use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    /// Date cell or boundary text that carries no usable day.
    #[error("cannot parse date '{value}'")]
    DateParse { value: String },

    /// Boundary day invalid for the resolved month, or weeks that overlap.
    #[error("invalid week boundary: {0}")]
    InvalidWeekBoundary(String),

    /// A mandatory header is absent from a source sheet.
    #[error("sheet '{sheet}': missing required column '{column}'")]
    MissingRequiredColumn { sheet: String, column: String },

    /// None of a source's sheet names exist in an input file.
    #[error("'{file}': no sheet named {candidates}")]
    MissingSourceSheet { file: String, candidates: String },

    /// No sheet of an input file holds the configured label block.
    #[error("'{file}': no label block starting at '{marker}'")]
    MissingBlock { file: String, marker: String },

    /// An output sheet the profile writes to is absent from the template.
    #[error("template has no sheet named '{0}'")]
    MissingTemplateSheet(String),

    /// A mapping rule matched a different number of columns than its operation needs.
    #[error("rule '{label}': {operation} needs {expected} column(s), matched {found}")]
    ConfigurationMismatch {
        label: String,
        operation: &'static str,
        expected: usize,
        found: usize,
    },

    /// TOML parse / deserialization error.
    #[error("profile parse error: {0}")]
    ConfigParse(String),

    /// Profile validation error (bad column letter, empty rule, etc.).
    #[error("profile validation error: {0}")]
    ConfigValidation(String),

    /// Unknown built-in profile name.
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReconError {
    /// Row- and rule-level errors are skipped with a diagnostic; the rest abort the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DateParse { .. } | Self::ConfigurationMismatch { .. })
    }

    /// Errors that fail one source sheet while other sources in the job continue.
    pub fn is_sheet_level(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredColumn { .. }
                | Self::MissingSourceSheet { .. }
                | Self::MissingBlock { .. }
                | Self::Csv(_)
        )
    }
}
