use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A referenced column does not exist.
    UnknownColumn(String),
    /// Two columns share a name.
    DuplicateColumn(String),
    /// A column's length differs from the others.
    RaggedColumns { column: String, expected: usize, found: usize },
    /// Correlation needs at least two numeric columns.
    InsufficientNumericColumns { found: usize },
    /// Summary statistics need at least one numeric column.
    NoNumericColumns,
    /// An operation was applied to a column of the wrong type.
    TypeMismatch { column: String, expected: String, found: String },
    /// Bad argument (unknown aggregate, negative count, ...).
    InvalidArgument(String),
}

impl EngineError {
    /// Whether this error means "the dataset cannot support the operation"
    /// rather than "the request was malformed".
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::InsufficientNumericColumns { .. } | Self::NoNumericColumns)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColumn(name) => write!(f, "column '{name}' not found"),
            Self::DuplicateColumn(name) => write!(f, "duplicate column name '{name}'"),
            Self::RaggedColumns { column, expected, found } => {
                write!(f, "column '{column}' has {found} values, expected {expected}")
            }
            Self::InsufficientNumericColumns { found } => write!(
                f,
                "correlation needs at least 2 numeric columns, dataset has {found}"
            ),
            Self::NoNumericColumns => write!(f, "dataset has no numeric columns"),
            Self::TypeMismatch { column, expected, found } => {
                write!(f, "column '{column}': expected {expected}, found {found}")
            }
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
