use taleforge_protocol::ErrorKind;

/// Errors that can occur in the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert or update would duplicate a unique column.
    #[error("unique constraint violated on {table}.{column}")]
    UniqueViolation {
        table: &'static str,
        column: &'static str,
    },

    /// An insert references a row that doesn't exist.
    #[error("foreign key violated on {table}.{column}")]
    ForeignKeyViolation {
        table: &'static str,
        column: &'static str,
    },

    /// The backend could not be reached or rejected the round trip.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` if this is a unique violation on `table.column`.
    pub fn is_unique_violation_on(&self, table: &str, column: &str) -> bool {
        matches!(
            self,
            Self::UniqueViolation { table: t, column: c } if *t == table && *c == column
        )
    }

    /// Store failures are never the caller's fault.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InternalError
    }
}
