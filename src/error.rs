use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid schema SQL: {0}")]
    InvalidSchema(String),

    #[error("Refusing to delete tables {0:?}")]
    DeletionRefused(Vec<String>),

    #[error("Refusing to remove columns {columns:?} from table {table}")]
    ColumnDeletionRefused { table: String, columns: Vec<String> },

    #[error("Would fail foreign_key_check: {0}")]
    ForeignKeyViolation(String),

    #[error("Unsafe pragma name: {0}")]
    UnsafePragma(String),

    #[error("{0}")]
    ExecutionFailure(#[from] sqlx::Error),
}
