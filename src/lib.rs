mod error;
mod inspector;
mod logging;
mod migrator;
mod plan;
mod recreate;
mod sql;
mod validator;

pub use error::MigrationError;
pub use inspector::{Dependency, ObjectKind, SchemaObject, SchemaObjects};
pub use logging::init_tracing;
pub use migrator::migrate;
pub use plan::{ColumnDiff, ObjectDiff};
