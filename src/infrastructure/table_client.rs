use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::domain::errors::DomainError;

/// One table row as the remote service sees it: column name to cell value.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableAction {
    Find,
    Add,
    Edit,
    Delete,
}

impl TableAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TableAction::Find => "Find",
            TableAction::Add => "Add",
            TableAction::Edit => "Edit",
            TableAction::Delete => "Delete",
        }
    }
}

impl fmt::Display for TableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generic table-oriented request against the remote data service.
///
/// `Find` ignores `rows` and returns the whole table. `Add`, `Edit` and
/// `Delete` act on the given rows, which must carry the table's key column,
/// and return the affected rows.
pub trait TableClient: Send + Sync + 'static {
    fn request(
        &self,
        table: &str,
        action: TableAction,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<Vec<Row>, DomainError>> + Send;
}

impl<T: TableClient> TableClient for Arc<T> {
    fn request(
        &self,
        table: &str,
        action: TableAction,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<Vec<Row>, DomainError>> + Send {
        (**self).request(table, action, rows)
    }
}
