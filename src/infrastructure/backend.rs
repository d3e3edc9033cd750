use std::sync::Arc;

use crate::domain::errors::DomainError;

use super::http_table::HttpTableClient;
use super::memory_table::MemoryTableClient;
use super::table_client::{Row, TableAction, TableClient};

/// The table service picked at start-up.
pub enum TableBackend {
    Remote(HttpTableClient),
    Memory(Arc<MemoryTableClient>),
}

impl TableClient for TableBackend {
    async fn request(
        &self,
        table: &str,
        action: TableAction,
        rows: Vec<Row>,
    ) -> Result<Vec<Row>, DomainError> {
        match self {
            TableBackend::Remote(client) => client.request(table, action, rows).await,
            TableBackend::Memory(client) => client.request(table, action, rows).await,
        }
    }
}
