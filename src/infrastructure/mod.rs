pub mod backend;
pub mod chat_notifier;
pub mod http_table;
pub mod memory_table;
pub mod rows;
pub mod table_client;
pub mod voucher_repo;

pub use backend::TableBackend;
pub use chat_notifier::{ChatCredentials, ChatNotifier};
pub use http_table::HttpTableClient;
pub use memory_table::MemoryTableClient;
pub use table_client::{Row, TableAction, TableClient};
pub use voucher_repo::{TableNames, TableVoucherRepository};
