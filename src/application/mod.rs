pub mod optimistic;
pub mod store;
pub mod voucher_service;

pub use store::VoucherStore;
pub use voucher_service::{ImportedLine, VoucherDetail, VoucherDraft, VoucherService};
