pub mod actor;
pub mod errors;
pub mod filter;
pub mod ports;
pub mod voucher;
