use std::future::Future;

use super::errors::{DomainError, NotifyError};
use super::voucher::{Voucher, VoucherLine};

/// Persistence for the header and line tables.
///
/// Every method is one remote round trip. Nothing here spans both tables, so
/// callers writing a header and its lines must order the calls themselves and
/// live with a partial write when the second call fails.
pub trait VoucherRepository: Send + Sync + 'static {
    fn load_all(
        &self,
    ) -> impl Future<Output = Result<(Vec<Voucher>, Vec<VoucherLine>), DomainError>> + Send;

    fn add_vouchers(
        &self,
        vouchers: &[Voucher],
    ) -> impl Future<Output = Result<(), DomainError>> + Send;

    /// Overwrites every header column of the voucher identified by `voucher.code`.
    fn edit_voucher(&self, voucher: &Voucher) -> impl Future<Output = Result<(), DomainError>> + Send;

    fn delete_vouchers(
        &self,
        codes: &[String],
    ) -> impl Future<Output = Result<(), DomainError>> + Send;

    fn add_lines(&self, lines: &[VoucherLine])
        -> impl Future<Output = Result<(), DomainError>> + Send;

    fn delete_lines(
        &self,
        line_codes: &[String],
    ) -> impl Future<Output = Result<(), DomainError>> + Send;
}

/// Chat-bot style message sink used after approve/reject.
pub trait Notifier: Send + Sync + 'static {
    fn send_message(&self, text: String) -> impl Future<Output = Result<(), NotifyError>> + Send;
}
