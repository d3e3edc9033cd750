use std::collections::HashSet;

use crate::domain::errors::DomainError;
use crate::domain::ports::VoucherRepository;
use crate::domain::voucher::{Voucher, VoucherLine};

use super::memory_table::MemoryTableClient;
use super::rows::{from_row, key_row, to_row, LineRow, VoucherRow, LINE_KEY, VOUCHER_KEY};
use super::table_client::{Row, TableAction, TableClient};

pub const DEFAULT_VOUCHER_TABLE: &str = "XUAT_NHAP_KHO";
pub const DEFAULT_LINE_TABLE: &str = "XUAT_NHAP_KHO_CHI_TIET";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub vouchers: String,
    pub lines: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            vouchers: DEFAULT_VOUCHER_TABLE.to_string(),
            lines: DEFAULT_LINE_TABLE.to_string(),
        }
    }
}

impl TableNames {
    /// An empty in-memory store with both tables keyed the way the remote ones are.
    pub fn memory_client(&self) -> MemoryTableClient {
        MemoryTableClient::new()
            .with_table(&self.vouchers, VOUCHER_KEY)
            .with_table(&self.lines, LINE_KEY)
    }
}

pub struct TableVoucherRepository<C> {
    client: C,
    tables: TableNames,
}

impl<C: TableClient> TableVoucherRepository<C> {
    pub fn new(client: C, tables: TableNames) -> Self {
        Self { client, tables }
    }

    async fn write(&self, table: &str, action: TableAction, rows: Vec<Row>) -> Result<(), DomainError> {
        if rows.is_empty() {
            return Ok(());
        }
        let count = rows.len();
        self.client.request(table, action, rows).await?;
        log::debug!("{} {} rows on {}", action, count, table);
        Ok(())
    }
}

impl<C: TableClient> VoucherRepository for TableVoucherRepository<C> {
    async fn load_all(&self) -> Result<(Vec<Voucher>, Vec<VoucherLine>), DomainError> {
        let header_rows = self
            .client
            .request(&self.tables.vouchers, TableAction::Find, Vec::new())
            .await?;
        let line_rows = self
            .client
            .request(&self.tables.lines, TableAction::Find, Vec::new())
            .await?;

        let mut vouchers = Vec::with_capacity(header_rows.len());
        for row in header_rows {
            match from_row::<VoucherRow>(row).and_then(VoucherRow::into_domain) {
                Ok(voucher) => vouchers.push(voucher),
                Err(e) => log::warn!("Skipping unreadable voucher row: {}", e),
            }
        }

        let known: HashSet<&str> = vouchers.iter().map(|v| v.code.as_str()).collect();
        let mut lines = Vec::with_capacity(line_rows.len());
        for row in line_rows {
            let line = match from_row::<LineRow>(row) {
                Ok(row) => row.into_domain(),
                Err(e) => {
                    log::warn!("Skipping unreadable line row: {}", e);
                    continue;
                }
            };
            if known.contains(line.voucher_code.as_str()) {
                lines.push(line);
            } else {
                log::warn!(
                    "Skipping line {} whose voucher {} does not exist",
                    line.line_code,
                    line.voucher_code
                );
            }
        }
        Ok((vouchers, lines))
    }

    async fn add_vouchers(&self, vouchers: &[Voucher]) -> Result<(), DomainError> {
        let rows = vouchers
            .iter()
            .map(|v| to_row(&VoucherRow::from_domain(v)))
            .collect::<Result<Vec<_>, _>>()?;
        self.write(&self.tables.vouchers, TableAction::Add, rows).await
    }

    async fn edit_voucher(&self, voucher: &Voucher) -> Result<(), DomainError> {
        let row = to_row(&VoucherRow::from_domain(voucher))?;
        self.write(&self.tables.vouchers, TableAction::Edit, vec![row]).await
    }

    async fn delete_vouchers(&self, codes: &[String]) -> Result<(), DomainError> {
        let rows = codes.iter().map(|c| key_row(VOUCHER_KEY, c)).collect();
        self.write(&self.tables.vouchers, TableAction::Delete, rows).await
    }

    async fn add_lines(&self, lines: &[VoucherLine]) -> Result<(), DomainError> {
        let rows = lines
            .iter()
            .map(|l| to_row(&LineRow::from_domain(l)))
            .collect::<Result<Vec<_>, _>>()?;
        self.write(&self.tables.lines, TableAction::Add, rows).await
    }

    async fn delete_lines(&self, line_codes: &[String]) -> Result<(), DomainError> {
        let rows = line_codes.iter().map(|c| key_row(LINE_KEY, c)).collect();
        self.write(&self.tables.lines, TableAction::Delete, rows).await
    }
}
