use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::errors::DomainError;
use super::voucher::{Voucher, VoucherKind, VoucherStatus};

/// Dashboard tab. Each tab narrows by status before the other filters apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    All,
    Pending,
    /// Approved or rejected.
    Processed,
    Approved,
    Rejected,
}

impl Tab {
    pub fn admits(self, status: VoucherStatus) -> bool {
        match self {
            Tab::All => true,
            Tab::Pending => status == VoucherStatus::Pending,
            Tab::Processed => status.is_terminal(),
            Tab::Approved => status == VoucherStatus::Approved,
            Tab::Rejected => status == VoucherStatus::Rejected,
        }
    }
}

impl FromStr for Tab {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Tab::All),
            "pending" => Ok(Tab::Pending),
            "processed" => Ok(Tab::Processed),
            "approved" => Ok(Tab::Approved),
            "rejected" => Ok(Tab::Rejected),
            other => Err(DomainError::InvalidInput(format!("unknown tab '{other}'"))),
        }
    }
}

/// All predicates are ANDed. The default value matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoucherFilter {
    pub tab: Tab,
    pub status: Option<VoucherStatus>,
    pub kind: Option<VoucherKind>,
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl VoucherFilter {
    pub fn matches(&self, voucher: &Voucher) -> bool {
        self.tab.admits(voucher.status())
            && self.status.map_or(true, |s| s == voucher.status())
            && self.kind.map_or(true, |k| k == voucher.header.kind)
            && self.date_from.map_or(true, |from| voucher.header.date >= from)
            && self.date_to.map_or(true, |to| voucher.header.date <= to)
            && self.matches_search(voucher)
    }

    fn matches_search(&self, voucher: &Voucher) -> bool {
        let Some(needle) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            return true;
        };
        let needle = needle.to_lowercase();
        [
            voucher.code.as_str(),
            voucher.header.requester.as_str(),
            voucher.header.source.as_str(),
            voucher.header.destination.as_str(),
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    pub fn apply<'a>(&self, vouchers: impl IntoIterator<Item = &'a Voucher>) -> Vec<Voucher> {
        vouchers
            .into_iter()
            .filter(|v| self.matches(v))
            .cloned()
            .collect()
    }
}
