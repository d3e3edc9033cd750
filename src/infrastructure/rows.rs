use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::DomainError;
use crate::domain::voucher::{
    LineInput, Voucher, VoucherHeader, VoucherKind, VoucherLine, VoucherStatus,
};

use super::table_client::Row;

pub const VOUCHER_KEY: &str = "MaPhieu";
pub const LINE_KEY: &str = "MaChiTiet";

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const US_DATE_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherRow {
    #[serde(rename = "MaPhieu")]
    pub code: String,
    #[serde(rename = "LoaiPhieu")]
    pub kind: String,
    #[serde(rename = "TrangThai", default)]
    pub status: String,
    #[serde(rename = "NguoiDeXuat", default)]
    pub requester: String,
    #[serde(rename = "ThuKho", default)]
    pub warehouse_keeper: String,
    #[serde(rename = "NoiXuat", default)]
    pub source: String,
    #[serde(rename = "NoiNhan", default)]
    pub destination: String,
    #[serde(rename = "DiaChi", default)]
    pub address: String,
    #[serde(rename = "GhiChu", default)]
    pub notes: String,
    #[serde(rename = "LichSu", default)]
    pub history: String,
    #[serde(rename = "NgayLap", default)]
    pub date: String,
}

impl VoucherRow {
    pub fn from_domain(voucher: &Voucher) -> Self {
        let h = &voucher.header;
        Self {
            code: voucher.code.clone(),
            kind: h.kind.label().to_string(),
            status: voucher.status().label().to_string(),
            requester: h.requester.clone(),
            warehouse_keeper: h.warehouse_keeper.clone(),
            source: h.source.clone(),
            destination: h.destination.clone(),
            address: h.address.clone(),
            notes: h.notes.clone(),
            history: voucher.history().to_string(),
            date: format_date(h.date),
        }
    }

    /// A row with no status yet counts as pending.
    pub fn into_domain(self) -> Result<Voucher, DomainError> {
        let code = self.code;
        let bad = |e: DomainError| DomainError::Remote(format!("voucher row {code}: {e}"));
        let kind = VoucherKind::from_str(&self.kind).map_err(&bad)?;
        let status = if self.status.trim().is_empty() {
            VoucherStatus::Pending
        } else {
            VoucherStatus::from_str(&self.status).map_err(&bad)?
        };
        let date = parse_date(&self.date).map_err(&bad)?;

        let header = VoucherHeader {
            kind,
            requester: self.requester,
            warehouse_keeper: self.warehouse_keeper,
            source: self.source,
            destination: self.destination,
            address: self.address,
            notes: self.notes,
            date,
        };
        Ok(Voucher::restore(code, header, status, self.history))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRow {
    #[serde(rename = "MaChiTiet")]
    pub line_code: String,
    #[serde(rename = "MaPhieu")]
    pub voucher_code: String,
    #[serde(rename = "MaVatTu", default)]
    pub material_code: String,
    #[serde(rename = "TenVatTu", default)]
    pub material_name: String,
    #[serde(rename = "DonViTinh", default)]
    pub unit: String,
    #[serde(rename = "ChatLuong", default)]
    pub quality: String,
    #[serde(rename = "SoLuong", default = "BigDecimal::zero", deserialize_with = "lenient_decimal")]
    pub quantity: BigDecimal,
    #[serde(rename = "DonGia", default = "BigDecimal::zero", deserialize_with = "lenient_decimal")]
    pub unit_price: BigDecimal,
    /// Written for the dashboard's benefit; never read back.
    #[serde(rename = "ThanhTien", default = "BigDecimal::zero", deserialize_with = "lenient_decimal")]
    pub line_total: BigDecimal,
    #[serde(rename = "GhiChu", default)]
    pub notes: String,
}

impl LineRow {
    pub fn from_domain(line: &VoucherLine) -> Self {
        Self {
            line_code: line.line_code.clone(),
            voucher_code: line.voucher_code.clone(),
            material_code: line.material_code.clone(),
            material_name: line.material_name.clone(),
            unit: line.unit.clone(),
            quality: line.quality.clone(),
            quantity: line.quantity().clone(),
            unit_price: line.unit_price().clone(),
            line_total: line.line_total().clone(),
            notes: line.notes.clone(),
        }
    }

    pub fn into_domain(self) -> VoucherLine {
        VoucherLine::new(
            self.line_code,
            self.voucher_code,
            LineInput {
                material_code: self.material_code,
                material_name: self.material_name,
                unit: self.unit,
                quality: self.quality,
                quantity: self.quantity,
                unit_price: self.unit_price,
                notes: self.notes,
            },
        )
    }
}

/// Accepts numbers, numeric strings, blanks and nulls (blank and null read as 0).
fn lenient_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BigDecimal::zero()),
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).map_err(de::Error::custom),
        Value::String(s) if s.trim().is_empty() => Ok(BigDecimal::zero()),
        Value::String(s) => BigDecimal::from_str(s.trim()).map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, DATE_FORMAT) {
        return Ok(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, US_DATE_FORMAT) {
        return Ok(naive.and_utc());
    }
    Err(DomainError::InvalidInput(format!("unrecognised date '{raw}'")))
}

pub fn to_row<T: Serialize>(value: &T) -> Result<Row, DomainError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(DomainError::Internal(format!(
            "expected a row object, got {other}"
        ))),
        Err(e) => Err(DomainError::Internal(e.to_string())),
    }
}

pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, DomainError> {
    serde_json::from_value(Value::Object(row))
        .map_err(|e| DomainError::Remote(format!("unreadable row: {e}")))
}

/// Row holding only the key column, as `Delete` expects.
pub fn key_row(key_column: &str, key: &str) -> Row {
    let mut row = Row::new();
    row.insert(key_column.to_string(), Value::String(key.to_string()));
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::voucher::test_support::{header, line};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn voucher_row_uses_remote_labels() {
        let voucher = Voucher::new_pending("PX1", header(VoucherKind::Outbound));
        let row = to_row(&VoucherRow::from_domain(&voucher)).unwrap();

        assert_eq!(row["MaPhieu"], json!("PX1"));
        assert_eq!(row["LoaiPhieu"], json!("Xuất kho"));
        assert_eq!(row["TrangThai"], json!("Chờ duyệt"));
        assert_eq!(row["NgayLap"], json!("2024-03-01 08:30:00"));
    }

    #[test]
    fn voucher_row_reads_back_into_the_same_voucher() {
        let voucher = Voucher::restore("PN7", header(VoucherKind::Inbound), VoucherStatus::Rejected, "x");
        let row = to_row(&VoucherRow::from_domain(&voucher)).unwrap();
        let back = from_row::<VoucherRow>(row).unwrap().into_domain().unwrap();
        assert_eq!(back, voucher);
    }

    #[test]
    fn missing_status_reads_as_pending_and_extra_columns_are_ignored() {
        let row = match json!({
            "_RowNumber": 4,
            "MaPhieu": "PX2",
            "LoaiPhieu": "Xuất kho",
            "NgayLap": "2024-03-01T08:30:00+07:00"
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let voucher = from_row::<VoucherRow>(row).unwrap().into_domain().unwrap();
        assert_eq!(voucher.status(), VoucherStatus::Pending);
        assert_eq!(voucher.header.date, Utc.with_ymd_and_hms(2024, 3, 1, 1, 30, 0).unwrap());
    }

    #[test]
    fn unknown_kind_is_a_remote_error() {
        let row = VoucherRow {
            kind: "Chuyển kho".to_string(),
            ..VoucherRow::from_domain(&Voucher::new_pending("PX3", header(VoucherKind::Outbound)))
        };
        assert!(matches!(row.into_domain(), Err(DomainError::Remote(_))));
    }

    #[test]
    fn line_row_accepts_numbers_strings_and_blanks() {
        let row = match json!({
            "MaChiTiet": "PX1_A",
            "MaPhieu": "PX1",
            "MaVatTu": "A",
            "SoLuong": 2,
            "DonGia": "1000.5",
            "ThanhTien": ""
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let line = from_row::<LineRow>(row).unwrap().into_domain();
        assert_eq!(line.quantity(), &BigDecimal::from(2));
        assert_eq!(line.line_total(), &BigDecimal::from_str("2001").unwrap());
    }

    #[test]
    fn stored_line_total_is_ignored_on_read() {
        let mut row = LineRow::from_domain(&VoucherLine::new("PX1_A", "PX1", line("A", 3, 10)));
        row.line_total = BigDecimal::from(999);
        assert_eq!(row.into_domain().line_total(), &BigDecimal::from(30));
    }

    #[test]
    fn dates_parse_in_all_accepted_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_date("2024-03-01 08:30:00").unwrap(), expected);
        assert_eq!(parse_date("2024-03-01T08:30:00Z").unwrap(), expected);
        assert_eq!(parse_date("03/01/2024 08:30:00").unwrap(), expected);
        assert!(parse_date("").is_err());
    }

    #[test]
    fn key_row_holds_only_the_key() {
        let row = key_row(LINE_KEY, "PX1_A");
        assert_eq!(row.len(), 1);
        assert_eq!(row["MaChiTiet"], json!("PX1_A"));
    }
}
