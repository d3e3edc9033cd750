use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};

use super::actor::Actor;
use super::errors::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoucherKind {
    Inbound,
    Outbound,
}

impl VoucherKind {
    /// Label stored in the remote table and shown in the dashboard.
    pub fn label(self) -> &'static str {
        match self {
            VoucherKind::Inbound => "Nhập kho",
            VoucherKind::Outbound => "Xuất kho",
        }
    }

    pub fn code_prefix(self) -> &'static str {
        match self {
            VoucherKind::Inbound => "PN",
            VoucherKind::Outbound => "PX",
        }
    }
}

impl fmt::Display for VoucherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoucherKind::Inbound => f.write_str("inbound"),
            VoucherKind::Outbound => f.write_str("outbound"),
        }
    }
}

impl FromStr for VoucherKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_lowercase().as_str() {
            "inbound" | "nhập kho" | "nhập" => Ok(VoucherKind::Inbound),
            "outbound" | "xuất kho" | "xuất" => Ok(VoucherKind::Outbound),
            _ => Err(DomainError::InvalidInput(format!(
                "unknown voucher kind '{value}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoucherStatus {
    Pending,
    Approved,
    Rejected,
}

impl VoucherStatus {
    pub fn label(self) -> &'static str {
        match self {
            VoucherStatus::Pending => "Chờ duyệt",
            VoucherStatus::Approved => "Đã duyệt",
            VoucherStatus::Rejected => "Từ chối",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, VoucherStatus::Pending)
    }
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoucherStatus::Pending => f.write_str("pending"),
            VoucherStatus::Approved => f.write_str("approved"),
            VoucherStatus::Rejected => f.write_str("rejected"),
        }
    }
}

impl FromStr for VoucherStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_lowercase().as_str() {
            "pending" | "chờ duyệt" => Ok(VoucherStatus::Pending),
            "approved" | "đã duyệt" => Ok(VoucherStatus::Approved),
            "rejected" | "từ chối" => Ok(VoucherStatus::Rejected),
            _ => Err(DomainError::InvalidInput(format!(
                "unknown voucher status '{value}'"
            ))),
        }
    }
}

/// Outcome of an approval decision on a pending voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn target_status(self) -> VoucherStatus {
        match self {
            Decision::Approve => VoucherStatus::Approved,
            Decision::Reject => VoucherStatus::Rejected,
        }
    }

    /// Past-tense phrase used in notification messages.
    pub fn verb(self) -> &'static str {
        match self {
            Decision::Approve => "đã được duyệt",
            Decision::Reject => "đã bị từ chối",
        }
    }
}

/// Caller-editable header columns. Code, status and history are owned by the
/// lifecycle and are not part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherHeader {
    pub kind: VoucherKind,
    pub requester: String,
    pub warehouse_keeper: String,
    pub source: String,
    pub destination: String,
    pub address: String,
    pub notes: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Voucher {
    pub code: String,
    pub header: VoucherHeader,
    status: VoucherStatus,
    history: String,
}

impl Voucher {
    /// A freshly created voucher always starts out pending.
    pub fn new_pending(code: impl Into<String>, header: VoucherHeader) -> Self {
        Self {
            code: code.into(),
            header,
            status: VoucherStatus::Pending,
            history: String::new(),
        }
    }

    /// Rebuilds a voucher read back from storage.
    pub fn restore(
        code: impl Into<String>,
        header: VoucherHeader,
        status: VoucherStatus,
        history: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            header,
            status,
            history: history.into(),
        }
    }

    pub fn status(&self) -> VoucherStatus {
        self.status
    }

    pub fn history(&self) -> &str {
        &self.history
    }

    /// The only lifecycle guard. Every mutating operation goes through it.
    pub fn ensure_mutable(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidState {
                code: self.code.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn replace_header(&mut self, header: VoucherHeader) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.header = header;
        Ok(())
    }

    /// Moves a pending voucher to its terminal state and records who did it.
    pub fn decide(
        &mut self,
        decision: Decision,
        actor: &Actor,
        notes: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.ensure_mutable()?;
        self.status = decision.target_status();
        if self.header.warehouse_keeper.trim().is_empty() {
            self.header.warehouse_keeper = actor.username.clone();
        }

        let mut entry = format!(
            "[{}] {}: {}",
            at.format("%d/%m/%Y %H:%M"),
            actor.username,
            self.status.label()
        );
        if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
            entry.push_str(" - ");
            entry.push_str(notes);
        }
        if !self.history.is_empty() {
            self.history.push('\n');
        }
        self.history.push_str(&entry);
        Ok(())
    }
}

/// One material row as submitted by the caller, before it is bound to a voucher.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInput {
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub quality: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    pub notes: String,
}

impl LineInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.material_code.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "material code is required on every line".to_string(),
            ));
        }
        ensure_non_negative("quantity", &self.material_code, &self.quantity)?;
        ensure_non_negative("unit price", &self.material_code, &self.unit_price)
    }
}

fn ensure_non_negative(field: &str, material: &str, value: &BigDecimal) -> Result<(), DomainError> {
    if *value < BigDecimal::zero() {
        return Err(DomainError::InvalidInput(format!(
            "{field} for material {material} must not be negative"
        )));
    }
    Ok(())
}

/// A material line. `line_total` is derived and only changes through the
/// quantity/price setters.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherLine {
    pub line_code: String,
    pub voucher_code: String,
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub quality: String,
    quantity: BigDecimal,
    unit_price: BigDecimal,
    line_total: BigDecimal,
    pub notes: String,
}

impl VoucherLine {
    pub fn new(line_code: impl Into<String>, voucher_code: impl Into<String>, input: LineInput) -> Self {
        let line_total = &input.quantity * &input.unit_price;
        Self {
            line_code: line_code.into(),
            voucher_code: voucher_code.into(),
            material_code: input.material_code,
            material_name: input.material_name,
            unit: input.unit,
            quality: input.quality,
            quantity: input.quantity,
            unit_price: input.unit_price,
            line_total,
            notes: input.notes,
        }
    }

    pub fn quantity(&self) -> &BigDecimal {
        &self.quantity
    }

    pub fn unit_price(&self) -> &BigDecimal {
        &self.unit_price
    }

    pub fn line_total(&self) -> &BigDecimal {
        &self.line_total
    }

    pub fn set_quantity(&mut self, quantity: BigDecimal) -> Result<(), DomainError> {
        ensure_non_negative("quantity", &self.material_code, &quantity)?;
        self.quantity = quantity;
        self.recompute_total();
        Ok(())
    }

    pub fn set_unit_price(&mut self, unit_price: BigDecimal) -> Result<(), DomainError> {
        ensure_non_negative("unit price", &self.material_code, &unit_price)?;
        self.unit_price = unit_price;
        self.recompute_total();
        Ok(())
    }

    fn recompute_total(&mut self) {
        self.line_total = &self.quantity * &self.unit_price;
    }
}

/// Validates a submitted line set and binds it to `voucher_code`.
///
/// Lines are keyed `<voucher>_<material>`; blank or repeated material codes
/// fall back to `<voucher>_<n>` with `n` the 1-based position.
pub fn build_lines(voucher_code: &str, inputs: Vec<LineInput>) -> Result<Vec<VoucherLine>, DomainError> {
    if inputs.is_empty() {
        return Err(DomainError::InvalidInput(format!(
            "voucher {voucher_code} must have at least one line"
        )));
    }
    for input in &inputs {
        input.validate()?;
    }

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for input in &inputs {
        *occurrences.entry(input.material_code.trim()).or_default() += 1;
    }
    let unique: HashSet<String> = occurrences
        .into_iter()
        .filter(|(code, count)| *count == 1 && !code.is_empty())
        .map(|(code, _)| code.to_string())
        .collect();

    let mut taken = HashSet::new();
    let mut lines = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.into_iter().enumerate() {
        let material = input.material_code.trim();
        let mut line_code = if unique.contains(material) {
            format!("{voucher_code}_{material}")
        } else {
            format!("{voucher_code}_{}", index + 1)
        };
        let mut seq = index + 1;
        while taken.contains(&line_code) {
            seq += 1;
            line_code = format!("{voucher_code}_{seq}");
        }
        taken.insert(line_code.clone());
        lines.push(VoucherLine::new(line_code, voucher_code, input));
    }
    Ok(lines)
}

pub fn validate_code(code: &str) -> Result<(), DomainError> {
    if code.trim().is_empty() {
        return Err(DomainError::InvalidInput(
            "voucher code is required".to_string(),
        ));
    }
    Ok(())
}

/// `<prefix><timestamp>`, e.g. `PX1760000000000`.
pub fn generate_code(kind: VoucherKind, now: DateTime<Utc>) -> String {
    format!("{}{}", kind.code_prefix(), now.timestamp_millis())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Totals {
    pub item_count: usize,
    pub total_quantity: BigDecimal,
    pub total_amount: BigDecimal,
}

pub fn totals<'a>(lines: impl IntoIterator<Item = &'a VoucherLine>) -> Totals {
    lines.into_iter().fold(
        Totals {
            item_count: 0,
            total_quantity: BigDecimal::zero(),
            total_amount: BigDecimal::zero(),
        },
        |acc, line| Totals {
            item_count: acc.item_count + 1,
            total_quantity: acc.total_quantity + line.quantity(),
            total_amount: acc.total_amount + line.line_total(),
        },
    )
}


#[cfg(test)]
mod tests {
    use super::test_support::{header, line};
    use super::*;
    use crate::domain::actor::Role;
    use chrono::TimeZone;

    fn keeper() -> Actor {
        Actor::new("thu.kho", Role::WarehouseKeeper)
    }

    #[test]
    fn new_voucher_starts_pending() {
        let voucher = Voucher::new_pending("PX1", header(VoucherKind::Outbound));
        assert_eq!(voucher.status(), VoucherStatus::Pending);
        assert!(voucher.history().is_empty());
        assert!(voucher.ensure_mutable().is_ok());
    }

    #[test]
    fn approve_sets_terminal_status_and_appends_history() {
        let mut voucher = Voucher::new_pending("PX1", header(VoucherKind::Outbound));
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 9, 5, 0).unwrap();

        voucher
            .decide(Decision::Approve, &keeper(), Some(" ok "), at)
            .expect("pending voucher can be approved");

        assert_eq!(voucher.status(), VoucherStatus::Approved);
        assert_eq!(voucher.header.warehouse_keeper, "thu.kho");
        assert_eq!(voucher.history(), "[02/03/2024 09:05] thu.kho: Đã duyệt - ok");
    }

    #[test]
    fn decide_keeps_existing_keeper_and_appends_on_new_line() {
        let mut h = header(VoucherKind::Inbound);
        h.warehouse_keeper = "an.tran".to_string();
        let mut voucher = Voucher::restore("PN1", h, VoucherStatus::Pending, "tạo phiếu");
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 9, 5, 0).unwrap();

        voucher.decide(Decision::Reject, &keeper(), None, at).unwrap();

        assert_eq!(voucher.header.warehouse_keeper, "an.tran");
        assert_eq!(voucher.history(), "tạo phiếu\n[02/03/2024 09:05] thu.kho: Từ chối");
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        for status in [VoucherStatus::Approved, VoucherStatus::Rejected] {
            let mut voucher = Voucher::restore("PX9", header(VoucherKind::Outbound), status, "");
            let before = voucher.clone();

            let err = voucher
                .decide(Decision::Approve, &keeper(), None, Utc::now())
                .unwrap_err();
            assert_eq!(
                err,
                DomainError::InvalidState {
                    code: "PX9".to_string(),
                    status
                }
            );
            assert!(voucher.replace_header(header(VoucherKind::Inbound)).is_err());
            assert_eq!(voucher, before);
        }
    }

    #[test]
    fn line_total_follows_quantity_and_price() {
        let mut l = VoucherLine::new("PX1_A", "PX1", line("A", 2, 1000));
        assert_eq!(l.line_total(), &BigDecimal::from(2000));

        l.set_quantity(BigDecimal::from(3)).unwrap();
        assert_eq!(l.line_total(), &BigDecimal::from(3000));

        l.set_unit_price(BigDecimal::from(250)).unwrap();
        assert_eq!(l.line_total(), &BigDecimal::from(750));
    }

    #[test]
    fn negative_quantity_is_rejected_and_line_unchanged() {
        let mut l = VoucherLine::new("PX1_A", "PX1", line("A", 2, 1000));
        assert!(l.set_quantity(BigDecimal::from(-1)).is_err());
        assert_eq!(l.quantity(), &BigDecimal::from(2));
        assert_eq!(l.line_total(), &BigDecimal::from(2000));
    }

    #[test]
    fn build_lines_requires_at_least_one_line() {
        let err = build_lines("PX1", vec![]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[test]
    fn build_lines_rejects_blank_material_and_negative_price() {
        assert!(build_lines("PX1", vec![line(" ", 1, 1)]).is_err());
        assert!(build_lines("PX1", vec![line("A", 1, -5)]).is_err());
    }

    #[test]
    fn build_lines_uses_material_codes_and_sequence_for_repeats() {
        let lines = build_lines("PX1", vec![line("A", 1, 1), line("B", 1, 1), line("B", 2, 1)]).unwrap();
        let codes: Vec<&str> = lines.iter().map(|l| l.line_code.as_str()).collect();
        assert_eq!(codes, vec!["PX1_A", "PX1_2", "PX1_3"]);
        assert!(lines.iter().all(|l| l.voucher_code == "PX1"));
    }

    #[test]
    fn build_lines_never_hands_out_the_same_code_twice() {
        // material "2" claims PX1_2 before the repeated "C" at position 2 does
        let lines = build_lines("PX1", vec![line("2", 1, 1), line("C", 1, 1), line("C", 1, 1)]).unwrap();
        let codes: HashSet<&str> = lines.iter().map(|l| l.line_code.as_str()).collect();
        assert_eq!(codes.len(), 3);
    }

    #[test]
    fn totals_sum_quantities_and_amounts() {
        let lines = build_lines("PX1", vec![line("A", 2, 1000), line("B", 1, 500)]).unwrap();
        let t = totals(&lines);
        assert_eq!(t.item_count, 2);
        assert_eq!(t.total_quantity, BigDecimal::from(3));
        assert_eq!(t.total_amount, BigDecimal::from(2500));
    }

    #[test]
    fn totals_of_nothing_is_zero() {
        let t = totals(&Vec::<VoucherLine>::new());
        assert_eq!(t.item_count, 0);
        assert_eq!(t.total_amount, BigDecimal::zero());
    }

    #[test]
    fn generated_codes_carry_kind_prefix() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(generate_code(VoucherKind::Inbound, now), "PN1700000000123");
        assert_eq!(generate_code(VoucherKind::Outbound, now), "PX1700000000123");
    }

    #[test]
    fn labels_and_english_names_both_parse() {
        assert_eq!("Đã duyệt".parse::<VoucherStatus>().unwrap(), VoucherStatus::Approved);
        assert_eq!(" pending ".parse::<VoucherStatus>().unwrap(), VoucherStatus::Pending);
        assert_eq!("Xuất kho".parse::<VoucherKind>().unwrap(), VoucherKind::Outbound);
        assert_eq!("INBOUND".parse::<VoucherKind>().unwrap(), VoucherKind::Inbound);
        assert!("archived".parse::<VoucherStatus>().is_err());
    }
}
