use crate::domain::voucher::{Voucher, VoucherLine};

/// Local copy of the header and line tables.
///
/// Lines only exist while their voucher does: removing a voucher drops its
/// lines with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoucherStore {
    vouchers: Vec<Voucher>,
    lines: Vec<VoucherLine>,
}

impl VoucherStore {
    pub fn new(vouchers: Vec<Voucher>, lines: Vec<VoucherLine>) -> Self {
        Self { vouchers, lines }
    }

    pub fn vouchers(&self) -> &[Voucher] {
        &self.vouchers
    }

    pub fn lines(&self) -> &[VoucherLine] {
        &self.lines
    }

    pub fn get(&self, code: &str) -> Option<&Voucher> {
        self.vouchers.iter().find(|v| v.code == code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Voucher> {
        self.vouchers.iter_mut().find(|v| v.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn lines_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a VoucherLine> + 'a {
        self.lines.iter().filter(move |l| l.voucher_code == code)
    }

    pub fn line_codes_for(&self, code: &str) -> Vec<String> {
        self.lines_for(code).map(|l| l.line_code.clone()).collect()
    }

    pub fn insert(&mut self, voucher: Voucher, lines: Vec<VoucherLine>) {
        self.vouchers.push(voucher);
        self.lines.extend(lines);
    }

    /// Drops every current line of `code` and puts `lines` in their place.
    pub fn replace_lines(&mut self, code: &str, lines: Vec<VoucherLine>) {
        self.lines.retain(|l| l.voucher_code != code);
        self.lines.extend(lines);
    }

    pub fn remove(&mut self, code: &str) {
        self.lines.retain(|l| l.voucher_code != code);
        self.vouchers.retain(|v| v.code != code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::voucher::build_lines;
    use crate::domain::voucher::test_support::{header, line};
    use crate::domain::voucher::VoucherKind;

    fn store_with(codes: &[&str]) -> VoucherStore {
        let mut store = VoucherStore::default();
        for code in codes {
            let lines = build_lines(code, vec![line("A", 1, 10), line("B", 2, 20)]).unwrap();
            store.insert(Voucher::new_pending(*code, header(VoucherKind::Inbound)), lines);
        }
        store
    }

    #[test]
    fn remove_cascades_to_lines_only_of_that_voucher() {
        let mut store = store_with(&["V1", "V2"]);
        store.remove("V1");

        assert!(!store.contains("V1"));
        assert_eq!(store.lines_for("V1").count(), 0);
        assert_eq!(store.lines_for("V2").count(), 2);
    }

    #[test]
    fn replace_lines_leaves_no_residue() {
        let mut store = store_with(&["V1"]);
        let fresh = build_lines("V1", vec![line("A", 5, 1)]).unwrap();
        store.replace_lines("V1", fresh.clone());

        let current: Vec<VoucherLine> = store.lines_for("V1").cloned().collect();
        assert_eq!(current, fresh);
    }

    #[test]
    fn line_codes_follow_the_voucher() {
        let store = store_with(&["V1"]);
        assert_eq!(store.line_codes_for("V1"), vec!["V1_A", "V1_B"]);
        assert!(store.line_codes_for("missing").is_empty());
    }
}
