use std::collections::{HashMap, HashSet};
use std::slice;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::actor::Actor;
use crate::domain::errors::DomainError;
use crate::domain::filter::VoucherFilter;
use crate::domain::ports::{Notifier, VoucherRepository};
use crate::domain::voucher::{
    build_lines, generate_code, totals, validate_code, Decision, LineInput, Totals, Voucher,
    VoucherHeader, VoucherKind, VoucherLine,
};

use super::optimistic::{lock, optimistic};
use super::store::VoucherStore;

#[derive(Debug, Clone, PartialEq)]
pub struct VoucherDetail {
    pub voucher: Voucher,
    pub lines: Vec<VoucherLine>,
    pub totals: Totals,
}

/// Header of one voucher in an import batch.
#[derive(Debug, Clone, PartialEq)]
pub struct VoucherDraft {
    pub code: String,
    pub header: VoucherHeader,
}

/// Line of an import batch, tied to its header by code.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedLine {
    pub voucher_code: String,
    pub line: LineInput,
}

/// Owns the local voucher/line collections and every mutation of them.
///
/// Header and line writes are separate remote calls with no transaction
/// around them. A failure after the header write leaves the remote tables
/// partially written; that case is logged at `error` and surfaced as the
/// remote error, and the local store is rolled back.
///
/// Mutations hold `writer` from their first local check until the remote
/// calls settle, so a rollback never undoes another request's change.
/// Reads only take the short `state` lock.
pub struct VoucherService<R, N> {
    repo: R,
    notifier: Arc<N>,
    state: Mutex<VoucherStore>,
    writer: AsyncMutex<()>,
}

impl<R: VoucherRepository, N: Notifier> VoucherService<R, N> {
    pub fn new(repo: R, notifier: N) -> Self {
        Self {
            repo,
            notifier: Arc::new(notifier),
            state: Mutex::new(VoucherStore::default()),
            writer: AsyncMutex::new(()),
        }
    }

    /// Replaces the local collections with the remote tables.
    pub async fn refresh(&self) -> Result<usize, DomainError> {
        let _writer = self.writer.lock().await;
        let (vouchers, lines) = self.repo.load_all().await?;
        let count = vouchers.len();
        *lock(&self.state) = VoucherStore::new(vouchers, lines);
        log::info!("Loaded {} vouchers from the table service", count);
        Ok(count)
    }

    pub async fn create_voucher(
        &self,
        actor: &Actor,
        code: String,
        header: VoucherHeader,
        lines: Vec<LineInput>,
    ) -> Result<Voucher, DomainError> {
        let _writer = self.writer.lock().await;
        self.insert_new(actor, code, header, lines).await
    }

    /// Creates a voucher under the first free `<PN|PX><millis>` code at or
    /// after the current time.
    pub async fn create_voucher_with_generated_code(
        &self,
        actor: &Actor,
        header: VoucherHeader,
        lines: Vec<LineInput>,
    ) -> Result<Voucher, DomainError> {
        let _writer = self.writer.lock().await;
        let code = next_free_code(&lock(&self.state), header.kind, Utc::now());
        self.insert_new(actor, code, header, lines).await
    }

    /// Caller holds `writer`.
    async fn insert_new(
        &self,
        actor: &Actor,
        code: String,
        header: VoucherHeader,
        lines: Vec<LineInput>,
    ) -> Result<Voucher, DomainError> {
        validate_code(&code)?;
        let lines = build_lines(&code, lines)?;
        let voucher = Voucher::new_pending(code, header);

        let repo = &self.repo;
        let (voucher_ref, lines_ref) = (&voucher, &lines);
        optimistic(
            &self.state,
            "create voucher",
            |store| {
                ensure_new(store, &voucher.code)?;
                store.insert(voucher.clone(), lines.clone());
                Ok(())
            },
            |()| async move {
                repo.add_vouchers(slice::from_ref(voucher_ref)).await?;
                repo.add_lines(lines_ref)
                    .await
                    .map_err(|e| partial_write(&voucher_ref.code, "line insert", e))
            },
        )
        .await?;

        log::info!(
            "Voucher {} created by {} with {} lines",
            voucher.code,
            actor.username,
            lines.len()
        );
        Ok(voucher)
    }

    /// Overwrites the header and replaces the whole line set of a pending voucher.
    pub async fn update_voucher(
        &self,
        actor: &Actor,
        code: &str,
        header: VoucherHeader,
        lines: Vec<LineInput>,
    ) -> Result<Voucher, DomainError> {
        let _writer = self.writer.lock().await;
        lock(&self.state)
            .get(code)
            .ok_or_else(|| DomainError::NotFound(code.to_string()))?
            .ensure_mutable()?;
        let lines = build_lines(code, lines)?;

        let repo = &self.repo;
        let lines_ref = &lines;
        let updated = optimistic(
            &self.state,
            "update voucher",
            |store| {
                let voucher = store
                    .get_mut(code)
                    .ok_or_else(|| DomainError::NotFound(code.to_string()))?;
                voucher.replace_header(header)?;
                let updated = voucher.clone();
                let previous = store.line_codes_for(code);
                store.replace_lines(code, lines.clone());
                Ok((updated, previous))
            },
            |(updated, previous): (Voucher, Vec<String>)| async move {
                repo.edit_voucher(&updated).await?;
                if !previous.is_empty() {
                    repo.delete_lines(&previous)
                        .await
                        .map_err(|e| partial_write(code, "old line delete", e))?;
                }
                repo.add_lines(lines_ref)
                    .await
                    .map_err(|e| partial_write(code, "new line insert", e))?;
                Ok(updated)
            },
        )
        .await?;

        log::info!(
            "Voucher {} updated by {} ({} lines)",
            code,
            actor.username,
            lines.len()
        );
        Ok(updated)
    }

    /// Removes a pending voucher, lines first.
    pub async fn delete_voucher(&self, actor: &Actor, code: &str) -> Result<(), DomainError> {
        let _writer = self.writer.lock().await;
        let repo = &self.repo;
        optimistic(
            &self.state,
            "delete voucher",
            |store| take_pending(store, code),
            |line_codes: Vec<String>| async move {
                if !line_codes.is_empty() {
                    repo.delete_lines(&line_codes).await?;
                }
                repo.delete_vouchers(&[code.to_string()])
                    .await
                    .map_err(|e| partial_write(code, "header delete", e))
            },
        )
        .await?;

        log::info!("Voucher {} deleted by {}", code, actor.username);
        Ok(())
    }

    /// Deletes several pending vouchers: all their lines in one call, then
    /// all headers in one call. Nothing is touched if any code is missing or
    /// no longer pending.
    pub async fn bulk_delete_vouchers(
        &self,
        actor: &Actor,
        codes: Vec<String>,
    ) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        let codes: Vec<String> = codes
            .into_iter()
            .filter(|c| seen.insert(c.clone()))
            .collect();
        if codes.is_empty() {
            return Err(DomainError::InvalidInput(
                "no vouchers selected for deletion".to_string(),
            ));
        }

        let _writer = self.writer.lock().await;
        let repo = &self.repo;
        let codes_ref = &codes;
        optimistic(
            &self.state,
            "bulk delete vouchers",
            |store| {
                let mut line_codes = Vec::new();
                for code in codes_ref {
                    line_codes.extend(take_pending(store, code)?);
                }
                Ok(line_codes)
            },
            |line_codes: Vec<String>| async move {
                if !line_codes.is_empty() {
                    repo.delete_lines(&line_codes).await?;
                }
                repo.delete_vouchers(codes_ref)
                    .await
                    .map_err(|e| partial_write(&codes_ref.join(","), "header delete", e))
            },
        )
        .await?;

        log::info!("{} vouchers deleted by {}", codes.len(), actor.username);
        Ok(())
    }

    /// Creates a batch of vouchers: all headers in one call, then all lines.
    pub async fn bulk_import_vouchers(
        &self,
        actor: &Actor,
        drafts: Vec<VoucherDraft>,
        lines: Vec<ImportedLine>,
    ) -> Result<Vec<Voucher>, DomainError> {
        if drafts.is_empty() {
            return Err(DomainError::InvalidInput(
                "import contains no vouchers".to_string(),
            ));
        }

        let mut grouped: HashMap<String, Vec<LineInput>> = HashMap::new();
        for draft in &drafts {
            validate_code(&draft.code)?;
            if grouped.insert(draft.code.clone(), Vec::new()).is_some() {
                return Err(DomainError::InvalidInput(format!(
                    "voucher {} appears twice in the import",
                    draft.code
                )));
            }
        }
        for imported in lines {
            match grouped.get_mut(&imported.voucher_code) {
                Some(group) => group.push(imported.line),
                None => {
                    return Err(DomainError::InvalidInput(format!(
                        "imported line references unknown voucher {}",
                        imported.voucher_code
                    )))
                }
            }
        }

        let mut vouchers = Vec::with_capacity(drafts.len());
        let mut all_lines = Vec::new();
        for draft in drafts {
            let inputs = grouped.remove(&draft.code).unwrap_or_default();
            all_lines.extend(build_lines(&draft.code, inputs)?);
            vouchers.push(Voucher::new_pending(draft.code, draft.header));
        }

        let _writer = self.writer.lock().await;
        let repo = &self.repo;
        let (vouchers_ref, lines_ref) = (&vouchers, &all_lines);
        optimistic(
            &self.state,
            "import vouchers",
            |store| {
                for voucher in vouchers_ref {
                    ensure_new(store, &voucher.code)?;
                    let own: Vec<VoucherLine> = lines_ref
                        .iter()
                        .filter(|l| l.voucher_code == voucher.code)
                        .cloned()
                        .collect();
                    store.insert(voucher.clone(), own);
                }
                Ok(())
            },
            |()| async move {
                repo.add_vouchers(vouchers_ref).await?;
                repo.add_lines(lines_ref)
                    .await
                    .map_err(|e| partial_write("import batch", "line insert", e))
            },
        )
        .await?;

        log::info!(
            "{} vouchers ({} lines) imported by {}",
            vouchers.len(),
            all_lines.len(),
            actor.username
        );
        Ok(vouchers)
    }

    /// Codes from `codes` that already exist locally.
    pub fn duplicate_codes(&self, codes: &[String]) -> Vec<String> {
        let store = lock(&self.state);
        codes
            .iter()
            .filter(|c| store.contains(c))
            .cloned()
            .collect()
    }

    pub async fn approve_voucher(
        &self,
        actor: &Actor,
        code: &str,
        notes: Option<String>,
    ) -> Result<Voucher, DomainError> {
        self.decide(actor, code, Decision::Approve, notes).await
    }

    pub async fn reject_voucher(
        &self,
        actor: &Actor,
        code: &str,
        notes: Option<String>,
    ) -> Result<Voucher, DomainError> {
        self.decide(actor, code, Decision::Reject, notes).await
    }

    /// Status-only change: the local copy is updated once the remote edit
    /// succeeds, so a failed call leaves both sides at Pending.
    async fn decide(
        &self,
        actor: &Actor,
        code: &str,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<Voucher, DomainError> {
        actor.ensure_can_decide()?;
        let _writer = self.writer.lock().await;

        let mut updated = lock(&self.state)
            .get(code)
            .cloned()
            .ok_or_else(|| DomainError::NotFound(code.to_string()))?;
        updated.decide(decision, actor, notes.as_deref(), Utc::now())?;

        if let Err(e) = self.repo.edit_voucher(&updated).await {
            log::warn!("Voucher {}: {:?} failed remotely: {}", code, decision, e);
            return Err(e);
        }

        if let Some(local) = lock(&self.state).get_mut(code) {
            *local = updated.clone();
        }
        log::info!(
            "Voucher {} is now {} (by {})",
            code,
            updated.status(),
            actor.username
        );

        self.notify(decision_message(&updated, decision, actor, notes.as_deref()));
        Ok(updated)
    }

    /// Fire-and-forget: failures are logged and never reach the caller.
    fn notify(&self, text: String) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_message(text).await {
                log::warn!("Approval notification not delivered: {}", e);
            }
        });
    }

    pub fn get_voucher_with_lines(&self, code: &str) -> Option<VoucherDetail> {
        let store = lock(&self.state);
        let voucher = store.get(code)?.clone();
        let lines: Vec<VoucherLine> = store.lines_for(code).cloned().collect();
        let totals = totals(&lines);
        Some(VoucherDetail {
            voucher,
            lines,
            totals,
        })
    }

    pub fn lines_for_voucher(&self, code: &str) -> Vec<VoucherLine> {
        lock(&self.state).lines_for(code).cloned().collect()
    }

    pub fn list_vouchers(&self, filter: &VoucherFilter) -> Vec<Voucher> {
        filter.apply(lock(&self.state).vouchers())
    }

    /// Copy of the current local collections.
    pub fn snapshot(&self) -> VoucherStore {
        lock(&self.state).clone()
    }
}

fn ensure_new(store: &VoucherStore, code: &str) -> Result<(), DomainError> {
    if store.contains(code) {
        return Err(DomainError::InvalidInput(format!(
            "voucher {code} already exists"
        )));
    }
    Ok(())
}

/// Guards and removes one voucher, returning the codes of the lines it had.
fn take_pending(store: &mut VoucherStore, code: &str) -> Result<Vec<String>, DomainError> {
    store
        .get(code)
        .ok_or_else(|| DomainError::NotFound(code.to_string()))?
        .ensure_mutable()?;
    let line_codes = store.line_codes_for(code);
    store.remove(code);
    Ok(line_codes)
}

/// Generated codes carry millisecond precision; two creates in the same
/// millisecond take consecutive values.
fn next_free_code(store: &VoucherStore, kind: VoucherKind, now: DateTime<Utc>) -> String {
    let mut at = now;
    loop {
        let code = generate_code(kind, at);
        if !store.contains(&code) {
            return code;
        }
        at += Duration::milliseconds(1);
    }
}

fn partial_write(what: &str, stage: &str, e: DomainError) -> DomainError {
    log::error!(
        "{}: {} failed after earlier writes succeeded; remote tables are partially written: {}",
        what,
        stage,
        e
    );
    e
}

fn decision_message(voucher: &Voucher, decision: Decision, actor: &Actor, notes: Option<&str>) -> String {
    let mut text = format!(
        "Phiếu {} ({}) {} bởi {}",
        voucher.code,
        voucher.header.kind.label(),
        decision.verb(),
        actor.username
    );
    if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
        text.push_str("\nGhi chú: ");
        text.push_str(notes);
    }
    text
}
