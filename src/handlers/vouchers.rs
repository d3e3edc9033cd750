use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::{ImportedLine, VoucherDetail, VoucherDraft};
use crate::domain::actor::{Actor, Role};
use crate::domain::filter::{Tab, VoucherFilter};
use crate::domain::voucher::{
    LineInput, Totals, Voucher, VoucherHeader, VoucherKind, VoucherLine,
    VoucherStatus,
};
use crate::errors::AppError;
use crate::AppService;

pub const USER_HEADER: &str = "X-User";
pub const ROLE_HEADER: &str = "X-Role";

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct LineRequest {
    pub material_code: String,
    #[serde(default)]
    pub material_name: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub quality: String,
    /// Decimal as a string, e.g. "2.5"
    pub quantity: String,
    /// Decimal as a string, e.g. "15000"
    pub unit_price: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct HeaderRequest {
    /// "inbound" / "outbound" or the labels "Nhập kho" / "Xuất kho"
    pub kind: String,
    #[serde(default)]
    pub requester: String,
    #[serde(default)]
    pub warehouse_keeper: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    /// Defaults to the time of the request.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVoucherRequest {
    /// Generated as `<PN|PX><timestamp>` when omitted.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(flatten)]
    pub header: HeaderRequest,
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateVoucherRequest {
    #[serde(flatten)]
    pub header: HeaderRequest,
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DecisionRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    pub codes: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportVoucherRequest {
    pub code: String,
    #[serde(flatten)]
    pub header: HeaderRequest,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportLineRequest {
    pub voucher_code: String,
    #[serde(flatten)]
    pub line: LineRequest,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportRequest {
    pub vouchers: Vec<ImportVoucherRequest>,
    pub lines: Vec<ImportLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub skip_duplicates: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListVouchersParams {
    pub tab: Option<String>,
    pub status: Option<String>,
    pub kind: Option<String>,
    pub search: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoucherResponse {
    pub code: String,
    pub kind: String,
    pub kind_label: String,
    pub status: String,
    pub status_label: String,
    pub requester: String,
    pub warehouse_keeper: String,
    pub source: String,
    pub destination: String,
    pub address: String,
    pub notes: String,
    pub history: String,
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LineResponse {
    pub line_code: String,
    pub voucher_code: String,
    pub material_code: String,
    pub material_name: String,
    pub unit: String,
    pub quality: String,
    pub quantity: String,
    pub unit_price: String,
    pub line_total: String,
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TotalsResponse {
    pub item_count: usize,
    pub total_quantity: String,
    pub total_amount: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoucherDetailResponse {
    pub voucher: VoucherResponse,
    pub lines: Vec<LineResponse>,
    pub totals: TotalsResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListVouchersResponse {
    pub items: Vec<VoucherResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResponse {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub vouchers: usize,
}

impl From<&Voucher> for VoucherResponse {
    fn from(v: &Voucher) -> Self {
        Self {
            code: v.code.clone(),
            kind: v.header.kind.to_string(),
            kind_label: v.header.kind.label().to_string(),
            status: v.status().to_string(),
            status_label: v.status().label().to_string(),
            requester: v.header.requester.clone(),
            warehouse_keeper: v.header.warehouse_keeper.clone(),
            source: v.header.source.clone(),
            destination: v.header.destination.clone(),
            address: v.header.address.clone(),
            notes: v.header.notes.clone(),
            history: v.history().to_string(),
            date: v.header.date.to_rfc3339(),
        }
    }
}

impl From<&VoucherLine> for LineResponse {
    fn from(l: &VoucherLine) -> Self {
        Self {
            line_code: l.line_code.clone(),
            voucher_code: l.voucher_code.clone(),
            material_code: l.material_code.clone(),
            material_name: l.material_name.clone(),
            unit: l.unit.clone(),
            quality: l.quality.clone(),
            quantity: l.quantity().to_string(),
            unit_price: l.unit_price().to_string(),
            line_total: l.line_total().to_string(),
            notes: l.notes.clone(),
        }
    }
}

impl From<&Totals> for TotalsResponse {
    fn from(t: &Totals) -> Self {
        Self {
            item_count: t.item_count,
            total_quantity: t.total_quantity.to_string(),
            total_amount: t.total_amount.to_string(),
        }
    }
}

impl From<VoucherDetail> for VoucherDetailResponse {
    fn from(d: VoucherDetail) -> Self {
        Self {
            voucher: VoucherResponse::from(&d.voucher),
            lines: d.lines.iter().map(LineResponse::from).collect(),
            totals: TotalsResponse::from(&d.totals),
        }
    }
}

// ── Request mapping ──────────────────────────────────────────────────────────

/// Authentication happens upstream; the gateway forwards who the caller is.
fn actor(req: &HttpRequest) -> Result<Actor, AppError> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(format!("missing {name} header")))
    };
    let username = header(USER_HEADER)?;
    let role = Role::from_str(header(ROLE_HEADER)?)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;
    Ok(Actor::new(username, role))
}

fn parse_decimal(field: &str, raw: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid {field} '{raw}': {e}")))
}

impl LineRequest {
    fn into_input(self) -> Result<LineInput, AppError> {
        Ok(LineInput {
            quantity: parse_decimal("quantity", &self.quantity)?,
            unit_price: parse_decimal("unit_price", &self.unit_price)?,
            material_code: self.material_code,
            material_name: self.material_name,
            unit: self.unit,
            quality: self.quality,
            notes: self.notes,
        })
    }
}

impl HeaderRequest {
    fn into_header(self) -> Result<VoucherHeader, AppError> {
        Ok(VoucherHeader {
            kind: VoucherKind::from_str(&self.kind)?,
            requester: self.requester,
            warehouse_keeper: self.warehouse_keeper,
            source: self.source,
            destination: self.destination,
            address: self.address,
            notes: self.notes,
            date: self.date.unwrap_or_else(Utc::now),
        })
    }
}

fn line_inputs(lines: Vec<LineRequest>) -> Result<Vec<LineInput>, AppError> {
    lines.into_iter().map(LineRequest::into_input).collect()
}

fn parse_optional<T: FromStr<Err = crate::domain::errors::DomainError>>(
    raw: Option<String>,
) -> Result<Option<T>, AppError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Ok(Some(T::from_str(value)?)),
    }
}

fn detail(svc: &AppService, code: &str) -> Result<VoucherDetailResponse, AppError> {
    svc.get_voucher_with_lines(code)
        .map(VoucherDetailResponse::from)
        .ok_or_else(|| AppError::NotFound(format!("Voucher {code} not found")))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /vouchers
///
/// Creates a pending voucher together with its lines. The header row is
/// written first, then all lines in one batch.
#[utoipa::path(
    post,
    path = "/vouchers",
    request_body = CreateVoucherRequest,
    responses(
        (status = 201, description = "Voucher created", body = VoucherDetailResponse),
        (status = 400, description = "Invalid voucher or empty line set"),
        (status = 401, description = "Missing actor headers"),
        (status = 502, description = "Table service failed"),
    ),
    tag = "vouchers"
)]
pub async fn create_voucher(
    svc: web::Data<AppService>,
    req: HttpRequest,
    body: web::Json<CreateVoucherRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    let body = body.into_inner();
    let header = body.header.into_header()?;
    let lines = line_inputs(body.lines)?;

    let voucher = match body.code.map(|c| c.trim().to_string()) {
        Some(code) if !code.is_empty() => svc.create_voucher(&actor, code, header, lines).await?,
        _ => {
            svc.create_voucher_with_generated_code(&actor, header, lines)
                .await?
        }
    };
    Ok(HttpResponse::Created().json(detail(&svc, &voucher.code)?))
}

/// GET /vouchers
///
/// Lists vouchers (without lines) matching every given filter.
#[utoipa::path(
    get,
    path = "/vouchers",
    params(
        ("tab" = Option<String>, Query, description = "all | pending | processed | approved | rejected"),
        ("status" = Option<String>, Query, description = "Exact status"),
        ("kind" = Option<String>, Query, description = "inbound | outbound"),
        ("search" = Option<String>, Query, description = "Substring of code, requester, source or destination"),
        ("from" = Option<String>, Query, description = "RFC 3339 lower bound on the voucher date"),
        ("to" = Option<String>, Query, description = "RFC 3339 upper bound on the voucher date"),
    ),
    responses(
        (status = 200, description = "Matching vouchers", body = ListVouchersResponse),
        (status = 400, description = "Unknown tab, status or kind"),
    ),
    tag = "vouchers"
)]
pub async fn list_vouchers(
    svc: web::Data<AppService>,
    query: web::Query<ListVouchersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let filter = VoucherFilter {
        tab: parse_optional::<Tab>(params.tab)?.unwrap_or_default(),
        status: parse_optional::<VoucherStatus>(params.status)?,
        kind: parse_optional::<VoucherKind>(params.kind)?,
        search: params.search,
        date_from: params.from,
        date_to: params.to,
    };

    let items: Vec<VoucherResponse> = svc
        .list_vouchers(&filter)
        .iter()
        .map(VoucherResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(ListVouchersResponse {
        total: items.len(),
        items,
    }))
}

/// GET /vouchers/{code}
///
/// Returns the voucher with its lines and totals.
#[utoipa::path(
    get,
    path = "/vouchers/{code}",
    params(("code" = String, Path, description = "Voucher code")),
    responses(
        (status = 200, description = "Voucher found", body = VoucherDetailResponse),
        (status = 404, description = "Voucher not found"),
    ),
    tag = "vouchers"
)]
pub async fn get_voucher(
    svc: web::Data<AppService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(detail(&svc, &path.into_inner())?))
}

/// PUT /vouchers/{code}
///
/// Replaces the header and the entire line set of a pending voucher.
#[utoipa::path(
    put,
    path = "/vouchers/{code}",
    params(("code" = String, Path, description = "Voucher code")),
    request_body = UpdateVoucherRequest,
    responses(
        (status = 200, description = "Voucher updated", body = VoucherDetailResponse),
        (status = 404, description = "Voucher not found"),
        (status = 409, description = "Voucher already approved or rejected"),
        (status = 502, description = "Table service failed"),
    ),
    tag = "vouchers"
)]
pub async fn update_voucher(
    svc: web::Data<AppService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<UpdateVoucherRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    let code = path.into_inner();
    let body = body.into_inner();
    let header = body.header.into_header()?;
    let lines = line_inputs(body.lines)?;

    svc.update_voucher(&actor, &code, header, lines).await?;
    Ok(HttpResponse::Ok().json(detail(&svc, &code)?))
}

/// DELETE /vouchers/{code}
#[utoipa::path(
    delete,
    path = "/vouchers/{code}",
    params(("code" = String, Path, description = "Voucher code")),
    responses(
        (status = 204, description = "Voucher and its lines deleted"),
        (status = 404, description = "Voucher not found"),
        (status = 409, description = "Voucher already approved or rejected"),
        (status = 502, description = "Table service failed; nothing was removed locally"),
    ),
    tag = "vouchers"
)]
pub async fn delete_voucher(
    svc: web::Data<AppService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    svc.delete_voucher(&actor, &path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /vouchers/bulk-delete
#[utoipa::path(
    post,
    path = "/vouchers/bulk-delete",
    request_body = BulkDeleteRequest,
    responses(
        (status = 204, description = "All listed vouchers deleted"),
        (status = 400, description = "Empty selection"),
        (status = 404, description = "A listed voucher does not exist"),
        (status = 409, description = "A listed voucher is already processed"),
    ),
    tag = "vouchers"
)]
pub async fn bulk_delete_vouchers(
    svc: web::Data<AppService>,
    req: HttpRequest,
    body: web::Json<BulkDeleteRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    svc.bulk_delete_vouchers(&actor, body.into_inner().codes)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /vouchers/import
///
/// Imports headers and lines in two batched writes. With
/// `skip_duplicates=true`, vouchers whose code already exists are left out
/// (with their lines) instead of failing the whole import.
#[utoipa::path(
    post,
    path = "/vouchers/import",
    params(("skip_duplicates" = Option<bool>, Query, description = "Skip codes that already exist")),
    request_body = ImportRequest,
    responses(
        (status = 201, description = "Vouchers imported", body = ImportResponse),
        (status = 400, description = "Invalid batch or duplicate codes"),
    ),
    tag = "vouchers"
)]
pub async fn import_vouchers(
    svc: web::Data<AppService>,
    req: HttpRequest,
    query: web::Query<ImportParams>,
    body: web::Json<ImportRequest>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    let body = body.into_inner();

    let skipped = if query.skip_duplicates {
        let codes: Vec<String> = body.vouchers.iter().map(|v| v.code.clone()).collect();
        svc.duplicate_codes(&codes)
    } else {
        Vec::new()
    };

    let mut drafts = Vec::with_capacity(body.vouchers.len());
    for v in body.vouchers {
        if skipped.contains(&v.code) {
            continue;
        }
        drafts.push(VoucherDraft {
            header: v.header.into_header()?,
            code: v.code,
        });
    }
    let mut lines = Vec::with_capacity(body.lines.len());
    for l in body.lines {
        if skipped.contains(&l.voucher_code) {
            continue;
        }
        lines.push(ImportedLine {
            voucher_code: l.voucher_code,
            line: l.line.into_input()?,
        });
    }

    let imported = if drafts.is_empty() && !skipped.is_empty() {
        Vec::new()
    } else {
        svc.bulk_import_vouchers(&actor, drafts, lines)
            .await?
            .into_iter()
            .map(|v| v.code)
            .collect()
    };
    Ok(HttpResponse::Created().json(ImportResponse { imported, skipped }))
}

/// POST /vouchers/{code}/approve
#[utoipa::path(
    post,
    path = "/vouchers/{code}/approve",
    params(("code" = String, Path, description = "Voucher code")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Voucher approved", body = VoucherResponse),
        (status = 403, description = "Actor may not approve"),
        (status = 404, description = "Voucher not found"),
        (status = 409, description = "Voucher already approved or rejected"),
    ),
    tag = "vouchers"
)]
pub async fn approve_voucher(
    svc: web::Data<AppService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<DecisionRequest>>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    let notes = body.map(|b| b.into_inner()).unwrap_or_default().notes;
    let voucher = svc
        .approve_voucher(&actor, &path.into_inner(), notes)
        .await?;
    Ok(HttpResponse::Ok().json(VoucherResponse::from(&voucher)))
}

/// POST /vouchers/{code}/reject
#[utoipa::path(
    post,
    path = "/vouchers/{code}/reject",
    params(("code" = String, Path, description = "Voucher code")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Voucher rejected", body = VoucherResponse),
        (status = 403, description = "Actor may not reject"),
        (status = 404, description = "Voucher not found"),
        (status = 409, description = "Voucher already approved or rejected"),
    ),
    tag = "vouchers"
)]
pub async fn reject_voucher(
    svc: web::Data<AppService>,
    req: HttpRequest,
    path: web::Path<String>,
    body: Option<web::Json<DecisionRequest>>,
) -> Result<HttpResponse, AppError> {
    let actor = actor(&req)?;
    let notes = body.map(|b| b.into_inner()).unwrap_or_default().notes;
    let voucher = svc
        .reject_voucher(&actor, &path.into_inner(), notes)
        .await?;
    Ok(HttpResponse::Ok().json(VoucherResponse::from(&voucher)))
}

/// POST /vouchers/refresh
///
/// Reloads both tables from the table service.
#[utoipa::path(
    post,
    path = "/vouchers/refresh",
    responses(
        (status = 200, description = "Local state reloaded", body = RefreshResponse),
        (status = 502, description = "Table service failed"),
    ),
    tag = "vouchers"
)]
pub async fn refresh_vouchers(svc: web::Data<AppService>) -> Result<HttpResponse, AppError> {
    let vouchers = svc.refresh().await?;
    Ok(HttpResponse::Ok().json(RefreshResponse { vouchers }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vouchers")
            .route("", web::post().to(create_voucher))
            .route("", web::get().to(list_vouchers))
            .route("/bulk-delete", web::post().to(bulk_delete_vouchers))
            .route("/import", web::post().to(import_vouchers))
            .route("/refresh", web::post().to(refresh_vouchers))
            .route("/{code}", web::get().to(get_voucher))
            .route("/{code}", web::put().to(update_voucher))
            .route("/{code}", web::delete().to(delete_voucher))
            .route("/{code}/approve", web::post().to(approve_voucher))
            .route("/{code}/reject", web::post().to(reject_voucher)),
    );
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use super::*;
    use crate::infrastructure::{ChatNotifier, TableAction, TableNames};
    use crate::{configure_app, in_memory_service};

    macro_rules! app {
        () => {{
            let (tables, svc) = in_memory_service(TableNames::default(), ChatNotifier::disabled());
            let app = test::init_service(
                App::new()
                    .app_data(web::Data::new(svc))
                    .configure(configure_app),
            )
            .await;
            (tables, app)
        }};
    }

    fn as_keeper(req: test::TestRequest) -> test::TestRequest {
        req.insert_header((USER_HEADER, "thu.kho"))
            .insert_header((ROLE_HEADER, "warehouse_keeper"))
    }

    fn as_staff(req: test::TestRequest) -> test::TestRequest {
        req.insert_header((USER_HEADER, "nv.an"))
            .insert_header((ROLE_HEADER, "staff"))
    }

    fn new_voucher(code: &str) -> Value {
        json!({
            "code": code,
            "kind": "outbound",
            "requester": "nv.an",
            "source": "Kho Tổng",
            "destination": "Công trình Q7",
            "lines": [{ "material_code": "A", "quantity": "2", "unit_price": "1000" }]
        })
    }

    #[actix_web::test]
    async fn create_returns_pending_voucher_with_totals() {
        let (_tables, app) = app!();

        let resp = test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers"))
                .set_json(new_voucher("V1"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: VoucherDetailResponse = test::read_body_json(resp).await;
        assert_eq!(body.voucher.status, "pending");
        assert_eq!(body.voucher.status_label, "Chờ duyệt");
        assert_eq!(body.lines[0].line_code, "V1_A");
        assert_eq!(body.totals.item_count, 1);
        assert_eq!(body.totals.total_quantity, "2");
        assert_eq!(body.totals.total_amount, "2000");
    }

    #[actix_web::test]
    async fn create_without_code_generates_one_from_kind() {
        let (_tables, app) = app!();
        let mut payload = new_voucher("");
        payload["kind"] = json!("Nhập kho");

        let resp = test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers"))
                .set_json(payload)
                .to_request(),
        )
        .await;

        let body: VoucherDetailResponse = test::read_body_json(resp).await;
        assert!(body.voucher.code.starts_with("PN"));
    }

    #[actix_web::test]
    async fn create_rejects_empty_lines_and_bad_decimals() {
        let (tables, app) = app!();
        let mut empty = new_voucher("V1");
        empty["lines"] = json!([]);
        let mut bad = new_voucher("V2");
        bad["lines"][0]["quantity"] = json!("hai");

        for payload in [empty, bad] {
            let resp = test::call_service(
                &app,
                as_staff(test::TestRequest::post().uri("/vouchers"))
                    .set_json(payload)
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
        assert!(tables.calls().is_empty());
    }

    #[actix_web::test]
    async fn requests_without_actor_are_unauthorized() {
        let (_tables, app) = app!();
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/vouchers")
                .set_json(new_voucher("V1"))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn approval_needs_permission_and_is_final() {
        let (_tables, app) = app!();
        test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers"))
                .set_json(new_voucher("V1"))
                .to_request(),
        )
        .await;

        let forbidden = test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers/V1/approve")).to_request(),
        )
        .await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let approved = test::call_service(
            &app,
            as_keeper(test::TestRequest::post().uri("/vouchers/V1/approve"))
                .set_json(json!({ "notes": "ok" }))
                .to_request(),
        )
        .await;
        assert_eq!(approved.status(), StatusCode::OK);
        let body: VoucherResponse = test::read_body_json(approved).await;
        assert_eq!(body.status, "approved");
        assert!(body.history.ends_with("thu.kho: Đã duyệt - ok"));

        let edit = test::call_service(
            &app,
            as_staff(test::TestRequest::put().uri("/vouchers/V1"))
                .set_json(new_voucher("V1"))
                .to_request(),
        )
        .await;
        assert_eq!(edit.status(), StatusCode::CONFLICT);

        let reject = test::call_service(
            &app,
            as_keeper(test::TestRequest::post().uri("/vouchers/V1/reject")).to_request(),
        )
        .await;
        assert_eq!(reject.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn failed_remote_delete_keeps_the_voucher() {
        let (tables, app) = app!();
        test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers"))
                .set_json(new_voucher("V1"))
                .to_request(),
        )
        .await;
        tables.fail_on(&TableNames::default().lines, TableAction::Delete);

        let resp = test::call_service(
            &app,
            as_staff(test::TestRequest::delete().uri("/vouchers/V1")).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let still_there = test::call_service(&app, test::TestRequest::get().uri("/vouchers/V1").to_request()).await;
        assert_eq!(still_there.status(), StatusCode::OK);
        let body: VoucherDetailResponse = test::read_body_json(still_there).await;
        assert_eq!(body.lines.len(), 1);
    }

    #[actix_web::test]
    async fn list_filters_by_search_and_tab() {
        let (_tables, app) = app!();
        for code in ["V1", "V2"] {
            test::call_service(
                &app,
                as_staff(test::TestRequest::post().uri("/vouchers"))
                    .set_json(new_voucher(code))
                    .to_request(),
            )
            .await;
        }
        test::call_service(
            &app,
            as_keeper(test::TestRequest::post().uri("/vouchers/V2/reject")).to_request(),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/vouchers?search=v&tab=pending").to_request(),
        )
        .await;
        let body: ListVouchersResponse = test::read_body_json(resp).await;
        assert_eq!(body.total, 1);
        assert_eq!(body.items[0].code, "V1");

        let bad_tab = test::call_service(
            &app,
            test::TestRequest::get().uri("/vouchers?tab=archive").to_request(),
        )
        .await;
        assert_eq!(bad_tab.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn import_can_skip_existing_codes() {
        let (_tables, app) = app!();
        test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers"))
                .set_json(new_voucher("V1"))
                .to_request(),
        )
        .await;

        let batch = json!({
            "vouchers": [
                { "code": "V1", "kind": "outbound" },
                { "code": "V2", "kind": "inbound" }
            ],
            "lines": [
                { "voucher_code": "V1", "material_code": "Z", "quantity": "1", "unit_price": "1" },
                { "voucher_code": "V2", "material_code": "B", "quantity": "3", "unit_price": "10" }
            ]
        });

        let rejected = test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers/import"))
                .set_json(batch.clone())
                .to_request(),
        )
        .await;
        assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers/import?skip_duplicates=true"))
                .set_json(batch)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: ImportResponse = test::read_body_json(resp).await;
        assert_eq!(body.imported, vec!["V2"]);
        assert_eq!(body.skipped, vec!["V1"]);
    }

    #[actix_web::test]
    async fn bulk_delete_removes_all_selected() {
        let (_tables, app) = app!();
        for code in ["V1", "V2", "V3"] {
            test::call_service(
                &app,
                as_staff(test::TestRequest::post().uri("/vouchers"))
                    .set_json(new_voucher(code))
                    .to_request(),
            )
            .await;
        }

        let resp = test::call_service(
            &app,
            as_staff(test::TestRequest::post().uri("/vouchers/bulk-delete"))
                .set_json(json!({ "codes": ["V1", "V3"] }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let list = test::call_service(&app, test::TestRequest::get().uri("/vouchers").to_request()).await;
        let body: ListVouchersResponse = test::read_body_json(list).await;
        assert_eq!(body.items.iter().map(|v| v.code.as_str()).collect::<Vec<_>>(), vec!["V2"]);
    }
}
