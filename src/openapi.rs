use utoipa::OpenApi;

use crate::handlers::vouchers;

#[derive(OpenApi)]
#[openapi(
    paths(
        vouchers::create_voucher,
        vouchers::list_vouchers,
        vouchers::get_voucher,
        vouchers::update_voucher,
        vouchers::delete_voucher,
        vouchers::bulk_delete_vouchers,
        vouchers::import_vouchers,
        vouchers::approve_voucher,
        vouchers::reject_voucher,
        vouchers::refresh_vouchers,
    ),
    components(schemas(
        vouchers::CreateVoucherRequest,
        vouchers::UpdateVoucherRequest,
        vouchers::HeaderRequest,
        vouchers::LineRequest,
        vouchers::DecisionRequest,
        vouchers::BulkDeleteRequest,
        vouchers::ImportRequest,
        vouchers::ImportVoucherRequest,
        vouchers::ImportLineRequest,
        vouchers::VoucherResponse,
        vouchers::LineResponse,
        vouchers::TotalsResponse,
        vouchers::VoucherDetailResponse,
        vouchers::ListVouchersResponse,
        vouchers::ImportResponse,
        vouchers::RefreshResponse,
    )),
    tags((name = "vouchers", description = "Warehouse inbound/outbound vouchers and their approval"))
)]
pub struct ApiDoc;
