use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::availability::group_by_block;
use super::domain::{AdminId, HallId, RoomId, StudentId};
use super::errors::AllocationError;
use super::repository::{AllocationNotifier, HostelRepository};
use super::service::{BookingRequest, HostelAllocationService, PaymentVerification};

const DEFAULT_TREND_DAYS: u32 = 7;
const DEFAULT_AUDIT_LIMIT: usize = 50;

type SharedService<R, N> = Arc<HostelAllocationService<R, N>>;

/// Router builder exposing the allocation engine over HTTP.
pub fn allocation_router<R, N>(service: SharedService<R, N>) -> Router
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/students/:student_id/halls",
            get(eligible_halls_handler::<R, N>),
        )
        .route(
            "/api/v1/students/:student_id/dashboard",
            get(dashboard_handler::<R, N>),
        )
        .route(
            "/api/v1/students/:student_id/receipt",
            get(receipt_handler::<R, N>),
        )
        .route(
            "/api/v1/students/:student_id/payment/verify",
            post(verify_payment_handler::<R, N>),
        )
        .route("/api/v1/halls/:hall_id/rooms", get(rooms_handler::<R, N>))
        .route(
            "/api/v1/halls/:hall_id/occupancy",
            get(occupancy_handler::<R, N>),
        )
        .route(
            "/api/v1/halls/:hall_id/receipts",
            get(hall_receipts_handler::<R, N>),
        )
        .route("/api/v1/bookings", post(booking_handler::<R, N>))
        .route(
            "/api/v1/rooms/:room_id/maintenance",
            patch(maintenance_handler::<R, N>),
        )
        .route(
            "/api/v1/rooms/:room_id/quarantine/clear",
            post(clear_quarantine_handler::<R, N>),
        )
        .route("/api/v1/allocations/trend", get(trend_handler::<R, N>))
        .route("/api/v1/audit", get(audit_handler::<R, N>))
        .with_state(service)
}

/// HTTP status for each engine error. Error bodies carry only the stable code.
pub fn error_status(error: &AllocationError) -> StatusCode {
    match error {
        AllocationError::PaymentNotVerified { .. } => StatusCode::PAYMENT_REQUIRED,
        AllocationError::StudentInactive { .. } | AllocationError::AdminOutOfScope { .. } => {
            StatusCode::FORBIDDEN
        }
        AllocationError::StudentNotFound { .. }
        | AllocationError::HallNotFound { .. }
        | AllocationError::RoomNotFound { .. }
        | AllocationError::AdminNotFound { .. }
        | AllocationError::ReceiptNotFound { .. } => StatusCode::NOT_FOUND,
        AllocationError::AlreadyAllocated { .. }
        | AllocationError::RoomUnderMaintenance { .. }
        | AllocationError::RoomFull { .. }
        | AllocationError::NoRoomAvailable { .. } => StatusCode::CONFLICT,
        AllocationError::HallGenderMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AllocationError::RoomQuarantined { .. } => StatusCode::LOCKED,
        AllocationError::Busy { .. } | AllocationError::Repository(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        AllocationError::DuplicateReceipt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(error: &AllocationError) -> Response {
    let payload = json!({
        "error": error.code(),
        "retryable": error.is_retryable(),
    });
    let status = error_status(error);
    if error.is_retryable() {
        (status, [(header::RETRY_AFTER, "1")], Json(payload)).into_response()
    } else {
        (status, Json(payload)).into_response()
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, AllocationError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(&error),
    }
}

fn invalid_request(code: &'static str) -> Response {
    let payload = json!({
        "error": code,
        "retryable": false,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

pub(crate) async fn eligible_halls_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    let student_id = StudentId(student_id);
    match service.eligible_halls(&student_id) {
        Ok(halls) => {
            let payload = json!({
                "student_id": student_id,
                "halls": halls,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn dashboard_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(
        StatusCode::OK,
        service.student_dashboard(&StudentId(student_id)),
    )
}

pub(crate) async fn receipt_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(StatusCode::OK, service.receipt(&StudentId(student_id)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyPaymentBody {
    admin_id: AdminId,
    payment_reference: String,
    amount_paid: u64,
}

pub(crate) async fn verify_payment_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(student_id): Path<String>,
    Json(body): Json<VerifyPaymentBody>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    let payment_reference = body.payment_reference.trim().to_string();
    if payment_reference.is_empty() {
        return invalid_request("invalid_payment_reference");
    }

    let verification = PaymentVerification {
        payment_reference,
        amount_paid: body.amount_paid,
    };
    match service.verify_payment(&StudentId(student_id), body.admin_id, verification) {
        Ok(student) => {
            let payload = json!({
                "student_id": student.student_id,
                "payment_status": student.payment_status.label(),
                "payment": student.payment,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn rooms_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(hall_id): Path<u32>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    let hall_id = HallId(hall_id);
    match service.available_rooms(hall_id) {
        Ok(rooms) => {
            let payload = json!({
                "hall_id": hall_id,
                "blocks": group_by_block(&rooms),
                "rooms": rooms,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn occupancy_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(hall_id): Path<u32>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(StatusCode::OK, service.occupancy_snapshot(HallId(hall_id)))
}

pub(crate) async fn hall_receipts_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(hall_id): Path<u32>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(StatusCode::OK, service.receipts(Some(HallId(hall_id))))
}

pub(crate) async fn booking_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Json(request): Json<BookingRequest>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(StatusCode::CREATED, service.book(request).await)
}

#[derive(Debug, Deserialize)]
pub(crate) struct MaintenanceBody {
    admin_id: AdminId,
    /// Absent means toggle.
    #[serde(default)]
    under_maintenance: Option<bool>,
}

pub(crate) async fn maintenance_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(room_id): Path<u32>,
    Json(body): Json<MaintenanceBody>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    let room_id = RoomId(room_id);
    let outcome = match body.under_maintenance {
        Some(flag) => service.set_maintenance(room_id, body.admin_id, flag).await,
        None => service.toggle_maintenance(room_id, body.admin_id).await,
    };
    respond(StatusCode::OK, outcome)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClearQuarantineBody {
    admin_id: AdminId,
}

pub(crate) async fn clear_quarantine_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Path(room_id): Path<u32>,
    Json(body): Json<ClearQuarantineBody>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    let room_id = RoomId(room_id);
    match service.clear_quarantine(room_id, body.admin_id) {
        Ok(cleared) => {
            let payload = json!({
                "room_id": room_id,
                "cleared": cleared,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrendQuery {
    hall_id: Option<u32>,
    days: Option<u32>,
}

pub(crate) async fn trend_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<TrendQuery>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(
        StatusCode::OK,
        service.allocation_trend(
            query.hall_id.map(HallId),
            query.days.unwrap_or(DEFAULT_TREND_DAYS),
        ),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuditQuery {
    limit: Option<usize>,
}

pub(crate) async fn audit_handler<R, N>(
    State(service): State<SharedService<R, N>>,
    Query(query): Query<AuditQuery>,
) -> Response
where
    R: HostelRepository + 'static,
    N: AllocationNotifier + 'static,
{
    respond(
        StatusCode::OK,
        service.audit_log(query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT)),
    )
}
