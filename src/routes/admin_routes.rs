// src/routes/admin_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    directory,
    error::ApiError,
    lifecycle,
    middleware::auth_context::AuthContext,
    models::{
        ApiOk, AppState, AppointmentDto, AppointmentRow, AppointmentStatus, VerificationOutcome,
        VerificationType,
    },
    notify::TPL_APPOINTMENT_STATUS,
    routes::appointment_routes::{
        appointment_mail_data, fetch_appointment, parse_date, validate_notes,
        APPOINTMENT_COLUMNS,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/appointments", get(list_appointments))
        .route("/admin/appointments/date/{date}", get(list_appointments_for_date))
        .route("/admin/appointments/{appointment_id}/status", patch(update_status))
        .route("/admin/appointments/bulk-update", post(bulk_update))
}

fn ensure_admin(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.role == directory::ROLE_ADMIN {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admins can manage appointments".into(),
        ))
    }
}

fn parse_status_filter(raw: &str) -> Result<AppointmentStatus, ApiError> {
    match raw.trim() {
        "pending" => Ok(AppointmentStatus::Pending),
        "confirmed" => Ok(AppointmentStatus::Confirmed),
        "completed" => Ok(AppointmentStatus::Completed),
        "cancelled" => Ok(AppointmentStatus::Cancelled),
        other => Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown status: {other}"),
        )),
    }
}

fn parse_type_filter(raw: &str) -> Result<VerificationType, ApiError> {
    match raw.trim() {
        "candidate" => Ok(VerificationType::Candidate),
        "freelancer" => Ok(VerificationType::Freelancer),
        "company" => Ok(VerificationType::Company),
        "organization" => Ok(VerificationType::Organization),
        other => Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown verification type: {other}"),
        )),
    }
}

/* ============================================================
   GET /admin/appointments (filtered + paginated)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub verification_type: Option<String>,
    // YYYY-MM-DD, inclusive bounds
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TypeBreakdown {
    pub verification_type: VerificationType,
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
}

#[derive(Debug, Serialize)]
pub struct ListData {
    pub appointments: Vec<AppointmentDto>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    /// Per-type aggregate over the whole filtered set, not the page.
    pub breakdown: Vec<TypeBreakdown>,
}

const FILTER_WHERE: &str = r#"
    ($1::smallint IS NULL OR status = $1)
    AND ($2::smallint IS NULL OR verification_type = $2)
    AND ($3::date IS NULL OR appointment_date >= $3)
    AND ($4::date IS NULL OR appointment_date <= $4)
"#;

fn validate_pagination(
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<(i64, i64, i64), ApiError> {
    let page = page.unwrap_or(1);
    let page_size = page_size.unwrap_or(20);
    if page < 1 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "page must be >= 1".into(),
        ));
    }
    if !(1..=100).contains(&page_size) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "page_size must be between 1 and 100".into(),
        ));
    }
    // OFFSET is computed here so an absurd page number is rejected instead
    // of overflowing i64.
    let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
        ApiError::BadRequest("VALIDATION_ERROR", "page is out of range".into())
    })?;
    Ok((page, page_size, offset))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<ListData>>, ApiError> {
    ensure_admin(&auth)?;

    let status = q.status.as_deref().map(parse_status_filter).transpose()?;
    let vtype = q
        .verification_type
        .as_deref()
        .map(parse_type_filter)
        .transpose()?;
    let date_from: Option<NaiveDate> = q.date_from.as_deref().map(parse_date).transpose()?;
    let date_to: Option<NaiveDate> = q.date_to.as_deref().map(parse_date).transpose()?;
    let (page, page_size, offset) = validate_pagination(q.page, q.page_size)?;

    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment
        WHERE {FILTER_WHERE}
        ORDER BY appointment_date DESC, appointment_time DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(status)
    .bind(vtype)
    .bind(date_from)
    .bind(date_to)
    .bind(page_size)
    .bind(offset)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM appointment WHERE {FILTER_WHERE}"
    ))
    .bind(status)
    .bind(vtype)
    .bind(date_from)
    .bind(date_to)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let breakdown = sqlx::query_as::<_, TypeBreakdown>(&format!(
        r#"
        SELECT
          verification_type,
          COUNT(*) AS total,
          COUNT(*) FILTER (WHERE status = 0) AS pending,
          COUNT(*) FILTER (WHERE status = 1) AS confirmed
        FROM appointment
        WHERE {FILTER_WHERE}
        GROUP BY verification_type
        ORDER BY verification_type
        "#
    ))
    .bind(status)
    .bind(vtype)
    .bind(date_from)
    .bind(date_to)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: ListData {
            appointments: rows.into_iter().map(Into::into).collect(),
            page,
            page_size,
            total,
            breakdown,
        },
    }))
}

/* ============================================================
   GET /admin/appointments/date/{date}
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: AppointmentStatus,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct DateListData {
    pub date: NaiveDate,
    pub appointments: Vec<AppointmentDto>,
    pub status_counts: Vec<StatusCount>,
}

pub async fn list_appointments_for_date(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(date): Path<String>,
    Query(q): Query<DateQuery>,
) -> Result<Json<ApiOk<DateListData>>, ApiError> {
    ensure_admin(&auth)?;

    let date = parse_date(&date)?;
    let status = q.status.as_deref().map(parse_status_filter).transpose()?;

    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment
        WHERE appointment_date = $1
          AND ($2::smallint IS NULL OR status = $2)
        ORDER BY appointment_time ASC
        "#
    ))
    .bind(date)
    .bind(status)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let status_counts = sqlx::query_as::<_, StatusCount>(
        r#"
        SELECT status, COUNT(*) AS count
        FROM appointment
        WHERE appointment_date = $1
        GROUP BY status
        ORDER BY status
        "#,
    )
    .bind(date)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk {
        data: DateListData {
            date,
            appointments: rows.into_iter().map(Into::into).collect(),
            status_counts,
        },
    }))
}

/* ============================================================
   PATCH /admin/appointments/{id}/status
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct VerificationResultInput {
    pub outcome: VerificationOutcome,
    pub document_results: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub admin_notes: Option<String>,
    /// Only meaningful together with status = completed.
    pub verification_result: Option<VerificationResultInput>,
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    ensure_admin(&auth)?;
    lifecycle::ensure_admin_target(req.status)?;
    validate_notes(req.admin_notes.as_deref())?;

    if req.verification_result.is_some() && req.status != AppointmentStatus::Completed {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "verification_result may only be set when completing an appointment".into(),
        ));
    }

    let row = fetch_appointment(&state, appointment_id).await?;
    lifecycle::ensure_transition(row.status, req.status)?;

    let (outcome, document_results) = match req.verification_result {
        Some(r) => (Some(r.outcome), r.document_results),
        None => (None, None),
    };

    // The pre-read guard above is only a fast check; the status predicate
    // here makes the transition atomic. If another admin moved the row in
    // between, zero rows match and the stale writer gets the guard error
    // instead of overwriting a terminal state.
    let updated = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        UPDATE appointment
        SET
          status = $2,
          admin_notes = COALESCE($3, admin_notes),
          confirmed_by = CASE WHEN $2 = 1 THEN $4 ELSE confirmed_by END,
          confirmation_date = CASE WHEN $2 = 1 THEN now() ELSE confirmation_date END,
          completed_at = CASE WHEN $2 = 2 THEN now() ELSE completed_at END,
          cancelled_at = CASE WHEN $2 = 3 THEN now() ELSE cancelled_at END,
          verification_outcome = COALESCE($5, verification_outcome),
          verified_by = CASE WHEN $5 IS NOT NULL THEN $4 ELSE verified_by END,
          verified_at = CASE WHEN $5 IS NOT NULL THEN now() ELSE verified_at END,
          document_results = COALESCE($6, document_results),
          updated_at = now()
        WHERE appointment_id = $1
          AND status = $7
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(appointment_id)
    .bind(req.status)
    .bind(&req.admin_notes)
    .bind(auth.user_id)
    .bind(outcome)
    .bind(document_results)
    .bind(row.status)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(lifecycle::transition_conflict)?;

    state.notify.enqueue(
        TPL_APPOINTMENT_STATUS,
        updated.email.clone(),
        appointment_mail_data(&updated),
    );

    Ok(Json(ApiOk { data: updated.into() }))
}

/* ============================================================
   POST /admin/appointments/bulk-update
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub appointment_ids: Vec<Uuid>,
    pub status: AppointmentStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateData {
    pub matched: i64,
    pub modified: i64,
}

pub async fn bulk_update(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<BulkUpdateRequest>,
) -> Result<Json<ApiOk<BulkUpdateData>>, ApiError> {
    ensure_admin(&auth)?;

    if req.appointment_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment_ids must not be empty".into(),
        ));
    }
    lifecycle::ensure_admin_target(req.status)?;
    validate_notes(req.admin_notes.as_deref())?;

    // matched = ids that exist at all; modified = rows the transition applied
    // to. Unknown ids and rows already terminal (or already in the target
    // state) are skipped, not errors.
    let matched: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM appointment
        WHERE appointment_id = ANY($1)
        "#,
    )
    .bind(&req.appointment_ids)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;

    let updated = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        UPDATE appointment
        SET
          status = $2,
          admin_notes = COALESCE($3, admin_notes),
          confirmed_by = CASE WHEN $2 = 1 THEN $4 ELSE confirmed_by END,
          confirmation_date = CASE WHEN $2 = 1 THEN now() ELSE confirmation_date END,
          completed_at = CASE WHEN $2 = 2 THEN now() ELSE completed_at END,
          cancelled_at = CASE WHEN $2 = 3 THEN now() ELSE cancelled_at END,
          updated_at = now()
        WHERE appointment_id = ANY($1)
          AND status IN (0, 1)
          AND status <> $2
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(&req.appointment_ids)
    .bind(req.status)
    .bind(&req.admin_notes)
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let modified = updated.len() as i64;

    // One notification per affected appointment; each is independent and
    // best-effort.
    for row in &updated {
        state.notify.enqueue(
            TPL_APPOINTMENT_STATUS,
            row.email.clone(),
            appointment_mail_data(row),
        );
    }

    tracing::info!(
        matched,
        modified,
        status = req.status.label(),
        "bulk appointment update"
    );

    Ok(Json(ApiOk {
        data: BulkUpdateData { matched, modified },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(parse_status_filter("pending").unwrap(), AppointmentStatus::Pending);
        assert_eq!(parse_status_filter(" cancelled ").unwrap(), AppointmentStatus::Cancelled);
        assert!(parse_status_filter("archived").is_err());
    }

    #[test]
    fn test_parse_type_filter() {
        assert_eq!(parse_type_filter("candidate").unwrap(), VerificationType::Candidate);
        assert!(parse_type_filter("general").is_err());
    }

    #[test]
    fn test_validate_pagination_defaults_and_bounds() {
        assert_eq!(validate_pagination(None, None).unwrap(), (1, 20, 0));
        assert_eq!(validate_pagination(Some(3), Some(50)).unwrap(), (3, 50, 100));
        assert!(validate_pagination(Some(0), None).is_err());
        assert!(validate_pagination(None, Some(0)).is_err());
        assert!(validate_pagination(None, Some(101)).is_err());
    }

    #[test]
    fn test_validate_pagination_rejects_overflowing_page() {
        // an offset that cannot be represented must be a 400, not a panic
        assert!(validate_pagination(Some(i64::MAX), Some(100)).is_err());
        assert!(validate_pagination(Some(i64::MAX), None).is_err());
        // the largest representable offset is still fine
        assert!(validate_pagination(Some(i64::MAX / 100), Some(100)).is_ok());
    }
}
