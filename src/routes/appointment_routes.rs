// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
    directory,
    error::{map_write_error, ApiError},
    lifecycle,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, AppointmentDto, AppointmentRow, VerificationType},
    notify::{
        TPL_ADMIN_APPOINTMENT_CANCELLED, TPL_ADMIN_NEW_APPOINTMENT, TPL_APPOINTMENT_CANCELLED,
        TPL_APPOINTMENT_CONFIRMATION,
    },
    slots,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment))
        .route("/appointments/user/{user_id}", get(get_user_appointments))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/cancel", patch(cancel_appointment))
}

fn is_admin(auth: &AuthContext) -> bool {
    auth.role == directory::ROLE_ADMIN
}

fn ensure_owner_or_admin(auth: &AuthContext, row: &AppointmentRow) -> Result<(), ApiError> {
    if is_admin(auth) || row.user_id == Some(auth.user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You may only access your own appointments".into(),
        ))
    }
}

/* ============================================================
   Field validation
   ============================================================ */

pub fn validate_full_name(name: &str) -> Result<(), ApiError> {
    let trimmed = name.trim();
    if trimmed.len() < 2 || trimmed.len() > 120 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "full_name must be 2-120 characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let e = email.trim();
    let looks_ok = e.len() >= 5
        && e.len() <= 254
        && !e.contains(char::is_whitespace)
        && matches!(e.split_once('@'), Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'));
    if !looks_ok {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "email is not a valid address".into(),
        ));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ApiError> {
    let cleaned: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if digits.is_empty() || digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "phone must be 7-15 digits, optionally prefixed with +".into(),
        ));
    }
    Ok(())
}

const MAX_NOTES_LEN: usize = 500;
const MAX_DOCUMENTS: usize = 20;

pub fn validate_notes(notes: Option<&str>) -> Result<(), ApiError> {
    if let Some(n) = notes {
        if n.len() > MAX_NOTES_LEN {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                format!("additional_notes must be at most {MAX_NOTES_LEN} characters"),
            ));
        }
    }
    Ok(())
}

pub fn validate_documents(documents: &[String]) -> Result<(), ApiError> {
    if documents.len() > MAX_DOCUMENTS {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("at most {MAX_DOCUMENTS} documents may be requested"),
        ));
    }
    if documents.iter().any(|d| d.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "document identifiers must not be empty".into(),
        ));
    }
    Ok(())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", "appointment_date must be YYYY-MM-DD".into())
    })
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
        ApiError::BadRequest("VALIDATION_ERROR", "appointment_time must be HH:MM (24h)".into())
    })
}

/* ============================================================
   Shared helpers
   ============================================================ */

pub const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, full_name, email, phone, user_id, verification_type,
    appointment_date, appointment_time, office_location, documents,
    additional_notes, status, confirmed_by, confirmation_date,
    cancellation_reason, cancelled_at, completed_at, admin_notes,
    verification_outcome, verified_by, verified_at, document_results,
    created_at, updated_at
"#;

pub async fn fetch_appointment(
    state: &AppState,
    appointment_id: Uuid,
) -> Result<AppointmentRow, ApiError> {
    sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1"
    ))
    .bind(appointment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::appointment_not_found)
}

pub fn appointment_mail_data(row: &AppointmentRow) -> serde_json::Value {
    json!({
        "full_name": row.full_name,
        "verification_type": row.verification_type.label(),
        "date": row.appointment_date.format("%Y-%m-%d").to_string(),
        "time": row.appointment_time.format("%H:%M").to_string(),
        "location": row.office_location,
        "status": row.status.label(),
    })
}

/// Alert every active admin. Enumeration failure is logged, not surfaced:
/// the appointment write already committed.
pub async fn alert_admins(state: &AppState, template: &'static str, data: serde_json::Value) {
    match directory::active_admins(&state.db).await {
        Ok(admins) => {
            for admin in admins {
                state.notify.enqueue(template, admin.email, data.clone());
            }
        }
        Err(e) => tracing::warn!("could not enumerate admins for alert: {e:?}"),
    }
}

/* ============================================================
   POST /appointments (public booking)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub verification_type: VerificationType,
    // YYYY-MM-DD / HH:MM
    pub appointment_date: String,
    pub appointment_time: String,
    #[serde(default)]
    pub documents: Vec<String>,
    pub additional_notes: Option<String>,
    pub office_location: Option<String>,
    pub user_id: Option<Uuid>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    validate_full_name(&req.full_name)?;
    validate_email(&req.email)?;
    validate_phone(&req.phone)?;
    validate_notes(req.additional_notes.as_deref())?;
    validate_documents(&req.documents)?;

    let date = parse_date(&req.appointment_date)?;
    let time = parse_time(&req.appointment_time)?;

    if !slots::is_working_day(date) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointments cannot be booked on weekends".into(),
        ));
    }
    if !slots::day_slot_times(date, &state.schedule).contains(&time) {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment_time does not match a bookable slot".into(),
        ));
    }

    // Resolve the optional owning user before any conflict work.
    if let Some(user_id) = req.user_id {
        if directory::lookup_user(&state.db, user_id).await?.is_none() {
            return Err(ApiError::NotFound("USER_NOT_FOUND", "user not found".into()));
        }
    }

    let now = state.clock.now();

    // Conflict pre-checks. These give fast, friendly errors; the partial
    // unique indexes are the authoritative guard for the racing case.
    let slot_taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM appointment
            WHERE appointment_date = $1
              AND appointment_time = $2
              AND status IN (0, 1)
        )
        "#,
    )
    .bind(date)
    .bind(time)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if slot_taken {
        return Err(ApiError::slot_taken());
    }

    let duplicate: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM appointment
            WHERE verification_type = $1
              AND status IN (0, 1)
              AND (
                    ($2::uuid IS NOT NULL AND user_id = $2)
                 OR ($2::uuid IS NULL AND user_id IS NULL AND email = $3)
              )
        )
        "#,
    )
    .bind(req.verification_type)
    .bind(req.user_id)
    .bind(req.email.trim())
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::db)?;
    if duplicate {
        return Err(ApiError::duplicate_appointment());
    }

    if date < now.date_naive() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "appointment_date must not be in the past".into(),
        ));
    }

    let location = req
        .office_location
        .unwrap_or_else(|| state.schedule.office_location.clone());

    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        INSERT INTO appointment (
          full_name,
          email,
          phone,
          user_id,
          verification_type,
          appointment_date,
          appointment_time,
          office_location,
          documents,
          additional_notes,
          status
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10, 0)
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(req.full_name.trim())
    .bind(req.email.trim())
    .bind(req.phone.trim())
    .bind(req.user_id)
    .bind(req.verification_type)
    .bind(date)
    .bind(time)
    .bind(&location)
    .bind(&req.documents)
    .bind(&req.additional_notes)
    .fetch_one(&state.db)
    .await
    .map_err(map_write_error)?;

    // Committed; notifications are best-effort from here on.
    let data = appointment_mail_data(&row);
    state
        .notify
        .enqueue(TPL_APPOINTMENT_CONFIRMATION, row.email.clone(), data.clone());
    alert_admins(&state, TPL_ADMIN_NEW_APPOINTMENT, data).await;

    Ok(Json(ApiOk { data: row.into() }))
}

/* ============================================================
   GET /appointments/user/{user_id}
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct UserAppointmentsData {
    pub appointments: Vec<AppointmentDto>,
    pub upcoming_count: usize,
    pub completed_count: usize,
}

pub async fn get_user_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiOk<UserAppointmentsData>>, ApiError> {
    if !is_admin(&auth) && auth.user_id != user_id {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You may only access your own appointments".into(),
        ));
    }

    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment
        WHERE user_id = $1
        ORDER BY appointment_date DESC, appointment_time DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let now = state.clock.now();
    let upcoming_count = rows
        .iter()
        .filter(|r| {
            r.status.is_active() && r.appointment_date.and_time(r.appointment_time).and_utc() > now
        })
        .count();
    let completed_count = rows
        .iter()
        .filter(|r| r.status == crate::models::AppointmentStatus::Completed)
        .count();

    Ok(Json(ApiOk {
        data: UserAppointmentsData {
            appointments: rows.into_iter().map(Into::into).collect(),
            upcoming_count,
            completed_count,
        },
    }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    let row = fetch_appointment(&state, appointment_id).await?;
    ensure_owner_or_admin(&auth, &row)?;
    Ok(Json(ApiOk { data: row.into() }))
}

/* ============================================================
   PATCH /appointments/{id}/cancel (self-service)
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancellation_reason: Option<String>,
}

pub async fn cancel_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<CancelAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    validate_notes(req.cancellation_reason.as_deref())?;

    let row = fetch_appointment(&state, appointment_id).await?;
    ensure_owner_or_admin(&auth, &row)?;

    // Guard against the row as read here. A concurrent admin confirm can
    // still land between this read and the update; that race is accepted.
    lifecycle::ensure_self_cancel(
        row.status,
        row.appointment_date,
        row.appointment_time,
        state.clock.now(),
    )?;

    let updated = sqlx::query_as::<_, AppointmentRow>(&format!(
        r#"
        UPDATE appointment
        SET status = 3,
            cancellation_reason = $2,
            cancelled_at = now(),
            updated_at = now()
        WHERE appointment_id = $1
        RETURNING {APPOINTMENT_COLUMNS}
        "#
    ))
    .bind(appointment_id)
    .bind(&req.cancellation_reason)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?
    .ok_or_else(ApiError::appointment_not_found)?;

    let mut data = appointment_mail_data(&updated);
    data["reason"] = serde_json::Value::String(
        req.cancellation_reason.unwrap_or_else(|| "cancelled by requester".into()),
    );
    state
        .notify
        .enqueue(TPL_APPOINTMENT_CANCELLED, updated.email.clone(), data.clone());
    alert_admins(&state, TPL_ADMIN_APPOINTMENT_CANCELLED, data).await;

    Ok(Json(ApiOk { data: updated.into() }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_full_name() {
        assert!(validate_full_name("Ada Lovelace").is_ok());
        assert!(validate_full_name("A").is_err());
        assert!(validate_full_name("  ").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("a.b+c@mail.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("x@nodot").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+44 20 7946 0958").is_ok());
        assert!(validate_phone("020-7946-0958").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("not a phone").is_err());
        assert!(validate_phone("+123456789012345678").is_err());
    }

    #[test]
    fn test_validate_notes_bound() {
        assert!(validate_notes(None).is_ok());
        assert!(validate_notes(Some("short note")).is_ok());
        assert!(validate_notes(Some(&"x".repeat(501))).is_err());
    }

    #[test]
    fn test_validate_documents() {
        assert!(validate_documents(&[]).is_ok());
        assert!(validate_documents(&["passport".into(), "proof_of_address".into()]).is_ok());
        assert!(validate_documents(&["".into()]).is_err());
        let too_many: Vec<String> = (0..21).map(|i| format!("doc{i}")).collect();
        assert!(validate_documents(&too_many).is_err());
    }

    #[test]
    fn test_parse_date_and_time() {
        assert!(parse_date("2025-06-10").is_ok());
        assert!(parse_date("2025-13-01").is_err());
        assert!(parse_time("09:00").is_ok());
        assert!(parse_time("9am").is_err());
        assert!(parse_time("25:00").is_err());
    }
}
