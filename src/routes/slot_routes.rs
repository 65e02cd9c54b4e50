// src/routes/slot_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    models::{ApiOk, AppState},
    slots::{self, SlotDto},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/slots", get(get_slots))
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    // YYYY-MM-DD
    pub date: String,
    pub verification_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotListData {
    pub date: NaiveDate,
    pub slots: Vec<SlotDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

const KNOWN_TYPES: [&str; 5] = ["general", "candidate", "freelancer", "company", "organization"];

pub fn parse_slot_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into()))
}

fn validate_type_filter(filter: Option<&str>) -> Result<Option<&str>, ApiError> {
    match filter {
        Some(t) if !KNOWN_TYPES.contains(&t) => Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("unknown verification type: {t}"),
        )),
        other => Ok(other),
    }
}

/// GET /slots?date=YYYY-MM-DD&verification_type=
///
/// Read-only. Availability is advisory; the booking insert is what actually
/// claims a slot.
pub async fn get_slots(
    State(state): State<AppState>,
    Query(q): Query<SlotsQuery>,
) -> Result<Json<ApiOk<SlotListData>>, ApiError> {
    let date = parse_slot_date(&q.date)?;
    let type_filter = validate_type_filter(q.verification_type.as_deref())?;

    if !slots::is_working_day(date) {
        // Normal outcome, not an error: weekends simply have no slots.
        return Ok(Json(ApiOk {
            data: SlotListData {
                date,
                slots: vec![],
                message: Some("No appointments are available on weekends".into()),
            },
        }));
    }

    let booked: Vec<NaiveTime> = sqlx::query_scalar(
        r#"
        SELECT appointment_time
        FROM appointment
        WHERE appointment_date = $1
          AND status IN (0, 1)
        "#,
    )
    .bind(date)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    let slots = slots::annotate_slots(date, &state.schedule, type_filter, &booked);

    Ok(Json(ApiOk {
        data: SlotListData {
            date,
            slots,
            message: None,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slot_date() {
        assert!(parse_slot_date("2025-06-10").is_ok());
        assert!(parse_slot_date(" 2025-06-10 ").is_ok());
        assert!(parse_slot_date("10/06/2025").is_err());
        assert!(parse_slot_date("").is_err());
    }

    #[test]
    fn test_validate_type_filter() {
        assert!(validate_type_filter(None).unwrap().is_none());
        assert_eq!(validate_type_filter(Some("company")).unwrap(), Some("company"));
        assert!(validate_type_filter(Some("wizard")).is_err());
    }
}
