use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::notify::NotificationQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub clock: Arc<dyn Clock>,
    pub notify: NotificationQueue,
    pub schedule: ScheduleConfig,
}

/* -------------------------
   Enums (stored as smallint)
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending = 0,
    Confirmed = 1,
    Completed = 2,
    Cancelled = 3,
}

impl AppointmentStatus {
    pub fn label(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// pending/confirmed appointments still occupy their slot.
    pub fn is_active(self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum VerificationType {
    Candidate = 0,
    Freelancer = 1,
    Company = 2,
    Organization = 3,
}

impl VerificationType {
    pub fn label(self) -> &'static str {
        match self {
            VerificationType::Candidate => "candidate",
            VerificationType::Freelancer => "freelancer",
            VerificationType::Company => "company",
            VerificationType::Organization => "organization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "smallint")]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum VerificationOutcome {
    Approved = 0,
    Rejected = 1,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub user_id: Option<Uuid>,
    pub verification_type: VerificationType,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub office_location: String,
    pub documents: Vec<String>,
    pub additional_notes: Option<String>,
    pub status: AppointmentStatus,
    pub confirmed_by: Option<Uuid>,
    pub confirmation_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub verification_outcome: Option<VerificationOutcome>,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub document_results: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct VerificationResultDto {
    pub outcome: VerificationOutcome,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub document_results: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    pub appointment_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub user_id: Option<Uuid>,
    pub verification_type: VerificationType,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub office_location: String,
    pub documents: Vec<String>,
    pub additional_notes: Option<String>,
    pub status: AppointmentStatus,
    pub confirmed_by: Option<Uuid>,
    pub confirmation_date: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub verification_result: Option<VerificationResultDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentRow> for AppointmentDto {
    fn from(r: AppointmentRow) -> Self {
        let verification_result = r.verification_outcome.map(|outcome| VerificationResultDto {
            outcome,
            verified_by: r.verified_by,
            verified_at: r.verified_at,
            document_results: r.document_results.clone(),
        });
        AppointmentDto {
            appointment_id: r.appointment_id,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone,
            user_id: r.user_id,
            verification_type: r.verification_type,
            appointment_date: r.appointment_date,
            appointment_time: r.appointment_time,
            office_location: r.office_location,
            documents: r.documents,
            additional_notes: r.additional_notes,
            status: r.status,
            confirmed_by: r.confirmed_by,
            confirmation_date: r.confirmation_date,
            cancellation_reason: r.cancellation_reason,
            cancelled_at: r.cancelled_at,
            completed_at: r.completed_at,
            admin_notes: r.admin_notes,
            verification_result,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
