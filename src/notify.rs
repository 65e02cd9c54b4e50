use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    transport::smtp::authentication::Credentials, Message, SmtpTransport, Transport,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),
    #[error("bad address: {0}")]
    BadAddress(String),
    #[error("smtp error: {0}")]
    Smtp(String),
}

/// One queued notification: a template key plus the structured data the
/// template renders from. Recipient is a plain email address.
#[derive(Debug, Clone)]
pub struct NotificationTask {
    pub template: &'static str,
    pub recipient: String,
    pub data: Value,
}

/// Fire-and-forget dispatch handle. Enqueueing never fails from the caller's
/// point of view; delivery problems are the worker's to log. Status
/// transitions are committed before anything is enqueued, so a lost
/// notification never implies a lost state change.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<NotificationTask>,
}

impl NotificationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotificationTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, template: &'static str, recipient: impl Into<String>, data: Value) {
        let task = NotificationTask {
            template,
            recipient: recipient.into(),
            data,
        };
        if self.tx.send(task).is_err() {
            warn!("notification worker is gone; dropping notification");
        }
    }
}

/// Drains the queue one task at a time. A failed send is logged and the
/// worker moves on; nothing is retried and nothing propagates back to the
/// request that enqueued it.
pub async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<NotificationTask>,
    notifier: Arc<dyn Notifier>,
) {
    while let Some(task) = rx.recv().await {
        let template = task.template;
        let recipient = task.recipient.clone();
        if let Err(e) = notifier.send(task).await {
            warn!(template, recipient = %recipient, "notification failed: {e}");
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, task: NotificationTask) -> Result<(), NotifyError>;
}

/* ============================================================
   Templates
   ============================================================ */

pub const TPL_APPOINTMENT_CONFIRMATION: &str = "appointment_confirmation";
pub const TPL_APPOINTMENT_CANCELLED: &str = "appointment_cancelled";
pub const TPL_APPOINTMENT_STATUS: &str = "appointment_status";
pub const TPL_ADMIN_NEW_APPOINTMENT: &str = "admin_new_appointment";
pub const TPL_ADMIN_APPOINTMENT_CANCELLED: &str = "admin_appointment_cancelled";

fn str_field<'a>(data: &'a Value, key: &str) -> &'a str {
    data.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Render a template key + data into (subject, body).
pub fn render(template: &str, data: &Value) -> Result<(String, String), NotifyError> {
    let full_name = str_field(data, "full_name");
    let date = str_field(data, "date");
    let time = str_field(data, "time");
    let location = str_field(data, "location");
    let verification_type = str_field(data, "verification_type");

    match template {
        TPL_APPOINTMENT_CONFIRMATION => Ok((
            "Verification appointment received".to_string(),
            format!(
                "Hello {full_name},\n\n\
                 Your {verification_type} verification appointment has been received \
                 and is pending review.\n\n\
                 Date: {date}\nTime: {time}\nLocation: {location}\n\n\
                 You will be notified once an administrator confirms it."
            ),
        )),
        TPL_APPOINTMENT_CANCELLED => Ok((
            "Verification appointment cancelled".to_string(),
            format!(
                "Hello {full_name},\n\n\
                 Your verification appointment on {date} at {time} has been cancelled.\n\
                 Reason: {}",
                str_field(data, "reason"),
            ),
        )),
        TPL_APPOINTMENT_STATUS => Ok((
            format!(
                "Verification appointment {}",
                str_field(data, "status"),
            ),
            format!(
                "Hello {full_name},\n\n\
                 The status of your verification appointment on {date} at {time} \
                 is now: {}.",
                str_field(data, "status"),
            ),
        )),
        TPL_ADMIN_NEW_APPOINTMENT => Ok((
            "New verification appointment booked".to_string(),
            format!(
                "A new {verification_type} verification appointment was booked by \
                 {full_name} for {date} at {time} ({location})."
            ),
        )),
        TPL_ADMIN_APPOINTMENT_CANCELLED => Ok((
            "Verification appointment cancelled by requester".to_string(),
            format!(
                "The {verification_type} verification appointment booked by \
                 {full_name} for {date} at {time} was cancelled.\n\
                 Reason: {}",
                str_field(data, "reason"),
            ),
        )),
        other => Err(NotifyError::UnknownTemplate(other.to_string())),
    }
}

/* ============================================================
   Notifier implementations
   ============================================================ */

/// Delivers over SMTP. The blocking lettre transport runs on the blocking
/// pool so the worker task stays responsive.
pub struct SmtpNotifier {
    cfg: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(cfg: SmtpConfig) -> Self {
        Self { cfg }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, task: NotificationTask) -> Result<(), NotifyError> {
        let (subject, body) = render(task.template, &task.data)?;

        let email = Message::builder()
            .from(
                self.cfg
                    .mail_from
                    .parse()
                    .map_err(|_| NotifyError::BadAddress(self.cfg.mail_from.clone()))?,
            )
            .to(task
                .recipient
                .parse()
                .map_err(|_| NotifyError::BadAddress(task.recipient.clone()))?)
            .subject(subject)
            .body(body)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        let relay = self.cfg.relay.clone();
        let creds = Credentials::new(self.cfg.username.clone(), self.cfg.password.clone());

        tokio::task::spawn_blocking(move || {
            let mailer = SmtpTransport::relay(&relay)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?
                .credentials(creds)
                .build();
            mailer
                .send(&email)
                .map(|_| ())
                .map_err(|e| NotifyError::Smtp(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::Smtp(format!("send task panicked: {e}")))?
    }
}

/// Used when SMTP is not configured (dev / tests): renders the template and
/// logs it instead of delivering.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, task: NotificationTask) -> Result<(), NotifyError> {
        let (subject, _body) = render(task.template, &task.data)?;
        info!(
            recipient = %task.recipient,
            template = task.template,
            subject = %subject,
            "notification (smtp disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_confirmation() {
        let data = json!({
            "full_name": "Ada Lovelace",
            "verification_type": "candidate",
            "date": "2025-06-10",
            "time": "09:00",
            "location": "Main verification office",
        });
        let (subject, body) = render(TPL_APPOINTMENT_CONFIRMATION, &data).unwrap();
        assert!(subject.contains("received"));
        assert!(body.contains("Ada Lovelace"));
        assert!(body.contains("2025-06-10"));
        assert!(body.contains("09:00"));
    }

    #[test]
    fn test_render_status_update() {
        let data = json!({
            "full_name": "Ada",
            "date": "2025-06-10",
            "time": "09:00",
            "status": "confirmed",
        });
        let (subject, body) = render(TPL_APPOINTMENT_STATUS, &data).unwrap();
        assert_eq!(subject, "Verification appointment confirmed");
        assert!(body.contains("confirmed"));
    }

    #[test]
    fn test_admin_cancel_alert_is_worded_for_admins() {
        let data = json!({
            "full_name": "Ada Lovelace",
            "verification_type": "candidate",
            "date": "2025-06-10",
            "time": "09:00",
            "reason": "schedule conflict",
        });
        let (_, admin_body) = render(TPL_ADMIN_APPOINTMENT_CANCELLED, &data).unwrap();
        // third-person notice about the subject, not a letter to them
        assert!(!admin_body.starts_with("Hello"));
        assert!(admin_body.contains("booked by Ada Lovelace"));
        assert!(admin_body.contains("schedule conflict"));

        let (_, subject_body) = render(TPL_APPOINTMENT_CANCELLED, &data).unwrap();
        assert!(subject_body.starts_with("Hello Ada Lovelace"));
    }

    #[test]
    fn test_render_unknown_template_errors() {
        assert!(render("no_such_template", &json!({})).is_err());
    }

    #[tokio::test]
    async fn test_worker_swallows_failures() {
        // a task with an unknown template must not stop the worker
        let (queue, rx) = NotificationQueue::new();
        queue.enqueue("no_such_template", "a@example.com", json!({}));
        queue.enqueue(
            TPL_APPOINTMENT_STATUS,
            "b@example.com",
            json!({"full_name": "B", "status": "confirmed"}),
        );
        drop(queue);
        // returns once the channel is drained and closed
        run_worker(rx, Arc::new(LogNotifier)).await;
    }
}
