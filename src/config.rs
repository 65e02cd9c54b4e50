use std::env;

use chrono::NaiveTime;

/// Fixed daily slot template. One location, one resource, weekdays only.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub slot_minutes: i64,
    pub slots_per_day: usize,
    pub office_location: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            slot_minutes: 45,
            slots_per_day: 8,
            office_location: "Main verification office".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub relay: String,
    pub username: String,
    pub password: String,
    pub mail_from: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub schedule: ScheduleConfig,
    /// None means SMTP is not configured; notifications are logged only.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let defaults = ScheduleConfig::default();
        let schedule = ScheduleConfig {
            work_start: parse_time_var("WORK_START")?.unwrap_or(defaults.work_start),
            work_end: parse_time_var("WORK_END")?.unwrap_or(defaults.work_end),
            slot_minutes: env::var("SLOT_MINUTES")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(defaults.slot_minutes),
            slots_per_day: env::var("SLOTS_PER_DAY")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults.slots_per_day),
            office_location: env::var("OFFICE_LOCATION")
                .unwrap_or(defaults.office_location),
        };

        if schedule.slot_minutes <= 0 {
            anyhow::bail!("SLOT_MINUTES must be positive");
        }
        if schedule.work_end <= schedule.work_start {
            anyhow::bail!("WORK_END must be after WORK_START");
        }

        let smtp = match env::var("SMTP_RELAY") {
            Ok(relay) => Some(SmtpConfig {
                relay,
                username: env::var("SMTP_USERNAME")?,
                password: env::var("SMTP_PASSWORD")?,
                mail_from: env::var("MAIL_FROM")?,
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            schedule,
            smtp,
        })
    }
}

fn parse_time_var(name: &str) -> anyhow::Result<Option<NaiveTime>> {
    match env::var(name) {
        Ok(raw) => {
            let t = NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                .map_err(|_| anyhow::anyhow!("{name} must be HH:MM"))?;
            Ok(Some(t))
        }
        Err(_) => Ok(None),
    }
}
