use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;

use crate::config::ScheduleConfig;

#[derive(Debug, Clone, Serialize)]
pub struct SlotDto {
    pub slot_id: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_type: &'static str,
    pub verification_type: String,
    pub location: String,
    pub capacity: i32,
    pub booked_count: i32,
    pub is_available: bool,
}

pub fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Expand the fixed daily template into candidate slot start times.
/// A slot is kept only if it ends within the working window, and at most
/// `slots_per_day` slots are produced. Weekends yield nothing.
pub fn day_slot_times(date: NaiveDate, schedule: &ScheduleConfig) -> Vec<NaiveTime> {
    if !is_working_day(date) {
        return vec![];
    }

    let dur = Duration::minutes(schedule.slot_minutes);
    let mut times = Vec::with_capacity(schedule.slots_per_day);
    for i in 0..schedule.slots_per_day {
        let start = schedule.work_start + dur * (i as i32);
        let end = start + dur;
        if end > schedule.work_end || start < schedule.work_start {
            break;
        }
        times.push(start);
    }
    times
}

/// Annotate the day's template with live availability. `booked` holds the
/// start times of active (pending/confirmed) appointments on that date;
/// capacity is fixed at 1 so a slot is available iff it is unbooked.
/// Read-only: nothing here reserves anything, availability is advisory
/// until the booking insert.
pub fn annotate_slots(
    date: NaiveDate,
    schedule: &ScheduleConfig,
    verification_type: Option<&str>,
    booked: &[NaiveTime],
) -> Vec<SlotDto> {
    let dur = Duration::minutes(schedule.slot_minutes);
    let requested_type = verification_type.unwrap_or("general").to_string();

    day_slot_times(date, schedule)
        .into_iter()
        .map(|start| {
            let booked_count = if booked.contains(&start) { 1 } else { 0 };
            SlotDto {
                slot_id: format!("{}-{}", date.format("%Y-%m-%d"), start.format("%H:%M")),
                start_time: start,
                end_time: start + dur,
                slot_type: "verification",
                verification_type: requested_type.clone(),
                location: schedule.office_location.clone(),
                capacity: 1,
                booked_count,
                is_available: booked_count == 0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> ScheduleConfig {
        ScheduleConfig::default()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_weekend_yields_no_slots() {
        let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 8).unwrap();
        assert!(day_slot_times(saturday, &schedule()).is_empty());
        assert!(day_slot_times(sunday, &schedule()).is_empty());
    }

    #[test]
    fn test_weekday_yields_full_template() {
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let times = day_slot_times(tuesday, &schedule());
        assert_eq!(times.len(), 8);
        assert_eq!(times[0], t(9, 0));
        assert_eq!(times[1], t(9, 45));
        // 09:00 + 7 * 45min
        assert_eq!(times[7], t(14, 15));
    }

    #[test]
    fn test_template_respects_working_window() {
        let mut s = schedule();
        s.slots_per_day = 50;
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let times = day_slot_times(tuesday, &s);
        // last slot must still end by 16:00
        let last = *times.last().unwrap();
        assert!(last + Duration::minutes(s.slot_minutes) <= s.work_end);
        assert_eq!(times.len(), 9); // 420min window / 45min
    }

    #[test]
    fn test_annotation_marks_booked_slot_only() {
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let slots = annotate_slots(tuesday, &schedule(), None, &[t(9, 0)]);
        assert_eq!(slots.len(), 8);
        assert!(!slots[0].is_available);
        assert_eq!(slots[0].booked_count, 1);
        assert!(slots[1..].iter().all(|s| s.is_available && s.booked_count == 0));
    }

    #[test]
    fn test_slot_dto_shape() {
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let slots = annotate_slots(tuesday, &schedule(), Some("company"), &[]);
        let first = &slots[0];
        assert_eq!(first.slot_id, "2025-06-10-09:00");
        assert_eq!(first.end_time, t(9, 45));
        assert_eq!(first.verification_type, "company");
        assert_eq!(first.capacity, 1);
    }

    #[test]
    fn test_unfiltered_type_defaults_to_general() {
        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let slots = annotate_slots(tuesday, &schedule(), None, &[]);
        assert!(slots.iter().all(|s| s.verification_type == "general"));
    }
}
