// src/services/availability.rs

//! Availability resolution: merges manual day/time preferences, external
//! calendar busy intervals and already-booked sessions into concrete
//! one-hour slots.
//!
//! Slots are instants (`DateTime<Utc>`) end to end; the reference timezone
//! only matters for deciding day boundaries and for display formatting.
//! Two users overlap when they share an instant, not a formatted string.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Default bookable hours, half-open: slots start at 10:00 up to 19:00.
pub const WORKING_HOURS: (u32, u32) = (10, 20);

/// How many calendar days ahead (including today) slots are generated for.
pub const HORIZON_DAYS: i64 = 7;

/// The single reference timezone for the whole system (IST, UTC+05:30).
pub fn reference_timezone() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
}

/// A half-open busy interval `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Strict interval overlap: touching endpoints do not conflict.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && self.start < end
    }
}

/// Manual preference inputs. Absent preferences are passed as empty
/// collections and default to maximal permissiveness.
#[derive(Debug, Clone, Default)]
pub struct ManualPreference {
    pub days: Vec<String>,
    pub times: Vec<String>,
}

/// Resolves the concrete available slots for one user.
///
/// * Enumerates `horizon_days` calendar days starting today (reference
///   timezone), skipping Saturdays and Sundays unconditionally.
/// * A non-empty manual day set restricts which weekdays qualify.
/// * Candidate hours come from the leading hour of each manual time entry,
///   or every working hour when no times are set.
/// * A slot survives unless it strictly overlaps a busy interval or a
///   booked session.
pub fn resolve_slots(
    now: DateTime<Utc>,
    manual: &ManualPreference,
    busy: &[Interval],
    booked: &[Interval],
    working_hours: (u32, u32),
    horizon_days: i64,
) -> Vec<DateTime<Utc>> {
    let tz = reference_timezone();
    let today = now.with_timezone(&tz).date_naive();
    let mut slots = Vec::new();

    for day_offset in 0..horizon_days {
        let date = today + Duration::days(day_offset);
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }

        let day_name = date.format("%A").to_string();
        if !manual.days.is_empty()
            && !manual
                .days
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&day_name))
        {
            continue;
        }

        let hours: Vec<u32> = if manual.times.is_empty() {
            (working_hours.0..working_hours.1).collect()
        } else {
            manual.times.iter().filter_map(|t| leading_hour(t)).collect()
        };

        for hour in hours {
            let Some(local) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let Some(slot_start) = local.and_local_timezone(tz).single() else {
                continue;
            };
            let slot_start = slot_start.with_timezone(&Utc);
            let slot_end = slot_start + Duration::hours(1);

            let conflicted = busy
                .iter()
                .chain(booked.iter())
                .any(|interval| interval.overlaps(slot_start, slot_end));

            if !conflicted {
                slots.push(slot_start);
            }
        }
    }

    slots.sort();
    slots.dedup();
    slots
}

/// Extracts the leading hour of a manual time entry such as
/// "14:00-16:00" or "14:30". Minutes are ignored.
fn leading_hour(entry: &str) -> Option<u32> {
    let start = entry.split('-').next()?;
    let hour: u32 = start.split(':').next()?.trim().parse().ok()?;
    (hour < 24).then_some(hour)
}

/// Renders a slot for presentation, e.g. "Monday, 18/08/2025, 10:00 AM".
pub fn format_slot(slot: DateTime<Utc>) -> String {
    slot.with_timezone(&reference_timezone())
        .format("%A, %d/%m/%Y, %I:%M %p")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // 2025-08-18 is a Monday. 00:00 UTC is 05:30 that Monday in IST.
    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 18, 0, 0, 0).unwrap()
    }

    fn ist_instant(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        reference_timezone()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn default_hours_five_weekdays() {
        let slots = resolve_slots(
            monday(),
            &ManualPreference::default(),
            &[],
            &[],
            WORKING_HOURS,
            HORIZON_DAYS,
        );
        // Mon-Fri, 10 hours each; Sat/Sun skipped.
        assert_eq!(slots.len(), 50);
        assert_eq!(slots[0], ist_instant(2025, 8, 18, 10));
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn weekend_never_emitted_even_if_manually_listed() {
        let manual = ManualPreference {
            days: vec!["Saturday".into(), "Sunday".into()],
            times: vec![],
        };
        let slots = resolve_slots(monday(), &manual, &[], &[], WORKING_HOURS, HORIZON_DAYS);
        assert!(slots.is_empty());
    }

    #[test]
    fn manual_days_restrict_output() {
        let manual = ManualPreference {
            days: vec!["monday".into()],
            times: vec![],
        };
        let slots = resolve_slots(monday(), &manual, &[], &[], WORKING_HOURS, HORIZON_DAYS);
        assert_eq!(slots.len(), 10);
        assert!(slots.iter().all(|s| {
            s.with_timezone(&reference_timezone()).weekday() == Weekday::Mon
        }));
    }

    #[test]
    fn manual_times_use_leading_hour_only() {
        let manual = ManualPreference {
            days: vec!["Monday".into()],
            times: vec!["14:00-16:00".into()],
        };
        let slots = resolve_slots(monday(), &manual, &[], &[], WORKING_HOURS, HORIZON_DAYS);
        assert_eq!(slots, vec![ist_instant(2025, 8, 18, 14)]);
    }

    #[test]
    fn busy_interval_rejects_overlapping_slot() {
        let busy = vec![Interval {
            start: ist_instant(2025, 8, 18, 10),
            end: ist_instant(2025, 8, 18, 11),
        }];
        let manual = ManualPreference {
            days: vec!["Monday".into()],
            times: vec![],
        };
        let slots = resolve_slots(monday(), &manual, &busy, &[], WORKING_HOURS, HORIZON_DAYS);
        assert_eq!(slots.len(), 9);
        assert!(!slots.contains(&ist_instant(2025, 8, 18, 10)));
    }

    #[test]
    fn touching_intervals_do_not_conflict() {
        // Busy ends exactly when the slot starts.
        let busy = vec![Interval {
            start: ist_instant(2025, 8, 18, 9),
            end: ist_instant(2025, 8, 18, 10),
        }];
        let manual = ManualPreference {
            days: vec!["Monday".into()],
            times: vec!["10:00-11:00".into()],
        };
        let slots = resolve_slots(monday(), &manual, &busy, &[], WORKING_HOURS, HORIZON_DAYS);
        assert_eq!(slots, vec![ist_instant(2025, 8, 18, 10)]);
    }

    #[test]
    fn booked_session_excludes_its_slot() {
        let booked = vec![Interval {
            start: ist_instant(2025, 8, 19, 12),
            end: ist_instant(2025, 8, 19, 13),
        }];
        let slots = resolve_slots(
            monday(),
            &ManualPreference::default(),
            &[],
            &booked,
            WORKING_HOURS,
            HORIZON_DAYS,
        );
        assert!(!slots.contains(&ist_instant(2025, 8, 19, 12)));
        assert!(slots.contains(&ist_instant(2025, 8, 19, 11)));
        assert!(slots.contains(&ist_instant(2025, 8, 19, 13)));
    }

    #[test]
    fn malformed_time_entries_are_skipped() {
        let manual = ManualPreference {
            days: vec!["Monday".into()],
            times: vec!["evening".into(), "25:00".into(), "11:00".into()],
        };
        let slots = resolve_slots(monday(), &manual, &[], &[], WORKING_HOURS, HORIZON_DAYS);
        assert_eq!(slots, vec![ist_instant(2025, 8, 18, 11)]);
    }

    #[test]
    fn formats_in_reference_timezone() {
        let formatted = format_slot(ist_instant(2025, 8, 18, 10));
        assert_eq!(formatted, "Monday, 18/08/2025, 10:00 AM");
    }
}
