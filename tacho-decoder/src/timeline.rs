//! Timeline builder
//!
//! Turns the reconstructed ActivityChangeInfo stream into a contiguous,
//! duration-annotated activity sequence. Every change opens a state that
//! lasts until the next change; adjacent spans with the same
//! `(kind, slot, card_inserted)` state are merged. Ties on the same
//! timestamp are resolved by order of appearance: the last change wins and
//! the superseded zero-length span is dropped.

use crate::types::{Activity, ActivityChangeInfo, DailyActivityRecord, Timestamp};
use chrono::Duration;

/// Minutes in a day; changes at or past this offset are filler
const MINUTES_PER_DAY: u16 = 1440;

/// Build the merged timeline from daily activity records.
///
/// The result covers every minute between the first and the last change;
/// the final change has no successor to bound it and produces no span.
pub fn build(daily: &[DailyActivityRecord]) -> Vec<Activity> {
    let mut changes: Vec<(Timestamp, ActivityChangeInfo)> = Vec::new();
    let mut days: Vec<&DailyActivityRecord> = daily.iter().collect();
    days.sort_by_key(|d| d.day);

    for day in days {
        for change in &day.changes {
            if change.minute_of_day >= MINUTES_PER_DAY {
                continue;
            }
            let ts = day.day + Duration::minutes(change.minute_of_day as i64);
            changes.push((ts, *change));
        }
    }
    // Stable: same-timestamp changes keep appearance order
    changes.sort_by_key(|(ts, _)| *ts);

    let mut timeline: Vec<Activity> = Vec::new();
    for window in changes.windows(2) {
        let (start, change) = window[0];
        let (end, _) = window[1];
        if end <= start {
            // Tie: a later change supersedes this one before any time
            // passes
            continue;
        }
        let card_inserted = !change.card_withdrawn;
        if let Some(last) = timeline.last_mut() {
            if last.end == start
                && last.kind == change.activity
                && last.slot == change.slot
                && last.card_inserted == card_inserted
            {
                last.end = end;
                last.duration_minutes = (last.end - last.start).num_minutes();
                continue;
            }
        }
        timeline.push(Activity {
            kind: change.activity,
            start,
            end,
            duration_minutes: (end - start).num_minutes(),
            slot: change.slot,
            card_inserted,
        });
    }

    log::debug!(
        "Built timeline of {} activities from {} changes",
        timeline.len(),
        changes.len()
    );
    timeline
}
