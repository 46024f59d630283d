//! EU Regulation 561/2006 compliance engine
//!
//! Consumes the derived activity timeline and emits infractions plus
//! per-week aggregates. All rule arithmetic is in minutes.
//!
//! The timeline is partitioned into shifts (maximal activity sequences
//! ended by a daily rest of at least 9 hours) and weeks (Monday 00:00 UTC
//! to the following Monday). Findings are data, not errors: a file full
//! of violations still decodes and analyzes cleanly.

use crate::types::{Activity, ActivityKind, DailyActivityRecord, TachographFile, Timestamp};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Art. 7: break required after 4.5 h of driving
const CONTINUOUS_DRIVING_LIMIT: i64 = 270;
/// Art. 7: full qualifying break
const BREAK_FULL: i64 = 45;
/// Art. 7: first part of a split break
const BREAK_SPLIT_FIRST: i64 = 15;
/// Art. 7: second part of a split break
const BREAK_SPLIT_SECOND: i64 = 30;

/// Art. 6.1: regular daily driving limit (9 h)
const DAILY_DRIVING_LIMIT: i64 = 540;
/// Art. 6.1: extended daily driving limit (10 h)
const DAILY_DRIVING_EXTENDED: i64 = 600;
/// Art. 6.1: extensions permitted per calendar week
const MAX_EXTENSIONS_PER_WEEK: u32 = 2;

/// Art. 8: regular daily rest (11 h)
const DAILY_REST_REGULAR: i64 = 660;
/// Art. 8: reduced daily rest (9 h); also the shift boundary
const DAILY_REST_REDUCED: i64 = 540;
/// Art. 8: reduced daily rests permitted between two weekly rests
const MAX_REDUCED_RESTS: u32 = 3;
/// Art. 8: first part of a split daily rest (3 h)
const SPLIT_REST_FIRST: i64 = 180;

/// Art. 6.2: weekly driving limit (56 h)
const WEEKLY_DRIVING_LIMIT: i64 = 3360;
/// Art. 6.3: two-week rolling driving limit (90 h)
const BIWEEKLY_DRIVING_LIMIT: i64 = 5400;

/// Art. 8.6: regular weekly rest (45 h)
const WEEKLY_REST_REGULAR: i64 = 2700;
/// Art. 8.6: reduced weekly rest (24 h)
const WEEKLY_REST_REDUCED: i64 = 1440;
/// Art. 8.6: a weekly rest must begin within 6 x 24 h
const WEEKLY_REST_WINDOW: i64 = 6 * 24 * 60;
/// Art. 8.6: compensation deadline, weeks after the reduced rest's week
const COMPENSATION_WEEKS: i64 = 3;

/// Infraction severity per the 2009/5/EC grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// MI - minor
    Minor,
    /// SI - serious
    Serious,
    /// MSI - very serious
    VerySerious,
}

impl Severity {
    pub fn code(self) -> &'static str {
        match self {
            Severity::Minor => "MI",
            Severity::Serious => "SI",
            Severity::VerySerious => "MSI",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.code())
    }
}

/// Infraction categories emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InfractionCategory {
    #[serde(rename = "NO_BREAK_AFTER_4H30")]
    NoBreakAfter4h30,
    #[serde(rename = "DAILY_DRIVING_OVER_10H")]
    DailyDrivingOver10h,
    #[serde(rename = "EXTRA_DAILY_EXTENSION")]
    ExtraDailyExtension,
    #[serde(rename = "INSUFFICIENT_DAILY_REST")]
    InsufficientDailyRest,
    #[serde(rename = "REDUCED_REST_OVERUSE")]
    ReducedRestOveruse,
    #[serde(rename = "WEEKLY_DRIVING_OVER_56H")]
    WeeklyDrivingOver56h,
    #[serde(rename = "BIWEEKLY_DRIVING_OVER_90H")]
    BiweeklyDrivingOver90h,
    #[serde(rename = "WEEKLY_REST_TOO_LATE")]
    WeeklyRestTooLate,
    #[serde(rename = "WEEKLY_REST_COMPENSATION_MISSING")]
    WeeklyRestCompensationMissing,
}

impl InfractionCategory {
    pub fn code(self) -> &'static str {
        match self {
            InfractionCategory::NoBreakAfter4h30 => "NO_BREAK_AFTER_4H30",
            InfractionCategory::DailyDrivingOver10h => "DAILY_DRIVING_OVER_10H",
            InfractionCategory::ExtraDailyExtension => "EXTRA_DAILY_EXTENSION",
            InfractionCategory::InsufficientDailyRest => "INSUFFICIENT_DAILY_REST",
            InfractionCategory::ReducedRestOveruse => "REDUCED_REST_OVERUSE",
            InfractionCategory::WeeklyDrivingOver56h => "WEEKLY_DRIVING_OVER_56H",
            InfractionCategory::BiweeklyDrivingOver90h => "BIWEEKLY_DRIVING_OVER_90H",
            InfractionCategory::WeeklyRestTooLate => "WEEKLY_REST_TOO_LATE",
            InfractionCategory::WeeklyRestCompensationMissing => {
                "WEEKLY_REST_COMPENSATION_MISSING"
            }
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            InfractionCategory::NoBreakAfter4h30 => Severity::Serious,
            InfractionCategory::DailyDrivingOver10h => Severity::VerySerious,
            InfractionCategory::ExtraDailyExtension => Severity::Minor,
            InfractionCategory::InsufficientDailyRest => Severity::VerySerious,
            InfractionCategory::ReducedRestOveruse => Severity::Serious,
            InfractionCategory::WeeklyDrivingOver56h => Severity::VerySerious,
            InfractionCategory::BiweeklyDrivingOver90h => Severity::VerySerious,
            InfractionCategory::WeeklyRestTooLate => Severity::Serious,
            InfractionCategory::WeeklyRestCompensationMissing => Severity::Serious,
        }
    }
}

/// One compliance finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Infraction {
    /// Day of the triggering event (UTC)
    pub date: NaiveDate,
    pub category: InfractionCategory,
    pub severity: Severity,
    pub description: String,
    /// Indices into the timeline of the activities that triggered the
    /// finding
    pub activity_refs: Vec<usize>,
    pub shift_index: Option<usize>,
}

/// One shift: a maximal activity sequence ended by a daily rest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shift {
    /// Timeline index of the first activity
    pub start_index: usize,
    /// Timeline index of the last activity (the terminal rest for closed
    /// shifts)
    pub end_index: usize,
    pub start: Timestamp,
    pub end: Timestamp,
    pub driving_minutes: i64,
    /// Longest continuous rest that ended the shift; 0 when still open
    pub terminal_rest_minutes: i64,
    pub closed: bool,
    /// Force-closed after 24 h without a sufficient daily rest
    pub insufficient_rest: bool,
}

/// Per-week aggregates, Monday-anchored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub driving_minutes: i64,
    pub distance_km: u32,
    /// Qualifying breaks (rests of 45 min up to the daily-rest bound)
    pub breaks: u32,
    pub shifts: u32,
}

/// Complete output of one analysis pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplianceReport {
    pub infractions: Vec<Infraction>,
    pub shifts: Vec<Shift>,
    pub weeks: Vec<WeekSummary>,
}

/// Analyze a decoded file.
pub fn analyze(file: &TachographFile) -> ComplianceReport {
    analyze_timeline(&file.timeline, &file.activities)
}

/// Analyze a timeline; `daily` contributes the distance aggregates.
pub fn analyze_timeline(timeline: &[Activity], daily: &[DailyActivityRecord]) -> ComplianceReport {
    let mut report = ComplianceReport::default();
    if timeline.is_empty() {
        return report;
    }

    let shifts = segment_shifts(timeline, &mut report.infractions);
    check_continuous_driving(timeline, &mut report.infractions);
    check_daily_driving(&shifts, &mut report.infractions);
    check_daily_rest(timeline, &shifts, &mut report.infractions);
    check_weekly_driving(timeline, &mut report.infractions);
    check_weekly_rest(timeline, &mut report.infractions);

    report.weeks = summarize_weeks(timeline, daily, &shifts);
    report.infractions.sort_by_key(|i| i.date);
    report.shifts = shifts;
    log::debug!(
        "Compliance: {} shifts, {} weeks, {} infractions",
        report.shifts.len(),
        report.weeks.len(),
        report.infractions.len()
    );
    report
}

/// Monday of the calendar week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Partition the timeline into shifts.
///
/// A rest of at least 9 h closes the current shift. A shift running for
/// more than 24 h without such a rest is force-closed at the preceding
/// activity and flagged `INSUFFICIENT_DAILY_REST`; this keeps the
/// partition covering every activity exactly once.
fn segment_shifts(timeline: &[Activity], infractions: &mut Vec<Infraction>) -> Vec<Shift> {
    let mut shifts = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;

    while index < timeline.len() {
        let activity = &timeline[index];

        if activity.kind == ActivityKind::Rest && activity.duration_minutes >= DAILY_REST_REDUCED {
            shifts.push(make_shift(timeline, start, index, activity.duration_minutes, false));
            start = index + 1;
            index += 1;
            continue;
        }

        if index > start
            && activity.start - timeline[start].start >= Duration::hours(24)
        {
            let longest_rest = timeline[start..index]
                .iter()
                .filter(|a| a.kind == ActivityKind::Rest)
                .map(|a| a.duration_minutes)
                .max()
                .unwrap_or(0);
            let shift_index = shifts.len();
            infractions.push(Infraction {
                date: timeline[index - 1].start.date_naive(),
                category: InfractionCategory::InsufficientDailyRest,
                severity: InfractionCategory::InsufficientDailyRest.severity(),
                description: format!(
                    "Longest rest of {} min in the 24-hour period is below the reduced daily rest of {} min",
                    longest_rest, DAILY_REST_REDUCED
                ),
                activity_refs: (start..index).collect(),
                shift_index: Some(shift_index),
            });
            let mut shift = make_shift(timeline, start, index - 1, longest_rest, true);
            shift.closed = true;
            shifts.push(shift);
            start = index;
            continue;
        }

        index += 1;
    }

    if start < timeline.len() {
        // Trailing open shift: no terminal rest in the data
        let mut shift = make_shift(timeline, start, timeline.len() - 1, 0, false);
        shift.closed = false;
        shifts.push(shift);
    }
    shifts
}

fn make_shift(
    timeline: &[Activity],
    start_index: usize,
    end_index: usize,
    terminal_rest_minutes: i64,
    insufficient_rest: bool,
) -> Shift {
    let driving_minutes = timeline[start_index..=end_index]
        .iter()
        .filter(|a| a.kind == ActivityKind::Driving)
        .map(|a| a.duration_minutes)
        .sum();
    Shift {
        start_index,
        end_index,
        start: timeline[start_index].start,
        end: timeline[end_index].end,
        driving_minutes,
        terminal_rest_minutes,
        closed: true,
        insufficient_rest,
    }
}

/// Art. 7: continuous driving must be broken by 45 min of rest, or a
/// 15-then-30 split. Availability is not a break. One finding per
/// unbroken driving block.
fn check_continuous_driving(timeline: &[Activity], infractions: &mut Vec<Infraction>) {
    let mut accumulated = 0i64;
    let mut split_first_taken = false;
    let mut reported = false;
    let mut driving_refs: Vec<usize> = Vec::new();

    for (index, activity) in timeline.iter().enumerate() {
        match activity.kind {
            ActivityKind::Driving => {
                accumulated += activity.duration_minutes;
                driving_refs.push(index);
                if accumulated > CONTINUOUS_DRIVING_LIMIT && !split_first_taken && !reported {
                    infractions.push(Infraction {
                        date: activity.start.date_naive(),
                        category: InfractionCategory::NoBreakAfter4h30,
                        severity: InfractionCategory::NoBreakAfter4h30.severity(),
                        description: format!(
                            "{} min of driving without a qualifying {}-minute break",
                            accumulated, BREAK_FULL
                        ),
                        activity_refs: driving_refs.clone(),
                        shift_index: None,
                    });
                    reported = true;
                }
            }
            ActivityKind::Rest => {
                if activity.duration_minutes >= BREAK_FULL
                    || (split_first_taken && activity.duration_minutes >= BREAK_SPLIT_SECOND)
                {
                    accumulated = 0;
                    split_first_taken = false;
                    reported = false;
                    driving_refs.clear();
                } else if activity.duration_minutes >= BREAK_SPLIT_FIRST {
                    split_first_taken = true;
                }
            }
            ActivityKind::Work | ActivityKind::Availability => {}
        }
    }
}

/// Art. 6.1: daily driving per shift, with two permitted extensions to
/// 10 h per calendar week.
fn check_daily_driving(shifts: &[Shift], infractions: &mut Vec<Infraction>) {
    let mut extensions_per_week: BTreeMap<NaiveDate, u32> = BTreeMap::new();

    for (index, shift) in shifts.iter().enumerate() {
        let driving = shift.driving_minutes;
        if driving > DAILY_DRIVING_EXTENDED {
            infractions.push(Infraction {
                date: shift.start.date_naive(),
                category: InfractionCategory::DailyDrivingOver10h,
                severity: InfractionCategory::DailyDrivingOver10h.severity(),
                description: format!(
                    "Daily driving of {} min exceeds the 10-hour maximum",
                    driving
                ),
                activity_refs: (shift.start_index..=shift.end_index).collect(),
                shift_index: Some(index),
            });
        } else if driving > DAILY_DRIVING_LIMIT {
            let week = week_start(shift.start.date_naive());
            let used = extensions_per_week.entry(week).or_insert(0);
            *used += 1;
            if *used > MAX_EXTENSIONS_PER_WEEK {
                infractions.push(Infraction {
                    date: shift.start.date_naive(),
                    category: InfractionCategory::ExtraDailyExtension,
                    severity: InfractionCategory::ExtraDailyExtension.severity(),
                    description: format!(
                        "Daily driving of {} min uses a third 10-hour extension in the week of {}",
                        driving, week
                    ),
                    activity_refs: (shift.start_index..=shift.end_index).collect(),
                    shift_index: Some(index),
                });
            }
        }
    }
}

/// Art. 8: daily rest quality. The terminal rest of a closed shift must
/// reach 11 h, or 9 h as one of at most three reduced rests between two
/// weekly rests; a 3 h + 9 h split in that order counts as regular.
fn check_daily_rest(timeline: &[Activity], shifts: &[Shift], infractions: &mut Vec<Infraction>) {
    let mut reduced_used = 0u32;

    for (index, shift) in shifts.iter().enumerate() {
        if !shift.closed || shift.insufficient_rest {
            continue;
        }
        let terminal = shift.terminal_rest_minutes;
        if terminal >= WEEKLY_REST_REDUCED {
            // A weekly rest opens a fresh reduced-rest allowance
            reduced_used = 0;
            continue;
        }
        if terminal >= DAILY_REST_REGULAR {
            continue;
        }
        // 9..11 h: regular when preceded by a 3 h split part in the shift
        let has_split_part = timeline[shift.start_index..shift.end_index]
            .iter()
            .any(|a| a.kind == ActivityKind::Rest && a.duration_minutes >= SPLIT_REST_FIRST);
        if has_split_part {
            continue;
        }
        reduced_used += 1;
        if reduced_used > MAX_REDUCED_RESTS {
            infractions.push(Infraction {
                date: shift.end.date_naive(),
                category: InfractionCategory::ReducedRestOveruse,
                severity: InfractionCategory::ReducedRestOveruse.severity(),
                description: format!(
                    "Reduced daily rest of {} min used more than {} times between weekly rests",
                    terminal, MAX_REDUCED_RESTS
                ),
                activity_refs: vec![shift.end_index],
                shift_index: Some(index),
            });
        }
    }
}

/// Art. 6.2 / 6.3: weekly and rolling two-week driving totals.
fn check_weekly_driving(timeline: &[Activity], infractions: &mut Vec<Infraction>) {
    let mut weekly: BTreeMap<NaiveDate, (i64, NaiveDate)> = BTreeMap::new();
    for activity in timeline {
        if activity.kind != ActivityKind::Driving {
            continue;
        }
        let date = activity.start.date_naive();
        let entry = weekly.entry(week_start(date)).or_insert((0, date));
        entry.0 += activity.duration_minutes;
        entry.1 = date;
    }

    for (&week, &(minutes, last_date)) in &weekly {
        if minutes > WEEKLY_DRIVING_LIMIT {
            infractions.push(Infraction {
                date: last_date,
                category: InfractionCategory::WeeklyDrivingOver56h,
                severity: InfractionCategory::WeeklyDrivingOver56h.severity(),
                description: format!(
                    "Weekly driving of {} min exceeds the 56-hour limit in the week of {}",
                    minutes, week
                ),
                activity_refs: Vec::new(),
                shift_index: None,
            });
        }
        let previous = weekly
            .get(&(week - Duration::days(7)))
            .map(|&(m, _)| m)
            .unwrap_or(0);
        if previous + minutes > BIWEEKLY_DRIVING_LIMIT {
            infractions.push(Infraction {
                date: last_date,
                category: InfractionCategory::BiweeklyDrivingOver90h,
                severity: InfractionCategory::BiweeklyDrivingOver90h.severity(),
                description: format!(
                    "Driving of {} min over the weeks of {} and {} exceeds the 90-hour limit",
                    previous + minutes,
                    week - Duration::days(7),
                    week
                ),
                activity_refs: Vec::new(),
                shift_index: None,
            });
        }
    }
}

/// Art. 8.6: a weekly rest must begin within 6 x 24 h of the end of the
/// previous one, and a reduced weekly rest must be compensated en bloc
/// before the end of the third following week.
fn check_weekly_rest(timeline: &[Activity], infractions: &mut Vec<Infraction>) {
    let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
        return;
    };
    let weekly_rests: Vec<(usize, &Activity)> = timeline
        .iter()
        .enumerate()
        .filter(|(_, a)| a.kind == ActivityKind::Rest && a.duration_minutes >= WEEKLY_REST_REDUCED)
        .collect();

    // Timing: rolling window from the end of the previous weekly rest
    // (anchored at the start of the data before the first one)
    let mut window_anchor = first.start;
    for &(_, rest) in &weekly_rests {
        if (rest.start - window_anchor).num_minutes() > WEEKLY_REST_WINDOW {
            infractions.push(Infraction {
                date: rest.start.date_naive(),
                category: InfractionCategory::WeeklyRestTooLate,
                severity: InfractionCategory::WeeklyRestTooLate.severity(),
                description: format!(
                    "Weekly rest began {} min after the previous one ended (limit {} min)",
                    (rest.start - window_anchor).num_minutes(),
                    WEEKLY_REST_WINDOW
                ),
                activity_refs: Vec::new(),
                shift_index: None,
            });
        }
        window_anchor = rest.end;
    }
    let data_end = last.end;
    if (data_end - window_anchor).num_minutes() > WEEKLY_REST_WINDOW {
        infractions.push(Infraction {
            date: data_end.date_naive(),
            category: InfractionCategory::WeeklyRestTooLate,
            severity: InfractionCategory::WeeklyRestTooLate.severity(),
            description: format!(
                "No weekly rest began within {} min of the previous one",
                WEEKLY_REST_WINDOW
            ),
            activity_refs: Vec::new(),
            shift_index: None,
        });
    }

    // Compensation for reduced weekly rests
    for &(rest_index, rest) in &weekly_rests {
        if rest.duration_minutes >= WEEKLY_REST_REGULAR {
            continue;
        }
        let deficit = WEEKLY_REST_REGULAR - rest.duration_minutes;
        let deadline_date =
            week_start(rest.start.date_naive()) + Duration::weeks(COMPENSATION_WEEKS + 1);
        let deadline = deadline_date.and_time(chrono::NaiveTime::MIN).and_utc();
        if data_end < deadline {
            // The observation window ends before the deadline; cannot
            // judge compensation yet
            continue;
        }
        let compensated = timeline.iter().any(|a| {
            a.kind == ActivityKind::Rest
                && a.start > rest.end
                && a.start < deadline
                && a.duration_minutes >= DAILY_REST_REDUCED + deficit
        });
        if !compensated {
            infractions.push(Infraction {
                date: rest.start.date_naive(),
                category: InfractionCategory::WeeklyRestCompensationMissing,
                severity: InfractionCategory::WeeklyRestCompensationMissing.severity(),
                description: format!(
                    "Reduced weekly rest of {} min not compensated by {} before {}",
                    rest.duration_minutes, deficit, deadline_date
                ),
                activity_refs: vec![rest_index],
                shift_index: None,
            });
        }
    }
}

/// Aggregate counters per Monday-anchored week.
fn summarize_weeks(
    timeline: &[Activity],
    daily: &[DailyActivityRecord],
    shifts: &[Shift],
) -> Vec<WeekSummary> {
    let mut weeks: BTreeMap<NaiveDate, WeekSummary> = BTreeMap::new();

    for activity in timeline {
        let date = activity.start.date_naive();
        match activity.kind {
            ActivityKind::Driving => {
                week_entry(&mut weeks, date).driving_minutes += activity.duration_minutes;
            }
            ActivityKind::Rest => {
                if (BREAK_FULL..DAILY_REST_REDUCED).contains(&activity.duration_minutes) {
                    week_entry(&mut weeks, date).breaks += 1;
                }
            }
            _ => {}
        }
    }
    for day in daily {
        week_entry(&mut weeks, day.day.date_naive()).distance_km += day.day_distance_km as u32;
    }
    for shift in shifts {
        week_entry(&mut weeks, shift.start.date_naive()).shifts += 1;
    }

    weeks.into_values().collect()
}

fn week_entry(weeks: &mut BTreeMap<NaiveDate, WeekSummary>, date: NaiveDate) -> &mut WeekSummary {
    let week = week_start(date);
    weeks.entry(week).or_insert_with(|| WeekSummary {
        week_start: week,
        driving_minutes: 0,
        distance_km: 0,
        breaks: 0,
        shifts: 0,
    })
}
