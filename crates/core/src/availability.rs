use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;

pub const SLOT_INCREMENT_MINUTES: u32 = 30;
pub const MAX_SUGGESTIONS: usize = 3;

const ISO_MINUTES: &str = "%Y-%m-%dT%H:%M";
const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

const DEFAULT_BUSY_TITLE: &str = "Busy";

/// Recurring weekday meetings of the mock workday: title, start, end.
const MOCK_WORKDAY: &[(&str, (u32, u32), (u32, u32))] = &[
    ("Morning Standup", (9, 0), (9, 30)),
    ("Team Sync", (10, 0), (11, 0)),
    ("Lunch Break", (12, 0), (13, 0)),
    ("1-on-1 with Manager", (15, 0), (15, 30)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusyBlock {
    pub title: &'static str,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusyBlock {
    /// Parses ISO local datetimes (`2026-10-20T10:00` or with seconds).
    /// Returns `None` for unparseable or inverted blocks.
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        let start = parse_local(start)?;
        let end = parse_local(end)?;
        (end > start).then_some(Self {
            title: DEFAULT_BUSY_TITLE,
            start,
            end,
        })
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && end > self.start
    }
}

/// A busy block that collides with a proposed event, times as `03:00 PM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub title: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotOption {
    pub label: String,
    pub start: String,
    pub end: String,
    pub duration_min: u32,
    pub display: String,
}

/// Parses `start/end` pairs, skipping invalid ones, sorted by start.
pub fn parse_busy_blocks<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<BusyBlock> {
    let mut blocks = pairs
        .into_iter()
        .filter_map(|(start, end)| BusyBlock::parse(start, end))
        .collect::<Vec<_>>();
    blocks.sort_by_key(|block| block.start);
    blocks
}

/// Parses a `start/end,start/end` list, the format used by `--busy` and
/// `EXECAI_MOCK_BUSY`. Malformed entries are skipped.
pub fn parse_busy_spec(spec: &str) -> Vec<BusyBlock> {
    parse_busy_blocks(
        spec.split(',')
            .filter_map(|entry| entry.trim().split_once('/')),
    )
}

/// The mock workday for `day`: standup, team sync, lunch and a 1-on-1.
/// Weekends are empty.
pub fn mock_workday(day: NaiveDate) -> Vec<BusyBlock> {
    if day.weekday().number_from_monday() > 5 {
        return Vec::new();
    }
    MOCK_WORKDAY
        .iter()
        .filter_map(|(title, (start_h, start_m), (end_h, end_m))| {
            Some(BusyBlock {
                title: *title,
                start: day.and_hms_opt(*start_h, *start_m, 0)?,
                end: day.and_hms_opt(*end_h, *end_m, 0)?,
            })
        })
        .collect()
}

/// Busy blocks overlapping `[start, end)`, in calendar order.
pub fn check_conflicts(
    start: NaiveDateTime,
    end: NaiveDateTime,
    busy: &[BusyBlock],
) -> Vec<Conflict> {
    let mut hits = busy
        .iter()
        .filter(|block| block.overlaps(start, end))
        .collect::<Vec<_>>();
    hits.sort_by_key(|block| block.start);
    hits.into_iter()
        .map(|block| Conflict {
            title: block.title.to_string(),
            start: block.start.format("%I:%M %p").to_string(),
            end: block.end.format("%I:%M %p").to_string(),
        })
        .collect()
}

/// First free slots of `duration_min` inside working hours on weekdays,
/// stepping every [`SLOT_INCREMENT_MINUTES`], between `search_start` and `search_end`.
pub fn find_available_slots(
    busy: &[BusyBlock],
    search_start: NaiveDateTime,
    search_end: NaiveDateTime,
    duration_min: u32,
    hours: WorkingHours,
    max_results: usize,
) -> Vec<SlotOption> {
    let duration = Duration::minutes(i64::from(duration_min.max(1)));
    let increment = Duration::minutes(i64::from(SLOT_INCREMENT_MINUTES));

    let mut slots = Vec::new();
    let mut day = search_start.date();

    while day <= search_end.date() && slots.len() < max_results {
        if day.weekday().number_from_monday() <= 5 {
            let day_start = day.and_time(hours.start).max(search_start);
            let day_limit = day.and_time(hours.end).min(search_end);
            let mut slot_start = round_up(day_start);

            while slot_start + duration <= day_limit && slots.len() < max_results {
                let slot_end = slot_start + duration;
                let overlaps = busy
                    .iter()
                    .any(|block| block.overlaps(slot_start, slot_end));
                if !overlaps {
                    slots.push(SlotOption {
                        label: option_label(slots.len()),
                        start: slot_start.format(ISO_SECONDS).to_string(),
                        end: slot_end.format(ISO_SECONDS).to_string(),
                        duration_min,
                        display: slot_start.format("%a %b %d, %I:%M %p").to_string(),
                    });
                }
                slot_start += increment;
            }
        }

        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    slots
}

fn round_up(at: NaiveDateTime) -> NaiveDateTime {
    let truncated = at
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(at);
    let remainder = truncated.minute() % SLOT_INCREMENT_MINUTES;
    if remainder == 0 && truncated == at {
        return at;
    }
    truncated + Duration::minutes(i64::from(SLOT_INCREMENT_MINUTES - remainder))
}

fn option_label(index: usize) -> String {
    let letter = (b'A' + (index % 26) as u8) as char;
    format!("Option {letter}")
}

fn parse_local(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, ISO_SECONDS)
        .or_else(|_| NaiveDateTime::parse_from_str(value, ISO_MINUTES))
        .ok()
}
