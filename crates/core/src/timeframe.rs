use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;

use crate::entities::parse_count_word;

/// Inclusive range of calendar dates to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }
}

const DEFAULT_LOOKAHEAD_DAYS: u64 = 7;

/// Turns a normalized timeframe phrase into dates relative to `anchor`.
/// Unrecognized or missing phrases search the week after the anchor.
pub fn resolve_timeframe(anchor: NaiveDate, timeframe: Option<&str>) -> DateWindow {
    let fallback = DateWindow {
        start: add_days(anchor, 1),
        end: add_days(anchor, DEFAULT_LOOKAHEAD_DAYS),
    };

    let Some(phrase) = timeframe.map(|value| value.trim().to_lowercase()) else {
        return fallback;
    };

    match phrase.as_str() {
        "today" | "tonight" | "later today" | "this morning" | "this afternoon"
        | "this evening" | "end of day" | "end of the day" => DateWindow::single(anchor),
        "tomorrow" => DateWindow::single(add_days(anchor, 1)),
        "day after tomorrow" => DateWindow::single(add_days(anchor, 2)),
        "this week" | "coming week" => {
            let friday = next_or_same(anchor, Weekday::Fri);
            if anchor.weekday().number_from_monday() > 5 {
                next_work_week(anchor)
            } else {
                DateWindow {
                    start: anchor,
                    end: friday,
                }
            }
        }
        "next week" => next_work_week(anchor),
        "end of week" | "end of the week" => DateWindow::single(next_or_same(anchor, Weekday::Fri)),
        "this weekend" | "next weekend" | "coming weekend" => {
            let saturday = next_or_same(anchor, Weekday::Sat);
            let saturday = if phrase.starts_with("next") && saturday == anchor {
                add_days(saturday, 7)
            } else {
                saturday
            };
            DateWindow {
                start: saturday,
                end: add_days(saturday, 1),
            }
        }
        "next month" | "this month" | "coming month" => {
            let first = first_of_next_month(anchor);
            if phrase == "this month" {
                DateWindow {
                    start: anchor,
                    end: first.pred_opt().unwrap_or(anchor),
                }
            } else {
                DateWindow {
                    start: first,
                    end: add_days(first, DEFAULT_LOOKAHEAD_DAYS - 1),
                }
            }
        }
        "end of month" | "end of the month" => {
            let last = first_of_next_month(anchor).pred_opt().unwrap_or(anchor);
            let start = last
                .checked_sub_days(Days::new(4))
                .unwrap_or(last)
                .max(anchor);
            DateWindow { start, end: last }
        }
        other => relative_window(anchor, other)
            .or_else(|| weekday_window(anchor, other))
            .unwrap_or(fallback),
    }
}

fn relative_window(anchor: NaiveDate, phrase: &str) -> Option<DateWindow> {
    let rest = phrase.strip_prefix("in ")?;
    let (count, unit) = rest.rsplit_once(' ')?;
    let count = parse_count_word(count)? as u64;

    match unit.trim_end_matches('s') {
        "hour" => Some(DateWindow::single(anchor)),
        "day" => Some(DateWindow::single(add_days(anchor, count))),
        "week" => {
            let start = add_days(anchor, count * 7);
            Some(DateWindow {
                start,
                end: add_days(start, 4),
            })
        }
        "month" => {
            let start = add_days(anchor, count * 30);
            Some(DateWindow {
                start,
                end: add_days(start, 4),
            })
        }
        _ => None,
    }
}

fn weekday_window(anchor: NaiveDate, phrase: &str) -> Option<DateWindow> {
    let (explicit_next, name) = match phrase.split_once(' ') {
        Some(("next", name)) => (true, name),
        Some(("this" | "coming", name)) => (false, name),
        Some(_) => return None,
        None => (false, phrase),
    };
    let weekday = name.parse::<Weekday>().ok()?;

    let mut day = next_strictly_after(anchor, weekday);
    // "next friday" said on a monday means the friday of the following week
    if explicit_next && anchor.weekday().num_days_from_monday() < weekday.num_days_from_monday()
    {
        day = add_days(day, 7);
    }
    Some(DateWindow::single(day))
}

fn next_work_week(anchor: NaiveDate) -> DateWindow {
    let monday = next_strictly_after(anchor, Weekday::Mon);
    DateWindow {
        start: monday,
        end: add_days(monday, 4),
    }
}

fn next_or_same(anchor: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - anchor.weekday().num_days_from_monday()) % 7;
    add_days(anchor, ahead as u64)
}

fn next_strictly_after(anchor: NaiveDate, weekday: Weekday) -> NaiveDate {
    let same = next_or_same(anchor, weekday);
    if same == anchor {
        add_days(anchor, 7)
    } else {
        same
    }
}

fn first_of_next_month(anchor: NaiveDate) -> NaiveDate {
    let (year, month) = if anchor.month() == 12 {
        (anchor.year() + 1, 1)
    } else {
        (anchor.year(), anchor.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(anchor)
}

fn add_days(day: NaiveDate, count: u64) -> NaiveDate {
    day.checked_add_days(Days::new(count)).unwrap_or(day)
}
