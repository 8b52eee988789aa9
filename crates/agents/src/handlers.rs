use std::sync::Arc;

use chrono::{Days, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use execai_core::availability::MAX_SUGGESTIONS;
use execai_core::{
    check_conflicts, find_available_slots, mock_workday, resolve_timeframe, ActionType,
    BusyBlock, DateWindow, Entities, EntityKey, SlotOption, WorkingHours,
};
use serde_json::{json, Value};

use crate::dispatch::{ActionDispatcher, ActionHandler, HandlerFailure};

pub const DEFAULT_MEETING_MINUTES: u32 = 30;
pub const MIN_MEETING_MINUTES: u32 = 5;
pub const MAX_MEETING_MINUTES: u32 = 240;
pub const DEFAULT_EVENT_TITLE: &str = "ExecAI Event";
const DEFAULT_REMINDER_TITLE: &str = "Follow up";
const WIDEN_DAYS: u64 = 7;
const PROVIDER: &str = "mock";

/// In-memory calendar the mock handlers read from. The anchor stands in for
/// "now", so results depend only on construction inputs.
#[derive(Debug, Clone)]
pub struct MockCalendar {
    anchor: NaiveDateTime,
    busy: Vec<BusyBlock>,
    workday: bool,
    hours: WorkingHours,
}

impl MockCalendar {
    pub fn new(anchor: NaiveDateTime) -> Self {
        Self {
            anchor,
            busy: Vec::new(),
            workday: false,
            hours: WorkingHours::default(),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Local::now().naive_local())
    }

    pub fn with_busy(mut self, mut busy: Vec<BusyBlock>) -> Self {
        busy.sort_by_key(|block| block.start);
        self.busy = busy;
        self
    }

    /// Fills every weekday with the standard standup, sync, lunch and 1-on-1.
    pub fn with_mock_workday(mut self) -> Self {
        self.workday = true;
        self
    }

    pub fn with_hours(mut self, hours: WorkingHours) -> Self {
        self.hours = hours;
        self
    }

    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    pub fn busy(&self) -> &[BusyBlock] {
        &self.busy
    }

    /// Explicit blocks plus, when enabled, the mock workday of each date in the window.
    pub fn busy_within(&self, window: DateWindow) -> Vec<BusyBlock> {
        let mut busy = self.busy.clone();
        if self.workday {
            let mut day = window.start;
            while day <= window.end {
                busy.extend(mock_workday(day));
                match day.succ_opt() {
                    Some(next) => day = next,
                    None => break,
                }
            }
            busy.sort_by_key(|block| block.start);
        }
        busy
    }

    fn open_slots(&self, window: DateWindow, duration_min: u32, hours: WorkingHours) -> Vec<SlotOption> {
        let search_start = window.start.and_time(NaiveTime::default()).max(self.anchor);
        let search_end = window.end.and_time(end_of_day());
        if search_end <= search_start {
            return Vec::new();
        }
        find_available_slots(
            &self.busy_within(window),
            search_start,
            search_end,
            duration_min,
            hours,
            MAX_SUGGESTIONS,
        )
    }

    /// Narrows the working day to the requested part of it, if any. A clock
    /// time outside working hours is rejected.
    fn hours_for(&self, time_of_day: Option<&str>) -> Result<WorkingHours, HandlerFailure> {
        let period = |start: u32, end: u32| WorkingHours {
            start: hm(start, 0),
            end: hm(end, 0),
        };
        let hours = match time_of_day.map(str::trim) {
            Some("morning") => period(9, 12),
            Some("afternoon") => period(12, 17),
            Some("evening") => period(17, 20),
            Some(clock) => match NaiveTime::parse_from_str(clock, "%H:%M") {
                Ok(at) if at >= self.hours.start && at < self.hours.end => WorkingHours {
                    start: hm(at.hour(), at.minute() - at.minute() % 30),
                    end: self.hours.end,
                },
                Ok(at) => {
                    return Err(HandlerFailure::Rejected(format!(
                        "{} is outside working hours {}-{}",
                        at.format("%H:%M"),
                        self.hours.start.format("%H:%M"),
                        self.hours.end.format("%H:%M"),
                    )))
                }
                Err(_) => self.hours,
            },
            None => self.hours,
        };
        Ok(hours)
    }
}

/// The exact slot asked for, when a clock time was given, with whatever it collides with.
fn requested_slot(
    calendar: &MockCalendar,
    day: NaiveDate,
    time_of_day: Option<&str>,
    duration_min: u32,
) -> Option<Value> {
    let at = NaiveTime::parse_from_str(time_of_day?.trim(), "%H:%M").ok()?;
    let start = day.and_time(at);
    let end = start + Duration::minutes(i64::from(duration_min));
    let conflicts = check_conflicts(start, end, &calendar.busy_within(DateWindow::single(day)));
    Some(json!({
        "start": start.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "end": end.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "available": conflicts.is_empty(),
        "conflicts": conflicts,
    }))
}

pub struct ScheduleMeetingHandler {
    calendar: MockCalendar,
}

impl ScheduleMeetingHandler {
    pub fn new(calendar: MockCalendar) -> Self {
        Self { calendar }
    }
}

impl ActionHandler for ScheduleMeetingHandler {
    fn name(&self) -> &'static str {
        "mock_calendar.suggest_times"
    }

    fn handle(&self, parameters: &Entities) -> Result<Value, HandlerFailure> {
        let duration_min = parameters
            .text(EntityKey::DurationMin)
            .and_then(|value| value.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_MEETING_MINUTES)
            .clamp(MIN_MEETING_MINUTES, MAX_MEETING_MINUTES);
        let timeframe = parameters.text(EntityKey::Timeframe);
        let time_of_day = parameters.text(EntityKey::TimeOfDay);
        let hours = self.calendar.hours_for(time_of_day)?;

        let window = resolve_timeframe(self.calendar.anchor.date(), timeframe);
        let mut options = self.calendar.open_slots(window, duration_min, hours);
        let mut searched = window;
        let widened = options.is_empty();
        if widened {
            searched = DateWindow {
                start: add_days(window.end, 1),
                end: add_days(window.end, WIDEN_DAYS),
            };
            options = self.calendar.open_slots(searched, duration_min, hours);
        }
        if options.is_empty() {
            return Err(HandlerFailure::NoAvailability {
                start: window.start.to_string(),
                end: searched.end.to_string(),
            });
        }

        let title = parameters
            .text(EntityKey::Topic)
            .unwrap_or(DEFAULT_EVENT_TITLE);
        let participants = parameters
            .get(EntityKey::Participants)
            .map(|value| value.to_list())
            .unwrap_or_default();
        let requested = requested_slot(&self.calendar, window.start, time_of_day, duration_min);
        let message = format!("Found {} open time(s) for {title} (mock).", options.len());

        Ok(json!({
            "status": "proposed",
            "meeting": {
                "title": title,
                "duration_min": duration_min,
                "participants": participants,
                "participant_count": parameters
                    .text(EntityKey::ParticipantCount)
                    .and_then(|value| value.parse::<u32>().ok()),
                "meeting_type": parameters.text(EntityKey::MeetingType),
                "timeframe": timeframe,
                "time_of_day": parameters.text(EntityKey::TimeOfDay),
            },
            "window": { "start": window.start, "end": window.end },
            "widened": widened,
            "requested": requested,
            "options": options,
            "provider": PROVIDER,
            "message": message,
        }))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DraftEmailHandler;

impl ActionHandler for DraftEmailHandler {
    fn name(&self) -> &'static str {
        "mock_mail.draft"
    }

    fn handle(&self, parameters: &Entities) -> Result<Value, HandlerFailure> {
        let recipient = parameters
            .text(EntityKey::Recipient)
            .map(str::trim)
            .unwrap_or("the recipient");
        let topic = parameters
            .text(EntityKey::Topic)
            .map(str::trim)
            .unwrap_or("your request");
        let tone = parameters
            .text(EntityKey::Tone)
            .map(|value| value.trim().to_lowercase())
            .unwrap_or_else(|| "professional".to_string());

        let (greeting, closing) = if tone == "friendly" {
            (format!("Hi {recipient},"), "Thanks so much,\nExecAI (Draft)")
        } else {
            (format!("Hello {recipient},"), "Best regards,\nExecAI (Draft)")
        };
        let body = format!(
            "{greeting}\n\nI hope you’re doing well. I’m reaching out regarding {topic}. \
             Please let me know the best next step, and if you’d like, I can share any additional details.\n\n{closing}"
        );

        Ok(json!({
            "status": "drafted",
            "email": {
                "to": recipient,
                "subject": format!("Regarding {}", title_case(topic)),
                "body": body,
                "tone": tone,
                "provider": PROVIDER,
            },
            "message": "Email draft generated (mock).",
        }))
    }
}

pub struct CreateReminderHandler {
    anchor: NaiveDateTime,
}

impl CreateReminderHandler {
    pub fn new(anchor: NaiveDateTime) -> Self {
        Self { anchor }
    }
}

impl ActionHandler for CreateReminderHandler {
    fn name(&self) -> &'static str {
        "mock_reminders.create"
    }

    fn handle(&self, parameters: &Entities) -> Result<Value, HandlerFailure> {
        let title = parameters
            .text(EntityKey::Topic)
            .unwrap_or(DEFAULT_REMINDER_TITLE);
        let due_time = reminder_time(parameters.text(EntityKey::TimeOfDay))?;
        let window = resolve_timeframe(self.anchor.date(), parameters.text(EntityKey::Timeframe));

        let mut due = window.start.and_time(due_time);
        if due <= self.anchor {
            due = add_days(due.date(), 1).and_time(due_time);
        }

        Ok(json!({
            "status": "scheduled",
            "reminder": {
                "title": title,
                "due_date": due.date(),
                "due_time": due.format("%H:%M").to_string(),
                "provider": PROVIDER,
            },
            "message": format!("Reminder set for {} (mock).", due.format("%a %b %d, %I:%M %p")),
        }))
    }
}

/// The stock handler set: every action except `no_action`.
pub fn mock_dispatcher(calendar: MockCalendar) -> ActionDispatcher {
    let anchor = calendar.anchor();
    ActionDispatcher::new()
        .register(
            ActionType::ScheduleMeeting,
            Arc::new(ScheduleMeetingHandler::new(calendar)),
        )
        .register(ActionType::DraftEmail, Arc::new(DraftEmailHandler))
        .register(
            ActionType::CreateReminder,
            Arc::new(CreateReminderHandler::new(anchor)),
        )
}

fn reminder_time(time_of_day: Option<&str>) -> Result<NaiveTime, HandlerFailure> {
    match time_of_day.map(str::trim) {
        None => Ok(hm(10, 0)),
        Some("morning") => Ok(hm(9, 0)),
        Some("afternoon") => Ok(hm(14, 0)),
        Some("evening") => Ok(hm(18, 0)),
        Some(clock) => NaiveTime::parse_from_str(clock, "%H:%M").map_err(|_| {
            HandlerFailure::InvalidParameter {
                key: "time_of_day",
                detail: format!("{clock:?} is not a clock time"),
            }
        }),
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alphabetic = false;
    for c in text.chars() {
        if previous_alphabetic {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_alphabetic = c.is_alphabetic();
    }
    out
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

fn add_days(day: NaiveDate, days: u64) -> NaiveDate {
    day.checked_add_days(Days::new(days)).unwrap_or(day)
}
