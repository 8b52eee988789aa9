use std::ops::Range;

use chrono::NaiveTime;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::intent::{contains_any_phrase, padded_lower};
use crate::models::{Entities, EntityKey, Intent};

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";
const COUNT_WORDS: &str =
    r"\d{1,3}|an?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|a\s+couple\s+of|a\s+few";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid email regex")
});

static TIMEFRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:the\s+)?end\s+of\s+(?:the\s+)?(?:day|week|month)|(?:next|this|coming)\s+(?:week|month|weekend|{weekdays})|(?:the\s+)?day\s+after\s+tomorrow|in\s+(?:{counts})\s+(?:days?|weeks?|months?|hours?)|later\s+today|today|tonight|tomorrow|this\s+(?:morning|afternoon|evening)|{weekdays})\b",
        weekdays = WEEKDAYS,
        counts = COUNT_WORDS,
    ))
    .expect("valid timeframe regex")
});

static CLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?\s?m\b\.?").expect("valid clock regex")
});

static TWENTY_FOUR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:at|by|from)\s+([01]?\d|2[0-3]):([0-5]\d)\b")
        .expect("valid 24h clock regex")
});

static NAMED_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(noon|midday|midnight|morning|afternoon|evening)\b")
        .expect("valid named time regex")
});

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(\d{1,3})\s*-?\s*(?:minutes?|mins?)|(\d{1,2}(?:\.5)?)\s*-?\s*(?:hours?|hrs?)|(half\s+an\s+hour|half-hour|an\s+hour|one\s+hour))\b",
    )
    .expect("valid duration regex")
});

static COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:(?:all|the)\s+)?({counts})\s+(?:of\s+us|people|participants|attendees|guests)\b",
        counts = COUNT_WORDS,
    ))
    .expect("valid participant count regex")
});

static TO_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?i:to|for|with)\s+(\p{Lu}[\p{L}'’-]+)").expect("valid recipient regex")
});

static CALLED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:called|titled)\s+["'“]?([^"'”\n]+)"#).expect("valid title regex")
});

static ABOUT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:about|regarding|concerning|re:|on\s+the\s+subject\s+of|related\s+to)\s+(.+)$",
    )
    .expect("valid topic regex")
});

static REMIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bremind\s+\p{L}+\s+(?:to|about|that|of)\s+(.+)$").expect("valid remind regex")
});

static REMINDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\breminder\s+(?:to|about|for)\s+(.+)$").expect("valid reminder regex")
});

static FOLLOW_UP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bfollow[\s-]?up\s+(?:on|with\s+\S+\s+on)\s+(.+)$")
        .expect("valid follow-up regex")
});

const TONES: &[(&str, &str)] = &[
    ("professional", "professional"),
    ("professionally", "professional"),
    ("formal", "formal"),
    ("formally", "formal"),
    ("friendly", "friendly"),
    ("warm", "friendly"),
    ("warmly", "friendly"),
    ("casual", "casual"),
    ("casually", "casual"),
    ("informal", "casual"),
    ("informally", "casual"),
    ("polite", "polite"),
    ("politely", "polite"),
    ("courteous", "polite"),
    ("urgent", "urgent"),
    ("urgently", "urgent"),
    ("firm", "firm"),
    ("firmly", "firm"),
    ("assertive", "firm"),
    ("apologetic", "apologetic"),
    ("apologetically", "apologetic"),
    ("concise", "concise"),
    ("brief", "concise"),
    ("briefly", "concise"),
];

const MEETING_TYPES: &[(&str, &str)] = &[
    ("video call", "video_call"),
    ("zoom", "video_call"),
    ("phone call", "call"),
    ("one-on-one", "one_on_one"),
    ("1:1", "one_on_one"),
    ("stand-up", "standup"),
    ("standup", "standup"),
    ("lunch", "lunch"),
    ("coffee", "coffee"),
    ("dinner", "dinner"),
    ("interview", "interview"),
    ("review", "review"),
    ("sync", "sync"),
    ("call", "call"),
];

const NOT_NAMES: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday", "january",
    "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december", "i'm", "i'll", "i'd", "i've", "hi", "hello", "hey", "please",
    "thanks", "thank", "team", "everyone", "all", "email", "e-mail", "meeting", "draft",
    "schedule", "remind", "reminder", "follow", "today", "tomorrow", "tonight", "next", "this",
    "zoom", "teams", "slack", "google", "outlook", "gmail", "calendar", "ok", "okay",
];

const LEADING_FILLERS: &[&str] = &["the", "a", "an", "and", "to", "that", "with", "me"];
const TRAILING_FILLERS: &[&str] = &[
    "at", "by", "on", "for", "in", "before", "until", "to", "and", "with", "so", "the", "please",
];

const MAX_TOPIC_CHARS: usize = 80;

/// Heuristic entity extraction. `intent` narrows which keys are looked for;
/// `None` or `Unknown` looks for everything.
pub fn extract_entities(text: &str, intent: Option<Intent>) -> Entities {
    let mut entities = Entities::new();
    let names = find_names(text);
    let recipient = find_recipient(text, &names);

    for key in keys_for(intent) {
        match key {
            EntityKey::Participants => {
                let mut participants = names.clone();
                for address in EMAIL_RE.find_iter(text) {
                    if !participants.iter().any(|known| known == address.as_str()) {
                        participants.push(address.as_str().to_string());
                    }
                }
                entities.insert_list(EntityKey::Participants, participants);
            }
            EntityKey::ParticipantCount => {
                if let Some(count) = find_participant_count(text) {
                    entities.insert_text(EntityKey::ParticipantCount, count.to_string());
                }
            }
            EntityKey::Recipient => {
                if let Some(recipient) = recipient.as_deref() {
                    entities.insert_text(EntityKey::Recipient, recipient);
                }
            }
            EntityKey::Timeframe => {
                if let Some(timeframe) = find_timeframe(text) {
                    entities.insert_text(EntityKey::Timeframe, timeframe);
                }
            }
            EntityKey::TimeOfDay => {
                if let Some(time) = find_time_of_day(text) {
                    entities.insert_text(EntityKey::TimeOfDay, time);
                }
            }
            EntityKey::DurationMin => {
                if let Some(minutes) = find_duration_minutes(text) {
                    entities.insert_text(EntityKey::DurationMin, minutes.to_string());
                }
            }
            EntityKey::Topic => {
                if let Some(topic) = find_topic(text, intent, recipient.as_deref()) {
                    entities.insert_text(EntityKey::Topic, topic);
                }
            }
            EntityKey::Tone => {
                if let Some(tone) = find_tone(text) {
                    entities.insert_text(EntityKey::Tone, tone);
                }
            }
            EntityKey::MeetingType => {
                if let Some(kind) = find_meeting_type(text) {
                    entities.insert_text(EntityKey::MeetingType, kind);
                }
            }
        }
    }

    entities
}

/// Brings a value produced outside the extractor (a model reply, say) into
/// the forms the extractor itself emits: `HH:MM` or a part of the day,
/// integer minutes, a lowercase relative phrase, a digit count, a canonical
/// tone or meeting type. `None` when the value cannot be read that way.
pub fn normalize_entity_value(key: EntityKey, value: &str) -> Option<String> {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() {
        return None;
    }

    match key {
        EntityKey::TimeOfDay => ["%H:%M", "%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveTime::parse_from_str(&value, format).ok())
            .map(|at| at.format("%H:%M").to_string())
            .or_else(|| find_time_of_day(&value)),
        EntityKey::DurationMin => value
            .parse::<u32>()
            .ok()
            .or_else(|| find_duration_minutes(&value))
            .filter(|minutes| *minutes > 0)
            .map(|minutes| minutes.to_string()),
        EntityKey::Timeframe => find_timeframe(&value),
        EntityKey::ParticipantCount => parse_count_word(&value)
            .or_else(|| find_participant_count(&value))
            .map(|count| count.to_string()),
        EntityKey::Tone => Some(
            find_tone(&value)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_lowercase()),
        ),
        EntityKey::MeetingType => Some(
            find_meeting_type(&value)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_lowercase().replace(' ', "_")),
        ),
        EntityKey::Participants | EntityKey::Recipient | EntityKey::Topic => Some(value),
    }
}

fn keys_for(intent: Option<Intent>) -> &'static [EntityKey] {
    match intent {
        Some(Intent::MeetingScheduling) => &[
            EntityKey::Participants,
            EntityKey::ParticipantCount,
            EntityKey::Timeframe,
            EntityKey::TimeOfDay,
            EntityKey::DurationMin,
            EntityKey::MeetingType,
            EntityKey::Topic,
        ],
        Some(Intent::EmailDrafting) => &[
            EntityKey::Recipient,
            EntityKey::Topic,
            EntityKey::Tone,
            EntityKey::Timeframe,
        ],
        Some(Intent::FollowUpReminder) => &[
            EntityKey::Topic,
            EntityKey::Timeframe,
            EntityKey::TimeOfDay,
            EntityKey::Participants,
        ],
        Some(Intent::Unknown) | None => &EntityKey::ALL,
    }
}

/// True when the text names a date, a relative day, or a clock time.
pub fn has_time_expression(text: &str) -> bool {
    TIMEFRAME_RE.is_match(text)
        || CLOCK_RE.is_match(text)
        || TWENTY_FOUR_RE.is_match(text)
        || NAMED_TIME_RE.is_match(text)
}

pub fn find_timeframe(text: &str) -> Option<String> {
    TIMEFRAME_RE
        .find(text)
        .map(|found| normalize_phrase(found.as_str()))
}

/// Clock times come back as `HH:MM`; bare parts of the day as the word itself.
pub fn find_time_of_day(text: &str) -> Option<String> {
    for caps in CLOCK_RE.captures_iter(text) {
        let hour = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let minute = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        let pm = caps
            .get(3)
            .map(|m| m.as_str().eq_ignore_ascii_case("p"))
            .unwrap_or(false);
        if let Some(hour) = hour.filter(|h| (1..=12).contains(h)) {
            let hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            return Some(format!("{hour:02}:{minute:02}"));
        }
    }

    if let Some(caps) = TWENTY_FOUR_RE.captures(text) {
        let hour = caps[1].parse::<u32>().ok()?;
        let minute = caps[2].parse::<u32>().ok()?;
        return Some(format!("{hour:02}:{minute:02}"));
    }

    NAMED_TIME_RE
        .captures(text)
        .map(|caps| match caps[1].to_lowercase().as_str() {
            "noon" | "midday" => "12:00".to_string(),
            "midnight" => "00:00".to_string(),
            other => other.to_string(),
        })
}

pub fn find_duration_minutes(text: &str) -> Option<u32> {
    for caps in DURATION_RE.captures_iter(text) {
        let whole = caps.get(0)?;
        // "in 2 hours" is a timeframe, not a meeting length
        let before = text[..whole.start()].trim_end().to_lowercase();
        if before == "in" || before.ends_with(" in") {
            continue;
        }

        if let Some(minutes) = caps.get(1) {
            if let Ok(value) = minutes.as_str().parse::<u32>() {
                return Some(value);
            }
        } else if let Some(hours) = caps.get(2) {
            if let Ok(value) = hours.as_str().parse::<f32>() {
                return Some((value * 60.0).round() as u32);
            }
        } else if let Some(phrase) = caps.get(3) {
            let phrase = phrase.as_str().to_lowercase();
            return Some(if phrase.starts_with("half") { 30 } else { 60 });
        }
    }
    None
}

pub fn find_participant_count(text: &str) -> Option<u32> {
    COUNT_RE
        .captures(text)
        .and_then(|caps| parse_count_word(&caps[1]))
}

pub fn find_tone(text: &str) -> Option<&'static str> {
    text.unicode_words().find_map(|word| {
        let lower = word.to_lowercase();
        TONES
            .iter()
            .find(|(surface, _)| *surface == lower)
            .map(|(_, canonical)| *canonical)
    })
}

pub fn find_meeting_type(text: &str) -> Option<&'static str> {
    let padded = padded_lower(text);
    MEETING_TYPES
        .iter()
        .find(|(phrase, _)| contains_any_phrase(&padded, &[phrase]))
        .map(|(_, canonical)| *canonical)
}

/// Capitalized tokens that are not sentence-initial and not calendar or
/// filler words, in order of first appearance.
pub fn find_names(text: &str) -> Vec<String> {
    let email_spans = EMAIL_RE
        .find_iter(text)
        .map(|found| found.range())
        .collect::<Vec<_>>();

    let mut names: Vec<String> = Vec::new();
    let mut sentence_start = true;

    for (offset, segment) in text.split_word_bound_indices() {
        if email_spans.iter().any(|span| span.contains(&offset)) {
            sentence_start = false;
            continue;
        }

        if segment.chars().any(char::is_alphanumeric) {
            let word = segment.trim_end_matches("'s").trim_end_matches("’s");
            if !sentence_start && is_name_like(word) && !names.iter().any(|known| known == word)
            {
                names.push(word.to_string());
            }
            sentence_start = false;
        } else if segment.contains(['.', '!', '?', '\n']) {
            sentence_start = true;
        }
    }

    names
}

/// An e-mail address, then `to/for/with <Name>`, then the first name-like token.
pub fn find_recipient(text: &str, names: &[String]) -> Option<String> {
    if let Some(address) = EMAIL_RE.find(text) {
        return Some(address.as_str().to_string());
    }

    let addressed = TO_NAME_RE.captures_iter(text).find_map(|caps| {
        let word = caps[1].trim_end_matches("'s").trim_end_matches("’s");
        is_name_like(word).then(|| word.to_string())
    });

    addressed.or_else(|| names.first().cloned())
}

fn find_topic(text: &str, intent: Option<Intent>, recipient: Option<&str>) -> Option<String> {
    let line = text.lines().next().unwrap_or_default();

    if let Some(caps) = CALLED_RE.captures(line) {
        if let Some(topic) = clean_topic(&caps[1]) {
            return Some(topic);
        }
    }

    if let Some(caps) = ABOUT_RE.captures(line) {
        if let Some(topic) = clean_topic(&caps[1]) {
            return Some(topic);
        }
    }

    match intent {
        Some(Intent::FollowUpReminder) | Some(Intent::Unknown) | None => {
            for pattern in [&*REMIND_RE, &*REMINDER_RE, &*FOLLOW_UP_RE] {
                if let Some(caps) = pattern.captures(line) {
                    if let Some(topic) = clean_topic(&caps[1]) {
                        return Some(topic);
                    }
                }
            }
            None
        }
        Some(Intent::EmailDrafting) => {
            let recipient = recipient?;
            let start = line.find(recipient)? + recipient.len();
            let rest = &line[start..];
            let rest = rest
                .strip_prefix("'s")
                .or_else(|| rest.strip_prefix("’s"))
                .unwrap_or(rest);
            clean_topic(rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace()))
        }
        Some(Intent::MeetingScheduling) => None,
    }
}

fn clean_topic(candidate: &str) -> Option<String> {
    let mut end = candidate.len();
    for span in time_spans(candidate) {
        end = end.min(span.start);
    }
    if let Some(stop) = candidate.find(['.', '?', '!', ';', '\n']) {
        end = end.min(stop);
    }

    let mut words = candidate[..end]
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| matches!(c, ',' | ':' | '"' | '“' | '”')))
        .filter(|word| !word.is_empty())
        .filter(|word| {
            let lower = word.to_lowercase();
            !TONES.iter().any(|(surface, _)| *surface == lower)
        })
        .collect::<Vec<_>>();

    while words
        .first()
        .is_some_and(|word| LEADING_FILLERS.contains(&word.to_lowercase().as_str()))
    {
        words.remove(0);
    }
    while words
        .last()
        .is_some_and(|word| TRAILING_FILLERS.contains(&word.to_lowercase().as_str()))
    {
        words.pop();
    }

    let topic = words.join(" ");
    if topic.is_empty() {
        return None;
    }
    Some(topic.chars().take(MAX_TOPIC_CHARS).collect())
}

fn time_spans(text: &str) -> Vec<Range<usize>> {
    TIMEFRAME_RE
        .find_iter(text)
        .chain(CLOCK_RE.find_iter(text))
        .chain(TWENTY_FOUR_RE.find_iter(text))
        .chain(DURATION_RE.find_iter(text))
        .map(|found| found.range())
        .collect()
}

fn is_name_like(word: &str) -> bool {
    let Some(first) = word.chars().next() else {
        return false;
    };
    if !first.is_uppercase() || word.chars().count() < 2 {
        return false;
    }
    if !word
        .chars()
        .all(|c| c.is_alphabetic() || matches!(c, '-' | '\'' | '’'))
    {
        return false;
    }
    // all-caps tokens are acronyms, not people
    if !word.chars().skip(1).any(char::is_lowercase) {
        return false;
    }
    !NOT_NAMES.contains(&word.to_lowercase().as_str())
}

fn normalize_phrase(phrase: &str) -> String {
    let lower = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    lower
        .strip_prefix("the ")
        .map(str::to_string)
        .unwrap_or(lower)
}

pub(crate) fn parse_count_word(word: &str) -> Option<u32> {
    let normalized = word.split_whitespace().collect::<Vec<_>>().join(" ");
    match normalized.to_lowercase().as_str() {
        "a" | "an" | "one" => Some(1),
        "two" | "a couple of" => Some(2),
        "three" | "a few" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        "seven" => Some(7),
        "eight" => Some(8),
        "nine" => Some(9),
        "ten" => Some(10),
        "eleven" => Some(11),
        "twelve" => Some(12),
        digits => digits.parse().ok(),
    }
}
