use serde::Serialize;

use crate::entities::{find_names, find_recipient, has_time_expression};
use crate::models::Intent;

pub const MATCHED_RULE_CONFIDENCE: f32 = 1.0;
pub const WEAK_RULE_CONFIDENCE: f32 = 0.6;
pub const NO_MATCH_CONFIDENCE: f32 = 0.0;

const SCHEDULING_PHRASES: &[&str] = &[
    "schedule",
    "reschedule",
    "meet",
    "meeting",
    "meetings",
    "find a time",
    "find time",
    "book a",
    "set up a call",
    "set up a meeting",
    "set up time",
    "availability",
    "available",
    "calendar invite",
    "catch up",
    "get together",
    "sync",
    "call with",
];

const EMAIL_PHRASES: &[&str] = &[
    "email",
    "e-mail",
    "emails",
    "draft",
    "write to",
    "write an",
    "reply to",
    "respond to",
    "send a note",
    "send a message",
    "mail",
];

const REMINDER_PHRASES: &[&str] = &[
    "remind",
    "reminder",
    "reminders",
    "follow up",
    "follow-up",
    "followup",
    "nudge",
    "don't forget",
    "dont forget",
    "check back",
    "check in with",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleMatch {
    pub intent: Intent,
    pub confidence: f32,
    pub rule: &'static str,
}

type RulePredicate = fn(&str, &str) -> bool;

/// Fixed evaluation order, first match wins.
const RULES: &[(&str, Intent, f32, RulePredicate)] = &[
    (
        "reminder_leads",
        Intent::FollowUpReminder,
        MATCHED_RULE_CONFIDENCE,
        reminder_leads,
    ),
    (
        "scheduling_with_time",
        Intent::MeetingScheduling,
        MATCHED_RULE_CONFIDENCE,
        scheduling_with_time,
    ),
    (
        "email_with_recipient",
        Intent::EmailDrafting,
        MATCHED_RULE_CONFIDENCE,
        email_with_recipient,
    ),
    (
        "reminder_keyword",
        Intent::FollowUpReminder,
        MATCHED_RULE_CONFIDENCE,
        reminder_keyword,
    ),
    (
        "scheduling_phrase",
        Intent::MeetingScheduling,
        WEAK_RULE_CONFIDENCE,
        scheduling_phrase,
    ),
    (
        "email_keyword",
        Intent::EmailDrafting,
        WEAK_RULE_CONFIDENCE,
        email_keyword,
    ),
];

/// "Remind me about the meeting tomorrow": the reminder verb comes before
/// any scheduling or email wording, so the meeting is the subject.
fn reminder_leads(_text: &str, padded: &str) -> bool {
    let Some(reminder) = first_phrase_at(padded, REMINDER_PHRASES) else {
        return false;
    };
    [SCHEDULING_PHRASES, EMAIL_PHRASES]
        .iter()
        .filter_map(|phrases| first_phrase_at(padded, phrases))
        .all(|other| reminder < other)
}

fn scheduling_with_time(text: &str, padded: &str) -> bool {
    scheduling_phrase(text, padded) && has_time_expression(text)
}

fn email_with_recipient(text: &str, padded: &str) -> bool {
    email_keyword(text, padded) && find_recipient(text, &find_names(text)).is_some()
}

fn reminder_keyword(_text: &str, padded: &str) -> bool {
    contains_any_phrase(padded, REMINDER_PHRASES)
}

fn scheduling_phrase(_text: &str, padded: &str) -> bool {
    contains_any_phrase(padded, SCHEDULING_PHRASES)
}

fn email_keyword(_text: &str, padded: &str) -> bool {
    contains_any_phrase(padded, EMAIL_PHRASES)
}

pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn classify_intent_rules(text: &str) -> RuleMatch {
    let padded = padded_lower(text);

    RULES
        .iter()
        .find(|(_, _, _, predicate)| predicate(text, &padded))
        .map(|(rule, intent, confidence, _)| RuleMatch {
            intent: *intent,
            confidence: *confidence,
            rule: *rule,
        })
        .unwrap_or(RuleMatch {
            intent: Intent::Unknown,
            confidence: NO_MATCH_CONFIDENCE,
            rule: "no_match",
        })
}

/// Lowercased text with punctuation blanked out and a space on each side, so
/// phrases can be matched on word boundaries with a plain substring search.
pub(crate) fn padded_lower(text: &str) -> String {
    let cleaned = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '\'' | ':' | '-') {
                c
            } else {
                ' '
            }
        })
        .collect::<String>();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn first_phrase_at(padded: &str, phrases: &[&str]) -> Option<usize> {
    phrases
        .iter()
        .filter_map(|phrase| padded.find(&format!(" {phrase} ")))
        .min()
}

pub(crate) fn contains_any_phrase(padded: &str, phrases: &[&str]) -> bool {
    phrases
        .iter()
        .any(|phrase| padded.contains(&format!(" {phrase} ")))
}
