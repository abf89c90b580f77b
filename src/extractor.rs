//! Reservation intent extraction.
//!
//! The reply generator signals a booking by embedding [`RESERVATION_MARKER`]
//! in its reply. The fields themselves come from what the caller said, using
//! best-effort patterns in English and Spanish. Nothing here can fail: a
//! field that does not match takes its default.

use crate::types::ReservationAction;

use regex::Regex;

pub const RESERVATION_MARKER: &str = "[RESERVE]";

pub const DEFAULT_NAME: &str = "Customer";
pub const DEFAULT_PARTY_SIZE: u32 = 2;
pub const DEFAULT_DATE: &str = "today";
pub const DEFAULT_TIME: &str = "20:00";
pub const DEFAULT_PHONE: &str = "unknown";
const NOTES_MAX_CHARS: usize = 100;
const MAX_PARTY_SIZE: u32 = 50;

/// Seam between the turn pipeline and whatever decides that a reply books a
/// table.
pub trait ActionExtractor: Send + Sync {
    fn extract(&self, reply: &str, prior_user_utterances: &[&str]) -> Option<ReservationAction>;

    /// Reply text as it should be spoken, markers removed.
    fn strip_markers(&self, reply: &str) -> String;
}

pub struct HeuristicExtractor {
    name: Regex,
    party_noun: Regex,
    party_table: Regex,
    time_at: Regex,
    time_meridiem: Regex,
    time_clock: Regex,
    time_hour_marker: Regex,
    time_half_past: Regex,
    time_half: Regex,
    date_day_after: Regex,
    date_morning: Regex,
    date_tomorrow: Regex,
    date_today: Regex,
    date_literal: Regex,
    phone: Regex,
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self {
            name: compile(
                r"(?i)\b(?:my name is|name is|under the name(?: of)?|me llamo|mi nombre es|a nombre de)\s+([a-záéíóúñü]+(?:\s+(?-i:[A-ZÁÉÍÓÚÑ][a-záéíóúñü]+))?)",
            ),
            party_noun: compile(
                r"(?i)\b(\d{1,3})\s*(?:people|persons|person|guests|diners|pax|personas)\b",
            ),
            party_table: compile(r"(?i)\b(?:table for|party of|mesa para)\s+(\d{1,3})\b"),
            time_at: compile(
                r"(?i)\b(?:at|a las|a la)\s+(\d{1,2})(?::(\d{2}))?\s*(am\b|pm\b|a\.m\.|p\.m\.)?(\s*(?:and a half|y media|thirty))?",
            ),
            time_meridiem: compile(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am\b|pm\b|a\.m\.|p\.m\.)"),
            time_clock: compile(r"\b(\d{1,2}):(\d{2})\b"),
            time_hour_marker: compile(r"(?i)\b(\d{1,2})\s*(?:o'?clock|en punto|horas|h)\b"),
            time_half_past: compile(r"(?i)\bhalf past\s+(\d{1,2})\b"),
            time_half: compile(r"(?i)\b(\d{1,2})\s+(?:y media|and a half)\b"),
            date_day_after: compile(r"(?i)\b(?:day after tomorrow|pasado mañana)"),
            // "la mañana" is the morning, not tomorrow
            date_morning: compile(r"(?i)\b(?:por la|de la|en la|esta|la)\s+mañana"),
            date_tomorrow: compile(r"(?i)\b(?:tomorrow|mañana)"),
            date_today: compile(r"(?i)\b(?:today|tonight|hoy|esta noche)\b"),
            date_literal: compile(r"\b(\d{1,2})[-/](\d{1,2})\b"),
            phone: compile(r"(?:\+?\d[\s-]?){7,15}"),
        }
    }

    fn find_name(&self, text: &str) -> Option<String> {
        let caps = self.name.captures(text)?;
        let raw = caps.get(1)?.as_str().trim();
        let mut chars = raw.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().chain(chars).collect())
    }

    fn find_party_size(&self, text: &str) -> Option<u32> {
        [&self.party_noun, &self.party_table]
            .iter()
            .filter_map(|re| re.captures(text))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
            .find(|n| (1..=MAX_PARTY_SIZE).contains(n))
    }

    fn find_time(&self, text: &str) -> Option<String> {
        if let Some(caps) = self.time_at.captures(text) {
            let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let minutes = match (caps.get(2), caps.get(4)) {
                (Some(m), _) => m.as_str().parse::<u32>().ok()?,
                (None, Some(_)) => 30,
                (None, None) => 0,
            };
            if let Some(t) = clock(hour, minutes, caps.get(3).map(|m| m.as_str())) {
                return Some(t);
            }
        }
        if let Some(caps) = self.time_meridiem.captures(text) {
            let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let minutes = match caps.get(2) {
                Some(m) => m.as_str().parse::<u32>().ok()?,
                None => 0,
            };
            if let Some(t) = clock(hour, minutes, caps.get(3).map(|m| m.as_str())) {
                return Some(t);
            }
        }
        if let Some(caps) = self.time_clock.captures(text) {
            let hour = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let minutes = caps.get(2)?.as_str().parse::<u32>().ok()?;
            if let Some(t) = clock(hour, minutes, None) {
                return Some(t);
            }
        }
        // bare hour with a spoken marker, no preposition
        [
            (&self.time_hour_marker, 0),
            (&self.time_half_past, 30),
            (&self.time_half, 30),
        ]
        .into_iter()
        .find_map(|(re, minutes)| {
            let hour = re.captures(text)?.get(1)?.as_str().parse::<u32>().ok()?;
            clock(hour, minutes, None)
        })
    }

    fn find_date(&self, text: &str) -> Option<String> {
        if self.date_day_after.is_match(text) {
            return Some("day_after_tomorrow".to_string());
        }
        let without_mornings = self.date_morning.replace_all(text, "");
        let text = &*without_mornings;
        if self.date_tomorrow.is_match(text) {
            return Some("tomorrow".to_string());
        }
        if self.date_today.is_match(text) {
            return Some("today".to_string());
        }
        let caps = self.date_literal.captures(text)?;
        let day = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let month = caps.get(2)?.as_str().parse::<u32>().ok()?;
        if (1..=31).contains(&day) && (1..=12).contains(&month) {
            Some(format!("{day:02}-{month:02}"))
        } else {
            None
        }
    }

    fn find_phone(&self, text: &str) -> Option<String> {
        self.phone
            .find_iter(text)
            .map(|m| {
                m.as_str()
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '+')
                    .collect::<String>()
            })
            .find(|digits: &String| digits.chars().filter(char::is_ascii_digit).count() >= 7)
    }
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionExtractor for HeuristicExtractor {
    fn extract(&self, reply: &str, prior_user_utterances: &[&str]) -> Option<ReservationAction> {
        if !reply.contains(RESERVATION_MARKER) {
            return None;
        }
        let buffer = prior_user_utterances.join(" ");

        Some(ReservationAction {
            name: self
                .find_name(&buffer)
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            party_size: self.find_party_size(&buffer).unwrap_or(DEFAULT_PARTY_SIZE),
            date: self
                .find_date(&buffer)
                .unwrap_or_else(|| DEFAULT_DATE.to_string()),
            time: self
                .find_time(&buffer)
                .unwrap_or_else(|| DEFAULT_TIME.to_string()),
            phone: self
                .find_phone(&buffer)
                .unwrap_or_else(|| DEFAULT_PHONE.to_string()),
            notes: buffer.chars().take(NOTES_MAX_CHARS).collect(),
        })
    }

    fn strip_markers(&self, reply: &str) -> String {
        reply.replace(RESERVATION_MARKER, "").trim().to_string()
    }
}

/// Patterns are literals checked by the tests below.
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("bad extractor pattern {pattern}: {e}"))
}

/// 24h `HH:MM`. A bare hour from 1 to 11 reads as afternoon or evening,
/// which is when tables get booked.
fn clock(hour: u32, minutes: u32, meridiem: Option<&str>) -> Option<String> {
    if minutes > 59 {
        return None;
    }
    let meridiem = meridiem.map(|m| m.to_ascii_lowercase().replace('.', ""));
    let hour = match meridiem.as_deref() {
        Some("pm") if hour < 12 => hour + 12,
        Some("am") if hour == 12 => 0,
        Some(_) => hour,
        None if (1..=11).contains(&hour) => hour + 12,
        None => hour,
    };
    if hour > 23 {
        return None;
    }
    Some(format!("{hour:02}:{minutes:02}"))
}
