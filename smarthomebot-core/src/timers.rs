// ABOUTME: Timer and alarm time expressions - parsing, normalization and fire time computation.
// ABOUTME: Also holds the persisted TIMERS section and the listing text for pending timers.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::traits::ChatId;
use crate::utils::human_join;

/// Offsets beyond this are refused so fire times stay representable
const MAX_OFFSET_SECS: u64 = 366 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("'{input}' is not a valid time: {reason}")]
    MalformedTime { input: String, reason: &'static str },
}

impl TimeError {
    fn malformed(input: &str, reason: &'static str) -> Self {
        Self::MalformedTime {
            input: input.to_string(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerKind {
    Timer,
    Alarm,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::Timer => write!(f, "timer"),
            TimerKind::Alarm => write!(f, "alarm"),
        }
    }
}

/// A relative offset after carrying seconds into minutes, minutes into hours
/// and hours into days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offset {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Offset {
    pub fn from_seconds(total: u64) -> Self {
        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    /// Normalize raw hour/minute/second components. None on overflow.
    pub fn from_parts(hours: u64, minutes: u64, seconds: u64) -> Option<Self> {
        let total = hours
            .checked_mul(3600)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)?;
        Some(Self::from_seconds(total))
    }

    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400 + self.hours * 3600 + self.minutes * 60 + self.seconds
    }

    pub fn as_duration(&self) -> Duration {
        // bounded by MAX_OFFSET_SECS at parse time
        Duration::seconds(self.total_seconds() as i64)
    }
}

impl std::fmt::Display for Offset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn unit(n: u64, name: &str) -> Option<String> {
            match n {
                0 => None,
                1 => Some(format!("1 {}", name)),
                n => Some(format!("{} {}s", n, name)),
            }
        }
        let parts: Vec<String> = [
            unit(self.days, "day"),
            unit(self.hours, "hour"),
            unit(self.minutes, "minute"),
            unit(self.seconds, "second"),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            return write!(f, "0 seconds");
        }
        write!(f, "{}", parts.join(" "))
    }
}

fn unit_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").ok())
        .as_ref()
}

fn clock_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2}):(\d{1,2})$").ok())
        .as_ref()
}

fn parse_component(input: &str, digits: &str) -> Result<u64, TimeError> {
    digits
        .parse::<u64>()
        .map_err(|_| TimeError::malformed(input, "number is too large"))
}

/// Parse a relative timer expression: `90s`, `5m`, `2h`, `1h30m`, or `hh:mm` from now
pub fn parse_timer(input: &str) -> Result<Offset, TimeError> {
    let trimmed = input.trim().to_lowercase();

    let offset = if let Some(caps) = clock_regex().and_then(|re| re.captures(&trimmed)) {
        let hours = parse_component(input, &caps[1])?;
        let minutes = parse_component(input, &caps[2])?;
        Offset::from_parts(hours, minutes, 0)
    } else if let Some(caps) = unit_regex().and_then(|re| re.captures(&trimmed)) {
        if trimmed.is_empty() {
            return Err(TimeError::malformed(input, "expected something like 90s, 5m, 2h or hh:mm"));
        }
        let get = |i: usize| -> Result<u64, TimeError> {
            caps.get(i)
                .map(|m| parse_component(input, m.as_str()))
                .unwrap_or(Ok(0))
        };
        Offset::from_parts(get(1)?, get(2)?, get(3)?)
    } else {
        return Err(TimeError::malformed(input, "expected something like 90s, 5m, 2h or hh:mm"));
    };

    let offset = offset.ok_or_else(|| TimeError::malformed(input, "number is too large"))?;
    if offset.total_seconds() == 0 {
        return Err(TimeError::malformed(input, "the timer must be longer than zero"));
    }
    if offset.total_seconds() > MAX_OFFSET_SECS {
        return Err(TimeError::malformed(input, "timers are limited to one year"));
    }
    Ok(offset)
}

/// Parse an absolute 24-hour `hh:mm` alarm time
pub fn parse_alarm(input: &str) -> Result<NaiveTime, TimeError> {
    let trimmed = input.trim();
    let caps = clock_regex()
        .and_then(|re| re.captures(trimmed))
        .ok_or_else(|| TimeError::malformed(input, "expected a 24-hour time like 07:30"))?;
    let hours = parse_component(input, &caps[1])?;
    let minutes = parse_component(input, &caps[2])?;
    if hours > 23 {
        return Err(TimeError::malformed(input, "hours must be between 0 and 23"));
    }
    if minutes > 59 {
        return Err(TimeError::malformed(input, "minutes must be between 0 and 59"));
    }
    NaiveTime::from_hms_opt(hours as u32, minutes as u32, 0)
        .ok_or_else(|| TimeError::malformed(input, "not a valid time of day"))
}

pub fn timer_fire_at(now: DateTime<Utc>, offset: &Offset) -> DateTime<Utc> {
    now + offset.as_duration()
}

/// Next occurrence of a wall-clock time in `tz` strictly after `now`
pub fn alarm_fire_at(now: DateTime<Utc>, tz: Tz, time: NaiveTime) -> DateTime<Utc> {
    let local_today = now.with_timezone(&tz).date_naive();
    for day in 0..3 {
        let date = local_today + Duration::days(day);
        // earliest() picks the first instant on DST fold; None means the time falls in a gap
        if let Some(candidate) = tz.from_local_datetime(&date.and_time(time)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return candidate;
            }
        }
    }
    now + Duration::days(1)
}

/// A pending timer or alarm as persisted in the TIMERS section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub kind: TimerKind,
    pub fire_at: DateTime<Utc>,
    pub label: String,
    pub chat_id: ChatId,
}

impl TimerRecord {
    pub fn timer(now: DateTime<Utc>, offset: &Offset, chat_id: ChatId) -> Self {
        Self {
            kind: TimerKind::Timer,
            fire_at: timer_fire_at(now, offset),
            label: offset.to_string(),
            chat_id,
        }
    }

    pub fn alarm(now: DateTime<Utc>, tz: Tz, time: NaiveTime, chat_id: ChatId) -> Self {
        Self {
            kind: TimerKind::Alarm,
            fire_at: alarm_fire_at(now, tz, time),
            label: time.format("%H:%M").to_string(),
            chat_id,
        }
    }

    /// Seconds from `now` until the record fires, zero when overdue
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.fire_at - now).to_std().unwrap_or_default()
    }

    /// Text delivered to the chat when the record fires
    pub fn fired_text(&self, late: bool) -> String {
        let base = match self.kind {
            TimerKind::Timer => format!("⏰ Time is up! Your {} timer has finished.", self.label),
            TimerKind::Alarm => format!("⏰ Alarm! It is {}.", self.label),
        };
        if late {
            format!("{} (missed while the bot was offline)", base)
        } else {
            base
        }
    }
}

/// Persisted TIMERS section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerBook {
    #[serde(default)]
    pub timers: Vec<TimerRecord>,
    #[serde(default)]
    pub alarms: Vec<TimerRecord>,
}

impl TimerBook {
    pub fn list(&self, kind: TimerKind) -> &[TimerRecord] {
        match kind {
            TimerKind::Timer => &self.timers,
            TimerKind::Alarm => &self.alarms,
        }
    }

    fn list_mut(&mut self, kind: TimerKind) -> &mut Vec<TimerRecord> {
        match kind {
            TimerKind::Timer => &mut self.timers,
            TimerKind::Alarm => &mut self.alarms,
        }
    }

    pub fn push(&mut self, record: TimerRecord) {
        let list = self.list_mut(record.kind);
        list.push(record);
        list.sort_by_key(|r| r.fire_at);
    }

    /// Remove one record equal to `record`. Returns whether one was found.
    pub fn remove(&mut self, record: &TimerRecord) -> bool {
        let list = self.list_mut(record.kind);
        match list.iter().position(|r| r == record) {
            Some(index) => {
                list.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &TimerRecord> {
        self.timers.iter().chain(self.alarms.iter())
    }

    pub fn len(&self) -> usize {
        self.timers.len() + self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Listing reply for `/timer` or `/alarm` without an argument
pub fn describe_pending(kind: TimerKind, records: &[TimerRecord], tz: Tz) -> String {
    let items: Vec<String> = records
        .iter()
        .map(|r| {
            let at = r.fire_at.with_timezone(&tz);
            match kind {
                TimerKind::Timer => format!("{} (ends at {})", r.label, at.format("%H:%M:%S")),
                TimerKind::Alarm => format!("{} ({})", r.label, at.format("%a %d %b")),
            }
        })
        .collect();
    match items.len() {
        0 => format!("There are no pending {}s.", kind),
        1 => format!("There is one pending {}: {}.", kind, items[0]),
        n => format!("There are {} pending {}s: {}.", n, kind, human_join(&items)),
    }
}
