use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// A recurring quiet window in local wall-clock time.
///
/// `end` before `start` means the window wraps past midnight. `days` uses
/// 0 = Monday .. 6 = Sunday; `None` applies the window every day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRange {
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
    pub days: Option<BTreeSet<u8>>,
}

impl SkipRange {
    pub fn new(start_hour: u8, start_minute: u8, end_hour: u8, end_minute: u8) -> Result<Self> {
        validate_time(start_hour, start_minute)?;
        validate_time(end_hour, end_minute)?;

        Ok(Self {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
            days: None,
        })
    }

    pub fn with_days(mut self, days: BTreeSet<u8>) -> Result<Self> {
        if let Some(bad) = days.iter().find(|&&d| d > 6) {
            return Err(AppError::Config(format!("Invalid weekday index: {}", bad)));
        }
        self.days = Some(days);
        Ok(self)
    }

    pub fn start_minutes(&self) -> u32 {
        self.start_hour as u32 * 60 + self.start_minute as u32
    }

    pub fn end_minutes(&self) -> u32 {
        self.end_hour as u32 * 60 + self.end_minute as u32
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start_minutes() > self.end_minutes()
    }
}

impl std::fmt::Display for SkipRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(days) = &self.days {
            let names: Vec<&str> = days.iter().map(|&d| &DAY_NAMES[d as usize][..3]).collect();
            write!(f, "{} ", names.join("+"))?;
        }
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start_hour, self.start_minute, self.end_hour, self.end_minute
        )
    }
}

fn validate_time(hour: u8, minute: u8) -> Result<()> {
    if hour > 23 || minute > 59 {
        return Err(AppError::Config(format!(
            "Invalid time {:02}:{:02} (hours 0-23, minutes 0-59)",
            hour, minute
        )));
    }
    Ok(())
}

/// Parse a comma-separated list of skip windows, e.g.
/// `"mon-fri 07:00-09:30, sat 10:00-14:00, 23:00-01:00"`.
pub fn parse_skip_hours(raw: &str) -> Result<Vec<SkipRange>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_skip_range)
        .collect()
}

fn parse_skip_range(part: &str) -> Result<SkipRange> {
    let tokens: Vec<&str> = part.split_whitespace().collect();
    let (days, times) = match tokens.as_slice() {
        [times] => (None, *times),
        [days, times] => (Some(parse_day_set(days)?), *times),
        _ => {
            return Err(AppError::Config(format!(
                "Invalid skip window '{}': expected '[DAYS ]HH:MM-HH:MM'",
                part
            )))
        }
    };

    let (start, end) = times.split_once('-').ok_or_else(|| {
        AppError::Config(format!("Invalid skip window '{}': missing '-' between times", part))
    })?;
    let (sh, sm) = parse_clock(start)?;
    let (eh, em) = parse_clock(end)?;

    let range = SkipRange::new(sh, sm, eh, em)?;
    match days {
        Some(days) => range.with_days(days),
        None => Ok(range),
    }
}

fn parse_clock(raw: &str) -> Result<(u8, u8)> {
    let invalid = || AppError::Config(format!("Invalid time '{}': expected HH:MM", raw));

    let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hour: u8 = hour.parse().map_err(|_| invalid())?;
    let minute: u8 = minute.parse().map_err(|_| invalid())?;
    validate_time(hour, minute)?;

    Ok((hour, minute))
}

/// Parse a day specification into weekday indices (0 = Monday).
///
/// Accepts single days (`sat`), wrapping ranges (`fri-mon` gives
/// `{4, 5, 6, 0}`) and `+`-joined combinations of both (`mon+wed-thu`).
pub fn parse_day_set(raw: &str) -> Result<BTreeSet<u8>> {
    let mut days = BTreeSet::new();

    for item in raw.split('+').map(str::trim).filter(|s| !s.is_empty()) {
        match item.split_once('-') {
            Some((from, to)) => {
                let from = parse_day(from)?;
                let to = parse_day(to)?;
                let mut day = from;
                loop {
                    days.insert(day);
                    if day == to {
                        break;
                    }
                    day = (day + 1) % 7;
                }
            }
            None => {
                days.insert(parse_day(item)?);
            }
        }
    }

    if days.is_empty() {
        return Err(AppError::Config(format!("Empty day specification '{}'", raw)));
    }

    Ok(days)
}

fn parse_day(raw: &str) -> Result<u8> {
    let name = raw.trim().to_lowercase();
    if name.len() >= 3 {
        if let Some(index) = DAY_NAMES.iter().position(|full| full.starts_with(&name)) {
            return Ok(index as u8);
        }
    }
    Err(AppError::Config(format!("Unknown weekday '{}'", raw)))
}
