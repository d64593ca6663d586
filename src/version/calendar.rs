//! Calendar versions such as `2024.01.15`, `24.04` or `2023-12-01.2`

use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;

/// A calendar-based version: year, month, optional day and micro segments
#[derive(Debug, Clone)]
pub struct CalendarVersion {
    segments: Vec<u32>,
    raw: String,
}

impl CalendarVersion {
    /// Parse a calendar version, validating the year/month/day portion
    pub fn parse(input: &str) -> Option<Self> {
        let raw = input.trim();
        let segments = raw
            .split(['.', '-'])
            .map(|s| {
                if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    s.parse::<u32>().ok()
                }
            })
            .collect::<Option<Vec<_>>>()?;

        if segments.len() < 2 {
            return None;
        }

        let year_digits = raw.split(['.', '-']).next().map(str::len).unwrap_or(0);
        if year_digits != 2 && year_digits != 4 {
            return None;
        }

        let year = if year_digits == 2 {
            2000 + segments[0] as i32
        } else {
            segments[0] as i32
        };
        let month = segments[1];
        if !(1..=12).contains(&month) {
            return None;
        }
        if let Some(&day) = segments.get(2) {
            // A third segment above 31 is a micro counter rather than a day.
            if day <= 31 && NaiveDate::from_ymd_opt(year, month, day.max(1)).is_none() {
                return None;
            }
        }

        Some(Self {
            segments,
            raw: raw.to_string(),
        })
    }

    /// Numeric segments in order
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }
}

impl PartialEq for CalendarVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CalendarVersion {}

impl PartialOrd for CalendarVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CalendarVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| {
                let a = self.segments.get(i).copied().unwrap_or(0);
                let b = other.segments.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for CalendarVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
