//! Duration expressions for manual last-sync windows

use super::SyncError;
use chrono::{DateTime, Days, Duration, LocalResult, Months, NaiveDateTime, TimeZone};
use regex::{Captures, Regex};
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Compact form: `[<n>y][<n>mo][<n>d][<n>h][<n>m][<n>s]`, components in this order.
pub const COMPACT_PATTERN: &str =
    r"^(?:(\d+)y)?(?:(\d+)mo)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$";

/// Date-shaped form `DD-MM-YYYYTHH:MM:SS` where every field is an amount to go back.
pub const LEGACY_PATTERN: &str = r"^(\d{1,2})-(\d{1,2})-(\d{1,4})T(\d{1,2}):(\d{1,2}):(\d{1,2})$";

fn compact_regex() -> &'static Regex {
    static COMPACT: OnceLock<Regex> = OnceLock::new();
    COMPACT.get_or_init(|| Regex::new(COMPACT_PATTERN).expect("Invalid compact duration regex"))
}

fn legacy_regex() -> &'static Regex {
    static LEGACY: OnceLock<Regex> = OnceLock::new();
    LEGACY.get_or_init(|| Regex::new(LEGACY_PATTERN).expect("Invalid legacy duration regex"))
}

/// A relative offset across six calendar units, each defaulting to zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DurationExpr {
    pub days: u32,
    pub months: u32,
    pub years: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl DurationExpr {
    /// Parses either the compact or the date-shaped form.
    ///
    /// Anything that matches neither pattern is rejected; there is no default.
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        let trimmed = value.trim();
        let invalid = || SyncError::InvalidDuration {
            value: value.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if let Some(caps) = compact_regex().captures(trimmed) {
            return Ok(Self {
                years: component(&caps, 1).ok_or_else(invalid)?,
                months: component(&caps, 2).ok_or_else(invalid)?,
                days: component(&caps, 3).ok_or_else(invalid)?,
                hours: component(&caps, 4).ok_or_else(invalid)?,
                minutes: component(&caps, 5).ok_or_else(invalid)?,
                seconds: component(&caps, 6).ok_or_else(invalid)?,
            });
        }

        if let Some(caps) = legacy_regex().captures(trimmed) {
            return Ok(Self {
                days: component(&caps, 1).ok_or_else(invalid)?,
                months: component(&caps, 2).ok_or_else(invalid)?,
                years: component(&caps, 3).ok_or_else(invalid)?,
                hours: component(&caps, 4).ok_or_else(invalid)?,
                minutes: component(&caps, 5).ok_or_else(invalid)?,
                seconds: component(&caps, 6).ok_or_else(invalid)?,
            });
        }

        Err(invalid())
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Goes back from `reference` by this offset.
    ///
    /// Components are applied in a fixed order: days, months, years, hours,
    /// minutes, seconds. Days, months and years move the local wall-clock date,
    /// clamping to the last valid day of a shorter month; hours, minutes and
    /// seconds subtract elapsed time.
    pub fn subtract_from<Tz: TimeZone>(
        &self,
        reference: DateTime<Tz>,
    ) -> Result<DateTime<Tz>, SyncError> {
        let overflow = || SyncError::CalendarOverflow {
            value: self.to_string(),
            reference: reference.naive_local().to_string(),
        };

        let tz = reference.timezone();
        let mut local = reference.naive_local();

        if self.days > 0 {
            local = local
                .checked_sub_days(Days::new(u64::from(self.days)))
                .ok_or_else(overflow)?;
        }
        if self.months > 0 {
            local = local
                .checked_sub_months(Months::new(self.months))
                .ok_or_else(overflow)?;
        }
        if self.years > 0 {
            let months = self.years.checked_mul(12).ok_or(SyncError::OutOfRange {
                field: "years",
                amount: self.years,
            })?;
            local = local
                .checked_sub_months(Months::new(months))
                .ok_or_else(overflow)?;
        }

        let mut instant = if local == reference.naive_local() {
            reference.clone()
        } else {
            localize(&tz, local).ok_or_else(overflow)?
        };

        for (field, amount, delta) in [
            ("hours", self.hours, Duration::try_hours(i64::from(self.hours))),
            (
                "minutes",
                self.minutes,
                Duration::try_minutes(i64::from(self.minutes)),
            ),
            (
                "seconds",
                self.seconds,
                Duration::try_seconds(i64::from(self.seconds)),
            ),
        ] {
            if amount == 0 {
                continue;
            }
            let delta = delta.ok_or(SyncError::OutOfRange { field, amount })?;
            instant = instant.checked_sub_signed(delta).ok_or_else(overflow)?;
        }

        Ok(instant)
    }
}

impl fmt::Display for DurationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0s");
        }
        for (amount, unit) in [
            (self.years, "y"),
            (self.months, "mo"),
            (self.days, "d"),
            (self.hours, "h"),
            (self.minutes, "m"),
            (self.seconds, "s"),
        ] {
            if amount > 0 {
                write!(f, "{}{}", amount, unit)?;
            }
        }
        Ok(())
    }
}

fn component(caps: &Captures<'_>, index: usize) -> Option<u32> {
    match caps.get(index) {
        Some(m) => m.as_str().parse::<u32>().ok(),
        None => Some(0),
    }
}

/// Maps a wall-clock time back into `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant; times skipped
/// by a forward transition move to the first valid time after the gap.
fn localize<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let shifted = local.checked_add_signed(Duration::try_hours(1)?)?;
            tz.from_local_datetime(&shifted).earliest()
        }
    }
}
