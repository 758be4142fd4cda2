use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::ValidationError;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Calendar date of a trading session, in the exchange's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingDate(Date);

impl TradingDate {
    /// Current UTC calendar date.
    pub fn today_utc() -> Self {
        Self(OffsetDateTime::now_utc().date())
    }

    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        Date::parse(input.trim(), DATE_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDate {
                value: input.to_owned(),
            })
    }

    /// Session date for a unix timestamp reported by an exchange whose local
    /// time is `gmt_offset_secs` ahead of UTC.
    pub fn from_unix_with_offset(
        unix_secs: i64,
        gmt_offset_secs: i32,
    ) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidDate {
            value: format!("unix:{unix_secs}{gmt_offset_secs:+}"),
        };
        let offset = UtcOffset::from_whole_seconds(gmt_offset_secs).map_err(|_| invalid())?;
        let instant = OffsetDateTime::from_unix_timestamp(unix_secs).map_err(|_| invalid())?;
        Ok(Self(instant.to_offset(offset).date()))
    }

    /// Unix timestamp of this date's midnight in UTC.
    pub fn unix_midnight_utc(self) -> i64 {
        self.0.midnight().assume_utc().unix_timestamp()
    }

    pub fn checked_add_days(self, days: i64) -> Option<Self> {
        self.0.checked_add(Duration::days(days)).map(Self)
    }

    pub fn checked_sub_days(self, days: i64) -> Option<Self> {
        self.0.checked_sub(Duration::days(days)).map(Self)
    }

    pub fn format_iso(self) -> String {
        self.0
            .format(DATE_FORMAT)
            .unwrap_or_else(|_| String::from("<unformattable>"))
    }
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_iso())
    }
}

impl FromStr for TradingDate {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for TradingDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for TradingDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

/// Half-open `[start, end)` window of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: TradingDate,
    end: TradingDate,
}

impl DateRange {
    pub fn new(start: TradingDate, end: TradingDate) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EmptyDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days leading up to (and excluding) `end`.
    pub fn trailing_days(end: TradingDate, days: u32) -> Result<Self, ValidationError> {
        let start = end
            .checked_sub_days(i64::from(days))
            .ok_or_else(|| ValidationError::InvalidDate {
                value: format!("{end} - {days}d"),
            })?;
        Self::new(start, end)
    }

    pub const fn start(&self) -> TradingDate {
        self.start
    }

    pub const fn end(&self) -> TradingDate {
        self.end
    }

    pub fn contains(&self, date: TradingDate) -> bool {
        self.start <= date && date < self.end
    }
}
