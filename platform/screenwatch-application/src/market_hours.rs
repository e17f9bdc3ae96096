use crate::config::TradingWindowConfig;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DEFAULT_WEEKDAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    Weekend,
    Holiday,
    OutsideHours,
}

impl ClosedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClosedReason::Weekend => "weekend",
            ClosedReason::Holiday => "holiday",
            ClosedReason::OutsideHours => "outside trading hours",
        }
    }
}

/// Exchange session in its own timezone. Both bounds are inclusive.
#[derive(Debug, Clone)]
pub struct TradingWindow {
    timezone: Tz,
    open: NaiveTime,
    close: NaiveTime,
    weekdays: Vec<Weekday>,
    holidays: Vec<NaiveDate>,
}

impl TradingWindow {
    pub fn new(timezone: Tz, open: NaiveTime, close: NaiveTime) -> Result<Self, String> {
        if open >= close {
            return Err(format!("trading window open {open} must be before close {close}"));
        }
        Ok(Self {
            timezone,
            open,
            close,
            weekdays: DEFAULT_WEEKDAYS.to_vec(),
            holidays: Vec::new(),
        })
    }

    pub fn from_config(config: &TradingWindowConfig) -> Result<Self, String> {
        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|err| format!("invalid timezone {}: {err}", config.timezone))?;
        let open = parse_time(&config.open)?;
        let close = parse_time(&config.close)?;
        let mut window = Self::new(timezone, open, close)?;

        if let Some(days) = &config.weekdays {
            if days.is_empty() {
                return Err("trading_window.weekdays must not be empty".to_string());
            }
            window.weekdays = days
                .iter()
                .map(|day| {
                    day.trim()
                        .parse::<Weekday>()
                        .map_err(|_| format!("invalid weekday: {day}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(days) = &config.holidays {
            window.holidays = days
                .iter()
                .map(|day| {
                    NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d")
                        .map_err(|err| format!("invalid holiday {day}: {err}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
        }
        Ok(window)
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn closed_reason(&self, now: DateTime<Utc>) -> Option<ClosedReason> {
        let local = now.with_timezone(&self.timezone);
        if !self.weekdays.contains(&local.weekday()) {
            return Some(ClosedReason::Weekend);
        }
        if self.holidays.contains(&local.date_naive()) {
            return Some(ClosedReason::Holiday);
        }
        let time = local.time();
        if time < self.open || time > self.close {
            return Some(ClosedReason::OutsideHours);
        }
        None
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.closed_reason(now).is_none()
    }

    pub fn format_timestamp(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|err| format!("invalid time of day {raw}: {err}"))
}
