//! Per-device statistics.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

lazy_static::lazy_static! {
    static ref PERIOD_PATTERN: regex::Regex = regex::Regex::new(r"^(\d+)([dhw])$").unwrap();
}

/// Lookback window such as `7d`, `12h` or `2w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsPeriod {
    amount: u32,
    unit: char,
}

impl StatsPeriod {
    pub fn duration(&self) -> Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            'h' => Duration::hours(amount),
            'w' => Duration::weeks(amount),
            _ => Duration::days(amount),
        }
    }

    /// Window length in days, at least one hour's worth.
    pub fn days(&self) -> f64 {
        let hours = self.duration().num_hours().max(1);
        hours as f64 / 24.0
    }
}

impl Default for StatsPeriod {
    fn default() -> Self {
        Self {
            amount: 7,
            unit: 'd',
        }
    }
}

impl FromStr for StatsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid period '{s}'. Use e.g. 24h, 7d or 2w");
        let captures = PERIOD_PATTERN.captures(s.trim()).ok_or_else(invalid)?;
        let amount: u32 = captures[1].parse().map_err(|_| invalid())?;
        if amount == 0 || amount > 520 * 7 {
            return Err(invalid());
        }
        let unit = captures[2].chars().next().ok_or_else(invalid)?;
        Ok(Self { amount, unit })
    }
}

impl std::fmt::Display for StatsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}

/// Query parameters for the stats endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub period: Option<String>,
}

/// How often one clean location was reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFrequency {
    pub location: String,
    pub count: i64,
}

/// Activity statistics for one device over a period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStats {
    pub device_name: String,
    pub period: String,
    pub total_updates: i64,
    pub unique_locations: i64,
    pub most_frequent_location: Option<String>,
    pub location_frequencies: Vec<LocationFrequency>,
    pub average_distance_meters: Option<f64>,
    pub average_updates_per_day: f64,
    pub last_movement: Option<DateTime<Utc>>,
}

impl DeviceStats {
    /// Rounds to one decimal, as displayed.
    pub fn average_per_day(total_updates: i64, period: &StatsPeriod) -> f64 {
        let avg = total_updates as f64 / period.days();
        (avg * 10.0).round() / 10.0
    }
}
