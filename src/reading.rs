//! Module that contains the sensor reading type served and reported by this application.
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Struct representing one air quality sample recorded at a specific timestamp.
///
/// All measurements are optional: the backing table allows NULLs and a column with an
/// unexpected type is read as missing.
pub struct Reading
{
    /// Identifier of the row in the backing table.
    #[serde(default)]
    pub id: Option<i64>,
    /// Timestamp the reading was recorded.
    #[serde(rename = "created_at")]
    pub timestamp: chrono::DateTime<Utc>,
    /// Temperature value in celsius.
    pub temperature: Option<f64>,
    /// Relative humidity value.
    pub humidity: Option<f64>,
    /// Fine particulate matter in µg/m³.
    pub pm25: Option<f64>,
    /// Coarse particulate matter in µg/m³.
    pub pm10: Option<f64>,
    /// Carbon monoxide concentration.
    pub co: Option<f64>,
    /// Nitrogen dioxide concentration.
    pub no2: Option<f64>,
    /// Ozone concentration.
    pub o3: Option<f64>,
    /// Sulfur dioxide concentration.
    pub so2: Option<f64>,
}

impl Reading {
    /// The eight measurements in report column order.
    pub fn measurements(&self) -> [Option<f64>; 8] {
        [
            self.temperature,
            self.humidity,
            self.pm25,
            self.pm10,
            self.co,
            self.no2,
            self.o3,
            self.so2,
        ]
    }
}

/// Coerces an optional measurement into a number usable for aggregation.
///
/// Missing and non-finite values become `0.0`.
pub fn numeric_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(number) if number.is_finite() => number,
        _ => 0.0,
    }
}
