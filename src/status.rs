//! Air quality classification of PM2.5 concentrations.

/// Upper bound (inclusive) of the GOOD bucket in µg/m³.
pub const GOOD_LIMIT: f64 = 50.0;
/// Upper bound (inclusive) of the MODERATE bucket in µg/m³.
pub const MODERATE_LIMIT: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQualityStatus {
    Good,
    Moderate,
    Critical,
}

impl AirQualityStatus {
    /// Label shown in the report.
    pub fn label(self) -> &'static str {
        match self {
            AirQualityStatus::Good => "BUENO",
            AirQualityStatus::Moderate => "MODERADO",
            AirQualityStatus::Critical => "CRÍTICO",
        }
    }
}

/// Classifies a PM2.5 value. Boundary values fall into the lower severity bucket.
pub fn classify(pm25: f64) -> AirQualityStatus {
    if pm25 <= GOOD_LIMIT {
        AirQualityStatus::Good
    } else if pm25 <= MODERATE_LIMIT {
        AirQualityStatus::Moderate
    } else {
        AirQualityStatus::Critical
    }
}
