//! Congestion risk and the IoT actions derived from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::raw::number_of;

/// Counts at or above this are medium risk.
pub const MEDIUM_RISK_COUNT: u64 = 15;
/// Counts at or above this are high risk.
pub const HIGH_RISK_COUNT: u64 = 40;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    pub fn classify(vehicle_count: Option<u64>) -> Self {
        match vehicle_count {
            None => RiskLevel::Unknown,
            Some(n) if n < MEDIUM_RISK_COUNT => RiskLevel::Low,
            Some(n) if n < HIGH_RISK_COUNT => RiskLevel::Medium,
            Some(_) => RiskLevel::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "unknown",
        }
    }

    pub fn recommended_action(self) -> RecommendedAction {
        let (action, message) = match self {
            RiskLevel::Low => (IotAction::None, "Monitor. No immediate action required."),
            RiskLevel::Medium => (
                IotAction::SlowDown,
                "Moderate congestion, advise slow down / caution.",
            ),
            RiskLevel::High => (
                IotAction::RerouteOrStop,
                "High density, suggest reroute or emergency stop.",
            ),
            RiskLevel::Unknown => (IotAction::NoData, "Insufficient data"),
        };
        RecommendedAction {
            action,
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IotAction {
    None,
    SlowDown,
    RerouteOrStop,
    NoData,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action: IotAction,
    pub message: String,
}

/// Distance assumed when a sensor reading is missing or invalid.
pub const DEFAULT_DISTANCE_CM: f64 = 100.0;
pub const DANGER_DISTANCE_CM: f64 = 20.0;
pub const WARN_DISTANCE_CM: f64 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProximityLevel {
    Danger,
    Warn,
    Safe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProximityAction {
    #[serde(rename = "EMERGENCY_STOP")]
    EmergencyStop,
    #[serde(rename = "slow_down")]
    SlowDown,
    #[serde(rename = "none")]
    None,
}

/// Alert for a range sensor reading in centimetres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityAlert {
    /// Whole centimetres, truncated.
    pub distance: i64,
    pub alert: ProximityLevel,
    pub recommended_action: ProximityAction,
}

impl ProximityAlert {
    pub fn from_distance(distance_cm: Option<f64>) -> Self {
        let d = distance_cm
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(DEFAULT_DISTANCE_CM);
        let (alert, recommended_action) = if d < DANGER_DISTANCE_CM {
            (ProximityLevel::Danger, ProximityAction::EmergencyStop)
        } else if d < WARN_DISTANCE_CM {
            (ProximityLevel::Warn, ProximityAction::SlowDown)
        } else {
            (ProximityLevel::Safe, ProximityAction::None)
        };
        Self {
            distance: d.trunc() as i64,
            alert,
            recommended_action,
        }
    }

    /// Reading from a JSON number or numeric string.
    pub fn from_value(value: Option<&Value>) -> Self {
        Self::from_distance(value.and_then(number_of))
    }
}
