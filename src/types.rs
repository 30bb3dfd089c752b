// =============================================================================
// Shared types used across the fxpulse engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Bar interval requested from the data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Interval {
    /// Length of one bar in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            Self::M5 => 5 * 60,
            Self::M15 => 15 * 60,
            Self::H1 => 60 * 60,
            Self::H4 => 4 * 60 * 60,
        }
    }

    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::seconds(self.seconds())
    }
}

impl Default for Interval {
    fn default() -> Self {
        Self::M5
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::M5 => write!(f, "5m"),
            Self::M15 => write!(f, "15m"),
            Self::H1 => write!(f, "1h"),
            Self::H4 => write!(f, "4h"),
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5m" | "m5" => Ok(Self::M5),
            "15m" | "m15" => Ok(Self::M15),
            "1h" | "h1" | "60m" => Ok(Self::H1),
            "4h" | "h4" => Ok(Self::H4),
            other => Err(format!("unsupported interval '{other}' (expected 5m, 15m, 1h or 4h)")),
        }
    }
}

/// Per-cycle classification of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
    NoData,
}

impl Signal {
    /// Whether this signal is actionable (BUY or SELL).
    pub fn is_directional(self) -> bool {
        matches!(self, Self::Buy | Self::Sell)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Hold => write!(f, "HOLD"),
            Self::NoData => write!(f, "NO_DATA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_parses_common_spellings() {
        assert_eq!("5m".parse::<Interval>().unwrap(), Interval::M5);
        assert_eq!("M15".parse::<Interval>().unwrap(), Interval::M15);
        assert_eq!("60m".parse::<Interval>().unwrap(), Interval::H1);
        assert_eq!(" 4h ".parse::<Interval>().unwrap(), Interval::H4);
        assert!("1d".parse::<Interval>().is_err());
    }

    #[test]
    fn interval_serde_uses_short_names() {
        let json = serde_json::to_string(&Interval::H4).unwrap();
        assert_eq!(json, "\"4h\"");
        let back: Interval = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(back, Interval::M15);
    }

    #[test]
    fn signal_display_and_serde_agree() {
        assert_eq!(Signal::NoData.to_string(), "NO_DATA");
        assert_eq!(serde_json::to_string(&Signal::NoData).unwrap(), "\"NO_DATA\"");
        assert!(Signal::Buy.is_directional());
        assert!(!Signal::Hold.is_directional());
    }
}
