//! Risk assessment model.

use serde::{Deserialize, Serialize};

/// Discrete risk classification derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Scored merge request.
///
/// `reasons` lists every contributing factor that fired, in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub mr_id: i64,
    pub score: f64,
    pub band: RiskBand,
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_ordering() {
        assert!(RiskBand::Low < RiskBand::Medium);
        assert!(RiskBand::Medium < RiskBand::High);
    }

    #[test]
    fn test_assessment_serialization() {
        let assessment = RiskAssessment {
            mr_id: 42,
            score: 3.5,
            band: RiskBand::Medium,
            reasons: vec!["last pipeline failed".to_string()],
        };
        let json = serde_json::to_string(&assessment).unwrap();
        assert!(json.contains("\"mrId\":42"));
        assert!(json.contains("\"band\":\"medium\""));
    }
}
