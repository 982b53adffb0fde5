//! Risk classification.

use crate::domain::{RiskAssessment, RiskBands};

/// Band a probability with the shared 0.4 / 0.7 cut points.
#[must_use]
pub fn classify(probability: f64) -> RiskAssessment {
    classify_with(RiskBands::default(), probability)
}

/// Band a probability with explicit (already validated) cut points.
#[must_use]
pub fn classify_with(bands: RiskBands, probability: f64) -> RiskAssessment {
    RiskAssessment::new(bands.level(probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;

    #[test]
    fn test_every_probability_gets_one_band() {
        let mut previous = RiskLevel::Low;
        for step in 0..=1000 {
            let p = f64::from(step) / 1000.0;
            let level = classify(p).level;
            // Bands never go back down as probability rises.
            let rank = |l: RiskLevel| match l {
                RiskLevel::Low => 0,
                RiskLevel::Moderate => 1,
                RiskLevel::High => 2,
            };
            assert!(rank(level) >= rank(previous));
            previous = level;
        }
        assert_eq!(previous, RiskLevel::High);
    }

    #[test]
    fn test_message_depends_only_on_band() {
        let a = classify(0.45);
        let b = classify(0.69);
        assert_eq!(a.level, RiskLevel::Moderate);
        assert_eq!(a.message, b.message);
    }

    #[test]
    fn test_override_bands() {
        let bands = RiskBands::new(0.3, 0.6).expect("valid");
        assert_eq!(classify_with(bands, 0.35).level, RiskLevel::Moderate);
        assert_eq!(classify_with(bands, 0.6).level, RiskLevel::High);
        assert_eq!(classify(0.35).level, RiskLevel::Low);
    }
}
