// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure escalation arithmetic.

use beacon_config::model::EscalationConfig;

/// Relative weight of each escalation signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationWeights {
    pub repetition: f64,
    pub sentiment: f64,
    pub category: f64,
    pub flags: f64,
    /// Repeats at which the repetition signal reaches 1.0.
    pub repetition_saturation: u32,
}

impl Default for EscalationWeights {
    fn default() -> Self {
        Self::from(&EscalationConfig::default())
    }
}

impl From<&EscalationConfig> for EscalationWeights {
    fn from(cfg: &EscalationConfig) -> Self {
        Self {
            repetition: cfg.repetition_weight,
            sentiment: cfg.sentiment_weight,
            category: cfg.category_weight,
            flags: cfg.flag_weight,
            repetition_saturation: cfg.repetition_saturation,
        }
    }
}

/// Raw per-message signals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Signals {
    /// Near-duplicate messages from the sender inside the trailing window.
    pub repeats: u32,
    /// Sentiment negativity scaled by classifier confidence.
    pub negativity: f64,
    /// Severity bias of the matched category, zero when unmatched.
    pub category_bias: f64,
    /// Sender's historical flag rate.
    pub flag_rate: f64,
}

impl EscalationWeights {
    /// Weighted sum of the unit-scaled signals, clamped to [0, 1].
    pub fn score(&self, signals: &Signals) -> f64 {
        let saturation = f64::from(self.repetition_saturation.max(1));
        let repetition = (f64::from(signals.repeats) / saturation).min(1.0);
        let sum = self.repetition * repetition
            + self.sentiment * unit(signals.negativity)
            + self.category * unit(signals.category_bias)
            + self.flags * unit(signals.flag_rate);
        if sum.is_nan() {
            return 0.0;
        }
        sum.clamp(0.0, 1.0)
    }
}

fn unit(x: f64) -> f64 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{RiskLevel, SeverityBands};
    use proptest::prelude::*;

    #[test]
    fn repeated_negative_equipment_complaint_is_high() {
        let w = EscalationWeights::default();
        let score = w.score(&Signals {
            repeats: 2,
            negativity: 0.9,
            category_bias: 0.7,
            flag_rate: 0.0,
        });
        assert!((score - (0.35 + 0.225 + 0.14)).abs() < 1e-9);
        assert_eq!(SeverityBands::default().band(score), RiskLevel::High);
    }

    #[test]
    fn repetition_saturates() {
        let w = EscalationWeights::default();
        let two = w.score(&Signals { repeats: 2, ..Default::default() });
        let ten = w.score(&Signals { repeats: 10, ..Default::default() });
        assert_eq!(two, ten);
    }

    #[test]
    fn quiet_first_message_is_low() {
        let w = EscalationWeights::default();
        assert_eq!(w.score(&Signals::default()), 0.0);
    }

    #[test]
    fn oversized_weights_clamp() {
        let w = EscalationWeights {
            repetition: 5.0,
            sentiment: 5.0,
            category: 5.0,
            flags: 5.0,
            repetition_saturation: 1,
        };
        let s = w.score(&Signals {
            repeats: 1,
            negativity: 1.0,
            category_bias: 1.0,
            flag_rate: 1.0,
        });
        assert_eq!(s, 1.0);
    }

    proptest! {
        #[test]
        fn score_is_always_bounded(
            repeats in 0u32..1000,
            negativity in -10.0f64..10.0,
            bias in -10.0f64..10.0,
            flag_rate in -10.0f64..10.0,
            wr in 0.0f64..5.0, ws in 0.0f64..5.0, wc in 0.0f64..5.0, wf in 0.0f64..5.0,
            saturation in 0u32..10,
        ) {
            let w = EscalationWeights {
                repetition: wr,
                sentiment: ws,
                category: wc,
                flags: wf,
                repetition_saturation: saturation,
            };
            let s = w.score(&Signals { repeats, negativity, category_bias: bias, flag_rate });
            prop_assert!((0.0..=1.0).contains(&s));
        }

        #[test]
        fn banding_is_a_pure_function(score in 0.0f64..=1.0) {
            let bands = SeverityBands::default();
            let first = bands.band(score);
            prop_assert_eq!(first, bands.band(score));
            let expected = if score >= 0.8 {
                RiskLevel::Critical
            } else if score >= 0.6 {
                RiskLevel::High
            } else if score >= 0.3 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            prop_assert_eq!(first, expected);
        }
    }
}
