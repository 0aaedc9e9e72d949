//! Rule-based proxy scoring.
//!
//! A fixed weighted sum over contact presence and engagement signals, used as
//! a regression target when no ground-truth label exists. Presence checks go
//! through the same accessor as the feature extractor.
//!
//! | factor            | points |
//! |-------------------|--------|
//! | email present     | 30     |
//! | phone present     | 30     |
//! | national ID       | 20     |
//! | name present      | 10     |
//! | > 1 distinct source  | 10  |
//! | > 1 distinct product | 10  |
//!
//! The total is capped at 100 and normalized to `[0, 1]`.

use serde::Serialize;

use crate::lead::{Lead, LeadField};

pub const MAX_POINTS: u32 = 100;

/// One scoring factor and whether it applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Factor {
    pub points: u32,
    pub applied: bool,
}

impl Factor {
    fn new(points: u32, applied: bool) -> Self {
        Self { points, applied }
    }

    fn earned(&self) -> u32 {
        if self.applied {
            self.points
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub has_email: Factor,
    pub has_phone: Factor,
    pub has_aadhar: Factor,
    pub has_name: Factor,
    pub multiple_sources: Factor,
    pub multiple_products: Factor,
}

impl ScoreBreakdown {
    fn factors(&self) -> [(&'static str, Factor); 6] {
        [
            ("hasEmail", self.has_email),
            ("hasPhone", self.has_phone),
            ("hasAadhar", self.has_aadhar),
            ("hasName", self.has_name),
            ("multipleSources", self.multiple_sources),
            ("multipleProducts", self.multiple_products),
        ]
    }
}

/// Proxy score with its explanation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyScore {
    /// Capped points, 0..=100.
    pub points: u32,
    /// `points / 100`.
    pub score: f64,
    pub reason: String,
    pub breakdown: ScoreBreakdown,
}

/// Scores a lead and explains which factors applied.
pub fn proxy_breakdown(lead: &Lead) -> ProxyScore {
    let breakdown = ScoreBreakdown {
        has_email: Factor::new(30, lead.has(LeadField::Email)),
        has_phone: Factor::new(30, lead.has(LeadField::PhoneNumber)),
        has_aadhar: Factor::new(20, lead.has(LeadField::AadharNumber)),
        has_name: Factor::new(10, lead.has(LeadField::Name)),
        multiple_sources: Factor::new(10, lead.distinct_len(LeadField::SourcesSeen) > 1),
        multiple_products: Factor::new(10, lead.distinct_len(LeadField::ProductsSeen) > 1),
    };

    let factors = breakdown.factors();
    let points = factors
        .iter()
        .map(|(_, factor)| factor.earned())
        .sum::<u32>()
        .min(MAX_POINTS);

    let applied: Vec<String> = factors
        .iter()
        .filter(|(_, factor)| factor.applied)
        .map(|(name, factor)| format!("{} (+{})", name, factor.points))
        .collect();
    let reason = if applied.is_empty() {
        "No scoring factors applied".to_string()
    } else {
        format!("Score based on: {}", applied.join(", "))
    };

    ProxyScore {
        points,
        score: f64::from(points) / f64::from(MAX_POINTS),
        reason,
        breakdown,
    }
}

/// Proxy score in `[0, 1]`.
pub fn proxy_score(lead: &Lead) -> f64 {
    proxy_breakdown(lead).score
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead(value: serde_json::Value) -> Lead {
        Lead::from_value(value)
    }

    #[test]
    fn contact_and_sources() {
        let l = lead(json!({
            "email": "a@b.com",
            "phone_number": "123",
            "sourcesSeen": ["web", "branch"],
            "productsSeen": ["PL"],
        }));
        let result = proxy_breakdown(&l);
        assert_eq!(result.points, 70);
        assert!((result.score - 0.70).abs() < 1e-12);
        assert_eq!(
            result.reason,
            "Score based on: hasEmail (+30), hasPhone (+30), multipleSources (+10)"
        );
    }

    #[test]
    fn capped_at_one() {
        let l = lead(json!({
            "email": "a@b.com",
            "phoneNumber": "123",
            "aadharNumber": "9999",
            "name": "Ravi",
            "sourcesSeen": ["a", "b"],
            "productsSeen": ["x", "y"],
        }));
        let result = proxy_breakdown(&l);
        assert_eq!(result.points, 100);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn repeated_sources_are_not_multiple() {
        let l = lead(json!({"sourcesSeen": ["web", "web", "web"]}));
        assert!(!proxy_breakdown(&l).breakdown.multiple_sources.applied);
        assert_eq!(proxy_score(&l), 0.0);
    }

    #[test]
    fn blank_fields_score_nothing() {
        let l = lead(json!({"email": "   ", "name": "", "sourcesSeen": "web,branch"}));
        let result = proxy_breakdown(&l);
        assert_eq!(result.points, 0);
        assert_eq!(result.reason, "No scoring factors applied");
    }
}
