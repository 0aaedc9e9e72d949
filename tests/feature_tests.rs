/// Feature extraction, label normalization and proxy scoring
/// Tests the contract shared by training and serving
use chrono::{Duration, TimeZone, Utc};
use lead_scoring::features::{extract_at, extract_batch_at, FEATURE_COUNT, FEATURE_NAMES};
use lead_scoring::labels::normalize_labels;
use lead_scoring::lead::Lead;
use lead_scoring::scoring::{proxy_breakdown, proxy_score};
use serde_json::{json, Value};

fn lead(value: Value) -> Lead {
    Lead::from_value(value)
}

fn reference_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

#[cfg(test)]
mod extractor_tests {
    use super::*;

    #[test]
    fn test_schema_order() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        assert_eq!(FEATURE_NAMES[0], "has_email");
        assert_eq!(FEATURE_NAMES[6], "days_since_created");
        assert_eq!(FEATURE_NAMES[10], "p_id_other");
    }

    #[test]
    fn test_full_lead() {
        let now = reference_time();
        let record = lead(json!({
            "leadId": "L-1",
            "email": "a@b.io",
            "phoneNumber": "9876543210",
            "aadharNumber": "1234-5678-9012",
            "name": "Asha",
            "sourcesSeen": ["google", "meta", "google"],
            "productsSeen": ["PL"],
            "createdAt": (now - Duration::days(10)).to_rfc3339(),
            "pId": "personal_loan_v2"
        }));

        let features = extract_at(&record, now).to_array();
        assert_eq!(features, [1, 1, 1, 1, 3, 1, 10, 1, 0, 0, 0]);
    }

    #[test]
    fn test_empty_lead() {
        let features = extract_at(&lead(json!({})), reference_time()).to_array();
        assert_eq!(features, [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_wrong_types_do_not_panic() {
        let record = lead(json!({
            "email": 42,
            "phoneNumber": "   ",
            "name": null,
            "sourcesSeen": "google",
            "productsSeen": {"a": 1},
            "createdAt": "not a date",
            "pId": 7,
            "unexpected": [1, 2, 3]
        }));
        let features = extract_at(&record, reference_time());
        assert_eq!(features.has_email, 1);
        assert_eq!(features.has_phone, 0);
        assert_eq!(features.has_name, 0);
        assert_eq!(features.num_sources_seen, 0);
        assert_eq!(features.num_products_seen, 0);
        assert_eq!(features.days_since_created, 0);
        assert_eq!(features.p_id_other, 1);
    }

    #[test]
    fn test_snake_case_keys_match_camel_case() {
        let now = reference_time();
        let created = (now - Duration::days(4)).to_rfc3339();
        let camel = lead(json!({
            "phoneNumber": "1", "aadharNumber": "2",
            "sourcesSeen": ["a", "b"], "productsSeen": ["x"],
            "createdAt": created, "pId": "CREDIT_CARD"
        }));
        let snake = lead(json!({
            "phone_number": "1", "aadhar_number": "2",
            "sources_seen": ["a", "b"], "products_seen": ["x"],
            "created_at": created, "p_id": "CREDIT_CARD"
        }));
        assert_eq!(extract_at(&camel, now), extract_at(&snake, now));
    }

    #[test]
    fn test_camel_case_wins_when_both_present() {
        let record = lead(json!({"phoneNumber": "", "phone_number": "123"}));
        assert_eq!(extract_at(&record, reference_time()).has_phone, 0);
    }

    #[test]
    fn test_recency_truncates_to_whole_days() {
        let now = reference_time();
        let created = now - Duration::hours(84);
        let record = lead(json!({"createdAt": created.to_rfc3339()}));
        assert_eq!(extract_at(&record, now).days_since_created, 3);
    }

    #[test]
    fn test_future_creation_clamps_to_zero() {
        let now = reference_time();
        let record = lead(json!({"createdAt": (now + Duration::days(2)).to_rfc3339()}));
        assert_eq!(extract_at(&record, now).days_since_created, 0);
    }

    #[test]
    fn test_product_priority() {
        let now = reference_time();
        let category = |p_id: &str| {
            let features = extract_at(&lead(json!({"pId": p_id})), now).to_array();
            features[7..].to_vec()
        };
        assert_eq!(category("home_loan"), vec![1, 0, 0, 0]);
        assert_eq!(category("credit-card"), vec![0, 1, 0, 0]);
        assert_eq!(category("Home Improvement"), vec![0, 0, 1, 0]);
        assert_eq!(category("insurance"), vec![0, 0, 0, 1]);
        assert_eq!(category(""), vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_non_scalar_product_id_is_other() {
        let now = reference_time();
        for p_id in [json!(["LOAN"]), json!({"name": "CREDIT_CARD"})] {
            let features = extract_at(&lead(json!({"pId": p_id})), now);
            assert_eq!(features.p_id_other, 1);
            assert_eq!(features.p_id_personal_loan + features.p_id_credit_card, 0);
        }
        // Numeric ids are rendered and classified
        let numeric = extract_at(&lead(json!({"pId": 42})), now);
        assert_eq!(numeric.p_id_other, 1);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let now = reference_time();
        let record = lead(json!({"email": "x@y.z", "sourcesSeen": [1, 2]}));
        assert_eq!(extract_at(&record, now), extract_at(&record, now));
    }

    #[test]
    fn test_batch_rows_align_with_input() {
        let now = reference_time();
        let leads = vec![
            lead(json!({"email": "a@b.c"})),
            lead(json!({})),
            lead(json!({"pId": "CARD"})),
        ];
        let matrix = extract_batch_at(&leads, now);
        assert_eq!(matrix.len(), 3);
        for (row, record) in matrix.rows().iter().zip(&leads) {
            assert_eq!(*row, extract_at(record, now).to_array());
        }
        assert!(extract_batch_at(&[], now).is_empty());
    }
}

#[cfg(test)]
mod label_tests {
    use super::*;

    #[test]
    fn test_mixed_label_values() {
        let raw = vec![
            json!(1),
            json!("yes"),
            json!("0"),
            json!("maybe"),
            Value::Null,
            json!(true),
        ];
        let labels = normalize_labels(&raw);
        assert_eq!(labels.valid_labels(), vec![1, 1, 0, 1]);
        assert_eq!(
            labels.valid_mask(),
            &[true, true, true, false, false, true]
        );
    }

    #[test]
    fn test_numeric_strings_and_floats() {
        let raw = vec![json!(" 1.0 "), json!(0.0), json!(2), json!("N"), json!(" TRUE ")];
        let labels = normalize_labels(&raw);
        assert_eq!(labels.labels(), &[Some(1), Some(0), None, Some(0), Some(1)]);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let raw = vec![json!(1), json!("yes"), json!(true)];
        assert!(normalize_labels(&raw).ensure_two_classes().is_err());
    }
}

#[cfg(test)]
mod proxy_score_tests {
    use super::*;

    #[test]
    fn test_documented_example() {
        let record = lead(json!({
            "email": "a@b.io",
            "phoneNumber": "98765",
            "sourcesSeen": ["google", "meta"],
            "productsSeen": ["PL"]
        }));
        let result = proxy_breakdown(&record);
        assert_eq!(result.points, 70);
        assert!((result.score - 0.70).abs() < 1e-12);
        assert_eq!(
            result.reason,
            "Score based on: hasEmail (+30), hasPhone (+30), multipleSources (+10)"
        );
    }

    #[test]
    fn test_duplicate_sources_are_not_multiple() {
        let record = lead(json!({"sourcesSeen": ["google", "google"]}));
        assert_eq!(proxy_score(&record), 0.0);
        assert_eq!(proxy_breakdown(&record).reason, "No scoring factors applied");
    }

    #[test]
    fn test_complete_lead_scores_one() {
        let record = lead(json!({
            "email": "a", "phoneNumber": "b", "aadharNumber": "c", "name": "d",
            "sourcesSeen": ["x", "y"], "productsSeen": ["p", "q"]
        }));
        assert_eq!(proxy_score(&record), 1.0);
    }
}
