//! Schema and plausibility checks for one source payload.

use msri_core::SourceSpec;
use serde::{Deserialize, Serialize};

use crate::fetch::IndicatorPayload;

/// A value outside its declared plausible range. The value is still used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeViolation {
    pub indicator: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadValidation {
    /// Expected indicators with no usable value, in declaration order.
    pub missing: Vec<String>,
    pub violations: Vec<RangeViolation>,
    /// Non-null finite values in the payload.
    pub present: usize,
}

impl PayloadValidation {
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        self.present == 0
    }
}

/// Compare `payload` against what `spec` declares.
///
/// Range bounds are inclusive. Indicators the source does not declare are
/// counted as present but never checked.
#[must_use]
pub fn validate_payload(spec: &SourceSpec, payload: &IndicatorPayload) -> PayloadValidation {
    let usable = |name: &str| {
        payload
            .get(name)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    };

    let missing = spec
        .indicators
        .iter()
        .filter(|i| usable(&i.name).is_none())
        .map(|i| i.name.clone())
        .collect();

    let violations = spec
        .indicators
        .iter()
        .filter_map(|i| {
            let value = usable(&i.name)?;
            (value < i.min || value > i.max).then(|| RangeViolation {
                indicator: i.name.clone(),
                value,
                min: i.min,
                max: i.max,
            })
        })
        .collect();

    let present = payload
        .values()
        .filter(|v| v.is_some_and(f64::is_finite))
        .count();

    PayloadValidation {
        missing,
        violations,
        present,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msri_core::IndicatorSpec;

    fn spec() -> SourceSpec {
        SourceSpec {
            id: "credit".to_string(),
            url: None,
            cadence: None,
            max_staleness_hours: 48,
            indicators: vec![
                IndicatorSpec {
                    name: "hy_credit_spread".to_string(),
                    min: 1.0,
                    max: 25.0,
                },
                IndicatorSpec {
                    name: "funding_spread".to_string(),
                    min: -1.0,
                    max: 5.0,
                },
            ],
        }
    }

    fn payload(pairs: &[(&str, Option<f64>)]) -> IndicatorPayload {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect()
    }

    #[test]
    fn clean_payload() {
        let v = validate_payload(
            &spec(),
            &payload(&[("hy_credit_spread", Some(4.2)), ("funding_spread", Some(0.3))]),
        );
        assert!(v.missing.is_empty());
        assert!(v.violations.is_empty());
        assert_eq!(v.present, 2);
    }

    #[test]
    fn null_and_absent_are_missing() {
        let v = validate_payload(&spec(), &payload(&[("hy_credit_spread", None)]));
        assert_eq!(v.missing, vec!["hy_credit_spread", "funding_spread"]);
        assert!(v.is_empty_result());
    }

    #[test]
    fn non_finite_counts_as_missing() {
        let v = validate_payload(
            &spec(),
            &payload(&[("hy_credit_spread", Some(f64::NAN)), ("funding_spread", Some(0.1))]),
        );
        assert_eq!(v.missing, vec!["hy_credit_spread"]);
        assert_eq!(v.present, 1);
    }

    #[test]
    fn bounds_are_inclusive() {
        let v = validate_payload(
            &spec(),
            &payload(&[("hy_credit_spread", Some(25.0)), ("funding_spread", Some(-1.0))]),
        );
        assert!(v.violations.is_empty());
    }

    #[test]
    fn out_of_range_is_reported_with_bounds() {
        let v = validate_payload(
            &spec(),
            &payload(&[("hy_credit_spread", Some(250.0)), ("funding_spread", Some(0.2))]),
        );
        assert_eq!(
            v.violations,
            vec![RangeViolation {
                indicator: "hy_credit_spread".to_string(),
                value: 250.0,
                min: 1.0,
                max: 25.0,
            }]
        );
        assert!(v.missing.is_empty());
    }
}
