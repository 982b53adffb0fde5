//! Feature validation and encoding.
//!
//! Builds the model input by walking the profile's schema, never the caller's
//! map, so key order and unknown keys in the request cannot shift positions.
//! Every field is checked before any failure is reported, and nothing is
//! defaulted or clamped.

use serde_json::{Map, Value};

use crate::domain::{
    DiseaseProfile, FeatureDomain, FeatureVector, FieldIssue, FieldProblem, ValidationError,
};

/// Validate `raw` against the profile schema and scale it.
///
/// # Errors
/// Returns a `ValidationError` listing every offending field in schema order.
pub fn encode(
    profile: &DiseaseProfile,
    raw: &Map<String, Value>,
) -> Result<FeatureVector, ValidationError> {
    let schema = profile.schema();
    let mut values = Vec::with_capacity(schema.len());
    let mut issues = Vec::new();

    for spec in schema.fields() {
        match coerce(raw.get(&spec.name)).and_then(|v| check_domain(&spec.domain, v)) {
            Ok(v) => values.push(v),
            Err(problem) => issues.push(FieldIssue {
                field: spec.name.clone(),
                problem,
            }),
        }
    }

    if !issues.is_empty() {
        tracing::debug!(
            disease = %profile.disease(),
            rejected = ?issues.iter().map(|i| i.field.as_str()).collect::<Vec<_>>(),
            "Input rejected"
        );
        return Err(ValidationError {
            disease: profile.disease(),
            issues,
        });
    }

    let ignored = raw.keys().filter(|k| schema.position(k).is_none()).count();
    tracing::debug!(
        disease = %profile.disease(),
        features = values.len(),
        ignored,
        "Input encoded"
    );

    Ok(FeatureVector::from_scaled(
        profile.disease(),
        profile.scaler().transform(&values),
    ))
}

/// Numbers and numeric strings are accepted; `null` counts as absent.
fn coerce(value: Option<&Value>) -> Result<f64, FieldProblem> {
    let v = match value {
        None | Some(Value::Null) => return Err(FieldProblem::Missing),
        Some(Value::Number(n)) => n.as_f64().ok_or(FieldProblem::NotNumeric)?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FieldProblem::NotNumeric)?,
        Some(Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
            return Err(FieldProblem::NotNumeric)
        }
    };
    if v.is_finite() {
        Ok(v)
    } else {
        Err(FieldProblem::NonFinite)
    }
}

fn check_domain(domain: &FeatureDomain, value: f64) -> Result<f64, FieldProblem> {
    match domain {
        FeatureDomain::Numeric { min, max } => {
            if value < *min || value > *max {
                Err(FieldProblem::OutOfRange {
                    value,
                    min: *min,
                    max: *max,
                })
            } else {
                Ok(value)
            }
        }
        FeatureDomain::Categorical { codes } => {
            if value.fract() != 0.0 {
                return Err(FieldProblem::NotAnIntegerCode { value });
            }
            // Finite and integral; codes are tiny, so the cast is exact.
            let code = value as i64;
            if codes.contains(&code) {
                Ok(value)
            } else {
                Err(FieldProblem::UnknownCode {
                    code,
                    allowed: codes.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::artifacts::tests::heart_fixture;
    use crate::adapters::artifacts::{load_profile, IntegrityPolicy};
    use crate::adapters::MemoryStore;
    use crate::domain::DiseaseId;
    use serde_json::json;

    fn heart_profile() -> DiseaseProfile {
        let mut store = MemoryStore::new();
        for (name, bytes) in heart_fixture() {
            store.insert(DiseaseId::HeartDisease, name, bytes);
        }
        load_profile(&store, DiseaseId::HeartDisease, &IntegrityPolicy::default())
            .expect("fixture loads")
    }

    fn heart_input() -> Map<String, Value> {
        let value = json!({
            "age": 63, "sex": 1, "cp": 3, "trestbps": 145, "chol": 233, "fbs": 1,
            "restecg": 0, "thalach": 150, "exang": 0, "oldpeak": 2.3, "slope": 0,
            "ca": 0, "thal": 1
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_encodes_in_schema_order_and_scales() {
        let profile = heart_profile();
        let vector = encode(&profile, &heart_input()).expect("valid input");
        assert_eq!(vector.len(), 13);
        // Fixture scaler: mean 1, scale 2.
        assert_eq!(vector.values()[0], (63.0 - 1.0) / 2.0);
        assert_eq!(vector.values()[3], (145.0 - 1.0) / 2.0);
    }

    #[test]
    fn test_key_order_and_extra_keys_do_not_matter() {
        let profile = heart_profile();
        let mut reordered: Map<String, Value> = heart_input().into_iter().rev().collect();
        reordered.insert("patient_name".into(), json!("ignored"));

        let a = encode(&profile, &heart_input()).expect("valid");
        let b = encode(&profile, &reordered).expect("valid");
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_field_is_named() {
        let profile = heart_profile();
        let mut input = heart_input();
        input.remove("trestbps");

        let err = encode(&profile, &input).expect_err("trestbps missing");
        assert_eq!(err.fields(), vec!["trestbps"]);
        assert_eq!(err.issues[0].problem, FieldProblem::Missing);
    }

    #[test]
    fn test_categorical_code_outside_domain() {
        let profile = heart_profile();
        let mut input = heart_input();
        input.insert("sex".into(), json!(5));
        input.insert("cp".into(), json!(1.5));

        let err = encode(&profile, &input).expect_err("bad codes");
        assert_eq!(err.fields(), vec!["sex", "cp"]);
        assert!(matches!(
            err.issues[0].problem,
            FieldProblem::UnknownCode { code: 5, .. }
        ));
        assert!(matches!(
            err.issues[1].problem,
            FieldProblem::NotAnIntegerCode { .. }
        ));
    }

    #[test]
    fn test_out_of_range_is_rejected_not_clamped() {
        let profile = heart_profile();
        let mut input = heart_input();
        input.insert("age".into(), json!(121));
        input.insert("trestbps".into(), json!(79.9));

        let err = encode(&profile, &input).expect_err("out of range");
        assert_eq!(err.fields(), vec!["age", "trestbps"]);
    }

    #[test]
    fn test_coercion_rules() {
        assert_eq!(coerce(Some(&json!(" 45 "))), Ok(45.0));
        assert_eq!(coerce(Some(&json!(1.25))), Ok(1.25));
        assert_eq!(coerce(Some(&Value::Null)), Err(FieldProblem::Missing));
        assert_eq!(coerce(None), Err(FieldProblem::Missing));
        assert_eq!(coerce(Some(&json!(true))), Err(FieldProblem::NotNumeric));
        assert_eq!(coerce(Some(&json!([1]))), Err(FieldProblem::NotNumeric));
        assert_eq!(coerce(Some(&json!("abc"))), Err(FieldProblem::NotNumeric));
        assert_eq!(coerce(Some(&json!("NaN"))), Err(FieldProblem::NonFinite));
    }
}
