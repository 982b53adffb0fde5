//! Feature schemas and the clinical catalog they are validated against.
//!
//! The catalog documents, per disease, every required input field with its
//! kind and valid domain. The ORDER of a [`FeatureSchema`] is never taken
//! from the catalog: it comes from the exported artifact, because that is
//! the column order the model was trained on.

use serde::{Deserialize, Serialize};

use super::disease::DiseaseId;

/// Valid domain of a single input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDomain {
    /// Continuous measurement, inclusive bounds.
    Numeric { min: f64, max: f64 },
    /// Integer code drawn from an enumerated set.
    Categorical { codes: Vec<i64> },
}

impl FeatureDomain {
    fn numeric(min: f64, max: f64) -> Self {
        Self::Numeric { min, max }
    }

    fn binary() -> Self {
        Self::Categorical { codes: vec![0, 1] }
    }

    fn codes(upto: i64) -> Self {
        Self::Categorical {
            codes: (0..=upto).collect(),
        }
    }
}

/// One field of a disease schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub domain: FeatureDomain,
    pub description: String,
}

impl FeatureSpec {
    fn new(name: &str, domain: FeatureDomain, description: &str) -> Self {
        Self {
            name: name.to_string(),
            domain,
            description: description.to_string(),
        }
    }
}

/// Ordered, validated feature layout for one disease.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    disease: DiseaseId,
    fields: Vec<FeatureSpec>,
}

impl FeatureSchema {
    /// Build a schema from an exported column order.
    ///
    /// Every exported name must exist in the disease's catalog exactly once,
    /// and every catalog field must be exported.
    ///
    /// # Errors
    /// Returns a description of the first mismatch.
    pub fn from_export(disease: DiseaseId, order: &[String]) -> Result<Self, String> {
        let catalog = clinical_catalog(disease);
        let mut fields = Vec::with_capacity(order.len());

        for name in order {
            if fields.iter().any(|f: &FeatureSpec| &f.name == name) {
                return Err(format!("feature {name:?} exported twice"));
            }
            let spec = catalog
                .iter()
                .find(|spec| &spec.name == name)
                .ok_or_else(|| format!("feature {name:?} is not part of the {disease} catalog"))?;
            fields.push(spec.clone());
        }

        let missing: Vec<&str> = catalog
            .iter()
            .filter(|spec| !order.contains(&spec.name))
            .map(|spec| spec.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!("export is missing features: {}", missing.join(", ")));
        }

        Ok(Self { disease, fields })
    }

    /// Schema in catalog order (the order used by the training pipeline).
    #[must_use]
    pub fn catalog_order(disease: DiseaseId) -> Self {
        Self {
            disease,
            fields: clinical_catalog(disease),
        }
    }

    #[must_use]
    pub fn disease(&self) -> DiseaseId {
        self.disease
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[FeatureSpec] {
        &self.fields
    }

    #[must_use]
    pub fn name(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(|f| f.name.as_str())
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Documented clinical domains per disease, in training column order.
#[must_use]
pub fn clinical_catalog(disease: DiseaseId) -> Vec<FeatureSpec> {
    use FeatureDomain as D;

    match disease {
        DiseaseId::Diabetes => vec![
            FeatureSpec::new("Gender", D::binary(), "0 = female, 1 = male"),
            FeatureSpec::new("AGE", D::numeric(0.0, 120.0), "Age in years"),
            FeatureSpec::new("Urea", D::numeric(0.0, 300.0), "Blood urea"),
            FeatureSpec::new("Cr", D::numeric(0.0, 1500.0), "Creatinine ratio"),
            FeatureSpec::new("HbA1c", D::numeric(0.0, 20.0), "Glycated haemoglobin (%)"),
            FeatureSpec::new("Chol", D::numeric(0.0, 1000.0), "Total cholesterol"),
            FeatureSpec::new("TG", D::numeric(0.0, 2000.0), "Triglycerides"),
            FeatureSpec::new("HDL", D::numeric(0.0, 300.0), "High-density lipoprotein"),
            FeatureSpec::new("LDL", D::numeric(0.0, 600.0), "Low-density lipoprotein"),
            FeatureSpec::new("VLDL", D::numeric(0.0, 300.0), "Very-low-density lipoprotein"),
            FeatureSpec::new("BMI", D::numeric(0.0, 100.0), "Body mass index"),
        ],
        DiseaseId::HeartDisease => vec![
            FeatureSpec::new("age", D::numeric(0.0, 120.0), "Age in years"),
            FeatureSpec::new("sex", D::binary(), "0 = female, 1 = male"),
            FeatureSpec::new("cp", D::codes(3), "Chest pain type"),
            FeatureSpec::new("trestbps", D::numeric(80.0, 200.0), "Resting blood pressure (mmHg)"),
            FeatureSpec::new("chol", D::numeric(100.0, 600.0), "Serum cholesterol (mg/dl)"),
            FeatureSpec::new("fbs", D::binary(), "Fasting blood sugar > 120 mg/dl"),
            FeatureSpec::new("restecg", D::codes(2), "Resting ECG result"),
            FeatureSpec::new("thalach", D::numeric(60.0, 220.0), "Maximum heart rate achieved"),
            FeatureSpec::new("exang", D::binary(), "Exercise induced angina"),
            FeatureSpec::new(
                "oldpeak",
                D::numeric(-3.0, 10.0),
                "ST depression induced by exercise",
            ),
            FeatureSpec::new("slope", D::codes(2), "Slope of the peak exercise ST segment"),
            FeatureSpec::new("ca", D::codes(3), "Major vessels coloured by fluoroscopy"),
            FeatureSpec::new("thal", D::codes(3), "Thalassemia"),
        ],
        DiseaseId::Parkinsons => vec![
            FeatureSpec::new("Age", D::numeric(30.0, 100.0), "Age in years"),
            FeatureSpec::new("Gender", D::binary(), "0 = female, 1 = male"),
            FeatureSpec::new("Ethnicity", D::codes(3), "Ethnicity code"),
            FeatureSpec::new("EducationLevel", D::codes(3), "Education level code"),
            FeatureSpec::new("BMI", D::numeric(10.0, 50.0), "Body mass index"),
            FeatureSpec::new("Smoking", D::binary(), "Smoking status"),
            FeatureSpec::new("AlcoholConsumption", D::numeric(0.0, 20.0), "Weekly alcohol units"),
            FeatureSpec::new("PhysicalActivity", D::numeric(0.0, 10.0), "Weekly activity hours"),
            FeatureSpec::new("DietQuality", D::numeric(0.0, 10.0), "Diet quality score"),
            FeatureSpec::new("SleepQuality", D::numeric(0.0, 10.0), "Sleep quality score"),
            FeatureSpec::new("FamilyHistoryParkinsons", D::binary(), "Family history"),
            FeatureSpec::new("TraumaticBrainInjury", D::binary(), "History of brain injury"),
            FeatureSpec::new("Hypertension", D::binary(), "Hypertension"),
            FeatureSpec::new("Diabetes", D::binary(), "Diabetes"),
            FeatureSpec::new("Depression", D::binary(), "Depression"),
            FeatureSpec::new("Stroke", D::binary(), "History of stroke"),
            FeatureSpec::new("SystolicBP", D::numeric(80.0, 200.0), "Systolic blood pressure"),
            FeatureSpec::new("DiastolicBP", D::numeric(50.0, 130.0), "Diastolic blood pressure"),
            FeatureSpec::new("CholesterolTotal", D::numeric(0.0, 600.0), "Total cholesterol"),
            FeatureSpec::new("CholesterolLDL", D::numeric(0.0, 400.0), "LDL cholesterol"),
            FeatureSpec::new("CholesterolHDL", D::numeric(0.0, 200.0), "HDL cholesterol"),
            FeatureSpec::new("CholesterolTriglycerides", D::numeric(0.0, 1000.0), "Triglycerides"),
            FeatureSpec::new("UPDRS", D::numeric(0.0, 199.0), "UPDRS score"),
            FeatureSpec::new("MoCA", D::numeric(0.0, 30.0), "MoCA score"),
            FeatureSpec::new(
                "FunctionalAssessment",
                D::numeric(0.0, 10.0),
                "Functional assessment",
            ),
            FeatureSpec::new("Tremor", D::binary(), "Tremor"),
            FeatureSpec::new("Rigidity", D::binary(), "Rigidity"),
            FeatureSpec::new("Bradykinesia", D::binary(), "Bradykinesia"),
            FeatureSpec::new("PosturalInstability", D::binary(), "Postural instability"),
            FeatureSpec::new("SpeechProblems", D::binary(), "Speech problems"),
            FeatureSpec::new("SleepDisorders", D::binary(), "Sleep disorders"),
            FeatureSpec::new("Constipation", D::binary(), "Constipation"),
        ],
    }
}

/// What is wrong with one input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FieldProblem {
    Missing,
    NotNumeric,
    NonFinite,
    NotAnIntegerCode { value: f64 },
    UnknownCode { code: i64, allowed: Vec<i64> },
    OutOfRange { value: f64, min: f64, max: f64 },
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "is required"),
            Self::NotNumeric => write!(f, "must be a number"),
            Self::NonFinite => write!(f, "must be finite"),
            Self::NotAnIntegerCode { value } => write!(f, "must be an integer code, got {value}"),
            Self::UnknownCode { code, allowed } => {
                write!(f, "code {code} is not one of {allowed:?}")
            }
            Self::OutOfRange { value, min, max } => {
                write!(f, "{value} is outside [{min}, {max}]")
            }
        }
    }
}

/// A rejected field and the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    #[serde(flatten)]
    pub problem: FieldProblem,
}

/// Raw input failed validation against a disease schema.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid {disease} input: {}", describe_issues(.issues))]
pub struct ValidationError {
    pub disease: DiseaseId,
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Offending field names, in schema order.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }
}

fn describe_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{} {}", i.field, i.problem))
        .collect::<Vec<_>>()
        .join("; ")
}
