//! Linear models read from a JSON artifact.
//!
//! ```json
//! { "kind": "classifier",
//!   "features": ["sepal_length", "sepal_width", "petal_length", "petal_width"],
//!   "classes": [0, 1, 2],
//!   "coefficients": [[...], [...], [...]],
//!   "intercepts": [0.1, 0.2, -0.3] }
//! ```
//!
//! A `regressor` artifact carries a single `coefficients` vector and an
//! optional `intercept`. `features` is optional; without it the model only
//! accepts positional rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Model, ModelError};
use crate::rows::{FeatureFrame, FeatureRow};

/// A linear regressor or one-vs-rest linear classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinearModel {
    /// `y = w · x + b`.
    Regressor {
        /// Optional feature names, in coefficient order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        features: Option<Vec<String>>,
        /// One weight per feature.
        coefficients: Vec<f64>,
        /// Bias term.
        #[serde(default)]
        intercept: f64,
    },
    /// Predicts the class whose `w_k · x + b_k` is highest.
    Classifier {
        /// Optional feature names, in coefficient order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        features: Option<Vec<String>>,
        /// Class labels returned as predictions.
        classes: Vec<Value>,
        /// One weight vector per class.
        coefficients: Vec<Vec<f64>>,
        /// One bias per class.
        intercepts: Vec<f64>,
    },
}

impl LinearModel {
    /// Parse and validate a JSON artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArtifact`] if the bytes are not a linear
    /// model document or its dimensions disagree.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_slice(bytes)
            .map_err(|e| ModelError::InvalidArtifact(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    /// Check dimension consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArtifact`] describing the first problem.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: String| Err(ModelError::InvalidArtifact(msg));
        match self {
            Self::Regressor {
                coefficients,
                intercept,
                ..
            } => {
                if coefficients.is_empty() {
                    return invalid("regressor has no coefficients".into());
                }
                if !coefficients.iter().chain([intercept]).all(|w| w.is_finite()) {
                    return invalid("regressor weights must be finite".into());
                }
            }
            Self::Classifier {
                classes,
                coefficients,
                intercepts,
                ..
            } => {
                if classes.is_empty() {
                    return invalid("classifier has no classes".into());
                }
                if coefficients.len() != classes.len() || intercepts.len() != classes.len() {
                    return invalid(format!(
                        "{} classes but {} coefficient rows and {} intercepts",
                        classes.len(),
                        coefficients.len(),
                        intercepts.len()
                    ));
                }
                let width = coefficients[0].len();
                if width == 0 {
                    return invalid("classifier has no coefficients".into());
                }
                if let Some(k) = coefficients.iter().position(|w| w.len() != width) {
                    return invalid(format!(
                        "coefficient row {k} has {} weights, expected {width}",
                        coefficients[k].len()
                    ));
                }
                let all_finite = coefficients
                    .iter()
                    .flatten()
                    .chain(intercepts.iter())
                    .all(|w| w.is_finite());
                if !all_finite {
                    return invalid("classifier weights must be finite".into());
                }
            }
        }

        if let Some(names) = self.features() {
            if names.len() != self.width() {
                return invalid(format!(
                    "{} feature names for {} coefficients",
                    names.len(),
                    self.width()
                ));
            }
        }
        Ok(())
    }

    /// Number of input features.
    pub fn width(&self) -> usize {
        match self {
            Self::Regressor { coefficients, .. } => coefficients.len(),
            Self::Classifier { coefficients, .. } => coefficients.first().map_or(0, Vec::len),
        }
    }

    /// Feature names, if the artifact declared them.
    pub fn features(&self) -> Option<&[String]> {
        match self {
            Self::Regressor { features, .. } | Self::Classifier { features, .. } => {
                features.as_deref()
            }
        }
    }

    fn extract(&self, index: usize, row: &FeatureRow) -> Result<Vec<f64>, ModelError> {
        match row {
            FeatureRow::Values(values) => {
                if values.len() != self.width() {
                    return Err(ModelError::Shape {
                        row: index,
                        expected: self.width(),
                        found: values.len(),
                    });
                }
                values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        numeric(v).ok_or_else(|| ModelError::FeatureType {
                            row: index,
                            feature: i.to_string(),
                        })
                    })
                    .collect()
            }
            FeatureRow::Named(fields) => {
                let names = self
                    .features()
                    .ok_or(ModelError::UnnamedFeatures { row: index })?;
                names
                    .iter()
                    .map(|name| {
                        let value = fields.get(name).ok_or_else(|| ModelError::MissingFeature {
                            row: index,
                            feature: name.clone(),
                        })?;
                        numeric(value).ok_or_else(|| ModelError::FeatureType {
                            row: index,
                            feature: name.clone(),
                        })
                    })
                    .collect()
            }
        }
    }

    fn score(&self, x: &[f64]) -> Value {
        match self {
            Self::Regressor {
                coefficients,
                intercept,
                ..
            } => Value::from(dot(coefficients, x) + intercept),
            Self::Classifier {
                classes,
                coefficients,
                intercepts,
                ..
            } => {
                let mut best = 0;
                let mut best_score = f64::NEG_INFINITY;
                for (k, (w, b)) in coefficients.iter().zip(intercepts).enumerate() {
                    let s = dot(w, x) + b;
                    if s > best_score {
                        best = k;
                        best_score = s;
                    }
                }
                classes[best].clone()
            }
        }
    }
}

#[async_trait]
impl Model for LinearModel {
    async fn predict(&self, frame: &FeatureFrame) -> Result<Vec<Value>, ModelError> {
        frame
            .rows()
            .iter()
            .enumerate()
            .map(|(i, row)| self.extract(i, row).map(|x| self.score(&x)))
            .collect()
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn iris_classifier() -> LinearModel {
        LinearModel::from_slice(
            json!({
                "kind": "classifier",
                "features": ["sepal_length", "sepal_width", "petal_length", "petal_width"],
                "classes": ["setosa", "versicolor", "virginica"],
                "coefficients": [
                    [0.4, 1.4, -2.2, -1.0],
                    [0.5, -1.6, 0.6, -1.3],
                    [-1.6, -1.5, 2.4, 2.5]
                ],
                "intercepts": [0.3, 1.0, -1.1]
            })
            .to_string()
            .as_bytes(),
        )
        .expect("valid artifact")
    }

    #[tokio::test]
    async fn test_classifier_predicts_one_label_per_row() {
        let model = iris_classifier();
        let frame = FeatureFrame::from_json(&json!([
            [5.1, 3.5, 1.4, 0.2],
            [6.7, 3.0, 5.2, 2.3]
        ]))
        .expect("frame");
        let out = model.predict(&frame).await.expect("predict");
        assert_eq!(out, vec![json!("setosa"), json!("virginica")]);
    }

    #[tokio::test]
    async fn test_classifier_accepts_named_rows() {
        let model = iris_classifier();
        let frame = FeatureFrame::from_json(&json!([{
            "petal_width": 0.2, "petal_length": 1.4, "sepal_width": 3.5, "sepal_length": 5.1
        }]))
        .expect("frame");
        let out = model.predict(&frame).await.expect("predict");
        assert_eq!(out, vec![json!("setosa")]);
    }

    #[tokio::test]
    async fn test_regressor_computes_affine_score() {
        let model = LinearModel::Regressor {
            features: None,
            coefficients: vec![2.0, -1.0],
            intercept: 0.5,
        };
        let frame = FeatureFrame::from_json(&json!([[1.0, 1.0], [3.0, 0.0]])).expect("frame");
        let out = model.predict(&frame).await.expect("predict");
        assert_eq!(out, vec![json!(1.5), json!(6.5)]);
    }

    #[tokio::test]
    async fn test_wrong_width_fails_whole_request() {
        let model = iris_classifier();
        let frame =
            FeatureFrame::from_json(&json!([[5.1, 3.5, 1.4, 0.2], [1.0, 2.0]])).expect("frame");
        let err = model.predict(&frame).await.expect_err("must fail");
        assert!(matches!(
            err,
            ModelError::Shape {
                row: 1,
                expected: 4,
                found: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_non_numeric_feature_fails() {
        let model = iris_classifier();
        let frame = FeatureFrame::from_json(&json!([[5.1, "wide", 1.4, 0.2]])).expect("frame");
        let err = model.predict(&frame).await.expect_err("must fail");
        assert!(matches!(err, ModelError::FeatureType { row: 0, ref feature } if feature == "1"));
    }

    #[tokio::test]
    async fn test_missing_named_feature_fails() {
        let model = iris_classifier();
        let frame = FeatureFrame::from_json(&json!([{"sepal_length": 5.1}])).expect("frame");
        let err = model.predict(&frame).await.expect_err("must fail");
        assert!(matches!(err, ModelError::MissingFeature { row: 0, .. }));
    }

    #[tokio::test]
    async fn test_named_rows_need_feature_names() {
        let model = LinearModel::Regressor {
            features: None,
            coefficients: vec![1.0],
            intercept: 0.0,
        };
        let frame = FeatureFrame::from_json(&json!([{"x": 1.0}])).expect("frame");
        let err = model.predict(&frame).await.expect_err("must fail");
        assert!(matches!(err, ModelError::UnnamedFeatures { row: 0 }));
    }

    #[test]
    fn test_mismatched_class_dimensions_rejected() {
        let raw = json!({
            "kind": "classifier",
            "classes": [0, 1],
            "coefficients": [[1.0, 2.0]],
            "intercepts": [0.0, 0.0]
        });
        let err = LinearModel::from_slice(raw.to_string().as_bytes()).expect_err("must fail");
        assert!(matches!(err, ModelError::InvalidArtifact(_)));
    }

    #[test]
    fn test_ragged_coefficients_rejected() {
        let raw = json!({
            "kind": "classifier",
            "classes": [0, 1],
            "coefficients": [[1.0, 2.0], [1.0]],
            "intercepts": [0.0, 0.0]
        });
        let err = LinearModel::from_slice(raw.to_string().as_bytes()).expect_err("must fail");
        assert!(err.to_string().contains("coefficient row 1"));
    }

    #[test]
    fn test_feature_name_count_must_match_width() {
        let raw = json!({
            "kind": "regressor",
            "features": ["a"],
            "coefficients": [1.0, 2.0]
        });
        assert!(LinearModel::from_slice(raw.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let raw = json!({"kind": "forest", "trees": []});
        assert!(LinearModel::from_slice(raw.to_string().as_bytes()).is_err());
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = LinearModel::from_slice(b"not json").expect_err("must fail");
        assert!(matches!(err, ModelError::InvalidArtifact(_)));
    }
}
