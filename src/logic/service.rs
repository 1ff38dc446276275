//! Predict-and-explain service
//!
//! Holds the schema and the bound explainer for the lifetime of the
//! process; handlers receive it through the application state.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::logic::model::{ExplainError, Forest, TreeExplainer};
use crate::models::{Explanation, FeatureContribution, FeatureSchema, InputRecord, SchemaError};

#[derive(Debug, Clone)]
pub struct PredictionService {
    schema: Arc<FeatureSchema>,
    explainer: Arc<TreeExplainer>,
    layout_hash: u32,
}

impl PredictionService {
    /// Bind a schema to a forest, refusing a forest trained on other columns
    pub fn bind(schema: FeatureSchema, forest: Forest) -> Result<Self, SchemaError> {
        schema.check_model_layout(forest.layout_version(), forest.feature_names())?;

        let layout_hash = schema.layout_hash();
        tracing::info!(
            "Schema v{} bound to model (layout {:08x}, {} features)",
            schema.version(),
            layout_hash,
            schema.len()
        );

        Ok(Self {
            schema: Arc::new(schema),
            explainer: Arc::new(TreeExplainer::new(Arc::new(forest))),
            layout_hash,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn explainer(&self) -> &TreeExplainer {
        &self.explainer
    }

    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    /// Predict one record and attribute the prediction to its features
    pub fn explain(&self, record: &InputRecord) -> Result<Explanation, ExplainError> {
        if record.len() != self.explainer.n_features() {
            return Err(ExplainError::ShapeMismatch {
                expected: self.explainer.n_features(),
                actual: record.len(),
            });
        }
        if record.layout_hash() != self.layout_hash {
            return Err(ExplainError::LayoutMismatch {
                expected: self.layout_hash,
                actual: record.layout_hash(),
            });
        }

        let prediction = self.explainer.predict(record.values())?;
        let attribution = self.explainer.shap_values(record.values())?;

        let contributions = self
            .schema
            .features()
            .iter()
            .zip(record.values())
            .zip(&attribution.contributions)
            .map(|((spec, value), contribution)| FeatureContribution {
                feature: spec.name.clone(),
                value: *value,
                contribution: *contribution,
            })
            .collect();

        let explanation = Explanation {
            id: Uuid::new_v4(),
            prediction,
            expected_value: attribution.expected_value,
            contributions,
            layout_hash: self.layout_hash,
            created_at: Utc::now(),
        };

        tracing::debug!(
            "Prediction {}: {:.4} (baseline {:.4})",
            explanation.id,
            explanation.prediction,
            explanation.expected_value
        );

        Ok(explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::fixtures;
    use crate::models::{FeatureSpec, InputValue};
    use std::collections::HashMap;

    const TOLERANCE: f64 = 1e-9;

    fn service() -> PredictionService {
        PredictionService::bind(FeatureSchema::builtin(), fixtures::demo_forest()).unwrap()
    }

    #[test]
    fn test_end_to_end_age_weight() {
        let service = service();
        let submitted: HashMap<String, InputValue> = [
            ("age".to_string(), InputValue::Number(30.0)),
            ("weight".to_string(), InputValue::Number(70.0)),
        ]
        .into_iter()
        .collect();

        let (record, clamped) = service.schema().resolve(&submitted).unwrap();
        assert!(clamped.is_empty());

        let first = service.explain(&record).unwrap();
        let second = service.explain(&record).unwrap();

        assert_eq!(first.prediction, 52.0);
        assert_eq!(first.prediction, second.prediction);
        assert_eq!(first.contributions.len(), 2);
        assert_eq!(first.contributions[0].feature, "age");
        assert_eq!(first.contributions[1].feature, "weight");
        assert_eq!(first.contributions[0].value, 30.0);

        let sum: f64 = first.contributions.iter().map(|c| c.contribution).sum();
        assert!((first.expected_value + sum - first.prediction).abs() < TOLERANCE);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_default_record() {
        let service = service();
        let explanation = service.explain(&service.schema().default_record()).unwrap();
        let expected = (42.0 + 44.0 + 47.0) / 3.0;
        assert!((explanation.prediction - expected).abs() < TOLERANCE);
    }

    #[test]
    fn test_wrong_column_count() {
        let service = service();
        let record = InputRecord::new(vec![30.0], service.layout_hash());
        let err = service.explain(&record).unwrap_err();
        assert_eq!(err, ExplainError::ShapeMismatch { expected: 2, actual: 1 });
        assert!(err.to_string().contains("1 columns"));

        let record = InputRecord::new(vec![30.0, 70.0, 1.0], service.layout_hash());
        assert!(matches!(
            service.explain(&record),
            Err(ExplainError::ShapeMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_foreign_layout_rejected() {
        let service = service();
        let record = InputRecord::new(vec![30.0, 70.0], service.layout_hash() ^ 1);
        assert!(matches!(
            service.explain(&record),
            Err(ExplainError::LayoutMismatch { .. })
        ));
    }

    #[test]
    fn test_bind_rejects_mismatched_schema() {
        let swapped = FeatureSchema::new(
            1,
            vec![
                FeatureSpec::numeric("weight", "Weight", 52.0, 91.0, 52.0),
                FeatureSpec::numeric("age", "Age", 18.0, 42.0, 18.0),
            ],
        )
        .unwrap();
        let result = PredictionService::bind(swapped, fixtures::demo_forest());
        assert!(matches!(result, Err(SchemaError::ColumnMismatch { index: 0, .. })));

        let partial = FeatureSchema::new(1, vec![FeatureSpec::numeric("age", "Age", 18.0, 42.0, 18.0)]).unwrap();
        let result = PredictionService::bind(partial, fixtures::demo_forest());
        assert!(matches!(result, Err(SchemaError::FeatureCountMismatch { .. })));
    }
}
