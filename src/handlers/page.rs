//! HTML form page handlers

use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::Html, Form};

use crate::models::{FeatureSchema, InputValue};
use crate::render::{render_force_plot, render_page, ForcePlotOptions, Outcome, PageView};
use crate::{AppError, AppState};

/// Form page with every control at its default
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let schema = state.service.schema();
    let defaults = schema.default_record();

    Html(render_page(&PageView {
        schema,
        values: defaults.values(),
        outcome: None,
    }))
}

/// Form submit: prediction, force plot and reference image
pub async fn predict(
    State(state): State<AppState>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Html<String>) {
    let schema = state.service.schema();
    let submitted: HashMap<String, InputValue> = form
        .into_iter()
        .map(|(name, raw)| (name, InputValue::Text(raw)))
        .collect();

    let result = schema
        .resolve(&submitted)
        .map_err(AppError::from)
        .and_then(|(record, clamped)| {
            let explanation = state.service.explain(&record)?;
            Ok((record, explanation, clamped))
        });

    match result {
        Ok((record, explanation, clamped)) => {
            let plot_svg = render_force_plot(
                explanation.expected_value,
                explanation.prediction,
                &explanation.contributions,
                &ForcePlotOptions::default(),
            );
            let image = state.images.load().await;

            let html = render_page(&PageView {
                schema,
                values: record.values(),
                outcome: Some(Outcome::Success {
                    explanation,
                    plot_svg,
                    image,
                    clamped,
                }),
            });
            (StatusCode::OK, Html(html))
        }
        Err(err) => {
            let message = err.message().to_string();
            tracing::debug!("Form prediction rejected: {}", message);

            let values = reseed(schema, &submitted);
            let html = render_page(&PageView {
                schema,
                values: &values,
                outcome: Some(Outcome::Failure { message }),
            });
            (err.status(), Html(html))
        }
    }
}

/// Control values to show after a rejected submit: what resolved, else the default
fn reseed(schema: &FeatureSchema, submitted: &HashMap<String, InputValue>) -> Vec<f64> {
    schema
        .features()
        .iter()
        .map(|spec| {
            submitted
                .get(&spec.name)
                .and_then(|raw| spec.resolve(raw).ok())
                .map(|resolved| resolved.value)
                .unwrap_or_else(|| spec.default_value())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reseed_keeps_valid_values() {
        let schema = FeatureSchema::builtin();
        let submitted: HashMap<String, InputValue> = [
            ("age".to_string(), InputValue::Text("30".into())),
            ("weight".to_string(), InputValue::Text("heavy".into())),
        ]
        .into_iter()
        .collect();

        assert_eq!(reseed(&schema, &submitted), vec![30.0, 52.0]);
    }
}
