//! Single-page layout: sidebar form, result area

use std::fmt::Write as _;

use super::{escape_html, format_number};
use crate::constants::{PAGE_TITLE, TARGET_NAME};
use crate::logic::ReferenceImage;
use crate::models::{Explanation, FeatureKind, FeatureSchema, FeatureSpec};

/// What the main area shows after a predict action
#[derive(Debug, Clone)]
pub enum Outcome {
    Success {
        explanation: Explanation,
        plot_svg: String,
        image: ReferenceImage,
        clamped: Vec<String>,
    },
    Failure {
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct PageView<'a> {
    pub schema: &'a FeatureSchema,
    /// Control values in schema order; defaults when shorter than the schema
    pub values: &'a [f64],
    pub outcome: Option<Outcome>,
}

const STYLE: &str = r#"
  body { margin: 0; font-family: "Source Sans Pro", "SimHei", sans-serif; color: #262730; }
  .layout { display: flex; min-height: 100vh; }
  aside { width: 300px; background: #f0f2f6; padding: 24px; box-sizing: border-box; }
  aside label { display: block; margin: 14px 0 4px; font-size: 14px; }
  aside input, aside select { width: 100%; padding: 6px; box-sizing: border-box; }
  main { flex: 1; padding: 32px 48px; }
  button { margin-top: 20px; padding: 8px 20px; border-radius: 6px; border: 1px solid #ccc; background: white; cursor: pointer; }
  .error { background: #ffebee; color: #b71c1c; padding: 12px 16px; border-radius: 6px; }
  .note { color: #6d6d6d; font-size: 13px; }
  .prediction { font-size: 20px; }
  figure { margin: 0; }
  figure img { max-width: 100%; }
  table.contributions { border-collapse: collapse; margin: 12px 0; font-size: 14px; }
  table.contributions td, table.contributions th { padding: 4px 12px; border-bottom: 1px solid #e6e6e6; text-align: left; }
"#;

fn write_control(html: &mut String, index: usize, spec: &FeatureSpec, current: f64) {
    let name = escape_html(&spec.name);
    let label = escape_html(spec.display_label());

    match &spec.kind {
        FeatureKind::Numeric { min, max, step, .. } => {
            let _ = write!(
                html,
                r#"<label for="f{index}">{label} ({} - {})</label>
<input type="number" id="f{index}" name="{name}" min="{}" max="{}" step="{}" value="{}" required>
"#,
                format_number(*min),
                format_number(*max),
                format_number(*min),
                format_number(*max),
                step.map(format_number).unwrap_or_else(|| "any".to_string()),
                format_number(current),
            );
        }
        FeatureKind::Categorical { options, .. } => {
            let _ = writeln!(
                html,
                r#"<label for="f{index}">{label} (Select a value)</label>
<select id="f{index}" name="{name}">"#
            );
            for option in options {
                let selected = if option.value == current { " selected" } else { "" };
                let _ = writeln!(
                    html,
                    r#"  <option value="{0}"{selected}>{0}</option>"#,
                    escape_html(&option.label)
                );
            }
            html.push_str("</select>\n");
        }
    }
}

fn write_outcome(html: &mut String, outcome: &Outcome) {
    match outcome {
        Outcome::Failure { message } => {
            let _ = writeln!(html, r#"<div class="error">{}</div>"#, escape_html(message));
        }
        Outcome::Success {
            explanation,
            plot_svg,
            image,
            clamped,
        } => {
            let _ = writeln!(
                html,
                r#"<p class="prediction">Predicted {TARGET_NAME}: <strong>{:.2}</strong></p>"#,
                explanation.prediction
            );
            if !clamped.is_empty() {
                let _ = writeln!(
                    html,
                    r#"<p class="note">Adjusted into the allowed range: {}</p>"#,
                    escape_html(&clamped.join(", "))
                );
            }

            html.push_str("<h3>SHAP force plot</h3>\n");
            html.push_str(plot_svg);
            html.push('\n');
            let _ = writeln!(
                html,
                r#"<p class="note">Base value {:.2}; red features raise the score, blue features lower it.</p>"#,
                explanation.expected_value
            );

            html.push_str("<table class=\"contributions\">\n<tr><th>Feature</th><th>Value</th><th>SHAP value</th></tr>\n");
            for c in explanation.by_magnitude() {
                let _ = writeln!(
                    html,
                    "<tr><td>{}</td><td>{}</td><td>{:+.4}</td></tr>",
                    escape_html(&c.feature),
                    format_number(c.value),
                    c.contribution
                );
            }
            html.push_str("</table>\n");

            html.push_str("<h3>Beeswarm plot</h3>\n");
            match image {
                ReferenceImage::Loaded { data_uri, .. } => {
                    let _ = writeln!(
                        html,
                        r#"<figure><img src="{}" alt="Beeswarm plot"><figcaption class="note">Beeswarm plot</figcaption></figure>"#,
                        data_uri
                    );
                }
                ReferenceImage::Unavailable { message } => {
                    let _ = writeln!(html, r#"<div class="error">{}</div>"#, escape_html(message));
                }
            }
        }
    }
}

pub fn render_page(view: &PageView<'_>) -> String {
    let mut html = String::with_capacity(8 * 1024);
    let title = escape_html(PAGE_TITLE);

    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="icon" href="data:image/svg+xml,<svg xmlns=%22http://www.w3.org/2000/svg%22 viewBox=%220 0 100 100%22><text y=%22.9em%22 font-size=%2290%22>📊</text></svg>">
<style>{STYLE}</style>
</head>
<body>
<div class="layout">
<aside>
<h2>Feature input</h2>
<p>Please enter feature values:</p>
<form method="post" action="/predict">
"#
    );

    for (index, spec) in view.schema.features().iter().enumerate() {
        let current = view
            .values
            .get(index)
            .copied()
            .unwrap_or_else(|| spec.default_value());
        write_control(&mut html, index, spec, current);
    }

    let _ = write!(
        html,
        r#"<button type="submit">Predict</button>
</form>
</aside>
<main>
<h1>📊 {title}</h1>
<p>Enter the value of every variable to predict the {TARGET_NAME} of a single patient. The SHAP force plot shows which factors raise the risk and which protect against it, to help clinical staff understand the individual risk profile.</p>
"#
    );

    if let Some(outcome) = &view.outcome {
        write_outcome(&mut html, outcome);
    }

    html.push_str("</main>\n</div>\n</body>\n</html>\n");
    html
}
