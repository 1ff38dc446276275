//! SHAP force plot as inline SVG
//!
//! Features that push the prediction up are stacked in red to the left of
//! the output value, features that push it down in blue to the right, each
//! side ordered so the largest contribution sits next to the output.

use std::fmt::Write as _;

use super::{escape_html, format_number};
use crate::models::FeatureContribution;

const RED: &str = "#ff0d57";
const BLUE: &str = "#1e88e5";

/// Canvas size of the plot
#[derive(Debug, Clone, Copy)]
pub struct ForcePlotOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for ForcePlotOptions {
    fn default() -> Self {
        Self {
            width: 960,
            height: 170,
        }
    }
}

/// One stacked bar segment in data coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub positive: bool,
}

/// Place every non-zero contribution on the axis.
///
/// Positive segments end at `prediction`, negative ones start there, so the
/// red block spans `[prediction - Σ⁺, prediction]` and the blue block spans
/// `[prediction, prediction + Σ⁻]`.
pub fn layout_segments(prediction: f64, contributions: &[FeatureContribution]) -> Vec<Segment> {
    let mut positive: Vec<_> = contributions.iter().filter(|c| c.contribution > 0.0).collect();
    let mut negative: Vec<_> = contributions.iter().filter(|c| c.contribution < 0.0).collect();
    positive.sort_by(|a, b| b.contribution.total_cmp(&a.contribution));
    negative.sort_by(|a, b| a.contribution.total_cmp(&b.contribution));

    let label = |c: &FeatureContribution| format!("{} = {}", c.feature, format_number(c.value));
    let mut segments = Vec::with_capacity(positive.len() + negative.len());

    let mut cursor = prediction;
    for c in positive {
        segments.push(Segment {
            label: label(c),
            start: cursor - c.contribution,
            end: cursor,
            positive: true,
        });
        cursor -= c.contribution;
    }

    let mut cursor = prediction;
    for c in negative {
        segments.push(Segment {
            label: label(c),
            start: cursor,
            end: cursor - c.contribution,
            positive: false,
        });
        cursor -= c.contribution;
    }

    segments
}

struct Scale {
    lo: f64,
    hi: f64,
    left: f64,
    right: f64,
}

impl Scale {
    fn x(&self, v: f64) -> f64 {
        self.left + (v - self.lo) / (self.hi - self.lo) * (self.right - self.left)
    }
}

fn ticks(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    let step = (hi - lo) / count as f64;
    (0..=count).map(|i| lo + step * i as f64).collect()
}

pub fn render_force_plot(
    expected_value: f64,
    prediction: f64,
    contributions: &[FeatureContribution],
    options: &ForcePlotOptions,
) -> String {
    let segments = layout_segments(prediction, contributions);

    let mut lo = expected_value.min(prediction);
    let mut hi = expected_value.max(prediction);
    for s in &segments {
        lo = lo.min(s.start);
        hi = hi.max(s.end);
    }
    let pad = ((hi - lo) * 0.08).max(1e-6);
    let (lo, hi) = if hi - lo < 1e-9 { (lo - 1.0, hi + 1.0) } else { (lo - pad, hi + pad) };

    let width = options.width as f64;
    let height = options.height as f64;
    let scale = Scale {
        lo,
        hi,
        left: 20.0,
        right: width - 20.0,
    };
    let axis_y = 40.0;
    let bar_y = 70.0;
    let bar_h = 26.0;

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="force-plot" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif" font-size="12">
"#,
        w = options.width,
        h = options.height
    );

    // Axis
    let _ = writeln!(
        svg,
        r##"  <line x1="{:.1}" y1="{axis_y}" x2="{:.1}" y2="{axis_y}" stroke="#999"/>"##,
        scale.left, scale.right
    );
    for t in ticks(lo, hi, 6) {
        let x = scale.x(t);
        let _ = writeln!(
            svg,
            r##"  <line x1="{x:.1}" y1="{}" x2="{x:.1}" y2="{}" stroke="#999"/><text x="{x:.1}" y="{}" text-anchor="middle" fill="#777">{:.2}</text>"##,
            axis_y - 4.0,
            axis_y + 4.0,
            axis_y - 8.0,
            t
        );
    }

    // Segments
    for s in &segments {
        let (x0, x1) = (scale.x(s.start), scale.x(s.end));
        let fill = if s.positive { RED } else { BLUE };
        let _ = writeln!(
            svg,
            r#"  <rect x="{:.1}" y="{bar_y}" width="{:.1}" height="{bar_h}" fill="{fill}" stroke="white" stroke-width="1"><title>{}: {:+.4}</title></rect>"#,
            x0,
            (x1 - x0).max(0.5),
            escape_html(&s.label),
            if s.positive { s.end - s.start } else { s.start - s.end }
        );
        if x1 - x0 > 40.0 {
            let _ = writeln!(
                svg,
                r#"  <text x="{:.1}" y="{}" text-anchor="middle" fill="{fill}">{}</text>"#,
                (x0 + x1) / 2.0,
                bar_y + bar_h + 16.0,
                escape_html(&s.label)
            );
        }
    }

    // Output and base value markers
    let fx = scale.x(prediction);
    let _ = writeln!(
        svg,
        r##"  <line x1="{fx:.1}" y1="{}" x2="{fx:.1}" y2="{}" stroke="#333" stroke-width="2"/>
  <text x="{fx:.1}" y="{}" text-anchor="middle" font-weight="bold" font-size="14">f(x) = {:.2}</text>"##,
        bar_y - 6.0,
        bar_y + bar_h + 4.0,
        bar_y - 10.0,
        prediction
    );
    let bx = scale.x(expected_value);
    let _ = writeln!(
        svg,
        r##"  <line x1="{bx:.1}" y1="{}" x2="{bx:.1}" y2="{}" stroke="#777" stroke-dasharray="4 3"/>
  <text x="{bx:.1}" y="{}" text-anchor="middle" fill="#777">base value = {:.2}</text>"##,
        bar_y + bar_h,
        height - 22.0,
        height - 8.0,
        expected_value
    );

    // Legend
    let _ = writeln!(
        svg,
        r#"  <text x="{:.1}" y="16" fill="{RED}">higher ⇢</text><text x="{:.1}" y="16" text-anchor="end" fill="{BLUE}">⇠ lower</text>"#,
        scale.left,
        scale.right
    );

    svg.push_str("</svg>");
    svg
}
