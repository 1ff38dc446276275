//! Input record - one row of model input in schema order

use serde::Serialize;

/// A single tabular row ready for the model.
///
/// The row is stamped with the layout hash of the schema that assembled it,
/// so the prediction path can refuse rows built against another layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputRecord {
    values: Vec<f64>,
    layout_hash: u32,
}

impl InputRecord {
    pub fn new(values: Vec<f64>, layout_hash: u32) -> Self {
        Self { values, layout_hash }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
