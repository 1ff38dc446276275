//! Domain logic: model, predict-and-explain, reference image

pub mod model;
pub mod reference_image;
pub mod service;

pub use reference_image::{ImageFetcher, ReferenceImage};
pub use service::PredictionService;
