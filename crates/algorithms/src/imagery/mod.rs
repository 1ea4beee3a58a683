//! Imagery feature engineering
//!
//! - Normalized difference: generic two-band contrast-ratio index
//! - Feature extraction: derived spectral/texture bands on a composite,
//!   including the cross-source index from an auxiliary scene catalog

mod features;
mod indices;

pub use features::{
    add_cross_source_index, add_normalized_difference, add_texture_dissimilarity,
    extract_features, CrossSourceIndex, FeatureParams, Scene, SceneCatalog, SceneQuery,
};
pub use indices::normalized_difference;
