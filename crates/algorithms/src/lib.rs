//! # settlemap algorithms
//!
//! The settlement-detection pipeline stages, in control-flow order:
//!
//! - **composite**: median mosaic of overlapping tiles
//! - **imagery**: derived spectral bands (normalized difference,
//!   cross-source index from an auxiliary scene catalog)
//! - **texture**: GLCM dissimilarity band
//! - **separability**: per-region band statistics (diagnostic side path)
//! - **classification**: training-sample extraction and a pluggable
//!   supervised pixel classifier (seeded random forest provided)
//! - **postprocess**: smoothing, thresholding and minimum-mapping-unit
//!   filtering down to the final mask
//!
//! Each stage consumes the previous stage's output and returns a new
//! artifact; independent runs share nothing mutable.

pub mod classification;
pub mod composite;
pub mod imagery;
mod maybe_rayon;
pub mod postprocess;
pub mod separability;
pub mod texture;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        build_sample_set, classify, PixelClassifier, RandomForest, RandomForestParams, SampleSet,
    };
    pub use crate::composite::median_composite;
    pub use crate::imagery::{
        add_cross_source_index, add_normalized_difference, add_texture_dissimilarity,
        extract_features, CrossSourceIndex, FeatureParams, Scene, SceneCatalog, SceneQuery,
    };
    pub use crate::postprocess::{clean, CleanParams, Connectivity};
    pub use crate::separability::{summarize, SeparabilityReport};
    pub use crate::texture::{glcm_dissimilarity, GlcmParams};
    pub use settlemap_core::prelude::*;
}
