//! Texture metrics
//!
//! GLCM dissimilarity is the one texture feature the settlement pipeline
//! uses; settlement fabric is visibly rougher than crops or water.

mod glcm;

pub use glcm::{glcm_dissimilarity, GlcmParams};
