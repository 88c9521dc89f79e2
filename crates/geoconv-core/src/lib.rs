//! geoconv core - data model, format readers, and format writers
//!
//! This crate contains everything needed to get a feature collection in and
//! out of the supported file formats. Geometry conditioning and reprojection
//! live in `geoconv-geo`; batch orchestration lives in `geoconv-pipeline`.

pub mod error;
pub mod export;
pub mod formats;
pub mod model;
pub mod registry;

pub use error::{ConvertError, Result};
pub use model::{Feature, FeatureCollection};
