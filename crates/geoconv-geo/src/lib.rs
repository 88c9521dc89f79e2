//! Geometry conditioning and reprojection for geoconv
//!
//! [`condition`](condition::condition) runs the optional repair, buffer-fix
//! and simplification stages over a feature collection;
//! [`reproject`](reproject::reproject) moves a collection into a target CRS.
//! Both report what they did as plain-text notes rather than failing the
//! conversion.

pub mod condition;
pub mod reproject;
pub mod validation;

pub use condition::{condition, ConditionOptions};
pub use reproject::reproject;
