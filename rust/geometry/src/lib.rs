// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ShapeMatch Geometry
//!
//! Triangle mesh measurements and Monte-Carlo shape function sampling used to
//! build shape descriptors. Uses nalgebra for the linear algebra and parry
//! for convex hulls.

pub mod error;
pub mod mesh;
pub mod properties;
pub mod sampler;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Point3, Vector3};

pub use error::{Error, Result};
pub use mesh::{icosphere, unit_cube, Mesh};
pub use properties::{
    convex_hull_volume, oriented_bounding_box, principal_variances, surface_area, volume,
    OrientedBoundingBox,
};
pub use sampler::{
    sample_range, PointSampling, SampleSet, SamplerConfig, ShapeFunction, ShapeSampler,
    DEFAULT_MAX_REDRAW_FACTOR, DEFAULT_NUM_SAMPLES,
};
