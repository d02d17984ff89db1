// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Descriptor Builder
//!
//! Turns one mesh into a [`RawDescriptor`]: seven global scalar properties and
//! the samples of all five shape functions, with raw counts binned over each
//! function's own range. Corpus-wide re-binning happens in
//! [`crate::normalize`].

use rand::Rng;
use shapematch_geometry::{
    convex_hull_volume, oriented_bounding_box, principal_variances, surface_area, volume,
    Error as GeometryError, Mesh, ShapeFunction, ShapeSampler,
};

use crate::config::DescriptorConfig;
use crate::error::Result;
use crate::features::{RawDescriptor, ScalarDescriptors, ScalarFeature, ShapeSamples};
use crate::histogram::{bin_counts, HistogramRange};

/// Eigenvalue ratio below which the vertex cloud counts as flat
const FLAT_EIGENVALUE_RATIO: f64 = 1e-12;

/// Builds raw descriptors with a fixed configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DescriptorBuilder {
    config: DescriptorConfig,
}

impl DescriptorBuilder {
    pub fn new(config: DescriptorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DescriptorConfig {
        &self.config
    }

    /// Describe `mesh`.
    ///
    /// Fails with `InsufficientGeometry` before any sampling when the mesh
    /// cannot support every shape function; no partial descriptor is returned.
    pub fn build<R: Rng + ?Sized>(&self, mesh: &Mesh, id: &str, class: &str, rng: &mut R) -> Result<RawDescriptor> {
        mesh.validate()?;
        if mesh.is_empty() {
            return Err(GeometryError::EmptyMesh.into());
        }

        let sampler = ShapeSampler::new(mesh, self.config.sampler());
        for function in ShapeFunction::ALL {
            sampler.check(function)?;
        }

        let scalars = scalar_descriptors(mesh);

        let mut samples = Vec::with_capacity(ShapeFunction::ALL.len());
        for function in ShapeFunction::ALL {
            let set = sampler.sample(function, rng)?;
            if set.discarded > 0 {
                tracing::debug!(
                    id,
                    function = function.name(),
                    discarded = set.discarded,
                    kept = set.values.len(),
                    "Discarded degenerate samples"
                );
            }
            let range = HistogramRange::for_samples(function, &set.values);
            let counts = bin_counts(&set.values, range, self.config.num_bins);
            samples.push(ShapeSamples {
                function,
                values: set.values,
                discarded: set.discarded,
                range,
                counts,
            });
        }

        tracing::debug!(
            id,
            class,
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            undefined_scalars = ScalarFeature::ALL.len() - scalars.defined_count(),
            "Built descriptor"
        );

        Ok(RawDescriptor {
            id: id.to_string(),
            class: class.to_string(),
            scalars,
            d1_sampling: self.config.d1_sampling,
            samples,
        })
    }
}

/// The seven global properties of `mesh`; ratios with a vanishing
/// denominator are left undefined
pub fn scalar_descriptors(mesh: &Mesh) -> ScalarDescriptors {
    let area = surface_area(mesh);
    let vol = volume(mesh);
    let obb = oriented_bounding_box(mesh);
    let hull = convex_hull_volume(mesh);
    let variances = principal_variances(mesh);

    let compactness = (area > 0.0).then(|| 36.0 * std::f64::consts::PI * vol * vol / (area * area * area));
    let rectangularity = (obb.volume > 0.0).then(|| vol / obb.volume);
    let convexity = hull.filter(|&h| h > 0.0).map(|h| vol / h);

    let (smallest, largest) = (variances.x, variances.z);
    let eccentricity = (largest > 0.0 && smallest > FLAT_EIGENVALUE_RATIO * largest).then(|| largest / smallest);

    ScalarDescriptors::new()
        .with(ScalarFeature::SurfaceArea, Some(area))
        .with(ScalarFeature::Volume, Some(vol))
        .with(ScalarFeature::Compactness, compactness)
        .with(ScalarFeature::Rectangularity, rectangularity)
        .with(ScalarFeature::Diameter, Some(obb.max_extent()))
        .with(ScalarFeature::Convexity, convexity)
        .with(ScalarFeature::Eccentricity, eccentricity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shapematch_geometry::unit_cube;

    fn builder(num_samples: usize, num_bins: usize) -> DescriptorBuilder {
        DescriptorBuilder::new(DescriptorConfig {
            num_samples,
            num_bins,
            ..DescriptorConfig::default()
        })
        .unwrap()
    }

    fn flat_square() -> Mesh {
        Mesh::from_arrays(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn test_unit_cube_scalars() {
        let s = scalar_descriptors(&unit_cube());
        assert_relative_eq!(s.get(ScalarFeature::SurfaceArea).unwrap(), 6.0, epsilon = 1e-9);
        assert_relative_eq!(s.get(ScalarFeature::Volume).unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            s.get(ScalarFeature::Compactness).unwrap(),
            std::f64::consts::PI / 6.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(s.get(ScalarFeature::Rectangularity).unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(s.get(ScalarFeature::Diameter).unwrap(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(s.get(ScalarFeature::Convexity).unwrap(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(s.get(ScalarFeature::Eccentricity).unwrap(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_flat_mesh_has_undefined_ratios() {
        let s = scalar_descriptors(&flat_square());
        assert_relative_eq!(s.get(ScalarFeature::SurfaceArea).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(s.get(ScalarFeature::Compactness), Some(0.0));
        assert_eq!(s.get(ScalarFeature::Rectangularity), None);
        assert_eq!(s.get(ScalarFeature::Eccentricity), None);
        assert_eq!(s.get(ScalarFeature::Convexity), None);
        assert!(s.get(ScalarFeature::Diameter).is_some());
    }

    #[test]
    fn test_build_layout() {
        let b = builder(300, 12);
        let raw = b
            .build(&unit_cube(), "cube", "box", &mut StdRng::seed_from_u64(4))
            .unwrap();
        assert_eq!(raw.id, "cube");
        assert_eq!(raw.class, "box");
        raw.check_layout().unwrap();
        for samples in &raw.samples {
            assert_eq!(samples.values.len(), 300);
            assert_eq!(samples.counts.len(), 12);
            // Own-range binning keeps every sample
            assert_eq!(samples.counts.iter().sum::<u32>(), 300);
        }
        assert_eq!(
            raw.samples(ShapeFunction::A3).unwrap().range,
            HistogramRange::new(0.0, 180.0)
        );
    }

    #[test]
    fn test_three_vertices_fail_without_partial_result() {
        let triangle = Mesh::from_arrays(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2]],
        )
        .unwrap();
        let err = builder(50, 10)
            .build(&triangle, "t", "c", &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Geometry(GeometryError::InsufficientGeometry {
                function: ShapeFunction::D4,
                required: 4,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_mesh_fails() {
        let err = builder(10, 10)
            .build(&Mesh::new(), "e", "c", &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, Error::Geometry(GeometryError::EmptyMesh)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DescriptorConfig {
            num_samples: 0,
            ..DescriptorConfig::default()
        };
        assert!(matches!(DescriptorBuilder::new(config), Err(Error::InvalidConfig(_))));
    }
}
