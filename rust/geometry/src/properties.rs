// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Global mesh measurements
//!
//! Area, enclosed volume, oriented bounding box, convex hull volume and the
//! principal variances of the vertex cloud. These are the raw ingredients of
//! the scalar shape descriptors; ratios and their undefined cases are formed
//! by the descriptor layer.

use nalgebra::{Matrix3, Point3, Vector3};
use parry3d_f64::transformation::try_convex_hull;

use crate::mesh::Mesh;
use crate::sampler::triangle_area;

/// Oriented bounding box of a vertex cloud
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBoundingBox {
    pub center: Point3<f64>,
    /// Box axes as matrix columns
    pub axes: Matrix3<f64>,
    /// Full edge lengths along each axis
    pub extents: Vector3<f64>,
    pub volume: f64,
}

impl OrientedBoundingBox {
    /// Longest box edge
    pub fn max_extent(&self) -> f64 {
        self.extents.max()
    }
}

/// Total surface area
pub fn surface_area(mesh: &Mesh) -> f64 {
    mesh.triangles()
        .map(|[a, b, c]| triangle_area(&a, &b, &c))
        .sum()
}

/// Signed volume from the divergence theorem: sum of origin-apex tetrahedra.
///
/// Positive for outward-facing triangles. Works on open meshes as an estimate.
pub fn signed_volume(mesh: &Mesh) -> f64 {
    mesh.triangles()
        .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)))
        .sum::<f64>()
        / 6.0
}

/// Enclosed volume, independent of winding direction
pub fn volume(mesh: &Mesh) -> f64 {
    signed_volume(mesh).abs()
}

/// Sample covariance matrix of the vertex positions (n - 1 normalization)
pub fn covariance(mesh: &Mesh) -> Matrix3<f64> {
    let n = mesh.vertex_count();
    if n < 2 {
        return Matrix3::zeros();
    }
    let centroid = mesh.barycenter();
    let mut cov = Matrix3::zeros();
    for v in mesh.vertices() {
        let d = v - centroid;
        cov += d * d.transpose();
    }
    cov / (n - 1) as f64
}

/// Eigenvalues of the vertex covariance, ascending
pub fn principal_variances(mesh: &Mesh) -> Vector3<f64> {
    let eigen = covariance(mesh).symmetric_eigen();
    let mut values = [eigen.eigenvalues.x, eigen.eigenvalues.y, eigen.eigenvalues.z];
    values.sort_by(|a, b| a.total_cmp(b));
    Vector3::new(values[0], values[1], values[2])
}

/// Oriented bounding box.
///
/// Fits a box along the principal axes of the vertex cloud and keeps it only
/// when it is tighter than the axis-aligned box.
pub fn oriented_bounding_box(mesh: &Mesh) -> OrientedBoundingBox {
    if mesh.is_empty() {
        return OrientedBoundingBox {
            center: Point3::origin(),
            axes: Matrix3::identity(),
            extents: Vector3::zeros(),
            volume: 0.0,
        };
    }

    let aligned = fit_box(mesh, &Matrix3::identity(), &Point3::origin());

    let centroid = mesh.barycenter();
    let axes = covariance(mesh).symmetric_eigen().eigenvectors;
    let principal = fit_box(mesh, &axes, &centroid);

    if principal.volume.is_finite() && principal.volume < aligned.volume {
        principal
    } else {
        aligned
    }
}

/// Tightest box along the given orthonormal axes
fn fit_box(mesh: &Mesh, axes: &Matrix3<f64>, origin: &Point3<f64>) -> OrientedBoundingBox {
    let to_local = axes.transpose();
    let mut local_min = Vector3::repeat(f64::INFINITY);
    let mut local_max = Vector3::repeat(f64::NEG_INFINITY);

    for v in mesh.vertices() {
        let local = to_local * (v - origin);
        local_min = local_min.inf(&local);
        local_max = local_max.sup(&local);
    }

    let extents = local_max - local_min;
    let local_center = (local_min + local_max) / 2.0;

    OrientedBoundingBox {
        center: origin + axes * local_center,
        axes: *axes,
        extents,
        volume: extents.x * extents.y * extents.z,
    }
}

/// Volume of the convex hull of the vertices.
///
/// `None` when the hull cannot be built, e.g. for coplanar vertex sets.
pub fn convex_hull_volume(mesh: &Mesh) -> Option<f64> {
    if mesh.vertex_count() < 4 {
        return None;
    }
    let points: Vec<Point3<f64>> = mesh.vertices().collect();
    let (hull_points, hull_faces) = try_convex_hull(&points).ok()?;
    if hull_faces.is_empty() {
        return None;
    }

    // Signed tetra sum about a hull point keeps the value translation-invariant
    let apex = hull_points[0];
    let volume = hull_faces
        .iter()
        .map(|f| {
            let a = hull_points[f[0] as usize] - apex;
            let b = hull_points[f[1] as usize] - apex;
            let c = hull_points[f[2] as usize] - apex;
            a.dot(&b.cross(&c))
        })
        .sum::<f64>()
        .abs()
        / 6.0;

    Some(volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{icosphere, unit_cube};
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Translation3};

    fn transformed(mesh: &Mesh, rotation: Rotation3<f64>, offset: Vector3<f64>) -> Mesh {
        let t = Translation3::from(offset);
        let mut out = Mesh::with_capacity(mesh.vertex_count(), mesh.triangle_count());
        for v in mesh.vertices() {
            out.add_vertex(t * (rotation * v));
        }
        out.indices = mesh.indices.clone();
        out
    }

    #[test]
    fn test_cube_area_and_volume() {
        let cube = unit_cube();
        assert_relative_eq!(surface_area(&cube), 6.0, epsilon = 1e-12);
        assert_relative_eq!(signed_volume(&cube), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_volume_ignores_winding() {
        let mut cube = unit_cube();
        for tri in cube.indices.chunks_exact_mut(3) {
            tri.swap(1, 2);
        }
        assert!(signed_volume(&cube) < 0.0);
        assert_relative_eq!(volume(&cube), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_volume_is_translation_invariant() {
        let cube = transformed(&unit_cube(), Rotation3::identity(), Vector3::new(5.0, -3.0, 2.0));
        assert_relative_eq!(volume(&cube), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cube_obb_is_the_cube() {
        let obb = oriented_bounding_box(&unit_cube());
        assert_relative_eq!(obb.volume, 1.0, epsilon = 1e-9);
        assert_relative_eq!(obb.max_extent(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_obb_follows_rotated_box() {
        // A 4 x 2 x 1 box rotated off-axis; distinct extents give distinct principal axes
        let mut slab = unit_cube();
        for chunk in slab.positions.chunks_exact_mut(3) {
            chunk[0] *= 4.0;
            chunk[1] *= 2.0;
        }
        let rotation = Rotation3::from_euler_angles(0.3, 0.5, 0.7);
        let rotated = transformed(&slab, rotation, Vector3::zeros());

        let obb = oriented_bounding_box(&rotated);
        assert_relative_eq!(obb.volume, 8.0, epsilon = 1e-6);
        assert_relative_eq!(obb.max_extent(), 4.0, epsilon = 1e-6);

        let (min, max) = rotated.bounds();
        let aabb = (max - min).product();
        assert!(aabb > obb.volume);
    }

    #[test]
    fn test_cube_hull_volume() {
        assert_relative_eq!(convex_hull_volume(&unit_cube()).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_coplanar_hull_is_undefined() {
        let square = Mesh::from_arrays(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        let hull = convex_hull_volume(&square);
        assert!(hull.map_or(true, |v| v < 1e-12));
    }

    #[test]
    fn test_sphere_variances_are_isotropic() {
        let variances = principal_variances(&icosphere(1.0, 3));
        assert_relative_eq!(variances.x, variances.z, max_relative = 1e-6);
    }

    #[test]
    fn test_flat_cloud_has_zero_variance() {
        let square = Mesh::from_arrays(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2], [0, 2, 3]],
        )
        .unwrap();
        let variances = principal_variances(&square);
        assert!(variances.x.abs() < 1e-12);
        assert_relative_eq!(variances.z, 1.0 / 3.0, epsilon = 1e-12);
    }
}
