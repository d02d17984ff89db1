// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Monte-Carlo shape function sampling
//!
//! Each shape function draws a random tuple of mesh points and reduces it to a
//! single scalar:
//!
//! - **A3**: angle at the first of 3 distinct vertices, in degrees
//! - **D1**: distance from the barycenter to a random surface point (or vertex)
//! - **D2**: distance between 2 distinct vertices
//! - **D3**: square root of the area of the triangle spanned by 3 distinct vertices
//! - **D4**: cube root of the volume of the tetrahedron spanned by 4 distinct vertices
//!
//! Draws that produce no defined value (a zero-length edge for A3, or any
//! non-finite result) are discarded and redrawn within a bounded budget.

use std::fmt;

use nalgebra::Point3;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{Error, Result};
use crate::mesh::Mesh;

/// Edges shorter than this make an A3 angle undefined
const DEGENERATE_EDGE_EPSILON: f64 = 1e-12;

/// Default number of samples per shape function
pub const DEFAULT_NUM_SAMPLES: usize = 5000;

/// Default bound on total draws, as a multiple of the requested sample count
pub const DEFAULT_MAX_REDRAW_FACTOR: usize = 8;

/// The five elementary shape functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ShapeFunction {
    A3,
    D1,
    D2,
    D3,
    D4,
}

impl ShapeFunction {
    /// All shape functions in canonical feature-vector order
    pub const ALL: [ShapeFunction; 5] = [
        ShapeFunction::A3,
        ShapeFunction::D1,
        ShapeFunction::D2,
        ShapeFunction::D3,
        ShapeFunction::D4,
    ];

    /// Column name used in reference tables
    pub fn name(self) -> &'static str {
        match self {
            ShapeFunction::A3 => "A3",
            ShapeFunction::D1 => "D1",
            ShapeFunction::D2 => "D2",
            ShapeFunction::D3 => "D3",
            ShapeFunction::D4 => "D4",
        }
    }

    /// Parse a column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Position in [`ShapeFunction::ALL`]
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of distinct vertices one draw needs
    pub fn tuple_size(self) -> usize {
        match self {
            ShapeFunction::A3 => 3,
            ShapeFunction::D1 => 1,
            ShapeFunction::D2 => 2,
            ShapeFunction::D3 => 3,
            ShapeFunction::D4 => 4,
        }
    }

    /// Fixed histogram range, if the statistic has a natural one
    pub fn fixed_range(self) -> Option<(f64, f64)> {
        match self {
            ShapeFunction::A3 => Some((0.0, 180.0)),
            _ => None,
        }
    }
}

impl fmt::Display for ShapeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How D1 picks the point whose distance to the barycenter is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PointSampling {
    /// A uniformly random vertex
    Vertex,
    /// An area-weighted uniformly random point on the surface
    #[default]
    Surface,
}

/// Sampling parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Samples to draw per shape function
    pub num_samples: usize,
    /// Point selection policy for D1
    pub d1_sampling: PointSampling,
    /// Total draw budget as a multiple of `num_samples`
    pub max_redraw_factor: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            num_samples: DEFAULT_NUM_SAMPLES,
            d1_sampling: PointSampling::default(),
            max_redraw_factor: DEFAULT_MAX_REDRAW_FACTOR,
        }
    }
}

/// Samples collected for one shape function
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    pub function: ShapeFunction,
    pub values: Vec<f64>,
    /// Draws rejected as degenerate
    pub discarded: usize,
}

impl SampleSet {
    /// Observed (min, max) of the values, `None` when empty
    pub fn range(&self) -> Option<(f64, f64)> {
        sample_range(&self.values)
    }
}

/// Observed (min, max) of a sample slice, `None` when empty
pub fn sample_range(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Draws shape function samples from a single mesh.
///
/// The barycenter and the triangle area distribution are computed once on
/// construction and reused for every draw.
pub struct ShapeSampler<'a> {
    mesh: &'a Mesh,
    barycenter: Point3<f64>,
    surface: Option<WeightedIndex<f64>>,
    config: SamplerConfig,
}

impl<'a> ShapeSampler<'a> {
    pub fn new(mesh: &'a Mesh, config: SamplerConfig) -> Self {
        let surface = if config.d1_sampling == PointSampling::Surface {
            let areas: Vec<f64> = mesh.triangles().map(|[a, b, c]| triangle_area(&a, &b, &c)).collect();
            // Fails when there are no faces or every face is degenerate
            WeightedIndex::new(&areas).ok()
        } else {
            None
        };

        Self {
            mesh,
            barycenter: mesh.barycenter(),
            surface,
            config,
        }
    }

    /// Check that the mesh can support `function` at all
    pub fn check(&self, function: ShapeFunction) -> Result<()> {
        let available = self.mesh.vertex_count();
        let required = function.tuple_size();
        if available < required {
            return Err(Error::too_few_vertices(function, required, available));
        }
        if function == ShapeFunction::D1
            && self.config.d1_sampling == PointSampling::Surface
            && self.surface.is_none()
        {
            return Err(Error::InsufficientGeometry {
                function,
                required: 1,
                available: 0,
                unit: "faces with positive area",
            });
        }
        Ok(())
    }

    /// Draw `num_samples` values of `function`
    pub fn sample<R: Rng + ?Sized>(&self, function: ShapeFunction, rng: &mut R) -> Result<SampleSet> {
        self.check(function)?;

        let wanted = self.config.num_samples;
        let budget = wanted.saturating_mul(self.config.max_redraw_factor.max(1));
        let mut values = Vec::with_capacity(wanted);
        let mut discarded = 0usize;
        let mut draws = 0usize;

        while values.len() < wanted && draws < budget {
            draws += 1;
            match self.draw(function, rng) {
                Some(v) if v.is_finite() => values.push(v),
                _ => discarded += 1,
            }
        }

        Ok(SampleSet {
            function,
            values,
            discarded,
        })
    }

    /// Draw every shape function in canonical order
    pub fn sample_all<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<SampleSet>> {
        ShapeFunction::ALL
            .iter()
            .map(|&f| self.sample(f, rng))
            .collect()
    }

    /// One draw; `None` when the drawn tuple is degenerate
    fn draw<R: Rng + ?Sized>(&self, function: ShapeFunction, rng: &mut R) -> Option<f64> {
        match function {
            ShapeFunction::A3 => {
                let [a, b, c] = self.distinct_vertices::<R, 3>(rng);
                angle_degrees(&a, &b, &c)
            }
            ShapeFunction::D1 => {
                let point = match &self.surface {
                    Some(areas) => self.surface_point(areas, rng),
                    None => self.mesh.vertex(rng.gen_range(0..self.mesh.vertex_count())),
                };
                Some((point - self.barycenter).norm())
            }
            ShapeFunction::D2 => {
                let [a, b] = self.distinct_vertices::<R, 2>(rng);
                Some((b - a).norm())
            }
            ShapeFunction::D3 => {
                let [a, b, c] = self.distinct_vertices::<R, 3>(rng);
                Some(heron_area(&a, &b, &c).sqrt())
            }
            ShapeFunction::D4 => {
                let [a, b, c, d] = self.distinct_vertices::<R, 4>(rng);
                Some(tetrahedron_volume(&a, &b, &c, &d).cbrt())
            }
        }
    }

    /// `K` vertices chosen uniformly without replacement
    fn distinct_vertices<R: Rng + ?Sized, const K: usize>(&self, rng: &mut R) -> [Point3<f64>; K] {
        let picked = rand::seq::index::sample(rng, self.mesh.vertex_count(), K);
        let mut out = [Point3::origin(); K];
        for (slot, index) in out.iter_mut().zip(picked.iter()) {
            *slot = self.mesh.vertex(index);
        }
        out
    }

    /// Uniform point on an area-weighted random triangle
    fn surface_point<R: Rng + ?Sized>(&self, areas: &WeightedIndex<f64>, rng: &mut R) -> Point3<f64> {
        let face = areas.sample(rng);
        let t = &self.mesh.indices[face * 3..face * 3 + 3];
        let v0 = self.mesh.vertex(t[0] as usize);
        let v1 = self.mesh.vertex(t[1] as usize);
        let v2 = self.mesh.vertex(t[2] as usize);

        let r1: f64 = rng.gen();
        let r2: f64 = rng.gen();
        let (r1, r2) = if r1 + r2 > 1.0 {
            (1.0 - r1, 1.0 - r2)
        } else {
            (r1, r2)
        };
        Point3::from(v0.coords * (1.0 - r1 - r2) + v1.coords * r1 + v2.coords * r2)
    }
}

/// Angle at `a` between edges `a→b` and `a→c`, in degrees.
///
/// Returns `None` when either edge has zero length.
pub fn angle_degrees(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<f64> {
    let ab = b - a;
    let ac = c - a;
    let (len_ab, len_ac) = (ab.norm(), ac.norm());
    if len_ab < DEGENERATE_EDGE_EPSILON || len_ac < DEGENERATE_EDGE_EPSILON {
        return None;
    }
    let cos = (ab / len_ab).dot(&(ac / len_ac)).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

/// Triangle area by Heron's formula, radicand clamped at zero
pub fn heron_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let la = (b - a).norm();
    let lb = (c - a).norm();
    let lc = (c - b).norm();
    let s = (la + lb + lc) / 2.0;
    (s * (s - la) * (s - lb) * (s - lc)).max(0.0).sqrt()
}

/// Triangle area from the cross product
#[inline]
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() * 0.5
}

/// Absolute tetrahedron volume from the scalar triple product
#[inline]
pub fn tetrahedron_volume(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    (a - d).dot(&(b - d).cross(&(c - d))).abs() / 6.0
}
