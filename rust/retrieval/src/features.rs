// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature vector data model
//!
//! A shape is described by seven global scalar properties and five
//! shape-function histograms. Raw descriptors keep the drawn samples so they
//! can be re-binned against corpus-wide edges; normalized feature vectors keep
//! only probability histograms.

use std::fmt;

use serde::{Deserialize, Serialize};
use shapematch_geometry::{PointSampling, ShapeFunction};

use crate::error::{Error, Result};
use crate::histogram::HistogramRange;

/// The global scalar properties of a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScalarFeature {
    #[serde(rename = "Surface Area")]
    SurfaceArea,
    Volume,
    Compactness,
    Rectangularity,
    Diameter,
    Convexity,
    Eccentricity,
}

impl ScalarFeature {
    /// All scalar features in canonical feature-vector order
    pub const ALL: [ScalarFeature; 7] = [
        ScalarFeature::SurfaceArea,
        ScalarFeature::Volume,
        ScalarFeature::Compactness,
        ScalarFeature::Rectangularity,
        ScalarFeature::Diameter,
        ScalarFeature::Convexity,
        ScalarFeature::Eccentricity,
    ];

    /// Column name used in reference tables
    pub fn name(self) -> &'static str {
        match self {
            ScalarFeature::SurfaceArea => "Surface Area",
            ScalarFeature::Volume => "Volume",
            ScalarFeature::Compactness => "Compactness",
            ScalarFeature::Rectangularity => "Rectangularity",
            ScalarFeature::Diameter => "Diameter",
            ScalarFeature::Convexity => "Convexity",
            ScalarFeature::Eccentricity => "Eccentricity",
        }
    }

    /// Parse a column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ScalarFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values of the seven scalar features. `None` marks an undefined value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScalarDescriptors {
    values: [Option<f64>; 7],
}

impl ScalarDescriptors {
    /// All features undefined
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, feature: ScalarFeature) -> Option<f64> {
        self.values[feature.index()]
    }

    /// Store a value; non-finite values are stored as undefined
    #[inline]
    pub fn set(&mut self, feature: ScalarFeature, value: Option<f64>) {
        self.values[feature.index()] = value.filter(|v| v.is_finite());
    }

    /// Builder-style `set`
    pub fn with(mut self, feature: ScalarFeature, value: Option<f64>) -> Self {
        self.set(feature, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScalarFeature, Option<f64>)> + '_ {
        ScalarFeature::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    /// Number of defined entries
    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Samples and raw counts for one shape function of one mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeSamples {
    pub function: ShapeFunction,
    /// Every accepted sample
    pub values: Vec<f64>,
    /// Draws rejected as degenerate
    pub discarded: usize,
    /// Range the raw counts were binned over
    pub range: HistogramRange,
    /// Unnormalized bin counts over `range`
    pub counts: Vec<u32>,
}

/// Descriptor of a single mesh before corpus normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDescriptor {
    pub id: String,
    pub class: String,
    pub scalars: ScalarDescriptors,
    /// Point selection the D1 samples were drawn with
    #[serde(default)]
    pub d1_sampling: PointSampling,
    /// One entry per shape function, in canonical order
    pub samples: Vec<ShapeSamples>,
}

impl RawDescriptor {
    /// Samples of one shape function
    pub fn samples(&self, function: ShapeFunction) -> Option<&ShapeSamples> {
        self.samples.iter().find(|s| s.function == function)
    }

    /// Check that every shape function is present once, in canonical order
    pub fn check_layout(&self) -> Result<()> {
        let functions: Vec<ShapeFunction> = self.samples.iter().map(|s| s.function).collect();
        if functions != ShapeFunction::ALL {
            return Err(Error::ConfigMismatch(format!(
                "descriptor '{}' has shape functions {:?}, expected {:?}",
                self.id,
                functions,
                ShapeFunction::ALL
            )));
        }
        Ok(())
    }
}

/// Normalized histogram of one shape function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub function: ShapeFunction,
    pub bins: Vec<f64>,
}

impl Histogram {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.bins.iter().sum()
    }
}

/// Normalized descriptor of a single shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub id: String,
    /// Ground-truth category, used for evaluation only
    pub class: String,
    pub scalars: ScalarDescriptors,
    /// One histogram per shape function, in canonical order
    pub histograms: Vec<Histogram>,
}

impl FeatureVector {
    pub fn histogram(&self, function: ShapeFunction) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.function == function)
    }
}

/// Column layout shared by every row of a reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub scalar_features: Vec<String>,
    pub shape_functions: Vec<String>,
    pub num_bins: usize,
}

impl TableSchema {
    /// Canonical layout with `num_bins` bins per histogram
    pub fn new(num_bins: usize) -> Self {
        Self {
            scalar_features: ScalarFeature::ALL.iter().map(|f| f.name().to_string()).collect(),
            shape_functions: ShapeFunction::ALL.iter().map(|f| f.name().to_string()).collect(),
            num_bins,
        }
    }

    /// Bin column labels, e.g. `D2_bin_7`
    pub fn bin_labels(&self) -> Vec<String> {
        self.shape_functions
            .iter()
            .flat_map(|name| (0..self.num_bins).map(move |i| format!("{}_bin_{}", name, i)))
            .collect()
    }

    /// Reject layouts that differ from the canonical one
    pub fn validate(&self) -> Result<()> {
        let canonical = Self::new(self.num_bins);
        if self.scalar_features != canonical.scalar_features {
            return Err(Error::ConfigMismatch(format!(
                "scalar features {:?} do not match {:?}",
                self.scalar_features, canonical.scalar_features
            )));
        }
        if self.shape_functions != canonical.shape_functions {
            return Err(Error::ConfigMismatch(format!(
                "shape functions {:?} do not match {:?}",
                self.shape_functions, canonical.shape_functions
            )));
        }
        if self.num_bins == 0 {
            return Err(Error::ConfigMismatch("bin count must be positive".into()));
        }
        Ok(())
    }

    /// Check that a vector has this layout
    pub fn check_vector(&self, vector: &FeatureVector) -> Result<()> {
        check_histogram_layout(vector, self.num_bins)
    }
}

/// Check that `vector` has one histogram per shape function, each with `num_bins` bins
pub fn check_histogram_layout(vector: &FeatureVector, num_bins: usize) -> Result<()> {
    if vector.histograms.len() != ShapeFunction::ALL.len() {
        return Err(Error::ConfigMismatch(format!(
            "'{}' has {} histograms, expected {}",
            vector.id,
            vector.histograms.len(),
            ShapeFunction::ALL.len()
        )));
    }
    for (histogram, expected) in vector.histograms.iter().zip(ShapeFunction::ALL) {
        if histogram.function != expected {
            return Err(Error::ConfigMismatch(format!(
                "'{}' has {} where {} was expected",
                vector.id, histogram.function, expected
            )));
        }
        if histogram.len() != num_bins {
            return Err(Error::ConfigMismatch(format!(
                "'{}' {} histogram has {} bins, expected {}",
                vector.id,
                histogram.function,
                histogram.len(),
                num_bins
            )));
        }
    }
    Ok(())
}

/// Searchable corpus of normalized feature vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub schema: TableSchema,
    rows: Vec<FeatureVector>,
}

impl ReferenceTable {
    /// Empty table with the canonical layout
    pub fn new(num_bins: usize) -> Self {
        Self {
            schema: TableSchema::new(num_bins),
            rows: Vec::new(),
        }
    }

    /// Build a table, validating every row against the layout
    pub fn from_rows(num_bins: usize, rows: Vec<FeatureVector>) -> Result<Self> {
        let mut table = Self::new(num_bins);
        table.rows.reserve(rows.len());
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// Append a row
    pub fn push(&mut self, row: FeatureVector) -> Result<()> {
        self.schema.check_vector(&row)?;
        self.rows.push(row);
        Ok(())
    }

    /// Validate schema and rows, e.g. after deserialization
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;
        self.rows.iter().try_for_each(|row| self.schema.check_vector(row))
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    pub fn get(&self, id: &str) -> Option<&FeatureVector> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_bins(&self) -> usize {
        self.schema.num_bins
    }

    /// Number of rows labelled `class`
    pub fn class_size(&self, class: &str) -> usize {
        self.rows.iter().filter(|row| row.class == class).count()
    }
}

/// One ranked comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceResult {
    pub id: String,
    pub class: String,
    pub distance: f64,
}
