// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::sampler::ShapeFunction;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during mesh measurement and sampling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Insufficient geometry for {function}: requires {required} {unit}, mesh has {available}")]
    InsufficientGeometry {
        function: ShapeFunction,
        required: usize,
        available: usize,
        unit: &'static str,
    },

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Empty mesh")]
    EmptyMesh,
}

impl Error {
    /// Shorthand for a vertex-count shortfall
    pub(crate) fn too_few_vertices(function: ShapeFunction, required: usize, available: usize) -> Self {
        Error::InsufficientGeometry {
            function,
            required,
            available,
            unit: "vertices",
        }
    }
}
