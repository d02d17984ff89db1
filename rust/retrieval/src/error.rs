// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for descriptor building, normalization and ranking.

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while describing, normalizing or ranking shapes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The mesh cannot support a required measurement or sampling operation.
    #[error("geometry error: {0}")]
    Geometry(#[from] shapematch_geometry::Error),

    /// Bin count or feature layout differs between two vectors, or between a
    /// vector and the table or statistics it is used with.
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Corpus statistics were requested over zero descriptors.
    #[error("corpus is empty: no descriptors to fit statistics on")]
    EmptyCorpus,

    /// A shape identifier was not found in the reference table.
    #[error("unknown shape: {0}")]
    UnknownShape(String),

    /// A table, statistics or configuration document could not be read or written.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
