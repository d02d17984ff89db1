// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON mesh files and corpus manifests.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shapematch_geometry::Mesh;
use shapematch_processing::ShapeSource;

/// On-disk mesh: `{ "vertices": [[x, y, z], ...], "faces": [[i, j, k], ...] }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshFile {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[u32; 3]>,
}

impl MeshFile {
    pub fn into_mesh(self) -> Result<Mesh> {
        Ok(Mesh::from_arrays(&self.vertices, &self.faces)?)
    }
}

/// Read and validate a mesh file
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file: MeshFile =
        serde_json::from_str(&text).with_context(|| format!("parsing mesh {}", path.display()))?;
    file.into_mesh()
        .with_context(|| format!("invalid mesh {}", path.display()))
}

/// One manifest line: `{ "id": ..., "class": ..., "path": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub class: String,
    pub path: PathBuf,
}

impl ShapeSource for ManifestEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> &str {
        &self.class
    }

    fn load(&self) -> std::result::Result<Cow<'_, Mesh>, String> {
        load_mesh(&self.path)
            .map(Cow::Owned)
            .map_err(|e| format!("{:#}", e))
    }
}

/// Read a manifest; relative mesh paths are resolved against its directory
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut entries: Vec<ManifestEntry> =
        serde_json::from_str(&text).with_context(|| format!("parsing manifest {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for entry in &mut entries {
        if entry.path.is_relative() {
            entry.path = base.join(&entry.path);
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mesh_file() {
        let json = r#"{
            "vertices": [[0,0,0],[1,0,0],[0,1,0],[0,0,1]],
            "faces": [[0,2,1],[0,1,3],[0,3,2],[1,2,3]]
        }"#;
        let mesh = serde_json::from_str::<MeshFile>(json)
            .unwrap()
            .into_mesh()
            .unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);
    }

    #[test]
    fn test_bad_face_index_is_rejected() {
        let file = MeshFile {
            vertices: vec![[0.0; 3]],
            faces: vec![[0, 1, 2]],
        };
        assert!(file.into_mesh().is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let entry = ManifestEntry {
            id: "x".into(),
            class: "c".into(),
            path: PathBuf::from("/nonexistent/shape.json"),
        };
        let err = entry.load().unwrap_err();
        assert!(err.contains("/nonexistent/shape.json"));
    }
}
