// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL exporter
//!
//! Facet normals are always written as zero vectors; readers recompute
//! them from the winding.

use crate::geometry::Mesh;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const LINE_END: &str = "\r\n";

/// On-disk STL flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    #[default]
    Ascii,
    Binary,
}

/// Render `mesh` as ASCII STL with CRLF line endings
pub fn to_ascii_stl(mesh: &Mesh, name: &str) -> String {
    // Roughly 140 bytes per facet
    let mut out = String::with_capacity(32 + mesh.triangle_count() * 140);

    push_line(&mut out, format_args!("solid {}", name));
    for triangle in &mesh.triangles {
        push_line(&mut out, format_args!("facet normal 0.0 0.0 0.0"));
        push_line(&mut out, format_args!("outer loop"));
        for &idx in &triangle.indices {
            let p = mesh.vertices[idx].position;
            push_line(&mut out, format_args!("vertex {} {} {}", p.x, p.y, p.z));
        }
        push_line(&mut out, format_args!("endloop"));
        push_line(&mut out, format_args!("endfacet"));
    }
    push_line(&mut out, format_args!("endsolid"));

    out
}

fn push_line(out: &mut String, line: std::fmt::Arguments<'_>) {
    // Writing into a String cannot fail
    let _ = out.write_fmt(line);
    out.push_str(LINE_END);
}

fn write_binary(mesh: &Mesh, writer: &mut impl Write) -> std::io::Result<()> {
    use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

    let triangles: Vec<StlTriangle> = mesh
        .triangles
        .iter()
        .map(|tri| StlTriangle {
            normal: Normal::new([0.0, 0.0, 0.0]),
            vertices: tri.indices.map(|idx| {
                let p = mesh.vertices[idx].position;
                StlVertex::new([p.x, p.y, p.z])
            }),
        })
        .collect();

    stl_io::write_stl(writer, triangles.iter())
}

/// Export mesh to an STL file
pub fn export_stl(
    mesh: &Mesh,
    path: impl AsRef<Path>,
    name: &str,
    format: StlFormat,
) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let written = match format {
        StlFormat::Ascii => writer.write_all(to_ascii_stl(mesh, name).as_bytes()),
        StlFormat::Binary => write_binary(mesh, &mut writer),
    };
    written
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed to write STL to {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        ?format,
        triangles = mesh.triangle_count(),
        "exported STL"
    );
    Ok(())
}

/// [`export_stl`] that logs failures instead of returning them.
/// Returns whether the file was written.
pub fn try_export_stl(mesh: &Mesh, path: impl AsRef<Path>, name: &str, format: StlFormat) -> bool {
    match export_stl(mesh, path, name, format) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!("STL export failed: {:#}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawMesh;
    use nalgebra::Point3;

    #[test]
    fn test_empty_mesh_is_bare_solid() {
        let text = to_ascii_stl(&Mesh::new(), "empty");
        assert_eq!(text, "solid empty\r\nendsolid\r\n");
    }

    #[test]
    fn test_every_line_ends_with_crlf() {
        let mesh = RawMesh::new(
            vec![
                Point3::new(0.5, -1.25, 2.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [2, 1, 0]],
        )
        .into_mesh();
        let text = to_ascii_stl(&mesh, "two");

        assert_eq!(text.matches("\r\n").count(), text.matches('\n').count());
        assert_eq!(text.matches("endfacet").count(), 2);
        assert!(text.contains("vertex 0.5 -1.25 2\r\n"));
    }
}
