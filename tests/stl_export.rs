// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! STL export tests

use anyhow::Result;
use frepkit::geometry::{Mesh, RawMesh, Region};
use frepkit::io::{export_stl, to_ascii_stl, try_export_stl, StlFormat};
use frepkit::tree::Context;
use nalgebra::Point3;
use std::fs::OpenOptions;
use tempfile::tempdir;

fn single_triangle() -> Mesh {
    RawMesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ],
        vec![[0, 1, 2]],
    )
    .into_mesh()
}

#[test]
fn test_single_triangle_ascii() {
    let text = to_ascii_stl(&single_triangle(), "tri");

    let expected = "solid tri\r\n\
                    facet normal 0.0 0.0 0.0\r\n\
                    outer loop\r\n\
                    vertex 0 0 0\r\n\
                    vertex 1 0 0\r\n\
                    vertex 0 1 0\r\n\
                    endloop\r\n\
                    endfacet\r\n\
                    endsolid\r\n";
    assert_eq!(text, expected);
}

#[test]
fn test_export_ascii_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("tri.stl");

    export_stl(&single_triangle(), &path, "tri", StlFormat::Ascii)?;
    let written = std::fs::read_to_string(&path)?;
    assert_eq!(written, to_ascii_stl(&single_triangle(), "tri"));
    Ok(())
}

#[test]
fn test_export_binary_file() -> Result<()> {
    let ctx = Context::new();
    let sphere = frepkit::csg::sphere_at_origin(&ctx, 1.0)?;
    let mesh = frepkit::render(&ctx, sphere, &Region::cube(1.2), 6.0)?;

    let dir = tempdir()?;
    let path = dir.path().join("sphere.stl");
    export_stl(&mesh, &path, "sphere", StlFormat::Binary)?;

    // 80-byte header, triangle count, 50 bytes per facet
    let size = std::fs::metadata(&path)?.len() as usize;
    assert_eq!(size, 84 + 50 * mesh.triangle_count());

    let mut file = OpenOptions::new().read(true).open(&path)?;
    let indexed = stl_io::read_stl(&mut file)?;
    assert_eq!(indexed.faces.len(), mesh.triangle_count());
    for face in &indexed.faces {
        assert_eq!(face.normal, stl_io::Normal::new([0.0, 0.0, 0.0]));
    }
    Ok(())
}

#[test]
fn test_failed_export_is_logged_not_fatal() -> Result<()> {
    let dir = tempdir()?;
    let missing = dir.path().join("no-such-dir").join("out.stl");
    let mesh = single_triangle();

    assert!(export_stl(&mesh, &missing, "tri", StlFormat::Ascii).is_err());
    assert!(!try_export_stl(&mesh, &missing, "tri", StlFormat::Ascii));

    // Mesh is untouched and still exportable elsewhere
    assert_eq!(mesh.triangle_count(), 1);
    assert!(try_export_stl(&mesh, dir.path().join("ok.stl"), "tri", StlFormat::Ascii));
    Ok(())
}
