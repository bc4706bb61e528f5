// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

use nalgebra::{Point3, Vector3};

/// Unnormalized normal of the triangle (p0, p1, p2)
pub fn triangle_normal(p0: &Point3<f32>, p1: &Point3<f32>, p2: &Point3<f32>) -> Vector3<f32> {
    (p1 - p0).cross(&(p2 - p0))
}

/// Angle between two vectors in degrees, in [0, 180].
///
/// Uses atan2 of the cross and dot products, so parallel vectors give
/// exactly 0. A zero-length input gives 0.
pub fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let cross = a.cross(b).norm();
    let dot = a.dot(b);
    if cross == 0.0 && dot == 0.0 {
        return 0.0;
    }
    cross.atan2(dot).to_degrees()
}
