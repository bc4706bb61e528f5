// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Axis-aligned regions used for render bounds

use crate::error::{FrepError, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned box `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Region {
    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    /// Region centred on `center` with the given full edge lengths
    pub fn from_center_size(center: Point3<f32>, size: Vector3<f32>) -> Self {
        let half = size / 2.0;
        Self::new(center - half, center + half)
    }

    /// Cube of half-edge `half_extent` centred on the origin
    pub fn cube(half_extent: f32) -> Self {
        Self::from_center_size(Point3::origin(), Vector3::repeat(half_extent * 2.0))
    }

    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn contains(&self, point: &Point3<f32>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// Check the region can be subdivided: finite and non-degenerate on every axis
    pub fn validate(&self) -> Result<()> {
        for axis in 0..3 {
            let (lower, upper) = (self.min[axis], self.max[axis]);
            if !lower.is_finite() || !upper.is_finite() {
                return Err(FrepError::invalid_region(format!(
                    "axis {} bounds [{}, {}] are not finite",
                    axis, lower, upper
                )));
            }
            if upper <= lower {
                return Err(FrepError::invalid_region(format!(
                    "axis {} upper bound {} is not above lower bound {}",
                    axis, upper, lower
                )));
            }
        }
        Ok(())
    }

    /// Check if two regions are approximately equal within tolerance
    pub fn approx_eq(&self, other: &Region, tolerance: f32) -> bool {
        (0..3).all(|axis| {
            (self.min[axis] - other.min[axis]).abs() < tolerance
                && (self.max[axis] - other.max[axis]).abs() < tolerance
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_center_and_size() {
        let region = Region::new(Point3::new(-1.0, -2.0, -3.0), Point3::new(1.0, 4.0, 3.0));

        assert_eq!(region.center(), Point3::new(0.0, 1.0, 0.0));
        assert_eq!(region.size(), Vector3::new(2.0, 6.0, 6.0));
    }

    #[test]
    fn test_validate() {
        assert!(Region::cube(1.0).validate().is_ok());
        assert!(Region::empty().validate().is_err());

        let flat = Region::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        assert!(matches!(flat.validate(), Err(FrepError::InvalidRegion { .. })));
    }

    #[test]
    fn test_from_center_size() {
        let region = Region::from_center_size(Point3::origin(), Vector3::repeat(3.1));
        assert!(region.approx_eq(&Region::cube(1.55), 1e-6));
        assert!(region.contains(&Point3::new(1.5, -1.5, 0.0)));
        assert!(!region.contains(&Point3::new(1.6, 0.0, 0.0)));
    }
}
