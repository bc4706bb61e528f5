// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Rendering - polygonization and job orchestration

mod job;
mod polygonizer;

pub use job::{RenderHandle, RenderJob, RenderQueue, RenderSettings, Renderer};
pub use polygonizer::{check_resolution, Polygonizer, SurfaceNets};
