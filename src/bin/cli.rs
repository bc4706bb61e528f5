// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! frepkit CLI

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use frepkit::csg;
use frepkit::geometry::analyze;
use frepkit::tree::{Context, Tree};
use frepkit::{FrepConfig, Mesh, RenderQueue, Renderer, StlFormat};
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::{Point3, Vector3};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "frepkit")]
#[command(about = "Implicit-surface CSG modelling and meshing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Built-in scene to render
    #[arg(long, value_enum, default_value_t = Scene::Demo)]
    scene: Scene,

    /// Samples per unit length
    #[arg(long)]
    resolution: Option<f32>,

    /// Split vertex normals along creases sharper than this many degrees
    #[arg(long)]
    sharp_angle: Option<f32>,

    /// Config file (defaults to frepkit.toml when present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a scene to STL
    Render {
        #[command(flatten)]
        args: RenderArgs,

        /// Output file (defaults to <output_dir>/<scene>.stl)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write binary STL instead of ASCII
        #[arg(long)]
        binary: bool,
    },

    /// Render a scene and print mesh statistics as JSON
    Stats {
        #[command(flatten)]
        args: RenderArgs,
    },

    /// Show version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scene {
    /// Sphere drilled along all three axes
    Demo,
    /// Two spheres and a box blended together
    Blend,
    /// Unit box
    Box,
}

impl Scene {
    fn name(self) -> &'static str {
        match self {
            Scene::Demo => "demo",
            Scene::Blend => "blend",
            Scene::Box => "box",
        }
    }

    fn build(self, ctx: &Context) -> frepkit::Result<Tree> {
        match self {
            Scene::Demo => {
                let bore = csg::cylinder(ctx, 0.6, 2.0, Point3::new(0.0, 0.0, -1.0))?;
                let sphere = csg::sphere_at_origin(ctx, 1.0)?;
                csg::difference(
                    ctx,
                    &[
                        sphere,
                        bore,
                        csg::reflect_xz(ctx, bore)?,
                        csg::reflect_yz(ctx, bore)?,
                    ],
                )
            }
            Scene::Blend => {
                let left = csg::sphere(ctx, 0.6, Point3::new(-0.5, 0.0, 0.0))?;
                let right = csg::sphere(ctx, 0.6, Point3::new(0.5, 0.0, 0.0))?;
                let slab = csg::cuboid(
                    ctx,
                    Point3::new(-1.2, -0.2, -1.2),
                    Point3::new(1.2, 0.2, -0.6),
                )?;
                let lifted = csg::translate(ctx, slab, Vector3::new(0.0, 0.0, 0.1))?;
                csg::blend_all(ctx, csg::DEFAULT_BLEND, &[left, right, lifted])
            }
            Scene::Box => {
                csg::cuboid(ctx, Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render {
            args,
            output,
            binary,
        } => render_command(&args, output, binary, cli.verbose),
        Commands::Stats { args } => stats_command(&args),
        Commands::Version => {
            println!("frepkit v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "info,frepkit=debug"
    } else {
        "info,frepkit=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &RenderArgs) -> Result<FrepConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = FrepConfig::from_file(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        }
        None => FrepConfig::load()?,
    };

    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if let Some(angle) = args.sharp_angle {
        config.splitting_angle = angle;
    }
    Ok(config)
}

/// Build the scene and render it on a render queue while a spinner runs
fn render_scene(args: &RenderArgs, config: &FrepConfig, show_progress: bool) -> Result<Mesh> {
    let ctx = Context::new();
    let scope = ctx.scope();
    let root = args
        .scene
        .build(&ctx)
        .with_context(|| format!("Failed to build scene {}", args.scene.name()))?;

    let renderer = Renderer::new(config.polygonizer()).with_settings(config.render_settings());
    let queue = RenderQueue::new()?;
    let mut handle = renderer.enqueue(&queue, &ctx, root, &config.region())?;

    let spinner = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        let template = "{spinner:.green} {msg} [{elapsed}]";
        if let Ok(style) = ProgressStyle::default_spinner().template(template) {
            pb.set_style(style);
        }
        pb.set_message(format!("Rendering {}", args.scene.name()));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    });

    // The handle owns an expression snapshot; the scope must still outlive the job
    while !handle.is_ready() {
        std::thread::sleep(Duration::from_millis(10));
    }
    let mesh = handle.complete_mesh(config.splitting_angle);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    scope.dispose();

    Ok(mesh?)
}

fn render_command(
    args: &RenderArgs,
    output: Option<PathBuf>,
    binary: bool,
    verbose: bool,
) -> Result<()> {
    let config = load_config(args)?;
    let output = output
        .unwrap_or_else(|| config.output_dir.join(format!("{}.stl", args.scene.name())));

    let start = Instant::now();
    let mesh = render_scene(args, &config, true)?;
    let render_time = start.elapsed();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let format = if binary {
        StlFormat::Binary
    } else {
        StlFormat::Ascii
    };
    frepkit::export_stl(&mesh, &output, args.scene.name(), format)?;

    println!(
        "{} {} {}",
        "Rendered".green().bold(),
        args.scene.name().bold(),
        format!("in {:.2?}", render_time).dimmed()
    );
    println!("  Vertices:   {}", mesh.vertex_count());
    println!("  Triangles:  {}", mesh.triangle_count());
    if verbose {
        println!("  Resolution: {}", config.resolution);
        println!("  Sharp edge: {}°", config.splitting_angle);
    }
    println!("  Output:     {}", output.display().to_string().cyan());

    Ok(())
}

fn stats_command(args: &RenderArgs) -> Result<()> {
    let config = load_config(args)?;
    let mesh = render_scene(args, &config, false)?;
    let stats = analyze(&mesh);
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
