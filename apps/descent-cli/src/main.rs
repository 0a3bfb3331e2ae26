use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use descent_assets::{AssetError, MeshAsset, MeshLoader, ObjLoader, RawAttributes, decode};
use descent_common::{Color, ObjectId, Transform};
use descent_render::{
    Canvas, FrameRenderer, Material, PerspectiveConfig, RecordingDevice, RenderableObject,
};
use descent_render_wgpu::{lit_material, lit_params};
use futures::FutureExt;
use futures::executor::{LocalPool, block_on};
use futures::future::BoxFuture;
use glam::{Quat, Vec3};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "descent-cli", about = "CLI tool for descent meshes and frames")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Load and decode an OBJ mesh, then report its attributes and bounds
    Inspect {
        /// Path to the .obj file
        path: PathBuf,
    },
    /// Assemble one frame on the recording backend and print its command trace
    Frame {
        /// Number of objects to register
        #[arg(short, long, default_value = "5")]
        objects: u64,
        /// How many of them have a resident mesh
        #[arg(short, long, default_value = "3")]
        ready: u64,
    },
}

/// Serves one fixed triangle for every URL.
struct TriangleLoader;

impl MeshLoader for TriangleLoader {
    fn load(&self, _url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>> {
        let raw = RawAttributes {
            positions: Some(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            normals: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
            texcoords: Some(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
        };
        futures::future::ready(Ok(raw)).boxed()
    }
}

/// Never finishes loading.
struct StalledLoader;

impl MeshLoader for StalledLoader {
    fn load(&self, _url: &str) -> BoxFuture<'static, Result<RawAttributes, AssetError>> {
        futures::future::pending().boxed()
    }
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let loader = ObjLoader::new(".");
    let url = path.to_string_lossy();
    let raw = block_on(loader.load(&url))?;

    let count = |values: &Option<Vec<f32>>, components: usize| {
        values
            .as_ref()
            .map_or("missing".to_string(), |v| format!("{} values", v.len() / components))
    };
    println!("{}", path.display());
    println!("  positions: {}", count(&raw.positions, 3));
    println!("  normals:   {}", count(&raw.normals, 3));
    println!("  texcoords: {}", count(&raw.texcoords, 2));

    let data = decode(&raw).with_context(|| format!("{} cannot be drawn", path.display()))?;
    println!("  vertices:  {}", data.vertex_count());
    if let Some((min, max)) = data.bounds() {
        println!("  bounds:    {min:?} .. {max:?}");
    }
    Ok(())
}

fn frame(objects: u64, ready: u64) -> anyhow::Result<()> {
    let mut pool = LocalPool::new();
    let device = Arc::new(RecordingDevice::new());
    let canvas = Canvas::new(1280, 720);
    let mut renderer = FrameRenderer::new(device.clone(), &canvas, Box::new(pool.spawner()))?;

    let resident = MeshAsset::new("triangle", Arc::new(TriangleLoader));
    let stalled = MeshAsset::new("stalled", Arc::new(StalledLoader));
    let material: Arc<dyn Material> = Arc::new(lit_material());

    for i in 0..objects {
        let mesh = if i < ready { &resident } else { &stalled };
        let transform = Transform::from_position(Vec3::new(i as f32 * 1.5, 0.0, -5.0));
        let object = RenderableObject::new(
            ObjectId(i + 1),
            mesh.clone(),
            material.clone(),
            lit_params([1.0, 0.5, 0.0]),
        )
        .with_transform(&transform);
        renderer.add_object(object)?;
    }
    pool.run_until_stalled();

    renderer.set_perspective_pov(
        &Transform {
            position: Vec3::new(0.0, 2.0, 4.0),
            rotation: Quat::from_rotation_x(-0.3),
            ..Transform::default()
        },
        PerspectiveConfig {
            clear_color: Some(Color::rgb(0.1, 0.1, 0.15)),
            ..PerspectiveConfig::default()
        },
    );
    device.clear_commands();
    let report = renderer.render()?;

    print!("{}", device.trace());
    println!(
        "drawn={} not_ready={} failed={} cleared={}",
        report.drawn.len(),
        report.not_ready,
        report.failed,
        report.cleared
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("descent-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", descent_common::crate_info());
            println!("assets: {}", descent_assets::crate_info());
            println!("render: {}", descent_render::crate_info());
            println!("render-wgpu: {}", descent_render_wgpu::crate_info());
            println!("stream: {}", descent_stream::crate_info());
        }
        Commands::Inspect { path } => inspect(&path)?,
        Commands::Frame { objects, ready } => frame(objects, ready)?,
    }

    Ok(())
}
