mod config;
mod scene;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use descent_assets::{MeshAsset, ObjLoader};
use descent_common::DeviceError;
use descent_render::{Canvas, FrameRenderer, Material, RenderError};
use descent_render_wgpu::{WgpuDevice, lit_material};
use futures::FutureExt;
use futures::executor::ThreadPool;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::DesktopConfig;
use crate::scene::Scene;

#[derive(Parser)]
#[command(name = "descent-desktop", about = "Fall through an endless procedural shaft")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chunk mesh, overriding the config file
    #[arg(long)]
    mesh: Option<String>,

    /// Seed for the chunk trail
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Directory mesh URLs are resolved against
    #[arg(long, default_value = "./assets")]
    assets: PathBuf,
}

struct GpuApp {
    scene: Scene,
    pool: ThreadPool,
    window: Option<Arc<Window>>,
    canvas: Option<Canvas>,
    renderer: Option<FrameRenderer<WgpuDevice>>,
    last_frame: Instant,
}

impl GpuApp {
    fn new(scene: Scene, pool: ThreadPool) -> Self {
        Self {
            scene,
            pool,
            window: None,
            canvas: None,
            renderer: None,
            last_frame: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Descent")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let size = window.inner_size();
        let (width, height) = (size.width.max(1), size.height.max(1));
        let device = pollster::block_on(WgpuDevice::new(window.clone(), width, height))
            .context("GPU bring-up failed")?;

        let canvas = Canvas::new(width, height);
        let renderer = FrameRenderer::new(Arc::new(device), &canvas, Box::new(self.pool.clone()))
            .context("renderer setup failed")?;

        self.window = Some(window);
        self.canvas = Some(canvas);
        self.renderer = Some(renderer);
        self.last_frame = Instant::now();
        Ok(())
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let Some(renderer) = &mut self.renderer else {
            return;
        };
        self.scene.advance(dt, renderer);

        match renderer.render() {
            Ok(report) => tracing::trace!(
                drawn = report.drawn.len(),
                not_ready = report.not_ready,
                failed = report.failed,
                marker_y = self.scene.marker_y(),
                "frame"
            ),
            Err(RenderError::Device(DeviceError::SurfaceUnavailable(reason))) => {
                tracing::debug!(%reason, "frame dropped");
            }
            Err(err) => tracing::error!("render failed: {err}"),
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            tracing::error!("startup failed: {err:#}");
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                // Minimized windows report 0x0; keep the last real size.
                if new_size.width > 0 && new_size.height > 0 {
                    if let Some(canvas) = &self.canvas {
                        canvas.resize(new_size.width, new_size.height);
                    }
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => DesktopConfig::load(path)?,
        None => DesktopConfig::default(),
    };
    if let Some(mesh) = cli.mesh {
        config.mesh = mesh;
    }
    tracing::info!(seed = cli.seed, mesh = %config.mesh, "descent-desktop starting");

    let pool = ThreadPool::builder()
        .name_prefix("descent-load-")
        .create()
        .context("failed to start loader pool")?;

    let mesh = MeshAsset::new(config.mesh.clone(), Arc::new(ObjLoader::new(cli.assets)));
    // Decode while the window and device come up.
    pool.spawn_ok(mesh.preload().map(|result| {
        if let Err(err) = result {
            tracing::error!("chunk mesh unavailable: {err}");
        }
    }));

    let material: Arc<dyn Material> = Arc::new(lit_material());
    let scene = Scene::new(config, cli.seed, mesh, material);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(scene, pool);
    event_loop.run_app(&mut app)?;

    Ok(())
}
