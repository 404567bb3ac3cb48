// =============================================================================
// VULKAN BOOTSTRAP - Window, device, swapchain and pipeline layout
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop                                               │
// │    └── Window (presentation target)                             │
// │          └── GraphicsContext                                    │
// │                └── Resource graph (instance → device → ...)     │
// └─────────────────────────────────────────────────────────────────┘
//
// The context is built once the window exists and torn down when the window
// is closed. Nothing is drawn.
//
// =============================================================================

use anyhow::{anyhow, Context, Result};
use vk_bootstrap::backend::GraphicsContext;
use vk_bootstrap::config::Config;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let (config, config_error) = Config::load();

    init_logging(&config);
    if let Some(e) = config_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::info!("Starting Vulkan bootstrap");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.resizable { "resizable" } else { "fixed size" }
    );
    log::info!(
        "Validation layers: {}",
        if config.debug.validation_layers { "on" } else { "off" }
    );

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => {
            log::info!("Clean shutdown");
            Ok(())
        }
    }
}

fn init_logging(config: &Config) {
    use env_logger::Builder;

    let mut builder = Builder::from_default_env();
    builder.filter_level(config.log_level());
    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The context holds a surface
/// created from the window, so it is declared (and dropped) first.
struct App {
    config: Config,
    context: Option<GraphicsContext>,
    window: Option<Window>,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
            error: None,
        }
    }

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let settings = self.config.context_settings();
        let context =
            GraphicsContext::new(window, &settings).context("Failed to initialize Vulkan")?;

        log::info!(
            "Running on {} with {} swapchain images",
            context.device_name,
            context.swapchain_images.len()
        );
        self.context = Some(context);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        // Surface and swapchain go before the window they were made from
        if let Some(mut context) = self.context.take() {
            context.destroy();
        }
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_resizable(self.config.window.resizable)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                self.error = Some(anyhow!(e).context("Failed to create window"));
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("{:#}", e);
            self.error = Some(e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                let escape = event.physical_key == PhysicalKey::Code(KeyCode::Escape);
                if event.state.is_pressed() && escape {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }
}
