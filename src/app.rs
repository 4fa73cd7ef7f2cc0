//! # Main Loop
//!
//! Two ways to drive a [`FrameRenderer`] until the run ends:
//!
//! - [`run`] opens a window with `winit` and renders into it through [`WgpuContext`]. Each
//!   redraw renders and presents one frame, then asks for the next redraw. Presentation is
//!   vsynced, so the display paces the loop. Closing the window or pressing Escape ends the
//!   run; resizing reconfigures the surface and later frames pick up the new size.
//! - [`run_headless`] renders into a [`HeadlessContext`]. Its present call returns at once,
//!   so the loop sleeps to honor [`RenderConfig::frame_cap_hz`](crate::RenderConfig).
//!
//! Both tear the renderer down in reverse creation order when the run ends.

use std::sync::Arc;

use web_time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

use crate::config::HarnessConfig;
use crate::error::ContextCreationError;
use crate::gpu::{GraphicsContext, HeadlessContext, WgpuContext};
use crate::renderer::FrameRenderer;
use crate::scene::{build_renderer, ShaderSources};

/// Windowed application state handed to the `winit` event loop.
pub struct App {
    config: HarnessConfig,
    sources: ShaderSources,
    window: Option<Arc<Window>>,
    context: Option<WgpuContext>,
    renderer: Option<FrameRenderer>,
    /// Startup failure to report once the event loop returns.
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: HarnessConfig, sources: ShaderSources) -> Self {
        Self {
            config,
            sources,
            window: None,
            context: None,
            renderer: None,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let surface = &self.config.surface;
        let mut attributes = Window::default_attributes()
            .with_title(surface.title.clone())
            .with_inner_size(PhysicalSize::new(surface.width, surface.height));
        if surface.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = event_loop
            .create_window(attributes)
            .map_err(|err| ContextCreationError::Window(err.to_string()))?;
        let window = Arc::new(window);
        let PhysicalSize { width, height } = window.inner_size();
        log::info!("Created {width}x{height} window");

        let mut context = WgpuContext::new(window.clone(), width, height)?;
        let renderer = build_renderer(&mut context, &self.sources, &self.config.render)?;

        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn shutdown(&mut self) {
        if let (Some(renderer), Some(context)) = (self.renderer.take(), self.context.as_mut()) {
            if let Err(err) = renderer.release(context) {
                log::warn!("teardown failed: {err}");
            }
        }
        self.context = None;
        self.window = None;
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            log::error!("startup failed: {err:#}");
            self.error = Some(err);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(window), Some(context), Some(renderer)) = (
            self.window.as_ref(),
            self.context.as_mut(),
            self.renderer.as_mut(),
        ) else {
            return;
        };

        match event {
            WindowEvent::KeyboardInput {
                event:
                    winit::event::KeyEvent {
                        physical_key: winit::keyboard::PhysicalKey::Code(key_code),
                        ..
                    },
                ..
            } => {
                if matches!(key_code, winit::keyboard::KeyCode::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                log::info!("Resizing renderer surface to: ({width}, {height})");
                context.resize(width, height);
            }
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting...");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                renderer.render_tick(context, Instant::now());
                if let Err(err) = context.present_frame() {
                    log::warn!("present failed: {err}");
                }
            }
            _ => (),
        }

        window.request_redraw();
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

/// Opens a window and renders into it until it is closed.
///
/// # Errors
///
/// Any startup failure: invalid configuration, window or GPU creation, shader compile or
/// link, missing symbols, buffer upload.
pub fn run(config: HarnessConfig, sources: ShaderSources) -> anyhow::Result<()> {
    config.surface.validate()?;

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, sources);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Renders into a [`HeadlessContext`] for `frames` frames, or forever with `None`.
///
/// Returns the number of frames presented.
pub fn run_headless(
    config: HarnessConfig,
    sources: ShaderSources,
    frames: Option<u64>,
) -> anyhow::Result<u64> {
    config.surface.validate()?;

    let mut context = HeadlessContext::new(config.surface.width, config.surface.height);
    let mut renderer = build_renderer(&mut context, &sources, &config.render)?;
    let interval = frame_interval(context.present_blocks(), config.render.frame_cap_hz);
    log::info!("Running headless, frame interval {interval:?}");

    let mut presented = 0;
    while frames.map_or(true, |limit| presented < limit) {
        let started = Instant::now();
        renderer.render_tick(&mut context, started);
        context.present_frame()?;
        presented += 1;
        // Nothing inspects the log here; keep it from growing without bound.
        context.take_commands();

        if let Some(interval) = interval {
            let elapsed = started.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    renderer.release(&mut context)?;
    Ok(presented)
}

/// Minimum time per frame for a loop whose present call does not block.
fn frame_interval(present_blocks: bool, cap_hz: Option<u32>) -> Option<Duration> {
    if present_blocks {
        return None;
    }
    cap_hz
        .filter(|hz| *hz > 0)
        .map(|hz| Duration::from_secs_f64(1.0 / f64::from(hz)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocking_present_needs_no_timer() {
        assert_eq!(frame_interval(true, Some(60)), None);
    }

    #[test]
    fn cap_sets_interval() {
        assert_eq!(frame_interval(false, Some(4)), Some(Duration::from_millis(250)));
        assert_eq!(frame_interval(false, Some(0)), None);
        assert_eq!(frame_interval(false, None), None);
    }

    #[test]
    fn headless_run_rejects_zero_size() {
        let config = HarnessConfig::default().with_size(1280, 0);
        assert!(run_headless(config, ShaderSources::builtin(), Some(1)).is_err());
    }
}
