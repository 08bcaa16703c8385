//! Mesh viewer entry point.
//!
//! A Vulkan mesh viewer: procedural and file-loaded meshes, a keyboard
//! camera, and a ring of animated point lights.

mod state;

use anyhow::Result;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use meshview_platform::InputState;

use crate::state::ViewerState;

struct App {
    state: Option<ViewerState>,
    input: InputState,
}

impl App {
    fn new() -> Self {
        Self {
            state: None,
            input: InputState::new(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_none() {
            match ViewerState::new(event_loop) {
                Ok(state) => {
                    info!("Initialization complete, entering main loop");
                    self.state = Some(state);
                }
                Err(e) => {
                    error!("Failed to initialize viewer: {:?}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(ref mut state) = self.state {
                    state.window.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(ref mut state) = self.state {
                    if let Err(e) = state.draw(&self.input) {
                        error!("Render error: {:?}", e);
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::PhysicalKey;
                if let PhysicalKey::Code(key) = event.physical_key {
                    if event.state.is_pressed() {
                        self.input.on_key_pressed(key);
                    } else {
                        self.input.on_key_released(key);
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        if let Some(ref state) = self.state {
            state.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    meshview_core::init_logging();
    info!("Starting mesh viewer");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app)?;

    Ok(())
}
