use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Sender};
use tracing::{error, info};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key as WinitKey, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::device::{CpuDevice, Device};
use crate::gpu::{GpuContext, GpuDevice, SurfacePresenter};
use crate::program::ProgramManager;
use crate::runtime::{time_source, FrameScheduler};
use crate::session::{Flow, InputEvent, Key, Session};
use crate::types::{DeviceKind, RendererConfig};

/// Opens a window and runs the interactive session until it is closed.
pub fn run(config: RendererConfig) -> Result<()> {
    let sources = crate::program_sources(&config)?;

    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("warptunnel")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;

    let size = window.inner_size();
    let context = GpuContext::new(&window, size, config.gpu_power)
        .context("failed to initialise window renderer")?;
    info!(
        device = %config.device,
        style = %config.style,
        width = size.width,
        height = size.height,
        "starting session"
    );

    let disabled = &config.controls.disabled;
    match config.device {
        DeviceKind::Gpu => {
            let program = ProgramManager::prepare(GpuDevice::new(context), &sources, disabled)?;
            drive(event_loop, &window, program, &config)
        }
        DeviceKind::Cpu => {
            let device = CpuDevice::new(config.threads)?
                .with_render_scale(config.render_scale)
                .with_sink(Box::new(SurfacePresenter::new(context)));
            let program = ProgramManager::prepare(device, &sources, disabled)?;
            drive(event_loop, &window, program, &config)
        }
    }
}

fn drive<D: Device>(
    event_loop: EventLoop<()>,
    window: &Window,
    program: ProgramManager<D>,
    config: &RendererConfig,
) -> Result<()> {
    let (events_tx, events_rx) = unbounded();
    let size = window.inner_size();
    let mut session = Session::new(program, events_rx)
        .with_params(config.params)
        .with_controls(config.controls.clone())
        .with_resolution(size.width, size.height)
        .with_clock(time_source(config.fixed_time));
    let mut scheduler = FrameScheduler::new(config.target_fps, config.pacing);
    let mut failure = None;

    window.request_redraw();
    event_loop
        .run(|event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    forward(&events_tx, InputEvent::Quit);
                    if session.drain_events() == Flow::Exit {
                        elwt.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state == ElementState::Pressed && !event.repeat {
                        forward(&events_tx, InputEvent::KeyDown(translate_key(&event.logical_key)));
                    }
                }
                WindowEvent::Resized(new_size) => {
                    if new_size.width > 0 && new_size.height > 0 {
                        forward(
                            &events_tx,
                            InputEvent::Resize {
                                width: new_size.width,
                                height: new_size.height,
                            },
                        );
                    }
                }
                WindowEvent::RedrawRequested => match session.step() {
                    Ok(Flow::Continue) => scheduler.mark_rendered(Instant::now()),
                    Ok(Flow::Exit) => elwt.exit(),
                    Err(err) => {
                        error!(error = %format!("{err:#}"), "frame failed; ending session");
                        failure = Some(err);
                        elwt.exit();
                    }
                },
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                if scheduler.ready_for_frame(now) {
                    window.request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = scheduler.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    info!(frames = session.frames(), "window closed");
    failure.map_or(Ok(()), Err)
}

fn forward(events: &Sender<InputEvent>, event: InputEvent) {
    if events.send(event).is_err() {
        tracing::warn!(?event, "session queue closed; dropping input event");
    }
}

fn translate_key(key: &WinitKey) -> Key {
    match key {
        WinitKey::Named(NamedKey::ArrowUp) => Key::Up,
        WinitKey::Named(NamedKey::ArrowDown) => Key::Down,
        WinitKey::Named(NamedKey::ArrowLeft) => Key::Left,
        WinitKey::Named(NamedKey::ArrowRight) => Key::Right,
        WinitKey::Named(NamedKey::Escape) => Key::Escape,
        WinitKey::Character(text) => text.chars().next().map_or(Key::Other, Key::from_char),
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_arrows_letters_and_escape() {
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::ArrowUp)), Key::Up);
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::Escape)), Key::Escape);
        assert_eq!(translate_key(&WinitKey::Character("Z".into())), Key::Z);
        assert_eq!(translate_key(&WinitKey::Character("v".into())), Key::V);
        assert_eq!(translate_key(&WinitKey::Character("q".into())), Key::Other);
        assert_eq!(translate_key(&WinitKey::Named(NamedKey::Space)), Key::Other);
    }
}
