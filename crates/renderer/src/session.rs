//! The interactive loop: drain input, advance time, push inputs, dispatch.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use field::{FrameContext, Parameter, ParameterSet};
use tracing::{debug, info};

use crate::device::Device;
use crate::program::ProgramManager;
use crate::runtime::{BoxedTimeSource, FrameScheduler, SystemTimeSource};

/// Keys the session reacts to; everything else arrives as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Z,
    X,
    C,
    V,
    Escape,
    Other,
}

impl Key {
    pub fn from_char(c: char) -> Self {
        match c.to_ascii_lowercase() {
            'z' => Key::Z,
            'x' => Key::X,
            'c' => Key::C,
            'v' => Key::V,
            _ => Key::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Quit,
    /// A discrete key press; auto-repeats are filtered before they get here.
    KeyDown(Key),
    Resize {
        width: u32,
        height: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Step sizes for the parameter keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    /// Multiplier applied by Up and divided out by Down.
    pub speed_factor: f32,
    pub warp_step: f32,
    pub thickness_step: f32,
    pub color_shift_step: f32,
    /// Parameters whose keys are ignored.
    pub disabled: Vec<Parameter>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            speed_factor: 1.1,
            warp_step: 0.1,
            thickness_step: 0.01,
            color_shift_step: 0.05,
            disabled: Vec::new(),
        }
    }
}

impl Controls {
    /// Applies one key to `params`, returning which parameter changed.
    pub fn apply(&self, key: Key, params: &mut ParameterSet) -> Option<Parameter> {
        let parameter = match key {
            Key::Up | Key::Down => Parameter::Speed,
            Key::Left | Key::Right => Parameter::Warp,
            Key::Z | Key::X => Parameter::Thickness,
            Key::C | Key::V => Parameter::ColorShift,
            Key::Escape | Key::Other => return None,
        };
        if self.disabled.contains(&parameter) {
            return None;
        }
        match key {
            Key::Up => params.speed *= self.speed_factor,
            Key::Down => params.speed /= self.speed_factor,
            Key::Right => params.warp += self.warp_step,
            Key::Left => params.warp -= self.warp_step,
            Key::X => params.thickness += self.thickness_step,
            Key::Z => params.thickness -= self.thickness_step,
            Key::C => params.color_shift += self.color_shift_step,
            Key::V => params.color_shift -= self.color_shift_step,
            Key::Escape | Key::Other => {}
        }
        params.speed = params
            .speed
            .clamp(ParameterSet::MIN_SPEED, ParameterSet::MAX_SPEED);
        params.warp = params.warp.max(ParameterSet::MIN_WARP);
        params.thickness = params.thickness.max(ParameterSet::MIN_THICKNESS);
        Some(parameter)
    }
}

/// Rolling frame-rate counter, reported once per second.
#[derive(Debug)]
struct FrameStats {
    frames: u64,
    since_report: u32,
    last_report: Instant,
}

impl FrameStats {
    fn new() -> Self {
        Self {
            frames: 0,
            since_report: 0,
            last_report: Instant::now(),
        }
    }

    fn record(&mut self, now: Instant, time: f32) {
        self.frames += 1;
        self.since_report += 1;
        let elapsed = now.saturating_duration_since(self.last_report);
        if elapsed >= Duration::from_secs(1) {
            let fps = self.since_report as f32 / elapsed.as_secs_f32();
            debug!(
                fps = fps.round(),
                frame_count = self.frames,
                time,
                "render stats"
            );
            self.since_report = 0;
            self.last_report = now;
        }
    }
}

pub struct Session<D: Device> {
    program: ProgramManager<D>,
    params: ParameterSet,
    controls: Controls,
    resolution: (u32, u32),
    clock: BoxedTimeSource,
    events: Receiver<InputEvent>,
    stats: FrameStats,
}

impl<D: Device> Session<D> {
    /// Wraps an active program. The clock starts here.
    pub fn new(program: ProgramManager<D>, events: Receiver<InputEvent>) -> Self {
        let mut session = Self {
            program,
            params: ParameterSet::default(),
            controls: Controls::default(),
            resolution: (1280, 720),
            clock: Box::new(SystemTimeSource::new()),
            events,
            stats: FrameStats::new(),
        };
        session.clock.reset();
        session
    }

    pub fn with_params(mut self, params: ParameterSet) -> Self {
        self.params = params;
        self
    }

    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = (width, height);
        self
    }

    /// Replaces the clock and restarts it.
    pub fn with_clock(mut self, mut clock: BoxedTimeSource) -> Self {
        clock.reset();
        self.clock = clock;
        self
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn frames(&self) -> u64 {
        self.stats.frames
    }

    pub fn program(&self) -> &ProgramManager<D> {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut ProgramManager<D> {
        &mut self.program
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Flow {
        match event {
            InputEvent::Quit | InputEvent::KeyDown(Key::Escape) => return Flow::Exit,
            InputEvent::KeyDown(key) => {
                if let Some(parameter) = self.controls.apply(key, &mut self.params) {
                    debug!(
                        parameter = %parameter,
                        value = self.params.get(parameter),
                        "parameter changed"
                    );
                }
            }
            InputEvent::Resize { width, height } => {
                self.resolution = (width, height);
                self.program.resize(width, height);
                debug!(width, height, "resolution changed");
            }
        }
        Flow::Continue
    }

    /// Handles every queued event in arrival order, stopping at the first exit.
    pub fn drain_events(&mut self) -> Flow {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.handle_event(event) == Flow::Exit {
                        return Flow::Exit;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Flow::Continue,
            }
        }
    }

    /// One iteration: events, clock, inputs, dispatch.
    pub fn step(&mut self) -> Result<Flow> {
        if self.drain_events() == Flow::Exit {
            return Ok(Flow::Exit);
        }
        let sample = self.clock.sample();
        let frame = FrameContext::new(sample.seconds, self.resolution);
        self.program.write_frame(&frame, &self.params)?;
        self.program
            .dispatch()
            .with_context(|| format!("failed to dispatch frame {}", sample.frame_index))?;
        self.stats.record(Instant::now(), sample.seconds);
        Ok(Flow::Continue)
    }

    /// Drives the loop without a window until exit or `max_frames`.
    ///
    /// Returns the number of frames dispatched.
    pub fn run(&mut self, scheduler: &mut FrameScheduler, max_frames: Option<u64>) -> Result<u64> {
        let start = self.stats.frames;
        scheduler.reset();
        loop {
            if max_frames.is_some_and(|max| self.stats.frames - start >= max) {
                break;
            }
            scheduler.pace();
            if self.step()? == Flow::Exit {
                break;
            }
            scheduler.mark_rendered(Instant::now());
        }
        let frames = self.stats.frames - start;
        info!(frames, "session finished");
        Ok(frames)
    }
}
