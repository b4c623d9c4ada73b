//! The background loop that owns the simulation and produces frames.
//!
//! [`SimulationHost`] is a plain state machine driven by control messages and
//! clock callbacks, with time passed in explicitly. [`spawn_host`] runs one on
//! its own thread and connects it to the display through channels.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::config::{RenderMode, SimulationParams};
use crate::error::HostError;
use crate::render::{Frame, render_frame};
use crate::simulation::Simulation;
use crate::types::Dims;

pub const TARGET_FPS: f64 = 60.0;
pub const FRAME_TIME_MS: f64 = 1000.0 / TARGET_FPS;

/// Simulation steps per emitted frame.
pub const TICK_ITERATIONS: usize = 1;

/// How long the host thread sleeps between clock callbacks.
pub const CALLBACK_INTERVAL: Duration = Duration::from_millis(4);

/// Capacity of the control channel.
pub const CONTROL_CAPACITY: usize = 64;

/// Messages from the display to the host, processed in send order.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlMessage {
    Resize { width: u32, height: u32 },
    SetParams { params: SimulationParams, mode: RenderMode },
    Stop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    /// No simulation yet.
    Idle,
    /// Simulation seeded, clock not running.
    Seeded,
    /// Clock armed, frames are produced on callbacks.
    Running,
    /// Clock cancelled by `Stop`; the simulation is kept.
    Stopped,
}

/// Background half of the pipeline: owns the simulation and turns control
/// messages and clock callbacks into frames.
///
/// Time is passed in explicitly, so the state machine runs the same under
/// [`spawn_host`] and in tests.
pub struct SimulationHost {
    rng: StdRng,
    params: Option<SimulationParams>,
    mode: RenderMode,
    dims: Option<Dims>,
    simulation: Option<Simulation>,
    clock_armed: bool,
    stopped: bool,
    last_frame_ms: f64,
    frames_emitted: u64,
}

impl SimulationHost {
    /// `seed` makes the orb layout and gas reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            params: None,
            mode: RenderMode::default(),
            dims: None,
            simulation: None,
            clock_armed: false,
            stopped: false,
            last_frame_ms: 0.0,
            frames_emitted: 0,
        }
    }

    /// Lifecycle state derived from the clock and the simulation.
    pub fn state(&self) -> HostState {
        if self.clock_armed {
            HostState::Running
        } else if self.stopped {
            HostState::Stopped
        } else if self.simulation.is_some() {
            HostState::Seeded
        } else {
            HostState::Idle
        }
    }

    pub fn clock_armed(&self) -> bool {
        self.clock_armed
    }

    /// Frames produced since creation.
    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted
    }

    /// Processes one control message. Returns the frame it produced, if any.
    pub fn handle(&mut self, msg: ControlMessage, now_ms: f64) -> Option<Frame> {
        match msg {
            ControlMessage::Resize { width, height } => self.resize(width, height, now_ms),
            ControlMessage::SetParams { params, mode } => {
                self.set_params(params, mode);
                None
            }
            ControlMessage::Stop => {
                self.stop();
                None
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32, now_ms: f64) -> Option<Frame> {
        let Some(dims) = Dims::new(width, height) else {
            warn!(width, height, "ignoring resize to an empty surface");
            return None;
        };
        self.dims = Some(dims);
        if self.params.is_none() {
            debug!(width, height, "surface recorded, waiting for parameters");
            return None;
        }
        self.reseed();

        if self.mode == RenderMode::Static || !self.clock_armed {
            self.stopped = false;
            return self.advance(now_ms, true);
        }
        None
    }

    fn set_params(&mut self, params: SimulationParams, mode: RenderMode) {
        if let Err(err) = params.validate() {
            warn!(%err, "rejecting simulation parameters");
            return;
        }
        self.params = Some(params);
        self.mode = mode;
        if self.dims.is_some() {
            self.reseed();
        }
    }

    fn stop(&mut self) {
        if self.clock_armed {
            info!(frames = self.frames_emitted, "animation stopped");
        }
        self.clock_armed = false;
        self.stopped = true;
    }

    /// Replaces the simulation at the current size, carrying orb positions
    /// over from the previous one.
    fn reseed(&mut self) {
        let (Some(params), Some(dims)) = (self.params.as_ref(), self.dims) else {
            return;
        };
        let previous = self.simulation.as_ref().map(Simulation::normalized_orb_positions);
        self.simulation = Some(Simulation::new(
            params,
            dims,
            previous.as_ref(),
            &mut self.rng,
        ));
    }

    /// Clock callback. Produces a frame once the frame budget has elapsed.
    pub fn on_animation_frame(&mut self, now_ms: f64) -> Option<Frame> {
        if !self.clock_armed {
            return None;
        }
        self.advance(now_ms, false)
    }

    fn advance(&mut self, now_ms: f64, force: bool) -> Option<Frame> {
        let is_static = self.mode == RenderMode::Static;
        let elapsed = now_ms - self.last_frame_ms;
        let mut frame = None;

        if force || is_static || elapsed >= FRAME_TIME_MS {
            if let (Some(sim), Some(params)) = (self.simulation.as_mut(), self.params.as_ref()) {
                let links = sim.refresh_links();
                sim.tick_with_energy_conservation(TICK_ITERATIONS);
                frame = Some(render_frame(sim.nodes(), &links, params, sim.dims()));
                self.frames_emitted += 1;
            }
            // A forced frame restarts the budget; a clock frame carries the
            // overshoot so the cadence does not drift.
            self.last_frame_ms = if force {
                now_ms
            } else {
                now_ms - elapsed.rem_euclid(FRAME_TIME_MS)
            };
        }

        let was_armed = self.clock_armed;
        self.clock_armed = !is_static;
        if self.clock_armed && !was_armed {
            info!("animation started");
        }
        frame
    }
}

/// The display side's end of a running host thread.
///
/// Dropping the handle disconnects the control channel and joins the thread.
pub struct HostHandle {
    control: Option<Sender<ControlMessage>>,
    frames: Receiver<Frame>,
    thread: Option<JoinHandle<()>>,
}

impl HostHandle {
    /// Queues a control message, blocking while the queue is full.
    ///
    /// Fails with [`HostError::Disconnected`] once the host thread is gone.
    pub fn send(&self, msg: ControlMessage) -> Result<(), HostError> {
        let control = self.control.as_ref().ok_or(HostError::Disconnected)?;
        control.send(msg).map_err(|_| HostError::Disconnected)
    }

    /// Frame channel, for callers that want to block on the next frame.
    pub fn frames(&self) -> &Receiver<Frame> {
        &self.frames
    }

    /// Newest frame waiting in the channel, if any.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.frames.try_iter().last()
    }

    /// Disconnects and waits for the host thread to exit.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.control.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("simulation host thread panicked");
            }
        }
    }
}

impl Drop for HostHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Starts a [`SimulationHost`] on a background thread.
///
/// ### Parameters
/// - `seed` - Fixes the random layout and gas when given; otherwise the OS
///   seeds the generator.
///
/// ### Returns
/// The [`HostHandle`] owning the thread. The host sits idle until it gets
/// parameters and a size.
pub fn spawn_host(seed: Option<u64>) -> HostHandle {
    let (control_tx, control_rx) = bounded(CONTROL_CAPACITY);
    let (frame_tx, frame_rx) = bounded(1);
    let host = SimulationHost::new(seed);

    let thread = thread::Builder::new()
        .name("orbfield-host".into())
        .spawn(move || run_host(host, control_rx, frame_tx));

    let thread = match thread {
        Ok(t) => Some(t),
        Err(err) => {
            // Without a thread the channels disconnect and sends fail.
            warn!(%err, "failed to spawn simulation host thread");
            None
        }
    };

    HostHandle {
        control: Some(control_tx),
        frames: frame_rx,
        thread,
    }
}

/// Delivers a frame without blocking. Returns `false` once the display is gone.
fn emit(frames: &Sender<Frame>, frame: Option<Frame>) -> bool {
    match frame.map(|f| frames.try_send(f)) {
        None | Some(Ok(())) => true,
        Some(Err(TrySendError::Full(_))) => {
            debug!("display is behind, dropping frame");
            true
        }
        Some(Err(TrySendError::Disconnected(_))) => false,
    }
}

fn run_host(mut host: SimulationHost, control: Receiver<ControlMessage>, frames: Sender<Frame>) {
    info!("simulation host started");
    let epoch = Instant::now();
    let now_ms = || epoch.elapsed().as_secs_f64() * 1000.0;

    loop {
        let msg = if host.clock_armed() {
            match control.recv_timeout(CALLBACK_INTERVAL) {
                Ok(msg) => Some(msg),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match control.recv() {
                Ok(msg) => Some(msg),
                Err(_) => break,
            }
        };

        if let Some(msg) = msg {
            if !emit(&frames, host.handle(msg, now_ms())) {
                break;
            }
        }
        if !emit(&frames, host.on_animation_frame(now_ms())) {
            break;
        }
    }

    info!(frames = host.frames_emitted(), "simulation host exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_params() -> SimulationParams {
        SimulationParams {
            gas_density: 0.0,
            ..SimulationParams::default()
        }
    }

    fn set_params(mode: RenderMode) -> ControlMessage {
        ControlMessage::SetParams {
            params: quiet_params(),
            mode,
        }
    }

    fn resize(width: u32, height: u32) -> ControlMessage {
        ControlMessage::Resize { width, height }
    }

    #[test]
    fn resize_before_params_only_records_the_surface() {
        let mut host = SimulationHost::new(Some(1));
        assert!(host.handle(resize(200, 100), 0.0).is_none());
        assert_eq!(host.state(), HostState::Idle);
        assert_eq!(host.dims, Dims::new(200, 100));

        // Parameters arriving later seed at the recorded size without a frame.
        assert!(host.handle(set_params(RenderMode::Animated), 1.0).is_none());
        assert_eq!(host.state(), HostState::Seeded);
    }

    #[test]
    fn params_before_resize_are_held() {
        let mut host = SimulationHost::new(Some(2));
        assert!(host.handle(set_params(RenderMode::Animated), 0.0).is_none());
        assert_eq!(host.state(), HostState::Idle);

        let frame = host.handle(resize(200, 100), 0.0).expect("first frame");
        assert_eq!(frame.dims(), Dims::new(200, 100).unwrap());
        assert_eq!(host.state(), HostState::Running);
    }

    #[test]
    fn zero_resize_is_rejected() {
        let mut host = SimulationHost::new(Some(3));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(300, 200), 0.0).expect("first frame");
        let before = host.simulation.as_ref().map(Simulation::orb_positions);

        assert!(host.handle(resize(0, 400), 5.0).is_none());
        assert_eq!(host.dims, Dims::new(300, 200));
        assert_eq!(host.simulation.as_ref().map(Simulation::orb_positions), before);
        assert_eq!(host.frames_emitted(), 1);
    }

    #[test]
    fn clock_honours_the_frame_budget() {
        let mut host = SimulationHost::new(Some(4));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(200, 200), 0.0).expect("first frame");

        assert!(host.on_animation_frame(10.0).is_none());
        assert!(host.on_animation_frame(17.0).is_some());
        // 17 ms elapsed leaves a 0.33 ms remainder, so the budget restarts
        // at ~16.67 and the next frame is due at ~33.33.
        assert!(host.on_animation_frame(33.0).is_none());
        assert!(host.on_animation_frame(33.5).is_some());
        assert_eq!(host.frames_emitted(), 3);
    }

    #[test]
    fn forced_frame_restarts_the_budget() {
        let mut host = SimulationHost::new(Some(12));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(200, 200), 1010.0).expect("first frame");

        assert!(host.on_animation_frame(1017.0).is_none());
        assert!(host.on_animation_frame(1026.0).is_none());
        assert!(host.on_animation_frame(1027.0).is_some());
    }

    #[test]
    fn stop_is_idempotent_and_silences_the_clock() {
        let mut host = SimulationHost::new(Some(5));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(200, 200), 0.0).expect("first frame");

        assert!(host.handle(ControlMessage::Stop, 1.0).is_none());
        assert_eq!(host.state(), HostState::Stopped);
        let positions = host.simulation.as_ref().map(Simulation::orb_positions);

        assert!(host.handle(ControlMessage::Stop, 2.0).is_none());
        assert_eq!(host.state(), HostState::Stopped);
        assert_eq!(host.simulation.as_ref().map(Simulation::orb_positions), positions);

        assert!(host.on_animation_frame(100.0).is_none());
        assert!(host.on_animation_frame(1000.0).is_none());
        assert_eq!(host.frames_emitted(), 1);
    }

    #[test]
    fn resize_after_stop_resumes() {
        let mut host = SimulationHost::new(Some(6));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(200, 200), 0.0);
        host.handle(ControlMessage::Stop, 1.0);

        assert!(host.handle(resize(220, 200), 50.0).is_some());
        assert_eq!(host.state(), HostState::Running);
    }

    #[test]
    fn static_mode_renders_once_and_halts() {
        let mut host = SimulationHost::new(Some(7));
        host.handle(set_params(RenderMode::Static), 0.0);

        assert!(host.handle(resize(200, 200), 0.0).is_some());
        assert!(!host.clock_armed());
        assert_eq!(host.state(), HostState::Seeded);
        assert!(host.on_animation_frame(1000.0).is_none());

        // Every resize yields one fresh settled frame.
        assert!(host.handle(resize(240, 200), 2000.0).is_some());
        assert_eq!(host.frames_emitted(), 2);
    }

    #[test]
    fn switching_to_static_stops_after_the_next_frame() {
        let mut host = SimulationHost::new(Some(8));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(200, 200), 0.0);

        host.handle(set_params(RenderMode::Static), 1.0);
        assert!(host.clock_armed());
        assert!(host.on_animation_frame(2.0).is_some());
        assert!(!host.clock_armed());
    }

    #[test]
    fn reseed_carries_orbs_across_resize() {
        let mut host = SimulationHost::new(Some(9));
        host.handle(set_params(RenderMode::Animated), 0.0);
        host.handle(resize(600, 600), 0.0);
        host.handle(ControlMessage::Stop, 0.0);
        let before = host.simulation.as_ref().unwrap().normalized_orb_positions();

        host.handle(resize(900, 600), 10.0);
        // The resize tick moves the orbs by one step; compare loosely.
        let after = host.simulation.as_ref().unwrap().normalized_orb_positions();
        for (a, b) in before.iter().zip(&after) {
            assert!(a.distance(*b) < 0.25, "{a} vs {b}");
        }
    }

    #[test]
    fn invalid_params_are_ignored() {
        let mut host = SimulationHost::new(Some(10));
        host.handle(
            ControlMessage::SetParams {
                params: SimulationParams {
                    orb_radii_in_dim: 0.0,
                    ..SimulationParams::default()
                },
                mode: RenderMode::Animated,
            },
            0.0,
        );
        assert!(host.handle(resize(200, 200), 0.0).is_none());
        assert_eq!(host.state(), HostState::Idle);
    }
}
