//! Foreground half of the pipeline: forwards surface sizes and parameters to
//! the simulation host and collects the frames it sends back.

use std::time::{Duration, Instant};

use orbfield_core::{ControlMessage, Dims, Frame, HostHandle, LogoConfig, RenderMode};
use tracing::{debug, warn};

/// Quiet period before a burst of size changes settles.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Debounces a stream of values, firing on both the leading and the trailing
/// edge.
///
/// The first call after a quiet period goes through immediately. Calls made
/// while the window is open only keep the latest value and push the deadline
/// back; that value is released by [`Debouncer::poll`] once the window closes.
#[derive(Debug)]
pub struct Debouncer<T> {
    wait: Duration,
    deadline: Option<Instant>,
    pending: Option<T>,
}

impl<T> Debouncer<T> {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            deadline: None,
            pending: None,
        }
    }

    /// Registers a value. Returns it straight back on a leading edge.
    pub fn call(&mut self, value: T, now: Instant) -> Option<T> {
        let open = self.deadline.is_some_and(|deadline| now < deadline);
        self.deadline = Some(now + self.wait);
        if open {
            self.pending = Some(value);
            None
        } else {
            self.pending = None;
            Some(value)
        }
    }

    /// Releases the trailing value once the window has closed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }
}

/// Surface size to request for a measured display size.
///
/// Square mode pads both sides to the larger one. A measurement with a zero
/// side (hidden surface) yields `None`.
pub fn desired_size(measured: (u32, u32), square: bool) -> Option<Dims> {
    let (w, h) = measured;
    if w == 0 || h == 0 {
        return None;
    }
    if square {
        let side = w.max(h);
        Dims::new(side, side)
    } else {
        Dims::new(w, h)
    }
}

/// Display side of the host link.
///
/// ### Fields
/// - `host` - Handle to the host thread; taken on drop.
/// - `config` - Configuration currently in force.
/// - `surface` - Size last sent to the host.
/// - `measured` - Last measurement that got through the debounce.
/// - `observed` - Last raw measurement, debounced or not.
/// - `resize` - Debounce for size changes.
pub struct DisplayAdapter {
    host: Option<HostHandle>,
    config: LogoConfig,
    surface: Option<Dims>,
    measured: Option<(u32, u32)>,
    observed: Option<(u32, u32)>,
    resize: Debouncer<(u32, u32)>,
}

impl DisplayAdapter {
    /// Takes ownership of `host` and sends it the initial parameters.
    pub fn new(config: LogoConfig, host: HostHandle) -> Self {
        let adapter = Self {
            host: Some(host),
            config,
            surface: None,
            measured: None,
            observed: None,
            resize: Debouncer::new(RESIZE_DEBOUNCE),
        };
        adapter.send_params();
        adapter
    }

    /// Configuration currently in force.
    pub fn config(&self) -> &LogoConfig {
        &self.config
    }

    /// Size last forwarded to the host.
    pub fn surface(&self) -> Option<Dims> {
        self.surface
    }

    fn send(&self, msg: ControlMessage) {
        let Some(host) = self.host.as_ref() else {
            return;
        };
        if let Err(err) = host.send(msg) {
            warn!(%err, "control message not delivered");
        }
    }

    fn send_params(&self) {
        self.send(ControlMessage::SetParams {
            params: self.config.params.clone(),
            mode: self.config.mode(),
        });
    }

    /// Reports the measured display size in physical pixels.
    ///
    /// Safe to call on every UI update: only a change from the previous
    /// measurement feeds the resize debounce.
    pub fn observe_size(&mut self, measured: (u32, u32), now: Instant) {
        if self.observed == Some(measured) {
            return;
        }
        self.observed = Some(measured);
        if let Some(measured) = self.resize.call(measured, now) {
            self.apply_size(measured);
        }
    }

    fn apply_size(&mut self, measured: (u32, u32)) {
        self.measured = Some(measured);
        let Some(dims) = desired_size(measured, self.config.square) else {
            debug!(?measured, "ignoring empty surface");
            return;
        };
        if self.surface == Some(dims) {
            return;
        }
        self.surface = Some(dims);
        self.send(ControlMessage::Resize {
            width: dims.width,
            height: dims.height,
        });
    }

    /// Replaces the configuration, forwarding whatever the host needs to
    /// know about.
    ///
    /// In static mode the host only renders on resize, so the current surface
    /// is sent again to get a frame reflecting the new parameters.
    pub fn set_config(&mut self, config: LogoConfig) {
        if config == self.config {
            return;
        }
        let was_static = self.config.mode() == RenderMode::Static;
        let params_changed = config.params != self.config.params || config.mode() != self.config.mode();
        let square_changed = config.square != self.config.square;
        self.config = config;

        if params_changed {
            self.send_params();
            if was_static && let Some(dims) = self.surface {
                self.send(ControlMessage::Resize {
                    width: dims.width,
                    height: dims.height,
                });
            }
        }
        if square_changed && let Some(measured) = self.measured {
            self.apply_size(measured);
        }
    }

    /// Flushes a settled resize and returns the newest frame from the host.
    pub fn poll(&mut self, now: Instant) -> Option<Frame> {
        if let Some(measured) = self.resize.poll(now) {
            self.apply_size(measured);
        }
        self.host.as_ref().and_then(HostHandle::latest_frame)
    }
}

impl Drop for DisplayAdapter {
    fn drop(&mut self) {
        self.send(ControlMessage::Stop);
        if let Some(host) = self.host.take() {
            host.shutdown();
        }
    }
}
