//! Orb and gas particle simulation behind the animated logo.
//!
//! Main components:
//! - [`types`] — node, identifier and surface types.
//! - [`config`] — simulation parameters and display configuration.
//! - [`geometry`] — orb placement and minimum spanning trees.
//! - [`forces`] — link, bounce and surface forces.
//! - [`simulation`] — seeding and energy-conserving integration.
//! - [`render`] — software rasterizer producing RGBA frames.
//! - [`host`] — the background loop driven by control messages.
//! - [`error`] — error types.

pub mod config;
pub mod error;
pub mod forces;
pub mod geometry;
pub mod host;
pub mod render;
pub mod simulation;
pub mod types;

pub use config::{LogoConfig, ObjectFit, RenderMode, Rgba, SimulationParams};
pub use host::{ControlMessage, HostHandle, HostState, SimulationHost, spawn_host};
pub use render::Frame;
pub use types::Dims;
