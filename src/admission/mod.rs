//! Admission control logic and per-client window state.

mod controller;
mod registry;
mod window;

pub use controller::{AdmissionController, Decision};
pub use registry::WindowRegistry;
pub use window::ClientWindow;
