//! Registry orchestration: validate, persist, log events, resolve health.

mod advice;
mod probe;
mod registry;

pub use portal_types::RegistryError;
pub use probe::{FixedProbe, SimulatedProbe};
pub use registry::Registry;
