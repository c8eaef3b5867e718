//! Fixed-window admission logic and per-identifier state.

mod admission;
mod clock;
mod counter;
mod policy;
mod store;

pub use admission::{AdmissionBackend, AdmissionService, Decision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::WindowCounter;
pub use policy::{Policy, PolicyHandle, DEFAULT_PERMIT_LIMIT, DEFAULT_TIME_WINDOW};
pub use store::{CounterStore, FixedWindowStore};
