//! Relay core and the task that drives it.
//!
//! * [`core`] - lifecycle callbacks and request handling over the three stores
//! * [`events`] - the dashboard event and request vocabulary
//! * [`actor`] - the single task that serializes every callback

pub mod actor;
pub mod core;
pub mod events;

pub use actor::{channel, RelayActor, RelayEvent, RelayHandle};
pub use core::RelayCore;
pub use events::{DashboardEvent, DashboardRequest, SessionId};
