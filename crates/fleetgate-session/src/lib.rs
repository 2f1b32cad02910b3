//! Client sessions for fleetgate.
//!
//! 1. **Registry**: who is logged in ([`SessionRegistry`], keyed by
//!    [`SessionToken`](fleetgate_protocol::SessionToken))
//! 2. **Events**: what each session has not fetched yet ([`EventBuffer`],
//!    filled by the [`EventBroadcaster`])
//! 3. **Reaping**: closing sessions nobody uses any more ([`SessionReaper`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway (above)  ← login/logout, the permission gate, pollEvents
//!     ↕
//! Session Layer (this crate)  ← one mutex-guarded registry, shared by
//!     ↕                          handlers, broadcaster and reaper
//! Protocol Layer (below)  ← SessionToken, PermissionSet, Event, EventFilter
//! ```

mod broadcast;
mod buffer;
mod error;
mod reaper;
mod registry;
mod session;

pub use broadcast::EventBroadcaster;
pub use buffer::EventBuffer;
pub use error::SessionError;
pub use reaper::{ReaperHandle, SessionReaper};
pub use registry::{SessionRegistry, SharedRegistry};
pub use session::{EvictedSession, Session};

pub use fleetgate_sweep::SweepConfig;
