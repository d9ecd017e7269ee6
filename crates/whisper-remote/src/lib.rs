//! GhostWhisper remote: keeps a local mirror of the player's program, volume
//! and connection state while sending it commands over HTTP.
//!
//! Everything hangs off one [`context::AppContext`]: the gateway, the
//! mutation guard, the program state machine, the station directory, the
//! status cache and the poll session.  Actions and the poll loop both go
//! through it, so there are no process-wide globals.

pub mod actions;
pub mod console;
pub mod context;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod notify;
pub mod poller;
pub mod program;
pub mod stations;

pub use context::AppContext;
pub use error::{ClientError, NetworkCause};
