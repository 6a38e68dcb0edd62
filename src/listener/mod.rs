//! Block event listener subsystem.
//!
//! # Data Flow
//! ```text
//! middleware WebSocket
//!     → stream.rs (connect, subscribe, read frames, reconnect)
//!     → events.rs (classify frame; only key blocks pass)
//!     → callback (one sweep per key block, in arrival order)
//! ```
//!
//! # Design Decisions
//! - One connection, one handler; a sweep finishes before the next frame is read
//! - Malformed frames are logged and dropped at the boundary
//! - Reconnect is bounded and configurable

pub mod events;
pub mod stream;

pub use events::{parse_frame, subscribe_frame, BlockEvent, FrameError, InboundFrame};
pub use stream::{BlockListener, ListenerError, ListenerExit, ListenerSettings};
