//! WebSocket sessions.
//!
//! Text frames map to [`FrameKind::Text`](tether_core::FrameKind) and
//! binary frames to [`FrameKind::Binary`](tether_core::FrameKind). Pings
//! and pongs are answered by the underlying library and never surface as
//! frames.

#[cfg(feature = "ws-client")]
mod client;
#[cfg(feature = "ws-client")]
pub use client::{TungsteniteSession, connect};

#[cfg(feature = "ws-server")]
mod server;
#[cfg(feature = "ws-server")]
pub use server::{AxumSession, ListenerHandle, listen, router};
