mod client;
mod coordinator;
mod session;

pub use client::*;
pub use coordinator::*;
pub use session::*;

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

/// Home Assistant announces itself here with `online` after a restart.
pub const HOME_ASSISTANT_STATUS_TOPIC: &str = "homeassistant/status";
