// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod autoplay;
pub mod clock;
pub mod config;
pub mod history;
pub mod layout;
pub mod logging;
pub mod runtime;
pub mod session;
pub mod timers;

pub use layout::{Board, Geometry, Token, Visibility};
pub use session::{ClickOutcome, GameSession, Phase, Snapshot};
