//! # Pelorus Kernel
//!
//! The `kernel` module ties the subsystems together.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Plugin host**: [`PluginHost`](host::PluginHost) owns the plugin
//!   registry, the UI contribution registry and the message bus, routes host
//!   events to plugins and applies the requests plugins queue.
//! - **Core Constants**: Provides system-wide constants via the `constants` submodule.
//! - **Error Handling**: Defines the aggregate [`Error`](error::Error) and
//!   a `Result` type alias in the `error` submodule.
pub mod constants;
pub mod error;
pub mod host;

pub use error::{Error, Result};
pub use host::PluginHost;
