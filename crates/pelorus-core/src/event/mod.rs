//! # Pelorus Event Routing
//!
//! Typed host events ([`HostEvent`]) and the [`CapabilityDispatcher`] that
//! fans them out to plugins according to their declared capabilities.
pub mod dispatcher;
pub mod error;
pub mod types;

pub use dispatcher::{CapabilityDispatcher, DispatchReport};
pub use error::EventSystemError;
pub use types::{ActiveLeg, ColorScheme, HostEvent, KeyEvent, MouseEvent, PositionFix, ViewPort};
