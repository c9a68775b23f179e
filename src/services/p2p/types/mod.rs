//! WiFi Direct session types.

pub mod flags;
pub mod states;
pub mod wfd;
pub mod wps;

pub use flags::*;
pub use states::*;
pub use wfd::*;
pub use wps::*;
