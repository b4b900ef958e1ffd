//! Center core: configuration, construction and the public entry point.
//!
//! - [`Config`] settings shared by every component of one center
//! - [`CenterBuilder`] validates the group, subscribes to its signal and wires the
//!   dispatch table, delivery pipeline and group channel together
//! - [`NotificationCenter`] registration, removal and posting

mod builder;
mod center;
mod config;

pub use builder::CenterBuilder;
pub use center::NotificationCenter;
pub use config::Config;
