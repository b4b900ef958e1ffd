//! Notifications as posted/delivered and as staged on the wire.
//!
//! - [`Notification`] what posters build and observers receive (decoded payload).
//! - [`Envelope`] the immutable transport form (encoded payload bytes).

mod envelope;
mod note;

pub use envelope::Envelope;
pub use note::Notification;
