//! Per-process dispatch: observers, entries and the table that matches them.
//!
//! ## Contents
//! - [`Observe`], [`ObserverFn`] the uniform callback interface (targets and closures)
//! - [`ObserverId`] identity of a target observer (bulk removal)
//! - [`ObserverEntry`] one registration: filters, whitelist, queue, callback
//! - [`DispatchTable`], [`ObserverToken`] arena of entries behind one `RwLock`
//!
//! ## Matching
//! ```text
//! entry selected  ⇔  (entry.name   is None or == envelope.name)
//!                 ∧  (entry.object is None or == envelope.object)
//! ```

mod entry;
mod observer;
mod table;

pub use observer::{Observe, ObserverFn, ObserverId};
pub use table::ObserverToken;

pub(crate) use entry::{ObserverEntry, Owner, Registration};
pub(crate) use observer::Callback;
pub(crate) use table::DispatchTable;
