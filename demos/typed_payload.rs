//! # Typed Payload Example
//!
//! Shows per-observer payload whitelists. One observer accepts the property-list
//! baseline plus a named record type; another accepts strings only and therefore
//! receives the notification without its payload. `LogWriter` reports the rejected
//! decode through `tracing`.
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example typed_payload --features logging
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use groupcast::{AllowedTypes, LocalHub, LogWriter, Notification, TypeTag, UserInfo, Value};
use tracing_subscriber::EnvFilter;

const GROUP: &str = "group.com.example.tasks";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let hub = LocalHub::new();
    hub.grant(GROUP);
    let center = hub.center(GROUP)?;
    let _log = LogWriter::spawn(&center);

    let with_records = AllowedTypes::property_list().with(TypeTag::record("Task"));
    center.add_observer_fn_allowing(Some("task.updated"), None, with_records, None, |note| {
        println!("[full] payload={:?}", note.user_info());
    });
    center.add_observer_fn_allowing(
        Some("task.updated"),
        None,
        AllowedTypes::new([TypeTag::String]),
        None,
        |note| println!("[strings-only] payload={:?}", note.user_info()),
    );

    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), Value::from("write docs"));
    fields.insert("done".to_string(), Value::from(false));

    let mut info = UserInfo::new();
    info.insert("task".into(), Value::record("Task", fields));
    info.insert("by".into(), Value::from("editor"));

    center.post(Notification::new("task.updated").with_object("t-42").with_user_info(info))?;

    // in-process references never cross the group boundary
    let local = Notification::new("task.updated").with_entry("handle", Value::local(vec![1u8, 2, 3]));
    if let Err(e) = center.post(local) {
        println!("[post refused] {e} ({})", e.as_label());
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
