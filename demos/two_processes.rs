//! # Two Processes Example
//!
//! Two centers attached to one `LocalHub` group stand in for two processes of an
//! app group. The editor posts `sync` notifications; the viewer observes them through
//! a target observer and a closure sharing one serial queue.
//!
//! ## Run
//! ```bash
//! cargo run --example two_processes
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use groupcast::{LocalHub, Notification, Observe, Value};

const GROUP: &str = "group.com.example.notes";

struct Viewer {
    seen: AtomicU32,
}

#[async_trait::async_trait]
impl Observe for Viewer {
    async fn on_notification(&self, note: &Notification) {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        let rev = note.user_info().and_then(|u| u.get("rev")).and_then(Value::as_i64);
        println!("[viewer #{n}] {} object={:?} rev={rev:?}", note.name(), note.object());
    }

    fn name(&self) -> &'static str {
        "viewer"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let hub = LocalHub::new();
    hub.grant(GROUP);

    let editor = hub.center(GROUP)?;
    let viewer_center = hub.center(GROUP)?;

    let viewer = Arc::new(Viewer {
        seen: AtomicU32::new(0),
    });
    viewer_center.add_observer(&viewer, Some("sync"), None);

    let main_queue = viewer_center.queue("main");
    let token = viewer_center.add_observer_fn(Some("sync"), Some("doc1"), Some(&main_queue), |note| {
        println!("[doc1 watcher] {} for {:?}", note.name(), note.object());
    });

    for rev in 1..=3 {
        let object = if rev % 2 == 1 { "doc1" } else { "doc2" };
        let key = editor.post(
            Notification::new("sync")
                .with_object(object)
                .with_entry("rev", Value::from(rev)),
        )?;
        println!("[editor] posted rev={rev} key={key}");
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    viewer_center.remove_token(token);
    viewer_center.remove_observer(&viewer);
    editor.post_name("sync", Some("doc1"))?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!();
    println!("Viewer deliveries: {}", viewer.seen.load(Ordering::Relaxed));
    Ok(())
}
