//! # Notification center.
//!
//! [`NotificationCenter`] is the public entry point: it owns the dispatch table of
//! its process, the delivery queues it created and its group channel.
//!
//! ```text
//! post(note) ──encode──► Envelope ──► GroupChannel::broadcast ──► staged + signalled
//!                                                                      │
//!            every center of the group (this one included) ◄───────────┘
//!                 listener ──► fetch ──► DispatchTable::matching ──► DeliveryPipeline
//! ```
//!
//! Posting never runs a callback: even a center that observes its own notifications
//! receives them through the group listener and a delivery queue.
//!
//! Centers are explicitly constructed and owned; any number may coexist in one
//! process. Dropping a center stops its listener; records and signals it already
//! sent are not retracted.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{CenterBuilder, Config};
use crate::delivery::DeliveryQueue;
use crate::dispatch::{
    Callback, DispatchTable, Observe, ObserverEntry, ObserverFn, ObserverId, ObserverToken, Owner,
    Registration,
};
use crate::error::{ConstructionError, PostError};
use crate::events::{Bus, Event, EventKind};
use crate::notification::{Envelope, Notification};
use crate::payload::{AllowedTypes, PayloadCodec, UserInfo};
use crate::transport::{GroupChannel, Signal, StageKey, StagingStore};

/// Cross-process notification center bound to one group.
pub struct NotificationCenter {
    group: Arc<str>,
    cfg: Config,
    codec: PayloadCodec,
    bus: Bus,
    table: Arc<DispatchTable>,
    channel: Arc<GroupChannel>,
    runtime: Handle,
    cancel: CancellationToken,
}

impl NotificationCenter {
    /// Attaches a center with the default configuration to `group`.
    ///
    /// Fails if the identifier is invalid, the caller is not entitled to the group
    /// or no tokio runtime is running.
    pub fn new(
        group: impl Into<String>,
        signal: Arc<dyn Signal>,
        store: Arc<dyn StagingStore>,
    ) -> Result<Self, ConstructionError> {
        Self::builder(group)
            .with_signal(signal)
            .with_store(store)
            .build()
    }

    pub fn builder(group: impl Into<String>) -> CenterBuilder {
        CenterBuilder::new(group)
    }

    pub(crate) fn from_parts(
        group: Arc<str>,
        cfg: Config,
        bus: Bus,
        table: Arc<DispatchTable>,
        channel: Arc<GroupChannel>,
        runtime: Handle,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            group,
            codec: cfg.codec(),
            cfg,
            bus,
            table,
            channel,
            runtime,
            cancel,
        }
    }

    pub fn group_identifier(&self) -> &str {
        &self.group
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Diagnostic events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Number of registered entries.
    pub fn observer_count(&self) -> usize {
        self.table.len()
    }

    /// Creates a serial delivery queue that several registrations can share.
    pub fn queue(&self, label: impl Into<Arc<str>>) -> DeliveryQueue {
        DeliveryQueue::spawn(
            &self.runtime,
            label,
            self.cfg.queue_capacity_clamped(),
            self.bus.clone(),
        )
    }

    // ---- registration ----

    /// Registers `observer` for notifications matching `name` and `object`
    /// (`None` matches anything), decoding payloads with the baseline whitelist.
    ///
    /// The center does not retain `observer`: once the last `Arc` is dropped its
    /// entries stop receiving and are pruned.
    pub fn add_observer<O: Observe>(&self, observer: &Arc<O>, name: Option<&str>, object: Option<&str>) {
        self.add_observer_allowing(observer, name, object, AllowedTypes::default());
    }

    /// Like [`add_observer`](Self::add_observer) with an explicit payload whitelist.
    pub fn add_observer_allowing<O: Observe>(
        &self,
        observer: &Arc<O>,
        name: Option<&str>,
        object: Option<&str>,
        allowed: AllowedTypes,
    ) {
        self.register(
            Owner::Target(ObserverId::of(observer)),
            observer.name(),
            name,
            object,
            allowed,
            None,
            Callback::target(observer),
        );
    }

    /// Registers a closure. Deliveries run on `queue`, or on a private queue when
    /// `None`. Returns the token that removes the registration.
    pub fn add_observer_fn<F>(
        &self,
        name: Option<&str>,
        object: Option<&str>,
        queue: Option<&DeliveryQueue>,
        f: F,
    ) -> ObserverToken
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add_observer_fn_allowing(name, object, AllowedTypes::default(), queue, f)
    }

    pub fn add_observer_fn_allowing<F>(
        &self,
        name: Option<&str>,
        object: Option<&str>,
        allowed: AllowedTypes,
        queue: Option<&DeliveryQueue>,
        f: F,
    ) -> ObserverToken
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.add_handler(name, object, allowed, queue, ObserverFn::arc(f))
    }

    /// Registers a retained handler. The center keeps `handler` alive until the
    /// token is removed.
    pub fn add_handler(
        &self,
        name: Option<&str>,
        object: Option<&str>,
        allowed: AllowedTypes,
        queue: Option<&DeliveryQueue>,
        handler: Arc<dyn Observe>,
    ) -> ObserverToken {
        let label = handler.name();
        self.register(
            Owner::Token,
            label,
            name,
            object,
            allowed,
            queue,
            Callback::Owned(handler),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn register(
        &self,
        owner: Owner,
        label: &'static str,
        name: Option<&str>,
        object: Option<&str>,
        allowed: AllowedTypes,
        queue: Option<&DeliveryQueue>,
        callback: Callback,
    ) -> ObserverToken {
        let queue = match queue {
            Some(q) => q.clone(),
            None => self.queue(label),
        };
        let (token, entry) = self.table.register(Registration {
            owner,
            label: Arc::from(label),
            name: name.map(str::to_owned),
            object: object.map(str::to_owned),
            allowed,
            queue,
            callback,
        });

        tracing::debug!(
            group = %self.group,
            observer = label,
            name = ?entry.name_filter(),
            object = ?entry.object_filter(),
            "observer added"
        );
        let mut ev = Event::new(EventKind::ObserverAdded).with_observer(label);
        if let Some(name) = entry.name_filter() {
            ev = ev.with_name(name);
        }
        self.bus.publish(ev);
        token
    }

    // ---- removal ----

    /// Removes every registration of `observer`. Returns the number removed.
    ///
    /// Deliveries already queued still run; nothing posted afterwards reaches it.
    pub fn remove_observer<O: ?Sized>(&self, observer: &Arc<O>) -> usize {
        self.remove_observer_matching(observer, None, None)
    }

    /// Removes the registrations of `observer` selected by `name` and `object`.
    ///
    /// A `None` filter selects every value; a given filter also selects entries
    /// registered with a wildcard for that field.
    pub fn remove_observer_matching<O: ?Sized>(
        &self,
        observer: &Arc<O>,
        name: Option<&str>,
        object: Option<&str>,
    ) -> usize {
        let removed = self
            .table
            .unregister_observer(ObserverId::of(observer), name, object);
        self.report_removed(&removed);
        removed.len()
    }

    /// Removes the registration behind `token`. Returns `false` for stale tokens.
    pub fn remove_token(&self, token: ObserverToken) -> bool {
        match self.table.unregister(token) {
            Some(entry) => {
                self.report_removed(std::slice::from_ref(&entry));
                true
            }
            None => false,
        }
    }

    fn report_removed(&self, removed: &[Arc<ObserverEntry>]) {
        let Some(first) = removed.first() else {
            return;
        };
        tracing::debug!(group = %self.group, observer = first.label(), count = removed.len(), "observer removed");
        self.bus.publish(
            Event::new(EventKind::ObserverRemoved)
                .with_observer(first.label())
                .with_reason(removed.len().to_string()),
        );
    }

    // ---- posting ----

    /// Posts `note` to every center of the group, this one included.
    ///
    /// The payload is encoded before anything is staged, so an unsupported value
    /// fails here and nothing is sent. Returns once the group has been signalled;
    /// no observer has run yet.
    pub fn post(&self, note: Notification) -> Result<StageKey, PostError> {
        let envelope = Envelope::seal(&note, &self.codec)?;
        let key = self.channel.broadcast(&envelope)?;

        tracing::debug!(group = %self.group, notification = envelope.name(), key = %key, "notification posted");
        self.bus.publish(
            Event::new(EventKind::NotificationPosted)
                .with_name(envelope.name())
                .with_key(key.to_string()),
        );
        Ok(key)
    }

    pub fn post_name(&self, name: &str, object: Option<&str>) -> Result<StageKey, PostError> {
        self.post_name_with(name, object, None)
    }

    pub fn post_name_with(
        &self,
        name: &str,
        object: Option<&str>,
        user_info: Option<UserInfo>,
    ) -> Result<StageKey, PostError> {
        let mut note = Notification::new(name);
        if let Some(object) = object {
            note = note.with_object(object);
        }
        if let Some(info) = user_info {
            note = note.with_user_info(info);
        }
        self.post(note)
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("group", &self.group)
            .field("origin", &self.channel.origin())
            .field("observers", &self.table.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EncodeError, TransportError};
    use crate::payload::{TypeTag, Value};
    use crate::transport::{DirStore, KeyStream, LocalHub, MemoryStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const GROUP: &str = "group.com.example.notes";
    const WAIT: Duration = Duration::from_secs(5);

    struct Inbox {
        tx: mpsc::UnboundedSender<Notification>,
    }

    #[async_trait]
    impl Observe for Inbox {
        async fn on_notification(&self, note: &Notification) {
            let _ = self.tx.send(note.clone());
        }

        fn name(&self) -> &'static str {
            "inbox"
        }
    }

    fn inbox() -> (Arc<Inbox>, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Inbox { tx }), rx)
    }

    fn recorder() -> (
        impl Fn(&Notification) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<Notification>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (move |n: &Notification| drop(tx.send(n.clone())), rx)
    }

    fn granted() -> Arc<LocalHub> {
        let hub = LocalHub::new();
        hub.grant(GROUP);
        hub
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
        timeout(WAIT, rx.recv())
            .await
            .expect("delivery timed out")
            .expect("observer channel closed")
    }

    async fn next_event(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
        timeout(WAIT, async {
            loop {
                let ev = rx.recv().await.expect("event bus closed");
                if ev.kind == kind {
                    return ev;
                }
            }
        })
        .await
        .expect("event timed out")
    }

    #[tokio::test]
    async fn wildcard_object_receives_posted_object() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let (observer, mut rx) = inbox();
        center.add_observer(&observer, Some("A"), None);

        center.post_name("A", Some("x")).unwrap();

        let note = next(&mut rx).await;
        assert_eq!(note.name(), "A");
        assert_eq!(note.object(), Some("x"));
        assert!(note.user_info().is_none());
    }

    #[tokio::test]
    async fn whitelist_violation_drops_payload_for_that_entry_only() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let mut events = center.events();

        let (strict, mut strict_rx) = recorder();
        let (lenient, mut lenient_rx) = recorder();
        center.add_observer_fn_allowing(
            Some("A"),
            None,
            AllowedTypes::new([TypeTag::String]),
            None,
            strict,
        );
        center.add_observer_fn(Some("A"), None, None, lenient);

        let mut info = UserInfo::new();
        info.insert("k".into(), Value::from(42));
        center.post_name_with("A", None, Some(info.clone())).unwrap();

        assert!(next(&mut strict_rx).await.user_info().is_none());
        assert_eq!(next(&mut lenient_rx).await.user_info(), Some(&info));

        let ev = next_event(&mut events, EventKind::DecodeFailed).await;
        assert_eq!(ev.reason.as_deref(), Some("decode_disallowed_type"));

        // the center keeps delivering afterwards
        center.post_name_with("A", None, Some(info)).unwrap();
        assert!(next(&mut strict_rx).await.user_info().is_none());
    }

    #[tokio::test]
    async fn other_process_receives_without_blocking_poster() {
        let hub = granted();
        let p1 = hub.center(GROUP).unwrap();
        let p2 = hub.center(GROUP).unwrap();

        let (observer, mut rx) = inbox();
        p2.add_observer(&observer, Some("sync"), None);

        p1.post_name("sync", Some("doc1")).unwrap();
        // the post has returned but nothing ran yet on this single-threaded runtime
        assert!(rx.try_recv().is_err());

        let note = next(&mut rx).await;
        assert_eq!(note.name(), "sync");
        assert_eq!(note.object(), Some("doc1"));
    }

    #[tokio::test]
    async fn shared_directory_store_carries_posts_between_centers() {
        let dir = tempfile::tempdir().unwrap();
        let hub = granted();
        let attach = || {
            let store = Arc::new(DirStore::open(dir.path()).unwrap());
            hub.attach(GROUP).with_store(store).build().unwrap()
        };
        let p1 = attach();
        let p2 = attach();

        let (observer, mut rx) = inbox();
        p2.add_observer(&observer, Some("sync"), None);

        let key = p1
            .post(
                Notification::new("sync")
                    .with_object("doc1")
                    .with_entry("rev", Value::from(7)),
            )
            .unwrap();
        assert!(dir.path().join(key.to_string()).is_file());

        let note = next(&mut rx).await;
        assert_eq!(note.name(), "sync");
        assert_eq!(note.object(), Some("doc1"));
        assert_eq!(note.user_info().and_then(|u| u["rev"].as_i64()), Some(7));
    }

    #[tokio::test]
    async fn other_groups_do_not_hear_posts() {
        let hub = granted();
        hub.grant("group.other");
        let poster = hub.center(GROUP).unwrap();
        let outsider = hub.center("group.other").unwrap();
        let insider = hub.center(GROUP).unwrap();

        let (out_f, mut out_rx) = recorder();
        let (in_f, mut in_rx) = recorder();
        outsider.add_observer_fn(Some("sync"), None, None, out_f);
        insider.add_observer_fn(Some("sync"), None, None, in_f);

        poster.post_name("sync", None).unwrap();
        next(&mut in_rx).await;
        tokio::task::yield_now().await;
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn callbacks_never_run_inside_post() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let flag = Arc::clone(&ran);
        center.add_observer_fn(None, None, None, move |n: &Notification| {
            flag.store(true, Ordering::SeqCst);
            let _ = done_tx.send(n.clone());
        });

        center.post_name("A", None).unwrap();
        assert!(!ran.load(Ordering::SeqCst));

        next(&mut done_rx).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn removed_observer_gets_nothing_and_new_token_is_unaffected() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let (observer, mut rx) = inbox();
        center.add_observer(&observer, Some("A"), None);
        center.add_observer(&observer, Some("B"), None);
        assert_eq!(center.observer_count(), 2);

        assert_eq!(center.remove_observer(&observer), 2);
        assert_eq!(center.observer_count(), 0);

        let (f, mut later_rx) = recorder();
        let token = center.add_observer_fn(Some("B"), None, None, f);

        center.post_name("A", None).unwrap();
        center.post_name("B", None).unwrap();
        assert_eq!(next(&mut later_rx).await.name(), "B");
        assert!(rx.try_recv().is_err());

        assert!(center.remove_token(token));
        assert!(!center.remove_token(token));
    }

    #[tokio::test]
    async fn filtered_removal_keeps_other_entries() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let (observer, mut rx) = inbox();
        center.add_observer(&observer, Some("A"), Some("doc1"));
        center.add_observer(&observer, Some("B"), None);

        assert_eq!(center.remove_observer_matching(&observer, Some("A"), None), 1);
        assert_eq!(center.remove_observer_matching(&observer, Some("C"), None), 0);

        center.post_name("A", Some("doc1")).unwrap();
        center.post_name("B", Some("doc1")).unwrap();
        assert_eq!(next(&mut rx).await.name(), "B");
    }

    #[tokio::test]
    async fn released_target_is_pruned() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let (observer, rx) = inbox();
        center.add_observer(&observer, Some("A"), None);
        drop(observer);
        drop(rx);

        let (f, mut marker) = recorder();
        center.add_observer_fn(Some("A"), None, None, f);
        center.post_name("A", None).unwrap();
        next(&mut marker).await;
        assert_eq!(center.observer_count(), 1);
    }

    #[tokio::test]
    async fn shared_queue_preserves_post_order() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let queue = center.queue("main");
        let (f, mut rx) = recorder();
        center.add_observer_fn(Some("tick"), None, Some(&queue), f);

        for i in 0..20 {
            center
                .post(Notification::new("tick").with_entry("i", Value::from(i)))
                .unwrap();
        }
        for i in 0..20i64 {
            let note = next(&mut rx).await;
            assert_eq!(note.user_info().and_then(|u| u["i"].as_i64()), Some(i));
        }
    }

    #[tokio::test]
    async fn local_object_fails_synchronously_and_stages_nothing() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let note = Notification::new("A").with_entry("handle", Value::local(7u8));

        let err = center.post(note).unwrap_err();
        assert!(matches!(err, PostError::Encode(EncodeError::Unsupported { .. })));
        assert!(hub.store(GROUP).is_empty());
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        assert!(matches!(center.post_name("", None), Err(PostError::EmptyName)));
    }

    #[tokio::test]
    async fn construction_failures() {
        let hub = LocalHub::new();
        assert!(matches!(
            hub.center(GROUP),
            Err(ConstructionError::NotEntitled { .. })
        ));
        hub.grant(GROUP);
        assert!(matches!(
            hub.center("bad group"),
            Err(ConstructionError::InvalidGroup { .. })
        ));
        assert!(matches!(
            NotificationCenter::builder(GROUP).build(),
            Err(ConstructionError::MissingTransport("signal"))
        ));

        struct Broken;
        impl Signal for Broken {
            fn signal(&self, _: &str, _: &StageKey) -> Result<(), TransportError> {
                Ok(())
            }
            fn subscribe(&self, _: &str) -> Result<KeyStream, TransportError> {
                Err(TransportError::Closed)
            }
        }
        assert!(matches!(
            NotificationCenter::new(GROUP, Arc::new(Broken), Arc::new(MemoryStore::new())),
            Err(ConstructionError::Subscribe(TransportError::Closed))
        ));
    }

    #[test]
    fn construction_needs_a_runtime() {
        let hub = LocalHub::new();
        hub.grant(GROUP);
        assert!(matches!(hub.center(GROUP), Err(ConstructionError::NoRuntime)));
    }

    #[tokio::test]
    async fn independent_centers_share_nothing_but_the_group() {
        let hub = granted();
        let a = hub.center(GROUP).unwrap();
        let b = hub.center(GROUP).unwrap();
        a.add_observer_fn(None, None, None, |_: &Notification| {});
        assert_eq!(a.observer_count(), 1);
        assert_eq!(b.observer_count(), 0);
        assert_eq!(a.group_identifier(), b.group_identifier());
    }

    #[tokio::test]
    async fn dropped_center_stops_listening() {
        let hub = granted();
        let poster = hub.center(GROUP).unwrap();
        let gone = hub.center(GROUP).unwrap();
        let (f, mut rx) = recorder();
        gone.add_observer_fn(None, None, None, f);
        drop(gone);

        let (g, mut alive) = recorder();
        poster.add_observer_fn(None, None, None, g);
        poster.post_name("A", None).unwrap();
        next(&mut alive).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn staged_records_expire_after_ttl() {
        let hub = granted();
        let cfg = Config {
            staging_ttl: Duration::from_secs(2),
            ..Config::default()
        };
        let center = hub.attach(GROUP).with_config(cfg).build().unwrap();
        center.post_name("A", None).unwrap();
        assert_eq!(hub.store(GROUP).len(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(hub.store(GROUP).is_empty());
    }

    #[test]
    fn records_left_by_an_exited_poster_are_swept() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config {
            staging_ttl: Duration::from_millis(200),
            ..Config::default()
        };
        let runtime = || {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
        };

        // the poster's runtime goes away before its expiry task fires
        let poster = runtime();
        poster.block_on(async {
            let center = granted()
                .attach(GROUP)
                .with_config(cfg.clone())
                .with_store(Arc::new(DirStore::open(dir.path()).unwrap()))
                .build()
                .unwrap();
            center.post_name("sync", Some("doc1")).unwrap();
        });
        drop(poster);

        let store = DirStore::open(dir.path()).unwrap();
        assert_eq!(store.keys().unwrap().len(), 1);

        runtime().block_on(async {
            let center = granted()
                .attach(GROUP)
                .with_config(cfg)
                .with_store(Arc::new(store.clone()))
                .build()
                .unwrap();
            center.post_name("sync", Some("doc2")).unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
        });
        assert!(store.keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn posting_publishes_diagnostics() {
        let hub = granted();
        let center = hub.center(GROUP).unwrap();
        let mut events = center.events();
        center.add_observer_fn(Some("A"), None, None, |_: &Notification| {});

        let key = center.post_name("A", None).unwrap();
        let added = next_event(&mut events, EventKind::ObserverAdded).await;
        assert_eq!(added.name.as_deref(), Some("A"));
        let posted = next_event(&mut events, EventKind::NotificationPosted).await;
        assert_eq!(posted.key.as_deref(), Some(key.to_string().as_str()));
        let received = next_event(&mut events, EventKind::NotificationReceived).await;
        assert_eq!(received.reason.as_deref(), Some("1"));
    }
}
