//! Synchronous in-process publish/subscribe for playback events.
//!
//! One channel per playthrough; there is no global bus. Handlers run in
//! subscription order on the caller's stack. A handler that fails or
//! panics is reported and skipped, and delivery continues with the rest.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use tracing::{trace, warn};

use crate::schema::event::{EventKind, PlaybackEvent};

/// Error a handler may return to signal that it could not process an event.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Box<dyn FnMut(&PlaybackEvent) -> HandlerResult>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every event.
    filter: Option<EventKind>,
    once: bool,
    handler: Handler,
}

/// A handler that failed during one `emit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub event: EventKind,
    pub reason: String,
}

/// Outcome of one `emit` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Handlers that ran to completion without error.
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl EmitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
pub struct EventChannel {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive events of one kind.
    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&PlaybackEvent) -> HandlerResult + 'static,
    {
        self.add(Some(kind), false, Box::new(handler))
    }

    /// Receive every event.
    pub fn subscribe_all<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&PlaybackEvent) -> HandlerResult + 'static,
    {
        self.add(None, false, Box::new(handler))
    }

    /// Receive the next event of one kind, then unsubscribe automatically.
    pub fn once<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&PlaybackEvent) -> HandlerResult + 'static,
    {
        self.add(Some(kind), true, Box::new(handler))
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Remove handlers for one kind, or every handler when `kind` is `None`.
    ///
    /// Subscribe-all handlers are only removed by a full clear.
    pub fn clear(&mut self, kind: Option<EventKind>) {
        match kind {
            Some(kind) => self.subscriptions.retain(|s| s.filter != Some(kind)),
            None => self.subscriptions.clear(),
        }
    }

    /// Handlers that would receive an event of `kind`, or all handlers for `None`.
    pub fn listener_count(&self, kind: Option<EventKind>) -> usize {
        match kind {
            Some(kind) => self
                .subscriptions
                .iter()
                .filter(|s| s.filter.map_or(true, |f| f == kind))
                .count(),
            None => self.subscriptions.len(),
        }
    }

    /// Deliver an event to every matching handler, in subscription order.
    pub fn emit(&mut self, event: &PlaybackEvent) -> EmitReport {
        let kind = event.kind();
        let mut report = EmitReport::default();
        let mut spent = Vec::new();

        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.filter.map_or(true, |f| f == kind))
        {
            let handler = &mut sub.handler;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
            let reason = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };

            match reason {
                None => report.delivered += 1,
                Some(reason) => {
                    warn!(
                        event = kind.name(),
                        subscription = sub.id.0,
                        reason = %reason,
                        "event_handler_failed"
                    );
                    report.failures.push(HandlerFailure {
                        subscription: sub.id,
                        event: kind,
                        reason,
                    });
                }
            }

            if sub.once {
                spent.push(sub.id);
            }
        }

        if !spent.is_empty() {
            self.subscriptions.retain(|s| !spent.contains(&s.id));
        }

        trace!(event = kind.name(), delivered = report.delivered, "event_emitted");
        report
    }

    /// Subscribe a recorder that keeps every emitted event.
    pub fn recorder(&mut self) -> EventRecorder {
        let recorder = EventRecorder::default();
        let log = Rc::clone(&recorder.events);
        self.subscribe_all(move |event| {
            log.borrow_mut().push(event.clone());
            Ok(())
        });
        recorder
    }

    fn add(&mut self, filter: Option<EventKind>, once: bool, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            filter,
            once,
            handler,
        });
        id
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}

/// Shared log of emitted events. Clones observe the same log.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<PlaybackEvent>>>,
}

impl EventRecorder {
    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.borrow().clone()
    }

    /// Recorded events, emptying the log.
    pub fn take(&self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Wire names of the recorded events, in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(scene: &str) -> PlaybackEvent {
        PlaybackEvent::SceneComplete {
            scene_id: scene.to_string(),
        }
    }

    fn changed(scene: &str) -> PlaybackEvent {
        PlaybackEvent::SceneChanged {
            scene_id: scene.to_string(),
        }
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let mut channel = EventChannel::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            channel.subscribe(EventKind::SceneComplete, move |_| {
                order.borrow_mut().push(tag);
                Ok(())
            });
        }
        let report = channel.emit(&complete("intro"));
        assert_eq!(report.delivered, 3);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn filter_by_kind() {
        let mut channel = EventChannel::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        channel.subscribe(EventKind::SceneChanged, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        channel.emit(&complete("a"));
        channel.emit(&changed("b"));
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn failing_handler_does_not_stop_delivery() {
        let mut channel = EventChannel::new();
        let recorder = EventRecorder::default();
        channel.subscribe_all(|_| Err("renderer offline".into()));
        channel.subscribe_all(|_| panic!("boom"));
        let log = Rc::clone(&recorder.events);
        channel.subscribe_all(move |e| {
            log.borrow_mut().push(e.clone());
            Ok(())
        });

        let report = channel.emit(&complete("intro"));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].reason, "renderer offline");
        assert!(report.failures[1].reason.contains("boom"));
        assert!(!report.is_clean());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut channel = EventChannel::new();
        let recorder = channel.recorder();
        let id = channel.subscribe(EventKind::SceneComplete, |_| Ok(()));
        assert_eq!(channel.listener_count(Some(EventKind::SceneComplete)), 2);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        assert_eq!(channel.listener_count(Some(EventKind::SceneComplete)), 1);
        channel.emit(&complete("intro"));
        assert_eq!(recorder.names(), vec!["scene:complete"]);
    }

    #[test]
    fn once_fires_a_single_time() {
        let mut channel = EventChannel::new();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        channel.once(EventKind::SceneComplete, move |_| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        channel.emit(&changed("a"));
        channel.emit(&complete("a"));
        channel.emit(&complete("b"));
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(channel.listener_count(None), 0);
    }

    #[test]
    fn clear_by_kind_keeps_others() {
        let mut channel = EventChannel::new();
        channel.subscribe(EventKind::SceneComplete, |_| Ok(()));
        channel.subscribe(EventKind::SceneChanged, |_| Ok(()));
        channel.subscribe_all(|_| Ok(()));
        channel.clear(Some(EventKind::SceneComplete));
        assert_eq!(channel.listener_count(None), 2);
        channel.clear(None);
        assert_eq!(channel.listener_count(None), 0);
    }

    #[test]
    fn recorder_take_drains() {
        let mut channel = EventChannel::new();
        let recorder = channel.recorder();
        channel.emit(&complete("a"));
        channel.emit(&changed("b"));
        assert_eq!(recorder.count(EventKind::SceneChanged), 1);
        assert_eq!(recorder.take().len(), 2);
        assert!(recorder.is_empty());
    }
}
