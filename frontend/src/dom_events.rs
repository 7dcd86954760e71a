//! Document-level click events, injected into widgets as a capability.
//!
//! Widgets never reach for a global event source; they are handed something
//! implementing [`DocumentEvents`] and hold their subscription in a
//! [`ListenerGuard`], which releases it exactly once.

use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::rc::Rc;

/// Element a click landed on, described by its class markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickTarget {
    classes: IndexSet<String>,
}

impl ClickTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whitespace separated `class` attribute.
    pub fn from_class_attr(attr: &str) -> Self {
        Self {
            classes: attr.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub target: ClickTarget,
}

impl ClickEvent {
    pub fn on(target: ClickTarget) -> Self {
        Self { target }
    }
}

pub type ClickHandler = Rc<dyn Fn(&ClickEvent)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Subscribe/unsubscribe capability over the document click stream.
pub trait DocumentEvents {
    fn subscribe(&self, handler: ClickHandler) -> ListenerId;

    /// Returns false when `id` was not subscribed.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// In-process document event source. Handlers run in subscription order and
/// may subscribe or unsubscribe while a click is being dispatched.
#[derive(Default)]
pub struct EventBus {
    inner: RefCell<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: IndexMap<ListenerId, ClickHandler>,
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    pub fn dispatch(&self, event: &ClickEvent) {
        let snapshot: Vec<(ListenerId, ClickHandler)> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(id, handler)| (*id, handler.clone()))
            .collect();

        for (id, handler) in snapshot {
            // skip listeners removed by an earlier handler in this dispatch
            if !self.inner.borrow().listeners.contains_key(&id) {
                continue;
            }
            handler(event);
        }
    }
}

impl DocumentEvents for EventBus {
    fn subscribe(&self, handler: ClickHandler) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner.listeners.insert(id, handler);
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.shift_remove(&id).is_some()
    }
}

/// Scoped subscription: attached on creation, detached on `release` or drop,
/// whichever comes first, including unwinding.
pub struct ListenerGuard {
    events: Rc<dyn DocumentEvents>,
    id: Option<ListenerId>,
}

impl ListenerGuard {
    pub fn attach(events: Rc<dyn DocumentEvents>, handler: ClickHandler) -> Self {
        let id = events.subscribe(handler);
        log::debug!("Attached document listener {:?}", id);
        Self {
            events,
            id: Some(id),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    pub fn release(&mut self) {
        if let Some(id) = self.id.take() {
            if !self.events.unsubscribe(id) {
                log::warn!("Document listener {:?} was already gone", id);
            }
            log::debug!("Released document listener {:?}", id);
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_handler(counter: &Rc<Cell<u32>>) -> ClickHandler {
        let counter = counter.clone();
        Rc::new(move |_event: &ClickEvent| counter.set(counter.get() + 1))
    }

    #[test]
    fn class_attr_parsing() {
        let target = ClickTarget::from_class_attr("  btn dropdown-toggle\tbtn ");
        assert!(target.has_class("dropdown-toggle"));
        assert!(!target.has_class("dropdown"));
        assert_eq!(target.classes().collect::<Vec<_>>(), vec!["btn", "dropdown-toggle"]);
    }

    #[test]
    fn guard_releases_exactly_once() {
        let bus = EventBus::new();
        let counter = Rc::new(Cell::new(0));

        let mut guard = ListenerGuard::attach(bus.clone(), counting_handler(&counter));
        assert_eq!(bus.listener_count(), 1);

        bus.dispatch(&ClickEvent::on(ClickTarget::new()));
        guard.release();
        guard.release();
        drop(guard);

        bus.dispatch(&ClickEvent::on(ClickTarget::new()));
        assert_eq!(counter.get(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn handler_can_unsubscribe_a_later_listener_mid_dispatch() {
        let bus = EventBus::new();
        let counter = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<ListenerGuard>>> = Rc::new(RefCell::new(None));

        let victim_slot = victim.clone();
        let _first = ListenerGuard::attach(
            bus.clone(),
            Rc::new(move |_event: &ClickEvent| {
                victim_slot.borrow_mut().take();
            }),
        );
        *victim.borrow_mut() = Some(ListenerGuard::attach(bus.clone(), counting_handler(&counter)));

        bus.dispatch(&ClickEvent::on(ClickTarget::new()));

        assert_eq!(counter.get(), 0);
        assert_eq!(bus.listener_count(), 1);
    }
}
