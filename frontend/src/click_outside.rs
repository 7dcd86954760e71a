//! Dropdown open/closed state that closes on clicks elsewhere in the document.
//!
//! A mounted detector owns exactly one document listener through its
//! [`ClickGuard`]. Dropping the guard is the unmount; it detaches the listener
//! on every exit path. Concurrent detectors subscribe independently and each
//! classifies clicks on its own.

use crate::dataflow::Relay;
use crate::dom_events::{ClickEvent, ClickTarget, DocumentEvents, ListenerGuard};
use futures::channel::mpsc::UnboundedReceiver;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Dropdown chrome that never closes the menu when clicked.
pub const IGNORED_MARKERS: [&str; 3] = ["dropdown-header", "dropdown-input", "dropdown-divider"];

/// The control that opens and closes the menu itself.
pub const TOGGLE_MARKER: &str = "dropdown-toggle";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Ignored(&'static str),
    Toggle,
    Outside,
}

pub fn classify(target: &ClickTarget) -> TargetKind {
    if let Some(marker) = IGNORED_MARKERS
        .iter()
        .find(|marker| target.has_class(marker))
    {
        return TargetKind::Ignored(*marker);
    }
    if target.has_class(TOGGLE_MARKER) {
        TargetKind::Toggle
    } else {
        TargetKind::Outside
    }
}

type Hook = Box<dyn Fn(&ClickEvent)>;

#[derive(Default)]
pub struct OutsideClickDetector {
    on_before: Option<Hook>,
    on_after: Option<Hook>,
}

impl OutsideClickDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs for every document click, before classification.
    pub fn on_before(mut self, hook: impl Fn(&ClickEvent) + 'static) -> Self {
        self.on_before = Some(Box::new(hook));
        self
    }

    /// Runs after a click that was not on ignored chrome.
    pub fn on_after(mut self, hook: impl Fn(&ClickEvent) + 'static) -> Self {
        self.on_after = Some(Box::new(hook));
        self
    }

    /// Starts closed and attaches the document listener.
    pub fn mount(self, events: Rc<dyn DocumentEvents>) -> ClickGuard {
        let state = Rc::new(DropdownState {
            show: Cell::new(false),
            visibility_changed_relay: RefCell::new(Relay::default()),
            on_before: self.on_before,
            on_after: self.on_after,
        });

        let handler_state = state.clone();
        let listener = ListenerGuard::attach(
            events,
            Rc::new(move |event: &ClickEvent| handler_state.handle_document_click(event)),
        );

        ClickGuard { state, listener }
    }
}

struct DropdownState {
    show: Cell<bool>,
    visibility_changed_relay: RefCell<Relay<bool>>,
    on_before: Option<Hook>,
    on_after: Option<Hook>,
}

impl DropdownState {
    fn handle_document_click(&self, event: &ClickEvent) {
        if let Some(hook) = &self.on_before {
            hook(event);
        }

        match classify(&event.target) {
            TargetKind::Ignored(marker) => {
                log::trace!("Click on {} ignored by dropdown", marker);
                return;
            }
            TargetKind::Toggle => {}
            TargetKind::Outside => self.set_show(false),
        }

        if let Some(hook) = &self.on_after {
            hook(event);
        }
    }

    fn set_show(&self, show: bool) {
        if self.show.replace(show) != show {
            self.visibility_changed_relay.borrow().send(show);
        }
    }
}

/// A mounted detector. Dropping it unmounts.
pub struct ClickGuard {
    state: Rc<DropdownState>,
    listener: ListenerGuard,
}

impl ClickGuard {
    pub fn is_open(&self) -> bool {
        self.state.show.get()
    }

    /// Flips Closed <-> Open; bound to the toggle control's own click.
    pub fn toggle_open(&self) {
        self.state.set_show(!self.state.show.get());
    }

    pub fn is_mounted(&self) -> bool {
        self.listener.is_attached()
    }

    pub fn visibility_changes(&self) -> UnboundedReceiver<bool> {
        self.state.visibility_changed_relay.borrow_mut().subscribe()
    }

    /// Explicit unmount; equivalent to dropping the guard.
    pub fn unmount(mut self) {
        self.listener.release();
    }
}
