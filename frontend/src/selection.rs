//! Multi-selection over a list owned by the view.
//!
//! The manager records *positions*, never copies of items. After the owner
//! inserts into or removes from the backing list, recorded positions may point
//! at different items; call [`SelectionManager::invalidate`] or
//! [`SelectionManager::retain_valid`] after such edits.

use crate::dataflow::Relay;
use crate::utils::toggle_by_value;
use futures::channel::mpsc::UnboundedReceiver;
use std::cell::RefCell;
use std::rc::Rc;

/// Caller-owned list shared by reference with toolkit components.
pub type SharedSequence<T> = Rc<RefCell<Vec<T>>>;

type Hook<E> = Box<dyn FnMut(&E)>;

pub struct SelectionManager<T, E = ()> {
    items: SharedSequence<T>,
    selected: Vec<usize>,
    on_before: Option<Hook<E>>,
    on_after: Option<Hook<E>>,
    selection_changed_relay: Relay<Vec<usize>>,
}

impl<T, E> SelectionManager<T, E> {
    pub fn new(items: SharedSequence<T>) -> Self {
        Self {
            items,
            selected: Vec::new(),
            on_before: None,
            on_after: None,
            selection_changed_relay: Relay::default(),
        }
    }

    /// Hooks run around [`select_item`](Self::select_item) only.
    pub fn with_hooks(
        items: SharedSequence<T>,
        on_before: impl FnMut(&E) + 'static,
        on_after: impl FnMut(&E) + 'static,
    ) -> Self {
        Self {
            on_before: Some(Box::new(on_before)),
            on_after: Some(Box::new(on_after)),
            ..Self::new(items)
        }
    }

    /// Toggles `position` in response to a UI event, firing both hooks.
    pub fn select_item(&mut self, event: &E, position: usize) {
        if let Some(hook) = self.on_before.as_mut() {
            hook(event);
        }
        self.toggle(position);
        if let Some(hook) = self.on_after.as_mut() {
            hook(event);
        }
    }

    /// Toggles `position` when there is no originating event. No hooks.
    pub fn simple_select(&mut self, position: usize) {
        self.toggle(position);
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.selected.contains(&position)
    }

    /// Selected positions in selection order.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Backing items for the selected positions, in selection order.
    /// Positions past the end of the current list are skipped.
    pub fn selected_items(&self) -> Vec<T>
    where
        T: Clone,
    {
        let items = self.items.borrow();
        self.selected
            .iter()
            .filter_map(|&position| {
                let item = items.get(position).cloned();
                if item.is_none() {
                    log::warn!(
                        "Selected position {} is stale (list has {} items)",
                        position,
                        items.len()
                    );
                }
                item
            })
            .collect()
    }

    pub fn items(&self) -> &SharedSequence<T> {
        &self.items
    }

    /// Clears the selection, e.g. after the owner reordered the list.
    pub fn invalidate(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.selected.clear();
        self.notify();
    }

    /// Drops positions that no longer exist in the backing list.
    pub fn retain_valid(&mut self) {
        let len = self.items.borrow().len();
        let before = self.selected.len();
        self.selected.retain(|&position| position < len);
        if self.selected.len() != before {
            self.notify();
        }
    }

    /// Stream of the full selection after every change.
    pub fn changes(&mut self) -> UnboundedReceiver<Vec<usize>> {
        self.selection_changed_relay.subscribe()
    }

    fn toggle(&mut self, position: usize) {
        toggle_by_value(&mut self.selected, position);
        log::debug!("Selection is now {:?}", self.selected);
        self.notify();
    }

    fn notify(&self) {
        self.selection_changed_relay.send(self.selected.clone());
    }
}

impl<T, E> std::fmt::Debug for SelectionManager<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionManager")
            .field("selected", &self.selected)
            .finish()
    }
}
