//! Spider detail view model: proxy editor plus live run status.

use crate::connection::{ConnectionId, SocketListeners, SocketSession};
use crate::error::ToolkitResult;
use crate::selection::{SelectionManager, SharedSequence};
use crate::utils::{exists_by_key, next_id, toggle_by_key};
use shared::{DownMsg, Proxy, UpMsg};
use std::cell::RefCell;
use std::rc::Rc;

/// Socket path streaming run status for one spider.
pub fn run_status_path(spider_id: u64) -> String {
    format!("/ws/spiders/{}", spider_id)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatus {
    pub running: bool,
    pub last_push: Option<DownMsg>,
    pub last_error: Option<String>,
}

impl RunStatus {
    fn apply(&mut self, push: DownMsg) {
        self.running = push.is_running();
        if let DownMsg::RunFailed { error, .. } = &push {
            self.last_error = Some(error.clone());
        }
        self.last_push = Some(push);
    }
}

pub struct SpiderDetail {
    spider_id: u64,
    proxies: SharedSequence<Proxy>,
    proxy_selection: SelectionManager<Proxy>,
    status: Rc<RefCell<RunStatus>>,
    session: SocketSession,
}

impl SpiderDetail {
    /// Starts with one blank proxy row, like a fresh editor form.
    pub fn new(spider_id: u64, session: SocketSession) -> Self {
        let proxies: SharedSequence<Proxy> = Rc::new(RefCell::new(vec![Proxy::empty(1)]));
        Self {
            spider_id,
            proxy_selection: SelectionManager::new(proxies.clone()),
            proxies,
            status: Rc::new(RefCell::new(RunStatus::default())),
            session,
        }
    }

    pub fn spider_id(&self) -> u64 {
        self.spider_id
    }

    pub fn session(&self) -> &SocketSession {
        &self.session
    }

    pub fn proxies(&self) -> Vec<Proxy> {
        self.proxies.borrow().clone()
    }

    /// Appends a blank proxy row and returns its id.
    pub fn add_proxy(&mut self) -> ToolkitResult<u64> {
        let id = next_id(self.proxies.borrow().as_slice())?;
        self.proxies.borrow_mut().push(Proxy::empty(id));
        Ok(id)
    }

    pub fn update_proxy(&mut self, id: u64, netloc: Option<String>, address: Option<String>) -> bool {
        let mut proxies = self.proxies.borrow_mut();
        match proxies.iter_mut().find(|proxy| proxy.id == id) {
            Some(proxy) => {
                proxy.netloc = netloc;
                proxy.address = address;
                true
            }
            None => false,
        }
    }

    pub fn proxy_exists(&self, id: u64) -> bool {
        exists_by_key(self.proxies.borrow().as_slice(), |proxy| proxy.id, &id)
    }

    /// Adds `proxy`, or removes the row with the same id.
    pub fn toggle_proxy(&mut self, proxy: Proxy) {
        toggle_by_key(&mut *self.proxies.borrow_mut(), proxy, |proxy| proxy.id);
        // positions shifted
        self.proxy_selection.invalidate();
    }

    pub fn select_proxy(&mut self, position: usize) {
        self.proxy_selection.simple_select(position);
    }

    pub fn proxy_selection(&mut self) -> &mut SelectionManager<Proxy> {
        &mut self.proxy_selection
    }

    pub fn selected_proxies(&self) -> Vec<Proxy> {
        self.proxy_selection.selected_items()
    }

    /// Removes every selected row and clears the selection.
    pub fn remove_selected_proxies(&mut self) -> usize {
        let mut positions = self.proxy_selection.selected().to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));

        let mut removed = 0;
        {
            let mut proxies = self.proxies.borrow_mut();
            for position in positions {
                if position < proxies.len() {
                    proxies.remove(position);
                    removed += 1;
                }
            }
        }
        self.proxy_selection.invalidate();
        removed
    }

    /// Subscribes to run-status pushes for this spider. Pushes for other
    /// spiders and undecodable frames are skipped.
    pub fn watch(&self) -> ToolkitResult<ConnectionId> {
        let spider_id = self.spider_id;
        let message_status = self.status.clone();
        let error_status = self.status.clone();

        let listeners = SocketListeners::new()
            .on_open(move || log::info!("Watching spider {}", spider_id))
            .on_message(move |text| match serde_json::from_str::<DownMsg>(text) {
                Ok(push) if push.spider_id() == spider_id => {
                    log::debug!("Spider {} pushed {:?}", spider_id, push);
                    message_status.borrow_mut().apply(push);
                }
                Ok(push) => log::debug!("Skipping push for spider {}", push.spider_id()),
                Err(error) => log::warn!("Undecodable run status push `{}`: {}", text, error),
            })
            .on_error(move |error| {
                let mut status = error_status.borrow_mut();
                status.running = false;
                status.last_error = Some(error.to_string());
            })
            .on_close(move |info| log::info!("Stopped watching spider {} ({:?})", spider_id, info.code));

        self.session.connect(&run_status_path(spider_id), listeners)
    }

    /// Sends `{"type":"run","spiderId":N}` and marks the spider as running.
    pub fn run_spider(&self) -> ToolkitResult<String> {
        let wire = self
            .session
            .send_message(&UpMsg::Run { spider_id: self.spider_id }.to_envelope())?;
        let mut status = self.status.borrow_mut();
        status.running = true;
        status.last_error = None;
        Ok(wire)
    }

    pub fn stop_spider(&self) -> ToolkitResult<String> {
        self.session
            .send_message(&UpMsg::Stop { spider_id: self.spider_id }.to_envelope())
    }

    pub fn status(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().running
    }
}
