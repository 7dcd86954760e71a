//! Client state toolkit for the spider admin UI
//!
//! Framework-agnostic primitives the admin views are built from:
//!
//! - **[`utils`]** - pure collection helpers (toggles, ids, circular navigation)
//! - **[`selection`]** - multi-selection over a caller-owned list
//! - **[`click_outside`]** - dropdown "click outside closes me" logic
//! - **[`connection`]** - one socket session with a typed envelope protocol
//! - **[`spider_detail`]** - the spider detail view model built on all of the above
//!
//! Everything runs on a single cooperative event loop. State holders use
//! `Rc`/`RefCell` and are not `Send`; only socket transport tasks cross threads.

pub mod click_outside;
pub mod config;
pub mod connection;
pub mod dataflow;
pub mod dom_events;
pub mod error;
pub mod format_utils;
pub mod selection;
pub mod spider_detail;
pub mod utils;

pub use click_outside::{ClickGuard, OutsideClickDetector};
pub use connection::{SocketListeners, SocketSession, SocketState};
pub use error::{ToolkitError, ToolkitResult};
pub use selection::{SelectionManager, SharedSequence};
