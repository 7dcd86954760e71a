//! Change streams for toolkit state
//!
//! State holders in this crate are read through plain getters; whoever needs
//! to react to changes subscribes to the holder's relay instead of polling.
//!
//! - **[`Relay`]** - single-subscriber event stream on an unbounded channel

pub mod relay;

pub use relay::{Relay, relay};
