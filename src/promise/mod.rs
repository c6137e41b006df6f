//! Asynchronous single-assignment results
//!
//! [`AsyncResult`] is the hand-off contract between chunk generation and its
//! consumers; [`fan_in`] composes many of them into one.

pub mod result;
pub mod fan_in;

pub use result::{AsyncResult, Callback, Settler};
pub use fan_in::{Dispose, join_list, map_list, map_map, map_set};
