//! # engine_messenger
//!
//! In-process publish/subscribe for the ECS runtime.
//!
//! This crate provides:
//!
//! - [`Messenger`]: a registry of listeners keyed by message type, each
//!   channel kept in ascending priority order.
//! - [`Messaging`]: the capability a context type implements to dispatch
//!   messages to its own listeners with `&mut` access to itself.
//! - [`ListenerId`]: the handle returned on registration and used to remove
//!   a listener.
//!
//! Delivery is synchronous. Handlers may add or remove listeners and dispatch
//! further messages while a dispatch is in flight.

pub mod messenger;

pub use messenger::{Handler, ListenerId, Messaging, Messenger};
