//! Request handlers

pub mod subscribe;

pub use subscribe::{SubscribeState, subscribe_handler};
