//! HTTP surface: the subscribe endpoint and the static front-end

pub mod handlers;
