//! Domain services used by websocket and HTTP routes.
//!
//! Service modules own relay rules and persistence so route handlers stay
//! focused on protocol translation and auth plumbing.

pub mod auth;
pub mod room;
pub mod shapes;
