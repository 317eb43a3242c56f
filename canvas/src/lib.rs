//! Client-side shape store for a shared drawing room.
//!
//! The crate is sans-IO: it never touches a socket or an HTTP client. Hosts
//! feed it local gestures, relay envelopes, and storage completions, and
//! carry out the [`engine::Action`]s it returns. Local edits show up
//! immediately; creations live under negative placeholder ids until the relay
//! echoes them back with a storage id.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Per-room engine: reconciliation, gestures, returned actions |
//! | [`doc`] | Ordered shape list and the correlation-token table |
//! | [`input`] | Tools and the gesture state machine |
//! | [`hit`] | Hit-testing against shape payloads |
//! | [`consts`] | Shared numeric constants (tolerances, placeholder seed) |

pub mod consts;
pub mod doc;
pub mod engine;
pub mod hit;
pub mod input;
