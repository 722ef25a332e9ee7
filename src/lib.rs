//! Sync core of the mining backend monitoring console.
//!
//! [`api`] talks to the administration API behind a bearer-token session; [`sync`] keeps the
//! per-host log streams and chain snapshots pulled from it.

pub mod api;
pub mod config;
pub mod sync;
