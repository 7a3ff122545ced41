//! Client-side dispatch of named commands to a dashboard backend.
//!
//! A [`DispatchClient`](dispatcher::DispatchClient) owns the correlation
//! table; per-module facades in [`services`] build envelopes on top of it.

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod notify;
pub mod outcome;
pub mod paths;
pub mod services;
pub mod transport;
