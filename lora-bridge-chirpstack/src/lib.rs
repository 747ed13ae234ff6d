//! ChirpStack v4 adapter: implements the bridge's network-server
//! capability surface over ChirpStack's gRPC API.
//!
//! Authentication is a one-shot login performed at connect time; the
//! returned JWT is attached as bearer metadata to every subsequent
//! call. The adapter also bootstraps its tenant and application on
//! connect, reusing the first existing one and creating it only when
//! the server has none.

mod client;
mod stream;

pub use client::ChirpStackClient;
