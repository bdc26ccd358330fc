//! RPC-style HTTP endpoints.
//!
//! Every operation lives under `/api/method/{method}` and answers with the
//! envelope described in [`envelope`]. Handlers run on the blocking pool
//! against a [`Desk`](crate::service::Desk) opened for the request's user.

pub mod envelope;
pub mod methods;
pub mod params;
pub mod server;
pub mod state;

pub use envelope::Reply;
pub use params::Params;
pub use server::{router, serve};
pub use state::AppState;
