//! JSON-RPC query server
//!
//! Serves the search engine to a UI collaborator over newline-delimited
//! JSON-RPC 2.0.
//!
//! ## Usage
//!
//! ```bash
//! flagsearch --features 'data/*.csv' serve
//! ```
//!
//! Methods: `search {territory, method?}`, `territories`, `models`, `ping`.

pub mod protocol;
pub mod server;
pub mod transport;

pub use protocol::*;
pub use server::RpcServer;
pub use transport::LineTransport;
