//! FlagSearch front end
//!
//! Command line output and a JSON-RPC stdio server on top of
//! `flagsearch-core`'s search engine.

pub mod error;
pub mod output;
pub mod rpc;

pub use error::{ServerError, ServerResult};
pub use rpc::RpcServer;
