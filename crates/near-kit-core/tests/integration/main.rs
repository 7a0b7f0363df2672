//! Integration tests for near-kit-core.
//!
//! Every test stands up its own mock JSON-RPC node, so no network access or
//! sandbox is needed.
//!
//! Run with: `cargo test --test integration`

mod mock_node;
mod nep413_integration;
mod rpc_client_integration;
mod transaction_integration;
