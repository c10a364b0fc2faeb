/// `Coinbase` Exchange WebSocket feed: wire messages and the connection manager.
pub mod coinbase;
