/// [`CoinbaseConnection`](connection::CoinbaseConnection) lifecycle, retry/backoff and the
/// read loop.
pub mod connection;

/// Subscription request and inbound trade frame types.
pub mod message;

/// `Coinbase` Exchange public WebSocket feed base url.
///
/// See docs: <https://docs.cdp.coinbase.com/exchange/docs/websocket-overview>
pub const BASE_URL_COINBASE: &str = "wss://ws-feed.exchange.coinbase.com";

/// `Coinbase` real-time trades channel.
///
/// See docs: <https://docs.cdp.coinbase.com/exchange/docs/websocket-channels#match>
pub const CHANNEL_MATCHES: &str = "matches";
