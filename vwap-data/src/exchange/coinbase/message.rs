use crate::tick::Instrument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// [`Coinbase`](super) subscription request sent once after connecting.
///
/// ### Raw Payload Examples
/// See docs: <https://docs.cdp.coinbase.com/exchange/docs/websocket-overview>
/// ```json
/// {
///     "type": "subscribe",
///     "product_ids": ["BTC-USD", "ETH-USD"],
///     "channels": ["matches"]
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CoinbaseSubscription {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub product_ids: Vec<Instrument>,
    pub channels: Vec<String>,
}

impl CoinbaseSubscription {
    pub fn new(product_ids: Vec<Instrument>, channels: Vec<String>) -> Self {
        Self {
            kind: "subscribe",
            product_ids,
            channels,
        }
    }
}

/// Inbound [`Coinbase`](super) frame, decoded leniently.
///
/// Every field defaults when absent, so control frames (`subscriptions`, `heartbeat`, `error`)
/// decode too and are filtered out by their empty `price`.
///
/// ### Raw Payload Examples
/// See docs: <https://docs.cdp.coinbase.com/exchange/docs/websocket-channels#match>
/// ```json
/// {
///     "type": "match",
///     "trade_id": 10,
///     "sequence": 50,
///     "maker_order_id": "ac928c66-ca53-498f-9c13-a110027a60e8",
///     "taker_order_id": "132fb6ae-456b-4654-b4e0-d681ac05cea1",
///     "time": "2014-11-07T08:19:27.028459Z",
///     "product_id": "BTC-USD",
///     "size": "5.23512",
///     "price": "400.23",
///     "side": "sell"
/// }
/// ```
#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub trade_id: u64,
    pub sequence: u64,
    pub maker_order_id: String,
    pub taker_order_id: String,
    pub time: Option<DateTime<Utc>>,
    pub product_id: String,
    pub size: String,
    pub price: String,
    pub side: String,
    /// Populated on `error` frames only.
    pub message: String,
}

impl MatchMessage {
    /// Whether this frame carries a trade that should be forwarded downstream.
    pub fn is_trade(&self) -> bool {
        !self.price.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.kind == "error"
    }
}
