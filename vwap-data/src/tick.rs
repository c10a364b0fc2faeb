use crate::{error::DataError, exchange::coinbase::message::MatchMessage};
use derive_more::{Constructor, Display};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::str::FromStr;

/// Venue identifier of a traded pair, eg/ "BTC-USD".
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Instrument(pub SmolStr);

impl Instrument {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Instrument {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl From<String> for Instrument {
    fn from(value: String) -> Self {
        Self(SmolStr::from(value))
    }
}

impl AsRef<str> for Instrument {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Normalised trade observation fed into the [`VwapAggregator`](crate::aggregator::VwapAggregator).
#[derive(Clone, Eq, PartialEq, Hash, Debug, Constructor, Deserialize, Serialize)]
pub struct Tick {
    pub instrument: Instrument,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl Tick {
    /// Notional value of the trade, ie/ `price * quantity`, or `None` if it overflows.
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }
}

impl TryFrom<&MatchMessage> for Tick {
    type Error = DataError;

    fn try_from(message: &MatchMessage) -> Result<Self, Self::Error> {
        let price = Decimal::from_str(message.price.trim())
            .map_err(|error| DataError::Decode(format!("price {:?}: {error}", message.price)))?;
        let quantity = Decimal::from_str(message.size.trim())
            .map_err(|error| DataError::Decode(format!("size {:?}: {error}", message.size)))?;

        Ok(Self {
            instrument: Instrument::from(message.product_id.as_str()),
            price,
            quantity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn message(product_id: &str, price: &str, size: &str) -> MatchMessage {
        MatchMessage {
            kind: "match".to_string(),
            product_id: product_id.to_string(),
            price: price.to_string(),
            size: size.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tick_try_from_match_message() {
        struct TestCase {
            input: MatchMessage,
            expected: Result<Tick, ()>,
        }

        let tests = vec![
            TestCase {
                // TC0: valid price & size
                input: message("BTC-USD", "16578.50", "0.001"),
                expected: Ok(Tick::new(
                    Instrument::from("BTC-USD"),
                    dec!(16578.50),
                    dec!(0.001),
                )),
            },
            TestCase {
                // TC1: invalid price is rejected
                input: message("BTC-USD", "abc", "0.001"),
                expected: Err(()),
            },
            TestCase {
                // TC2: invalid size is rejected
                input: message("ETH-USD", "1200.10", ""),
                expected: Err(()),
            },
            TestCase {
                // TC3: high precision size survives exactly
                input: message("ETH-BTC", "0.06512", "12.34567891"),
                expected: Ok(Tick::new(
                    Instrument::from("ETH-BTC"),
                    dec!(0.06512),
                    dec!(12.34567891),
                )),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Tick::try_from(&test.input);
            match (actual, test.expected) {
                (Ok(actual), Ok(expected)) => assert_eq!(actual, expected, "TC{} failed", index),
                (Err(DataError::Decode(_)), Err(())) => {}
                (actual, expected) => {
                    panic!(
                        "TC{index} failed because actual != expected. \nActual: {actual:?}\nExpected: {expected:?}\n"
                    );
                }
            }
        }
    }

    #[test]
    fn test_tick_notional() {
        let tick = Tick::new(Instrument::from("XXX-YYY"), dec!(150), dec!(15));
        assert_eq!(tick.notional(), Some(dec!(2250)));

        let tick = Tick::new(Instrument::from("XXX-YYY"), Decimal::MAX, dec!(2));
        assert_eq!(tick.notional(), None);
    }
}
