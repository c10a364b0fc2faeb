//! Sliding-window Volume-Weighted-Average-Price aggregation.
//!
//! Each [`Instrument`] owns a bounded FIFO of its most recent ticks plus running sums of notional
//! and quantity, so an update is `O(1)` regardless of window size:
//!
//! `VWAP = Σ(price × quantity) / Σ(quantity)` over the ticks currently in the window.
//!
//! All state lives behind a single [`Mutex`]. This is a contention point once instrument
//! cardinality and update rates grow; sharding the map per instrument is the scaling path.

use crate::{
    config::FeedConfig,
    error::DataError,
    tick::{Instrument, Tick},
};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::{collections::VecDeque, num::NonZeroUsize};
use tracing::warn;

/// Indicator name attached to every [`VwapAggregator`] output.
pub const VWAP: &str = "VWAP";

/// Per-instrument sliding window and running sums.
#[derive(Debug, Clone)]
struct InstrumentWindow {
    ticks: VecDeque<Tick>,
    sum_notional: Decimal,
    sum_quantity: Decimal,
    last_vwap: Decimal,
}

impl InstrumentWindow {
    fn new(capacity: usize) -> Self {
        Self {
            ticks: VecDeque::with_capacity(capacity),
            sum_notional: Decimal::ZERO,
            sum_quantity: Decimal::ZERO,
            last_vwap: Decimal::ZERO,
        }
    }

    /// Evict the oldest tick if at capacity, then append `tick` and recompute the VWAP.
    ///
    /// Returns `None` without modifying the window if any sum overflows.
    fn push(&mut self, tick: Tick, capacity: usize) -> Option<Decimal> {
        let mut sum_notional = self.sum_notional;
        let mut sum_quantity = self.sum_quantity;

        let evict = self.ticks.len() >= capacity;
        if evict {
            if let Some(oldest) = self.ticks.front() {
                sum_notional = sum_notional.checked_sub(oldest.notional()?)?;
                sum_quantity = sum_quantity.checked_sub(oldest.quantity)?;
            }
        }

        sum_notional = sum_notional.checked_add(tick.notional()?)?;
        sum_quantity = sum_quantity.checked_add(tick.quantity)?;
        let vwap = self.vwap(sum_notional, sum_quantity)?;

        if evict {
            self.ticks.pop_front();
        }
        self.ticks.push_back(tick);
        self.sum_notional = sum_notional;
        self.sum_quantity = sum_quantity;
        self.last_vwap = vwap;

        Some(vwap)
    }

    /// VWAP for the given sums, retaining the previous value unless `sum_quantity > 0`.
    fn vwap(&self, sum_notional: Decimal, sum_quantity: Decimal) -> Option<Decimal> {
        if sum_quantity > Decimal::ZERO {
            return sum_notional.checked_div(sum_quantity);
        }

        if sum_quantity < Decimal::ZERO {
            warn!(
                %sum_quantity,
                last_vwap = %self.last_vwap,
                "negative windowed quantity, retaining previous VWAP"
            );
        }
        Some(self.last_vwap)
    }

    fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            ticks: self.ticks.iter().cloned().collect(),
            sum_notional: self.sum_notional,
            sum_quantity: self.sum_quantity,
            vwap: self.last_vwap,
        }
    }
}

/// Point-in-time copy of an instrument's window and running sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowSnapshot {
    /// Ticks in arrival order, oldest first.
    pub ticks: Vec<Tick>,
    pub sum_notional: Decimal,
    pub sum_quantity: Decimal,
    pub vwap: Decimal,
}

/// Thread-safe VWAP aggregator keyed by [`Instrument`].
#[derive(Debug)]
pub struct VwapAggregator {
    window: NonZeroUsize,
    windows: Mutex<FnvHashMap<Instrument, InstrumentWindow>>,
}

impl VwapAggregator {
    /// Construct a new [`VwapAggregator`] retaining at most `window` ticks per instrument.
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window,
            windows: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Construct a new [`VwapAggregator`] using the configured sliding window size.
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.window)
    }

    /// Configured sliding window size.
    pub fn window_size(&self) -> usize {
        self.window.get()
    }

    /// Insert `tick` into its instrument's window and return the updated VWAP.
    ///
    /// Eviction, insertion and recomputation happen under a single lock acquisition, so
    /// concurrent callers observe each update as all-or-nothing. A tick whose notional or
    /// running sums would overflow is rejected with [`DataError::Overflow`] and leaves the
    /// window untouched.
    pub fn process(&self, tick: Tick) -> Result<Decimal, DataError> {
        let capacity = self.window.get();
        let instrument = tick.instrument.clone();
        let mut windows = self.windows.lock();

        let vwap = match windows.get_mut(&instrument) {
            Some(window) => window.push(tick, capacity),
            None => {
                let mut window = InstrumentWindow::new(capacity);
                let vwap = window.push(tick, capacity);
                if vwap.is_some() {
                    windows.insert(instrument.clone(), window);
                }
                vwap
            }
        };

        vwap.ok_or(DataError::Overflow(instrument))
    }

    /// Latest VWAP for `instrument`.
    pub fn get(&self, instrument: &Instrument) -> Result<Decimal, DataError> {
        self.windows
            .lock()
            .get(instrument)
            .map(|window| window.last_vwap)
            .ok_or_else(|| DataError::NotFound(instrument.clone()))
    }

    /// Copy of the current window and running sums for `instrument`, if it has been observed.
    pub fn snapshot(&self, instrument: &Instrument) -> Option<WindowSnapshot> {
        self.windows.lock().get(instrument).map(InstrumentWindow::snapshot)
    }

    /// Every [`Instrument`] observed so far.
    pub fn instruments(&self) -> Vec<Instrument> {
        let mut instruments = self.windows.lock().keys().cloned().collect::<Vec<_>>();
        instruments.sort();
        instruments
    }
}
