#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cast_possible_truncation,
    clippy::unused_self,
    rust_2018_idioms,
    missing_debug_implementations
)]
#![allow(clippy::type_complexity)]

//! # VWAP Data
//! Resilient ingestion of the Coinbase Exchange public trade feed, feeding a concurrent
//! sliding-window Volume-Weighted-Average-Price aggregator.
//!
//! ## Overview
//! * [`CoinbaseConnection`](exchange::coinbase::connection::CoinbaseConnection) dials the feed
//!   with exponential backoff, subscribes, and runs a read loop on its own task that forwards
//!   trade frames on a bounded channel.
//! * [`IngestLoop`](ingest::IngestLoop) pulls trades off that channel, parses them into
//!   [`Tick`](tick::Tick)s, and hands them to the [`VwapAggregator`](aggregator::VwapAggregator).
//!   It drives a best-effort graceful shutdown when interrupted.
//! * Every computed value is delivered to an [`IndicatorSink`](sink::IndicatorSink).
//!
//! All numeric work uses exact [`Decimal`](rust_decimal::Decimal) arithmetic so running sums
//! never drift under repeated eviction.

/// Sliding-window VWAP aggregator keyed by instrument.
pub mod aggregator;

/// [`FeedConfig`](config::FeedConfig) built once at startup from the environment.
pub mod config;

/// All [`Error`](std::error::Error)s generated in `vwap-data`.
pub mod error;

/// Venue specific connection management and wire messages.
pub mod exchange;

/// Orchestrating control loop and graceful shutdown.
pub mod ingest;

/// Single-shot completion signal used for "done" and interrupt notifications.
pub mod signal;

/// Output sink boundary for computed indicator values.
pub mod sink;

/// Stream adaptors applied to the inbound WebSocket frames.
pub mod streams;

/// [`Tick`](tick::Tick) and [`Instrument`](tick::Instrument) value types.
pub mod tick;

