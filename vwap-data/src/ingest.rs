//! Ingestion loop wiring the read loop to the [`VwapAggregator`].
//!
//! A single cooperative loop waits on three event sources:
//! - the external interrupt (eg/ SIGINT), which drives graceful shutdown
//! - inbound [`MatchMessage`]s from the read loop
//! - the read loop's "done" signal, the expected end-of-stream path
//!
//! Shutdown is best-effort: after the connection is asked to close, the loop waits at most
//! [`SHUTDOWN_TIMEOUT`] for the read loop to finish and then abandons it.

use crate::{
    aggregator::{VWAP, VwapAggregator},
    error::DataError,
    exchange::coinbase::{connection::CoinbaseConnection, message::MatchMessage},
    signal::CompletionListener,
    sink::{IndicatorOutput, IndicatorSink},
    tick::Tick,
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Maximum time to wait for the read loop after requesting the connection to close.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection handle the [`IngestLoop`] closes on interrupt.
#[async_trait]
pub trait CloseStream: Send {
    async fn close(&mut self) -> Result<(), DataError>;
}

#[async_trait]
impl CloseStream for CoinbaseConnection {
    async fn close(&mut self) -> Result<(), DataError> {
        CoinbaseConnection::close(self).await
    }
}

/// How the [`IngestLoop`] exited.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum IngestExit {
    /// Read loop finished on its own.
    StreamEnded,
    /// Interrupted. `clean` if the read loop finished within the shutdown timeout.
    Interrupted { clean: bool },
}

/// Drives trades from the read loop through the [`VwapAggregator`] into an [`IndicatorSink`].
#[derive(Debug)]
pub struct IngestLoop<Sink> {
    aggregator: Arc<VwapAggregator>,
    sink: Sink,
    shutdown_timeout: Duration,
    dropped: u64,
}

impl<Sink> IngestLoop<Sink>
where
    Sink: IndicatorSink,
{
    pub fn new(aggregator: Arc<VwapAggregator>, sink: Sink) -> Self {
        Self {
            aggregator,
            sink,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
            dropped: 0,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub fn into_sink(self) -> Sink {
        self.sink
    }

    /// Number of malformed or overflowing trades dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Run until the read loop finishes or `interrupt` resolves.
    pub async fn run<Connection>(
        &mut self,
        connection: &mut Connection,
        mut messages: mpsc::Receiver<MatchMessage>,
        mut done: CompletionListener,
        mut interrupt: CompletionListener,
    ) -> IngestExit
    where
        Connection: CloseStream + ?Sized,
    {
        loop {
            tokio::select! {
                biased;

                _ = interrupt.completed() => {
                    return self.shutdown(connection, messages, done).await;
                }

                message = messages.recv() => match message {
                    Some(message) => self.handle(&message),
                    None => {
                        info!("trade channel closed, exiting");
                        return IngestExit::StreamEnded;
                    }
                },

                _ = done.completed() => {
                    info!("read loop finished, exiting");
                    return IngestExit::StreamEnded;
                }
            }
        }
    }

    fn handle(&mut self, message: &MatchMessage) {
        let tick = match Tick::try_from(message) {
            Ok(tick) => tick,
            Err(error) => {
                self.dropped += 1;
                debug!(%error, product_id = %message.product_id, "dropping malformed trade");
                return;
            }
        };

        let value = match self.aggregator.process(tick.clone()) {
            Ok(value) => value,
            Err(error) => {
                self.dropped += 1;
                warn!(%error, price = %tick.price, quantity = %tick.quantity, "dropping trade");
                return;
            }
        };

        self.sink.send(IndicatorOutput {
            tick,
            name: VWAP,
            value,
        });
    }

    async fn shutdown<Connection>(
        &mut self,
        connection: &mut Connection,
        messages: mpsc::Receiver<MatchMessage>,
        mut done: CompletionListener,
    ) -> IngestExit
    where
        Connection: CloseStream + ?Sized,
    {
        info!("received interrupt signal, closing connection");

        if let Err(error) = connection.close().await {
            error!(%error, "error during closing WebSocket");
        }

        // Unblocks a read loop parked on a full channel
        drop(messages);

        match tokio::time::timeout(self.shutdown_timeout, done.completed()).await {
            Ok(()) => {
                info!("read loop finished, exiting");
                IngestExit::Interrupted { clean: true }
            }
            Err(_) => {
                warn!(
                    timeout = ?self.shutdown_timeout,
                    "timeout waiting for read loop to finish, exiting"
                );
                IngestExit::Interrupted { clean: false }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Completion, completion};
    use rust_decimal_macros::dec;
    use std::num::NonZeroUsize;
    use tokio::time::Instant;

    /// Test connection that optionally resolves the read loop's done signal when closed.
    struct MockConnection {
        closes: usize,
        done_on_close: Option<Completion>,
        fail: bool,
    }

    #[async_trait]
    impl CloseStream for MockConnection {
        async fn close(&mut self) -> Result<(), DataError> {
            self.closes += 1;
            self.done_on_close.take();
            if self.fail {
                Err(DataError::Close("AlreadyClosed".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn trade(price: &str, size: &str) -> MatchMessage {
        MatchMessage {
            kind: "match".to_string(),
            product_id: "XXX-YYY".to_string(),
            price: price.to_string(),
            size: size.to_string(),
            ..Default::default()
        }
    }

    fn ingest() -> IngestLoop<Vec<IndicatorOutput>> {
        let aggregator = Arc::new(VwapAggregator::new(NonZeroUsize::new(200).unwrap()));
        IngestLoop::new(aggregator, Vec::new())
    }

    #[tokio::test]
    async fn test_run_processes_trades_until_stream_ends() {
        let mut ingest = ingest();
        let (tx, rx) = mpsc::channel(1);
        let (done, done_listener) = completion();
        let (_interrupt, interrupt_listener) = completion();
        let mut connection = MockConnection {
            closes: 0,
            done_on_close: None,
            fail: false,
        };

        tokio::spawn(async move {
            for message in [
                trade("100", "10"),
                trade("not-a-price", "1"),
                trade("150", "15"),
                trade("200", "oops"),
                trade("200", "10"),
            ] {
                tx.send(message).await.unwrap();
            }
            drop(done);
        });

        let exit = ingest
            .run(&mut connection, rx, done_listener, interrupt_listener)
            .await;

        assert_eq!(exit, IngestExit::StreamEnded);
        assert_eq!(connection.closes, 0);
        assert_eq!(ingest.dropped(), 2);

        let values = ingest
            .sink()
            .iter()
            .map(|output| (output.name, output.value))
            .collect::<Vec<_>>();
        assert_eq!(
            values,
            vec![("VWAP", dec!(100)), ("VWAP", dec!(130)), ("VWAP", dec!(150))]
        );
    }

    #[tokio::test]
    async fn test_run_survives_trades_that_overflow_window_sums() {
        let mut ingest = ingest();
        let (tx, rx) = mpsc::channel(1);
        let (done, done_listener) = completion();
        let (_interrupt, interrupt_listener) = completion();
        let mut connection = MockConnection {
            closes: 0,
            done_on_close: None,
            fail: false,
        };

        tokio::spawn(async move {
            for message in [
                trade("100", "10"),
                trade("79228162514264337593543950335", "2"),
                trade("150", "15"),
            ] {
                tx.send(message).await.unwrap();
            }
            drop(done);
        });

        let exit = ingest
            .run(&mut connection, rx, done_listener, interrupt_listener)
            .await;

        assert_eq!(exit, IngestExit::StreamEnded);
        assert_eq!(ingest.dropped(), 1);

        let values = ingest
            .sink()
            .iter()
            .map(|output| output.value)
            .collect::<Vec<_>>();
        assert_eq!(values, vec![dec!(100), dec!(130)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_interrupt_with_prompt_read_loop_exit() {
        struct TestCase {
            fail_close: bool,
        }

        let tests = vec![
            // TC0: close succeeds & read loop finishes
            TestCase { fail_close: false },
            // TC1: close fails, shutdown still waits for the read loop
            TestCase { fail_close: true },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let mut ingest = ingest();
            let (_tx, rx) = mpsc::channel(1);
            let (done, done_listener) = completion();
            let (interrupt, interrupt_listener) = completion();
            let mut connection = MockConnection {
                closes: 0,
                done_on_close: Some(done),
                fail: test.fail_close,
            };
            interrupt.complete();

            let start = Instant::now();
            let exit = ingest
                .run(&mut connection, rx, done_listener, interrupt_listener)
                .await;

            assert_eq!(exit, IngestExit::Interrupted { clean: true }, "TC{} failed", index);
            assert_eq!(connection.closes, 1, "TC{} failed", index);
            assert!(start.elapsed() < SHUTDOWN_TIMEOUT, "TC{} failed", index);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_interrupt_abandons_stuck_read_loop_after_timeout() {
        let mut ingest = ingest();
        let (_tx, rx) = mpsc::channel(1);
        let (_done, done_listener) = completion();
        let (interrupt, interrupt_listener) = completion();
        let mut connection = MockConnection {
            closes: 0,
            done_on_close: None,
            fail: false,
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            interrupt.complete();
        });

        let start = Instant::now();
        let exit = ingest
            .run(&mut connection, rx, done_listener, interrupt_listener)
            .await;
        let elapsed = start.elapsed();

        assert_eq!(exit, IngestExit::Interrupted { clean: false });
        assert_eq!(connection.closes, 1);
        assert!(elapsed >= Duration::from_millis(300) + SHUTDOWN_TIMEOUT);
        assert!(elapsed < Duration::from_millis(300) + SHUTDOWN_TIMEOUT + Duration::from_millis(50));
    }
}
