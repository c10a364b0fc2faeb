use crate::tick::Tick;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Indicator value computed for one processed [`Tick`].
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct IndicatorOutput {
    pub tick: Tick,
    /// Indicator name, eg/ "VWAP".
    pub name: &'static str,
    pub value: Decimal,
}

/// Downstream consumer of [`IndicatorOutput`]s, eg/ a display or alerting sink.
pub trait IndicatorSink {
    fn send(&mut self, output: IndicatorOutput);
}

impl IndicatorSink for Vec<IndicatorOutput> {
    fn send(&mut self, output: IndicatorOutput) {
        self.push(output);
    }
}

/// Forwards outputs to a consumer running on another task.
impl IndicatorSink for mpsc::UnboundedSender<IndicatorOutput> {
    fn send(&mut self, output: IndicatorOutput) {
        if mpsc::UnboundedSender::send(self, output).is_err() {
            debug!("IndicatorOutput receiver dropped");
        }
    }
}
