/// Snapshot of scheduler counters since the last explicit reset.
///
/// `triggered` counts every schedule call, `sent` the calls that reached
/// the network, `debounced` the ones coalesced away. Cancelled pending
/// requests touch none of the counters, so `triggered` may exceed
/// `debounced + sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestStatistics {
    pub triggered: u64,
    pub debounced: u64,
    pub sent: u64,
}

impl RequestStatistics {
    /// Share of triggers that never reached the network, in percent.
    pub fn reduction_percent(&self) -> f64 {
        let total = self.debounced + self.sent;
        if total == 0 {
            return 0.0;
        }
        self.debounced as f64 / total as f64 * 100.0
    }
}
