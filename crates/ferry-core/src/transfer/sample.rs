//! Progress samples and the bounded window they are kept in.

use std::collections::VecDeque;
use std::time::Duration;

/// One progress observation: cumulative bytes at an offset from the transfer's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSample {
    pub at: Duration,
    pub bytes: u64,
}

impl TransferSample {
    pub fn new(at: Duration, bytes: u64) -> Self {
        Self { at, bytes }
    }
}

/// Fixed-capacity ring of accepted samples; the oldest is evicted on overflow.
#[derive(Debug, Clone)]
pub(crate) struct SampleWindow {
    samples: VecDeque<TransferSample>,
    capacity: usize,
}

impl SampleWindow {
    /// Capacity is clamped to 2 so there is always room for one interval.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: TransferSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn last(&self) -> Option<&TransferSample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferSample> {
        self.samples.iter()
    }

    /// Throughput (bytes/second) of each adjacent pair, oldest first.
    ///
    /// Accepted samples are strictly increasing in time, so every interval has a
    /// non-zero length.
    pub fn rates(&self) -> Vec<f64> {
        self.samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .filter_map(|(a, b)| {
                let secs = b.at.checked_sub(a.at)?.as_secs_f64();
                if secs <= 0.0 {
                    return None;
                }
                Some(b.bytes.saturating_sub(a.bytes) as f64 / secs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(ms: u64, bytes: u64) -> TransferSample {
        TransferSample::new(Duration::from_millis(ms), bytes)
    }

    #[test]
    fn window_evicts_oldest() {
        let mut w = SampleWindow::new(3);
        for i in 0..5 {
            w.push(s(i * 100, i * 10));
        }
        assert_eq!(w.len(), 3);
        let kept: Vec<u64> = w.iter().map(|x| x.bytes).collect();
        assert_eq!(kept, vec![20, 30, 40]);
    }

    #[test]
    fn rates_per_interval() {
        let mut w = SampleWindow::new(10);
        w.push(s(0, 0));
        w.push(s(500, 1_000));
        w.push(s(1_500, 1_000));
        assert_eq!(w.rates(), vec![2_000.0, 0.0]);
    }

    #[test]
    fn tiny_capacity_still_holds_an_interval() {
        let mut w = SampleWindow::new(0);
        w.push(s(0, 0));
        w.push(s(1_000, 10));
        assert_eq!(w.rates().len(), 1);
    }
}
