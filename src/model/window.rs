//! Rolling windows for smoothing metric readings.

use crate::model::data::{MetricKind, MetricSample};
use std::collections::{HashMap, VecDeque};

/// Fixed-size trailing window over numeric readings, oldest evicted first.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    /// Create a window holding at most `capacity` readings.
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a reading, evicting the oldest when the window is full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Arithmetic mean of current contents; 0.0 when empty.
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-metric rolling windows fed from the emitted sample stream.
///
/// Purely a read-side transform: observing samples here has no effect on the
/// acquirers or their retry bookkeeping.
#[derive(Debug, Clone)]
pub struct RollingAggregator {
    window_size: usize,
    windows: HashMap<MetricKind, RollingWindow>,
}

impl RollingAggregator {
    /// Create an aggregator whose per-metric windows hold `window_size`
    /// readings each.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            windows: HashMap::new(),
        }
    }

    /// Feed a sample's headline value into the window for its metric.
    pub fn observe(&mut self, sample: &MetricSample) {
        self.windows
            .entry(sample.kind())
            .or_insert_with(|| RollingWindow::new(self.window_size))
            .push(sample.value());
    }

    /// Rolling average for a metric; 0.0 if nothing has been observed yet.
    pub fn average(&self, kind: MetricKind) -> f64 {
        self.windows.get(&kind).map_or(0.0, RollingWindow::average)
    }

    /// The window for a metric, if any reading has been observed.
    pub fn window(&self, kind: MetricKind) -> Option<&RollingWindow> {
        self.windows.get(&kind)
    }
}
