//! # models::history
//!
//! Per-symbol price history. Each series is a drop-oldest FIFO bounded at
//! `capacity` points, kept independent of the instrument it samples.

use std::collections::{BTreeMap, HashMap, VecDeque};

use super::instrument::PricePoint;

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone)]
pub struct PriceHistory {
    series: HashMap<String, VecDeque<PricePoint>>,
    capacity: usize,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: HashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `point`, evicting the oldest points beyond capacity.
    pub fn push(&mut self, symbol: &str, point: PricePoint) {
        let capacity = self.capacity;
        let entry = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity + 1));

        entry.push_back(point);
        while entry.len() > capacity {
            entry.pop_front();
        }
    }

    /// Oldest first; empty for an unknown symbol.
    pub fn points(&self, symbol: &str) -> Vec<PricePoint> {
        self.series
            .get(symbol)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(VecDeque::is_empty)
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<PricePoint>> {
        self.series
            .iter()
            .map(|(symbol, s)| (symbol.clone(), s.iter().copied().collect()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}

impl Default for PriceHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(i: i64) -> PricePoint {
        PricePoint { timestamp: i, price: 100.0 + i as f64, volume: i as u64 }
    }

    #[test]
    fn test_51_points_keep_latest_50_in_order() {
        let mut history = PriceHistory::default();
        for i in 0..51 {
            history.push("X", point(i));
        }

        let points = history.points("X");
        assert_eq!(points.len(), 50);
        assert_eq!(points.first().map(|p| p.timestamp), Some(1));
        assert_eq!(points.last().map(|p| p.timestamp), Some(50));
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_series_are_independent() {
        let mut history = PriceHistory::new(2);
        history.push("A", point(1));
        history.push("B", point(2));
        history.push("B", point(3));
        history.push("B", point(4));

        assert_eq!(history.len("A"), 1);
        assert_eq!(history.len("B"), 2);
        assert!(history.points("C").is_empty());

        history.clear();
        assert!(history.is_empty());
    }
}
