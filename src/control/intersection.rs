//! intersection.rs
//! Rising-edge detector on the line sensor's "on black" flag.

#[derive(Debug, Default, Clone)]
pub struct IntersectionDetector {
    black_before: bool,
}

impl IntersectionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed this cycle's reading; true only on a false -> true transition.
    #[inline]
    pub fn update(&mut self, black_now: bool) -> bool {
        let hit = black_now && !self.black_before;
        self.black_before = black_now;
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_rising_edges_only() {
        let mut det = IntersectionDetector::new();
        let readings = [false, true, true, true, false, false, true, false];
        let hits: Vec<bool> = readings.iter().map(|&b| det.update(b)).collect();
        assert_eq!(hits, vec![false, true, false, false, false, false, true, false]);
    }

    #[test]
    fn test_black_at_start_counts_as_edge() {
        let mut det = IntersectionDetector::new();
        assert!(det.update(true));
        assert!(!det.update(true));
    }
}
