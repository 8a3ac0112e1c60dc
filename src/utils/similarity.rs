use similar::TextDiff;

/// Line-level similarity in [0, 1] between two texts.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    TextDiff::from_lines(a, b).ratio() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_and_disjoint() {
        assert_eq!(similarity_ratio("a\nb\n", "a\nb\n"), 1.0);
        assert_eq!(similarity_ratio("", "a"), 0.0);
        assert!(similarity_ratio("revenue 100\n", "headcount 7\n") < 0.5);
    }

    #[test]
    fn test_partial_overlap() {
        let a = "Revenue: 100\nProfit: 20\nDebt: 5\n";
        let b = "Revenue: 100\nProfit: 25\nDebt: 5\n";
        let ratio = similarity_ratio(a, b);
        assert!(ratio > 0.5 && ratio < 1.0);
    }
}
