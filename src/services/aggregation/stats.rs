//! Order statistics.

/// Median of `values`, or `None` when empty.
///
/// Even-length inputs average the two middle elements. Sorting uses
/// [`f64::total_cmp`], so NaN never panics (it sorts last).
#[must_use]
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(f64::midpoint(values[mid - 1], values[mid]))
    } else {
        Some(values[mid])
    }
}

/// Minimum and maximum of `values` under [`f64::total_cmp`].
#[must_use]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().min_by(f64::total_cmp)?;
    let max = values.iter().copied().max_by(f64::total_cmp)?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(vec![], None; "empty")]
    #[test_case(vec![5.0], Some(5.0); "single")]
    #[test_case(vec![3.0, 1.0, 2.0], Some(2.0); "odd")]
    #[test_case(vec![4.0, 1.0, 3.0, 2.0], Some(2.5); "even averages middles")]
    #[test_case(vec![400_000.0, 400_000.0], Some(400_000.0); "ties")]
    fn test_median(values: Vec<f64>, expected: Option<f64>) {
        assert_eq!(median(values), expected);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(&[]), None);
        assert_eq!(min_max(&[3.0, -1.0, 7.5]), Some((-1.0, 7.5)));
    }
}
