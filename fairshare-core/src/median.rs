// === MEDIAN ===

/// Median of `values`: the middle element for odd lengths, the mean of the
/// two middle elements for even lengths. Sorts `values` in place.
///
/// Returns `None` for an empty slice.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let len = values.len();
    let mid = len / 2;
    if len % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
