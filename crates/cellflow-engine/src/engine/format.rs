/// Decimal places kept on evaluated results.
pub const RESULT_DECIMALS: i32 = 6;

/// Format a number for display without trailing zeros or a negative zero.
pub fn format_number(n: f64) -> String {
    if n == 0.0 { "0".to_string() } else { n.to_string() }
}

/// Round to [`RESULT_DECIMALS`] places to hide floating-point noise.
///
/// Magnitudes too large to carry a fractional part are returned unchanged.
pub fn round_result(n: f64) -> f64 {
    if !n.is_finite() || n.abs() >= 1e15 {
        return n;
    }
    let scale = 10f64.powi(RESULT_DECIMALS);
    let rounded = (n * scale).round() / scale;
    if rounded == 0.0 { 0.0 } else { rounded }
}
