//! Shared JSON parsing helpers for provider payloads.
//!
//! Providers are inconsistent about numeric encoding: the same field may come
//! as a JSON number (`7296.89`), a string (`"7296.89"`) or `null`.

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &serde_json::Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Parse a named field as `f64`, treating missing, `null` or garbage as `0.0`.
#[inline]
pub fn f64_or_zero(v: &serde_json::Value, key: &str) -> f64 {
    parse_f64_field(v, key).unwrap_or(0.0)
}
