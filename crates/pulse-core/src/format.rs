//! Display formatting for dashboard fields.
//!
//! The published file carries pre-rendered strings so the dashboard can show
//! them verbatim. All rendering lives here so the state never holds a number
//! and its text out of sync.

use crate::types::PriceClass;

/// Decimal places used for prices delivered by the trade stream.
pub const TRADE_PRICE_DECIMALS: usize = 5;

/// Decimal places used for the rendered 24h volume.
pub const VOLUME_DECIMALS: usize = 2;

/// Render `value` with a fixed number of decimals.
#[inline]
pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Render `value` with a fixed number of decimals and `,` thousands separators
/// (`1234567.891` → `"1,234,567.89"`).
pub fn grouped(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let digits = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits.as_str(), None),
    };

    let mut out = String::with_capacity(digits.len() + int_part.len() / 3 + 1);
    if value.is_sign_negative() && value != 0.0 {
        out.push('-');
    }
    let len = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Rendered 24h volume for a raw accumulator value.
#[inline]
pub fn volume(raw_volume: f64) -> String {
    grouped(raw_volume, VOLUME_DECIMALS)
}

/// Summary price: class precision, no currency sign.
#[inline]
pub fn quote_price(price: f64, class: PriceClass) -> String {
    fixed(price, class.decimals())
}

/// Trade price: always [`TRADE_PRICE_DECIMALS`].
#[inline]
pub fn trade_price(price: f64) -> String {
    fixed(price, TRADE_PRICE_DECIMALS)
}

/// Dollar amount at class precision (`"$101.50"`).
#[inline]
pub fn dollars(value: f64, class: PriceClass) -> String {
    format!("${}", fixed(value, class.decimals()))
}

/// Day range (`"L: $99.00 - H: $105.00"`).
pub fn day_range(low: f64, high: f64, class: PriceClass) -> String {
    format!("L: {} - H: {}", dollars(low, class), dollars(high, class))
}

/// 24h change with direction glyph (`"▲ 1.25%"`, `"▼ -0.40%"`).
///
/// Zero counts as up.
pub fn change(percent: f64) -> String {
    let glyph = if percent >= 0.0 { '▲' } else { '▼' };
    format!("{glyph} {percent:.2}%")
}
