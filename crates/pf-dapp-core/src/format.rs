//! Display formatting. Amounts are truncated to a character budget, never rounded.

use pf_api_types::{ETHER_DECIMALS, Wei};

pub const TOTAL_RAISED_WIDTH: usize = 6;
pub const FUNDER_AMOUNT_WIDTH: usize = 6;
pub const REWARD_BALANCE_WIDTH: usize = 8;
pub const REWARD_PREVIEW_WIDTH: usize = 10;

/// Largest token scale we render; anything above is treated as misreported.
pub const MAX_DISPLAY_DECIMALS: usize = 36;

pub fn truncate_chars(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

pub fn ether(amount: Wei, width: usize) -> String {
    truncate_chars(&amount.format_ether(), width).to_owned()
}

pub fn token(amount: Wei, decimals: usize, width: usize) -> String {
    let decimals = if decimals > MAX_DISPLAY_DECIMALS {
        ETHER_DECIMALS
    } else {
        decimals
    };
    truncate_chars(&amount.format_units(decimals), width).to_owned()
}

/// `$150`, `$12.5`: whatever the plain number renders to.
pub fn usd(amount: f64) -> String {
    format!("${amount}")
}

pub fn usd_fixed(amount: f64) -> String {
    format!("${amount:.2}")
}
