use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use tracing::warn;

/// Decimal exponent assumed when the upstream omits `tokenDecimal`
pub const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Largest accepted `tokenDecimal`; 10^77 is the biggest power of ten below 2^256
pub const MAX_TOKEN_DECIMALS: u32 = 77;

/// Parse a non-negative integer string in the asset's smallest unit.
/// Returns `None` for anything that is not plain ASCII digits.
pub fn parse_raw_value(value: &str) -> Option<BigUint> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<BigUint>().ok()
}

/// True when `value` is a well-formed integer string greater than zero
pub fn is_positive_raw_value(value: &str) -> bool {
    parse_raw_value(value).map_or(false, |v| !v.is_zero())
}

/// Convert `value / 10^decimals` to an f64.
///
/// The division is split into an integer quotient and a remainder over
/// arbitrary-precision integers so amounts beyond 2^53 keep their integer
/// part exact before the final float conversion. Malformed input yields 0.
pub fn parse_token_amount(value: &str, decimals: u32) -> f64 {
    let Some(raw) = parse_raw_value(value) else {
        warn!("Failed to parse token amount '{}' (decimals {}), using 0", value, decimals);
        return 0.0;
    };

    if raw.is_zero() {
        return 0.0;
    }

    // Below one whole token, so there is no integer part to keep exact
    let digits = value.trim().len();
    if decimals as usize > digits {
        return format!("{}e-{}", value.trim(), decimals)
            .parse::<f64>()
            .unwrap_or(0.0);
    }

    let divisor = BigUint::from(10u32).pow(decimals);
    let quotient = &raw / &divisor;
    let remainder = &raw % &divisor;

    let whole = quotient.to_f64().unwrap_or(f64::MAX);
    let fraction = match (remainder.to_f64(), divisor.to_f64()) {
        (Some(r), Some(d)) if d.is_finite() && d > 0.0 => r / d,
        _ => 0.0,
    };

    whole + fraction
}

/// Parse a `tokenDecimal` string, falling back to 18 when it is missing,
/// malformed or above [`MAX_TOKEN_DECIMALS`]
pub fn parse_decimals(decimals: &str) -> u32 {
    match decimals.trim().parse::<u32>() {
        Ok(parsed) if parsed <= MAX_TOKEN_DECIMALS => parsed,
        Ok(parsed) => {
            warn!(
                "Token decimals {} exceed {}, using {}",
                parsed, MAX_TOKEN_DECIMALS, DEFAULT_TOKEN_DECIMALS
            );
            DEFAULT_TOKEN_DECIMALS
        }
        Err(_) => DEFAULT_TOKEN_DECIMALS,
    }
}
