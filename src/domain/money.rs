use std::fmt;

/// Amounts are carried as integer cents so bucket tallies add up exactly.
/// For EUR/USD, 1 unit = 100 cents, so 150.50 = 15050 cents.
pub type Cents = i64;

/// Format cents as a plain decimal string.
/// Example: 15000 -> "150.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Convert a JSON amount (units, possibly fractional) into cents.
///
/// The amount goes through its shortest decimal form and [`parse_cents`], so
/// `7.995` and `"7.995"` give the same result. Negative, NaN, infinite and
/// unrepresentable amounts are rejected.
pub fn cents_from_f64(amount: f64) -> Option<Cents> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    if amount == 0.0 {
        return Some(0);
    }
    // f64 Display never uses exponent notation
    parse_cents(&amount.to_string()).ok()
}

/// Saturating sum of amounts. Totals pin at `Cents::MAX` instead of wrapping.
pub fn sum_cents<I: IntoIterator<Item = Cents>>(amounts: I) -> Cents {
    amounts.into_iter().fold(0, Cents::saturating_add)
}

/// Parse a decimal amount string into cents.
/// Example: "150.00" -> 15000, "12.5" -> 1250, "100" -> 10000, "7.995" -> 800
///
/// Sub-cent digits round half up on the third decimal; the rest are ignored.
///
/// Quotation payloads sometimes serialize totals as strings, and always with
/// a dot separator, so no locale handling happens here.
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseCentsError::Negative);
    }

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };
    if !decimal_str.bytes().all(|b| b.is_ascii_digit())
        || (units_str.is_empty() && decimal_str.is_empty())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    let mut digits = decimal_str.bytes().map(|b| i64::from(b - b'0'));
    let tens = digits.next().unwrap_or(0);
    let ones = digits.next().unwrap_or(0);
    let round_up = digits.next().is_some_and(|d| d >= 5);
    let decimal_cents = tens * 10 + ones + i64::from(round_up);

    units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .ok_or(ParseCentsError::InvalidFormat)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Negative,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Negative => write!(f, "amount must not be negative"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
