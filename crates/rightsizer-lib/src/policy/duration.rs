//! Parsing of compound duration literals such as `1m30s` or `500ms`

use std::time::Duration;

/// Parse a duration made of `<number><unit>` segments
///
/// Units: `ms`, `s`, `m`, `h`. A bare number is taken as seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration '{input}'"))?;
        if digits == 0 {
            return Err(format!("invalid duration '{input}'"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration '{input}'"))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let out_of_range = || format!("duration '{input}' out of range");
        let segment = match &rest[..unit_len] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.checked_mul(60).ok_or_else(out_of_range)?),
            "h" => Duration::from_secs(amount.checked_mul(3600).ok_or_else(out_of_range)?),
            unit => return Err(format!("unknown unit '{unit}' in duration '{input}'")),
        };
        total = total.checked_add(segment).ok_or_else(out_of_range)?;
        rest = &rest[unit_len..];
    }

    Ok(total)
}
