//! Kubernetes-style resource quantities
//!
//! CPU amounts are held in milli-units and memory amounts in bytes. Parsing
//! accepts decimal (`k`, `M`, `G`, ...) and binary (`Ki`, `Mi`, `Gi`, ...)
//! suffixes and rounds fractional results up, the same way the API server
//! does. Formatting is canonical, so two quantities with the same value and
//! format always render to the same string.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// The resource a quantity measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Cpu => write!(f, "cpu"),
            ResourceKind::Memory => write!(f, "memory"),
        }
    }
}

/// Suffix family used when rendering a quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityFormat {
    /// Powers of 1000 (`k`, `M`, `G`, ...), milli-units for CPU
    DecimalSi,
    /// Powers of 1024 (`Ki`, `Mi`, `Gi`, ...)
    BinarySi,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity '{0}'")]
    Invalid(String),
    #[error("unknown suffix '{suffix}' in quantity '{input}'")]
    UnknownSuffix { input: String, suffix: String },
    #[error("quantity '{0}' is out of range")]
    OutOfRange(String),
}

const DECIMAL_SUFFIXES: &[(&str, u32)] = &[
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
];

const BINARY_SUFFIXES: &[(&str, u32)] = &[
    ("Ei", 6),
    ("Pi", 5),
    ("Ti", 4),
    ("Gi", 3),
    ("Mi", 2),
    ("Ki", 1),
];

/// A CPU or memory amount
///
/// Equality and ordering are numeric and only defined between quantities of
/// the same [`ResourceKind`]. Use the [`Display`](fmt::Display) form when the
/// textual representation matters.
#[derive(Debug, Clone, Copy)]
pub struct Quantity {
    kind: ResourceKind,
    value: i64,
    format: QuantityFormat,
}

impl Quantity {
    pub fn new(kind: ResourceKind, value: i64, format: QuantityFormat) -> Self {
        Self {
            kind,
            value,
            format,
        }
    }

    /// CPU amount in milli-units
    pub fn cpu_millis(millis: i64) -> Self {
        Self::new(ResourceKind::Cpu, millis, QuantityFormat::DecimalSi)
    }

    /// Memory amount in bytes, rendered with binary suffixes
    pub fn memory_bytes(bytes: i64) -> Self {
        Self::new(ResourceKind::Memory, bytes, QuantityFormat::BinarySi)
    }

    pub fn zero(kind: ResourceKind) -> Self {
        Self::new(kind, 0, QuantityFormat::DecimalSi)
    }

    /// Parse a quantity string such as `250m`, `0.5`, `128Mi` or `1G`
    pub fn parse(kind: ResourceKind, input: &str) -> Result<Self, QuantityError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, rest) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(split);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::Invalid(input.to_string()));
        }

        let (multiplier, suffix_exp, format) =
            suffix_scale(suffix).ok_or_else(|| QuantityError::UnknownSuffix {
                input: input.to_string(),
                suffix: suffix.to_string(),
            })?;

        let out_of_range = || QuantityError::OutOfRange(input.to_string());

        let mantissa: i128 = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| out_of_range())?;

        let mut exp10 = suffix_exp - frac_part.len() as i32;
        if kind == ResourceKind::Cpu {
            exp10 += 3;
        }

        let scaled = mantissa.checked_mul(multiplier).ok_or_else(out_of_range)?;
        let value = if exp10 >= 0 {
            let factor = 10i128.checked_pow(exp10 as u32).ok_or_else(out_of_range)?;
            scaled.checked_mul(factor).ok_or_else(out_of_range)?
        } else {
            let divisor = 10i128.checked_pow((-exp10) as u32).ok_or_else(out_of_range)?;
            // Round up, matching how the API server treats sub-unit precision
            scaled / divisor + i128::from(scaled % divisor != 0)
        };

        let value = i64::try_from(value).map_err(|_| out_of_range())?;
        Ok(Self::new(kind, if negative { -value } else { value }, format))
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Raw value: milli-units for CPU, bytes for memory
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Add two quantities of the same kind, keeping `self`'s format
    pub fn checked_add(&self, other: &Quantity) -> Option<Quantity> {
        if self.kind != other.kind {
            return None;
        }
        self.value
            .checked_add(other.value)
            .map(|value| Self::new(self.kind, value, self.format))
    }

    /// Multiply by a float ratio, truncating toward zero
    pub fn scale(&self, ratio: f64) -> Quantity {
        let value = (self.value as f64 * ratio) as i64;
        Self::new(self.kind, value, self.format)
    }

    fn fmt_magnitude(&self, magnitude: i64) -> String {
        match (self.kind, self.format) {
            (ResourceKind::Cpu, _) => {
                if magnitude % 1000 == 0 {
                    format_decimal(magnitude / 1000)
                } else {
                    format!("{magnitude}m")
                }
            }
            (ResourceKind::Memory, QuantityFormat::DecimalSi) => format_decimal(magnitude),
            (ResourceKind::Memory, QuantityFormat::BinarySi) => format_binary(magnitude),
        }
    }
}

fn suffix_scale(suffix: &str) -> Option<(i128, i32, QuantityFormat)> {
    let decimal = |exp: i32| Some((1, exp, QuantityFormat::DecimalSi));
    match suffix {
        "" => decimal(0),
        "n" => decimal(-9),
        "u" => decimal(-6),
        "m" => decimal(-3),
        _ => {
            if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
                return decimal(*exp as i32);
            }
            BINARY_SUFFIXES
                .iter()
                .find(|(s, _)| *s == suffix)
                .map(|(_, pow)| (1024i128.pow(*pow), 0, QuantityFormat::BinarySi))
        }
    }
}

fn format_decimal(n: i64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    for (suffix, exp) in DECIMAL_SUFFIXES {
        let unit = 10i64.pow(*exp);
        if n % unit == 0 {
            return format!("{}{}", n / unit, suffix);
        }
    }
    n.to_string()
}

fn format_binary(n: i64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    for (suffix, pow) in BINARY_SUFFIXES {
        let unit = 1024i64.pow(*pow);
        if n % unit == 0 {
            return format!("{}{}", n / unit, suffix);
        }
    }
    n.to_string()
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value < 0 {
            write!(f, "-{}", self.fmt_magnitude(self.value.saturating_abs()))
        } else {
            write!(f, "{}", self.fmt_magnitude(self.value))
        }
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.value == other.value
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.kind != other.kind {
            return None;
        }
        Some(self.value.cmp(&other.value))
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Serde adapters for optional quantity fields whose kind is known from context
pub mod serde_opt {
    use super::{Quantity, ResourceKind};
    use serde::{Deserialize, Deserializer, Serializer};

    fn deserialize_kind<'de, D>(kind: ResourceKind, d: D) -> Result<Option<Quantity>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| Quantity::parse(kind, &s).map_err(serde::de::Error::custom))
            .transpose()
    }

    fn serialize_opt<S: Serializer>(q: &Option<Quantity>, s: S) -> Result<S::Ok, S::Error> {
        match q {
            Some(q) => s.collect_str(q),
            None => s.serialize_none(),
        }
    }

    pub mod cpu {
        use super::*;

        pub fn serialize<S: Serializer>(q: &Option<Quantity>, s: S) -> Result<S::Ok, S::Error> {
            serialize_opt(q, s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Quantity>, D::Error> {
            deserialize_kind(ResourceKind::Cpu, d)
        }
    }

    pub mod memory {
        use super::*;

        pub fn serialize<S: Serializer>(q: &Option<Quantity>, s: S) -> Result<S::Ok, S::Error> {
            serialize_opt(q, s)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Quantity>, D::Error> {
            deserialize_kind(ResourceKind::Memory, d)
        }
    }
}
