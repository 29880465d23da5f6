//! Ratio and margin transforms over quantities
//!
//! Every transform is a no-op when its literal is empty, so unconfigured
//! policy never changes a value.

use crate::quantity::{Quantity, QuantityFormat, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Bytes of memory assumed per milli-CPU when memory derives from CPU
pub const MEMORY_BYTES_PER_MILLI_CPU: i64 = 1_000_000;

/// How a calculator literal is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorAlgo {
    /// Multiply by a float factor
    Ratio,
    /// Add an absolute quantity
    Margin,
}

impl fmt::Display for CalculatorAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalculatorAlgo::Ratio => write!(f, "ratio"),
            CalculatorAlgo::Margin => write!(f, "margin"),
        }
    }
}

impl FromStr for CalculatorAlgo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ratio" => Ok(CalculatorAlgo::Ratio),
            "margin" => Ok(CalculatorAlgo::Margin),
            other => Err(format!("unknown calculator algorithm '{other}'")),
        }
    }
}

/// Apply `algo` with `literal` to `current`
///
/// An empty literal returns `current` unchanged. A literal that fails to
/// parse is logged and also returns `current`.
pub fn apply_algo(current: Quantity, algo: CalculatorAlgo, literal: &str) -> Quantity {
    let literal = literal.trim();
    if literal.is_empty() {
        return current;
    }

    match algo {
        CalculatorAlgo::Ratio => match literal.parse::<f64>() {
            Ok(ratio) if ratio.is_finite() => current.scale(ratio),
            _ => {
                warn!(
                    algo = %algo,
                    value = %literal,
                    "Invalid ratio, leaving quantity unchanged"
                );
                current
            }
        },
        CalculatorAlgo::Margin => match Quantity::parse(current.kind(), literal) {
            Ok(margin) => current.checked_add(&margin).unwrap_or_else(|| {
                warn!(value = %literal, "Margin overflows quantity, leaving unchanged");
                current
            }),
            Err(e) => {
                warn!(
                    algo = %algo,
                    value = %literal,
                    error = %e,
                    "Invalid margin, leaving quantity unchanged"
                );
                current
            }
        },
    }
}

/// Estimate a memory amount from a CPU amount
pub fn cpu_to_memory_heuristic(cpu: Quantity) -> Quantity {
    let bytes = cpu.value().saturating_mul(MEMORY_BYTES_PER_MILLI_CPU);
    Quantity::new(ResourceKind::Memory, bytes, QuantityFormat::DecimalSi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(s: &str) -> Quantity {
        Quantity::parse(ResourceKind::Cpu, s).unwrap()
    }

    fn mem(s: &str) -> Quantity {
        Quantity::parse(ResourceKind::Memory, s).unwrap()
    }

    #[test]
    fn test_empty_literal_is_identity() {
        for q in [cpu("100m"), cpu("3"), mem("256Mi"), mem("1G"), Quantity::zero(ResourceKind::Cpu)] {
            for algo in [CalculatorAlgo::Ratio, CalculatorAlgo::Margin] {
                let out = apply_algo(q, algo, "");
                assert_eq!(out, q);
                assert_eq!(out.to_string(), q.to_string());
            }
        }
    }

    #[test]
    fn test_ratio() {
        assert_eq!(apply_algo(cpu("100m"), CalculatorAlgo::Ratio, "2").to_string(), "200m");
        assert_eq!(apply_algo(mem("256Mi"), CalculatorAlgo::Ratio, "0.5").to_string(), "128Mi");
        assert_eq!(apply_algo(cpu("150m"), CalculatorAlgo::Ratio, "1.1").value(), 165);
    }

    #[test]
    fn test_margin() {
        assert_eq!(apply_algo(cpu("100m"), CalculatorAlgo::Margin, "50m").to_string(), "150m");
        assert_eq!(apply_algo(mem("128Mi"), CalculatorAlgo::Margin, "64Mi").to_string(), "192Mi");
        assert_eq!(apply_algo(cpu("100m"), CalculatorAlgo::Margin, "-20m").to_string(), "80m");
    }

    #[test]
    fn test_invalid_literal_returns_current() {
        assert_eq!(apply_algo(cpu("100m"), CalculatorAlgo::Ratio, "double"), cpu("100m"));
        assert_eq!(apply_algo(cpu("100m"), CalculatorAlgo::Ratio, "NaN"), cpu("100m"));
        assert_eq!(apply_algo(mem("1Gi"), CalculatorAlgo::Margin, "lots"), mem("1Gi"));
    }

    #[test]
    fn test_cpu_to_memory_heuristic() {
        let memory = cpu_to_memory_heuristic(cpu("150m"));
        assert_eq!(memory.kind(), ResourceKind::Memory);
        assert_eq!(memory.value(), 150_000_000);
        assert_eq!(memory.to_string(), "150M");
    }

    #[test]
    fn test_algo_from_str() {
        assert_eq!("Ratio".parse::<CalculatorAlgo>(), Ok(CalculatorAlgo::Ratio));
        assert_eq!(" margin ".parse::<CalculatorAlgo>(), Ok(CalculatorAlgo::Margin));
        assert!("percent".parse::<CalculatorAlgo>().is_err());
    }
}
