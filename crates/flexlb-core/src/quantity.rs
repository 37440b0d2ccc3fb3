//! Kubernetes resource quantity parsing.
//!
//! Canonical internal units are f64 millicores for CPU and f64 bytes for
//! memory. Parsing is total: every input maps to either a value or an
//! [`CoreError::InvalidQuantity`]; callers treat a parse failure as zero.

use crate::error::{CoreError, Result};

/// Memory suffixes, longest first so that "Mi" is never read as "M".
const MEMORY_UNITS: [(&str, f64); 8] = [
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
    ("K", 1000.0),
    ("M", 1000.0 * 1000.0),
    ("G", 1000.0 * 1000.0 * 1000.0),
    ("T", 1000.0 * 1000.0 * 1000.0 * 1000.0),
];

/// Parse a CPU quantity (e.g. "100m", "2", "500000000n") to millicores.
///
/// Empty input parses to 0.
pub fn parse_cpu(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }

    if let Some(milli) = s.strip_suffix('m') {
        milli
            .parse::<f64>()
            .map_err(|e| CoreError::invalid_quantity(s, e.to_string()))
    } else if let Some(nano) = s.strip_suffix('n') {
        nano.parse::<f64>()
            .map(|v| v / 1_000_000.0)
            .map_err(|e| CoreError::invalid_quantity(s, e.to_string()))
    } else {
        s.parse::<f64>()
            .map(|cores| cores * 1000.0)
            .map_err(|e| CoreError::invalid_quantity(s, e.to_string()))
    }
}

/// Parse a memory quantity (e.g. "128Mi", "1G", "1024") to bytes.
///
/// Binary suffixes (Ki/Mi/Gi/Ti) are powers of 1024, decimal suffixes
/// (K/M/G/T) powers of 1000. Empty input parses to 0.
pub fn parse_memory(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }

    for (unit, multiplier) in MEMORY_UNITS {
        if let Some(num) = s.strip_suffix(unit) {
            return num
                .parse::<f64>()
                .map(|v| v * multiplier)
                .map_err(|e| CoreError::invalid_quantity(s, e.to_string()));
        }
    }

    // Plain bytes
    s.parse::<f64>()
        .map_err(|e| CoreError::invalid_quantity(s, e.to_string()))
}
