//! Authority serial-number tracking.
//!
//! `ca.srl` holds the serial of the most recently issued leaf as uppercase
//! hex, the same format `openssl x509 -CAserial` maintains. Every leaf
//! issuance advances it, so no two leaves from one authority share a serial.

use crate::error::{PkiError, Result};
use crate::storage::writer::replace_file;
use rand::Rng;
use std::fs;
use std::path::PathBuf;

/// Serials stay below 2^127 so the DER encoding is at most 16 octets.
const SERIAL_LIMIT: u128 = 1 << 127;

/// Handle on the serial-number file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialFile {
    path: PathBuf,
}

impl SerialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The last recorded serial, or `None` before the first issuance.
    pub fn current(&self) -> Result<Option<u128>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        parse_serial(contents.trim()).map(Some)
    }

    /// Reserve and persist the next serial.
    ///
    /// Starts from a random value when the file does not exist yet. Callers
    /// hold the directory lock.
    pub fn advance(&self) -> Result<u128> {
        let next = match self.current()? {
            Some(current) => current
                .checked_add(1)
                .filter(|n| *n < SERIAL_LIMIT)
                .ok_or_else(|| {
                    PkiError::CertificateError("Serial number space exhausted".to_string())
                })?,
            None => initial_serial(),
        };

        replace_file(&self.path, format!("{}\n", format_serial(next)).as_bytes())?;
        tracing::debug!(serial = %format_serial(next), "advanced authority serial");
        Ok(next)
    }
}

/// Format as even-length uppercase hex.
pub fn format_serial(serial: u128) -> String {
    let hex = format!("{:X}", serial);
    if hex.len() % 2 == 1 {
        format!("0{}", hex)
    } else {
        hex
    }
}

fn parse_serial(hex: &str) -> Result<u128> {
    u128::from_str_radix(hex, 16)
        .ok()
        .filter(|n| *n < SERIAL_LIMIT)
        .ok_or_else(|| PkiError::ParseError(format!("Invalid serial file contents: '{}'", hex)))
}

fn initial_serial() -> u128 {
    // Leave headroom below the limit so increments never overflow in practice.
    rand::thread_rng().gen_range(1..SERIAL_LIMIT >> 1)
}
