//! Cryptographic primitives.
//!
//! RSA key generation, PKCS#8 encoding, and PKCS#1 v1.5 / SHA-256 signatures
//! used for every certificate and signing request this crate produces.
//!
//! # Example
//!
//! ```rust
//! use farm_pki::crypto::keys::{generate_rsa_keypair, verify_signature};
//!
//! # fn example() -> farm_pki::error::Result<()> {
//! let keypair = generate_rsa_keypair(1024)?;
//! let signature = keypair.sign(b"payload")?;
//! verify_signature(&keypair.subject_public_key_info()?, b"payload", &signature)?;
//! # Ok(())
//! # }
//! ```

pub mod keys;
