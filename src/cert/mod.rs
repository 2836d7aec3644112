//! Certificate generation module.
//!
//! This module builds the authority, signing requests, authority-signed leaf
//! certificates and PKCS#12 bundles, and verifies what it produced.

pub mod authority;
pub mod builder;
pub mod bundle;
pub mod leaf;
pub mod loader;
pub mod profile;
pub mod request;
pub mod verify;
