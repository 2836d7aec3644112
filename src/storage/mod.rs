//! PKI directory storage.
//!
//! Path layout, the authority serial file, the workflow state record, the
//! directory lock and transactional artifact writes.

pub mod layout;
pub mod lock;
pub mod serial;
pub mod state;
pub mod writer;
