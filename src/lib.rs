//! farm-pki: certificate authority and leaf certificates for a render farm.
//!
//! This library manages a local PKI directory:
//!
//! - Create a self-signed certificate authority and its usage policy
//! - Issue a server certificate for the load balancer and a client
//!   certificate for render nodes, each with a PKCS#12 bundle
//! - Publish the server certificate to a remote certificate store and record
//!   its identifier in a remote parameter store
//!
//! # Architecture
//!
//! Operations are small functions composed by [`workflow::Workflow`]. Every
//! precondition is an artifact on disk, checked under an exclusive directory
//! lock; every failure is returned as a [`PkiError`] and aborts the operation
//! without leaving partial files.
//!
//! # Example
//!
//! ```rust,no_run
//! use farm_pki::config::PkiConfig;
//! use farm_pki::workflow::Workflow;
//!
//! fn example() -> farm_pki::Result<()> {
//!     let mut config = PkiConfig::new("/srv/pki");
//!     config.dns_name = Some("farm-lb.example.com".to_string());
//!
//!     let workflow = Workflow::new(config)?;
//!     workflow.create_authority()?;
//!     let server = workflow.create_server_certificate()?;
//!     println!("server certificate serial {}", server.serial_hex);
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod config;
pub mod crypto;
pub mod error;
pub mod publish;
pub mod storage;
pub mod workflow;

// Re-export commonly used types
pub use error::{PkiError, Result};
