//! Distro Sources - outbound data sources for templates
//!
//! A version folder may declare named HTTP APIs under `datasources`.
//! Templates reach them through an `api(name, ...)` function, which ends up
//! in [`DataSources::call`]. Sources declared with `auth: iam` are signed
//! with AWS Signature Version 4 for the `execute-api` service.
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use distro_core::DataSourceSpec;
//! use distro_sources::DataSources;
//!
//! # async fn example() -> Result<(), distro_sources::SourceError> {
//! let mut specs = BTreeMap::new();
//! specs.insert(
//!     "inventory".to_string(),
//!     serde_json::from_str::<DataSourceSpec>(r#"{"url": "http://inventory/api"}"#).unwrap(),
//! );
//!
//! let sources = DataSources::new(&specs)?;
//! let response = sources.call("inventory", "hosts", "mac=aa:bb", "").await?;
//! println!("{} {}", response.status, response.data);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod signing;
pub mod source;

pub use client::{ApiResponse, DataSources};
pub use error::SourceError;
pub use signing::{IamSigner, SIGNING_SERVICE};
pub use source::DataSource;
