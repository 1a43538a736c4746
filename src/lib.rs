//! payconnect: the HTTP connector pipeline of a payments API client.
//!
//! A request passes through an ordered list of decorators (basic auth,
//! retries with jittered backoff and cancellation) before reaching a single
//! `reqwest`-backed connector. The outermost layer decodes typed responses
//! and maps transport failures to domain [`failure::Failure`]s.
//!
//! # Quick start
//!
//! ```no_run
//! use payconnect::config::load_config;
//! use payconnect::connector::{ConnectorBuilder, Request};
//! use serde_json::Value;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let connector = ConnectorBuilder::from_config(&config).unwrap().build().unwrap();
//! let response = connector
//!     .execute(&Request::<Value>::get("/invoices/iv_123"))
//!     .await
//!     .unwrap();
//! println!("{}", response.value);
//! # }
//! ```

pub mod build_info;
pub mod cancel;
pub mod config;
pub mod connector;
pub mod error;
pub mod failure;
pub mod lock;
pub mod retry;
#[cfg(test)]
pub mod testsupport;
