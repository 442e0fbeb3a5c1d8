//! # sixscope
//!
//! Address resolution and classification for dual-stack (IPv4/IPv6) hosts.
//!
//! `sixscope` resolves hostnames and enumerates the local machine's own
//! interface addresses through the operating system's native resolver
//! libraries, loaded dynamically at runtime, then normalizes and classifies
//! every address by routing scope. Missing platform facilities degrade to
//! portable fallbacks instead of failing.
//!
//! ## Features
//!
//! - **Native resolution**: `getaddrinfo`/`getifaddrs`/`GetAdaptersAddresses`
//!   bound at runtime, with per-symbol degradation
//! - **Per-platform layouts**: record offsets described as data, one table
//!   per OS, shared walk code
//! - **Scope classification**: RFC 3330 IPv4 ranges and the conventional
//!   IPv6 prefix classes, from canonical textual form only
//! - **Async worker**: strictly ordered request processing with correlated
//!   replies and cooperative cancellation
//! - **Proxy-DNS guard**: refuses lookups whose answers a remote-resolving
//!   proxy would make wrong
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sixscope::engine::ScopeEngine;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (engine, _notifications) = ScopeEngine::connect().await.unwrap();
//!     let result = engine.get_classification("example.com").await.unwrap();
//!     for entry in &result.remote_addresses {
//!         println!("{} is {}", entry.address, entry.scope);
//!     }
//!     println!("likely using IPv6: {}", result.likely_using_v6);
//!     engine.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions
//! - [`addr`] - Address normalization, classification and record decoding
//! - [`native`] - Platform layout tables and the dynamic native binding
//! - [`resolver`] - Remote and local resolvers with fallback paths
//! - [`worker`] - The async resolution worker and its message protocol
//! - [`proxy`] - Proxy settings and the proxy-DNS guard
//! - [`engine`] - The top-level classification surface

pub mod addr;
pub mod base;
pub mod engine;
pub mod native;
pub mod proxy;
pub mod resolver;
pub mod worker;
