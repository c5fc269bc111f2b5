//! Provider API interaction module
//!
//! # Module Structure
//!
//! - [`client`] - [`ProviderClient`], the HTTP-backed [`ResourceLister`](crate::resource::ResourceLister)
//! - [`http`] - HTTP utilities and operator-facing error formatting
//!
//! # Example
//!
//! ```ignore
//! use aec::provider::ProviderClient;
//! use aec::resource::{get_family, fetch_all, ProviderFilter};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ProviderClient::new("https://api.example.test", "eu-west-1")?;
//!     let family = get_family("instances").unwrap();
//!     let instances = fetch_all(&client, family, &ProviderFilter::all(), 1000).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;

pub use client::ProviderClient;
pub use http::format_provider_error;
