//! Discovery implementations.
//!
//! - [`PageLinkDiscovery`] - links found on the base page
//! - `FirecrawlDiscovery` - Firecrawl map API (feature `firecrawl`)

pub mod links;

#[cfg(feature = "firecrawl")]
pub mod firecrawl;

pub use links::PageLinkDiscovery;

#[cfg(feature = "firecrawl")]
pub use firecrawl::FirecrawlDiscovery;
