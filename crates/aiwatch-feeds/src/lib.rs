//! Feed ingestion: the parser registry, the RSS/Atom and JSON-API parsers,
//! and the raw-entry transformer.

pub mod api;
pub mod error;
pub mod factory;
pub mod fetch;
pub mod parser;
pub mod rss;
pub mod transform;

pub use api::ApiParser;
pub use error::FeedError;
pub use factory::ParserFactory;
pub use fetch::{EndpointFetcher, HttpConfig};
pub use parser::{Parser, RawEntries, RawEntry};
pub use rss::{RssParser, XmlEntries};
pub use transform::{
    clean_text, parse_published_date, transform, transform_all, transform_all_until,
    TransformOutput,
};
