//! Infrastructure layer: fetching, parsing, persistence and process plumbing
//!
//! Everything that touches the network, the file system or HTML markup lives
//! here; the domain layer stays free of I/O.

pub mod category_discoverer;
pub mod config;
pub mod corpus_store;
pub mod http_client;
pub mod logging;
pub mod page_walker;
pub mod parsing;
pub mod parsing_error;

pub use category_discoverer::{CategoryDiscoverer, Discovery};
pub use config::{ActualizationPolicy, AppConfig, ConfigManager, CrawlingConfig, HttpConfig};
pub use corpus_store::{CategoryStore, ControlLogEntry, CorpusLayout, StoreError};
pub use http_client::HttpClient;
pub use logging::{init_logging, init_logging_with_config};
pub use page_walker::{Page, PageWalker};
pub use parsing::{ListingParser, ParseContext, ParsingError, ParsingResult, ReviewParser};
