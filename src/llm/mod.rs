pub mod client;
pub mod scripted;
pub mod term_lookup;

pub use client::{ClientConfig, CompletionClient, HttpCompletionClient, TransportError};
pub use scripted::ScriptedCompletionClient;
pub use term_lookup::{describe_terms, LookupOptions};
