/// External web search used to find the document that answers a query.
///
/// This module provides a blocking SerpApi client, the trait the resolver
/// depends on, and the rules for recognising document-site results.
mod client;
mod result;

pub use client::{SearchClientTrait, SearchError, SerpApiClient, SerpApiClientBuilder};
pub use result::{SearchResult, TITLE_SEPARATOR, first_document_title};
