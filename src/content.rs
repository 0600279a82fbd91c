/// External content source that returns a document's full text by title.
///
/// Full documents are fetched on demand and never cached; only title
/// resolutions are persisted.
mod client;

pub use client::{ContentSourceTrait, FetchError, WikipediaClient, WikipediaClientBuilder};
