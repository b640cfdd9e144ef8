//! citemill-ingestion: the bronze stage.
//!
//! Resolves topic labels to OpenAlex concepts, pages through the works
//! listing, and persists timestamped raw batches into the bronze area.

pub mod bronze;
pub mod sources;
