//!
//! src/lib.rs
//!
//! Artist import pipeline: article and knowledge base extraction into
//! one artist record, discography listing, tracklists and release
//! persistence
//!

pub mod config;
pub mod errors;
pub mod logging;

pub mod types;
pub mod markup;
pub mod years_active;
pub mod genre;
pub mod country;
pub mod infobox;
pub mod knowledge_base;
pub mod discography;
pub mod tracklist;

pub mod source;
pub mod fetch;
pub mod translate;
pub mod images;
pub mod persistent;
pub mod sink;

pub mod importer;

pub use errors::ImportError;
pub use importer::{Collaborators, Importer};
