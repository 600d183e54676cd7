pub mod config;
pub mod domain;
pub mod entrez;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod search;
pub mod summary;
pub mod taxonomy;
