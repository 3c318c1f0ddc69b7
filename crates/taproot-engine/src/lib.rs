//! Taproot Engine — retrieval, overlay semantics, and bulk ingestion

pub mod ingest;
pub mod overlay;
pub mod repo;
pub mod retrieval;

#[cfg(test)]
pub mod tests;

pub use ingest::{Cancelled, IngestEvent, IngestStatus, IngestStep, ingest};
pub use overlay::apply_overlay;
pub use repo::{
    LocalRepoProvider, MAX_FILE_BYTES, RepoProvider, block_globs_for, build_blockset,
    default_block_globs, filter_files, read_repo_files,
};
pub use retrieval::{Retriever, RetrieverTuning, edge_weight, is_test_file, rank_hits};
