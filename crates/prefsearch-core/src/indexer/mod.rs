//! Asynchronous build pipeline inputs and the writer that runs it.
//!
//! - Field-tree parsing (`field_tree`)
//! - Hyphen normalization into physical rows (`normalize`)
//! - Locale-scoped transactional writes (`writer`)

pub mod field_tree;
pub mod normalize;
mod writer;

pub use field_tree::{parse_field_tree, FieldNode, FieldTree};
pub use normalize::{rows_for_entry, LogicalEntry, HYPHEN, NON_BREAKING_HYPHEN};
pub use writer::{BuildReport, DescriptorFailure, IndexWriter};
