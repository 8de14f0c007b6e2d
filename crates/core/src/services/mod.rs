//! File-backed services operating on a [`crate::db::SymbolDb`]:
//! - [`signatures`]: the binary signature library (create/load/save/apply).
//! - [`mapfile`]: the text symbol map codec.
//! - [`renames`]: bulk name overrides keyed by address.

pub mod mapfile;
pub mod renames;
pub mod signatures;
mod util;

pub use mapfile::MapLoadReport;
pub use renames::RenameReport;
pub use signatures::{HashReport, SignatureDb, SignatureRecord};
