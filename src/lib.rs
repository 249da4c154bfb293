// Keyscrub Library
// Replaces sensitive literals in text files with stable placeholders and keeps
// a reversible key list so the same value maps to the same placeholder across
// files and runs.

pub mod sanitizer;

pub use sanitizer::{
    merge, sanitize, scout, KeyList, KeyTable, Orchestrator, SanitizerConfig, SanitizerError,
};
