//! Shared types for the HULK front end.
//!
//! Every AST node and every diagnostic is tagged with the 1-based source
//! [`Line`] it originates from. [`LineIndex`] maps those lines back to byte
//! ranges when a diagnostic is rendered against the original source text.

pub mod line;

pub use line::{Line, LineIndex};
