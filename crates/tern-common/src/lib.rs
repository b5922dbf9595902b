//! Shared types for the Tern compiler.
//!
//! Every node handed to the type checker carries a [`Span`]; diagnostics
//! convert spans to line/column pairs through a [`LineIndex`] only when they
//! are rendered.

pub mod span;

pub use span::{LineIndex, Span};
