//! Core utilities for the LPL language toolchain.
//!
//! This crate provides the core compiler pipeline for the LPL language.
//! The pipeline is roughly:
//!
//!   source .lpl
//!     -> lexer   (tokens)
//!     -> parser  (surface AST)
//!     -> checker (checked target: names resolved, constants folded)
//!     -> builder (processor instructions, rendered as assembly)
//!
//! Higher-level tools (CLI, editors, etc.) should depend on this crate
//! rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod error;
pub mod span;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod ast;
pub mod lexer;
pub mod parser;

// ---------------------------------------------------------------------
// Semantic layers: resolution, folding, checked model
// ---------------------------------------------------------------------

pub mod checker;
pub mod scope;
pub mod semantic;

// ---------------------------------------------------------------------
// Builtins of the target processor
// ---------------------------------------------------------------------

pub mod builtins;

// ---------------------------------------------------------------------
// Back-end: instruction selection and compiler orchestration
// ---------------------------------------------------------------------

pub mod builder;
pub mod compiler;
pub mod program;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{Compilation, compile};
pub use error::CoreError;
