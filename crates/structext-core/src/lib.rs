// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structext Core - structured text compiler and document publisher
//!
//! This crate provides:
//! - A line-oriented markup parser with inline macros and links
//! - A property-bearing document tree held in a caller-owned store
//! - A registrar API for building documents programmatically
//! - Publishers for plain text, XHTML and generic XML
//! - C FFI exports for embedding hosts

pub mod ast;
pub mod builder;
pub mod eval;
pub mod formats;
pub mod parser;
pub mod publish;
pub mod store;
pub mod textutil;
pub mod traits;

#[cfg(feature = "ffi")]
pub mod ffi;

pub use ast::{Form, Node, NodeId, PropValue, Props};
pub use builder::{Content, Registrar};
pub use eval::{EvalError, Evaluator, MacroScope, SymbolEvaluator, SymbolTable};
pub use formats::{HtmlPublisher, TextPublisher, XmlPublisher};
pub use parser::Parser;
pub use publish::{generate_toc, publish, publish_to_string, At, PublishContext};
pub use store::DocumentStore;
pub use traits::{Error, OutputFormat, PublishConfig, Publisher, PublisherRegistry, Result, StyleVariant};
