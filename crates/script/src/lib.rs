//! # Pengate Script
//!
//! The batch-edit mini-script the model uses to change the document:
//!
//! ```text
//! hero=I(document, {type: "frame", layout: "vertical", width: 1440})
//! title=I(hero, {type: "text", content: "Welcome"})
//! card=C("CardComponent", hero, {descendants: {title: {content: "Pro", fontSize: 24}}})
//! U(title, {fontSize: 48})
//! G(hero, "stock", "mountain lake at sunrise")
//! ```
//!
//! A script is parsed and validated as a whole before anything runs, then
//! executed in order under the document lock. The first failing operation
//! stops the script; earlier operations stay applied.

mod error;
mod interpreter;
mod lexer;
mod ops;
mod parser;

pub use error::ScriptError;
pub use interpreter::{
    AppliedOperation, DEFAULT_COPY_PADDING, Interpreter, OperationFailure, ScriptReport,
};
pub use ops::{Bindings, OpTag, Operation, PathExpr, PathPart, ROOT_BINDING, Script, Statement};
pub use parser::{MAX_NESTING, MAX_OPERATIONS, parse_script};
