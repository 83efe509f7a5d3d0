//! Block-graph editor core for grammar-of-graphics scripts.
//!
//! This crate keeps two isomorphic views of a plot-building program in
//! sync: a typed block graph (what a canvas surface edits) and the linear
//! script text derived from it. The graph side is the source of truth for
//! identity, layout and manual connections; the text side is regenerated by
//! [`generator`] on every mutation and re-ingested through [`importer`] +
//! [`reconcile`] when the user edits the script directly.
//!
//! Canvas rendering, the embedded text editor and the external parser and
//! execution runtime are deliberately out of scope; [`ast`] documents the
//! parse-forest shape this crate consumes, and [`document`] is the owned,
//! single-writer entry point a surface drives.

pub mod ast;
pub mod catalog;
pub mod document;
pub mod generator;
pub mod importer;
pub mod layout;
pub mod model;
pub mod reconcile;
pub mod template;
pub mod validate;
