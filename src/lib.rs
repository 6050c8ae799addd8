//! # class-scope
//!
//! Class lookup, source recovery and structure analysis for the jars a Maven
//! project depends on.
//!
//! ## Architecture
//!
//! - **archive**: memory-mapped jar reading and single-entry extraction
//! - **indexer**: per-project class→jar index built from `mvn dependency:list`
//!   or a sweep of the local repository
//! - **recover**: CFR-backed decompiled-source cache
//! - **analyze**: `javap -v` report parsing into a typed class description
//! - **store**: per-project state directory layout
//! - **toolchain** / **process**: external tool invocation with timeouts
//! - **scan**: jar discovery and Maven coordinate parsing
//! - **unit**: validated class names and their path mappings
//! - **config** / **error**: settings resolution and the error taxonomy

pub mod analyze;
pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod indexer;
pub mod process;
pub mod recover;
pub mod scan;
pub mod store;
pub mod toolchain;
pub mod unit;
