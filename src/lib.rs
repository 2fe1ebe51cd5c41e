//! A build-orchestration engine for the Protocol Buffers compiler.
//!
//! Given a declarative [`request::GenerationRequest`], this crate locates a
//! `protoc` binary, resolves code-generation plugins, gathers `.proto`
//! sources and descriptor sets from local directories and transitively
//! resolved dependencies, decides which files need recompiling via a
//! content-digest cache, runs a single `protoc` invocation, and reports a
//! [`request::GenerationResult`].
//!
//! See [`orchestrator::BuildOrchestrator`] for the entry point.

#![warn(rustdoc::all)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

pub mod argfile;
pub mod artifact;
pub mod digest;
pub mod error;
pub mod executor;
pub mod fsutils;
pub mod host;
pub mod incremental;
pub mod invocation;
pub mod orchestrator;
pub mod platform;
pub mod plugin_resolver;
pub mod project_input;
pub mod protoc_resolver;
pub mod request;
pub mod sanctioned;
pub mod system_path;
pub mod tempspace;
pub mod uri;

pub use error::{Error, Result};
pub use orchestrator::BuildOrchestrator;
pub use request::{GenerationOutcome, GenerationRequest, GenerationResult, ProtocInvocationReport};
