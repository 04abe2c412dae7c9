//! # remfs Architecture
//!
//! remfs presents the document library of a reMarkable tablet — a flat
//! collection of id-keyed metadata, content descriptors and payloads —
//! as an ordinary hierarchical filesystem. This crate is a **UI-agnostic
//! library** with a thin FUSE binary on top; the library knows nothing
//! about mountpoints or processes.
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Binary (main.rs + cli.rs)                                  │
//! │  - clap parsing, env_logger, signal handling, mount loop    │
//! │  - The ONLY place that knows about stdin/stderr/exit codes  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Filesystem adapter (fs/)                                   │
//! │  - fuser::Filesystem dispatch, inode + handle tables        │
//! │  - Translates every model error to a POSIX code             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Document model (model/)                                    │
//! │  - Flat-to-tree reconstruction, name policy, lifecycles     │
//! │  - Upload pipeline: buffer → detect → convert → persist     │
//! │  - Lazy notebook rendering via lines/ + templates           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Transport (transport/)                                     │
//! │  - Flat synchronous key/value store: the device directory   │
//! │  - LocalDirectory (offline), InMemoryTransport (tests)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency model
//!
//! The mount is **single-threaded cooperative**: one FUSE session loop
//! serialises every operation against the model, so the registry, child
//! maps, handle table and upload buffers need no locks. Every transport
//! call is a suspension point that blocks the whole filesystem; that is
//! a deliberate trade for a model with no shared-state hazards.
//!
//! ## Module overview
//!
//! - [`model`]: node registry, tree reconstruction, lifecycle operations
//! - [`transport`]: the flat-store seam the model persists through
//! - [`lines`]: `.lines` stroke decoding and PDF rendering
//! - [`templates`]: page-template PNG cache
//! - [`fs`]: the FUSE operation dispatcher
//! - [`session`]: device hooks, scoped cleanup, signal conversion
//! - [`error`]: error kinds and their POSIX translations

pub mod error;
pub mod fs;
pub mod lines;
pub mod model;
pub mod session;
pub mod templates;
pub mod transport;
