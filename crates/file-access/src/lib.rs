//! Byte-stream access to files, devices, pipes and standard input.
//!
//! [`FileAccess`] hides how an endpoint is read (paced blocking reads, a
//! bounded readiness wait, or blind retries for unreliable drivers) behind one
//! read/seek interface, tracks the endpoint size as it grows, and clamps seeks
//! to the known bounds. [`AccessStream`] adapts an opened source to
//! `std::io::{Read, Seek}` and Symphonia's `MediaSource` for the demuxer.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod handle;
pub mod media;
pub mod probe;
pub mod reader;
pub mod source;
pub mod state;

pub use config::AccessConfig;
pub use endpoint::{AccessMode, AccessRequest};
pub use error::{OpenError, ReadError};
pub use media::AccessStream;
pub use reader::{ReadStrategy, SeekOutcome};
pub use source::{FileAccess, Opened};
pub use state::{InputFlags, SharedStream, StreamState};
