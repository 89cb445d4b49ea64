#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Overview
//!
//! `transfer` is the top of the workspace: it owns the filesystem sink
//! seam ([`sink`]), the receiver-side generator ([`generator`]) and
//! token-stream consumer ([`receiver`]), the sender-side signature
//! responder ([`sender`]), the bounded pipe that decouples token
//! decoding from sink writes ([`pipe`]), the closing statistics frame
//! ([`stats`]), and the session orchestrator that ties all of the above
//! to `protocol`'s handshake and multiplexing and `flist`'s file-list
//! codec ([`session`]).
//!
//! Everything below this crate (`protocol`, `checksums`, `signature`,
//! `matching`, `flist`) is pure: no threads, no filesystem, no sockets.
//! This crate is where those pure pieces meet `std::thread::scope` and
//! the caller-supplied [`sink::FilesystemSink`].

pub mod error;
pub mod generator;
pub mod pipe;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod sink;
pub mod stats;

pub use error::{SessionError, SessionResult};
pub use generator::{run_generator, GeneratorOptions};
pub use receiver::{receive_data, run_receiver};
pub use sender::run_sender;
pub use session::{
    run_receiver_session, run_sender_session, LocalIdResolver, NullIdResolver, SessionOptions,
    SessionState,
};
pub use sink::{FilesystemSink, LocalMetadata, SeekRead, SinkError};
pub use stats::{read_stats, write_stats, Stats};
