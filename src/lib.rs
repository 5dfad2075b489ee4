//! `mailferry`: fetch remote groupware messages into a local mailbox.
//!
//! The core is the transcriber, which turns a remote message into a standard
//! RFC 5322 / MIME document. Around it sit a remote source, a local sink
//! (mbox or MH) with an optional duplicate index, and the fetch driver that
//! ties them together.

pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod render;
pub mod sink;
pub mod source;
pub mod transcribe;
