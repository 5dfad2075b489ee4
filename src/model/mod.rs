//! Data model: remote messages, addresses, attachments and local documents.

pub mod address;
pub mod attachment;
pub mod document;
pub mod remote;
