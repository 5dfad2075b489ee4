//! Reading existing mail: header decoding and the streaming MBOX scanner.

pub mod header;
pub mod mbox;
