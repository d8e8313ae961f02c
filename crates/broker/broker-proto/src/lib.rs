//! Wire protocol between the broker and its clients: a 4-byte big-endian
//! length prefix followed by a JSON payload, plus a preshared-key handshake
//! sent as the first frame on every connection.

pub mod framing;
pub mod protocol;

pub use framing::{authenticate, read_frame, read_request, write_frame, write_response, FramingError};
pub use protocol::{ArchiveSpec, Request, Response};
