use chrono::{DateTime, Utc};

use crate::contact::ContactRecord;

/// Records pulled out of one response.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub records: Vec<ContactRecord>,
    /// Regions that looked like records but failed validation.
    pub malformed: usize,
    /// Field names seen on the first record, for diagnostics.
    pub sample_fields: Vec<String>,
}

/// Wire vocabulary of a logging program's TCP interface.
///
/// The client owns the socket and framing timeouts; a dialect owns the
/// command text, the end-of-response marker, and record decoding.
pub trait Dialect: Send + Sync + 'static {
    /// Sent once after each connect, when the program wants one.
    fn handshake(&self) -> Option<String> {
        None
    }

    /// Command asking for the last `count` logged contacts.
    fn list_command(&self, count: usize) -> String;

    /// True once `buf` holds a full response.
    fn response_complete(&self, buf: &[u8]) -> bool;

    /// Decodes a response. Bad records are counted, never fatal.
    fn decode(&self, text: &str, reference: DateTime<Utc>) -> Decoded;
}
