//! Request fingerprints for cache keys.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io;

/// SHA-256 of the value's JSON form, as 64 lowercase hex characters.
///
/// The JSON is streamed into the hasher rather than buffered. Requests are
/// built from structs and vectors only, so field order and therefore the
/// digest are stable.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut writer = HashWriter(Sha256::new());
    serde_json::to_writer(&mut writer, value)?;
    Ok(format!("{:x}", writer.0.finalize()))
}

struct HashWriter(Sha256);

impl io::Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
