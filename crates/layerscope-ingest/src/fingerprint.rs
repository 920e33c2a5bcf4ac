//! Content fingerprinting.

use std::io::{self, Read};

use layerscope_core::ContentHash;

const BUFFER_SIZE: usize = 64 * 1024;

/// Compute the BLAKE3 fingerprint of everything `reader` yields.
pub fn fingerprint_reader(mut reader: impl Read) -> io::Result<ContentHash> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}
