//! Package format detection by signature sniffing

use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

/// Zip local file header
const ZIP_LOCAL_HEADER: [u8; 4] = *b"PK\x03\x04";
/// Zip end of central directory (empty archive)
const ZIP_EMPTY_ARCHIVE: [u8; 4] = *b"PK\x05\x06";

/// How a package is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    /// Provisioning markup document
    RawMarkup,
    /// Zip container holding the markup and its assets
    CompoundContainer,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawMarkup => write!(f, "markup"),
            Self::CompoundContainer => write!(f, "container"),
        }
    }
}

/// Sniff the format of a stream
///
/// Reads at most four bytes and rewinds the stream to where it started, so
/// the caller can hand the same stream to the decoder.
pub fn detect<S: Read + Seek + ?Sized>(stream: &mut S) -> Result<Format> {
    let start = stream.stream_position()?;

    let mut signature = [0u8; 4];
    let mut filled = 0;
    while filled < signature.len() {
        match stream.read(&mut signature[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    stream.seek(SeekFrom::Start(start))?;

    let format = if filled == signature.len()
        && (signature == ZIP_LOCAL_HEADER || signature == ZIP_EMPTY_ARCHIVE)
    {
        Format::CompoundContainer
    } else {
        Format::RawMarkup
    };
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect_markup() {
        let mut stream = Cursor::new(b"<?xml version=\"1.0\"?><Provisioning/>".to_vec());
        assert_eq!(detect(&mut stream).unwrap(), Format::RawMarkup);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_detect_container() {
        let mut stream = Cursor::new(b"PK\x03\x04rest-of-archive".to_vec());
        assert_eq!(detect(&mut stream).unwrap(), Format::CompoundContainer);

        let mut empty = Cursor::new(b"PK\x05\x06\0\0".to_vec());
        assert_eq!(detect(&mut empty).unwrap(), Format::CompoundContainer);
    }

    #[test]
    fn test_detect_rewinds_to_start_position() {
        let mut stream = Cursor::new(b"xxPK\x03\x04".to_vec());
        stream.set_position(2);
        assert_eq!(detect(&mut stream).unwrap(), Format::CompoundContainer);
        assert_eq!(stream.position(), 2);
    }

    #[test]
    fn test_detect_short_stream() {
        let mut stream = Cursor::new(b"PK".to_vec());
        assert_eq!(detect(&mut stream).unwrap(), Format::RawMarkup);
        assert_eq!(stream.position(), 0);
    }
}
