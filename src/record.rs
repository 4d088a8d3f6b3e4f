use std::io;
use std::io::{
    Read,
    Write,
};

/// A single content record as it lives on disk and in the cache.
///
/// The body is kept in its stored form, which is gzipped unless the client
/// uploaded a gzip stream of its own. A record is written once and never
/// modified afterwards.
pub struct Record {
    /// Key the record is filed under. Matches the filename in the content
    /// directory.
    pub key: String,
    /// Declared MIME type of the content, echoed back on retrieval.
    pub media_type: String,
    /// Expiry instant in milliseconds since the epoch.
    pub expiry: i64,
    /// Content body in stored form.
    pub body: Vec<u8>,
}

impl Record {
    /// The "not present" sentinel. It has no key and no body and is never
    /// served to a client.
    pub fn empty() -> Record {
        Record {
            key: String::new(),
            media_type: String::from("text/plain"),
            expiry: i64::MAX,
            body: vec!(),
        }
    }

    /// Whether this is the sentinel rather than a stored record.
    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }

    pub fn should_expire(&self, now_ms: i64) -> bool {
        self.expiry < now_ms
    }

    /// Write the record in its single-file binary layout:
    ///
    /// * key, prefixed by its byte length as a big-endian u16
    /// * media type length as a big-endian i32, then the raw bytes
    /// * expiry milliseconds as a big-endian i64
    /// * body length as a big-endian i32, then the raw bytes
    pub fn encode(&self, w: &mut impl Write) -> io::Result<()> {
        let key = self.key.as_bytes();
        w.write_all(&(key.len() as u16).to_be_bytes())?;
        w.write_all(key)?;

        let media_type = self.media_type.as_bytes();
        w.write_all(&(media_type.len() as i32).to_be_bytes())?;
        w.write_all(media_type)?;

        w.write_all(&self.expiry.to_be_bytes())?;

        w.write_all(&(self.body.len() as i32).to_be_bytes())?;
        w.write_all(&self.body)?;
        Ok(())
    }

    /// Read back a record written by [encode](Record::encode).
    pub fn decode(r: &mut impl Read) -> io::Result<Record> {
        let mut record = Record::decode_meta(r)?;
        let body_len = read_i32(r)?;
        record.body = read_block(r, body_len)?;
        Ok(record)
    }

    /// As [decode](Record::decode) but stops before the body. Used by the
    /// expiry sweeper so scans do not load payloads.
    pub fn decode_meta(r: &mut impl Read) -> io::Result<Record> {
        let key_len = read_u16(r)?;
        let key = read_block(r, key_len as i32)?;
        let key = String::from_utf8(key).map_err(invalid)?;

        let media_type_len = read_i32(r)?;
        let media_type = read_block(r, media_type_len)?;
        let media_type = String::from_utf8(media_type).map_err(invalid)?;

        let expiry = read_i64(r)?;

        Ok(Record {
            key: key,
            media_type: media_type,
            expiry: expiry,
            body: vec!(),
        })
    }
}

fn invalid(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

fn read_u16(r: &mut impl Read) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_i32(r: &mut impl Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_i64(r: &mut impl Read) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

fn read_block(r: &mut impl Read, len: i32) -> io::Result<Vec<u8>> {
    if len < 0 {
        return Err(invalid(format!("negative field length {}", len)));
    }
    let mut buf = vec!(0u8; len as usize);
    r.read_exact(&mut buf)?;
    Ok(buf)
}
