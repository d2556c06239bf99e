//! IGA archive container: a flat file table over obfuscated data.
//!
//! The layout is three blocks after a 16-byte header. A descriptor block
//! holds (name offset, data offset, data length) triples, a name block holds
//! the concatenated entry names, and the rest of the file is entry data. All
//! integers, including each name byte, use the engine's variable-length
//! encoding: 7 value bits per byte shifted left once, most significant group
//! first, with bit 0 set on the final byte.

use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"IGA0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("not an IGA archive")]
    BadMagic,

    #[error("archive ends unexpectedly")]
    Truncated,

    #[error("entry '{0}' lies outside the archive")]
    EntryOutOfBounds(String),

    #[error("entry name is malformed")]
    BadName,
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    let at = out.len();

    loop {
        out.push(((value & 0x7F) as u8) << 1);
        value >>= 7;

        if value == 0 {
            break;
        }
    }

    out[at..].reverse();

    // terminal flag on the least significant group
    if let Some(last) = out.last_mut() {
        *last |= 1;
    }
}

/// Entry data is stored XORed with its own position (plus two) and a
/// per-archive key. Applying the transform twice gives the input back.
fn transform(data: &[u8], xor: u8) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ (i as u8).wrapping_add(2) ^ xor)
        .collect()
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn varint(&mut self) -> Result<u64, ArchiveError> {
        let mut acc = 0u64;

        loop {
            let b = *self.data.get(self.pos).ok_or(ArchiveError::Truncated)?;
            self.pos += 1;

            acc = (acc << 7) | u64::from(b >> 1);

            if b & 1 == 1 {
                return Ok(acc);
            }
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ArchiveError> {
        if self.data.len() - self.pos < len {
            return Err(ArchiveError::Truncated);
        }

        let span = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(span)
    }

    fn rest(self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn done(&self) -> bool {
        self.pos == self.data.len()
    }
}

/// Build an archive from (name, data) pairs, in order.
pub fn pack(files: &[(String, Vec<u8>)], xor: u8) -> Vec<u8> {
    let mut descs = Vec::new();
    let mut names = Vec::new();
    let mut datas = Vec::new();
    let mut name_at = 0u64;

    for (name, data) in files {
        let data = transform(data, xor);

        put_varint(&mut descs, name_at);
        put_varint(&mut descs, datas.len() as u64);
        put_varint(&mut descs, data.len() as u64);

        for &b in name.as_bytes() {
            put_varint(&mut names, u64::from(b));
        }

        datas.extend_from_slice(&data);
        name_at += name.len() as u64;
    }

    let mut out = Vec::with_capacity(16 + descs.len() + names.len() + datas.len());

    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&[2, 0, 0, 0, 2, 0, 0, 0]);

    put_varint(&mut out, descs.len() as u64);
    out.extend_from_slice(&descs);
    put_varint(&mut out, names.len() as u64);
    out.extend_from_slice(&names);
    out.extend_from_slice(&datas);

    out
}

/// Extract every entry of an archive, in table order.
pub fn unpack(archive: &[u8], xor: u8) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let mut r = Reader::new(archive);

    if r.take(4)? != MAGIC {
        return Err(ArchiveError::BadMagic);
    }

    r.take(12)?;

    let descs_len = r.varint()? as usize;
    let mut descs = Reader::new(r.take(descs_len)?);

    let mut entries = Vec::new();

    while !descs.done() {
        let name_at = descs.varint()? as usize;
        let data_at = descs.varint()? as usize;
        let data_len = descs.varint()? as usize;
        entries.push((name_at, data_at, data_len));
    }

    let names_len = r.varint()? as usize;
    let mut names = Reader::new(r.take(names_len)?);

    let mut name_bytes = Vec::new();

    while !names.done() {
        let b = names.varint()?;

        if b > 0xFF {
            return Err(ArchiveError::BadName);
        }

        name_bytes.push(b as u8);
    }

    let datas = r.rest();
    let mut files = Vec::with_capacity(entries.len());

    for (i, &(name_at, data_at, data_len)) in entries.iter().enumerate() {
        let name_end = match entries.get(i + 1) {
            Some(next) => next.0,
            None => name_bytes.len(),
        };

        let name = name_bytes.get(name_at..name_end).ok_or(ArchiveError::BadName)?;
        let name = String::from_utf8(name.to_vec()).map_err(|_| ArchiveError::BadName)?;

        let data_end = data_at
            .checked_add(data_len)
            .ok_or_else(|| ArchiveError::EntryOutOfBounds(name.clone()))?;

        let data = datas
            .get(data_at..data_end)
            .ok_or_else(|| ArchiveError::EntryOutOfBounds(name.clone()))?;

        files.push((name, transform(data, xor)));
    }

    Ok(files)
}
