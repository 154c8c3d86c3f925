//! ACPI `NameString` paths (`spec.md` §4.3, §4.4).
//!
//! A parsed path is either absolute (rooted at `\`), relative with a run of
//! `^` parent prefixes, or a bare sequence of one or more 4-byte name
//! segments. [`crate::object::ObjectPool::find`] is the only place that
//! interprets the difference between a single-segment and a multi-segment
//! relative path (the ACPI search-rule split called out in `spec.md` §9).

use alloc::vec::Vec;

use crate::opcode::{DUAL_NAME_PREFIX, MULTI_NAME_PREFIX, NULL_NAME, PARENT_PREFIX_CHAR, ROOT_CHAR};
use crate::reader::{Reader, ReaderError};

/// Pad character for name segments shorter than 4 bytes.
pub const PAD: u8 = b'_';

/// A single 4-byte name segment.
pub type NameSeg = [u8; 4];

/// Pad `s` (at most 4 ASCII bytes) into a [`NameSeg`] with trailing `_`.
#[must_use]
pub fn pad_seg(s: &[u8]) -> NameSeg {
    let mut seg = [PAD; 4];
    let n = s.len().min(4);
    seg[..n].copy_from_slice(&s[..n]);
    seg
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("name segment does not begin with 'A'-'Z' or '_'")]
    InvalidLeadChar,
    #[error("unexpected end of stream while parsing a name path")]
    Eof,
}

impl From<ReaderError> for PathError {
    fn from(_: ReaderError) -> Self {
        PathError::Eof
    }
}

/// A parsed `NameString`: an optional `\` root marker, a run of `^` parent
/// prefixes, and zero or more name segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePath {
    pub root: bool,
    pub parent_ups: u32,
    pub segments: Vec<NameSeg>,
}

impl NamePath {
    #[must_use]
    pub fn root() -> Self {
        Self {
            root: true,
            parent_ups: 0,
            segments: Vec::new(),
        }
    }

    /// Parse a `NameString` from the stream (`spec.md` §4.3).
    pub fn parse(r: &mut Reader) -> Result<Self, PathError> {
        let mut path = NamePath::default();

        if r.peek_byte()? == ROOT_CHAR {
            r.read_byte()?;
            path.root = true;
        } else {
            while r.peek_byte()? == PARENT_PREFIX_CHAR {
                r.read_byte()?;
                path.parent_ups += 1;
            }
        }

        let next = r.peek_byte()?;
        if next == NULL_NAME {
            r.read_byte()?;
            return Ok(path);
        }
        if next == DUAL_NAME_PREFIX {
            r.read_byte()?;
            path.segments.push(read_name_seg(r)?);
            path.segments.push(read_name_seg(r)?);
            return Ok(path);
        }
        if next == MULTI_NAME_PREFIX {
            r.read_byte()?;
            let count = r.read_byte()?;
            for _ in 0..count {
                path.segments.push(read_name_seg(r)?);
            }
            return Ok(path);
        }
        path.segments.push(read_name_seg(r)?);
        Ok(path)
    }

    /// Parse a dotted display-form path such as `"\_SB_.PCI0.IDE0"` or
    /// `"^^_FOO"`, padding each segment to 4 bytes. Intended for tests and
    /// for callers constructing a [`crate::vm::Vm::lookup`] argument from a
    /// string literal; the wire grammar is [`NamePath::parse`].
    #[must_use]
    pub fn parse_dotted(s: &str) -> Self {
        let mut s = s.as_bytes();
        let mut path = NamePath::default();
        if let Some((b'\\', rest)) = s.split_first() {
            path.root = true;
            s = rest;
        } else {
            while let Some((b'^', rest)) = s.split_first() {
                path.parent_ups += 1;
                s = rest;
            }
        }
        if s.is_empty() {
            return path;
        }
        for seg in s.split(|b| *b == b'.') {
            path.segments.push(pad_seg(seg));
        }
        path
    }

    #[must_use]
    pub fn is_bare_root(&self) -> bool {
        self.root && self.segments.is_empty()
    }

    /// Everything except the final segment, as a path in its own right.
    /// Used when a qualified `NameString` splits into "the name" (last
    /// segment) and "the scope it should be relocated under" (the rest).
    #[must_use]
    pub fn without_last_segment(&self) -> Self {
        let mut prefix = self.clone();
        prefix.segments.pop();
        prefix
    }

    /// Compact encoding for storing an unresolved path inside
    /// [`crate::object::NodeValue::Bytes`] (used by `$NamePath` nodes the VM
    /// resolves dynamically at execution time).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.segments.len() * 4);
        out.push(u8::from(self.root));
        out.push(self.parent_ups.min(u32::from(u8::MAX)) as u8);
        for seg in &self.segments {
            out.extend_from_slice(seg);
        }
        out
    }

    #[must_use]
    pub fn decode(bytes: &[u8]) -> Self {
        if bytes.len() < 2 {
            return Self::default();
        }
        let root = bytes[0] != 0;
        let parent_ups = u32::from(bytes[1]);
        let segments = bytes[2..].chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect();
        Self { root, parent_ups, segments }
    }
}

fn read_name_seg(r: &mut Reader) -> Result<NameSeg, PathError> {
    let bytes = r.read_slice(4)?;
    let lead = bytes[0];
    if !(lead.is_ascii_uppercase() || lead == PAD) {
        return Err(PathError::InvalidLeadChar);
    }
    Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_seg() {
        let data = *b"_SB_";
        let mut r = Reader::new(&data, 0);
        let p = NamePath::parse(&mut r).unwrap();
        assert!(!p.root);
        assert_eq!(p.parent_ups, 0);
        assert_eq!(p.segments, [*b"_SB_"]);
    }

    #[test]
    fn root_prefixed() {
        let data = *b"\\X___";
        let mut r = Reader::new(&data, 0);
        let p = NamePath::parse(&mut r).unwrap();
        assert!(p.root);
        assert_eq!(p.segments, [*b"X___"]);
    }

    #[test]
    fn bare_root() {
        let data = [ROOT_CHAR, NULL_NAME];
        let mut r = Reader::new(&data, 0);
        let p = NamePath::parse(&mut r).unwrap();
        assert!(p.is_bare_root());
    }

    #[test]
    fn dual_name_path() {
        let mut data = Vec::new();
        data.push(DUAL_NAME_PREFIX);
        data.extend_from_slice(b"_SB_");
        data.extend_from_slice(b"PCI0");
        let mut r = Reader::new(&data, 0);
        let p = NamePath::parse(&mut r).unwrap();
        assert_eq!(p.segments, [*b"_SB_", *b"PCI0"]);
    }

    #[test]
    fn multi_name_path() {
        let mut data = Vec::new();
        data.push(MULTI_NAME_PREFIX);
        data.push(3);
        data.extend_from_slice(b"_SB_");
        data.extend_from_slice(b"PCI0");
        data.extend_from_slice(b"IDE0");
        let mut r = Reader::new(&data, 0);
        let p = NamePath::parse(&mut r).unwrap();
        assert_eq!(p.segments, [*b"_SB_", *b"PCI0", *b"IDE0"]);
    }

    #[test]
    fn parent_prefixes() {
        let p = NamePath::parse_dotted("^^_FOO");
        assert_eq!(p.parent_ups, 2);
        assert_eq!(p.segments, [*b"_FOO"]);
    }

    #[test]
    fn dotted_root_path() {
        let p = NamePath::parse_dotted("\\_SB_.PCI0.IDE0");
        assert!(p.root);
        assert_eq!(p.segments, [*b"_SB_", *b"PCI0", *b"IDE0"]);
    }
}
