//! # Field-list sub-grammar (§4.5.1)
//!
//! The body of `Field`/`IndexField`/`BankField` is not a `TermList`: it is a
//! flat run of field-element tags, each either a named bit-range (creating a
//! visible namespace object) or a directive that adjusts the running bit
//! offset or the access parameters used by the named fields that follow.

use alloc::vec::Vec;

use super::{ParseError, Parser};
use crate::object::{AccessAttrib, AccessType, FieldElement, LockType, NodeValue, UpdateType};
use crate::opcode;

const RESERVED_TAG: u8 = 0x00;
const ACCESS_TAG: u8 = 0x01;
const CONNECT_TAG: u8 = 0x02;
const EXTENDED_ACCESS_TAG: u8 = 0x03;

fn access_type_from_bits(bits: u8) -> AccessType {
    match bits & 0x0F {
        1 => AccessType::Byte,
        2 => AccessType::Word,
        3 => AccessType::Dword,
        4 => AccessType::Qword,
        5 => AccessType::Buffer,
        _ => AccessType::Any,
    }
}

fn lock_type_from_bits(bits: u8) -> LockType {
    if bits & 0x10 != 0 { LockType::Lock } else { LockType::NoLock }
}

fn update_type_from_bits(bits: u8) -> UpdateType {
    match (bits >> 5) & 0x03 {
        1 => UpdateType::WriteAsOnes,
        2 => UpdateType::WriteAsZeroes,
        _ => UpdateType::Preserve,
    }
}

/// Parse a `FieldList` running from the reader's current offset up to `end`,
/// attaching each `NamedField` as a visible object directly under `scope`
/// (field units live in the enclosing namespace, not under the `Field`
/// statement itself).
pub(super) fn parse(p: &mut Parser, scope: u32, region: u32, flags_byte: u8, end: usize) -> Result<(), ParseError> {
    let mut offset: u32 = 0;
    let mut access_type = access_type_from_bits(flags_byte);
    let mut access_attrib = AccessAttrib::None;
    let mut access_length: u8 = 0;
    let lock_type = lock_type_from_bits(flags_byte);
    let update_type = update_type_from_bits(flags_byte);
    let mut connection_index = crate::object::INVALID_INDEX;

    while p.reader.offset() < end {
        let tag = p.reader.peek_byte()?;
        match tag {
            RESERVED_TAG => {
                p.reader.read_byte()?;
                offset += super::decode_pkg_len(&mut p.reader)?;
            }
            ACCESS_TAG => {
                p.reader.read_byte()?;
                let ty = p.reader.read_byte()?;
                let attrib = p.reader.read_byte()?;
                access_type = access_type_from_bits(ty);
                access_attrib = AccessAttrib::Bytes(attrib);
            }
            CONNECT_TAG => {
                p.reader.read_byte()?;
                connection_index = p.parse_one_term(scope, end)?;
            }
            EXTENDED_ACCESS_TAG => {
                p.reader.read_byte()?;
                let ty = p.reader.read_byte()?;
                let attrib = p.reader.read_byte()?;
                let len = p.reader.read_byte()?;
                access_type = access_type_from_bits(ty);
                access_attrib = AccessAttrib::RawProcessBytes(attrib);
                access_length = len;
            }
            _ => {
                let seg_bytes = p.reader.read_slice(4)?;
                let name: [u8; 4] = [seg_bytes[0], seg_bytes[1], seg_bytes[2], seg_bytes[3]];
                let width = super::decode_pkg_len(&mut p.reader)?;
                let obj = p.pool.alloc(opcode::OP_NAMED_FIELD, name, p.table_handle, p.reader.offset() as u32);
                p.pool
                    .get_mut(obj)
                    .expect("just allocated")
                    .value = NodeValue::Field(alloc::boxed::Box::new(FieldElement {
                    offset,
                    width,
                    access_length,
                    access_type,
                    access_attrib,
                    lock_type,
                    update_type,
                    connection_index,
                    field_index: region,
                }));
                p.pool.append_child(scope, obj)?;
                offset += width;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectPool;
    use crate::reader::Reader;

    fn field_list_bytes() -> Vec<u8> {
        let mut v = Vec::new();
        // Reserved: skip 4 bits.
        v.push(RESERVED_TAG);
        v.push(0x04); // pkg_len raw nibble form, 1-byte encoding -> value 4
        // Named field STA0, width 8 bits (pkg_len single byte = 8).
        v.extend_from_slice(b"STA0");
        v.push(0x08);
        // Named field LEN0, width 32 bits.
        v.extend_from_slice(b"LEN0");
        v.push(0x20);
        v
    }

    #[test]
    fn named_fields_accumulate_running_offset() {
        let mut pool = ObjectPool::new();
        pool.create_default_scopes(0);
        let scope = pool.root_index();
        let region = pool.alloc(opcode::OP_REGION_OP, crate::object::name_from_str("OPR0"), 0, 0);
        pool.append_child(scope, region).unwrap();

        let data = field_list_bytes();
        let end = data.len();
        let mut parser = Parser {
            pool: &mut pool,
            reader: Reader::new(&data, 0),
            table_handle: 0,
            mode: super::super::ParserMode::AllBlocks,
            pending_relocations: Vec::new(),
            pending_scopes: Vec::new(),
            unresolved_calls: Vec::new(),
            deferred: Vec::new(),
        };
        parse(&mut parser, scope, region, 0, end).unwrap();

        let names: Vec<[u8; 4]> = pool.children(scope).filter_map(|i| pool.get(i)).map(|o| o.name).collect();
        assert!(names.contains(&*b"STA0"));
        assert!(names.contains(&*b"LEN0"));

        let sta0 = pool.children(scope).find(|&i| pool.get(i).unwrap().name == *b"STA0").unwrap();
        match &pool.get(sta0).unwrap().value {
            NodeValue::Field(f) => {
                assert_eq!(f.offset, 4);
                assert_eq!(f.width, 8);
            }
            _ => panic!("expected a field element"),
        }

        let len0 = pool.children(scope).find(|&i| pool.get(i).unwrap().name == *b"LEN0").unwrap();
        match &pool.get(len0).unwrap().value {
            NodeValue::Field(f) => {
                assert_eq!(f.offset, 12);
                assert_eq!(f.width, 32);
            }
            _ => panic!("expected a field element"),
        }
    }
}
