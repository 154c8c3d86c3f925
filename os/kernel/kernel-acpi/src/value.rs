//! # Value coercion layer (C7)
//!
//! The closed set of AML semantic types, the VM's transient runtime value
//! representation, and the coercions between them (`spec.md` §4.6, §7).
//! [`crate::object::NodeValue`] is what the tree stores; [`RtValue`] is what
//! the VM computes with while walking it.

use alloc::vec::Vec;

use crate::opcode;

/// The closed set of AML semantic types (`spec.md` §4.6 "Coercion").
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectType {
    Uninitialized,
    Integer,
    String,
    Buffer,
    BufferField,
    FieldUnit,
    Package,
    Region,
    Device,
    Method,
    Event,
    Mutex,
    ObjectReference,
    PowerResource,
    Processor,
    ThermalZone,
    RawDataBuffer,
    DdbHandle,
    Debug,
}

/// Classify a tree node's opcode into its AML semantic type.
#[must_use]
pub fn object_type_of(opcode: u16) -> ObjectType {
    match opcode {
        opcode::ZERO_OP | opcode::ONE_OP | opcode::ONES_OP | opcode::BYTE_PREFIX
        | opcode::WORD_PREFIX | opcode::DWORD_PREFIX | opcode::QWORD_PREFIX
        | opcode::REVISION_OP => ObjectType::Integer,
        opcode::STRING_PREFIX => ObjectType::String,
        opcode::BUFFER_OP => ObjectType::Buffer,
        opcode::CREATE_BIT_FIELD_OP
        | opcode::CREATE_BYTE_FIELD_OP
        | opcode::CREATE_WORD_FIELD_OP
        | opcode::CREATE_DWORD_FIELD_OP
        | opcode::CREATE_QWORD_FIELD_OP
        | opcode::CREATE_FIELD_OP => ObjectType::BufferField,
        opcode::OP_NAMED_FIELD => ObjectType::FieldUnit,
        opcode::PACKAGE_OP | opcode::VAR_PACKAGE_OP => ObjectType::Package,
        opcode::OP_REGION_OP => ObjectType::Region,
        opcode::DEVICE_OP => ObjectType::Device,
        opcode::METHOD_OP => ObjectType::Method,
        opcode::EVENT_OP => ObjectType::Event,
        opcode::MUTEX_OP => ObjectType::Mutex,
        opcode::REF_OF_OP | opcode::COND_REF_OF_OP | opcode::INDEX_OP => ObjectType::ObjectReference,
        opcode::POWER_RES_OP => ObjectType::PowerResource,
        opcode::PROCESSOR_OP => ObjectType::Processor,
        opcode::THERMAL_ZONE_OP => ObjectType::ThermalZone,
        opcode::DEBUG_OP => ObjectType::Debug,
        _ => ObjectType::Uninitialized,
    }
}

/// The VM's transient runtime value: what `TermArg` evaluation and `Load`
/// produce, and what `Store` consumes.
#[derive(Debug, Clone)]
pub enum RtValue {
    Uninitialized,
    Integer(u64),
    String(Vec<u8>),
    Buffer(Vec<u8>),
    Package(Vec<RtValue>),
    /// An object reference, e.g. produced by `RefOf`/`CondRefOf`/`Index`.
    /// `DerefOf` resolves it back to the referenced object's value.
    ObjectReference { index: u32 },
}

impl RtValue {
    #[must_use]
    pub fn object_type(&self) -> ObjectType {
        match self {
            RtValue::Uninitialized => ObjectType::Uninitialized,
            RtValue::Integer(_) => ObjectType::Integer,
            RtValue::String(_) => ObjectType::String,
            RtValue::Buffer(_) => ObjectType::Buffer,
            RtValue::Package(_) => ObjectType::Package,
            RtValue::ObjectReference { .. } => ObjectType::ObjectReference,
        }
    }

    /// `true -> 1`, `false -> 0`, matching `spec.md`'s `Load` rule for
    /// logical-operator results represented transiently as booleans.
    #[must_use]
    pub fn from_bool(b: bool) -> Self {
        RtValue::Integer(u64::from(b))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("cannot convert {from:?} to {to:?}")]
    Unsupported { from: ObjectType, to: ObjectType },
    #[error("empty string has no integer value")]
    EmptyString,
    #[error("{0:?} is not a comparable type")]
    InvalidComparisonType(ObjectType),
}

/// Truncate an unsigned value to the DSDT integer width.
#[must_use]
pub fn truncate_to_width(v: u64, width_bits: u32) -> u64 {
    if width_bits >= 64 {
        v
    } else {
        v & ((1u64 << width_bits) - 1)
    }
}

/// Coerce `v` to [`ObjectType::Integer`] (`spec.md` §4.6 `vmConvert`).
///
/// # Errors
/// Returns [`ConvertError::EmptyString`] for an empty string, or
/// [`ConvertError::Unsupported`] for any type other than `Integer` or `String`.
pub fn to_integer(v: &RtValue, width_bits: u32) -> Result<u64, ConvertError> {
    match v {
        RtValue::Integer(i) => Ok(truncate_to_width(*i, width_bits)),
        RtValue::String(s) => parse_hex(s, width_bits),
        other => Err(ConvertError::Unsupported {
            from: other.object_type(),
            to: ObjectType::Integer,
        }),
    }
}

/// Coerce `v` to [`ObjectType::String`] (lowercase hex, unpadded).
///
/// # Errors
/// Returns [`ConvertError::Unsupported`] for any type other than `Integer` or `String`.
pub fn to_string(v: &RtValue) -> Result<Vec<u8>, ConvertError> {
    match v {
        RtValue::String(s) => Ok(s.clone()),
        RtValue::Integer(i) => Ok(integer_to_hex(*i)),
        other => Err(ConvertError::Unsupported {
            from: other.object_type(),
            to: ObjectType::String,
        }),
    }
}

/// Compare `lhs` against `rhs` under `spec.md` §4.6's "typed by the left
/// operand" rule: Integer compares numerically, String lexicographically,
/// Buffer by length then lexicographically (shorter sorts first on a tie
/// in the shared prefix). The right operand is coerced to the left's type;
/// any other left-hand type fails with [`ConvertError::InvalidComparisonType`].
///
/// # Errors
/// Propagates a coercion failure on `rhs`, or reports an unsupported left type.
pub fn compare(lhs: &RtValue, rhs: &RtValue, width_bits: u32) -> Result<core::cmp::Ordering, ConvertError> {
    match lhs {
        RtValue::Integer(a) => {
            let a = truncate_to_width(*a, width_bits);
            let b = to_integer(rhs, width_bits)?;
            Ok(a.cmp(&b))
        }
        RtValue::String(a) => {
            let b = to_string(rhs)?;
            Ok(a.as_slice().cmp(b.as_slice()))
        }
        RtValue::Buffer(a) => match rhs {
            RtValue::Buffer(b) => Ok(a.len().cmp(&b.len()).then_with(|| a.as_slice().cmp(b.as_slice()))),
            other => Err(ConvertError::Unsupported { from: other.object_type(), to: ObjectType::Buffer }),
        },
        other => Err(ConvertError::InvalidComparisonType(other.object_type())),
    }
}

#[must_use]
fn integer_to_hex(mut v: u64) -> Vec<u8> {
    if v == 0 {
        return alloc::vec![b'0'];
    }
    let mut digits = Vec::new();
    while v > 0 {
        let d = (v & 0xF) as u8;
        digits.push(if d < 10 { b'0' + d } else { b'a' + (d - 10) });
        v >>= 4;
    }
    digits.reverse();
    digits
}

fn parse_hex(s: &[u8], width_bits: u32) -> Result<u64, ConvertError> {
    if s.is_empty() {
        return Err(ConvertError::EmptyString);
    }
    let max_digits = (width_bits / 4) as usize;
    let mut v: u64 = 0;
    let mut consumed = 0;
    for &b in s {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => break,
        };
        if consumed >= max_digits {
            break;
        }
        v = (v << 4) | u64::from(digit);
        consumed += 1;
    }
    if consumed == 0 {
        return Err(ConvertError::EmptyString);
    }
    Ok(truncate_to_width(v, width_bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip_32_and_64() {
        for width in [32u32, 64u32] {
            for v in [0u64, 1, 0xDEAD_BEEF, u64::MAX] {
                let expected = truncate_to_width(v, width);
                let s = integer_to_hex(expected);
                let back = parse_hex(&s, width).unwrap();
                assert_eq!(back, expected);
            }
        }
    }

    #[test]
    fn string_to_integer_stops_at_non_hex() {
        let v = to_integer(&RtValue::String(alloc::vec![b'1', b'2', b'g']), 32).unwrap();
        assert_eq!(v, 0x12);
    }

    #[test]
    fn empty_string_is_error() {
        assert_eq!(to_integer(&RtValue::String(Vec::new()), 32), Err(ConvertError::EmptyString));
    }

    #[test]
    fn integer_to_string_is_unpadded_lowercase() {
        let s = to_string(&RtValue::Integer(0xAB)).unwrap();
        assert_eq!(s, b"ab");
    }

    #[test]
    fn buffer_cannot_convert_to_integer() {
        assert!(matches!(
            to_integer(&RtValue::Buffer(alloc::vec![1, 2, 3]), 32),
            Err(ConvertError::Unsupported { .. })
        ));
    }
}
