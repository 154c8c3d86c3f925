//! # Opcode tables (C3)
//!
//! Static data describing every AML opcode the parser and VM understand:
//! the opcode value itself (including the extended-opcode encoding and the
//! parser-internal synthetic opcodes), its argument shape, and a handful of
//! flags that drive parsing and execution decisions.
//!
//! Opcode values are 16-bit. Plain opcodes occupy `0x00..=0xFF`. Extended
//! opcodes (`ExtOpPrefix` 0x5B followed by a second byte `b`) are folded into
//! the same numeric space as `0xFF + b as u16`, per `spec.md` §3 — this is
//! why `RevisionOp` (`b = 0x30`) and `OnesOp` (the plain opcode `0xFF`) live
//! at different values despite the overlap this formula implies at `b = 0`;
//! no real AML stream emits an extended opcode with second byte zero.
//! Synthetic, parser-internal opcodes (scope blocks, resolved name paths,
//! method-call nodes, ...) start at [`SYNTHETIC_BASE`], safely above the
//! `0x1FE` ceiling of the extended range.

use bitfield_struct::bitfield;

/// `ExtOpPrefix` — announces that the following byte selects an extended opcode.
pub const EXT_OP_PREFIX: u8 = 0x5B;

pub const ROOT_CHAR: u8 = 0x5C;
pub const PARENT_PREFIX_CHAR: u8 = 0x5E;
pub const NAME_CHAR_UNDERSCORE: u8 = 0x5F;
pub const DUAL_NAME_PREFIX: u8 = 0x2E;
pub const MULTI_NAME_PREFIX: u8 = 0x2F;
pub const NULL_NAME: u8 = 0x00;

const fn ext(second_byte: u8) -> u16 {
    0xFF + second_byte as u16
}

// Plain (single-byte) opcodes.
pub const ZERO_OP: u16 = 0x00;
pub const ONE_OP: u16 = 0x01;
pub const ALIAS_OP: u16 = 0x06;
pub const NAME_OP: u16 = 0x08;
pub const BYTE_PREFIX: u16 = 0x0A;
pub const WORD_PREFIX: u16 = 0x0B;
pub const DWORD_PREFIX: u16 = 0x0C;
pub const STRING_PREFIX: u16 = 0x0D;
pub const QWORD_PREFIX: u16 = 0x0E;
pub const SCOPE_OP: u16 = 0x10;
pub const BUFFER_OP: u16 = 0x11;
pub const PACKAGE_OP: u16 = 0x12;
pub const VAR_PACKAGE_OP: u16 = 0x13;
pub const METHOD_OP: u16 = 0x14;
pub const EXTERNAL_OP: u16 = 0x15;
pub const LOCAL0_OP: u16 = 0x60;
pub const LOCAL1_OP: u16 = 0x61;
pub const LOCAL2_OP: u16 = 0x62;
pub const LOCAL3_OP: u16 = 0x63;
pub const LOCAL4_OP: u16 = 0x64;
pub const LOCAL5_OP: u16 = 0x65;
pub const LOCAL6_OP: u16 = 0x66;
pub const LOCAL7_OP: u16 = 0x67;
pub const ARG0_OP: u16 = 0x68;
pub const ARG1_OP: u16 = 0x69;
pub const ARG2_OP: u16 = 0x6A;
pub const ARG3_OP: u16 = 0x6B;
pub const ARG4_OP: u16 = 0x6C;
pub const ARG5_OP: u16 = 0x6D;
pub const ARG6_OP: u16 = 0x6E;
pub const STORE_OP: u16 = 0x70;
pub const REF_OF_OP: u16 = 0x71;
pub const ADD_OP: u16 = 0x72;
pub const CONCAT_OP: u16 = 0x73;
pub const SUBTRACT_OP: u16 = 0x74;
pub const INCREMENT_OP: u16 = 0x75;
pub const DECREMENT_OP: u16 = 0x76;
pub const MULTIPLY_OP: u16 = 0x77;
pub const DIVIDE_OP: u16 = 0x78;
pub const SHIFT_LEFT_OP: u16 = 0x79;
pub const SHIFT_RIGHT_OP: u16 = 0x7A;
pub const AND_OP: u16 = 0x7B;
pub const NAND_OP: u16 = 0x7C;
pub const OR_OP: u16 = 0x7D;
pub const NOR_OP: u16 = 0x7E;
pub const XOR_OP: u16 = 0x7F;
pub const NOT_OP: u16 = 0x80;
pub const FIND_SET_LEFT_BIT_OP: u16 = 0x81;
pub const FIND_SET_RIGHT_BIT_OP: u16 = 0x82;
pub const DEREF_OF_OP: u16 = 0x83;
pub const CONCAT_RES_OP: u16 = 0x84;
pub const MOD_OP: u16 = 0x85;
pub const NOTIFY_OP: u16 = 0x86;
pub const SIZE_OF_OP: u16 = 0x87;
pub const INDEX_OP: u16 = 0x88;
pub const MATCH_OP: u16 = 0x89;
pub const CREATE_DWORD_FIELD_OP: u16 = 0x8A;
pub const CREATE_WORD_FIELD_OP: u16 = 0x8B;
pub const CREATE_BYTE_FIELD_OP: u16 = 0x8C;
pub const CREATE_BIT_FIELD_OP: u16 = 0x8D;
pub const OBJECT_TYPE_OP: u16 = 0x8E;
pub const CREATE_QWORD_FIELD_OP: u16 = 0x8F;
pub const LAND_OP: u16 = 0x90;
pub const LOR_OP: u16 = 0x91;
pub const LNOT_OP: u16 = 0x92;
pub const LEQUAL_OP: u16 = 0x93;
pub const LGREATER_OP: u16 = 0x94;
pub const LLESS_OP: u16 = 0x95;
pub const TO_BUFFER_OP: u16 = 0x96;
pub const TO_DECIMAL_STRING_OP: u16 = 0x97;
pub const TO_HEX_STRING_OP: u16 = 0x98;
pub const TO_INTEGER_OP: u16 = 0x99;
pub const TO_STRING_OP: u16 = 0x9C;
pub const COPY_OBJECT_OP: u16 = 0x9D;
pub const MID_OP: u16 = 0x9E;
pub const CONTINUE_OP: u16 = 0x9F;
pub const IF_OP: u16 = 0xA0;
pub const ELSE_OP: u16 = 0xA1;
pub const WHILE_OP: u16 = 0xA2;
pub const NOOP_OP: u16 = 0xA3;
pub const RETURN_OP: u16 = 0xA4;
pub const BREAK_OP: u16 = 0xA5;
pub const BREAK_POINT_OP: u16 = 0xCC;
pub const ONES_OP: u16 = 0xFF;

// Extended opcodes (ExtOpPrefix + second byte).
pub const MUTEX_OP: u16 = ext(0x01);
pub const EVENT_OP: u16 = ext(0x02);
pub const COND_REF_OF_OP: u16 = ext(0x12);
pub const CREATE_FIELD_OP: u16 = ext(0x13);
pub const LOAD_TABLE_OP: u16 = ext(0x1F);
pub const LOAD_OP: u16 = ext(0x20);
pub const STALL_OP: u16 = ext(0x21);
pub const SLEEP_OP: u16 = ext(0x22);
pub const ACQUIRE_OP: u16 = ext(0x23);
pub const SIGNAL_OP: u16 = ext(0x24);
pub const WAIT_OP: u16 = ext(0x25);
pub const RESET_OP: u16 = ext(0x26);
pub const RELEASE_OP: u16 = ext(0x27);
pub const FROM_BCD_OP: u16 = ext(0x28);
pub const TO_BCD_OP: u16 = ext(0x29);
pub const REVISION_OP: u16 = ext(0x30);
pub const DEBUG_OP: u16 = ext(0x31);
pub const FATAL_OP: u16 = ext(0x32);
pub const TIMER_OP: u16 = ext(0x33);
pub const OP_REGION_OP: u16 = ext(0x80);
pub const FIELD_OP: u16 = ext(0x81);
pub const DEVICE_OP: u16 = ext(0x82);
pub const PROCESSOR_OP: u16 = ext(0x83);
pub const POWER_RES_OP: u16 = ext(0x84);
pub const THERMAL_ZONE_OP: u16 = ext(0x85);
pub const INDEX_FIELD_OP: u16 = ext(0x86);
pub const BANK_FIELD_OP: u16 = ext(0x87);
pub const DATA_REGION_OP: u16 = ext(0x88);

/// First synthetic, parser-internal opcode. Everything at or above this
/// value never appears in an AML byte stream; it is created by the parser
/// itself (`spec.md` §3, §4.5).
pub const SYNTHETIC_BASE: u16 = 0x200;
pub const OP_SCOPE_BLOCK: u16 = SYNTHETIC_BASE;
pub const OP_BYTE_LIST: u16 = SYNTHETIC_BASE + 1;
pub const OP_CONNECTION: u16 = SYNTHETIC_BASE + 2;
pub const OP_NAMED_FIELD: u16 = SYNTHETIC_BASE + 3;
pub const OP_RESOLVED_NAME_PATH: u16 = SYNTHETIC_BASE + 4;
pub const OP_NAME_PATH: u16 = SYNTHETIC_BASE + 5;
pub const OP_NAME_PATH_OR_METHOD_CALL: u16 = SYNTHETIC_BASE + 6;
pub const OP_METHOD_CALL: u16 = SYNTHETIC_BASE + 7;
pub const OP_FREED: u16 = SYNTHETIC_BASE + 8;

/// The stream-consumption shape of one opcode argument (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Padding entry; stop iterating an opcode's argument list here.
    None,
    ByteData,
    WordData,
    DwordData,
    QwordData,
    StringData,
    NameString,
    PkgLen,
    ByteList,
    TermList,
    TermArg,
    DataRefObj,
    SuperName,
    SimpleName,
    Target,
    FieldList,
}

/// Per-opcode flags (`spec.md` §4.3).
#[bitfield(u8)]
pub struct OpFlags {
    /// First arg is the new object's name.
    pub named: bool,
    /// Opens a new child scope while its `TermList` is parsed.
    pub scoped: bool,
    /// Evaluates to a constant value; storing into it is a no-op.
    pub constant: bool,
    /// Only valid inside a method body.
    pub executable: bool,
    /// Immediately followed by a package length.
    pub has_pkg_len: bool,
    /// Contents are ambiguous until methods are resolved; only the package
    /// end is recorded during the first pass.
    pub defer_parsing: bool,
    /// Informational: the opcode produces or consumes an object reference.
    pub reference: bool,
    /// Informational: the opcode creates a new named object in the tree.
    pub create: bool,
}

/// One row of the opcode table: value, display name, flags, and up to
/// seven argument descriptors.
#[derive(Debug, Clone, Copy)]
pub struct OpInfo {
    pub opcode: u16,
    pub name: &'static str,
    pub flags: OpFlags,
    pub args: [ArgKind; 7],
}

const fn flags(named: bool, scoped: bool, constant: bool, executable: bool, has_pkg_len: bool, defer_parsing: bool) -> OpFlags {
    OpFlags::new()
        .with_named(named)
        .with_scoped(scoped)
        .with_constant(constant)
        .with_executable(executable)
        .with_has_pkg_len(has_pkg_len)
        .with_defer_parsing(defer_parsing)
}

const NONE7: [ArgKind; 7] = [ArgKind::None; 7];

const fn args1(a: ArgKind) -> [ArgKind; 7] {
    let mut r = NONE7;
    r[0] = a;
    r
}
const fn args2(a: ArgKind, b: ArgKind) -> [ArgKind; 7] {
    let mut r = NONE7;
    r[0] = a;
    r[1] = b;
    r
}
const fn args3(a: ArgKind, b: ArgKind, c: ArgKind) -> [ArgKind; 7] {
    let mut r = NONE7;
    r[0] = a;
    r[1] = b;
    r[2] = c;
    r
}
const fn args4(a: ArgKind, b: ArgKind, c: ArgKind, d: ArgKind) -> [ArgKind; 7] {
    let mut r = NONE7;
    r[0] = a;
    r[1] = b;
    r[2] = c;
    r[3] = d;
    r
}
const fn args5(a: ArgKind, b: ArgKind, c: ArgKind, d: ArgKind, e: ArgKind) -> [ArgKind; 7] {
    let mut r = NONE7;
    r[0] = a;
    r[1] = b;
    r[2] = c;
    r[3] = d;
    r[4] = e;
    r
}
const fn args6(a: ArgKind, b: ArgKind, c: ArgKind, d: ArgKind, e: ArgKind, f: ArgKind) -> [ArgKind; 7] {
    let mut r = NONE7;
    r[0] = a;
    r[1] = b;
    r[2] = c;
    r[3] = d;
    r[4] = e;
    r[5] = f;
    r
}
const fn args7(a: ArgKind, b: ArgKind, c: ArgKind, d: ArgKind, e: ArgKind, f: ArgKind, g: ArgKind) -> [ArgKind; 7] {
    [a, b, c, d, e, f, g]
}

use ArgKind::{
    ByteData, ByteList, DataRefObj, DwordData, FieldList, NameString, PkgLen, QwordData,
    SimpleName, StringData, SuperName, Target, TermArg, TermList, WordData,
};

macro_rules! row {
    ($op:expr, $name:expr, $flags:expr, $args:expr) => {
        OpInfo {
            opcode: $op,
            name: $name,
            flags: $flags,
            args: $args,
        }
    };
}

/// The full opcode table: one row per AML opcode the interpreter knows
/// about, followed by the synthetic parser-internal rows.
pub static OPCODE_TABLE: &[OpInfo] = &[
    row!(ZERO_OP, "Zero", flags(false, false, true, false, false, false), NONE7),
    row!(ONE_OP, "One", flags(false, false, true, false, false, false), NONE7),
    row!(ALIAS_OP, "Alias", flags(true, false, false, false, false, false), args2(NameString, NameString)),
    row!(NAME_OP, "Name", flags(true, false, false, false, false, false), args2(NameString, DataRefObj)),
    row!(BYTE_PREFIX, "BytePrefix", flags(false, false, true, false, false, false), args1(ByteData)),
    row!(WORD_PREFIX, "WordPrefix", flags(false, false, true, false, false, false), args1(WordData)),
    row!(DWORD_PREFIX, "DwordPrefix", flags(false, false, true, false, false, false), args1(DwordData)),
    row!(STRING_PREFIX, "StringPrefix", flags(false, false, true, false, false, false), args1(StringData)),
    row!(QWORD_PREFIX, "QwordPrefix", flags(false, false, true, false, false, false), args1(QwordData)),
    row!(SCOPE_OP, "Scope", flags(false, true, false, false, true, false), args3(PkgLen, NameString, TermList)),
    row!(BUFFER_OP, "Buffer", flags(false, false, false, false, true, true), args3(PkgLen, TermArg, ByteList)),
    row!(PACKAGE_OP, "Package", flags(false, false, false, false, true, false), args3(PkgLen, ByteData, TermList)),
    row!(VAR_PACKAGE_OP, "VarPackage", flags(false, false, false, false, true, false), args3(PkgLen, TermArg, TermList)),
    row!(METHOD_OP, "Method", flags(true, true, false, false, true, false), args4(PkgLen, NameString, ByteData, TermList)),
    row!(EXTERNAL_OP, "External", flags(true, false, false, false, false, false), args3(NameString, ByteData, ByteData)),
    row!(LOCAL0_OP, "Local0", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL1_OP, "Local1", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL2_OP, "Local2", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL3_OP, "Local3", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL4_OP, "Local4", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL5_OP, "Local5", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL6_OP, "Local6", flags(false, false, false, true, false, false), NONE7),
    row!(LOCAL7_OP, "Local7", flags(false, false, false, true, false, false), NONE7),
    row!(ARG0_OP, "Arg0", flags(false, false, false, true, false, false), NONE7),
    row!(ARG1_OP, "Arg1", flags(false, false, false, true, false, false), NONE7),
    row!(ARG2_OP, "Arg2", flags(false, false, false, true, false, false), NONE7),
    row!(ARG3_OP, "Arg3", flags(false, false, false, true, false, false), NONE7),
    row!(ARG4_OP, "Arg4", flags(false, false, false, true, false, false), NONE7),
    row!(ARG5_OP, "Arg5", flags(false, false, false, true, false, false), NONE7),
    row!(ARG6_OP, "Arg6", flags(false, false, false, true, false, false), NONE7),
    row!(STORE_OP, "Store", flags(false, false, false, true, false, false), args2(TermArg, SuperName)),
    row!(REF_OF_OP, "RefOf", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(ADD_OP, "Add", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(CONCAT_OP, "Concat", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(SUBTRACT_OP, "Subtract", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(INCREMENT_OP, "Increment", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(DECREMENT_OP, "Decrement", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(MULTIPLY_OP, "Multiply", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(DIVIDE_OP, "Divide", flags(false, false, false, true, false, false), args4(TermArg, TermArg, Target, Target)),
    row!(SHIFT_LEFT_OP, "ShiftLeft", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(SHIFT_RIGHT_OP, "ShiftRight", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(AND_OP, "And", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(NAND_OP, "Nand", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(OR_OP, "Or", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(NOR_OP, "Nor", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(XOR_OP, "Xor", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(NOT_OP, "Not", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(FIND_SET_LEFT_BIT_OP, "FindSetLeftBit", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(FIND_SET_RIGHT_BIT_OP, "FindSetRightBit", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(DEREF_OF_OP, "DerefOf", flags(false, false, false, true, false, false), args1(TermArg)),
    row!(CONCAT_RES_OP, "ConcatRes", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(MOD_OP, "Mod", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(NOTIFY_OP, "Notify", flags(false, false, false, true, false, false), args2(SuperName, TermArg)),
    row!(SIZE_OF_OP, "SizeOf", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(INDEX_OP, "Index", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(MATCH_OP, "Match", flags(false, false, false, true, false, false), args7(TermArg, ByteData, TermArg, ByteData, TermArg, TermArg, Target)),
    row!(CREATE_DWORD_FIELD_OP, "CreateDWordField", flags(true, false, false, true, false, false), args3(TermArg, TermArg, NameString)),
    row!(CREATE_WORD_FIELD_OP, "CreateWordField", flags(true, false, false, true, false, false), args3(TermArg, TermArg, NameString)),
    row!(CREATE_BYTE_FIELD_OP, "CreateByteField", flags(true, false, false, true, false, false), args3(TermArg, TermArg, NameString)),
    row!(CREATE_BIT_FIELD_OP, "CreateBitField", flags(true, false, false, true, false, false), args3(TermArg, TermArg, NameString)),
    row!(OBJECT_TYPE_OP, "ObjectType", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(CREATE_QWORD_FIELD_OP, "CreateQWordField", flags(true, false, false, true, false, false), args3(TermArg, TermArg, NameString)),
    row!(LAND_OP, "LAnd", flags(false, false, false, true, false, false), args2(TermArg, TermArg)),
    row!(LOR_OP, "LOr", flags(false, false, false, true, false, false), args2(TermArg, TermArg)),
    row!(LNOT_OP, "LNot", flags(false, false, false, true, false, false), args1(TermArg)),
    row!(LEQUAL_OP, "LEqual", flags(false, false, false, true, false, false), args2(TermArg, TermArg)),
    row!(LGREATER_OP, "LGreater", flags(false, false, false, true, false, false), args2(TermArg, TermArg)),
    row!(LLESS_OP, "LLess", flags(false, false, false, true, false, false), args2(TermArg, TermArg)),
    row!(TO_BUFFER_OP, "ToBuffer", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(TO_DECIMAL_STRING_OP, "ToDecimalString", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(TO_HEX_STRING_OP, "ToHexString", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(TO_INTEGER_OP, "ToInteger", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(TO_STRING_OP, "ToString", flags(false, false, false, true, false, false), args3(TermArg, TermArg, Target)),
    row!(COPY_OBJECT_OP, "CopyObject", flags(false, false, false, true, false, false), args2(TermArg, SimpleName)),
    row!(MID_OP, "Mid", flags(false, false, false, true, false, false), args4(TermArg, TermArg, TermArg, Target)),
    row!(CONTINUE_OP, "Continue", flags(false, false, false, true, false, false), NONE7),
    row!(IF_OP, "If", flags(false, true, false, true, true, false), args3(PkgLen, TermArg, TermList)),
    row!(ELSE_OP, "Else", flags(false, true, false, true, true, false), args2(PkgLen, TermList)),
    row!(WHILE_OP, "While", flags(false, true, false, true, true, true), args3(PkgLen, TermArg, TermList)),
    row!(NOOP_OP, "Noop", flags(false, false, false, true, false, false), NONE7),
    row!(RETURN_OP, "Return", flags(false, false, false, true, false, false), args1(TermArg)),
    row!(BREAK_OP, "Break", flags(false, false, false, true, false, false), NONE7),
    row!(BREAK_POINT_OP, "BreakPoint", flags(false, false, false, true, false, false), NONE7),
    row!(ONES_OP, "Ones", flags(false, false, true, false, false, false), NONE7),
    row!(MUTEX_OP, "Mutex", flags(true, false, false, false, false, false), args2(NameString, ByteData)),
    row!(EVENT_OP, "Event", flags(true, false, false, false, false, false), args1(NameString)),
    row!(COND_REF_OF_OP, "CondRefOf", flags(false, false, false, true, false, false), args2(SuperName, Target)),
    row!(CREATE_FIELD_OP, "CreateField", flags(true, false, false, true, false, false), args4(TermArg, TermArg, TermArg, NameString)),
    row!(LOAD_TABLE_OP, "LoadTable", flags(false, false, false, true, false, false), args6(TermArg, TermArg, TermArg, TermArg, TermArg, TermArg)),
    row!(LOAD_OP, "Load", flags(false, false, false, true, false, false), args2(NameString, Target)),
    row!(STALL_OP, "Stall", flags(false, false, false, true, false, false), args1(TermArg)),
    row!(SLEEP_OP, "Sleep", flags(false, false, false, true, false, false), args1(TermArg)),
    row!(ACQUIRE_OP, "Acquire", flags(false, false, false, true, false, false), args2(SuperName, WordData)),
    row!(SIGNAL_OP, "Signal", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(WAIT_OP, "Wait", flags(false, false, false, true, false, false), args2(SuperName, TermArg)),
    row!(RESET_OP, "Reset", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(RELEASE_OP, "Release", flags(false, false, false, true, false, false), args1(SuperName)),
    row!(FROM_BCD_OP, "FromBCD", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(TO_BCD_OP, "ToBCD", flags(false, false, false, true, false, false), args2(TermArg, Target)),
    row!(REVISION_OP, "Revision", flags(false, false, true, false, false, false), NONE7),
    row!(DEBUG_OP, "Debug", flags(false, false, true, true, false, false), NONE7),
    row!(FATAL_OP, "Fatal", flags(false, false, false, true, false, false), args3(ByteData, DwordData, TermArg)),
    row!(TIMER_OP, "Timer", flags(false, false, false, true, false, false), NONE7),
    row!(OP_REGION_OP, "OpRegion", flags(true, false, false, false, false, false), args4(NameString, ByteData, TermArg, TermArg)),
    row!(FIELD_OP, "Field", flags(false, false, false, false, true, false), args4(PkgLen, NameString, ByteData, FieldList)),
    row!(DEVICE_OP, "Device", flags(true, true, false, false, true, false), args3(PkgLen, NameString, TermList)),
    row!(PROCESSOR_OP, "Processor", flags(true, true, false, false, true, false), args6(PkgLen, NameString, ByteData, DwordData, ByteData, TermList)),
    row!(POWER_RES_OP, "PowerRes", flags(true, true, false, false, true, false), args5(PkgLen, NameString, ByteData, WordData, TermList)),
    row!(THERMAL_ZONE_OP, "ThermalZone", flags(true, true, false, false, true, false), args3(PkgLen, NameString, TermList)),
    row!(INDEX_FIELD_OP, "IndexField", flags(false, false, false, false, true, false), args5(PkgLen, NameString, NameString, ByteData, FieldList)),
    row!(BANK_FIELD_OP, "BankField", flags(false, false, false, false, true, true), args6(PkgLen, NameString, NameString, TermArg, ByteData, FieldList)),
    row!(DATA_REGION_OP, "DataRegion", flags(true, false, false, false, false, false), args4(NameString, TermArg, TermArg, TermArg)),
    // Synthetic, parser-internal opcodes.
    row!(OP_SCOPE_BLOCK, "$ScopeBlock", flags(false, true, false, false, false, false), NONE7),
    row!(OP_BYTE_LIST, "$ByteList", flags(false, false, false, false, false, false), NONE7),
    row!(OP_CONNECTION, "$Connection", flags(false, false, false, false, false, false), NONE7),
    row!(OP_NAMED_FIELD, "$NamedField", flags(false, false, false, false, false, false), NONE7),
    row!(OP_RESOLVED_NAME_PATH, "$ResolvedNamePath", flags(false, false, false, false, false, false), NONE7),
    row!(OP_NAME_PATH, "$NamePath", flags(false, false, false, false, false, false), NONE7),
    row!(OP_NAME_PATH_OR_METHOD_CALL, "$NamePathOrMethodCall", flags(false, false, false, false, false, false), NONE7),
    row!(OP_METHOD_CALL, "$MethodCall", flags(false, false, false, false, false, false), NONE7),
    row!(OP_FREED, "$Freed", flags(false, false, false, false, false, false), NONE7),
];

const fn build_lead_table() -> [u8; 256] {
    let mut arr = [0xFFu8; 256];
    let mut i = 0;
    while i < OPCODE_TABLE.len() {
        let op = OPCODE_TABLE[i].opcode;
        if op < 0x100 {
            arr[op as usize] = i as u8;
        }
        i += 1;
    }
    arr
}

const fn build_ext_table() -> [u8; 256] {
    let mut arr = [0xFFu8; 256];
    let mut i = 0;
    while i < OPCODE_TABLE.len() {
        let op = OPCODE_TABLE[i].opcode;
        if op > 0xFF && op <= 0x1FE {
            let second_byte = (op - 0xFF) as usize;
            arr[second_byte] = i as u8;
        }
        i += 1;
    }
    arr
}

/// Indirection array: leading byte -> row index in [`OPCODE_TABLE`], or
/// `0xFF` if the byte does not start a plain opcode.
pub static LEAD_BYTE_TABLE: [u8; 256] = build_lead_table();

/// Indirection array: second byte after `ExtOpPrefix` -> row index in
/// [`OPCODE_TABLE`], or `0xFF` if unmapped.
pub static EXT_BYTE_TABLE: [u8; 256] = build_ext_table();

/// Resolve a row index for a given encoded opcode value, covering plain,
/// extended, and synthetic opcodes alike.
#[must_use]
pub fn row_index_for(opcode: u16) -> Option<usize> {
    if opcode >= SYNTHETIC_BASE {
        return OPCODE_TABLE.iter().position(|r| r.opcode == opcode);
    }
    if opcode < 0x100 {
        let idx = LEAD_BYTE_TABLE[opcode as usize];
        return (idx != 0xFF).then_some(idx as usize);
    }
    let second_byte = (opcode - 0xFF) as usize;
    let idx = EXT_BYTE_TABLE[second_byte];
    (idx != 0xFF).then_some(idx as usize)
}

/// Look up the opcode row for a leading byte, optionally preceded by the
/// extended-opcode prefix.
#[must_use]
pub fn info_for_lead_byte(byte: u8) -> Option<&'static OpInfo> {
    let idx = LEAD_BYTE_TABLE[byte as usize];
    (idx != 0xFF).then(|| &OPCODE_TABLE[idx as usize])
}

/// Look up the opcode row for the second byte of an extended opcode.
#[must_use]
pub fn info_for_ext_byte(byte: u8) -> Option<&'static OpInfo> {
    let idx = EXT_BYTE_TABLE[byte as usize];
    (idx != 0xFF).then(|| &OPCODE_TABLE[idx as usize])
}

/// Look up the opcode row for a fully-encoded opcode value (plain, extended,
/// or synthetic).
#[must_use]
pub fn info_for(opcode: u16) -> Option<&'static OpInfo> {
    row_index_for(opcode).map(|i| &OPCODE_TABLE[i])
}

/// Number of non-padding argument entries in `args`.
#[must_use]
pub fn arg_count(args: &[ArgKind; 7]) -> usize {
    args.iter().take_while(|a| **a != ArgKind::None).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_byte_resolves_name_op() {
        let info = info_for_lead_byte(0x08).unwrap();
        assert_eq!(info.name, "Name");
        assert!(info.flags.named());
        assert_eq!(arg_count(&info.args), 2);
    }

    #[test]
    fn ext_byte_resolves_mutex_op() {
        let info = info_for_ext_byte(0x01).unwrap();
        assert_eq!(info.name, "Mutex");
    }

    #[test]
    fn synthetic_opcodes_resolve_by_full_value() {
        let info = info_for(OP_METHOD_CALL).unwrap();
        assert_eq!(info.name, "$MethodCall");
    }

    #[test]
    fn while_is_scoped_executable_and_deferred() {
        let info = info_for_lead_byte(0xA2).unwrap();
        assert!(info.flags.scoped());
        assert!(info.flags.executable());
        assert!(info.flags.defer_parsing());
    }

    #[test]
    fn divide_has_two_optional_targets() {
        let info = info_for_lead_byte(0x78).unwrap();
        assert_eq!(arg_count(&info.args), 4);
        assert_eq!(info.args[2], Target);
        assert_eq!(info.args[3], Target);
    }

    #[test]
    fn match_uses_all_seven_argument_slots() {
        let info = info_for_lead_byte(0x89).unwrap();
        assert_eq!(arg_count(&info.args), 7);
    }

    #[test]
    fn unknown_lead_byte_is_none() {
        // 0x02-0x05 are reserved / unused in the ACPI opcode space.
        assert!(info_for_lead_byte(0x02).is_none());
    }
}
