//! # AML parser (C5)
//!
//! Turns a table's AML byte stream into the object tree, via a small fixed
//! sequence of passes (`spec.md` §4.5):
//!
//! 1. `parse_object_list` — a recursive-descent walk that decodes every
//!    opcode and attaches its arguments as children in one pass, except for
//!    the three opcodes whose body is ambiguous until names resolve
//!    (`Buffer`, `While`, `BankField`), which only record their package end
//!    and are revisited in pass 3.
//! 2. A fixpoint loop alternating `mergeScopeDirectives` (retarget a
//!    `Scope()` directive's children onto the namespace object it names) and
//!    `relocateNamedObjects` (move a qualified-name object to the scope its
//!    path names), capped at [`crate::limits::MAX_RESOLVE_PASSES`].
//! 3. `parseDeferredBlocks` — revisit every recorded `Buffer`/`While`/
//!    `BankField` and parse its body for real, now that the namespace is settled.
//! 4. `resolveMethodCalls` — every ambiguous bare `NameString` encountered
//!    along the way becomes either a resolved data reference or (if it names
//!    a `Method`) a call node with its following siblings reattached as
//!    arguments, right-to-left unnecessary here since [`Parser::collect_following_siblings`]
//!    only ever walks forward from the call site.
//! 5. `connectNonNamedObjArgs` — a cheap arity sanity pass over the call
//!    nodes pass 4 produced.

mod field_list;

use alloc::vec::Vec;

use crate::object::{INVALID_INDEX, NodeValue, ObjectPool};
use crate::opcode::{self, ArgKind, OpInfo};
use crate::path::{NamePath, PathError};
use crate::reader::{Reader, ReaderError};
use crate::limits;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("stream error: {0}")]
    Reader(#[from] ReaderError),
    #[error("malformed name path: {0}")]
    Path(#[from] PathError),
    #[error("object pool error: {0}")]
    Pool(#[from] crate::object::PoolError),
    #[error("byte {0:#04x} does not begin a known opcode or a name path")]
    UnknownOpcode(u8),
    #[error("scope merge / named-object relocation did not converge within {0} passes")]
    TooManyResolvePasses(u32),
    #[error("a Scope() directive or qualified name path never resolved")]
    UnresolvedReference,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ParserMode {
    SkipAmbiguousBlocks,
    AllBlocks,
}

struct PendingRelocation {
    object_index: u32,
    prefix: NamePath,
    search_scope: u32,
}

struct PendingScope {
    scope_index: u32,
    wrapper: u32,
    target: NamePath,
    search_scope: u32,
}

pub(crate) struct Parser<'a> {
    pool: &'a mut ObjectPool,
    reader: Reader<'a>,
    table_handle: u8,
    mode: ParserMode,
    pending_relocations: Vec<PendingRelocation>,
    pending_scopes: Vec<PendingScope>,
    unresolved_calls: Vec<u32>,
    deferred: Vec<u32>,
}

/// Decode a variable-length `PkgLength` (`spec.md` §4.3). The returned value
/// counts from the position this call started at — it includes the bytes
/// used by the encoding itself, per the ACPI grammar.
pub(crate) fn decode_pkg_len(r: &mut Reader) -> Result<u32, ParseError> {
    let lead = r.read_byte()?;
    let extra_count = lead >> 6;
    if extra_count == 0 {
        return Ok(u32::from(lead & 0x3F));
    }
    let mut value = u32::from(lead & 0x0F);
    for i in 0..extra_count {
        let b = r.read_byte()?;
        value |= u32::from(b) << (4 + 8 * u32::from(i));
    }
    Ok(value)
}

/// Parse one table's AML payload into `pool`, attaching new objects under
/// the existing default-scope root.
///
/// # Errors
/// Returns [`ParseError`] on a malformed stream, an opcode byte that decodes
/// to neither a known opcode nor a name path, or a `Scope()`/qualified-name
/// reference that never resolves within [`limits::MAX_RESOLVE_PASSES`].
pub fn parse_table(pool: &mut ObjectPool, aml: &[u8], table_handle: u8) -> Result<(), ParseError> {
    let root = pool.root_index();
    let mut parser = Parser {
        pool,
        reader: Reader::new(aml, 0),
        table_handle,
        mode: ParserMode::SkipAmbiguousBlocks,
        pending_relocations: Vec::new(),
        pending_scopes: Vec::new(),
        unresolved_calls: Vec::new(),
        deferred: Vec::new(),
    };
    let end = aml.len();
    parser.parse_term_list_into(root, root, end)?;
    parser.run_fixpoint_resolution()?;
    parser.parse_deferred_blocks()?;
    parser.run_fixpoint_resolution()?;
    parser.resolve_method_calls()?;
    parser.connect_non_named_obj_args();
    Ok(())
}

impl Parser<'_> {
    fn parse_term_list_into(&mut self, attach_target: u32, search_scope: u32, end: usize) -> Result<(), ParseError> {
        while self.reader.offset() < end {
            let obj = self.parse_one_term(search_scope, end)?;
            if obj != INVALID_INDEX {
                self.pool.append_child(attach_target, obj)?;
            }
        }
        Ok(())
    }

    /// Decode one opcode (or a bare `NameString`) and fully parse its own
    /// arguments, returning the new object's index unattached to any parent
    /// (the caller decides where it belongs). Returns [`INVALID_INDEX`] for
    /// a no-op.
    pub(crate) fn parse_one_term(&mut self, scope: u32, end: usize) -> Result<u32, ParseError> {
        let lead = self.reader.peek_byte()?;
        let info: &'static OpInfo;
        let opcode;
        if lead == opcode::EXT_OP_PREFIX {
            self.reader.read_byte()?;
            let second = self.reader.read_byte()?;
            info = opcode::info_for_ext_byte(second).ok_or(ParseError::UnknownOpcode(second))?;
            opcode = info.opcode;
        } else if let Some(found) = opcode::info_for_lead_byte(lead) {
            self.reader.read_byte()?;
            info = found;
            opcode = info.opcode;
        } else {
            let path = NamePath::parse(&mut self.reader)?;
            let obj = self.pool.alloc(
                opcode::OP_NAME_PATH_OR_METHOD_CALL,
                crate::path::pad_seg(b""),
                self.table_handle,
                self.reader.offset() as u32,
            );
            self.pool.get_mut(obj).expect("just allocated").value = NodeValue::Bytes(path.encode());
            self.unresolved_calls.push(obj);
            return Ok(obj);
        }

        if opcode == opcode::NOOP_OP {
            return Ok(INVALID_INDEX);
        }

        let obj = self.pool.alloc(opcode, crate::path::pad_seg(b""), self.table_handle, self.reader.offset() as u32);

        if info.flags.constant() && opcode::arg_count(&info.args) == 0 {
            let value = match opcode {
                opcode::ZERO_OP => Some(0u64),
                opcode::ONE_OP => Some(1u64),
                opcode::ONES_OP => Some(u64::MAX),
                opcode::REVISION_OP => Some(2u64),
                _ => None,
            };
            if let Some(v) = value {
                self.pool.get_mut(obj).expect("just allocated").value = NodeValue::Integer(v);
            }
            return Ok(obj);
        }

        if opcode::arg_count(&info.args) == 1 && !info.flags.named() {
            match info.args[0] {
                ArgKind::ByteData | ArgKind::WordData | ArgKind::DwordData | ArgKind::QwordData => {
                    let width = match info.args[0] {
                        ArgKind::ByteData => 1,
                        ArgKind::WordData => 2,
                        ArgKind::DwordData => 4,
                        _ => 8,
                    };
                    let v = self.reader.read_uint(width)?;
                    self.pool.get_mut(obj).expect("just allocated").value = NodeValue::Integer(v);
                    return Ok(obj);
                }
                ArgKind::StringData => {
                    let mut bytes = Vec::new();
                    loop {
                        let b = self.reader.read_byte()?;
                        if b == 0 {
                            break;
                        }
                        bytes.push(b);
                    }
                    self.pool.get_mut(obj).expect("just allocated").value = NodeValue::Bytes(bytes);
                    return Ok(obj);
                }
                _ => {}
            }
        }

        self.parse_args(scope, obj, info, end)?;
        Ok(obj)
    }

    fn parse_args(&mut self, scope: u32, obj: u32, info: &'static OpInfo, outer_end: usize) -> Result<(), ParseError> {
        let opcode = self.pool.get(obj).expect("live").opcode;
        let n = opcode::arg_count(&info.args);
        let mut local_end = outer_end;
        let mut name_paths: Vec<NamePath> = Vec::new();
        let mut scalars: Vec<u64> = Vec::new();

        for kind in info.args.iter().take(n) {
            match kind {
                ArgKind::None => unreachable!("arg_count bounds the iteration"),
                ArgKind::PkgLen => {
                    let start = self.reader.offset();
                    let raw = decode_pkg_len(&mut self.reader)? as usize;
                    local_end = start + raw;
                    self.reader.set_pkg_end(local_end)?;
                    if info.flags.defer_parsing() && self.mode == ParserMode::SkipAmbiguousBlocks {
                        self.pool.get_mut(obj).expect("live").pkg_end = local_end as u32;
                        self.reader.set_offset(local_end);
                        self.deferred.push(obj);
                        return Ok(());
                    }
                }
                ArgKind::ByteData => scalars.push(self.reader.read_uint(1)?),
                ArgKind::WordData => scalars.push(self.reader.read_uint(2)?),
                ArgKind::DwordData => scalars.push(self.reader.read_uint(4)?),
                ArgKind::QwordData => scalars.push(self.reader.read_uint(8)?),
                ArgKind::StringData => {
                    loop {
                        let b = self.reader.read_byte()?;
                        if b == 0 {
                            break;
                        }
                    }
                }
                ArgKind::NameString => name_paths.push(NamePath::parse(&mut self.reader)?),
                ArgKind::TermArg | ArgKind::DataRefObj | ArgKind::SuperName | ArgKind::SimpleName => {
                    let child = self.parse_one_term(scope, local_end)?;
                    if child != INVALID_INDEX {
                        self.pool.append_child(obj, child)?;
                    }
                }
                ArgKind::Target => {
                    if self.reader.peek_byte()? == 0 {
                        self.reader.read_byte()?;
                    } else {
                        let child = self.parse_one_term(scope, local_end)?;
                        if child != INVALID_INDEX {
                            self.pool.append_child(obj, child)?;
                        }
                    }
                }
                ArgKind::ByteList => {
                    let remaining = local_end.saturating_sub(self.reader.offset());
                    let bytes = self.reader.read_slice(remaining)?;
                    self.pool.get_mut(obj).expect("live").value = NodeValue::Bytes(bytes.to_vec());
                }
                ArgKind::TermList => {
                    if info.flags.scoped() {
                        let scope_block =
                            self.pool
                                .alloc(opcode::OP_SCOPE_BLOCK, self.pool.get(obj).expect("live").name, self.table_handle, 0);
                        self.pool.append_child(obj, scope_block)?;
                        self.parse_term_list_into(scope_block, scope_block, local_end)?;
                    } else {
                        self.parse_term_list_into(obj, scope, local_end)?;
                    }
                }
                ArgKind::FieldList => {
                    let flags = scalars.first().copied().unwrap_or(0) as u8;
                    let region = name_paths.first().map_or(INVALID_INDEX, |p| self.pool.find(scope, p));
                    if region == INVALID_INDEX {
                        log::warn!("field list region/index reference did not resolve");
                    }
                    field_list::parse(self, scope, region, flags, local_end)?;
                }
            }
        }

        self.finish_args(scope, obj, opcode, &name_paths, &scalars)
    }

    fn finish_args(&mut self, scope: u32, obj: u32, opcode: u16, name_paths: &[NamePath], scalars: &[u64]) -> Result<(), ParseError> {
        if opcode == opcode::ALIAS_OP {
            if let (Some(source), Some(alias)) = (name_paths.first(), name_paths.get(1)) {
                self.connect_named_obj_args(obj, scope, alias.clone());
                let resolved = self.pool.find(scope, source);
                let value = if resolved == INVALID_INDEX {
                    log::warn!("Alias source did not resolve at parse time");
                    NodeValue::Bytes(source.encode())
                } else {
                    NodeValue::ObjectRef(resolved)
                };
                self.pool.get_mut(obj).expect("live").value = value;
            }
            return Ok(());
        }

        if let Some(name) = name_paths.first() {
            let info = opcode::info_for(opcode).expect("resolved earlier");
            if info.flags.named() {
                self.connect_named_obj_args(obj, scope, name.clone());
            }
        }

        match opcode {
            opcode::METHOD_OP | opcode::MUTEX_OP | opcode::OP_REGION_OP | opcode::PROCESSOR_OP | opcode::POWER_RES_OP => {
                if let Some(&v) = scalars.first() {
                    self.pool.get_mut(obj).expect("live").value = NodeValue::Integer(v);
                }
            }
            opcode::MATCH_OP => {
                // MatchOpcode1/MatchOpcode2 are the two ByteData scalars; pack the
                // first into bits 8..16 so `Vm::eval_match` can pull it back out
                // without re-parsing the surrounding TermArg children.
                let op1 = scalars.first().copied().unwrap_or(0);
                let op2 = scalars.get(1).copied().unwrap_or(0);
                self.pool.get_mut(obj).expect("live").value = NodeValue::Integer((op1 << 8) | op2);
            }
            opcode::SCOPE_OP => {
                if let Some(target) = name_paths.first() {
                    let scope_block = self.pool.get(obj).expect("live").first_child_index;
                    self.pending_scopes.push(PendingScope {
                        scope_index: scope_block,
                        wrapper: obj,
                        target: target.clone(),
                        search_scope: scope,
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn connect_named_obj_args(&mut self, obj: u32, scope: u32, path: NamePath) {
        let name = path.segments.last().copied().unwrap_or_else(|| crate::path::pad_seg(b""));
        if let Some(o) = self.pool.get_mut(obj) {
            o.name = name;
        }
        let qualified = path.root || path.parent_ups > 0 || path.segments.len() > 1;
        if qualified {
            self.pending_relocations.push(PendingRelocation {
                object_index: obj,
                prefix: path.without_last_segment(),
                search_scope: scope,
            });
        }
    }

    fn run_fixpoint_resolution(&mut self) -> Result<(), ParseError> {
        let mut pass = 0u32;
        while !self.pending_scopes.is_empty() || !self.pending_relocations.is_empty() {
            if pass >= limits::MAX_RESOLVE_PASSES {
                return Err(ParseError::TooManyResolvePasses(limits::MAX_RESOLVE_PASSES));
            }
            let a = self.try_merge_scope_directives()?;
            let b = self.try_relocate_named_objects()?;
            if !a && !b {
                return Err(ParseError::UnresolvedReference);
            }
            pass += 1;
        }
        Ok(())
    }

    fn try_merge_scope_directives(&mut self) -> Result<bool, ParseError> {
        let pending = core::mem::take(&mut self.pending_scopes);
        let mut progress = false;
        let mut remaining = Vec::new();
        for ps in pending {
            let target = self.pool.find(ps.search_scope, &ps.target);
            if target == INVALID_INDEX {
                remaining.push(ps);
                continue;
            }
            let dest = self.pool.effective_scope(target);
            let children: Vec<u32> = self.pool.children(ps.scope_index).collect();
            for c in children {
                self.pool.detach(c);
                self.pool.append_child(dest, c)?;
            }
            let _ = self.pool.free(ps.scope_index);
            let _ = self.pool.free(ps.wrapper);
            progress = true;
        }
        self.pending_scopes = remaining;
        Ok(progress)
    }

    fn try_relocate_named_objects(&mut self) -> Result<bool, ParseError> {
        let pending = core::mem::take(&mut self.pending_relocations);
        let mut progress = false;
        let mut remaining = Vec::new();
        for pr in pending {
            let dest = self.pool.find(pr.search_scope, &pr.prefix);
            if dest == INVALID_INDEX {
                remaining.push(pr);
                continue;
            }
            let dest_scope = self.pool.effective_scope(dest);
            self.pool.detach(pr.object_index);
            self.pool.append_child(dest_scope, pr.object_index)?;
            progress = true;
        }
        self.pending_relocations = remaining;
        Ok(progress)
    }

    fn parse_deferred_blocks(&mut self) -> Result<(), ParseError> {
        self.mode = ParserMode::AllBlocks;
        let deferred = core::mem::take(&mut self.deferred);
        let data_len = self.reader.len();
        for obj in deferred {
            let Some(o) = self.pool.get(obj) else { continue };
            let (opcode, aml_offset, parent) = (o.opcode, o.aml_offset, o.parent_index);
            let Some(info) = opcode::info_for(opcode) else { continue };
            self.reader.set_offset(aml_offset as usize);
            self.reader.set_pkg_end(data_len)?;
            self.parse_args(parent, obj, info, data_len)?;
        }
        Ok(())
    }

    fn resolve_method_calls(&mut self) -> Result<(), ParseError> {
        let calls = core::mem::take(&mut self.unresolved_calls);
        for obj in calls {
            let Some(o) = self.pool.get(obj) else { continue };
            let parent = o.parent_index;
            let path = match &o.value {
                NodeValue::Bytes(b) => NamePath::decode(b),
                _ => NamePath::default(),
            };
            let resolved = self.pool.find(parent, &path);
            if resolved == INVALID_INDEX {
                if let Some(o) = self.pool.get_mut(obj) {
                    o.opcode = opcode::OP_NAME_PATH;
                }
                continue;
            }
            let resolved_opcode = self.pool.get(resolved).map_or(0, |o| o.opcode);
            if resolved_opcode == opcode::METHOD_OP {
                let arity = match self.pool.get(resolved).map(|o| &o.value) {
                    Some(NodeValue::Integer(flags)) => u32::from(*flags as u8 & 0x07),
                    _ => 0,
                };
                let args = self.collect_following_siblings(obj, arity);
                for a in args {
                    self.pool.detach(a);
                    self.pool.append_child(obj, a)?;
                }
                if let Some(o) = self.pool.get_mut(obj) {
                    o.opcode = opcode::OP_METHOD_CALL;
                    o.value = NodeValue::ObjectRef(resolved);
                }
            } else if let Some(o) = self.pool.get_mut(obj) {
                o.opcode = opcode::OP_RESOLVED_NAME_PATH;
                o.value = NodeValue::ObjectRef(resolved);
            }
        }
        Ok(())
    }

    /// Walk forward from `start`'s sibling chain, crossing up into the
    /// parent's own following siblings if the immediate scope runs out
    /// before `count` candidates are found.
    fn collect_following_siblings(&mut self, start: u32, count: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cursor = start;
        while (out.len() as u32) < count {
            let next = self.pool.get(cursor).map_or(INVALID_INDEX, |o| o.next_sibling_index);
            if next != INVALID_INDEX {
                out.push(next);
                cursor = next;
                continue;
            }
            let parent = self.pool.get(cursor).map_or(INVALID_INDEX, |o| o.parent_index);
            if parent == INVALID_INDEX {
                break;
            }
            cursor = parent;
        }
        out
    }

    fn connect_non_named_obj_args(&mut self) {
        for idx in 0..self.pool.len() as u32 {
            let Some(obj) = self.pool.get(idx) else { continue };
            if obj.opcode != opcode::OP_METHOD_CALL {
                continue;
            }
            let NodeValue::ObjectRef(method) = obj.value else { continue };
            let Some(m) = self.pool.get(method) else { continue };
            let NodeValue::Integer(flags) = m.value else { continue };
            let arity = (flags as u8 & 0x07) as usize;
            let got = self.pool.children(idx).count();
            if got != arity {
                log::warn!("method call at object {idx} has {got} arguments attached, method declares {arity}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::name_from_str;
    use crate::opcode as op;

    #[test]
    fn pkg_len_single_byte() {
        let data = [0x04u8];
        let mut r = Reader::new(&data, 0);
        assert_eq!(decode_pkg_len(&mut r).unwrap(), 4);
    }

    #[test]
    fn pkg_len_two_byte_form() {
        let data = [0x47u8, 0xFF];
        let mut r = Reader::new(&data, 0);
        assert_eq!(decode_pkg_len(&mut r).unwrap(), 4087);
    }

    #[test]
    fn pkg_len_three_byte_form() {
        let data = [0x88u8, 0xFF, 0x80];
        let mut r = Reader::new(&data, 0);
        assert_eq!(decode_pkg_len(&mut r).unwrap(), 528_376);
    }

    #[test]
    fn pkg_len_four_byte_form() {
        let data = [0xC6u8, 0xFF, 0x80, 0x2A];
        let mut r = Reader::new(&data, 0);
        assert_eq!(decode_pkg_len(&mut r).unwrap(), 44_568_566);
    }

    fn fresh_pool() -> ObjectPool {
        let mut pool = ObjectPool::new();
        pool.create_default_scopes(0);
        pool
    }

    #[test]
    fn parses_a_name_with_integer_constant() {
        // Name(FOO, 0x2A) -> 0x08 'F' 'O' 'O' '_' 0x0A 0x2A
        let mut aml = Vec::new();
        aml.push(op::NAME_OP);
        aml.extend_from_slice(b"FOO_");
        aml.push(op::BYTE_PREFIX as u8);
        aml.push(0x2A);

        let mut pool = fresh_pool();
        parse_table(&mut pool, &aml, 0).unwrap();

        let root = pool.root_index();
        let found = pool.children(root).find(|&i| pool.get(i).unwrap().name == name_from_str("FOO_")).unwrap();
        let foo = pool.get(found).unwrap();
        assert_eq!(foo.opcode, op::NAME_OP);
        let child = pool.children(found).next().unwrap();
        assert!(matches!(pool.get(child).unwrap().value, NodeValue::Integer(0x2A)));
    }

    #[test]
    fn scope_directive_relocates_children_to_target() {
        // Scope(\_SB_) { Name(ABCD, 1) }
        let mut aml = Vec::new();
        aml.push(op::SCOPE_OP);
        let body_start_marker = aml.len();
        aml.push(0); // placeholder pkg_len byte, fixed up below
        aml.push(crate::opcode::ROOT_CHAR);
        aml.extend_from_slice(b"_SB_");
        let name_start = aml.len();
        aml.push(op::NAME_OP);
        aml.extend_from_slice(b"ABCD");
        aml.push(op::BYTE_PREFIX as u8);
        aml.push(1);
        let _ = name_start;
        let total_len = aml.len() - body_start_marker;
        assert!(total_len < 0x3F);
        aml[body_start_marker] = total_len as u8;

        let mut pool = fresh_pool();
        parse_table(&mut pool, &aml, 0).unwrap();

        let sb = pool.find(pool.root_index(), &NamePath::parse_dotted("_SB_"));
        assert_ne!(sb, INVALID_INDEX);
        let found = pool.children(sb).find(|&i| pool.get(i).unwrap().name == name_from_str("ABCD"));
        assert!(found.is_some(), "ABCD should have been relocated under \\_SB_");
    }

    #[test]
    fn forward_method_call_resolves_after_full_parse() {
        // Method(FOO, 0) { Return(BAR()) }  Method(BAR, 0) { Return(1) }
        let mut aml = Vec::new();
        aml.push(op::METHOD_OP);
        let foo_pkglen_pos = aml.len();
        aml.push(0);
        aml.extend_from_slice(b"FOO_");
        aml.push(0); // MethodFlags: 0 args
        aml.push(op::RETURN_OP as u8);
        aml.extend_from_slice(b"BAR_");
        let foo_len = (aml.len() - foo_pkglen_pos) as u8;
        aml[foo_pkglen_pos] = foo_len;

        aml.push(op::METHOD_OP);
        let bar_pkglen_pos = aml.len();
        aml.push(0);
        aml.extend_from_slice(b"BAR_");
        aml.push(0);
        aml.push(op::RETURN_OP as u8);
        aml.push(op::ONE_OP as u8);
        let bar_len = (aml.len() - bar_pkglen_pos) as u8;
        aml[bar_pkglen_pos] = bar_len;

        let mut pool = fresh_pool();
        parse_table(&mut pool, &aml, 0).unwrap();

        let root = pool.root_index();
        let foo = pool.children(root).find(|&i| pool.get(i).unwrap().name == name_from_str("FOO_")).unwrap();
        let foo_scope = pool.get(foo).unwrap().first_child_index;
        let return_stmt = pool.children(foo_scope).next().unwrap();
        let call = pool.children(return_stmt).next().unwrap();
        assert_eq!(pool.get(call).unwrap().opcode, op::OP_METHOD_CALL);
    }

    #[test]
    fn deferred_buffer_is_parsed_in_pass_three() {
        // Name(BUF0, Buffer(4) { 1, 2, 3, 4 })
        let mut aml = Vec::new();
        aml.push(op::NAME_OP);
        aml.extend_from_slice(b"BUF0");
        aml.push(op::BUFFER_OP as u8);
        let pkglen_pos = aml.len();
        aml.push(0);
        aml.push(op::BYTE_PREFIX as u8);
        aml.push(4);
        aml.extend_from_slice(&[1, 2, 3, 4]);
        let len = (aml.len() - pkglen_pos) as u8;
        aml[pkglen_pos] = len;

        let mut pool = fresh_pool();
        parse_table(&mut pool, &aml, 0).unwrap();

        let root = pool.root_index();
        let buf0 = pool.children(root).find(|&i| pool.get(i).unwrap().name == name_from_str("BUF0")).unwrap();
        let buffer_obj = pool.children(buf0).next().unwrap();
        match &pool.get(buffer_obj).unwrap().value {
            NodeValue::Bytes(b) => assert_eq!(b.as_slice(), &[1, 2, 3, 4]),
            other => panic!("expected buffer bytes, got {other:?}"),
        }
    }
}
