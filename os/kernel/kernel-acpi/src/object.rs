//! # Object tree (C4)
//!
//! An arena of AML objects addressed by `u32` index with a LIFO free list,
//! plus the lookup operations (`Find`, relative-path resolution, nearest
//! named ancestor) the parser and VM build on (`spec.md` §3, §4.4).

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::opcode::{self, OP_FREED, OP_SCOPE_BLOCK, SCOPE_OP};
use crate::path::{NameSeg, NamePath, pad_seg};

/// Sentinel for "no such index".
pub const INVALID_INDEX: u32 = u32::MAX;

/// Root namespace name, `\`, padded like any other segment.
pub const ROOT_NAME: NameSeg = [b'\\', b'_', b'_', b'_'];

pub const PREDEFINED_SCOPES: [NameSeg; 5] = [*b"_GPE", *b"_PR_", *b"_SB_", *b"_SI_", *b"_TZ_"];

/// Bit-granular description of one named field inside a `Field` /
/// `IndexField` / `BankField` (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Any,
    Byte,
    Word,
    Dword,
    Qword,
    Buffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessAttrib {
    None,
    Quick,
    SendReceive,
    Byte,
    Word,
    Block,
    Bytes(u8),
    ProcessCall,
    BlockProcessCall,
    RawBytes(u8),
    RawProcessBytes(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockType {
    NoLock,
    Lock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Preserve,
    WriteAsOnes,
    WriteAsZeroes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldElement {
    pub offset: u32,
    pub width: u32,
    pub access_length: u8,
    pub access_type: AccessType,
    pub access_attrib: AccessAttrib,
    pub lock_type: LockType,
    pub update_type: UpdateType,
    pub connection_index: u32,
    pub field_index: u32,
}

/// The polymorphic value slot on an [`Object`] (`spec.md` §3, §9).
#[derive(Debug, Clone)]
pub enum NodeValue {
    Empty,
    Integer(u64),
    /// Raw bytes: string payload, byte-list payload, or an unresolved
    /// namepath's raw name bytes.
    Bytes(Vec<u8>),
    /// Index of another object: a resolved name path, or a method-call
    /// target.
    ObjectRef(u32),
    Field(Box<FieldElement>),
}

impl Default for NodeValue {
    fn default() -> Self {
        NodeValue::Empty
    }
}

/// One node of the AML object tree (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Object {
    pub opcode: u16,
    pub info_index: u8,
    pub table_handle: u8,
    pub name: NameSeg,
    pub index: u32,
    pub parent_index: u32,
    pub prev_sibling_index: u32,
    pub next_sibling_index: u32,
    /// Head of this object's children, which double as its bound arguments
    /// once a parser pass has attached them (`spec.md` §3's `first_arg_index`).
    pub first_child_index: u32,
    pub last_child_index: u32,
    pub aml_offset: u32,
    /// Non-zero iff this opcode required deferred parsing; the exclusive
    /// end of its package in the originating stream.
    pub pkg_end: u32,
    pub value: NodeValue,
}

impl Object {
    fn new_at(index: u32) -> Self {
        Self {
            opcode: OP_FREED,
            info_index: 0xFF,
            table_handle: 0,
            name: [b'_'; 4],
            index,
            parent_index: INVALID_INDEX,
            prev_sibling_index: INVALID_INDEX,
            next_sibling_index: INVALID_INDEX,
            first_child_index: INVALID_INDEX,
            last_child_index: INVALID_INDEX,
            aml_offset: 0,
            pkg_end: 0,
            value: NodeValue::Empty,
        }
    }

    #[must_use]
    pub fn is_freed(&self) -> bool {
        self.opcode == OP_FREED
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        self.first_child_index != INVALID_INDEX
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("object {0} is not a live object")]
    NotAlive(u32),
    #[error("attempted to free object {0} that still contains argument references")]
    FreeWithChildren(u32),
}

/// Arena of [`Object`]s with a LIFO free list (`spec.md` §3, §9).
pub struct ObjectPool {
    objects: Vec<Object>,
    free_list: Vec<u32>,
    root_index: u32,
}

impl ObjectPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            free_list: Vec::new(),
            root_index: INVALID_INDEX,
        }
    }

    #[must_use]
    pub fn root_index(&self) -> u32 {
        self.root_index
    }

    /// Create the predefined namespace: `\`, `\_GPE`, `\_PR_`, `\_SB_`,
    /// `\_SI_`, `\_TZ_`, each represented as a synthetic scope block.
    /// Idempotent — calling it more than once is a no-op.
    pub fn create_default_scopes(&mut self, table_handle: u8) {
        if self.root_index != INVALID_INDEX {
            return;
        }
        let root = self.alloc(opcode::OP_SCOPE_BLOCK, ROOT_NAME, table_handle, 0);
        self.root_index = root;
        for name in PREDEFINED_SCOPES {
            let child = self.alloc(opcode::OP_SCOPE_BLOCK, name, table_handle, 0);
            self.append_child(root, child)
                .expect("root is freshly allocated and always alive");
        }
    }

    /// Allocate a fresh object, reusing a freed slot if one exists.
    #[must_use]
    pub fn alloc(&mut self, op: u16, name: NameSeg, table_handle: u8, aml_offset: u32) -> u32 {
        let idx = if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.objects.len() as u32;
            self.objects.push(Object::new_at(idx));
            idx
        };
        let info_index = opcode::row_index_for(op).map_or(0xFF, |i| i as u8);
        let obj = &mut self.objects[idx as usize];
        *obj = Object::new_at(idx);
        obj.opcode = op;
        obj.info_index = info_index;
        obj.table_handle = table_handle;
        obj.name = name;
        obj.aml_offset = aml_offset;
        idx
    }

    /// Free `index`. Fails if the object still has live children.
    ///
    /// # Errors
    /// Returns [`PoolError::NotAlive`] if `index` is already free, or
    /// [`PoolError::FreeWithChildren`] if the object still has children.
    pub fn free(&mut self, index: u32) -> Result<(), PoolError> {
        let obj = self
            .objects
            .get(index as usize)
            .filter(|o| !o.is_freed())
            .ok_or(PoolError::NotAlive(index))?;
        if obj.has_children() {
            debug_assert!(false, "freeing object {index} with live children");
            return Err(PoolError::FreeWithChildren(index));
        }
        let obj = &mut self.objects[index as usize];
        obj.opcode = OP_FREED;
        obj.value = NodeValue::Empty;
        self.free_list.push(index);
        Ok(())
    }

    /// `ObjectAt`: returns the live object at `index`, or `None` if the
    /// slot is out of range or has been freed.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&Object> {
        self.objects
            .get(index as usize)
            .filter(|o| !o.is_freed())
    }

    #[must_use]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut Object> {
        self.objects
            .get_mut(index as usize)
            .filter(|o| !o.is_freed())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// # Errors
    /// Returns [`PoolError::NotAlive`] if `parent` is not a live object.
    pub fn append_child(&mut self, parent: u32, child: u32) -> Result<(), PoolError> {
        let last = self.get(parent).ok_or(PoolError::NotAlive(parent))?.last_child_index;
        if last == INVALID_INDEX {
            let p = self.get_mut(parent).ok_or(PoolError::NotAlive(parent))?;
            p.first_child_index = child;
            p.last_child_index = child;
        } else {
            self.append_after(parent, child, last)?;
        }
        if let Some(c) = self.get_mut(child) {
            c.parent_index = parent;
        }
        Ok(())
    }

    /// Insert `new` immediately after `reference` within `parent`'s child
    /// list. Degrades to [`ObjectPool::append_child`] if `reference` is the
    /// last child.
    ///
    /// # Errors
    /// Returns [`PoolError::NotAlive`] if `parent` or `reference` is not alive.
    pub fn append_after(&mut self, parent: u32, new: u32, reference: u32) -> Result<(), PoolError> {
        let next = self
            .get(reference)
            .ok_or(PoolError::NotAlive(reference))?
            .next_sibling_index;

        {
            let n = self.get_mut(new).ok_or(PoolError::NotAlive(new))?;
            n.parent_index = parent;
            n.prev_sibling_index = reference;
            n.next_sibling_index = next;
        }
        if let Some(r) = self.get_mut(reference) {
            r.next_sibling_index = new;
        }
        if next == INVALID_INDEX {
            if let Some(p) = self.get_mut(parent) {
                p.last_child_index = new;
            }
        } else if let Some(n) = self.get_mut(next) {
            n.prev_sibling_index = new;
        }
        Ok(())
    }

    /// Detach `child` from its parent's sibling chain. The child's own
    /// parent/sibling pointers are reset to invalid; its own children are
    /// untouched.
    pub fn detach(&mut self, child: u32) {
        let (parent, prev, next) = match self.get(child) {
            Some(c) => (c.parent_index, c.prev_sibling_index, c.next_sibling_index),
            None => return,
        };
        if prev == INVALID_INDEX {
            if let Some(p) = self.get_mut(parent) {
                p.first_child_index = next;
            }
        } else if let Some(p) = self.get_mut(prev) {
            p.next_sibling_index = next;
        }
        if next == INVALID_INDEX {
            if let Some(p) = self.get_mut(parent) {
                p.last_child_index = prev;
            }
        } else if let Some(n) = self.get_mut(next) {
            n.prev_sibling_index = prev;
        }
        if let Some(c) = self.get_mut(child) {
            c.parent_index = INVALID_INDEX;
            c.prev_sibling_index = INVALID_INDEX;
            c.next_sibling_index = INVALID_INDEX;
        }
    }

    /// Iterate the direct children of `parent`, oldest first.
    pub fn children(&self, parent: u32) -> ChildIter<'_> {
        ChildIter {
            pool: self,
            next: self.get(parent).map_or(INVALID_INDEX, |o| o.first_child_index),
        }
    }

    /// Resolve the scope that named lookups under `idx` actually search:
    /// `idx` itself if it already is a scope block, otherwise its first
    /// child that is a scope block (the body of a `Device`/`Processor`/
    /// `PowerRes`/`ThermalZone`/`Method`), otherwise `idx` itself (an empty
    /// or not-yet-parsed body).
    #[must_use]
    pub fn effective_scope(&self, idx: u32) -> u32 {
        match self.get(idx) {
            Some(o) if o.opcode == OP_SCOPE_BLOCK => idx,
            Some(_) => self
                .children(idx)
                .find(|&c| self.get(c).is_some_and(|o| o.opcode == OP_SCOPE_BLOCK))
                .unwrap_or(idx),
            None => idx,
        }
    }

    fn find_child_named(&self, parent: u32, name: NameSeg) -> Option<u32> {
        let eff = self.effective_scope(parent);
        self.children(eff).find(|&c| self.get(c).is_some_and(|o| o.name == name))
    }

    /// `findRelative`: walk a sequence of name segments from `scope`,
    /// requiring a direct child match at every step (no ancestor search).
    #[must_use]
    pub fn find_relative(&self, scope: u32, segments: &[NameSeg]) -> u32 {
        let mut cur = scope;
        for seg in segments {
            match self.find_child_named(cur, *seg) {
                Some(next) => cur = next,
                None => return INVALID_INDEX,
            }
        }
        cur
    }

    /// `Find`: resolve a [`NamePath`] against `scope` per the ACPI scoping
    /// rule — absolute and multi-segment relative paths resolve
    /// structurally, a bare single segment searches `scope` and then each
    /// ancestor up to the root (`spec.md` §4.4, §9).
    #[must_use]
    pub fn find(&self, scope: u32, path: &NamePath) -> u32 {
        if path.root {
            if path.segments.is_empty() {
                return self.root_index;
            }
            return self.find_relative(self.root_index, &path.segments);
        }
        if path.parent_ups > 0 {
            let mut cur = scope;
            for _ in 0..path.parent_ups {
                cur = match self.get(cur) {
                    Some(o) => o.parent_index,
                    None => return INVALID_INDEX,
                };
                if cur == INVALID_INDEX {
                    return INVALID_INDEX;
                }
            }
            if path.segments.is_empty() {
                return cur;
            }
            return self.find_relative(cur, &path.segments);
        }
        match path.segments.len() {
            0 => INVALID_INDEX,
            1 => self.search_rule(scope, path.segments[0]),
            _ => self.find_relative(scope, &path.segments),
        }
    }

    fn search_rule(&self, scope: u32, name: NameSeg) -> u32 {
        let mut cur = scope;
        loop {
            if let Some(found) = self.find_child_named(cur, name) {
                return found;
            }
            if cur == self.root_index {
                return INVALID_INDEX;
            }
            cur = match self.get(cur) {
                Some(o) => o.parent_index,
                None => return INVALID_INDEX,
            };
            if cur == INVALID_INDEX {
                return INVALID_INDEX;
            }
        }
    }

    /// Walk parents from `idx`, stopping at the first ancestor whose opcode
    /// is flagged `Named`. Returns [`INVALID_INDEX`] if it encounters an
    /// unresolved `Scope` opcode before any named ancestor (`spec.md` §4.4).
    #[must_use]
    pub fn closest_named_ancestor(&self, idx: u32) -> u32 {
        let mut cur = match self.get(idx) {
            Some(o) => o.parent_index,
            None => return INVALID_INDEX,
        };
        loop {
            if cur == INVALID_INDEX {
                return INVALID_INDEX;
            }
            let obj = match self.get(cur) {
                Some(o) => o,
                None => return INVALID_INDEX,
            };
            if obj.opcode == SCOPE_OP {
                return INVALID_INDEX;
            }
            if opcode::info_for(obj.opcode).is_some_and(|i| i.flags.named()) {
                return cur;
            }
            cur = obj.parent_index;
        }
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ChildIter<'a> {
    pool: &'a ObjectPool,
    next: u32,
}

impl Iterator for ChildIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == INVALID_INDEX {
            return None;
        }
        let cur = self.next;
        self.next = self.pool.get(cur).map_or(INVALID_INDEX, |o| o.next_sibling_index);
        Some(cur)
    }
}

#[must_use]
pub fn name_from_str(s: &str) -> NameSeg {
    pad_seg(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_pool() -> ObjectPool {
        let mut pool = ObjectPool::new();
        pool.create_default_scopes(0);
        pool
    }

    #[test]
    fn default_scopes_are_children_of_root() {
        let pool = fresh_pool();
        let names: Vec<NameSeg> = pool.children(pool.root_index()).map(|i| pool.get(i).unwrap().name).collect();
        assert_eq!(names, PREDEFINED_SCOPES);
    }

    #[test]
    fn alloc_free_is_lifo() {
        let mut pool = fresh_pool();
        let a = pool.alloc(opcode::NAME_OP, name_from_str("AAAA"), 0, 0);
        let b = pool.alloc(opcode::NAME_OP, name_from_str("BBBB"), 0, 0);
        pool.free(a).unwrap();
        pool.free(b).unwrap();
        let c = pool.alloc(opcode::NAME_OP, name_from_str("CCCC"), 0, 0);
        let d = pool.alloc(opcode::NAME_OP, name_from_str("DDDD"), 0, 0);
        assert_eq!(c, b);
        assert_eq!(d, a);
    }

    #[test]
    fn free_with_children_fails() {
        let mut pool = fresh_pool();
        let parent = pool.alloc(opcode::DEVICE_OP, name_from_str("DEV0"), 0, 0);
        let child = pool.alloc(opcode::NAME_OP, name_from_str("X___"), 0, 0);
        pool.append_child(parent, child).unwrap();
        assert!(matches!(pool.free(parent), Err(PoolError::FreeWithChildren(_))));
    }

    #[test]
    fn append_and_detach_maintain_sibling_chain() {
        let mut pool = fresh_pool();
        let sb = pool.root_index();
        let a = pool.alloc(opcode::NAME_OP, name_from_str("AAAA"), 0, 0);
        let b = pool.alloc(opcode::NAME_OP, name_from_str("BBBB"), 0, 0);
        let c = pool.alloc(opcode::NAME_OP, name_from_str("CCCC"), 0, 0);
        pool.append_child(sb, a).unwrap();
        pool.append_child(sb, b).unwrap();
        pool.append_child(sb, c).unwrap();

        pool.detach(b);
        let remaining: Vec<NameSeg> = pool.children(sb).skip(5).map(|i| pool.get(i).unwrap().name).collect();
        assert_eq!(remaining, [name_from_str("AAAA"), name_from_str("CCCC")]);
        assert_eq!(pool.get(b).unwrap().parent_index, INVALID_INDEX);
    }

    #[test]
    fn find_single_segment_search_rule() {
        let mut pool = fresh_pool();
        let sb = pool.find(pool.root_index(), &NamePath::parse_dotted("_SB_"));
        let dev = pool.alloc(opcode::DEVICE_OP, name_from_str("PCI0"), 0, 0);
        pool.append_child(sb, dev).unwrap();
        let body = pool.alloc(opcode::OP_SCOPE_BLOCK, name_from_str("PCI0"), 0, 0);
        pool.append_child(dev, body).unwrap();
        let ide = pool.alloc(opcode::NAME_OP, name_from_str("IDE0"), 0, 0);
        pool.append_child(body, ide).unwrap();

        // From inside the device body, searching for _SB_ should walk up to root.
        let found = pool.find(body, &NamePath::parse_dotted("_SB_"));
        assert_eq!(found, sb);
    }

    #[test]
    fn find_absolute_multi_segment() {
        let mut pool = fresh_pool();
        let sb = pool.find(pool.root_index(), &NamePath::parse_dotted("_SB_"));
        let dev = pool.alloc(opcode::DEVICE_OP, name_from_str("PCI0"), 0, 0);
        pool.append_child(sb, dev).unwrap();
        let body = pool.alloc(opcode::OP_SCOPE_BLOCK, name_from_str("PCI0"), 0, 0);
        pool.append_child(dev, body).unwrap();
        let ide = pool.alloc(opcode::NAME_OP, name_from_str("IDE0"), 0, 0);
        pool.append_child(body, ide).unwrap();

        let found = pool.find(pool.root_index(), &NamePath::parse_dotted("\\_SB_.PCI0.IDE0"));
        assert_eq!(found, ide);
    }

    #[test]
    fn closest_named_ancestor_skips_scope_blocks() {
        let mut pool = fresh_pool();
        let sb = pool.find(pool.root_index(), &NamePath::parse_dotted("_SB_"));
        let dev = pool.alloc(opcode::DEVICE_OP, name_from_str("PCI0"), 0, 0);
        pool.append_child(sb, dev).unwrap();
        let body = pool.alloc(opcode::OP_SCOPE_BLOCK, name_from_str("PCI0"), 0, 0);
        pool.append_child(dev, body).unwrap();
        let ide = pool.alloc(opcode::NAME_OP, name_from_str("IDE0"), 0, 0);
        pool.append_child(body, ide).unwrap();

        assert_eq!(pool.closest_named_ancestor(ide), dev);
    }
}
