//! # AML virtual machine (C6)
//!
//! Walks the object tree a table parse produced and evaluates `TermArg`
//! expressions and method bodies against it (`spec.md` §4.6). The tree
//! itself never changes shape once parsed; the VM's only mutable state
//! beyond it is a method invocation's locals/args and whatever a `Store`
//! writes back into a `Name`/field object's [`crate::object::NodeValue`].

use alloc::vec::Vec;

use crate::limits;
use crate::object::{self, INVALID_INDEX, NodeValue, ObjectPool};
use crate::opcode;
use crate::path::NamePath;
use crate::region::{self, AddressSpace, RegionBackend};
use crate::value::{self, ObjectType, RtValue};

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("value conversion failed: {0}")]
    Convert(#[from] value::ConvertError),
    #[error("region access failed: {0}")]
    Region(#[from] region::RegionError),
    #[error("object pool error: {0}")]
    Pool(#[from] object::PoolError),
    #[error("object {0} does not exist")]
    NotFound(u32),
    #[error("object {0} is not a Method")]
    NotAMethod(u32),
    #[error("dereferenced a value that is not an object reference")]
    NotAReference,
    #[error("name path did not resolve while executing")]
    UnresolvedReference,
    #[error("method {method} declares {declared} argument(s), called with {supplied}")]
    TooManyArguments { method: u32, declared: usize, supplied: usize },
    #[error("divide by zero")]
    DivideByZero,
}

/// What a statement handed control back as. Distinct from [`VmError`]:
/// `Break`/`Continue`/`Return` are ordinary, expected outcomes of running a
/// `TermList`, not failures.
enum ExecFlow {
    Normal,
    Break,
    Continue,
    Return(RtValue),
}

/// Per-invocation state: the 8 method locals and up to 7 arguments
/// (`spec.md` §4.6, sized by [`limits::NUM_LOCALS`]/[`limits::NUM_ARGS`]).
struct ExecContext {
    locals: [RtValue; limits::NUM_LOCALS],
    args: [RtValue; limits::NUM_ARGS],
    integer_width: u32,
}

impl ExecContext {
    fn new(args: Vec<RtValue>, integer_width: u32) -> Self {
        const UNINIT: RtValue = RtValue::Uninitialized;
        let mut ctx = ExecContext {
            locals: [UNINIT; limits::NUM_LOCALS],
            args: [UNINIT; limits::NUM_ARGS],
            integer_width,
        };
        for (slot, v) in ctx.args.iter_mut().zip(args) {
            *slot = v;
        }
        ctx
    }
}

fn local_index(opcode: u16) -> Option<usize> {
    (opcode::LOCAL0_OP..=opcode::LOCAL7_OP).contains(&opcode).then(|| (opcode - opcode::LOCAL0_OP) as usize)
}

fn arg_index(opcode: u16) -> Option<usize> {
    (opcode::ARG0_OP..=opcode::ARG6_OP).contains(&opcode).then(|| (opcode - opcode::ARG0_OP) as usize)
}

fn address_space_from_id(id: u64) -> AddressSpace {
    match id {
        0 => AddressSpace::SystemMemory,
        1 => AddressSpace::SystemIo,
        2 => AddressSpace::PciConfig,
        3 => AddressSpace::EmbeddedController,
        4 => AddressSpace::SmBus,
        5 => AddressSpace::CmosRtc,
        6 => AddressSpace::PciBarTarget,
        7 => AddressSpace::Ipmi,
        8 => AddressSpace::GeneralPurposeIo,
        9 => AddressSpace::GenericSerialBus,
        other => {
            log::warn!("unrecognized operation region address space id {other}, assuming SystemMemory");
            AddressSpace::SystemMemory
        }
    }
}

/// The ACPI-defined small-integer encoding for `ObjectType`/`ObjectTypeOp`.
fn object_type_code(t: ObjectType) -> u64 {
    match t {
        ObjectType::Uninitialized => 0,
        ObjectType::Integer => 1,
        ObjectType::String => 2,
        ObjectType::Buffer => 3,
        ObjectType::Package => 4,
        ObjectType::FieldUnit => 5,
        ObjectType::Device => 6,
        ObjectType::Event => 7,
        ObjectType::Method => 8,
        ObjectType::Mutex => 9,
        ObjectType::Region => 10,
        ObjectType::PowerResource => 11,
        ObjectType::Processor => 12,
        ObjectType::ThermalZone => 13,
        ObjectType::BufferField => 14,
        ObjectType::DdbHandle => 16,
        ObjectType::Debug => 17,
        ObjectType::ObjectReference | ObjectType::RawDataBuffer => 1,
    }
}

/// Executes parsed AML (`spec.md` §4.6). Owns the namespace it was handed
/// by the parser; borrows the region-access collaborator field reads and
/// writes go through, so the same backend instance can be shared with
/// whatever else in the kernel owns the hardware it talks to.
pub struct Vm<'a> {
    pool: ObjectPool,
    integer_width: u32,
    region_backend: &'a dyn RegionBackend,
}

impl<'a> Vm<'a> {
    #[must_use]
    pub fn new(pool: ObjectPool, integer_width: u32, region_backend: &'a dyn RegionBackend) -> Self {
        Self { pool, integer_width, region_backend }
    }

    #[must_use]
    pub fn pool(&self) -> &ObjectPool {
        &self.pool
    }

    /// Resolve a namespace path against the root, e.g. `"\\_SB_.PCI0._STA"`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> u32 {
        self.pool.find(self.pool.root_index(), &NamePath::parse_dotted(path))
    }

    /// Depth-first walk of the namespace starting at `start`, calling `f`
    /// with each visited object's index and nesting depth. Intended for
    /// namespace dumps and driver enumeration, not execution.
    pub fn visit<F: FnMut(u32, usize)>(&self, start: u32, f: &mut F, depth: usize) {
        f(start, depth);
        for child in self.pool.children(self.pool.effective_scope(start)) {
            self.visit(child, f, depth + 1);
        }
    }

    /// Read a data object's current value without invoking it as a method
    /// (a plain `Name`, field unit, or resolved reference).
    ///
    /// # Errors
    /// Returns [`VmError`] if `index` does not exist or reading it requires
    /// a region access the backend refuses.
    pub fn read(&mut self, index: u32) -> Result<RtValue, VmError> {
        let mut ctx = ExecContext::new(Vec::new(), self.integer_width);
        self.load_object(index, &mut ctx)
    }

    /// Invoke a `Method` object with the given arguments.
    ///
    /// # Errors
    /// Returns [`VmError::NotAMethod`] if `method` is not a `Method`,
    /// [`VmError::TooManyArguments`] if `args` exceeds its declared arity
    /// (fewer is allowed; unfilled slots read back as `Uninitialized`), or
    /// any error its body raises while executing.
    pub fn call_method(&mut self, method: u32, args: Vec<RtValue>) -> Result<RtValue, VmError> {
        let obj = self.pool.get(method).ok_or(VmError::NotFound(method))?;
        if obj.opcode != opcode::METHOD_OP {
            return Err(VmError::NotAMethod(method));
        }
        let declared_arity = match obj.value {
            NodeValue::Integer(flags) => (flags as u8 & 0x07) as usize,
            _ => 0,
        };
        if args.len() > declared_arity {
            return Err(VmError::TooManyArguments { method, declared: declared_arity, supplied: args.len() });
        }
        if args.len() < declared_arity {
            log::warn!("calling method {method} with {} arguments, it declares {declared_arity}", args.len());
        }
        let scope = self.pool.effective_scope(method);
        let mut ctx = ExecContext::new(args, self.integer_width);
        match self.exec_block(scope, &mut ctx)? {
            ExecFlow::Return(v) => Ok(v),
            _ => Ok(RtValue::Uninitialized),
        }
    }

    fn exec_block(&mut self, scope: u32, ctx: &mut ExecContext) -> Result<ExecFlow, VmError> {
        let stmts: Vec<u32> = self.pool.children(scope).collect();
        for stmt in stmts {
            match self.exec_statement(stmt, ctx)? {
                ExecFlow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(ExecFlow::Normal)
    }

    fn following_else_scope(&self, if_node: u32) -> Option<u32> {
        let next = self.pool.get(if_node)?.next_sibling_index;
        if next == INVALID_INDEX {
            return None;
        }
        let sibling = self.pool.get(next)?;
        if sibling.opcode != opcode::ELSE_OP {
            return None;
        }
        self.pool.children(next).next()
    }

    fn exec_statement(&mut self, node: u32, ctx: &mut ExecContext) -> Result<ExecFlow, VmError> {
        let opcode = self.pool.get(node).ok_or(VmError::NotFound(node))?.opcode;
        match opcode {
            opcode::IF_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let cond = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)? != 0;
                if cond {
                    self.exec_block(children[1], ctx)
                } else if let Some(else_scope) = self.following_else_scope(node) {
                    self.exec_block(else_scope, ctx)
                } else {
                    Ok(ExecFlow::Normal)
                }
            }
            opcode::ELSE_OP => Ok(ExecFlow::Normal),
            opcode::WHILE_OP => {
                loop {
                    let children: Vec<u32> = self.pool.children(node).collect();
                    let cond = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)? != 0;
                    if !cond {
                        break;
                    }
                    match self.exec_block(children[1], ctx)? {
                        ExecFlow::Normal | ExecFlow::Continue => {}
                        ExecFlow::Break => break,
                        ExecFlow::Return(v) => return Ok(ExecFlow::Return(v)),
                    }
                }
                Ok(ExecFlow::Normal)
            }
            opcode::RETURN_OP => {
                let child = self.pool.children(node).next();
                let v = match child {
                    Some(c) => self.eval_term_arg(c, ctx)?,
                    None => RtValue::Uninitialized,
                };
                Ok(ExecFlow::Return(v))
            }
            opcode::BREAK_OP => Ok(ExecFlow::Break),
            opcode::CONTINUE_OP => Ok(ExecFlow::Continue),
            opcode::NOOP_OP | opcode::BREAK_POINT_OP => Ok(ExecFlow::Normal),
            _ => {
                self.eval_term_arg(node, ctx)?;
                Ok(ExecFlow::Normal)
            }
        }
    }

    /// Read the effective value of a tree object — a `Name`'s sole data
    /// child, a field unit's region contents, a resolved reference's
    /// target, or a literal already baked into its `NodeValue` at parse
    /// time.
    fn load_object(&mut self, idx: u32, ctx: &mut ExecContext) -> Result<RtValue, VmError> {
        let obj = self.pool.get(idx).ok_or(VmError::NotFound(idx))?;
        let opcode = obj.opcode;
        match opcode {
            opcode::NAME_OP => match self.pool.children(idx).next() {
                Some(child) => self.eval_term_arg(child, ctx),
                None => Ok(RtValue::Uninitialized),
            },
            opcode::BUFFER_OP => match &self.pool.get(idx).ok_or(VmError::NotFound(idx))?.value {
                NodeValue::Bytes(b) => Ok(RtValue::Buffer(b.clone())),
                _ => Ok(RtValue::Buffer(Vec::new())),
            },
            opcode::PACKAGE_OP | opcode::VAR_PACKAGE_OP => {
                let elems: Vec<u32> = self.pool.children(idx).collect();
                let mut out = Vec::with_capacity(elems.len());
                for e in elems {
                    out.push(self.eval_term_arg(e, ctx)?);
                }
                Ok(RtValue::Package(out))
            }
            opcode::OP_NAMED_FIELD => self.vm_load_field(idx),
            opcode::OP_RESOLVED_NAME_PATH => {
                let target = match self.pool.get(idx).ok_or(VmError::NotFound(idx))?.value {
                    NodeValue::ObjectRef(t) => t,
                    _ => return Err(VmError::UnresolvedReference),
                };
                self.load_object(target, ctx)
            }
            opcode::OP_NAME_PATH => {
                let (search_scope, bytes) = {
                    let o = self.pool.get(idx).ok_or(VmError::NotFound(idx))?;
                    let bytes = match &o.value {
                        NodeValue::Bytes(b) => b.clone(),
                        _ => return Err(VmError::UnresolvedReference),
                    };
                    (o.parent_index, bytes)
                };
                let path = NamePath::decode(&bytes);
                let target = self.pool.find(search_scope, &path);
                if target == INVALID_INDEX {
                    return Err(VmError::UnresolvedReference);
                }
                self.load_object(target, ctx)
            }
            opcode::OP_METHOD_CALL => self.eval_term_arg(idx, ctx),
            opcode::ZERO_OP | opcode::ONE_OP | opcode::ONES_OP | opcode::REVISION_OP | opcode::BYTE_PREFIX
            | opcode::WORD_PREFIX | opcode::DWORD_PREFIX | opcode::QWORD_PREFIX => {
                match self.pool.get(idx).ok_or(VmError::NotFound(idx))?.value {
                    NodeValue::Integer(v) => Ok(RtValue::Integer(value::truncate_to_width(v, ctx.integer_width))),
                    _ => Ok(RtValue::Integer(0)),
                }
            }
            opcode::STRING_PREFIX => match &self.pool.get(idx).ok_or(VmError::NotFound(idx))?.value {
                NodeValue::Bytes(b) => Ok(RtValue::String(b.clone())),
                _ => Ok(RtValue::String(Vec::new())),
            },
            opcode::DEVICE_OP
            | opcode::METHOD_OP
            | opcode::MUTEX_OP
            | opcode::EVENT_OP
            | opcode::OP_REGION_OP
            | opcode::POWER_RES_OP
            | opcode::PROCESSOR_OP
            | opcode::THERMAL_ZONE_OP => Ok(RtValue::ObjectReference { index: idx }),
            opcode::DEBUG_OP => Ok(RtValue::Uninitialized),
            _ => Ok(RtValue::Uninitialized),
        }
    }

    fn vm_load_field(&mut self, field_obj: u32) -> Result<RtValue, VmError> {
        let fe = match &self.pool.get(field_obj).ok_or(VmError::NotFound(field_obj))?.value {
            NodeValue::Field(fe) => (**fe).clone(),
            _ => return Ok(RtValue::Uninitialized),
        };
        let space_id = match self.pool.get(fe.field_index).map(|o| &o.value) {
            Some(NodeValue::Integer(id)) => *id,
            _ => 0,
        };
        let space = address_space_from_id(space_id);
        if fe.offset % 8 != 0 || fe.width % 8 != 0 {
            log::warn!("field {field_obj} is not byte-aligned (offset {}, width {}), reading byte-rounded", fe.offset, fe.width);
        }
        let width_bytes = (fe.width.div_ceil(8)).clamp(1, 8) as u8;
        let v = self.region_backend.read(space, u64::from(fe.offset / 8), width_bytes)?;
        Ok(RtValue::Integer(v))
    }

    fn vm_store_field(&mut self, field_obj: u32, value: &RtValue, ctx: &ExecContext) -> Result<(), VmError> {
        let fe = match &self.pool.get(field_obj).ok_or(VmError::NotFound(field_obj))?.value {
            NodeValue::Field(fe) => (**fe).clone(),
            _ => return Ok(()),
        };
        let space_id = match self.pool.get(fe.field_index).map(|o| &o.value) {
            Some(NodeValue::Integer(id)) => *id,
            _ => 0,
        };
        let space = address_space_from_id(space_id);
        let width_bytes = (fe.width.div_ceil(8)).clamp(1, 8) as u8;
        let int_val = value::to_integer(value, ctx.integer_width)?;
        self.region_backend.write(space, u64::from(fe.offset / 8), width_bytes, int_val)?;
        Ok(())
    }

    fn store_to_super_name(&mut self, target: u32, v: RtValue, ctx: &mut ExecContext) -> Result<(), VmError> {
        let opcode = self.pool.get(target).ok_or(VmError::NotFound(target))?.opcode;
        if let Some(n) = local_index(opcode) {
            ctx.locals[n] = v;
            return Ok(());
        }
        if let Some(n) = arg_index(opcode) {
            ctx.args[n] = v;
            return Ok(());
        }
        match opcode {
            opcode::NAME_OP => {
                if let Some(child) = self.pool.children(target).next() {
                    self.store_into_data_object(child, v, ctx)?;
                } else {
                    log::warn!("Store into Name {target} with no data child, ignored");
                }
            }
            opcode::OP_NAMED_FIELD => self.vm_store_field(target, &v, ctx)?,
            opcode::OP_RESOLVED_NAME_PATH => {
                let inner = match self.pool.get(target).ok_or(VmError::NotFound(target))?.value {
                    NodeValue::ObjectRef(t) => t,
                    _ => return Err(VmError::UnresolvedReference),
                };
                self.store_into_data_object(inner, v, ctx)?;
            }
            opcode::OP_NAME_PATH => {
                let (scope, bytes) = {
                    let o = self.pool.get(target).ok_or(VmError::NotFound(target))?;
                    let bytes = match &o.value {
                        NodeValue::Bytes(b) => b.clone(),
                        _ => return Err(VmError::UnresolvedReference),
                    };
                    (o.parent_index, bytes)
                };
                let resolved = self.pool.find(scope, &NamePath::decode(&bytes));
                if resolved == INVALID_INDEX {
                    return Err(VmError::UnresolvedReference);
                }
                self.store_into_data_object(resolved, v, ctx)?;
            }
            opcode::DEBUG_OP => log::info!("Store -> Debug: {v:?}"),
            _ => log::warn!("Store into unsupported target opcode {opcode:#x}, ignored"),
        }
        Ok(())
    }

    fn store_into_data_object(&mut self, idx: u32, v: RtValue, ctx: &mut ExecContext) -> Result<(), VmError> {
        let opcode = self.pool.get(idx).ok_or(VmError::NotFound(idx))?.opcode;
        match opcode {
            opcode::OP_NAMED_FIELD => self.vm_store_field(idx, &v, ctx),
            _ => {
                let node_value = match v {
                    RtValue::Integer(i) => NodeValue::Integer(value::truncate_to_width(i, ctx.integer_width)),
                    RtValue::String(s) | RtValue::Buffer(s) => NodeValue::Bytes(s),
                    RtValue::ObjectReference { index, .. } => NodeValue::ObjectRef(index),
                    RtValue::Package(_) | RtValue::Uninitialized => NodeValue::Empty,
                };
                if let Some(o) = self.pool.get_mut(idx) {
                    o.value = node_value;
                }
                Ok(())
            }
        }
    }

    /// Evaluate one `TermArg` subtree to an [`RtValue`] (`spec.md` §4.6
    /// `vmLoad`/operator table). The single dispatch point for every
    /// expression-producing opcode, including `Store` (it both writes and
    /// yields the stored value) and method invocation.
    fn eval_term_arg(&mut self, node: u32, ctx: &mut ExecContext) -> Result<RtValue, VmError> {
        let opcode = self.pool.get(node).ok_or(VmError::NotFound(node))?.opcode;

        if let Some(n) = local_index(opcode) {
            return Ok(ctx.locals[n].clone());
        }
        if let Some(n) = arg_index(opcode) {
            return Ok(ctx.args[n].clone());
        }

        match opcode {
            opcode::OP_METHOD_CALL => {
                let target = match self.pool.get(node).ok_or(VmError::NotFound(node))?.value {
                    NodeValue::ObjectRef(t) => t,
                    _ => return Err(VmError::UnresolvedReference),
                };
                let arg_nodes: Vec<u32> = self.pool.children(node).collect();
                let mut args = Vec::with_capacity(arg_nodes.len());
                for a in arg_nodes {
                    args.push(self.eval_term_arg(a, ctx)?);
                }
                self.call_method(target, args)
            }
            opcode::STORE_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let v = self.eval_term_arg(children[0], ctx)?;
                self.store_to_super_name(children[1], v.clone(), ctx)?;
                Ok(v)
            }
            opcode::ADD_OP | opcode::SUBTRACT_OP | opcode::MULTIPLY_OP | opcode::AND_OP | opcode::NAND_OP
            | opcode::OR_OP | opcode::NOR_OP | opcode::XOR_OP | opcode::SHIFT_LEFT_OP | opcode::SHIFT_RIGHT_OP
            | opcode::MOD_OP | opcode::CONCAT_OP | opcode::CONCAT_RES_OP => {
                self.eval_binary_arith(opcode, node, ctx)
            }
            opcode::DIVIDE_OP => self.eval_divide(node, ctx),
            opcode::NOT_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let a = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
                let r = value::truncate_to_width(!a, ctx.integer_width);
                let result = RtValue::Integer(r);
                if children.len() > 1 {
                    self.store_to_super_name(children[1], result.clone(), ctx)?;
                }
                Ok(result)
            }
            opcode::FIND_SET_LEFT_BIT_OP | opcode::FIND_SET_RIGHT_BIT_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let a = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
                let bit = if opcode == opcode::FIND_SET_LEFT_BIT_OP {
                    if a == 0 { 0 } else { 64 - a.leading_zeros() as u64 }
                } else {
                    if a == 0 { 0 } else { a.trailing_zeros() as u64 + 1 }
                };
                let result = RtValue::Integer(bit);
                if children.len() > 1 {
                    self.store_to_super_name(children[1], result.clone(), ctx)?;
                }
                Ok(result)
            }
            opcode::INCREMENT_OP | opcode::DECREMENT_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let cur = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
                let next = if opcode == opcode::INCREMENT_OP {
                    value::truncate_to_width(cur.wrapping_add(1), ctx.integer_width)
                } else {
                    value::truncate_to_width(cur.wrapping_sub(1), ctx.integer_width)
                };
                self.store_to_super_name(children[0], RtValue::Integer(next), ctx)?;
                Ok(RtValue::Integer(next))
            }
            opcode::LAND_OP | opcode::LOR_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let a = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
                let b = value::to_integer(&self.eval_term_arg(children[1], ctx)?, ctx.integer_width)?;
                let r = if opcode == opcode::LAND_OP { a != 0 && b != 0 } else { a != 0 || b != 0 };
                Ok(RtValue::from_bool(r))
            }
            opcode::LEQUAL_OP | opcode::LGREATER_OP | opcode::LLESS_OP => {
                // Typed by the left operand: Integer compares numerically,
                // String lexicographically, Buffer by length then bytes.
                let children: Vec<u32> = self.pool.children(node).collect();
                let lhs = self.eval_term_arg(children[0], ctx)?;
                let rhs = self.eval_term_arg(children[1], ctx)?;
                let ord = value::compare(&lhs, &rhs, ctx.integer_width)?;
                let r = match opcode {
                    opcode::LEQUAL_OP => ord == core::cmp::Ordering::Equal,
                    opcode::LGREATER_OP => ord == core::cmp::Ordering::Greater,
                    _ => ord == core::cmp::Ordering::Less,
                };
                Ok(RtValue::from_bool(r))
            }
            opcode::LNOT_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let a = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
                Ok(RtValue::from_bool(a == 0))
            }
            opcode::REF_OF_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                Ok(RtValue::ObjectReference { index: children[0] })
            }
            opcode::COND_REF_OF_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let is_dynamic_unresolved = self.pool.get(children[0]).is_some_and(|o| o.opcode == opcode::OP_NAME_PATH);
                if is_dynamic_unresolved {
                    Ok(RtValue::Integer(0))
                } else {
                    if children.len() > 1 {
                        let reference = RtValue::ObjectReference { index: children[0] };
                        self.store_to_super_name(children[1], reference, ctx)?;
                    }
                    Ok(RtValue::Integer(1))
                }
            }
            opcode::DEREF_OF_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                match self.eval_term_arg(children[0], ctx)? {
                    RtValue::ObjectReference { index } => self.load_object(index, ctx),
                    _ => Err(VmError::NotAReference),
                }
            }
            opcode::SIZE_OF_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let v = self.eval_term_arg(children[0], ctx)?;
                let len = match v {
                    RtValue::Buffer(b) => b.len(),
                    RtValue::String(s) => s.len(),
                    RtValue::Package(p) => p.len(),
                    _ => 0,
                };
                Ok(RtValue::Integer(len as u64))
            }
            opcode::INDEX_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let src = self.eval_term_arg(children[0], ctx)?;
                let i = value::to_integer(&self.eval_term_arg(children[1], ctx)?, ctx.integer_width)? as usize;
                let result = match src {
                    RtValue::Buffer(b) => RtValue::Integer(u64::from(b.get(i).copied().unwrap_or(0))),
                    RtValue::String(s) => RtValue::Integer(u64::from(s.get(i).copied().unwrap_or(0))),
                    RtValue::Package(p) => p.get(i).cloned().unwrap_or(RtValue::Uninitialized),
                    _ => RtValue::Uninitialized,
                };
                if children.len() > 2 {
                    self.store_to_super_name(children[2], result.clone(), ctx)?;
                }
                Ok(result)
            }
            opcode::MATCH_OP => self.eval_match(node, ctx),
            opcode::OBJECT_TYPE_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let referenced_opcode = self.pool.get(children[0]).map_or(opcode::ZERO_OP, |o| o.opcode);
                Ok(RtValue::Integer(object_type_code(value::object_type_of(referenced_opcode))))
            }
            opcode::TO_INTEGER_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let v = self.eval_term_arg(children[0], ctx)?;
                let i = value::to_integer(&v, ctx.integer_width)?;
                let result = RtValue::Integer(i);
                if children.len() > 1 {
                    self.store_to_super_name(children[1], result.clone(), ctx)?;
                }
                Ok(result)
            }
            opcode::TO_HEX_STRING_OP | opcode::TO_STRING_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let v = self.eval_term_arg(children[0], ctx)?;
                let s = value::to_string(&v)?;
                let result = RtValue::String(s);
                let target_pos = if opcode == opcode::TO_STRING_OP { 2 } else { 1 };
                if children.len() > target_pos {
                    self.store_to_super_name(children[target_pos], result.clone(), ctx)?;
                }
                Ok(result)
            }
            opcode::NOTIFY_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let value = value::to_integer(&self.eval_term_arg(children[1], ctx)?, ctx.integer_width)?;
                log::info!("Notify({:#x})", value);
                Ok(RtValue::Uninitialized)
            }
            opcode::ACQUIRE_OP | opcode::RELEASE_OP | opcode::SIGNAL_OP | opcode::WAIT_OP | opcode::RESET_OP => {
                log::debug!("synchronization opcode {opcode:#x} has no backing primitive wired up, treating as a success no-op");
                Ok(RtValue::Integer(0))
            }
            opcode::STALL_OP | opcode::SLEEP_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                if let Some(&c) = children.first() {
                    let _ = self.eval_term_arg(c, ctx)?;
                }
                log::debug!("no timer source wired up, Stall/Sleep is a no-op");
                Ok(RtValue::Uninitialized)
            }
            opcode::TIMER_OP => Ok(RtValue::Integer(0)),
            opcode::FATAL_OP => {
                log::error!("AML Fatal() executed");
                Ok(RtValue::Uninitialized)
            }
            opcode::COPY_OBJECT_OP => {
                let children: Vec<u32> = self.pool.children(node).collect();
                let v = self.eval_term_arg(children[0], ctx)?;
                self.store_to_super_name(children[1], v.clone(), ctx)?;
                Ok(v)
            }
            _ => self.load_object(node, ctx),
        }
    }

    fn eval_binary_arith(&mut self, opcode: u16, node: u32, ctx: &mut ExecContext) -> Result<RtValue, VmError> {
        let children: Vec<u32> = self.pool.children(node).collect();

        if opcode == opcode::CONCAT_OP || opcode == opcode::CONCAT_RES_OP {
            let a = self.eval_term_arg(children[0], ctx)?;
            let b = self.eval_term_arg(children[1], ctx)?;
            let mut out = value::to_string(&a).unwrap_or_default();
            out.extend_from_slice(&value::to_string(&b).unwrap_or_default());
            let result = RtValue::String(out);
            if children.len() > 2 {
                self.store_to_super_name(children[2], result.clone(), ctx)?;
            }
            return Ok(result);
        }

        let a = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
        let b = value::to_integer(&self.eval_term_arg(children[1], ctx)?, ctx.integer_width)?;
        let raw = match opcode {
            opcode::ADD_OP => a.wrapping_add(b),
            opcode::SUBTRACT_OP => a.wrapping_sub(b),
            opcode::MULTIPLY_OP => a.wrapping_mul(b),
            opcode::AND_OP => a & b,
            opcode::NAND_OP => !(a & b),
            opcode::OR_OP => a | b,
            opcode::NOR_OP => !(a | b),
            opcode::XOR_OP => a ^ b,
            opcode::SHIFT_LEFT_OP => a.checked_shl(b as u32).unwrap_or(0),
            opcode::SHIFT_RIGHT_OP => a.checked_shr(b as u32).unwrap_or(0),
            opcode::MOD_OP => {
                if b == 0 {
                    return Err(VmError::DivideByZero);
                }
                a % b
            }
            _ => unreachable!("dispatched only for the arms above"),
        };
        let result = RtValue::Integer(value::truncate_to_width(raw, ctx.integer_width));
        if children.len() > 2 {
            self.store_to_super_name(children[2], result.clone(), ctx)?;
        }
        Ok(result)
    }

    fn eval_divide(&mut self, node: u32, ctx: &mut ExecContext) -> Result<RtValue, VmError> {
        let children: Vec<u32> = self.pool.children(node).collect();
        let a = value::to_integer(&self.eval_term_arg(children[0], ctx)?, ctx.integer_width)?;
        let b = value::to_integer(&self.eval_term_arg(children[1], ctx)?, ctx.integer_width)?;
        if b == 0 {
            log::error!("AML Divide() by zero");
            return Err(VmError::DivideByZero);
        }
        let quotient = a / b;
        let remainder = a % b;
        // Only one of the two optional targets is common in practice; when
        // both are omitted or only one is present we cannot tell from the
        // attached-children count alone which slot it was, so a lone target
        // is treated as the quotient.
        match children.len() {
            4 => {
                self.store_to_super_name(children[2], RtValue::Integer(remainder), ctx)?;
                self.store_to_super_name(children[3], RtValue::Integer(quotient), ctx)?;
            }
            3 => {
                self.store_to_super_name(children[2], RtValue::Integer(quotient), ctx)?;
            }
            _ => {}
        }
        Ok(RtValue::Integer(quotient))
    }

    fn eval_match(&mut self, node: u32, ctx: &mut ExecContext) -> Result<RtValue, VmError> {
        let packed = match self.pool.get(node).ok_or(VmError::NotFound(node))?.value {
            NodeValue::Integer(v) => v,
            _ => 0,
        };
        let match_op1 = ((packed >> 8) & 0xFF) as u8;
        let children: Vec<u32> = self.pool.children(node).collect();
        let pkg = match self.eval_term_arg(children[0], ctx)? {
            RtValue::Package(p) => p,
            _ => Vec::new(),
        };
        let operand1 = value::to_integer(&self.eval_term_arg(children[1], ctx)?, ctx.integer_width)?;
        let start = if children.len() > 3 {
            value::to_integer(&self.eval_term_arg(children[3], ctx)?, ctx.integer_width)? as usize
        } else {
            0
        };
        let mut found = u64::MAX;
        for (i, e) in pkg.iter().enumerate().skip(start) {
            let Ok(v) = value::to_integer(e, ctx.integer_width) else { continue };
            let hit = match match_op1 {
                0 => v == operand1,
                1 => v <= operand1,
                2 => v >= operand1,
                3 => v < operand1,
                4 => v > operand1,
                5 => v != operand1,
                _ => false,
            };
            if hit {
                found = i as u64;
                break;
            }
        }
        let result = RtValue::Integer(found);
        if children.len() > 4 {
            self.store_to_super_name(children[4], result.clone(), ctx)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::name_from_str;
    use crate::parser;
    use crate::region::NullRegionBackend;

    fn vm_from_aml(aml: &[u8]) -> Vm<'static> {
        let mut pool = ObjectPool::new();
        pool.create_default_scopes(0);
        parser::parse_table(&mut pool, aml, 0).unwrap();
        Vm::new(pool, limits::INTEGER_WIDTH_32, &NullRegionBackend)
    }

    #[test]
    fn reading_a_name_returns_its_integer() {
        let mut aml = Vec::new();
        aml.push(opcode::NAME_OP as u8);
        aml.extend_from_slice(b"FOO_");
        aml.push(opcode::BYTE_PREFIX as u8);
        aml.push(0x2A);

        let mut vm = vm_from_aml(&aml);
        let idx = vm.lookup("FOO_");
        assert_ne!(idx, INVALID_INDEX);
        let v = vm.read(idx).unwrap();
        assert!(matches!(v, RtValue::Integer(0x2A)));
    }

    #[test]
    fn method_adds_its_two_arguments() {
        // Method(ADDF, 2) { Return(Arg0 + Arg1) }
        let mut aml = Vec::new();
        aml.push(opcode::METHOD_OP as u8);
        let pkglen_pos = aml.len();
        aml.push(0);
        aml.extend_from_slice(b"ADDF");
        aml.push(2);
        aml.push(opcode::RETURN_OP as u8);
        aml.push(opcode::ADD_OP as u8);
        aml.push(opcode::ARG0_OP as u8);
        aml.push(opcode::ARG1_OP as u8);
        aml.push(0); // Target = none
        let len = (aml.len() - pkglen_pos) as u8;
        aml[pkglen_pos] = len;

        let mut vm = vm_from_aml(&aml);
        let method = vm.lookup("ADDF");
        assert_ne!(method, INVALID_INDEX);
        let result = vm.call_method(method, alloc::vec![RtValue::Integer(3), RtValue::Integer(4)]).unwrap();
        assert!(matches!(result, RtValue::Integer(7)));
    }

    #[test]
    fn while_loop_counts_down_to_zero() {
        // Method(CNT0, 0) { Local0 = 3; While (Local0) { Local0-- } Return(Local0) }
        let mut aml = Vec::new();
        aml.push(opcode::METHOD_OP as u8);
        let pkglen_pos = aml.len();
        aml.push(0);
        aml.extend_from_slice(b"CNT0");
        aml.push(0);
        aml.push(opcode::STORE_OP as u8);
        aml.push(opcode::BYTE_PREFIX as u8);
        aml.push(3);
        aml.push(opcode::LOCAL0_OP as u8);

        aml.push(opcode::WHILE_OP as u8);
        let while_pkglen_pos = aml.len();
        aml.push(0);
        aml.push(opcode::LOCAL0_OP as u8);
        aml.push(opcode::DECREMENT_OP as u8);
        aml.push(opcode::LOCAL0_OP as u8);
        let wlen = (aml.len() - while_pkglen_pos) as u8;
        aml[while_pkglen_pos] = wlen;

        aml.push(opcode::RETURN_OP as u8);
        aml.push(opcode::LOCAL0_OP as u8);

        let len = (aml.len() - pkglen_pos) as u8;
        aml[pkglen_pos] = len;

        let mut vm = vm_from_aml(&aml);
        let method = vm.lookup("CNT0");
        let result = vm.call_method(method, Vec::new()).unwrap();
        assert!(matches!(result, RtValue::Integer(0)));
    }

    #[test]
    fn if_else_picks_the_taken_branch() {
        // Method(IFE0, 1) { If (Arg0) { Return(One) } Else { Return(Zero) } }
        let mut aml = Vec::new();
        aml.push(opcode::METHOD_OP as u8);
        let pkglen_pos = aml.len();
        aml.push(0);
        aml.extend_from_slice(b"IFE0");
        aml.push(1);

        aml.push(opcode::IF_OP as u8);
        let if_pkglen_pos = aml.len();
        aml.push(0);
        aml.push(opcode::ARG0_OP as u8);
        aml.push(opcode::RETURN_OP as u8);
        aml.push(opcode::ONE_OP as u8);
        let iflen = (aml.len() - if_pkglen_pos) as u8;
        aml[if_pkglen_pos] = iflen;

        aml.push(opcode::ELSE_OP as u8);
        let else_pkglen_pos = aml.len();
        aml.push(0);
        aml.push(opcode::RETURN_OP as u8);
        aml.push(opcode::ZERO_OP as u8);
        let elen = (aml.len() - else_pkglen_pos) as u8;
        aml[else_pkglen_pos] = elen;

        let len = (aml.len() - pkglen_pos) as u8;
        aml[pkglen_pos] = len;

        let mut vm = vm_from_aml(&aml);
        let method = vm.lookup("IFE0");
        let name_check = name_from_str("IFE0");
        assert_eq!(vm.pool().get(method).unwrap().name, name_check);

        let taken = vm.call_method(method, alloc::vec![RtValue::Integer(1)]).unwrap();
        assert!(matches!(taken, RtValue::Integer(1)));
        let not_taken = vm.call_method(method, alloc::vec![RtValue::Integer(0)]).unwrap();
        assert!(matches!(not_taken, RtValue::Integer(0)));
    }
}
