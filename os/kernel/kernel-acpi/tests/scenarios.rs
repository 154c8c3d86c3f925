//! End-to-end parse-then-execute scenarios (the method-body cases that
//! need a fully assembled `Vm`, as opposed to the unit tests colocated
//! with each module for everything that doesn't).

use kernel_acpi::object::ObjectPool;
use kernel_acpi::region::NullRegionBackend;
use kernel_acpi::value::RtValue;
use kernel_acpi::vm::Vm;
use kernel_acpi::{limits, opcode, parser};

fn vm_from_aml(aml: &[u8]) -> Vm<'static> {
    let mut pool = ObjectPool::new();
    pool.create_default_scopes(0);
    parser::parse_table(&mut pool, aml, 0).expect("well-formed AML");
    Vm::new(pool, limits::INTEGER_WIDTH_32, &NullRegionBackend)
}

fn as_integer(v: RtValue) -> u64 {
    match v {
        RtValue::Integer(i) => i,
        other => panic!("expected an integer, got {other:?}"),
    }
}

fn push_method_header(aml: &mut Vec<u8>, name: &[u8; 4], arg_count: u8) -> usize {
    aml.push(opcode::METHOD_OP as u8);
    let pkglen_pos = aml.len();
    aml.push(0);
    aml.extend_from_slice(name);
    aml.push(arg_count);
    pkglen_pos
}

fn close_method(aml: &mut Vec<u8>, pkglen_pos: usize) {
    let len = (aml.len() - pkglen_pos) as u8;
    aml[pkglen_pos] = len;
}

/// Method(ARI0, 1) { Return(Arg0 + 5) }
#[test]
fn arithmetic_add_returns_operand_plus_five() {
    let mut aml = Vec::new();
    let pos = push_method_header(&mut aml, b"ARI0", 1);
    aml.push(opcode::RETURN_OP as u8);
    aml.push(opcode::ADD_OP as u8);
    aml.push(opcode::ARG0_OP as u8);
    aml.push(opcode::BYTE_PREFIX as u8);
    aml.push(5);
    aml.push(0); // no Target
    close_method(&mut aml, pos);

    let mut vm = vm_from_aml(&aml);
    let method = vm.lookup("ARI0");
    let result = vm.call_method(method, vec![RtValue::Integer(10)]).unwrap();
    assert_eq!(as_integer(result), 15);
}

/// Method(ARI1, 1) { Return(Arg0 - 5) }
#[test]
fn arithmetic_subtract_returns_operand_minus_five() {
    let mut aml = Vec::new();
    let pos = push_method_header(&mut aml, b"ARI1", 1);
    aml.push(opcode::RETURN_OP as u8);
    aml.push(opcode::SUBTRACT_OP as u8);
    aml.push(opcode::ARG0_OP as u8);
    aml.push(opcode::BYTE_PREFIX as u8);
    aml.push(5);
    aml.push(0); // no Target
    close_method(&mut aml, pos);

    let mut vm = vm_from_aml(&aml);
    let method = vm.lookup("ARI1");
    let result = vm.call_method(method, vec![RtValue::Integer(6)]).unwrap();
    assert_eq!(as_integer(result), 1);
}

/// Method(ARI5, 1) { Local0 = 0; Local1 = 0; Divide(Arg0, 10, Local1, Local0); Return(Local0) }
/// and the remainder-returning twin ARI6, sharing the same Divide shape.
#[test]
fn arithmetic_divide_reports_quotient_and_remainder() {
    fn build(name: &[u8; 4], return_remainder: bool) -> Vec<u8> {
        let mut aml = Vec::new();
        let pos = push_method_header(&mut aml, name, 1);
        aml.push(opcode::DIVIDE_OP as u8);
        aml.push(opcode::ARG0_OP as u8);
        aml.push(opcode::BYTE_PREFIX as u8);
        aml.push(10);
        aml.push(opcode::LOCAL1_OP as u8); // remainder target
        aml.push(opcode::LOCAL0_OP as u8); // quotient target
        aml.push(opcode::RETURN_OP as u8);
        aml.push(if return_remainder { opcode::LOCAL1_OP as u8 } else { opcode::LOCAL0_OP as u8 });
        close_method(&mut aml, pos);
        aml
    }

    let quotient_aml = build(b"ARI5", false);
    let mut vm = vm_from_aml(&quotient_aml);
    let method = vm.lookup("ARI5");
    assert_eq!(as_integer(vm.call_method(method, vec![RtValue::Integer(100)]).unwrap()), 10);
    assert_eq!(as_integer(vm.call_method(method, vec![RtValue::Integer(101)]).unwrap()), 10);

    let remainder_aml = build(b"ARI6", true);
    let mut vm = vm_from_aml(&remainder_aml);
    let method = vm.lookup("ARI6");
    assert_eq!(as_integer(vm.call_method(method, vec![RtValue::Integer(100)]).unwrap()), 0);
    assert_eq!(as_integer(vm.call_method(method, vec![RtValue::Integer(101)]).unwrap()), 1);
}

/// Method(CTL0, 2) { ... } — Arg0 selects the branch, Arg1 is the
/// secondary input the "sequential" branch shifts by. Local0 accumulates
/// across a bounded While loop; Local1 is the loop's own bound counter so
/// the loop always terminates regardless of which branch Arg0 selects.
///
/// - Arg0 == 0 ("break"): accumulate once, `Break` — returns `1`.
/// - Arg0 == 1 ("continue"): `Continue` before accumulating, every
///   iteration — Local0 never advances, returns `0`.
/// - Arg0 == 2 ("return"): returns the magic constant `0xBADF00D` directly.
/// - anything else ("sequential"): the loop runs to completion, then
///   `Return(ShiftLeft(One, Arg1 + 3))` — `8`, `16`, or `32` for
///   Arg1 == 0, 1, 2.
#[test]
fn control_flow_break_continue_return_and_sequential() {
    let mut aml = Vec::new();
    let pos = push_method_header(&mut aml, b"CTL0", 2);

    // Local0 = 0
    aml.push(opcode::STORE_OP as u8);
    aml.push(opcode::ZERO_OP as u8);
    aml.push(opcode::LOCAL0_OP as u8);

    // Local1 = 0
    aml.push(opcode::STORE_OP as u8);
    aml.push(opcode::ZERO_OP as u8);
    aml.push(opcode::LOCAL1_OP as u8);

    // If (Arg0 == 2) { Return(0xBADF00D) }
    aml.push(opcode::IF_OP as u8);
    let if_pos = aml.len();
    aml.push(0);
    aml.push(opcode::LEQUAL_OP as u8);
    aml.push(opcode::ARG0_OP as u8);
    aml.push(opcode::BYTE_PREFIX as u8);
    aml.push(2);
    aml.push(opcode::RETURN_OP as u8);
    aml.push(opcode::DWORD_PREFIX as u8);
    aml.extend_from_slice(&0x0BAD_F00Du32.to_le_bytes());
    close_method(&mut aml, if_pos);

    // While (Local1 < 3) {
    aml.push(opcode::WHILE_OP as u8);
    let while_pos = aml.len();
    aml.push(0);
    aml.push(opcode::LLESS_OP as u8);
    aml.push(opcode::LOCAL1_OP as u8);
    aml.push(opcode::BYTE_PREFIX as u8);
    aml.push(3);

    //   Local1++
    aml.push(opcode::INCREMENT_OP as u8);
    aml.push(opcode::LOCAL1_OP as u8);

    //   If (Arg0 == 0) { Local0 = 1; Break }
    aml.push(opcode::IF_OP as u8);
    let if0_pos = aml.len();
    aml.push(0);
    aml.push(opcode::LEQUAL_OP as u8);
    aml.push(opcode::ARG0_OP as u8);
    aml.push(opcode::ZERO_OP as u8);
    aml.push(opcode::STORE_OP as u8);
    aml.push(opcode::ONE_OP as u8);
    aml.push(opcode::LOCAL0_OP as u8);
    aml.push(opcode::BREAK_OP as u8);
    close_method(&mut aml, if0_pos);

    //   If (Arg0 == 1) { Continue }
    aml.push(opcode::IF_OP as u8);
    let if1_pos = aml.len();
    aml.push(0);
    aml.push(opcode::LEQUAL_OP as u8);
    aml.push(opcode::ARG0_OP as u8);
    aml.push(opcode::ONE_OP as u8);
    aml.push(opcode::CONTINUE_OP as u8);
    close_method(&mut aml, if1_pos);

    //   Local0++ (only reached for neither Break, Continue, nor Return)
    aml.push(opcode::INCREMENT_OP as u8);
    aml.push(opcode::LOCAL0_OP as u8);
    // }
    close_method(&mut aml, while_pos);

    // If (Arg0 == 3) { Return(ShiftLeft(One, Arg1 + 3)) }
    aml.push(opcode::IF_OP as u8);
    let if3_pos = aml.len();
    aml.push(0);
    aml.push(opcode::LEQUAL_OP as u8);
    aml.push(opcode::ARG0_OP as u8);
    aml.push(opcode::BYTE_PREFIX as u8);
    aml.push(3);
    aml.push(opcode::RETURN_OP as u8);
    aml.push(opcode::SHIFT_LEFT_OP as u8);
    aml.push(opcode::ONE_OP as u8);
    aml.push(opcode::ADD_OP as u8);
    aml.push(opcode::ARG1_OP as u8);
    aml.push(opcode::BYTE_PREFIX as u8);
    aml.push(3);
    aml.push(0); // no Target for Add
    aml.push(0); // no Target for ShiftLeft
    close_method(&mut aml, if3_pos);

    aml.push(opcode::RETURN_OP as u8);
    aml.push(opcode::LOCAL0_OP as u8);
    close_method(&mut aml, pos);

    let mut vm = vm_from_aml(&aml);
    let method = vm.lookup("CTL0");

    let broke = vm.call_method(method, vec![RtValue::Integer(0), RtValue::Integer(0)]).unwrap();
    assert_eq!(as_integer(broke), 1);

    let continued = vm.call_method(method, vec![RtValue::Integer(1), RtValue::Integer(0)]).unwrap();
    assert_eq!(as_integer(continued), 0);

    let returned = vm.call_method(method, vec![RtValue::Integer(2), RtValue::Integer(0)]).unwrap();
    assert_eq!(as_integer(returned), 0x0BAD_F00D);

    let sequential_8 = vm.call_method(method, vec![RtValue::Integer(3), RtValue::Integer(0)]).unwrap();
    assert_eq!(as_integer(sequential_8), 8);

    let sequential_16 = vm.call_method(method, vec![RtValue::Integer(3), RtValue::Integer(1)]).unwrap();
    assert_eq!(as_integer(sequential_16), 16);

    let sequential_32 = vm.call_method(method, vec![RtValue::Integer(3), RtValue::Integer(2)]).unwrap();
    assert_eq!(as_integer(sequential_32), 32);
}
