//! Single-step oracle (C10, spec §9 "three parallel walks of the opcode
//! table"): decodes the instruction at the VM's current `pc` and predicts
//! its control-flow effect *without* executing it, so a debugger can show
//! "next line" before committing to a step. Built on the same
//! `bee::decode` the interpreter uses, peeking the stacks non-destructively
//! (`Vm::peek_d`/`Vm::peek_s`) the same way `interp::execute_insn` pops
//! them, just without the pop.

use bee::encoding::{decode, Instruction, Opcode};
use bee::{BeeError, Vm, Width};

fn branch_target(pc: u64, offset: i64, width: Width) -> u64 {
    let delta = offset.wrapping_mul(width.bytes() as i64);
    width.mask((pc as i64).wrapping_add(delta) as u64)
}

/// What would happen to `pc` if the previewed instruction ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Falls through to `pc + word_bytes`.
    Falls,
    /// Branches unconditionally to this absolute address.
    Branches(u64),
    /// A conditional branch whose outcome depends on a value this oracle
    /// could not peek without popping (the flag lives deeper than the
    /// oracle's non-destructive reach for this opcode).
    Conditional { taken: u64, not_taken: u64 },
    /// `THROW`, or a fault the instruction would itself raise: control
    /// transfers to the innermost `catch` handler (or halts the VM if
    /// none is installed), but the oracle does not resolve which without
    /// simulating the fault.
    Unwinds,
    /// `BREAK`: halts immediately.
    Halts,
}

/// One previewed step: the decoded instruction plus its predicted effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPreview {
    pub instruction: Instruction,
    pub control_flow: ControlFlow,
}

/// Previews the instruction `vm` is about to execute. Fails only if the
/// word at `vm`'s `pc` itself can't be fetched or decoded — the same
/// faults `interp::step` would raise on the real step.
pub fn preview(vm: &Vm) -> Result<StepPreview, BeeError> {
    let pc = vm.registers.pc;
    let word = vm.fetch_word(pc)?;
    let instruction = decode(word, vm.width)?;
    let fallthrough = vm.width.mask(pc.wrapping_add(vm.width.bytes()));

    let control_flow = match instruction {
        Instruction::Calli(offset) | Instruction::Jumpi(offset) => {
            ControlFlow::Branches(branch_target(pc, offset, vm.width))
        }
        Instruction::Jumpzi(offset) => {
            let target = branch_target(pc, offset, vm.width);
            match vm.peek_d(0) {
                Ok(0) => ControlFlow::Branches(target),
                Ok(_) => ControlFlow::Falls,
                Err(_) => ControlFlow::Conditional {
                    taken: target,
                    not_taken: fallthrough,
                },
            }
        }
        Instruction::Pushi(_) | Instruction::Pushreli(_) | Instruction::Trap(_) => ControlFlow::Falls,
        Instruction::Insn(Opcode::Jump) | Instruction::Insn(Opcode::Call) | Instruction::Insn(Opcode::Catch) => {
            match vm.peek_d(0) {
                Ok(addr) => ControlFlow::Branches(addr),
                Err(_) => ControlFlow::Unwinds,
            }
        }
        Instruction::Insn(Opcode::Jumpz) => match (vm.peek_d(0), vm.peek_d(1)) {
            (Ok(addr), Ok(0)) => ControlFlow::Branches(addr),
            (Ok(_), Ok(_)) => ControlFlow::Falls,
            _ => ControlFlow::Unwinds,
        },
        Instruction::Insn(Opcode::Ret) => match vm.peek_s() {
            Ok(addr) => ControlFlow::Branches(addr),
            Err(_) => ControlFlow::Unwinds,
        },
        Instruction::Insn(Opcode::Throw) => ControlFlow::Unwinds,
        Instruction::Insn(Opcode::Break) => ControlFlow::Halts,
        Instruction::Insn(_) => ControlFlow::Falls,
    };

    Ok(StepPreview {
        instruction,
        control_flow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bee::encoding::encode;
    use bee::Endian;

    fn vm_with(width: Width, instructions: &[Instruction]) -> Vm {
        let mut bytes = Vec::new();
        for &instruction in instructions {
            let word = encode(instruction, width);
            match width {
                Width::W32 => bytes.extend_from_slice(&(word as u32).to_le_bytes()),
                Width::W64 => bytes.extend_from_slice(&word.to_le_bytes()),
            }
        }
        let mut vm = Vm::new(width, Endian::Little, 4096, 64, 64);
        vm.load_image(&bytes, 0).unwrap();
        vm
    }

    #[test]
    fn unconditional_jumpi_predicts_target() {
        let vm = vm_with(Width::W32, &[Instruction::Jumpi(5), Instruction::Insn(Opcode::Nop)]);
        let preview = preview(&vm).unwrap();
        assert_eq!(preview.control_flow, ControlFlow::Branches(20));
    }

    #[test]
    fn jumpz_peeks_without_popping() {
        let mut vm = vm_with(Width::W32, &[Instruction::Insn(Opcode::Jumpz), Instruction::Insn(Opcode::Nop)]);
        vm.push_d(0).unwrap(); // flag
        vm.push_d(100).unwrap(); // address (top, popped first)
        let preview = preview(&vm).unwrap();
        assert_eq!(preview.control_flow, ControlFlow::Branches(100));
        // non-destructive: both values are still on the stack afterward.
        assert_eq!(vm.peek_d(0).unwrap(), 100);
        assert_eq!(vm.peek_d(1).unwrap(), 0);
    }

    #[test]
    fn break_halts() {
        let vm = vm_with(Width::W32, &[Instruction::Insn(Opcode::Break)]);
        let preview = preview(&vm).unwrap();
        assert_eq!(preview.control_flow, ControlFlow::Halts);
    }

    #[test]
    fn plain_insn_falls_through() {
        let vm = vm_with(Width::W32, &[Instruction::Insn(Opcode::Add)]);
        let preview = preview(&vm).unwrap();
        assert_eq!(preview.control_flow, ControlFlow::Falls);
    }

    #[test]
    fn jump_with_empty_stack_unwinds() {
        let vm = vm_with(Width::W32, &[Instruction::Insn(Opcode::Jump)]);
        let preview = preview(&vm).unwrap();
        assert_eq!(preview.control_flow, ControlFlow::Unwinds);
    }
}
