//! The fetch-decode-execute loop (C4, spec §4.4).
//!
//! `step` executes exactly one instruction and reports whether the run
//! loop ([`crate::vm::Vm::run`]) should keep going. All 54 core opcodes and
//! the five second-level forms (`CALLI`, `PUSHI`, `PUSHRELI`, `JUMPI`,
//! `JUMPZI`, `TRAP`) live here; [`crate::encoding::decode`] is the only
//! place that knows the bit layout, so this module just matches on the
//! tagged [`crate::encoding::Instruction`].

use crate::encoding::{self, Instruction, Opcode};
use crate::error::{BeeError, ExitCondition};
use crate::memory::{Storage, StorageMut};
use crate::vm::Vm;

/// What happened after one decoded instruction ran to completion.
enum StepOutcome {
    Continue,
    Exit(ExitCondition),
}

/// Executes one instruction. Returns `Some(exit)` when the run loop should
/// stop (halted, hit a `break`, or the host's event tick asked to stop —
/// that last case is handled by the caller, not here), `None` to keep
/// looping.
pub fn step(vm: &mut Vm) -> Option<ExitCondition> {
    match execute(vm) {
        Ok(StepOutcome::Continue) => None,
        Ok(StepOutcome::Exit(exit)) => Some(exit),
        Err(fault) => match unwind(vm, fault.code()) {
            StepOutcome::Continue => None,
            StepOutcome::Exit(exit) => Some(exit),
        },
    }
}

/// The single internal `throw` routine (spec §4.4, "CATCH/THROW"): every
/// internally raised fault and the explicit `THROW` opcode converge here.
/// Halts the VM if no handler is installed; otherwise unwinds the return
/// stack to the innermost `catch` and resumes there with `error_code` on
/// top of the data stack (dropped silently if the data stack has no room).
fn unwind(vm: &mut Vm, error_code: i64) -> StepOutcome {
    if vm.registers.handler_sp == 0 {
        return StepOutcome::Exit(ExitCondition::Halted(error_code));
    }
    if vm.registers.dp < vm.registers.dsize {
        let _ = vm.push_d(error_code as u64);
    }
    vm.registers.sp = vm.registers.handler_sp;
    let pc = vm.pop_s().expect("catch frame holds its return pc");
    let saved_handler_sp = vm.pop_s().expect("catch frame holds its saved handler_sp");
    vm.registers.handler_sp = saved_handler_sp;
    vm.registers.pc = pc;
    StepOutcome::Continue
}

/// Computes and alignment-checks a PC-relative target for `CALLI` /
/// `JUMPI` / `JUMPZI` / `PUSHRELI`. `old_pc` is W/8-aligned by invariant
/// and `offset` is a whole number of words, so the result is aligned
/// unless `old_pc` itself was corrupted — the check exists to surface
/// that rather than assume it can't happen.
fn branch_target(vm: &Vm, old_pc: u64, offset: i64) -> Result<u64, BeeError> {
    let delta = offset.wrapping_mul(vm.width.bytes() as i64);
    let target = vm.width.mask((old_pc as i64).wrapping_add(delta) as u64);
    if vm.width.is_aligned(target) {
        Ok(target)
    } else {
        Err(BeeError::UnalignedAddress)
    }
}

fn execute(vm: &mut Vm) -> Result<StepOutcome, BeeError> {
    let old_pc = vm.registers.pc;
    let ir = vm.fetch_word(old_pc)?;
    vm.registers.pc = vm.width.mask(old_pc + vm.width.bytes());
    let instruction = encoding::decode(ir, vm.width)?;

    match instruction {
        Instruction::Calli(offset) => {
            let target = branch_target(vm, old_pc, offset)?;
            let return_addr = vm.registers.pc;
            vm.push_s(return_addr)?;
            vm.registers.pc = target;
        }
        Instruction::Pushi(value) => {
            vm.push_d(value as u64)?;
        }
        Instruction::Pushreli(offset) => {
            let target = branch_target(vm, old_pc, offset)?;
            vm.push_d(target)?;
        }
        Instruction::Jumpi(offset) => {
            let target = branch_target(vm, old_pc, offset)?;
            vm.registers.pc = target;
        }
        Instruction::Jumpzi(offset) => {
            let flag = vm.pop_d()?;
            let target = branch_target(vm, old_pc, offset)?;
            if flag == 0 {
                vm.registers.pc = target;
            }
        }
        Instruction::Trap(code) => {
            if code != crate::trap::TRAP_LIBC {
                return Err(BeeError::InvalidLibrary);
            }
            let function_code = vm.pop_d()?;
            crate::trap::dispatch(vm, function_code)?;
        }
        Instruction::Insn(Opcode::Throw) => {
            let error_code = match vm.pop_d() {
                Ok(v) => vm.width.sign_extend(v),
                Err(_) => BeeError::StackUnderflow.code(),
            };
            return Ok(unwind(vm, error_code));
        }
        Instruction::Insn(Opcode::Break) => {
            return Ok(StepOutcome::Exit(ExitCondition::Break));
        }
        Instruction::Insn(opcode) => execute_insn(vm, opcode)?,
    }
    Ok(StepOutcome::Continue)
}

fn check_aligned(vm: &Vm, address: u64) -> Result<(), BeeError> {
    if vm.width.is_aligned(address) {
        Ok(())
    } else {
        Err(BeeError::UnalignedAddress)
    }
}

fn execute_insn(vm: &mut Vm, opcode: Opcode) -> Result<(), BeeError> {
    let word_bytes = vm.width.bytes();
    match opcode {
        Opcode::Nop => {}

        Opcode::Not => {
            let a = vm.pop_d()?;
            vm.push_d(!a)?;
        }
        Opcode::And => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d(a & b)?;
        }
        Opcode::Or => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d(a | b)?;
        }
        Opcode::Xor => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d(a ^ b)?;
        }
        Opcode::Lshift => {
            let n = vm.pop_d()?;
            let v = vm.pop_d()?;
            vm.push_d(vm.width.lshift(v, n))?;
        }
        Opcode::Rshift => {
            let n = vm.pop_d()?;
            let v = vm.pop_d()?;
            vm.push_d(vm.width.rshift(v, n))?;
        }
        Opcode::Arshift => {
            let n = vm.pop_d()?;
            let v = vm.pop_d()?;
            vm.push_d(vm.width.arshift(v, n))?;
        }

        Opcode::Pop => {
            vm.pop_d()?;
        }
        Opcode::Dup => {
            let n = vm.pop_d()?;
            let v = vm.peek_d(n)?;
            vm.push_d(v)?;
        }
        Opcode::Set => {
            let n = vm.pop_d()?;
            let v = vm.pop_d()?;
            vm.poke_d(n, v)?;
        }
        Opcode::Swap => {
            let n = vm.pop_d()?;
            let idx = n.checked_add(1).ok_or(BeeError::StackUnderflow)?;
            let top = vm.peek_d(0)?;
            let other = vm.peek_d(idx)?;
            vm.poke_d(0, other)?;
            vm.poke_d(idx, top)?;
        }

        Opcode::Jump => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            vm.registers.pc = addr;
        }
        Opcode::Jumpz => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            let flag = vm.pop_d()?;
            if flag == 0 {
                vm.registers.pc = addr;
            }
        }
        Opcode::Call => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            let return_addr = vm.registers.pc;
            vm.push_s(return_addr)?;
            vm.registers.pc = addr;
        }
        Opcode::Ret => {
            let addr = vm.pop_s()?;
            check_aligned(vm, addr)?;
            if vm.registers.sp < vm.registers.handler_sp {
                let saved_handler_sp = vm.pop_s()?;
                vm.registers.handler_sp = saved_handler_sp;
                vm.push_d(0)?;
            }
            vm.registers.pc = addr;
        }

        Opcode::Load => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            let v = vm.fetch_word(addr)?;
            vm.push_d(v)?;
        }
        Opcode::Store => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            check_aligned(vm, addr)?;
            vm.store_word(addr, v)?;
        }
        Opcode::Load1 => {
            let addr = vm.pop_d()?;
            let v = vm.memory.read_u8(addr).map_err(|_| BeeError::UnalignedAddress)?;
            vm.push_d(v as u64)?;
        }
        Opcode::Store1 => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            vm.memory
                .write_u8(addr, v as u8)
                .map_err(|_| BeeError::UnalignedAddress)?;
        }
        Opcode::Load2 => {
            let addr = vm.pop_d()?;
            if addr % 2 != 0 {
                return Err(BeeError::UnalignedAddress);
            }
            let v = vm
                .memory
                .read_u16(addr, vm.endian)
                .map_err(|_| BeeError::UnalignedAddress)?;
            vm.push_d(v as u64)?;
        }
        Opcode::Store2 => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            if addr % 2 != 0 {
                return Err(BeeError::UnalignedAddress);
            }
            vm.memory
                .write_u16(addr, v as u16, vm.endian)
                .map_err(|_| BeeError::UnalignedAddress)?;
        }
        Opcode::Load4 => {
            let addr = vm.pop_d()?;
            if addr % 4 != 0 {
                return Err(BeeError::UnalignedAddress);
            }
            let v = vm
                .memory
                .read_u32(addr, vm.endian)
                .map_err(|_| BeeError::UnalignedAddress)?;
            vm.push_d(v as u64)?;
        }
        Opcode::Store4 => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            if addr % 4 != 0 {
                return Err(BeeError::UnalignedAddress);
            }
            vm.memory
                .write_u32(addr, v as u32, vm.endian)
                .map_err(|_| BeeError::UnalignedAddress)?;
        }

        Opcode::LoadIa => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            let v = vm.fetch_word(addr)?;
            vm.push_d(vm.width.mask(addr + word_bytes))?;
            vm.push_d(v)?;
        }
        Opcode::LoadIb => {
            let addr = vm.pop_d()?;
            let new_addr = vm.width.mask(addr + word_bytes);
            check_aligned(vm, new_addr)?;
            let v = vm.fetch_word(new_addr)?;
            vm.push_d(new_addr)?;
            vm.push_d(v)?;
        }
        Opcode::LoadDa => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            let v = vm.fetch_word(addr)?;
            vm.push_d(vm.width.mask(addr.wrapping_sub(word_bytes)))?;
            vm.push_d(v)?;
        }
        Opcode::LoadDb => {
            let addr = vm.pop_d()?;
            let new_addr = vm.width.mask(addr.wrapping_sub(word_bytes));
            check_aligned(vm, new_addr)?;
            let v = vm.fetch_word(new_addr)?;
            vm.push_d(new_addr)?;
            vm.push_d(v)?;
        }
        Opcode::StoreIa => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            check_aligned(vm, addr)?;
            vm.store_word(addr, v)?;
            vm.push_d(vm.width.mask(addr + word_bytes))?;
        }
        Opcode::StoreIb => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            let new_addr = vm.width.mask(addr + word_bytes);
            check_aligned(vm, new_addr)?;
            vm.store_word(new_addr, v)?;
            vm.push_d(new_addr)?;
        }
        Opcode::StoreDa => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            check_aligned(vm, addr)?;
            vm.store_word(addr, v)?;
            vm.push_d(vm.width.mask(addr.wrapping_sub(word_bytes)))?;
        }
        Opcode::StoreDb => {
            let addr = vm.pop_d()?;
            let v = vm.pop_d()?;
            let new_addr = vm.width.mask(addr.wrapping_sub(word_bytes));
            check_aligned(vm, new_addr)?;
            vm.store_word(new_addr, v)?;
            vm.push_d(new_addr)?;
        }

        Opcode::Neg => {
            let a = vm.pop_d()?;
            vm.push_d(0u64.wrapping_sub(a))?;
        }
        Opcode::Add => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d(a.wrapping_add(b))?;
        }
        Opcode::Mul => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d(a.wrapping_mul(b))?;
        }
        Opcode::Divmod => {
            let divisor = vm.pop_d()?;
            let dividend = vm.pop_d()?;
            let (quot, rem) = signed_divmod(vm, dividend, divisor);
            vm.push_d(quot)?;
            vm.push_d(rem)?;
        }
        Opcode::Udivmod => {
            let divisor = vm.pop_d()?;
            let dividend = vm.pop_d()?;
            let (quot, rem) = if divisor == 0 {
                (0, dividend)
            } else {
                (dividend / divisor, dividend % divisor)
            };
            vm.push_d(quot)?;
            vm.push_d(rem)?;
        }

        Opcode::Eq => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d((a == b) as u64)?;
        }
        Opcode::Lt => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d((vm.width.sign_extend(b) < vm.width.sign_extend(a)) as u64)?;
        }
        Opcode::Ult => {
            let b = vm.pop_d()?;
            let a = vm.pop_d()?;
            vm.push_d((b < a) as u64)?;
        }

        Opcode::Pushs => {
            let v = vm.pop_d()?;
            vm.push_s(v)?;
        }
        Opcode::Pops => {
            let v = vm.pop_s()?;
            vm.push_d(v)?;
        }
        Opcode::Dups => {
            let v = vm.peek_s()?;
            vm.push_d(v)?;
        }

        Opcode::Catch => {
            let addr = vm.pop_d()?;
            check_aligned(vm, addr)?;
            let old_handler_sp = vm.registers.handler_sp;
            let return_pc = vm.registers.pc;
            vm.push_s(old_handler_sp)?;
            vm.push_s(return_pc)?;
            vm.registers.handler_sp = vm.registers.sp;
            vm.registers.pc = addr;
        }
        Opcode::Throw | Opcode::Break => unreachable!("handled in execute() before dispatch"),

        Opcode::WordBytes => vm.push_d(word_bytes)?,
        Opcode::GetSsize => vm.push_d(vm.registers.ssize)?,
        Opcode::GetSp => vm.push_d(vm.registers.sp)?,
        Opcode::SetSp => {
            let n = vm.pop_d()?;
            vm.registers.sp = n;
        }
        Opcode::GetDsize => vm.push_d(vm.registers.dsize)?,
        Opcode::GetDp => vm.push_d(vm.registers.dp)?,
        Opcode::SetDp => {
            let n = vm.pop_d()?;
            vm.registers.dp = n;
        }
        Opcode::GetHandlerSp => vm.push_d(vm.registers.handler_sp)?,
    }
    Ok(())
}

/// Signed `divmod` with the zero-divisor and `W_MIN / -1` corner cases from
/// spec §4.4.
fn signed_divmod(vm: &Vm, dividend: u64, divisor: u64) -> (u64, u64) {
    let dividend_s = vm.width.sign_extend(dividend);
    let divisor_s = vm.width.sign_extend(divisor);
    let (quot, rem) = if divisor_s == 0 {
        (0, dividend_s)
    } else if dividend_s == vm.width.min_signed() && divisor_s == -1 {
        (vm.width.min_signed(), 0)
    } else {
        (dividend_s / divisor_s, dividend_s % divisor_s)
    };
    (quot as u64, rem as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{encode, Instruction};
    use crate::endian::Endian;
    use crate::width::Width;

    fn asm(width: Width, instructions: &[Instruction]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for &instruction in instructions {
            let word = encode(instruction, width);
            match width {
                Width::W32 => bytes.extend_from_slice(&(word as u32).to_le_bytes()),
                Width::W64 => bytes.extend_from_slice(&word.to_le_bytes()),
            }
        }
        bytes
    }

    fn new_vm(width: Width, image: &[u8]) -> Vm {
        let mut vm = Vm::new(width, Endian::Little, 4096, 64, 64);
        vm.load_image(image, 0).unwrap();
        vm
    }

    #[test]
    fn smoke_add_then_break() {
        let image = asm(
            Width::W32,
            &[
                Instruction::Pushi(7),
                Instruction::Pushi(5),
                Instruction::Insn(Opcode::Add),
                Instruction::Insn(Opcode::Break),
            ],
        );
        let mut vm = new_vm(Width::W32, &image);
        let exit = vm.run(|_| true);
        assert_eq!(exit, ExitCondition::Break);
        assert_eq!(vm.pop_d().unwrap(), 12);
    }

    #[test]
    fn catch_throw_round_trip() {
        // [PUSHRELI handler, CATCH, PUSHI 42, THROW, <handler>: BREAK]
        let handler_offset = 3i64; // words from the PUSHRELI instruction to the BREAK
        let image = asm(
            Width::W32,
            &[
                Instruction::Pushreli(handler_offset),
                Instruction::Insn(Opcode::Catch),
                Instruction::Pushi(42),
                Instruction::Insn(Opcode::Throw),
                Instruction::Insn(Opcode::Break),
            ],
        );
        let mut vm = new_vm(Width::W32, &image);
        let exit = vm.run(|_| true);
        assert_eq!(exit, ExitCondition::Break);
        assert_eq!(vm.pop_d().unwrap(), 42);
        assert_eq!(vm.registers.handler_sp, 0);
    }

    #[test]
    fn unaligned_store_halts_without_handler() {
        let image = asm(
            Width::W64,
            &[
                Instruction::Pushi(1),
                Instruction::Pushi(0),
                Instruction::Insn(Opcode::Store),
            ],
        );
        let mut vm = new_vm(Width::W64, &image);
        let exit = vm.run(|_| true);
        assert_eq!(exit, ExitCondition::Halted(BeeError::UnalignedAddress.code()));
    }

    #[test]
    fn divmod_w_min_over_negative_one() {
        let mut vm = Vm::new(Width::W32, Endian::Little, 4096, 16, 16);
        let w_min = Width::W32.min_signed() as u64;
        vm.push_d(w_min).unwrap();
        vm.push_d(-1i64 as u64).unwrap();
        let (quot, rem) = signed_divmod(&vm, w_min, -1i64 as u64);
        assert_eq!(quot as i64, Width::W32.min_signed());
        assert_eq!(rem, 0);
    }

    #[test]
    fn stack_overflow_is_throwable() {
        // CATCH handler; loop pushing until the 4-deep data stack overflows;
        // handler observes STACK_OVERFLOW on top and exits via BREAK.
        let image = asm(
            Width::W32,
            &[
                Instruction::Pushreli(3),
                Instruction::Insn(Opcode::Catch),
                Instruction::Pushi(0),
                Instruction::Jumpi(-1),
                Instruction::Insn(Opcode::Break),
            ],
        );
        let mut vm = Vm::new(Width::W32, Endian::Little, 4096, 16, 4);
        vm.load_image(&image, 0).unwrap();
        let exit = vm.run(|_| true);
        assert_eq!(exit, ExitCondition::Break);
        assert_eq!(vm.pop_d().unwrap() as i64, BeeError::StackOverflow.code());
    }
}
