//! Record oracle (C10): the third of the "three parallel walks of the
//! opcode table" (spec §9) — decode and execute via the real interpreter
//! (`bee::interp::step`) while recording a register-file snapshot around
//! every step, so a debugger can answer "what changed" and step backward
//! through a trace.

use crate::single_step::preview;
use bee::encoding::Instruction;
use bee::{ExitCondition, Registers, Vm};

/// One recorded step: the instruction that ran (`None` only if it could
/// not even be decoded, i.e. the step immediately faulted) and the
/// register file immediately before and after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStep {
    pub registers_before: Registers,
    pub instruction: Option<Instruction>,
    pub registers_after: Registers,
}

/// Runs `vm` to completion (or until `event_tick` asks to stop), recording
/// one [`RecordedStep`] per executed instruction. Shares `Vm::run`'s
/// event-tick contract: the hook runs once per completed step and may
/// request a stop by returning `false`.
pub fn record(vm: &mut Vm, mut event_tick: impl FnMut(&Vm) -> bool) -> (Vec<RecordedStep>, ExitCondition) {
    let mut steps = Vec::new();
    loop {
        let registers_before = vm.registers;
        let instruction = preview(vm).ok().map(|p| p.instruction);

        if let Some(exit) = bee::interp::step(vm) {
            steps.push(RecordedStep {
                registers_before,
                instruction,
                registers_after: vm.registers,
            });
            return (steps, exit);
        }

        steps.push(RecordedStep {
            registers_before,
            instruction,
            registers_after: vm.registers,
        });

        if !event_tick(vm) {
            return (steps, ExitCondition::HostStopped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bee::encoding::{encode, Opcode};
    use bee::{Endian, Width};

    #[test]
    fn records_every_step_up_to_the_exit() {
        let mut bytes = Vec::new();
        for instruction in [
            Instruction::Pushi(7),
            Instruction::Pushi(5),
            Instruction::Insn(Opcode::Add),
            Instruction::Insn(Opcode::Break),
        ] {
            bytes.extend_from_slice(&(encode(instruction, Width::W32) as u32).to_le_bytes());
        }
        let mut vm = Vm::new(Width::W32, Endian::Little, 4096, 64, 64);
        vm.load_image(&bytes, 0).unwrap();

        let (steps, exit) = record(&mut vm, |_| true);

        assert_eq!(exit, ExitCondition::Break);
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].instruction, Some(Instruction::Pushi(7)));
        assert_eq!(steps[0].registers_before.dp, 0);
        assert_eq!(steps[0].registers_after.dp, 1);
        assert_eq!(steps[2].instruction, Some(Instruction::Insn(Opcode::Add)));
        assert_eq!(steps[2].registers_after.dp, 1);
    }

    #[test]
    fn host_stop_is_reported_distinctly_from_a_vm_exit() {
        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend_from_slice(&(encode(Instruction::Insn(Opcode::Nop), Width::W32) as u32).to_le_bytes());
        }
        let mut vm = Vm::new(Width::W32, Endian::Little, 4096, 64, 64);
        vm.load_image(&bytes, 0).unwrap();

        let mut ticks = 0;
        let (steps, exit) = record(&mut vm, |_| {
            ticks += 1;
            ticks < 2
        });

        assert_eq!(exit, ExitCondition::HostStopped);
        assert_eq!(steps.len(), 2);
    }
}
