//! Executor state: registers, command pointer and the control stack

use crate::error::{Result, RuntimeError};
use dataspec_spec::{Operand, Register, NUM_REGISTERS};
use serde::{Deserialize, Serialize};

/// Why the run loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Clean stop at an end-of-specification command
    EndSpec,
    /// The stream ran out without an end-of-specification command
    EndOfStream,
    /// The step budget was used up
    StepLimit,
}

impl HaltReason {
    pub fn is_clean(self) -> bool {
        self == HaltReason::EndSpec
    }
}

/// Coarse execution state, derived from the innermost control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Running,
    InFunction,
    InLoop,
    InConditionalTrue,
    InConditionalFalse,
    Halted,
}

/// One entry of the control stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Loop {
        /// Offset of the first body command
        body_pc: usize,
        counter: Register,
        value: i64,
        end: i64,
        increment: i64,
    },
    /// `taken` is true in the if branch, false in the else branch
    Conditional { taken: bool },
    Call { function: u32, return_pc: usize },
}

/// Executor state
#[derive(Debug, Clone)]
pub struct ExecutorState {
    /// Register file (r0-r15), zeroed at start
    pub registers: [i64; NUM_REGISTERS],

    /// Usable registers
    pub max_registers: u32,

    /// Byte offset of the next command
    pub pc: usize,

    /// Commands executed
    pub steps: u64,

    /// Open loops, conditionals and calls, innermost last
    pub frames: Vec<Frame>,

    pub halt_reason: Option<HaltReason>,
}

impl ExecutorState {
    pub fn new(max_registers: u32) -> Self {
        Self {
            registers: [0; NUM_REGISTERS],
            max_registers,
            pc: 0,
            steps: 0,
            frames: Vec::new(),
            halt_reason: None,
        }
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halt_reason.is_some()
    }

    pub fn halt(&mut self, reason: HaltReason) {
        self.halt_reason = Some(reason);
    }

    fn check(&self, reg: Register) -> Result<()> {
        if reg.index() >= self.max_registers as usize {
            return Err(RuntimeError::InvalidRegister {
                register: reg,
                max: self.max_registers,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn read_reg(&self, reg: Register) -> Result<i64> {
        self.check(reg)?;
        Ok(self.registers[reg.index()])
    }

    #[inline]
    pub fn write_reg(&mut self, reg: Register, value: i64) -> Result<()> {
        self.check(reg)?;
        self.registers[reg.index()] = value;
        Ok(())
    }

    /// Resolve an operand to its value, reading registers as needed
    pub fn value(&self, operand: Operand) -> Result<i64> {
        match operand {
            Operand::Immediate(v) => Ok(v),
            Operand::Register(reg) => self.read_reg(reg),
        }
    }

    /// True while a called function body is executing
    pub fn in_call(&self) -> bool {
        self.frames.iter().any(|f| matches!(f, Frame::Call { .. }))
    }

    pub fn exec_state(&self) -> ExecState {
        if self.is_halted() {
            return ExecState::Halted;
        }
        match self.frames.last() {
            None => ExecState::Running,
            Some(Frame::Loop { .. }) => ExecState::InLoop,
            Some(Frame::Conditional { taken: true }) => ExecState::InConditionalTrue,
            Some(Frame::Conditional { taken: false }) => ExecState::InConditionalFalse,
            Some(Frame::Call { .. }) => ExecState::InFunction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_start_zeroed() {
        let state = ExecutorState::new(16);
        assert!(Register::ALL.iter().all(|r| state.read_reg(*r).unwrap() == 0));
        assert_eq!(state.exec_state(), ExecState::Running);
    }

    #[test]
    fn test_register_limit() {
        let mut state = ExecutorState::new(4);
        state.write_reg(Register::R3, -7).unwrap();
        assert_eq!(state.value(Operand::Register(Register::R3)).unwrap(), -7);
        assert!(matches!(
            state.write_reg(Register::R4, 1),
            Err(RuntimeError::InvalidRegister { max: 4, .. })
        ));
    }

    #[test]
    fn test_exec_state_follows_frames() {
        let mut state = ExecutorState::new(16);
        state.frames.push(Frame::Call {
            function: 0,
            return_pc: 8,
        });
        assert_eq!(state.exec_state(), ExecState::InFunction);
        assert!(state.in_call());
        state.frames.push(Frame::Conditional { taken: false });
        assert_eq!(state.exec_state(), ExecState::InConditionalFalse);
        state.halt(HaltReason::EndSpec);
        assert_eq!(state.exec_state(), ExecState::Halted);
    }
}
