//! Flat instruction program with two-phase jump resolution.
//!
//! Jumps are emitted before their destinations are known: a
//! [`Waypoint`] is allocated first, referenced by any number of jump
//! instructions, and bound to a concrete instruction index when
//! generation reaches the destination. Rendering resolves waypoints
//! to absolute indices; rendering an unbound waypoint is an internal
//! invariant violation, not a user-facing error.

use std::fmt::Write as _;

use crate::semantic::Name;

/// Symbolic jump target. Allocate with [`Program::waypoint`], bind
/// with [`Program::define`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waypoint {
    index: usize,
}

/// An operand slot of the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum Register {
    /// One stable slot per global variable.
    Global(Name),
    /// One stable slot per local, for the lifetime of its callable.
    Local { symbol: Name, identifier: String },
    /// Anonymous slot holding one intermediate result.
    Temporary(u32),
    /// An immediate number.
    Literal(f64),
    /// An immediate color, rendered as eight hex digits.
    Color(u32),
    /// An immediate string.
    Str(String),
    /// A named constant of the processor.
    Builtin(String),
    /// A linked building's handle.
    Link(String),
    True,
    False,
    Null,
}

/// One instruction of the processor.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    JumpAlways {
        goal: Waypoint,
    },
    JumpOnTrue {
        goal: Waypoint,
        condition: Register,
    },
    JumpOnFalse {
        goal: Waypoint,
        condition: Register,
    },
    End,
    Set {
        target: Register,
        source: Register,
    },
    UnaryOperation {
        code: &'static str,
        target: Register,
        operand: Register,
    },
    BinaryOperation {
        code: &'static str,
        target: Register,
        left: Register,
        right: Register,
    },
    /// A built-in procedure call, rendered as the instruction text
    /// followed by the arguments, with the fixed dummy operand
    /// inserted after the first argument when present.
    DeviceCall {
        instruction: String,
        dummy: Option<String>,
        arguments: Vec<Register>,
    },
}

/// Ordered instructions executed sequentially by the processor.
#[derive(Debug, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
    waypoints: Vec<Option<u32>>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    /// Adds an instruction to the end of the program.
    pub fn instruct(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Returns a new waypoint at an unknown position.
    pub fn waypoint(&mut self) -> Waypoint {
        let waypoint = Waypoint {
            index: self.waypoints.len(),
        };
        self.waypoints.push(None);
        waypoint
    }

    /// Makes the waypoint point to the next instruction that will be
    /// added.
    pub fn define(&mut self, waypoint: Waypoint) {
        self.waypoints[waypoint.index] = Some(self.instructions.len() as u32);
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    fn resolve(&self, waypoint: Waypoint) -> u32 {
        self.waypoints[waypoint.index].expect("waypoint is bound before rendering")
    }

    /// Renders the program, one instruction per line.
    pub fn render(&self) -> String {
        let mut output = String::new();
        for instruction in &self.instructions {
            self.render_instruction(&mut output, instruction);
            output.push('\n');
        }
        output
    }

    fn render_instruction(&self, output: &mut String, instruction: &Instruction) {
        match instruction {
            Instruction::JumpAlways { goal } => {
                let _ = write!(output, "jump {} always", self.resolve(*goal));
            }
            Instruction::JumpOnTrue { goal, condition } => {
                let _ = write!(output, "jump {} equal true ", self.resolve(*goal));
                render_register(output, condition);
            }
            Instruction::JumpOnFalse { goal, condition } => {
                let _ = write!(output, "jump {} equal false ", self.resolve(*goal));
                render_register(output, condition);
            }
            Instruction::End => output.push_str("end"),
            Instruction::Set { target, source } => {
                output.push_str("set ");
                render_register(output, target);
                output.push(' ');
                render_register(output, source);
            }
            Instruction::UnaryOperation {
                code,
                target,
                operand,
            } => {
                let _ = write!(output, "op {code} ");
                render_register(output, target);
                output.push(' ');
                render_register(output, operand);
            }
            Instruction::BinaryOperation {
                code,
                target,
                left,
                right,
            } => {
                let _ = write!(output, "op {code} ");
                render_register(output, target);
                output.push(' ');
                render_register(output, left);
                output.push(' ');
                render_register(output, right);
            }
            Instruction::DeviceCall {
                instruction,
                dummy,
                arguments,
            } => {
                output.push_str(instruction);
                for (position, argument) in arguments.iter().enumerate() {
                    output.push(' ');
                    render_register(output, argument);
                    if position == 0 {
                        if let Some(dummy) = dummy {
                            let _ = write!(output, " {dummy}");
                        }
                    }
                }
            }
        }
    }
}

fn render_register(output: &mut String, register: &Register) {
    match register {
        Register::Global(name) => {
            let _ = write!(output, "{}${}", name.source, name.identifier);
        }
        Register::Local { symbol, identifier } => {
            let _ = write!(output, "{}${}${identifier}", symbol.source, symbol.identifier);
        }
        Register::Temporary(index) => {
            let _ = write!(output, "_{index}");
        }
        // Shortest exact decimal text; integral values render with
        // no fraction and never in scientific notation.
        Register::Literal(value) => {
            let _ = write!(output, "{value}");
        }
        Register::Color(value) => {
            let _ = write!(output, "%{value:08x}");
        }
        Register::Str(text) => {
            let _ = write!(output, "\"{text}\"");
        }
        Register::Builtin(name) => {
            let _ = write!(output, "@{name}");
        }
        Register::Link(building) => output.push_str(building),
        Register::True => output.push_str("true"),
        Register::False => output.push_str("false"),
        Register::Null => output.push_str("null"),
    }
}
