//! Lowers a checked target to a processor program.
//!
//! The requested source's entrypoint becomes the program body.
//! Global variables with initial values are set first, ordered by
//! source then identifier, so every run starts from the same state.
//! Procedure calls are inlined at the call site; the checker has
//! already ruled out recursion by rejecting cyclic definitions, so
//! inlining always terminates.

use std::mem;

use crate::error::CoreError;
use crate::program::{Instruction, Program, Register, Waypoint};
use crate::semantic::{
    Affect, Argument, BinaryOp, Definition, Expression, Known, LocalVar, Name, Place, Statement,
    Target, UnaryOp,
};

/// Builds the instruction program of a checked target.
pub fn build(target: &Target) -> Result<Program, CoreError> {
    let Some(entrypoint) = target.requested_entrypoint() else {
        return Err(CoreError::BuildError {
            message: format!("target `{}` does not declare an entrypoint", target.name),
        });
    };
    let mut builder = Builder {
        target,
        program: Program::new(),
        temporaries: 0,
        loops: Vec::new(),
        frames: vec![Frame {
            symbol: Name::new(entrypoint.source.clone(), "entrypoint"),
            result: None,
            end_goal: None,
        }],
    };
    builder.build_globals();
    builder.build_statement(&entrypoint.body)?;
    builder.program.instruct(Instruction::End);
    Ok(builder.program)
}

struct Builder<'t> {
    target: &'t Target,
    program: Program,
    /// Count of allocated temporaries; never reused.
    temporaries: u32,
    /// Loops the currently built statement is inside, innermost last.
    /// Cleared while a called procedure's body is built, so its
    /// breaks cannot land in the caller's loops.
    loops: Vec<Loop>,
    /// Callables the currently built statement is inlined into,
    /// innermost last. The first frame is the entrypoint's.
    frames: Vec<Frame>,
}

struct Loop {
    label: Option<String>,
    continue_goal: Waypoint,
    exit_goal: Waypoint,
}

struct Frame {
    /// Owner of the frame's local registers.
    symbol: Name,
    /// Register receiving the returned value; none in the entrypoint.
    result: Option<Register>,
    /// Where `return` jumps to; in the entrypoint it ends the program
    /// instead.
    end_goal: Option<Waypoint>,
}

impl Builder<'_> {
    /// Emits the initial values of all global variables of the
    /// target, ordered by source then identifier.
    fn build_globals(&mut self) {
        for parcel in self.target.parcels.values() {
            for source in parcel.sources.values() {
                for definition in source.globals.values() {
                    let Definition::GlobalVar(global) = definition else {
                        continue;
                    };
                    if let Some(initial) = &global.initial {
                        self.program.instruct(Instruction::Set {
                            target: Register::Global(global.name.clone()),
                            source: known_register(initial),
                        });
                    }
                }
            }
        }
    }

    fn build_statement(&mut self, statement: &Statement) -> Result<(), CoreError> {
        match statement {
            Statement::Block(statements) => {
                for statement in statements {
                    self.build_statement(statement)?;
                }
                Ok(())
            }
            Statement::If {
                variables,
                condition,
                true_branch,
                false_branch,
            } => {
                for variable in variables {
                    self.build_local_var(variable)?;
                }
                let condition = self.build_expression(condition)?;
                match false_branch {
                    None => {
                        let exit = self.program.waypoint();
                        self.program.instruct(Instruction::JumpOnFalse {
                            goal: exit,
                            condition,
                        });
                        self.build_statement(true_branch)?;
                        self.program.define(exit);
                    }
                    Some(false_branch) => {
                        let false_goal = self.program.waypoint();
                        self.program.instruct(Instruction::JumpOnFalse {
                            goal: false_goal,
                            condition,
                        });
                        self.build_statement(true_branch)?;
                        let exit = self.program.waypoint();
                        self.program.instruct(Instruction::JumpAlways { goal: exit });
                        self.program.define(false_goal);
                        self.build_statement(false_branch)?;
                        self.program.define(exit);
                    }
                }
                Ok(())
            }
            Statement::While {
                label,
                variables,
                condition,
                interleaved,
                body,
            } => {
                for variable in variables {
                    self.build_local_var(variable)?;
                }
                let entry = self.program.waypoint();
                self.program.define(entry);
                let condition = self.build_expression(condition)?;
                let exit = self.program.waypoint();
                self.program.instruct(Instruction::JumpOnFalse {
                    goal: exit,
                    condition,
                });
                // Continue runs the interleaved affect when there is
                // one, so it still happens between iterations.
                let continue_goal = match interleaved {
                    Some(_) => self.program.waypoint(),
                    None => entry,
                };
                self.loops.push(Loop {
                    label: label.clone(),
                    continue_goal,
                    exit_goal: exit,
                });
                let built = self.build_statement(body);
                self.loops.pop();
                built?;
                if let Some(affect) = interleaved {
                    self.program.define(continue_goal);
                    self.build_affect(affect)?;
                }
                self.program.instruct(Instruction::JumpAlways { goal: entry });
                self.program.define(exit);
                Ok(())
            }
            Statement::Break { label } => {
                let goal = self.find_loop(label.as_ref(), "break")?.exit_goal;
                self.program.instruct(Instruction::JumpAlways { goal });
                Ok(())
            }
            Statement::Continue { label } => {
                let goal = self.find_loop(label.as_ref(), "continue")?.continue_goal;
                self.program.instruct(Instruction::JumpAlways { goal });
                Ok(())
            }
            Statement::Return { value } => {
                let (result, end_goal) = match self.frames.last() {
                    Some(frame) => (frame.result.clone(), frame.end_goal),
                    None => {
                        return Err(CoreError::BuildError {
                            message: "`return` used outside of a callable".to_owned(),
                        });
                    }
                };
                match end_goal {
                    None => self.program.instruct(Instruction::End),
                    Some(goal) => {
                        if let Some(value) = value {
                            let source = self.build_expression(value)?;
                            if let Some(target) = result {
                                self.program.instruct(Instruction::Set { target, source });
                            }
                        }
                        self.program.instruct(Instruction::JumpAlways { goal });
                    }
                }
                Ok(())
            }
            Statement::LocalVar(variable) => self.build_local_var(variable),
            Statement::Affect(affect) => self.build_affect(affect),
        }
    }

    fn build_local_var(&mut self, variable: &LocalVar) -> Result<(), CoreError> {
        if let Some(initial) = &variable.initial {
            let source = self.build_expression(initial)?;
            let target = self.local_register(&variable.identifier)?;
            self.program.instruct(Instruction::Set { target, source });
        }
        Ok(())
    }

    fn build_affect(&mut self, affect: &Affect) -> Result<(), CoreError> {
        match affect {
            Affect::Increment(place) => {
                let register = self.place_register(place)?;
                self.program.instruct(Instruction::BinaryOperation {
                    code: "add",
                    target: register.clone(),
                    left: register,
                    right: Register::Literal(1.0),
                });
                Ok(())
            }
            Affect::Decrement(place) => {
                let register = self.place_register(place)?;
                self.program.instruct(Instruction::BinaryOperation {
                    code: "sub",
                    target: register.clone(),
                    left: register,
                    right: Register::Literal(1.0),
                });
                Ok(())
            }
            Affect::Assign { target, source } => {
                let source = self.build_expression(source)?;
                let target = self.place_register(target)?;
                self.program.instruct(Instruction::Set { target, source });
                Ok(())
            }
            Affect::CompoundAssign { op, target, source } => {
                let source = self.build_expression(source)?;
                let target = self.place_register(target)?;
                self.program.instruct(Instruction::BinaryOperation {
                    code: op_code(*op),
                    target: target.clone(),
                    left: target,
                    right: source,
                });
                Ok(())
            }
            Affect::Discard(expression) => {
                self.build_expression(expression)?;
                Ok(())
            }
        }
    }

    fn build_expression(&mut self, expression: &Expression) -> Result<Register, CoreError> {
        match expression {
            Expression::Known(known) => Ok(known_register(known)),
            Expression::GlobalAccess(name) => Ok(Register::Global(name.clone())),
            Expression::LocalAccess(identifier) => self.local_register(identifier),
            Expression::LinkAccess(building) => Ok(Register::Link(building.clone())),
            Expression::Binary { op, left, right } => {
                let left = self.build_expression(left)?;
                let right = self.build_expression(right)?;
                let target = self.temporary();
                self.program.instruct(Instruction::BinaryOperation {
                    code: op_code(*op),
                    target: target.clone(),
                    left,
                    right,
                });
                Ok(target)
            }
            Expression::Unary { op, operand } => {
                let operand = self.build_expression(operand)?;
                let target = self.temporary();
                let instruction = match op {
                    UnaryOp::Negation => Instruction::BinaryOperation {
                        code: "sub",
                        target: target.clone(),
                        left: Register::Literal(0.0),
                        right: operand,
                    },
                    UnaryOp::LogicalNot => Instruction::BinaryOperation {
                        code: "equal",
                        target: target.clone(),
                        left: operand,
                        right: Register::Literal(0.0),
                    },
                    UnaryOp::BitwiseNot => Instruction::UnaryOperation {
                        code: "not",
                        target: target.clone(),
                        operand,
                    },
                };
                self.program.instruct(instruction);
                Ok(target)
            }
            Expression::ProcedureCall {
                procedure,
                arguments,
            } => self.build_procedure_call(procedure, arguments),
            Expression::BuiltinCall {
                instruction,
                dummy,
                arguments,
            } => {
                let mut registers = Vec::new();
                for argument in arguments {
                    registers.push(self.build_expression(argument)?);
                }
                self.program.instruct(Instruction::DeviceCall {
                    instruction: instruction.clone(),
                    dummy: dummy.clone(),
                    arguments: registers,
                });
                Ok(Register::Null)
            }
            Expression::PropertyRead { object, property } => {
                let object = self.build_expression(object)?;
                let target = self.temporary();
                self.program.instruct(Instruction::DeviceCall {
                    instruction: "sensor".to_owned(),
                    dummy: None,
                    arguments: vec![target.clone(), object, Register::Builtin(property.clone())],
                });
                Ok(target)
            }
        }
    }

    /// Inlines a call to a user procedure. The result register is
    /// set to null first, arguments are copied into the parameter
    /// registers, and arguments in in-out positions are copied back
    /// once the body finishes.
    fn build_procedure_call(
        &mut self,
        procedure: &Name,
        arguments: &[Argument],
    ) -> Result<Register, CoreError> {
        let Some(Definition::Proc(definition)) = self.target.definition(procedure) else {
            return Err(CoreError::BuildError {
                message: format!("could not find the procedure `{procedure}`"),
            });
        };
        let result = self.temporary();
        self.program.instruct(Instruction::Set {
            target: result.clone(),
            source: Register::Null,
        });
        let mut copy_backs = Vec::new();
        for (parameter, argument) in definition.parameters.iter().zip(arguments) {
            let target = Register::Local {
                symbol: definition.name.clone(),
                identifier: parameter.identifier.clone(),
            };
            let source = match argument {
                Argument::Value(expression) => self.build_expression(expression)?,
                Argument::Reference(place) => {
                    let register = self.place_register(place)?;
                    copy_backs.push((register.clone(), target.clone()));
                    register
                }
            };
            self.program.instruct(Instruction::Set { target, source });
        }
        let end_goal = self.program.waypoint();
        let saved_loops = mem::take(&mut self.loops);
        self.frames.push(Frame {
            symbol: definition.name.clone(),
            result: Some(result.clone()),
            end_goal: Some(end_goal),
        });
        let built = self.build_statement(&definition.body);
        self.frames.pop();
        self.loops = saved_loops;
        built?;
        self.program.define(end_goal);
        for (place, parameter) in copy_backs {
            self.program.instruct(Instruction::Set {
                target: place,
                source: parameter,
            });
        }
        Ok(result)
    }

    fn find_loop(&self, label: Option<&String>, keyword: &str) -> Result<&Loop, CoreError> {
        match label {
            None => self.loops.last().ok_or_else(|| CoreError::BuildError {
                message: format!("`{keyword}` used outside of a loop"),
            }),
            Some(label) => self
                .loops
                .iter()
                .rev()
                .find(|candidate| candidate.label.as_ref() == Some(label))
                .ok_or_else(|| CoreError::BuildError {
                    message: format!("could not find a loop labeled `{label}`"),
                }),
        }
    }

    fn local_register(&self, identifier: &str) -> Result<Register, CoreError> {
        match self.frames.last() {
            Some(frame) => Ok(Register::Local {
                symbol: frame.symbol.clone(),
                identifier: identifier.to_owned(),
            }),
            None => Err(CoreError::BuildError {
                message: format!("local `{identifier}` is used outside of a callable"),
            }),
        }
    }

    fn place_register(&self, place: &Place) -> Result<Register, CoreError> {
        match place {
            Place::Global(name) => Ok(Register::Global(name.clone())),
            Place::Local(identifier) => self.local_register(identifier),
        }
    }

    fn temporary(&mut self) -> Register {
        let register = Register::Temporary(self.temporaries);
        self.temporaries += 1;
        register
    }
}

fn known_register(known: &Known) -> Register {
    match known {
        Known::False => Register::False,
        Known::True => Register::True,
        Known::Null => Register::Null,
        Known::Number(value) => Register::Literal(*value),
        Known::Color(value) => Register::Color(*value),
        Known::Str(text) => Register::Str(text.clone()),
        Known::Builtin(name) => Register::Builtin(name.clone()),
    }
}

/// Operation code of a binary operator on the processor. Logical or
/// shares its code with bitwise or.
fn op_code(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::LogicalOr => "or",
        BinaryOp::LogicalAnd => "land",
        BinaryOp::EqualTo => "equal",
        BinaryOp::NotEqualTo => "notEqual",
        BinaryOp::StrictlyEqualTo => "strictEqual",
        BinaryOp::LessThan => "lessThan",
        BinaryOp::LessThanOrEqualTo => "lessThanEq",
        BinaryOp::GreaterThan => "greaterThan",
        BinaryOp::GreaterThanOrEqualTo => "greaterThanEq",
        BinaryOp::BitwiseOr => "or",
        BinaryOp::BitwiseXor => "xor",
        BinaryOp::BitwiseAnd => "and",
        BinaryOp::LeftShift => "shl",
        BinaryOp::RightShift => "shr",
        BinaryOp::Addition => "add",
        BinaryOp::Subtraction => "sub",
        BinaryOp::Multiplication => "mul",
        BinaryOp::Division => "div",
        BinaryOp::IntegerDivision => "idiv",
        BinaryOp::Modulus => "mod",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker;
    use tempfile::TempDir;

    fn check_sources(sources: &[(&str, &str)]) -> Target {
        let directory = TempDir::new().expect("temp directory");
        for (name, contents) in sources {
            let file = directory.path().join(format!("{name}.lpl"));
            std::fs::write(file, contents).expect("test source is written");
        }
        checker::check(sources[0].0, &[directory.path().to_path_buf()], None)
            .expect("sources check")
    }

    fn render_main(contents: &str) -> String {
        let target = check_sources(&[("main", contents)]);
        build(&target).expect("main builds").render()
    }

    #[test]
    fn an_empty_entrypoint_only_ends() {
        assert_eq!(render_main("entrypoint { }\n"), "end\n");
    }

    #[test]
    fn a_target_without_an_entrypoint_does_not_build() {
        let target = check_sources(&[("main", "const x = 1;\n")]);
        let error = build(&target).expect_err("nothing to build");
        assert!(
            error
                .to_string()
                .contains("target `main` does not declare an entrypoint")
        );
    }

    #[test]
    fn globals_are_initialized_before_the_body() {
        let rendered = render_main("var g = 5;\nentrypoint { g = g + 1; }\n");
        assert_eq!(
            rendered,
            "set main$g 5\n\
             op add _0 main$g 1\n\
             set main$g _0\n\
             end\n"
        );
    }

    #[test]
    fn global_initializers_follow_source_then_identifier_order() {
        let target = check_sources(&[
            ("main", "var z = 2;\nentrypoint { print(lib::a); }\n"),
            ("lib", "public var a = 1;\n"),
        ]);
        let rendered = build(&target).expect("main builds").render();
        assert_eq!(
            rendered,
            "set lib$a 1\n\
             set main$z 2\n\
             print lib$a\n\
             end\n"
        );
    }

    #[test]
    fn if_else_jumps_over_the_untaken_branch() {
        let rendered =
            render_main("entrypoint { var t = 1; if t { print(1); } else { print(2); } }\n");
        assert_eq!(
            rendered,
            "set main$entrypoint$t 1\n\
             jump 4 equal false main$entrypoint$t\n\
             print 1\n\
             jump 5 always\n\
             print 2\n\
             end\n"
        );
    }

    #[test]
    fn while_loops_interleave_the_affect_between_iterations() {
        let rendered = render_main("entrypoint { while var i = 0; i < 3; i++ { print(i); } }\n");
        assert_eq!(
            rendered,
            "set main$entrypoint$i 0\n\
             op lessThan _0 main$entrypoint$i 3\n\
             jump 6 equal false _0\n\
             print main$entrypoint$i\n\
             op add main$entrypoint$i main$entrypoint$i 1\n\
             jump 1 always\n\
             end\n"
        );
    }

    #[test]
    fn break_leaves_the_innermost_loop() {
        let rendered = render_main("entrypoint { while 1 { while 1 { break; } } }\n");
        assert_eq!(
            rendered,
            "jump 5 equal false 1\n\
             jump 4 equal false 1\n\
             jump 4 always\n\
             jump 1 always\n\
             jump 0 always\n\
             end\n"
        );
    }

    #[test]
    fn labeled_break_leaves_the_named_loop() {
        let rendered = render_main("entrypoint { outer: while 1 { while 1 { break outer; } } }\n");
        assert_eq!(
            rendered,
            "jump 5 equal false 1\n\
             jump 4 equal false 1\n\
             jump 5 always\n\
             jump 1 always\n\
             jump 0 always\n\
             end\n"
        );
    }

    #[test]
    fn break_outside_of_a_loop_does_not_build() {
        let target = check_sources(&[("main", "entrypoint { break; }\n")]);
        let error = build(&target).expect_err("no loop to break");
        assert!(error.to_string().contains("`break` used outside of a loop"));
    }

    #[test]
    fn unknown_loop_labels_do_not_build() {
        let target =
            check_sources(&[("main", "entrypoint { while 1 { continue missing; } }\n")]);
        let error = build(&target).expect_err("no loop with that label");
        assert!(
            error
                .to_string()
                .contains("could not find a loop labeled `missing`")
        );
    }

    #[test]
    fn in_out_arguments_copy_back_after_the_body() {
        let rendered =
            render_main("proc bump(x&) { x = x + 1; }\nentrypoint { var v = 1; bump(v); }\n");
        assert_eq!(
            rendered,
            "set main$entrypoint$v 1\n\
             set _0 null\n\
             set main$bump$x main$entrypoint$v\n\
             op add _1 main$bump$x 1\n\
             set main$bump$x _1\n\
             set main$entrypoint$v main$bump$x\n\
             end\n"
        );
    }

    #[test]
    fn returned_values_land_in_the_result_register() {
        let rendered = render_main("proc two() { return 2; }\nentrypoint { var v = two(); }\n");
        assert_eq!(
            rendered,
            "set _0 null\n\
             set _0 2\n\
             jump 3 always\n\
             set main$entrypoint$v _0\n\
             end\n"
        );
    }

    #[test]
    fn built_in_calls_evaluate_to_null() {
        let rendered = render_main("entrypoint { var v = print(1); }\n");
        assert_eq!(
            rendered,
            "print 1\n\
             set main$entrypoint$v null\n\
             end\n"
        );
    }

    #[test]
    fn property_reads_lower_to_sensor() {
        let rendered = render_main("link cell1;\nentrypoint { print(cell1.copper); }\n");
        assert_eq!(
            rendered,
            "sensor _0 cell1 @copper\n\
             print _0\n\
             end\n"
        );
    }

    #[test]
    fn unary_operators_lower_to_processor_operations() {
        let rendered = render_main("var g = 3;\nentrypoint { g = -g; g = !g; g = ~g; }\n");
        assert_eq!(
            rendered,
            "set main$g 3\n\
             op sub _0 0 main$g\n\
             set main$g _0\n\
             op equal _1 main$g 0\n\
             set main$g _1\n\
             op not _2 main$g\n\
             set main$g _2\n\
             end\n"
        );
    }
}
