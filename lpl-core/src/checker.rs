//! Semantic checking.
//!
//! The checker turns parse trees into the checked model in
//! [`semantic`]. It resolves mentions across files, folds constant
//! expressions, assigns register identifiers to locals and reports
//! everything the builder is allowed to assume afterwards: symbols
//! exist and are visible, arities match, assignment targets are
//! mutable and definitions are acyclic.
//!
//! Files are checked at most once. A request for an already checked
//! file returns the memoized result; a request for a file that is
//! still being checked is a cycle and fatal. The built-in source is
//! seeded into the checked set up front, so its name never reaches
//! the include directories.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::mem;
use std::path::{Path, PathBuf};

use crate::ast;
use crate::builtins;
use crate::error::{CoreError, Location};
use crate::lexer;
use crate::parser;
use crate::scope::{Scope, ScopeLog};
use crate::semantic::{
    self, Argument, Definition, Entrypoint, Known, Name, Parcel, Place, Source, Target,
    BUILT_IN_SOURCE,
};
use crate::span::Span;

/// Extension of the source files the checker looks for.
pub const SOURCE_EXTENSION: &str = ".lpl";

/// Checks the source with the given name and everything it reaches.
///
/// Sources are looked up in `includes` in order. When `artifacts` is
/// given, the directory is created and the built-in listings plus a
/// dump of the checked target are recorded there.
pub fn check(
    name: &str,
    includes: &[PathBuf],
    artifacts: Option<&Path>,
) -> Result<Target, CoreError> {
    let checker = Checker {
        name,
        includes,
        artifacts,
        sources: BTreeMap::new(),
        currently_checked: BTreeSet::new(),
        entrypoints: Vec::new(),
    };
    checker.check()
}

/// Checks a set of source files into one target.
struct Checker<'a> {
    /// Name of the requested source.
    name: &'a str,
    /// Directories source files are searched in, in order.
    includes: &'a [PathBuf],
    /// Directory compilation artifacts are recorded under.
    artifacts: Option<&'a Path>,
    /// Checked sources by name.
    sources: BTreeMap<String, Source>,
    /// Names of sources whose check has started but not finished.
    currently_checked: BTreeSet<String>,
    /// Entrypoints in completion order; dependencies finish first.
    entrypoints: Vec<Entrypoint>,
}

impl Checker<'_> {
    fn check(mut self) -> Result<Target, CoreError> {
        if let Some(artifacts) = self.artifacts {
            fs::create_dir_all(artifacts).map_err(|cause| CoreError::ArtifactError {
                path: artifacts.to_path_buf(),
                cause,
            })?;
        }
        self.sources
            .insert(BUILT_IN_SOURCE.to_owned(), builtins::built_in_source());
        if !self.sources.contains_key(self.name) {
            self.currently_checked.insert(self.name.to_owned());
            let checked = self.check_source_now(self.name.to_owned());
            self.currently_checked.remove(self.name);
            checked?;
        }
        let target = Target {
            name: self.name.to_owned(),
            parcels: BTreeMap::from([(
                self.name.to_owned(),
                Parcel {
                    sources: mem::take(&mut self.sources),
                },
            )]),
            entrypoints: mem::take(&mut self.entrypoints),
        };
        self.record_artifacts(&target)?;
        Ok(target)
    }

    /// Makes sure the named source is checked before `find_global`
    /// reads from it. Requests into a check that is still running
    /// form a cycle and are reported at the requesting mention.
    fn check_dependency(&mut self, origin: &Location, name: &str) -> Result<(), CoreError> {
        if self.sources.contains_key(name) {
            return Ok(());
        }
        if self.currently_checked.contains(name) {
            return Err(CoreError::SemanticError {
                location: origin.clone(),
                message: format!("cyclic definition with `{name}`"),
            });
        }
        self.currently_checked.insert(name.to_owned());
        let checked = self.check_source_now(name.to_owned());
        self.currently_checked.remove(name);
        checked
    }

    fn check_source_now(&mut self, name: String) -> Result<(), CoreError> {
        let file = self.find_source(&name)?;
        let origin = file.display().to_string();
        let contents = fs::read_to_string(&file)?;
        let tokens = lexer::lex(&origin, &contents)?;
        let declarations = parser::parse(&origin, &contents, &tokens)?;
        let checker = SourceChecker {
            checker: self,
            name: name.clone(),
            origin,
            contents,
            order: Vec::new(),
            unchecked: BTreeMap::new(),
            currently: BTreeSet::new(),
            globals: BTreeMap::new(),
        };
        let (source, entrypoint) = checker.check(declarations)?;
        self.sources.insert(name, source);
        if let Some(entrypoint) = entrypoint {
            self.entrypoints.push(entrypoint);
        }
        Ok(())
    }

    /// Finds the file of a source by name. The first include
    /// directory holding a file with the source's name wins.
    fn find_source(&self, name: &str) -> Result<PathBuf, CoreError> {
        let full_name = format!("{name}{SOURCE_EXTENSION}");
        for site in self.includes {
            let file = site.join(&full_name);
            if file.exists() {
                return Ok(file);
            }
        }
        Err(CoreError::MissingSource {
            name: name.to_owned(),
            searched: self.includes.to_vec(),
        })
    }

    /// Resolves a qualified name in another source, checking that
    /// source first when necessary. Aliases resolve to the aliased
    /// definition.
    fn find_global(&mut self, origin: &Location, name: &Name) -> Result<Definition, CoreError> {
        self.check_dependency(origin, &name.source)?;
        let source = &self.sources[&name.source];
        let Some(global) = source.globals.get(&name.identifier) else {
            return Err(CoreError::SemanticError {
                location: origin.clone(),
                message: format!("could not find the symbol `{name}`"),
            });
        };
        if !global.visible() {
            return Err(CoreError::SemanticError {
                location: origin.clone(),
                message: format!("requested symbol `{name}` is not visible"),
            });
        }
        Ok(unwrap_using(global.clone()))
    }

    fn record_artifacts(&self, target: &Target) -> Result<(), CoreError> {
        let Some(artifacts) = self.artifacts else {
            return Ok(());
        };
        let record = |file: PathBuf, contents: String| {
            fs::write(&file, contents).map_err(|cause| CoreError::ArtifactError {
                path: file,
                cause,
            })
        };
        let built_in = target
            .parcels
            .values()
            .find_map(|parcel| parcel.sources.get(BUILT_IN_SOURCE));
        if let Some(source) = built_in {
            record(
                artifacts.join(format!("builtin.variable{SOURCE_EXTENSION}")),
                builtins::variable_listing(source),
            )?;
            record(
                artifacts.join(format!("builtin.procedure{SOURCE_EXTENSION}")),
                builtins::procedure_listing(source),
            )?;
        }
        record(
            artifacts.join(format!("{}.target{SOURCE_EXTENSION}", target.name)),
            format!("{target:#?}"),
        )
    }
}

/// Checks the declarations of one source file.
///
/// Definitions are checked lazily in declaration order: a mention of
/// a definition that is declared later in the file checks it on the
/// spot, and a mention of a definition whose own check is still
/// running is a cycle. The entrypoint body is checked after every
/// definition of the file.
struct SourceChecker<'c, 'a> {
    checker: &'c mut Checker<'a>,
    /// Name of the checked source.
    name: String,
    /// Path of the checked file as shown in diagnostics.
    origin: String,
    contents: String,
    /// Declared names in declaration order.
    order: Vec<String>,
    unchecked: BTreeMap<String, ast::Definition>,
    /// Names of definitions whose check has started but not finished.
    currently: BTreeSet<String>,
    globals: BTreeMap<String, Definition>,
}

/// State carried while checking one callable body.
struct Body {
    log: ScopeLog,
    /// Entrypoint bodies may not return values.
    entrypoint: bool,
}

/// What a mention resolved to.
enum Resolved {
    /// A local variable, by register identifier.
    Local(String),
    /// A global definition, never an alias.
    Definition(Definition),
}

impl SourceChecker<'_, '_> {
    fn check(
        mut self,
        declarations: Vec<ast::Declaration>,
    ) -> Result<(Source, Option<Entrypoint>), CoreError> {
        let mut entrypoint = None;
        for declaration in declarations {
            match declaration {
                ast::Declaration::Entrypoint(body) => {
                    if entrypoint.is_some() {
                        return Err(
                            self.error(body.span, "redeclaration of the entrypoint".to_owned())
                        );
                    }
                    entrypoint = Some(body);
                }
                ast::Declaration::Definition(definition) => {
                    let declared = definition.kind.declared_name().clone();
                    if self.unchecked.contains_key(&declared.text)
                        || self.globals.contains_key(&declared.text)
                    {
                        return Err(self.error(
                            declared.span,
                            format!("redeclaration of `{}`", declared.text),
                        ));
                    }
                    self.order.push(declared.text.clone());
                    self.unchecked.insert(declared.text, definition);
                }
            }
        }
        for identifier in mem::take(&mut self.order) {
            if self.globals.contains_key(&identifier) {
                continue;
            }
            self.check_definition(&identifier)?;
        }
        let entrypoint = match entrypoint {
            Some(body) => Some(self.check_entrypoint(body)?),
            None => None,
        };
        Ok((
            Source {
                globals: self.globals,
            },
            entrypoint,
        ))
    }

    fn check_definition(&mut self, identifier: &str) -> Result<(), CoreError> {
        let Some(definition) = self.unchecked.remove(identifier) else {
            return Ok(());
        };
        self.currently.insert(identifier.to_owned());
        let checked = self.check_definition_kind(identifier, definition);
        self.currently.remove(identifier);
        self.globals.insert(identifier.to_owned(), checked?);
        Ok(())
    }

    fn check_definition_kind(
        &mut self,
        identifier: &str,
        definition: ast::Definition,
    ) -> Result<Definition, CoreError> {
        let symbol = Name::new(self.name.clone(), identifier);
        let visible = definition.public;
        match definition.kind {
            ast::DefinitionKind::Link { building, .. } => Ok(Definition::Link(semantic::Link {
                name: symbol,
                visible,
                building: building.text,
            })),
            ast::DefinitionKind::Using { used, .. } => {
                let log = ScopeLog::new();
                let scope = Scope::top();
                let aliased = match self.resolve_mention(&log, &scope, &used)? {
                    Resolved::Definition(definition) => definition,
                    Resolved::Local(_) => {
                        return Err(self.error(
                            used.span,
                            "local variables cannot be aliased".to_owned(),
                        ));
                    }
                };
                Ok(Definition::Using(semantic::Using {
                    name: symbol,
                    visible,
                    aliased: Box::new(aliased),
                }))
            }
            ast::DefinitionKind::Proc {
                parameters, body, ..
            } => {
                let mut context = Body {
                    log: ScopeLog::new(),
                    entrypoint: false,
                };
                let mut scope = Scope::top();
                let mut checked_parameters: Vec<semantic::Parameter> = Vec::new();
                for parameter in &parameters {
                    let text = &parameter.identifier.text;
                    if checked_parameters.iter().any(|p| &p.identifier == text) {
                        return Err(self.error(
                            parameter.identifier.span,
                            format!("redeclaration of the parameter `{text}`"),
                        ));
                    }
                    context.log.introduce(&mut scope, text);
                    checked_parameters.push(semantic::Parameter {
                        identifier: text.clone(),
                        in_out: parameter.in_out,
                    });
                }
                let body = self.check_statement(&mut context, &mut scope, &body)?;
                Ok(Definition::Proc(semantic::Proc {
                    name: symbol,
                    visible,
                    parameters: checked_parameters,
                    body,
                }))
            }
            ast::DefinitionKind::Const { value, .. } => {
                let log = ScopeLog::new();
                let scope = Scope::top();
                let checked = self.check_expression(&log, &scope, &value)?;
                let semantic::Expression::Known(known) = checked else {
                    return Err(self.error(
                        value.span,
                        format!("value of constant `{symbol}` is not known at compile time"),
                    ));
                };
                Ok(Definition::Const(semantic::Const {
                    name: symbol,
                    visible,
                    value: known,
                }))
            }
            ast::DefinitionKind::GlobalVar { initial, .. } => {
                let initial = match initial {
                    Some(expression) => {
                        let log = ScopeLog::new();
                        let scope = Scope::top();
                        let checked = self.check_expression(&log, &scope, &expression)?;
                        let semantic::Expression::Known(known) = checked else {
                            return Err(self.error(
                                expression.span,
                                format!(
                                    "initial value of global variable `{symbol}` \
                                     is not known at compile time"
                                ),
                            ));
                        };
                        Some(known)
                    }
                    None => None,
                };
                Ok(Definition::GlobalVar(semantic::GlobalVar {
                    name: symbol,
                    visible,
                    initial,
                }))
            }
        }
    }

    fn check_entrypoint(&mut self, body: ast::Statement) -> Result<Entrypoint, CoreError> {
        let mut context = Body {
            log: ScopeLog::new(),
            entrypoint: true,
        };
        let mut scope = Scope::top();
        let body = self.check_statement(&mut context, &mut scope, &body)?;
        Ok(Entrypoint {
            source: self.name.clone(),
            body,
        })
    }

    fn check_statement(
        &mut self,
        body: &mut Body,
        scope: &mut Scope,
        statement: &ast::Statement,
    ) -> Result<semantic::Statement, CoreError> {
        match &statement.kind {
            ast::StatementKind::Block(statements) => {
                let mut inner = scope.child();
                let mut checked = Vec::new();
                for statement in statements {
                    checked.push(self.check_statement(body, &mut inner, statement)?);
                }
                Ok(semantic::Statement::Block(checked))
            }
            ast::StatementKind::If {
                variables,
                condition,
                true_branch,
                false_branch,
            } => {
                let mut head = scope.child();
                let variables = self.check_condition_variables(body, &mut head, variables)?;
                let condition = self.check_expression(&body.log, &head, condition)?;
                let mut true_scope = head.child();
                let true_branch = self.check_statement(body, &mut true_scope, true_branch)?;
                let false_branch = match false_branch {
                    Some(branch) => {
                        let mut false_scope = head.child();
                        Some(Box::new(self.check_statement(body, &mut false_scope, branch)?))
                    }
                    None => None,
                };
                Ok(semantic::Statement::If {
                    variables,
                    condition,
                    true_branch: Box::new(true_branch),
                    false_branch,
                })
            }
            ast::StatementKind::While {
                label,
                variables,
                condition,
                interleaved,
                body: loop_body,
            } => {
                let mut head = scope.child();
                let variables = self.check_condition_variables(body, &mut head, variables)?;
                let condition = self.check_expression(&body.log, &head, condition)?;
                let interleaved = match interleaved {
                    Some(affect) => Some(self.check_affect(&body.log, &head, affect)?),
                    None => None,
                };
                let mut inner = head.child();
                let loop_body = self.check_statement(body, &mut inner, loop_body)?;
                Ok(semantic::Statement::While {
                    label: label.as_ref().map(|label| label.text.clone()),
                    variables,
                    condition,
                    interleaved,
                    body: Box::new(loop_body),
                })
            }
            ast::StatementKind::Break { label } => Ok(semantic::Statement::Break {
                label: label.as_ref().map(|label| label.text.clone()),
            }),
            ast::StatementKind::Continue { label } => Ok(semantic::Statement::Continue {
                label: label.as_ref().map(|label| label.text.clone()),
            }),
            ast::StatementKind::Return { value } => {
                if body.entrypoint && value.is_some() {
                    return Err(self.error(
                        statement.span,
                        "the entrypoint cannot return a value".to_owned(),
                    ));
                }
                let value = match value {
                    Some(value) => Some(self.check_expression(&body.log, scope, value)?),
                    None => None,
                };
                Ok(semantic::Statement::Return { value })
            }
            ast::StatementKind::LocalVar(declaration) => Ok(semantic::Statement::LocalVar(
                self.check_local_var(body, scope, declaration)?,
            )),
            ast::StatementKind::Affect(affect) => Ok(semantic::Statement::Affect(
                self.check_affect(&body.log, scope, affect)?,
            )),
        }
    }

    /// Checks a local variable declaration. The initial value is
    /// checked before the variable is introduced, so it can read an
    /// outer variable of the same name.
    fn check_local_var(
        &mut self,
        body: &mut Body,
        scope: &mut Scope,
        declaration: &ast::LocalVar,
    ) -> Result<semantic::LocalVar, CoreError> {
        let initial = match &declaration.initial {
            Some(expression) => Some(self.check_expression(&body.log, scope, expression)?),
            None => None,
        };
        let register = body.log.introduce(scope, &declaration.identifier.text);
        Ok(semantic::LocalVar {
            identifier: register,
            initial,
        })
    }

    fn check_condition_variables(
        &mut self,
        body: &mut Body,
        scope: &mut Scope,
        variables: &[ast::LocalVar],
    ) -> Result<Vec<semantic::LocalVar>, CoreError> {
        variables
            .iter()
            .map(|variable| self.check_local_var(body, scope, variable))
            .collect()
    }

    fn check_affect(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        affect: &ast::Affect,
    ) -> Result<semantic::Affect, CoreError> {
        match &affect.kind {
            ast::AffectKind::Increment(target) => Ok(semantic::Affect::Increment(
                self.resolve_place(log, scope, target)?,
            )),
            ast::AffectKind::Decrement(target) => Ok(semantic::Affect::Decrement(
                self.resolve_place(log, scope, target)?,
            )),
            ast::AffectKind::Assign { target, source } => Ok(semantic::Affect::Assign {
                target: self.resolve_place(log, scope, target)?,
                source: self.check_expression(log, scope, source)?,
            }),
            ast::AffectKind::CompoundAssign { op, target, source } => {
                Ok(semantic::Affect::CompoundAssign {
                    op: lower_binary_op(*op),
                    target: self.resolve_place(log, scope, target)?,
                    source: self.check_expression(log, scope, source)?,
                })
            }
            ast::AffectKind::Discard(expression) => Ok(semantic::Affect::Discard(
                self.check_expression(log, scope, expression)?,
            )),
        }
    }

    fn check_expression(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        expression: &ast::Expression,
    ) -> Result<semantic::Expression, CoreError> {
        match &expression.kind {
            ast::ExpressionKind::Number(value) => {
                Ok(semantic::Expression::Known(Known::Number(*value)))
            }
            ast::ExpressionKind::Color(value) => {
                Ok(semantic::Expression::Known(Known::Color(*value)))
            }
            ast::ExpressionKind::Str(value) => {
                Ok(semantic::Expression::Known(Known::Str(value.clone())))
            }
            ast::ExpressionKind::Grouping(inner) => self.check_expression(log, scope, inner),
            ast::ExpressionKind::SymbolAccess(mention) => {
                match self.resolve_mention(log, scope, mention)? {
                    Resolved::Local(register) => Ok(semantic::Expression::LocalAccess(register)),
                    Resolved::Definition(definition) => {
                        self.definition_value(mention.span, definition)
                    }
                }
            }
            ast::ExpressionKind::Call { callee, arguments } => {
                self.check_call(log, scope, callee, arguments)
            }
            ast::ExpressionKind::MemberAccess { object, member } => {
                let object = self.check_expression(log, scope, object)?;
                let property = self.built_in_property(member)?;
                Ok(semantic::Expression::PropertyRead {
                    object: Box::new(object),
                    property,
                })
            }
            ast::ExpressionKind::MemberCall {
                object,
                member,
                arguments,
            } => self.check_member_call(log, scope, object, member, arguments),
            ast::ExpressionKind::Binary { op, left, right } => {
                let left = self.check_expression(log, scope, left)?;
                let right = self.check_expression(log, scope, right)?;
                let op = lower_binary_op(*op);
                if let (semantic::Expression::Known(l), semantic::Expression::Known(r)) =
                    (&left, &right)
                {
                    if let Some(folded) = fold_binary(op, l, r) {
                        return Ok(semantic::Expression::Known(folded));
                    }
                }
                Ok(semantic::Expression::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            ast::ExpressionKind::Unary { op, operand } => {
                let operand = self.check_expression(log, scope, operand)?;
                let Some(op) = lower_unary_op(*op) else {
                    return Ok(operand);
                };
                if let semantic::Expression::Known(known) = &operand {
                    if let Some(folded) = fold_unary(op, known) {
                        return Ok(semantic::Expression::Known(folded));
                    }
                }
                Ok(semantic::Expression::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
        }
    }

    /// The value an accessed definition stands for.
    fn definition_value(
        &self,
        span: Span,
        definition: Definition,
    ) -> Result<semantic::Expression, CoreError> {
        match definition {
            Definition::Link(link) => Ok(semantic::Expression::LinkAccess(link.building)),
            Definition::Const(constant) => Ok(semantic::Expression::Known(constant.value)),
            Definition::Keyword(keyword) => Ok(semantic::Expression::Known(keyword.value)),
            Definition::BuiltinConstant(constant) => {
                Ok(semantic::Expression::Known(Known::Builtin(constant.property)))
            }
            Definition::GlobalVar(global) => Ok(semantic::Expression::GlobalAccess(global.name)),
            Definition::Using(using) => self.definition_value(span, *using.aliased),
            Definition::Proc(procedure) => Err(self.error(
                span,
                format!("procedure `{}` cannot be used as a value", procedure.name),
            )),
            Definition::BuiltinProcedure(procedure) => Err(self.error(
                span,
                format!("procedure `{}` cannot be used as a value", procedure.name),
            )),
        }
    }

    fn check_call(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        callee: &ast::Mention,
        arguments: &[ast::Expression],
    ) -> Result<semantic::Expression, CoreError> {
        let definition = match self.resolve_mention(log, scope, callee)? {
            Resolved::Local(register) => {
                return Err(self.error(
                    callee.span,
                    format!("local variable `{register}` is not a procedure"),
                ));
            }
            Resolved::Definition(definition) => definition,
        };
        self.check_call_to(log, scope, callee.span, definition, arguments)
    }

    fn check_call_to(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        span: Span,
        definition: Definition,
        arguments: &[ast::Expression],
    ) -> Result<semantic::Expression, CoreError> {
        match definition {
            Definition::Proc(procedure) => {
                if procedure.parameters.len() != arguments.len() {
                    return Err(self.error(
                        span,
                        format!(
                            "procedure `{}` expects {} arguments, found {}",
                            procedure.name,
                            procedure.parameters.len(),
                            arguments.len()
                        ),
                    ));
                }
                let mut checked = Vec::new();
                for (parameter, argument) in procedure.parameters.iter().zip(arguments) {
                    if parameter.in_out {
                        let ast::ExpressionKind::SymbolAccess(mention) = &argument.kind else {
                            return Err(self.error(
                                argument.span,
                                format!(
                                    "argument for in-out parameter `{}` of `{}` \
                                     must be a variable",
                                    parameter.identifier, procedure.name
                                ),
                            ));
                        };
                        checked.push(Argument::Reference(
                            self.resolve_place(log, scope, mention)?,
                        ));
                    } else {
                        checked.push(Argument::Value(
                            self.check_expression(log, scope, argument)?,
                        ));
                    }
                }
                Ok(semantic::Expression::ProcedureCall {
                    procedure: procedure.name,
                    arguments: checked,
                })
            }
            Definition::BuiltinProcedure(procedure) => {
                if procedure.parameters as usize != arguments.len() {
                    return Err(self.error(
                        span,
                        format!(
                            "procedure `{}` expects {} arguments, found {}",
                            procedure.name,
                            procedure.parameters,
                            arguments.len()
                        ),
                    ));
                }
                let mut checked = Vec::new();
                for argument in arguments {
                    checked.push(self.check_expression(log, scope, argument)?);
                }
                Ok(semantic::Expression::BuiltinCall {
                    instruction: procedure.instruction,
                    dummy: procedure.dummy,
                    arguments: checked,
                })
            }
            Definition::Using(using) => {
                self.check_call_to(log, scope, span, *using.aliased, arguments)
            }
            other => Err(self.error(
                span,
                format!("symbol `{}` is not a procedure", other.name()),
            )),
        }
    }

    /// Checks `object.member(arguments…)`. The member names a
    /// built-in procedure and the object becomes its first argument.
    fn check_member_call(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        object: &ast::Expression,
        member: &ast::Identifier,
        arguments: &[ast::Expression],
    ) -> Result<semantic::Expression, CoreError> {
        let built_in = self.checker.sources[BUILT_IN_SOURCE]
            .globals
            .get(&member.text)
            .cloned();
        let Some(Definition::BuiltinProcedure(procedure)) = built_in else {
            return Err(self.error(
                member.span,
                format!("`{}` is not a built-in procedure", member.text),
            ));
        };
        if procedure.parameters as usize != arguments.len() + 1 {
            return Err(self.error(
                member.span,
                format!(
                    "procedure `{}` expects {} arguments, found {}",
                    procedure.name,
                    procedure.parameters,
                    arguments.len() + 1
                ),
            ));
        }
        let mut checked = vec![self.check_expression(log, scope, object)?];
        for argument in arguments {
            checked.push(self.check_expression(log, scope, argument)?);
        }
        Ok(semantic::Expression::BuiltinCall {
            instruction: procedure.instruction,
            dummy: procedure.dummy,
            arguments: checked,
        })
    }

    fn built_in_property(&self, member: &ast::Identifier) -> Result<String, CoreError> {
        match self.checker.sources[BUILT_IN_SOURCE].globals.get(&member.text) {
            Some(Definition::BuiltinConstant(constant)) => Ok(constant.property.clone()),
            _ => Err(self.error(
                member.span,
                format!("`{}` is not a known property", member.text),
            )),
        }
    }

    /// Resolves the target of an affect to a mutable place.
    fn resolve_place(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        mention: &ast::Mention,
    ) -> Result<Place, CoreError> {
        match self.resolve_mention(log, scope, mention)? {
            Resolved::Local(register) => Ok(Place::Local(register)),
            Resolved::Definition(definition) => self.definition_place(mention.span, definition),
        }
    }

    fn definition_place(&self, span: Span, definition: Definition) -> Result<Place, CoreError> {
        match definition {
            Definition::GlobalVar(global) => Ok(Place::Global(global.name)),
            Definition::Using(using) => self.definition_place(span, *using.aliased),
            Definition::Link(link) => Err(self.error(
                span,
                format!("link `{}` cannot be assigned", link.name),
            )),
            Definition::Const(constant) => Err(self.error(
                span,
                format!("constant `{}` cannot be assigned", constant.name),
            )),
            Definition::Proc(procedure) => Err(self.error(
                span,
                format!("procedure `{}` cannot be assigned", procedure.name),
            )),
            Definition::BuiltinProcedure(procedure) => Err(self.error(
                span,
                format!("procedure `{}` cannot be assigned", procedure.name),
            )),
            Definition::Keyword(keyword) => Err(self.error(
                span,
                format!("`{}` cannot be assigned", keyword.name),
            )),
            Definition::BuiltinConstant(constant) => Err(self.error(
                span,
                format!("`{}` cannot be assigned", constant.name),
            )),
        }
    }

    /// Resolves a mention. Unqualified mentions try the local scope,
    /// then the checked file, then the built-in source. Qualified
    /// mentions into the checked file skip the visibility test;
    /// qualified mentions into other sources go through
    /// [`Checker::find_global`].
    fn resolve_mention(
        &mut self,
        log: &ScopeLog,
        scope: &Scope,
        mention: &ast::Mention,
    ) -> Result<Resolved, CoreError> {
        if let Some(qualifier) = &mention.source {
            if qualifier.text == self.name {
                return match self.resolve_own(&mention.identifier.text, mention.span)? {
                    Some(definition) => Ok(Resolved::Definition(definition)),
                    None => Err(self.error(
                        mention.span,
                        format!(
                            "could not find the symbol `{}::{}`",
                            qualifier.text, mention.identifier.text
                        ),
                    )),
                };
            }
            let origin = self.location(mention.span);
            let name = Name::new(qualifier.text.clone(), mention.identifier.text.clone());
            let definition = self.checker.find_global(&origin, &name)?;
            return Ok(Resolved::Definition(definition));
        }
        if let Some(register) = log.find(scope, &mention.identifier.text) {
            return Ok(Resolved::Local(register.to_owned()));
        }
        if let Some(definition) = self.resolve_own(&mention.identifier.text, mention.span)? {
            return Ok(Resolved::Definition(definition));
        }
        if let Some(definition) = self.checker.sources[BUILT_IN_SOURCE]
            .globals
            .get(&mention.identifier.text)
        {
            return Ok(Resolved::Definition(definition.clone()));
        }
        Err(self.error(
            mention.span,
            format!("could not find the symbol `{}`", mention.identifier.text),
        ))
    }

    /// Resolves an identifier against the checked file's own
    /// definitions, checking the definition first when it has not
    /// been reached yet.
    fn resolve_own(
        &mut self,
        identifier: &str,
        span: Span,
    ) -> Result<Option<Definition>, CoreError> {
        if let Some(definition) = self.globals.get(identifier) {
            return Ok(Some(unwrap_using(definition.clone())));
        }
        if self.currently.contains(identifier) {
            return Err(self.error(span, format!("cyclic definition with `{identifier}`")));
        }
        if self.unchecked.contains_key(identifier) {
            self.check_definition(identifier)?;
            return Ok(Some(unwrap_using(self.globals[identifier].clone())));
        }
        Ok(None)
    }

    fn location(&self, span: Span) -> Location {
        Location::of(&self.origin, &self.contents, span.start as usize)
    }

    fn error(&self, span: Span, message: String) -> CoreError {
        CoreError::SemanticError {
            location: self.location(span),
            message,
        }
    }
}

fn unwrap_using(definition: Definition) -> Definition {
    match definition {
        Definition::Using(using) => *using.aliased,
        other => other,
    }
}

fn lower_binary_op(op: ast::BinaryOp) -> semantic::BinaryOp {
    match op {
        ast::BinaryOp::LogicalOr => semantic::BinaryOp::LogicalOr,
        ast::BinaryOp::LogicalAnd => semantic::BinaryOp::LogicalAnd,
        ast::BinaryOp::EqualTo => semantic::BinaryOp::EqualTo,
        ast::BinaryOp::NotEqualTo => semantic::BinaryOp::NotEqualTo,
        ast::BinaryOp::StrictlyEqualTo => semantic::BinaryOp::StrictlyEqualTo,
        ast::BinaryOp::LessThan => semantic::BinaryOp::LessThan,
        ast::BinaryOp::LessThanOrEqualTo => semantic::BinaryOp::LessThanOrEqualTo,
        ast::BinaryOp::GreaterThan => semantic::BinaryOp::GreaterThan,
        ast::BinaryOp::GreaterThanOrEqualTo => semantic::BinaryOp::GreaterThanOrEqualTo,
        ast::BinaryOp::BitwiseOr => semantic::BinaryOp::BitwiseOr,
        ast::BinaryOp::BitwiseXor => semantic::BinaryOp::BitwiseXor,
        ast::BinaryOp::BitwiseAnd => semantic::BinaryOp::BitwiseAnd,
        ast::BinaryOp::LeftShift => semantic::BinaryOp::LeftShift,
        ast::BinaryOp::RightShift => semantic::BinaryOp::RightShift,
        ast::BinaryOp::Addition => semantic::BinaryOp::Addition,
        ast::BinaryOp::Subtraction => semantic::BinaryOp::Subtraction,
        ast::BinaryOp::Multiplication => semantic::BinaryOp::Multiplication,
        ast::BinaryOp::Division => semantic::BinaryOp::Division,
        ast::BinaryOp::IntegerDivision => semantic::BinaryOp::IntegerDivision,
        ast::BinaryOp::Modulus => semantic::BinaryOp::Modulus,
    }
}

/// Promotion never changes its operand and checks to nothing.
fn lower_unary_op(op: ast::UnaryOp) -> Option<semantic::UnaryOp> {
    match op {
        ast::UnaryOp::Promotion => None,
        ast::UnaryOp::Negation => Some(semantic::UnaryOp::Negation),
        ast::UnaryOp::BitwiseNot => Some(semantic::UnaryOp::BitwiseNot),
        ast::UnaryOp::LogicalNot => Some(semantic::UnaryOp::LogicalNot),
    }
}

/// The number a known value acts as in arithmetic, if any.
fn numeric(known: &Known) -> Option<f64> {
    match known {
        Known::Number(value) => Some(*value),
        Known::True => Some(1.0),
        Known::False | Known::Null => Some(0.0),
        _ => None,
    }
}

fn truth(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Folds a binary operation on known operands the way the processor
/// would evaluate it: as 64-bit floats, cast to 64-bit integers for
/// the bitwise and shift operations.
fn fold_binary(op: semantic::BinaryOp, left: &Known, right: &Known) -> Option<Known> {
    let l = numeric(left)?;
    let r = numeric(right)?;
    let value = match op {
        semantic::BinaryOp::LogicalOr | semantic::BinaryOp::BitwiseOr => {
            ((l as i64) | (r as i64)) as f64
        }
        semantic::BinaryOp::LogicalAnd => truth(l != 0.0 && r != 0.0),
        semantic::BinaryOp::EqualTo | semantic::BinaryOp::StrictlyEqualTo => truth(l == r),
        semantic::BinaryOp::NotEqualTo => truth(l != r),
        semantic::BinaryOp::LessThan => truth(l < r),
        semantic::BinaryOp::LessThanOrEqualTo => truth(l <= r),
        semantic::BinaryOp::GreaterThan => truth(l > r),
        semantic::BinaryOp::GreaterThanOrEqualTo => truth(l >= r),
        semantic::BinaryOp::BitwiseXor => ((l as i64) ^ (r as i64)) as f64,
        semantic::BinaryOp::BitwiseAnd => ((l as i64) & (r as i64)) as f64,
        semantic::BinaryOp::LeftShift => (l as i64).wrapping_shl(r as i64 as u32) as f64,
        semantic::BinaryOp::RightShift => (l as i64).wrapping_shr(r as i64 as u32) as f64,
        semantic::BinaryOp::Addition => l + r,
        semantic::BinaryOp::Subtraction => l - r,
        semantic::BinaryOp::Multiplication => l * r,
        semantic::BinaryOp::Division => l / r,
        semantic::BinaryOp::IntegerDivision => (l / r).floor(),
        semantic::BinaryOp::Modulus => l % r,
    };
    Some(Known::Number(value))
}

fn fold_unary(op: semantic::UnaryOp, operand: &Known) -> Option<Known> {
    let value = numeric(operand)?;
    let value = match op {
        semantic::UnaryOp::Negation => -value,
        semantic::UnaryOp::BitwiseNot => !(value as i64) as f64,
        semantic::UnaryOp::LogicalNot => truth(value == 0.0),
    };
    Some(Known::Number(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::{Expression, Statement};
    use tempfile::TempDir;

    fn write_source(directory: &TempDir, name: &str, contents: &str) {
        let file = directory.path().join(format!("{name}{SOURCE_EXTENSION}"));
        std::fs::write(file, contents).expect("test source is written");
    }

    fn check_in(directory: &TempDir, name: &str) -> Result<Target, CoreError> {
        check(name, &[directory.path().to_path_buf()], None)
    }

    fn globals_of<'t>(target: &'t Target, source: &str) -> &'t BTreeMap<String, Definition> {
        &target.parcels[&target.name].sources[source].globals
    }

    #[test]
    fn constant_expressions_fold() {
        let directory = TempDir::new().expect("temp directory");
        write_source(
            &directory,
            "main",
            "const x = 1 + 2 * 3;\npublic const y = x;\n",
        );
        let target = check_in(&directory, "main").expect("main checks");
        let Definition::Const(y) = &globals_of(&target, "main")["y"] else {
            panic!("y is a constant");
        };
        assert_eq!(y.value, Known::Number(7.0));
    }

    #[test]
    fn definitions_can_reference_later_ones() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "const a = b * 2;\nconst b = 3;\n");
        let target = check_in(&directory, "main").expect("main checks");
        let Definition::Const(a) = &globals_of(&target, "main")["a"] else {
            panic!("a is a constant");
        };
        assert_eq!(a.value, Known::Number(6.0));
    }

    #[test]
    fn cyclic_definitions_in_one_file_are_reported() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "const a = b;\nconst b = a;\n");
        let error = check_in(&directory, "main").expect_err("cycle is fatal");
        assert!(error.to_string().contains("cyclic definition with `a`"));
    }

    #[test]
    fn cyclic_files_are_reported() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "a", "public const x = b::y;\n");
        write_source(&directory, "b", "public const y = a::x;\n");
        let error = check_in(&directory, "a").expect_err("cycle is fatal");
        assert!(error.to_string().contains("cyclic definition with `a`"));
    }

    #[test]
    fn shared_dependencies_are_checked_once() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "c", "public const k = 1;\nentrypoint { }\n");
        write_source(&directory, "a", "public const one = c::k;\n");
        write_source(&directory, "b", "public const two = c::k;\n");
        write_source(
            &directory,
            "main",
            "const both = a::one + b::two;\nentrypoint { }\n",
        );
        let target = check_in(&directory, "main").expect("main checks");
        let checked: Vec<&str> = target
            .entrypoints
            .iter()
            .map(|entrypoint| entrypoint.source.as_str())
            .collect();
        assert_eq!(checked, ["c", "main"]);
        let requested = target.requested_entrypoint().expect("main has one");
        assert_eq!(requested.source, "main");
    }

    #[test]
    fn aliases_resolve_to_the_aliased_definition() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "lib", "public const x = 1;\n");
        write_source(
            &directory,
            "main",
            "using lib::x as y;\nusing y as z;\nconst w = z + 0;\n",
        );
        let target = check_in(&directory, "main").expect("main checks");
        let globals = globals_of(&target, "main");
        let Definition::Using(z) = &globals["z"] else {
            panic!("z is an alias");
        };
        let Definition::Const(aliased) = z.aliased.as_ref() else {
            panic!("z aliases a constant");
        };
        assert_eq!(aliased.name, Name::new("lib", "x"));
        let Definition::Const(w) = &globals["w"] else {
            panic!("w is a constant");
        };
        assert_eq!(w.value, Known::Number(1.0));
    }

    #[test]
    fn private_definitions_are_invisible_to_other_files() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "lib", "const hidden = 5;\n");
        write_source(&directory, "main", "const v = lib::hidden;\n");
        let error = check_in(&directory, "main").expect_err("hidden is private");
        assert!(
            error
                .to_string()
                .contains("requested symbol `lib::hidden` is not visible")
        );
    }

    #[test]
    fn a_file_sees_its_own_private_definitions_qualified() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "const a = 1;\nconst b = main::a;\n");
        let target = check_in(&directory, "main").expect("main checks");
        let Definition::Const(b) = &globals_of(&target, "main")["b"] else {
            panic!("b is a constant");
        };
        assert_eq!(b.value, Known::Number(1.0));
    }

    #[test]
    fn missing_symbols_are_reported() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "lib", "public const x = 1;\n");
        write_source(&directory, "main", "const v = lib::nope;\n");
        let error = check_in(&directory, "main").expect_err("nope does not exist");
        assert!(
            error
                .to_string()
                .contains("could not find the symbol `lib::nope`")
        );
    }

    #[test]
    fn missing_files_name_the_searched_directories() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "const v = nowhere::x;\n");
        let error = check_in(&directory, "main").expect_err("nowhere does not exist");
        let CoreError::MissingSource { name, searched } = error else {
            panic!("missing source error");
        };
        assert_eq!(name, "nowhere");
        assert_eq!(searched, [directory.path().to_path_buf()]);
    }

    #[test]
    fn redeclarations_are_reported() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "const a = 1;\nvar a;\n");
        let error = check_in(&directory, "main").expect_err("a is declared twice");
        assert!(error.to_string().contains("redeclaration of `a`"));
    }

    #[test]
    fn the_entrypoint_cannot_return_a_value() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "entrypoint { return 1; }\n");
        let error = check_in(&directory, "main").expect_err("value return is fatal");
        assert!(
            error
                .to_string()
                .contains("the entrypoint cannot return a value")
        );
    }

    #[test]
    fn global_variables_need_known_initial_values() {
        let directory = TempDir::new().expect("temp directory");
        write_source(&directory, "main", "var g2;\nvar g = g2 + 1;\n");
        let error = check_in(&directory, "main").expect_err("initial value is not known");
        assert!(
            error
                .to_string()
                .contains("initial value of global variable `main::g` is not known at compile time")
        );
    }

    #[test]
    fn in_out_arguments_must_be_variables() {
        let directory = TempDir::new().expect("temp directory");
        write_source(
            &directory,
            "main",
            "proc bump(x&) { x += 1; }\nentrypoint { bump(3); }\n",
        );
        let error = check_in(&directory, "main").expect_err("literal argument is fatal");
        assert!(error.to_string().contains("must be a variable"));
    }

    #[test]
    fn sibling_branch_variables_get_distinct_registers() {
        let directory = TempDir::new().expect("temp directory");
        write_source(
            &directory,
            "main",
            "entrypoint { if 1 { var v = 1; } else { var v = 2; } }\n",
        );
        let target = check_in(&directory, "main").expect("main checks");
        let entrypoint = target.requested_entrypoint().expect("main has one");
        let Statement::Block(statements) = &entrypoint.body else {
            panic!("body is a block");
        };
        let Statement::If {
            true_branch,
            false_branch,
            ..
        } = &statements[0]
        else {
            panic!("first statement is an if");
        };
        let registers: Vec<&str> = [
            true_branch.as_ref(),
            false_branch.as_ref().expect("else branch").as_ref(),
        ]
        .into_iter()
        .map(|branch| {
            let Statement::Block(inner) = branch else {
                panic!("branch is a block");
            };
            let Statement::LocalVar(variable) = &inner[0] else {
                panic!("branch declares a variable");
            };
            variable.identifier.as_str()
        })
        .collect();
        assert_eq!(registers, ["v", "v_1"]);
    }

    #[test]
    fn built_in_symbols_resolve_without_qualification() {
        let directory = TempDir::new().expect("temp directory");
        write_source(
            &directory,
            "main",
            "const c = copper;\nentrypoint { print(\"hi\"); }\n",
        );
        let target = check_in(&directory, "main").expect("main checks");
        let Definition::Const(c) = &globals_of(&target, "main")["c"] else {
            panic!("c is a constant");
        };
        assert_eq!(c.value, Known::Builtin("copper".to_owned()));
        let entrypoint = target.requested_entrypoint().expect("main has one");
        let Statement::Block(statements) = &entrypoint.body else {
            panic!("body is a block");
        };
        let Statement::Affect(semantic::Affect::Discard(Expression::BuiltinCall {
            instruction,
            ..
        })) = &statements[0]
        else {
            panic!("first statement discards a built-in call");
        };
        assert_eq!(instruction, "print");
    }
}
