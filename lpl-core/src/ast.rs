//! Parse tree for LPL sources.
//!
//! The tree is immutable once built; every node owns its children
//! and carries the byte span it was parsed from, so any later stage
//! can point a diagnostic at it without re-walking tokens.

use crate::span::Span;

/// An identifier with the span it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub text: String,
    pub span: Span,
}

/// A reference to a symbol, optionally qualified by the file that
/// declares it: `[file::]identifier`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub source: Option<Identifier>,
    pub identifier: Identifier,
    pub span: Span,
}

/// One top-level construct of a source file.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Entrypoint(Statement),
    Definition(Definition),
}

/// A named top-level definition with its visibility.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub public: bool,
    pub kind: DefinitionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionKind {
    /// `link building [as alias];`, names a hardware handle.
    Link {
        building: Identifier,
        alias: Option<Identifier>,
    },
    /// `using mention [as alias];`, aliases another definition.
    Using {
        used: Mention,
        alias: Option<Identifier>,
    },
    /// `proc name(params) { … }`.
    Proc {
        identifier: Identifier,
        parameters: Vec<Parameter>,
        body: Statement,
    },
    /// `const name = value;`.
    Const {
        identifier: Identifier,
        value: Expression,
    },
    /// `var name [= initial];` at file level.
    GlobalVar {
        identifier: Identifier,
        initial: Option<Expression>,
    },
}

impl DefinitionKind {
    /// The identifier this definition is declared as: the alias when
    /// one is present, the base identifier otherwise.
    pub fn declared_name(&self) -> &Identifier {
        match self {
            DefinitionKind::Link { building, alias } => alias.as_ref().unwrap_or(building),
            DefinitionKind::Using { used, alias } => {
                alias.as_ref().unwrap_or(&used.identifier)
            }
            DefinitionKind::Proc { identifier, .. } => identifier,
            DefinitionKind::Const { identifier, .. } => identifier,
            DefinitionKind::GlobalVar { identifier, .. } => identifier,
        }
    }
}

/// A procedure parameter; `&` marks it as in-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub identifier: Identifier,
    pub in_out: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Block(Vec<Statement>),
    /// `if` with optional condition-scoped variable declarations.
    If {
        variables: Vec<LocalVar>,
        condition: Expression,
        true_branch: Box<Statement>,
        false_branch: Option<Box<Statement>>,
    },
    /// `[label:] while vars… condition [; interleaved] body`.
    While {
        label: Option<Identifier>,
        variables: Vec<LocalVar>,
        condition: Expression,
        interleaved: Option<Box<Affect>>,
        body: Box<Statement>,
    },
    Break {
        label: Option<Identifier>,
    },
    Continue {
        label: Option<Identifier>,
    },
    Return {
        value: Option<Expression>,
    },
    LocalVar(LocalVar),
    Affect(Affect),
}

/// `var name [= initial];` inside a callable body.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub identifier: Identifier,
    pub initial: Option<Expression>,
    pub span: Span,
}

/// A statement that changes state: one of the 14 trailing forms a
/// plain symbol access can take, or a discarded expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Affect {
    pub kind: AffectKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AffectKind {
    Increment(Mention),
    Decrement(Mention),
    Assign {
        target: Mention,
        source: Expression,
    },
    /// `target op= source` for the 11 compound operators.
    CompoundAssign {
        op: BinaryOp,
        target: Mention,
        source: Expression,
    },
    Discard(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Grouping(Box<Expression>),
    SymbolAccess(Mention),
    Call {
        callee: Mention,
        arguments: Vec<Expression>,
    },
    MemberAccess {
        object: Box<Expression>,
        member: Identifier,
    },
    MemberCall {
        object: Box<Expression>,
        member: Identifier,
        arguments: Vec<Expression>,
    },
    Number(f64),
    Color(u32),
    Str(String),
}

/// Binary operators, highest precedence level last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    LogicalOr,
    LogicalAnd,
    EqualTo,
    NotEqualTo,
    StrictlyEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    BitwiseOr,
    BitwiseXor,
    BitwiseAnd,
    LeftShift,
    RightShift,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    IntegerDivision,
    Modulus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Promotion,
    Negation,
    BitwiseNot,
    LogicalNot,
}
