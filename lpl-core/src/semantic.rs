//! Checked representation of a target.
//!
//! The semantic tree is what remains after name resolution and
//! constant folding: every mention has been replaced by the concrete
//! definition it refers to, every alias has been chased to its
//! target, and every compile-time-known value has been folded into a
//! [`Known`]. Nodes carry no spans; diagnostics are reported while
//! the tree is being built, never from the finished tree.

use std::collections::BTreeMap;
use std::fmt;

/// Name of the implicit source that holds the processor's built-in
/// definitions. A file with the same name on disk is shadowed by it.
pub const BUILT_IN_SOURCE: &str = "logic";

/// Qualified name of a global symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Name {
    pub source: String,
    pub identifier: String,
}

impl Name {
    pub fn new(source: impl Into<String>, identifier: impl Into<String>) -> Name {
        Name {
            source: source.into(),
            identifier: identifier.into(),
        }
    }

    /// Qualified name inside the built-in source.
    pub fn built_in(identifier: impl Into<String>) -> Name {
        Name::new(BUILT_IN_SOURCE, identifier)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.source, self.identifier)
    }
}

/// The whole compiled unit: every checked source reachable from the
/// requested one, plus the entrypoints that were found along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Name of the requested source.
    pub name: String,
    pub parcels: BTreeMap<String, Parcel>,
    /// Checked entrypoints in completion order; dependencies finish
    /// before their dependents, so the requested source's entrypoint
    /// is last when present.
    pub entrypoints: Vec<Entrypoint>,
}

impl Target {
    /// The entrypoint declared by the requested source, if any.
    pub fn requested_entrypoint(&self) -> Option<&Entrypoint> {
        self.entrypoints
            .iter()
            .find(|entrypoint| entrypoint.source == self.name)
    }

    /// Looks up a definition across all parcels.
    pub fn definition(&self, name: &Name) -> Option<&Definition> {
        self.parcels
            .values()
            .find_map(|parcel| parcel.sources.get(&name.source))
            .and_then(|source| source.globals.get(&name.identifier))
    }
}

/// An acyclic group of sources compiled together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parcel {
    pub sources: BTreeMap<String, Source>,
}

/// One checked source file: its global definitions by identifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Source {
    pub globals: BTreeMap<String, Definition>,
}

/// First statements executed by the processor, tagged with the
/// source that declared them.
#[derive(Debug, Clone, PartialEq)]
pub struct Entrypoint {
    pub source: String,
    pub body: Statement,
}

/// A checked global definition.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Link(Link),
    Using(Using),
    Proc(Proc),
    Const(Const),
    GlobalVar(GlobalVar),
    Keyword(Keyword),
    BuiltinConstant(BuiltinConstant),
    BuiltinProcedure(BuiltinProcedure),
}

impl Definition {
    pub fn name(&self) -> &Name {
        match self {
            Definition::Link(definition) => &definition.name,
            Definition::Using(definition) => &definition.name,
            Definition::Proc(definition) => &definition.name,
            Definition::Const(definition) => &definition.name,
            Definition::GlobalVar(definition) => &definition.name,
            Definition::Keyword(definition) => &definition.name,
            Definition::BuiltinConstant(definition) => &definition.name,
            Definition::BuiltinProcedure(definition) => &definition.name,
        }
    }

    /// Whether the definition can be referred to from another source.
    /// Built-in definitions are visible everywhere.
    pub fn visible(&self) -> bool {
        match self {
            Definition::Link(definition) => definition.visible,
            Definition::Using(definition) => definition.visible,
            Definition::Proc(definition) => definition.visible,
            Definition::Const(definition) => definition.visible,
            Definition::GlobalVar(definition) => definition.visible,
            Definition::Keyword(_)
            | Definition::BuiltinConstant(_)
            | Definition::BuiltinProcedure(_) => true,
        }
    }
}

/// Alias to a hardware handle on the processor.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: Name,
    pub visible: bool,
    /// Identifier of the linked building as the processor knows it.
    pub building: String,
}

/// Alias to another definition. `aliased` is always the concrete
/// target; chains of aliases collapse when the alias is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Using {
    pub name: Name,
    pub visible: bool,
    pub aliased: Box<Definition>,
}

/// A callable body. Calls are inlined; there is no frame or stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Proc {
    pub name: Name,
    pub visible: bool,
    pub parameters: Vec<Parameter>,
    pub body: Statement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub identifier: String,
    /// In-out parameters copy back to the argument after the body.
    pub in_out: bool,
}

/// A compile-time-known value bound to a name.
#[derive(Debug, Clone, PartialEq)]
pub struct Const {
    pub name: Name,
    pub visible: bool,
    pub value: Known,
}

/// A mutable register named after the definition.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVar {
    pub name: Name,
    pub visible: bool,
    /// Initial value, set once before the entrypoint body runs.
    pub initial: Option<Known>,
}

/// One of the literal keywords `false`, `true` or `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: Name,
    pub value: Known,
}

/// A named constant of the processor, such as an item, a building
/// type or a sensible property.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinConstant {
    pub name: Name,
    /// Name of the constant as the processor spells it; rendered
    /// with a leading `@`.
    pub property: String,
}

/// A procedure that expands to one processor instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinProcedure {
    pub name: Name,
    /// Instruction text the call expands to, including any fixed
    /// subinstruction words.
    pub instruction: String,
    /// Fixed argument inserted after the first call argument, for
    /// instructions whose operand lists carry a placeholder.
    pub dummy: Option<String>,
    pub parameters: u32,
}

/// Values known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum Known {
    False,
    True,
    Null,
    Number(f64),
    Color(u32),
    Str(String),
    /// A processor constant; rendered with a leading `@`.
    Builtin(String),
}

/// Checked statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Block(Vec<Statement>),
    If {
        variables: Vec<LocalVar>,
        condition: Expression,
        true_branch: Box<Statement>,
        false_branch: Option<Box<Statement>>,
    },
    While {
        label: Option<String>,
        variables: Vec<LocalVar>,
        condition: Expression,
        interleaved: Option<Affect>,
        body: Box<Statement>,
    },
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    Return {
        value: Option<Expression>,
    },
    LocalVar(LocalVar),
    Affect(Affect),
}

/// A local variable declaration. The identifier is the variable's
/// register identifier, unique for the whole enclosing callable even
/// when source-level names collide across sibling branches.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub identifier: String,
    pub initial: Option<Expression>,
}

/// A mutable storage location an affect can write to.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Global(Name),
    Local(String),
}

/// Statements whose whole purpose is their side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Affect {
    Increment(Place),
    Decrement(Place),
    Assign {
        target: Place,
        source: Expression,
    },
    CompoundAssign {
        op: BinaryOp,
        target: Place,
        source: Expression,
    },
    Discard(Expression),
}

/// Checked expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Known(Known),
    GlobalAccess(Name),
    LocalAccess(String),
    /// Read of a linked building's handle.
    LinkAccess(String),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    /// Call of a user procedure, inlined when built. Arguments in
    /// in-out positions are places, checked to be assignable.
    ProcedureCall {
        procedure: Name,
        arguments: Vec<Argument>,
    },
    /// Call of a built-in procedure; expands to one instruction and
    /// evaluates to null when used for its value.
    BuiltinCall {
        instruction: String,
        dummy: Option<String>,
        arguments: Vec<Expression>,
    },
    /// Read of a processor property off a value, `object.property`.
    PropertyRead {
        object: Box<Expression>,
        property: String,
    },
}

/// One argument of a user procedure call.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Expression),
    /// Argument to an in-out parameter; the parameter copies back
    /// into the place when the callee finishes.
    Reference(Place),
}

/// Binary operators surviving into the checked tree.
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

/// Unary operators surviving into the checked tree. Promotion is
/// dropped when checked; it never changes the operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negation,
    BitwiseNot,
    LogicalNot,
}
