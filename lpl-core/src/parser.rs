//! Parser for LPL sources.
//!
//! Every parse function follows one contract: if the construct does
//! not begin at the cursor, the cursor is restored and `Ok(None)` is
//! returned so the caller can try an alternative. Once a construct
//! has visibly begun, a missing required token is a fatal
//! `ParseError` naming the expected construct and the offending
//! token; no partial tree is ever produced.

use crate::ast::{
    Affect, AffectKind, BinaryOp, Declaration, Definition, DefinitionKind, Expression,
    ExpressionKind, Identifier, LocalVar, Mention, Parameter, Statement, StatementKind, UnaryOp,
};
use crate::error::{CoreError, Location};
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

/// Binary operators by precedence level, outermost first. Each level
/// folds left to right over operands of the next level down.
const BINARY_LEVELS: &[&[(TokenKind, BinaryOp, &str)]] = &[
    &[(TokenKind::PipePipe, BinaryOp::LogicalOr, "logical or")],
    &[(TokenKind::AmpAmp, BinaryOp::LogicalAnd, "logical and")],
    &[
        (TokenKind::EqEq, BinaryOp::EqualTo, "equal to"),
        (TokenKind::BangEq, BinaryOp::NotEqualTo, "not equal to"),
        (TokenKind::EqEqEq, BinaryOp::StrictlyEqualTo, "strictly equal to"),
    ],
    &[
        (TokenKind::Lt, BinaryOp::LessThan, "less than"),
        (TokenKind::LtEq, BinaryOp::LessThanOrEqualTo, "less than or equal to"),
        (TokenKind::Gt, BinaryOp::GreaterThan, "greater than"),
        (
            TokenKind::GtEq,
            BinaryOp::GreaterThanOrEqualTo,
            "greater than or equal to",
        ),
    ],
    &[(TokenKind::Pipe, BinaryOp::BitwiseOr, "bitwise or")],
    &[(TokenKind::Caret, BinaryOp::BitwiseXor, "bitwise xor")],
    &[(TokenKind::Amp, BinaryOp::BitwiseAnd, "bitwise and")],
    &[
        (TokenKind::Shl, BinaryOp::LeftShift, "left shift"),
        (TokenKind::Shr, BinaryOp::RightShift, "right shift"),
    ],
    &[
        (TokenKind::Plus, BinaryOp::Addition, "addition"),
        (TokenKind::Minus, BinaryOp::Subtraction, "subtraction"),
    ],
    &[
        (TokenKind::Star, BinaryOp::Multiplication, "multiplication"),
        (TokenKind::Slash, BinaryOp::Division, "division"),
        (TokenKind::SlashSlash, BinaryOp::IntegerDivision, "integer division"),
        (TokenKind::Percent, BinaryOp::Modulus, "modulus"),
    ],
];

/// Prefix operators; all share the single unary level.
const UNARY_OPS: &[(TokenKind, UnaryOp, &str)] = &[
    (TokenKind::Plus, UnaryOp::Promotion, "promotion"),
    (TokenKind::Minus, UnaryOp::Negation, "negation"),
    (TokenKind::Tilde, UnaryOp::BitwiseNot, "bitwise not"),
    (TokenKind::Bang, UnaryOp::LogicalNot, "logical not"),
];

/// The 14 trailing forms a plain symbol access can take as a
/// statement. `None` is direct assignment; increment and decrement
/// are handled separately.
const ASSIGNMENT_OPS: &[(TokenKind, Option<BinaryOp>, &str)] = &[
    (TokenKind::Equal, None, "assign"),
    (TokenKind::StarEq, Some(BinaryOp::Multiplication), "multiply assign"),
    (TokenKind::SlashEq, Some(BinaryOp::Division), "divide assign"),
    (
        TokenKind::SlashSlashEq,
        Some(BinaryOp::IntegerDivision),
        "divide integer assign",
    ),
    (TokenKind::PercentEq, Some(BinaryOp::Modulus), "modulus assign"),
    (TokenKind::PlusEq, Some(BinaryOp::Addition), "add assign"),
    (TokenKind::MinusEq, Some(BinaryOp::Subtraction), "subtract assign"),
    (TokenKind::ShlEq, Some(BinaryOp::LeftShift), "shift left assign"),
    (TokenKind::ShrEq, Some(BinaryOp::RightShift), "shift right assign"),
    (TokenKind::AmpEq, Some(BinaryOp::BitwiseAnd), "and bitwise assign"),
    (TokenKind::CaretEq, Some(BinaryOp::BitwiseXor), "xor bitwise assign"),
    (TokenKind::PipeEq, Some(BinaryOp::BitwiseOr), "or bitwise assign"),
];

/// Parse one source file's tokens into its declarations.
pub fn parse(
    source: &str,
    contents: &str,
    tokens: &[Token],
) -> Result<Vec<Declaration>, CoreError> {
    let mut parser = Parser {
        source,
        contents,
        tokens,
        current: 0,
    };
    parser.run()
}

struct Parser<'src> {
    source: &'src str,
    contents: &'src str,
    tokens: &'src [Token],
    current: usize,
}

impl<'src> Parser<'src> {
    fn run(&mut self) -> Result<Vec<Declaration>, CoreError> {
        let mut declarations = Vec::new();
        while self.current < self.tokens.len() {
            let declaration = self.expect(Self::parse_declaration, "a declaration")?;
            declarations.push(declaration);
        }
        Ok(declarations)
    }

    // --- Declarations ---

    fn parse_declaration(&mut self) -> Result<Option<Declaration>, CoreError> {
        self.first_of(&[Self::parse_entrypoint, Self::parse_definition])
    }

    fn parse_entrypoint(&mut self) -> Result<Option<Declaration>, CoreError> {
        if self.parse_exact(&TokenKind::Entrypoint).is_none() {
            return Ok(None);
        }
        let body = self.expect(Self::parse_block, "body of the entrypoint declaration")?;
        Ok(Some(Declaration::Entrypoint(body)))
    }

    fn parse_definition(&mut self) -> Result<Option<Declaration>, CoreError> {
        let public = self.parse_exact(&TokenKind::Public);
        let kind = if public.is_some() {
            Some(self.expect(Self::parse_definition_kind, "a definition")?)
        } else {
            self.parse_definition_kind()?
        };
        let Some((kind, kind_span)) = kind else {
            return Ok(None);
        };
        let span = match public {
            Some(modifier) => modifier.merge(kind_span),
            None => kind_span,
        };
        Ok(Some(Declaration::Definition(Definition {
            public: public.is_some(),
            kind,
            span,
        })))
    }

    fn parse_definition_kind(&mut self) -> Result<Option<(DefinitionKind, Span)>, CoreError> {
        self.first_of(&[
            Self::parse_link,
            Self::parse_using,
            Self::parse_proc,
            Self::parse_const,
            Self::parse_global_var,
        ])
    }

    fn parse_link(&mut self) -> Result<Option<(DefinitionKind, Span)>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Link) else {
            return Ok(None);
        };
        let building = self.expect_identifier("building name of the link definition")?;
        let alias = if self.parse_exact(&TokenKind::As).is_some() {
            Some(self.expect_identifier("alias identifier of the link definition")?)
        } else {
            None
        };
        let end = self.expect_exact(TokenKind::Semi, "terminator `;` of the link definition")?;
        Ok(Some((DefinitionKind::Link { building, alias }, start.merge(end))))
    }

    fn parse_using(&mut self) -> Result<Option<(DefinitionKind, Span)>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Using) else {
            return Ok(None);
        };
        let used = self.expect(Self::parse_mention, "used symbol of the alias definition")?;
        let alias = if self.parse_exact(&TokenKind::As).is_some() {
            Some(self.expect_identifier("alias identifier of the alias definition")?)
        } else {
            None
        };
        let end = self.expect_exact(TokenKind::Semi, "terminator `;` of the alias definition")?;
        Ok(Some((DefinitionKind::Using { used, alias }, start.merge(end))))
    }

    fn parse_proc(&mut self) -> Result<Option<(DefinitionKind, Span)>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Proc) else {
            return Ok(None);
        };
        let identifier = self.expect_identifier("identifier of the procedure declaration")?;
        self.expect_exact(
            TokenKind::LParen,
            "parameter list opener `(` of the procedure declaration",
        )?;
        let parameters = self.separated(Self::parse_parameter)?;
        self.expect_exact(
            TokenKind::RParen,
            "parameter list closer `)` of the procedure declaration",
        )?;
        let body = self.expect(Self::parse_block, "body of the procedure declaration")?;
        let span = start.merge(body.span);
        Ok(Some((
            DefinitionKind::Proc {
                identifier,
                parameters,
                body,
            },
            span,
        )))
    }

    fn parse_parameter(&mut self) -> Result<Option<Parameter>, CoreError> {
        let Some(identifier) = self.parse_identifier() else {
            return Ok(None);
        };
        let in_out = self.parse_exact(&TokenKind::Amp).is_some();
        Ok(Some(Parameter { identifier, in_out }))
    }

    fn parse_const(&mut self) -> Result<Option<(DefinitionKind, Span)>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Const) else {
            return Ok(None);
        };
        let identifier = self.expect_identifier("identifier of the constant declaration")?;
        self.expect_exact(
            TokenKind::Equal,
            "value separator `=` of the constant declaration",
        )?;
        let value = self.expect(Self::parse_expression, "value of the constant declaration")?;
        let end = self.expect_exact(
            TokenKind::Semi,
            "terminator `;` of the constant declaration",
        )?;
        Ok(Some((DefinitionKind::Const { identifier, value }, start.merge(end))))
    }

    fn parse_global_var(&mut self) -> Result<Option<(DefinitionKind, Span)>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Var) else {
            return Ok(None);
        };
        let identifier =
            self.expect_identifier("identifier of the global variable declaration")?;
        let initial = if self.parse_exact(&TokenKind::Equal).is_some() {
            Some(self.expect(
                Self::parse_expression,
                "initial value of the global variable declaration",
            )?)
        } else {
            None
        };
        let end = self.expect_exact(
            TokenKind::Semi,
            "terminator `;` of the global variable declaration",
        )?;
        Ok(Some((
            DefinitionKind::GlobalVar { identifier, initial },
            start.merge(end),
        )))
    }

    // --- Statements ---

    fn parse_statement(&mut self) -> Result<Option<Statement>, CoreError> {
        self.first_of(&[
            Self::parse_block,
            Self::parse_if,
            Self::parse_while,
            Self::parse_break,
            Self::parse_continue,
            Self::parse_return,
            Self::parse_local_var,
            Self::parse_affect_statement,
        ])
    }

    fn parse_block(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::LBrace) else {
            return Ok(None);
        };
        let inner = self.zero_or_more(Self::parse_statement)?;
        let end = self.expect_exact(
            TokenKind::RBrace,
            "inner statement list closer `}` of the block statement",
        )?;
        Ok(Some(Statement {
            kind: StatementKind::Block(inner),
            span: start.merge(end),
        }))
    }

    fn parse_if(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::If) else {
            return Ok(None);
        };
        let variables = self.zero_or_more(Self::parse_local_var_declaration)?;
        let condition = self.expect(Self::parse_expression, "condition of the if statement")?;
        let true_branch = self.expect(Self::parse_block, "true branch of the if statement")?;
        let mut span = start.merge(true_branch.span);
        let false_branch = if self.parse_exact(&TokenKind::Else).is_some() {
            let branch = self.expect(
                |parser: &mut Self| parser.first_of(&[Self::parse_block, Self::parse_if]),
                "false branch of the if statement",
            )?;
            span = span.merge(branch.span);
            Some(Box::new(branch))
        } else {
            None
        };
        Ok(Some(Statement {
            kind: StatementKind::If {
                variables,
                condition,
                true_branch: Box::new(true_branch),
                false_branch,
            },
            span,
        }))
    }

    fn parse_while(&mut self) -> Result<Option<Statement>, CoreError> {
        let first = self.current;
        let mut label = None;
        if let Some(identifier) = self.parse_identifier() {
            if self.parse_exact(&TokenKind::Colon).is_some() {
                label = Some(identifier);
            } else {
                self.current = first;
            }
        }
        let Some(keyword) = self.parse_exact(&TokenKind::While) else {
            self.current = first;
            return Ok(None);
        };
        let variables = self.zero_or_more(Self::parse_local_var_declaration)?;
        let condition = self.expect(Self::parse_expression, "condition of the while statement")?;
        let interleaved = if self.parse_exact(&TokenKind::Semi).is_some() {
            Some(Box::new(self.expect(
                Self::parse_unterminated_affect,
                "interleaved of the while statement",
            )?))
        } else {
            None
        };
        let body = self.expect(Self::parse_statement, "loop of the while statement")?;
        let start = match &label {
            Some(identifier) => identifier.span,
            None => keyword,
        };
        let span = start.merge(body.span);
        Ok(Some(Statement {
            kind: StatementKind::While {
                label,
                variables,
                condition,
                interleaved,
                body: Box::new(body),
            },
            span,
        }))
    }

    fn parse_break(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Break) else {
            return Ok(None);
        };
        let label = self.parse_identifier();
        let end = self.expect_exact(TokenKind::Semi, "terminator `;` of the break statement")?;
        Ok(Some(Statement {
            kind: StatementKind::Break { label },
            span: start.merge(end),
        }))
    }

    fn parse_continue(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Continue) else {
            return Ok(None);
        };
        let label = self.parse_identifier();
        let end =
            self.expect_exact(TokenKind::Semi, "terminator `;` of the continue statement")?;
        Ok(Some(Statement {
            kind: StatementKind::Continue { label },
            span: start.merge(end),
        }))
    }

    fn parse_return(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Return) else {
            return Ok(None);
        };
        let value = self.parse_expression()?;
        let end = self.expect_exact(TokenKind::Semi, "terminator `;` of the return statement")?;
        Ok(Some(Statement {
            kind: StatementKind::Return { value },
            span: start.merge(end),
        }))
    }

    fn parse_local_var(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(declaration) = self.parse_local_var_declaration()? else {
            return Ok(None);
        };
        let span = declaration.span;
        Ok(Some(Statement {
            kind: StatementKind::LocalVar(declaration),
            span,
        }))
    }

    fn parse_local_var_declaration(&mut self) -> Result<Option<LocalVar>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::Var) else {
            return Ok(None);
        };
        let identifier = self.expect_identifier("identifier of the local variable declaration")?;
        let initial = if self.parse_exact(&TokenKind::Equal).is_some() {
            Some(self.expect(
                Self::parse_expression,
                "initial value of the local variable declaration",
            )?)
        } else {
            None
        };
        let end = self.expect_exact(
            TokenKind::Semi,
            "terminator `;` of the local variable declaration",
        )?;
        Ok(Some(LocalVar {
            identifier,
            initial,
            span: start.merge(end),
        }))
    }

    fn parse_affect_statement(&mut self) -> Result<Option<Statement>, CoreError> {
        let Some(affect) = self.parse_unterminated_affect()? else {
            return Ok(None);
        };
        let end = self.expect_exact(
            TokenKind::Semi,
            &format!("terminator `;` of the {} statement", affect.kind.statement_name()),
        )?;
        let span = affect.span.merge(end);
        Ok(Some(Statement {
            kind: StatementKind::Affect(affect),
            span,
        }))
    }

    /// Parses an affect without its terminator. An expression is
    /// parsed first; only when it turns out to be a plain symbol
    /// access are the trailing assignment forms considered.
    fn parse_unterminated_affect(&mut self) -> Result<Option<Affect>, CoreError> {
        let Some(expression) = self.parse_expression()? else {
            return Ok(None);
        };
        if let ExpressionKind::SymbolAccess(target) = &expression.kind {
            let target = target.clone();
            for (token, op, name) in ASSIGNMENT_OPS {
                if self.parse_exact(token).is_none() {
                    continue;
                }
                let source =
                    self.expect(Self::parse_expression, &format!("source of the {name} statement"))?;
                let span = target.span.merge(source.span);
                let kind = match op {
                    None => AffectKind::Assign { target, source },
                    Some(op) => AffectKind::CompoundAssign {
                        op: *op,
                        target,
                        source,
                    },
                };
                return Ok(Some(Affect { kind, span }));
            }
            if let Some(end) = self.parse_exact(&TokenKind::PlusPlus) {
                let span = target.span.merge(end);
                return Ok(Some(Affect {
                    kind: AffectKind::Increment(target),
                    span,
                }));
            }
            if let Some(end) = self.parse_exact(&TokenKind::MinusMinus) {
                let span = target.span.merge(end);
                return Ok(Some(Affect {
                    kind: AffectKind::Decrement(target),
                    span,
                }));
            }
        }
        let span = expression.span;
        Ok(Some(Affect {
            kind: AffectKind::Discard(expression),
            span,
        }))
    }

    // --- Expressions ---

    fn parse_expression(&mut self) -> Result<Option<Expression>, CoreError> {
        self.parse_binary_level(0)
    }

    fn parse_binary_level(&mut self, level: usize) -> Result<Option<Expression>, CoreError> {
        if level == BINARY_LEVELS.len() {
            return self.parse_unary();
        }
        let Some(mut result) = self.parse_binary_level(level + 1)? else {
            return Ok(None);
        };
        'fold: loop {
            for (token, op, name) in BINARY_LEVELS[level] {
                if self.parse_exact(token).is_none() {
                    continue;
                }
                let right = self.expect(
                    |parser: &mut Self| parser.parse_binary_level(level + 1),
                    &format!("right operand of {name} expression"),
                )?;
                let span = result.span.merge(right.span);
                result = Expression {
                    kind: ExpressionKind::Binary {
                        op: *op,
                        left: Box::new(result),
                        right: Box::new(right),
                    },
                    span,
                };
                continue 'fold;
            }
            break;
        }
        Ok(Some(result))
    }

    fn parse_unary(&mut self) -> Result<Option<Expression>, CoreError> {
        let mut stack: Vec<(UnaryOp, Span)> = Vec::new();
        let mut innermost_name = "";
        'collect: loop {
            for (token, op, name) in UNARY_OPS {
                if let Some(span) = self.parse_exact(token) {
                    stack.push((*op, span));
                    innermost_name = name;
                    continue 'collect;
                }
            }
            break;
        }
        if stack.is_empty() {
            return self.parse_postfix();
        }
        let mut result = self.expect(
            Self::parse_postfix,
            &format!("operand of {innermost_name} expression"),
        )?;
        for (op, span) in stack.into_iter().rev() {
            let merged = span.merge(result.span);
            result = Expression {
                kind: ExpressionKind::Unary {
                    op,
                    operand: Box::new(result),
                },
                span: merged,
            };
        }
        Ok(Some(result))
    }

    /// Level 0: a primary followed by a chain of member accesses and
    /// member calls.
    fn parse_postfix(&mut self) -> Result<Option<Expression>, CoreError> {
        let primary = self.first_of(&[
            Self::parse_grouping,
            Self::parse_symbol_based,
            Self::parse_literal,
        ])?;
        let Some(mut result) = primary else {
            return Ok(None);
        };
        while self.parse_exact(&TokenKind::Dot).is_some() {
            let member = self.expect_identifier("member name in the member access expression")?;
            if self.parse_exact(&TokenKind::LParen).is_some() {
                let arguments = self.separated(Self::parse_expression)?;
                let end = self.expect_exact(
                    TokenKind::RParen,
                    "remaining argument list closer `)` of the member call expression",
                )?;
                let span = result.span.merge(end);
                result = Expression {
                    kind: ExpressionKind::MemberCall {
                        object: Box::new(result),
                        member,
                        arguments,
                    },
                    span,
                };
            } else {
                let span = result.span.merge(member.span);
                result = Expression {
                    kind: ExpressionKind::MemberAccess {
                        object: Box::new(result),
                        member,
                    },
                    span,
                };
            }
        }
        Ok(Some(result))
    }

    fn parse_grouping(&mut self) -> Result<Option<Expression>, CoreError> {
        let Some(start) = self.parse_exact(&TokenKind::LParen) else {
            return Ok(None);
        };
        let grouped = self.expect(
            Self::parse_expression,
            "grouped expression of the grouping expression",
        )?;
        let end = self.expect_exact(TokenKind::RParen, "closer `)` of the grouping expression")?;
        Ok(Some(Expression {
            kind: ExpressionKind::Grouping(Box::new(grouped)),
            span: start.merge(end),
        }))
    }

    fn parse_symbol_based(&mut self) -> Result<Option<Expression>, CoreError> {
        let Some(mention) = self.parse_mention()? else {
            return Ok(None);
        };
        if self.parse_exact(&TokenKind::LParen).is_some() {
            let arguments = self.separated(Self::parse_expression)?;
            let end = self.expect_exact(
                TokenKind::RParen,
                "argument list closer `)` of the call expression",
            )?;
            let span = mention.span.merge(end);
            return Ok(Some(Expression {
                kind: ExpressionKind::Call {
                    callee: mention,
                    arguments,
                },
                span,
            }));
        }
        let span = mention.span;
        Ok(Some(Expression {
            kind: ExpressionKind::SymbolAccess(mention),
            span,
        }))
    }

    fn parse_literal(&mut self) -> Result<Option<Expression>, CoreError> {
        let Some(token) = self.tokens.get(self.current) else {
            return Ok(None);
        };
        let kind = match &token.kind {
            TokenKind::Number(value) => ExpressionKind::Number(*value),
            TokenKind::Color(value) => ExpressionKind::Color(*value),
            TokenKind::Str(text) => ExpressionKind::Str(text.clone()),
            _ => return Ok(None),
        };
        let span = token.span;
        self.current += 1;
        Ok(Some(Expression { kind, span }))
    }

    fn parse_mention(&mut self) -> Result<Option<Mention>, CoreError> {
        if let Some(scope) = self.parse_scope() {
            let identifier = self.expect_identifier("identifier of the qualified mention")?;
            let span = scope.span.merge(identifier.span);
            return Ok(Some(Mention {
                source: Some(scope),
                identifier,
                span,
            }));
        }
        let Some(identifier) = self.parse_identifier() else {
            return Ok(None);
        };
        let span = identifier.span;
        Ok(Some(Mention {
            source: None,
            identifier,
            span,
        }))
    }

    /// The qualifying file of a mention: an identifier that is only
    /// kept when a `::` follows it.
    fn parse_scope(&mut self) -> Option<Identifier> {
        let first = self.current;
        let scope = self.parse_identifier()?;
        if self.parse_exact(&TokenKind::DoubleColon).is_none() {
            self.current = first;
            return None;
        }
        Some(scope)
    }

    // --- Combinators ---

    /// Returns the first construct that successfully parses out of
    /// the given alternatives.
    fn first_of<T>(
        &mut self,
        alternatives: &[fn(&mut Self) -> Result<Option<T>, CoreError>],
    ) -> Result<Option<T>, CoreError> {
        for parse in alternatives {
            if let Some(construct) = parse(self)? {
                return Ok(Some(construct));
            }
        }
        Ok(None)
    }

    fn zero_or_more<T>(
        &mut self,
        parse: fn(&mut Self) -> Result<Option<T>, CoreError>,
    ) -> Result<Vec<T>, CoreError> {
        let mut constructs = Vec::new();
        while let Some(construct) = parse(self)? {
            constructs.push(construct);
        }
        Ok(constructs)
    }

    /// Comma-separated repetition; a trailing comma is allowed.
    fn separated<T>(
        &mut self,
        parse: fn(&mut Self) -> Result<Option<T>, CoreError>,
    ) -> Result<Vec<T>, CoreError> {
        let mut constructs = Vec::new();
        while let Some(construct) = parse(self)? {
            constructs.push(construct);
            if self.parse_exact(&TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(constructs)
    }

    fn expect<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<Option<T>, CoreError>,
        construct: &str,
    ) -> Result<T, CoreError> {
        match parse(self)? {
            Some(parsed) => Ok(parsed),
            None => Err(self.expectation_error(construct)),
        }
    }

    fn expect_exact(&mut self, kind: TokenKind, construct: &str) -> Result<Span, CoreError> {
        match self.parse_exact(&kind) {
            Some(span) => Ok(span),
            None => Err(self.expectation_error(construct)),
        }
    }

    fn expect_identifier(&mut self, construct: &str) -> Result<Identifier, CoreError> {
        match self.parse_identifier() {
            Some(identifier) => Ok(identifier),
            None => Err(self.expectation_error(construct)),
        }
    }

    /// Consumes the next token when it is exactly `kind`.
    fn parse_exact(&mut self, kind: &TokenKind) -> Option<Span> {
        let token = self.tokens.get(self.current)?;
        if token.kind != *kind {
            return None;
        }
        let span = token.span;
        self.current += 1;
        Some(span)
    }

    fn parse_identifier(&mut self) -> Option<Identifier> {
        let token = self.tokens.get(self.current)?;
        let TokenKind::Ident(text) = &token.kind else {
            return None;
        };
        let identifier = Identifier {
            text: text.clone(),
            span: token.span,
        };
        self.current += 1;
        Some(identifier)
    }

    fn expectation_error(&self, construct: &str) -> CoreError {
        if let Some(offending) = self.tokens.get(self.current) {
            return CoreError::ParseError {
                location: Location::of(self.source, self.contents, offending.span.start as usize),
                message: format!(
                    "expected {construct} instead of {}",
                    offending.kind.description()
                ),
            };
        }
        let (offset, message) = match self.tokens.last() {
            Some(last) => (
                last.span.start as usize,
                format!(
                    "expected {construct} at the end of the file after {}",
                    last.kind.description()
                ),
            ),
            None => (
                self.contents.len(),
                format!("expected {construct} at the end of the file"),
            ),
        };
        CoreError::ParseError {
            location: Location::of(self.source, self.contents, offset),
            message,
        }
    }
}

impl AffectKind {
    /// Name used when reporting the statement's missing terminator.
    fn statement_name(&self) -> &'static str {
        match self {
            AffectKind::Increment(_) => "increment",
            AffectKind::Decrement(_) => "decrement",
            AffectKind::Assign { .. } => "assign",
            AffectKind::CompoundAssign { op, .. } => match op {
                BinaryOp::Multiplication => "multiply assign",
                BinaryOp::Division => "divide assign",
                BinaryOp::IntegerDivision => "divide integer assign",
                BinaryOp::Modulus => "modulus assign",
                BinaryOp::Addition => "add assign",
                BinaryOp::Subtraction => "subtract assign",
                BinaryOp::LeftShift => "shift left assign",
                BinaryOp::RightShift => "shift right assign",
                BinaryOp::BitwiseAnd => "and bitwise assign",
                BinaryOp::BitwiseXor => "xor bitwise assign",
                BinaryOp::BitwiseOr => "or bitwise assign",
                _ => "assign",
            },
            AffectKind::Discard(_) => "discard",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_source(contents: &str) -> Result<Vec<Declaration>, CoreError> {
        let tokens = lex("test.lpl", contents).expect("lex");
        parse("test.lpl", contents, &tokens)
    }

    fn entrypoint_statements(contents: &str) -> Vec<Statement> {
        let declarations = parse_source(contents).expect("parse");
        for declaration in declarations {
            if let Declaration::Entrypoint(body) = declaration {
                if let StatementKind::Block(inner) = body.kind {
                    return inner;
                }
            }
        }
        panic!("no entrypoint in test source");
    }

    fn single_expression(contents: &str) -> Expression {
        let source = format!("entrypoint {{ {contents}; }}");
        let mut statements = entrypoint_statements(&source);
        assert_eq!(statements.len(), 1);
        match statements.remove(0).kind {
            StatementKind::Affect(Affect {
                kind: AffectKind::Discard(expression),
                ..
            }) => expression,
            other => panic!("expected a discarded expression, got {other:?}"),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expression = single_expression("1 + 2 * 3");
        match expression.kind {
            ExpressionKind::Binary {
                op: BinaryOp::Addition,
                left,
                right,
            } => {
                assert!(matches!(left.kind, ExpressionKind::Number(value) if value == 1.0));
                assert!(matches!(
                    right.kind,
                    ExpressionKind::Binary {
                        op: BinaryOp::Multiplication,
                        ..
                    }
                ));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn same_level_operators_fold_left() {
        let expression = single_expression("10 - 2 - 3");
        match expression.kind {
            ExpressionKind::Binary {
                op: BinaryOp::Subtraction,
                left,
                right,
            } => {
                assert!(matches!(
                    left.kind,
                    ExpressionKind::Binary {
                        op: BinaryOp::Subtraction,
                        ..
                    }
                ));
                assert!(matches!(right.kind, ExpressionKind::Number(value) if value == 3.0));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn prefix_operators_apply_outward_in() {
        let expression = single_expression("-~x");
        match expression.kind {
            ExpressionKind::Unary {
                op: UnaryOp::Negation,
                operand,
            } => assert!(matches!(
                operand.kind,
                ExpressionKind::Unary {
                    op: UnaryOp::BitwiseNot,
                    ..
                }
            )),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn member_chain_folds_left_to_right() {
        let expression = single_expression("cell.block.size(1)");
        match expression.kind {
            ExpressionKind::MemberCall {
                object, member, ..
            } => {
                assert_eq!(member.text, "size");
                assert!(matches!(object.kind, ExpressionKind::MemberAccess { .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn qualified_mention_requires_double_colon() {
        let expression = single_expression("tools::helper");
        match expression.kind {
            ExpressionKind::SymbolAccess(mention) => {
                assert_eq!(mention.source.as_ref().map(|s| s.text.as_str()), Some("tools"));
                assert_eq!(mention.identifier.text, "helper");
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn assignment_is_resolved_after_the_expression_parses() {
        let source = "entrypoint { x += 1; }";
        let statements = entrypoint_statements(source);
        assert!(matches!(
            &statements[0].kind,
            StatementKind::Affect(Affect {
                kind: AffectKind::CompoundAssign {
                    op: BinaryOp::Addition,
                    ..
                },
                ..
            })
        ));
    }

    #[test]
    fn call_results_cannot_take_assignments() {
        // `f() = 1` keeps the call as a discard and then fails on `=`.
        let err = parse_source("entrypoint { f() = 1; }").unwrap_err();
        match err {
            CoreError::ParseError { message, .. } => {
                assert!(message.contains("terminator `;` of the discard statement"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn else_chains_into_another_if() {
        let source = "entrypoint { if a { } else if b { } else { } }";
        let statements = entrypoint_statements(source);
        match &statements[0].kind {
            StatementKind::If { false_branch, .. } => {
                let nested = false_branch.as_ref().expect("else branch");
                assert!(matches!(nested.kind, StatementKind::If { .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn while_accepts_label_variables_and_interleaved() {
        let source = "entrypoint { outer: while var i = 0; i < 10; i++ { break outer; } }";
        let statements = entrypoint_statements(source);
        match &statements[0].kind {
            StatementKind::While {
                label,
                variables,
                interleaved,
                ..
            } => {
                assert_eq!(label.as_ref().map(|l| l.text.as_str()), Some("outer"));
                assert_eq!(variables.len(), 1);
                assert!(matches!(
                    interleaved.as_deref(),
                    Some(Affect {
                        kind: AffectKind::Increment(_),
                        ..
                    })
                ));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn labelled_identifier_without_while_backtracks() {
        // `foo` alone must fall through to an affect statement.
        let statements = entrypoint_statements("entrypoint { foo; }");
        assert!(matches!(
            &statements[0].kind,
            StatementKind::Affect(Affect {
                kind: AffectKind::Discard(_),
                ..
            })
        ));
    }

    #[test]
    fn parameters_mark_in_out_with_trailing_ampersand() {
        let declarations = parse_source("proc swap(a&, b&) { }").expect("parse");
        match &declarations[0] {
            Declaration::Definition(Definition {
                kind: DefinitionKind::Proc { parameters, .. },
                ..
            }) => {
                assert_eq!(parameters.len(), 2);
                assert!(parameters.iter().all(|parameter| parameter.in_out));
            }
            other => panic!("unexpected declaration: {other:?}"),
        }
    }

    #[test]
    fn argument_lists_allow_trailing_commas() {
        let expression = single_expression("f(1, 2,)");
        match expression.kind {
            ExpressionKind::Call { arguments, .. } => assert_eq!(arguments.len(), 2),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn missing_token_mid_file_names_the_offender() {
        let err = parse_source("const x 1;").unwrap_err();
        match err {
            CoreError::ParseError { message, .. } => {
                assert_eq!(
                    message,
                    "expected value separator `=` of the constant declaration \
                     instead of number `1`"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_token_at_end_of_file_names_the_last_token() {
        let err = parse_source("const x = 1").unwrap_err();
        match err {
            CoreError::ParseError { message, .. } => {
                assert_eq!(
                    message,
                    "expected terminator `;` of the constant declaration \
                     at the end of the file after number `1`"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn public_requires_a_definition() {
        let err = parse_source("public entrypoint { }").unwrap_err();
        match err {
            CoreError::ParseError { message, .. } => {
                assert!(message.contains("expected a definition"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
