//! AST node definitions and the per-compilation arena that owns them.
//!
//! Every node is tagged (a sum type, not a class hierarchy) and carries a
//! [`Span`]. Recursive structure is expressed with arena indices
//! (`StmtId`/`ExprId`/`SelectorId`) rather than `Box`, so sharing is by
//! reference and nothing is freed until the whole [`Ast`] is dropped.
//! Evaluation, printing, and `@extend` expansion are all visitors over this
//! same sum type — adding a pass never touches the node definitions.

use serde::{Deserialize, Serialize};

use super::source::Span;

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);
    };
}

arena_id!(StmtId);
arena_id!(ExprId);
arena_id!(SelectorId);

/// The per-compilation arena: every node created by the parser or the
/// evaluator lives here until the `Ast` itself is dropped. Node identity is
/// not observable — only structural content (compared via the `eq_*`
/// helpers in `selectors` and `eval`) matters.
#[derive(Debug, Default)]
pub struct Ast {
    stmts: Vec<StmtNode>,
    exprs: Vec<ExprNode>,
    selectors: Vec<SelectorNode>,
    pub root: Option<StmtId>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_stmt(&mut self, kind: Stmt, span: Span) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(StmtNode { kind, span });
        id
    }

    pub fn alloc_expr(&mut self, kind: Expr, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(ExprNode { kind, span });
        id
    }

    pub fn alloc_selector(&mut self, kind: SelectorKind, span: Span) -> SelectorId {
        let id = SelectorId(self.selectors.len() as u32);
        self.selectors.push(SelectorNode { kind, span });
        id
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.0 as usize]
    }

    pub fn selector(&self, id: SelectorId) -> &SelectorNode {
        &self.selectors[id.0 as usize]
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StmtNode {
    pub kind: Stmt,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExprNode {
    pub kind: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorNode {
    pub kind: SelectorKind,
    pub span: Span,
}

// ── Statements ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Block {
        is_root: bool,
        statements: Vec<StmtId>,
    },
    Ruleset {
        selector: SelectorId,
        block: StmtId,
    },
    /// Nested declarations sharing a property prefix: `font: { weight: bold; }`.
    Propset {
        property_prefix: ExprId,
        block: StmtId,
    },
    MediaBlock {
        queries: ExprId,
        block: StmtId,
    },
    /// Any at-rule not otherwise recognized; also used for `@supports`.
    AtRule {
        keyword: String,
        selector: Option<ExprId>,
        value: Option<ExprId>,
        block: Option<StmtId>,
    },
    Declaration {
        property: ExprId,
        value: ExprId,
        is_important: bool,
    },
    Assignment {
        name: String,
        value: ExprId,
        is_default: bool,
        is_global: bool,
    },
    /// `urls` as written in source; `media_queries` if the import carries
    /// a media-query tail (`@import "x" screen`). File resolution against
    /// the search path happens in the import resolver, not here.
    Import {
        urls: Vec<ExprId>,
        media_queries: Option<ExprId>,
    },
    If {
        predicate: ExprId,
        consequent: StmtId,
        /// A `Block`, another `If` (the `@else if` chain), or `None`.
        alternative: Option<StmtId>,
    },
    For {
        var: String,
        lower: ExprId,
        upper: ExprId,
        inclusive: bool,
        body: StmtId,
    },
    Each {
        vars: Vec<String>,
        iterable: ExprId,
        body: StmtId,
    },
    While {
        predicate: ExprId,
        body: StmtId,
    },
    Return {
        value: ExprId,
    },
    Content,
    Extend {
        target: SelectorId,
        is_optional: bool,
    },
    Definition {
        kind: DefKind,
        name: String,
        parameters: Params,
        body: StmtId,
    },
    MixinCall {
        name: String,
        arguments: Args,
        content_block: Option<StmtId>,
    },
    Warning(ExprId),
    ErrorStmt(ExprId),
    Debug(ExprId),
    Comment {
        text: String,
        is_loud: bool,
    },
    AtRoot {
        filter: Option<AtRootFilter>,
        body: StmtId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefKind {
    Mixin,
    Function,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtRootFilter {
    pub with: bool,
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Params {
    pub items: Vec<Param>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub default: Option<ExprId>,
    pub is_rest: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Args {
    pub positional: Vec<ExprId>,
    pub named: Vec<(String, ExprId)>,
    /// `...` splat at the call site, e.g. `@include m($list...)`.
    pub rest: Option<ExprId>,
}

// ── Expressions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListSeparator {
    Comma,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchemaPart {
    Literal(String),
    Hole(ExprId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FnNameRef {
    Static(String),
    Schema(Vec<SchemaPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    List {
        separator: ListSeparator,
        items: Vec<ExprId>,
    },
    Map {
        pairs: Vec<(ExprId, ExprId)>,
    },
    Binary {
        op: BinOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// The literal (non-arithmetic) form of `a/b`, e.g. `font: 12px/1.5`.
    /// Distinct from `Binary { op: Div, .. }`, which is real division.
    Slash {
        lhs: ExprId,
        rhs: ExprId,
    },
    Unary {
        op: UnOp,
        operand: ExprId,
    },
    Variable {
        name: String,
    },
    FunctionCall {
        name: FnNameRef,
        arguments: Args,
    },
    Number {
        value: f64,
        numer_units: Vec<String>,
        denom_units: Vec<String>,
    },
    Color {
        r: f64,
        g: f64,
        b: f64,
        a: f64,
        display_name: Option<String>,
    },
    Boolean(bool),
    Null,
    StringQuoted {
        value: String,
        quote: char,
    },
    StringConstant(String),
    StringSchema {
        parts: Vec<SchemaPart>,
    },
    /// A quoted string containing interpolation holes; distinct from the
    /// unquoted `StringSchema` so the evaluator can re-wrap the
    /// concatenated result in `quote` per spec's "quote-mark preserved" rule.
    QuotedSchema {
        parts: Vec<SchemaPart>,
        quote: char,
    },
    ParentReference,
    Important,
}

// ── Selectors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combinator {
    Descendant,
    Child,
    Adjacent,
    General,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PseudoArg {
    Text(String),
    List(SelectorId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SelectorKind {
    List {
        complexes: Vec<SelectorId>,
        is_optional: bool,
    },
    Complex {
        head: Option<SelectorId>,
        combinator: Option<Combinator>,
        /// An uninterpreted `/name/` reference combinator, kept verbatim.
        reference: Option<String>,
        tail: Option<SelectorId>,
    },
    Compound {
        simples: Vec<SelectorId>,
        has_parent_ref: bool,
    },
    Type {
        name: String,
        namespace: Option<String>,
    },
    IdRef(String),
    ClassRef(String),
    Placeholder(String),
    ParentRef,
    PseudoSimple {
        name: String,
        is_element: bool,
    },
    PseudoFunctional {
        name: String,
        arg: PseudoArg,
    },
    /// `:not(...)`, `:matches(...)` etc: a pseudo whose argument is itself a selector list.
    Wrapped {
        name: String,
        inner: SelectorId,
    },
    Attribute {
        name: String,
        matcher: Option<String>,
        value: Option<String>,
    },
    /// Deferred until interpolants are evaluated and the result re-parsed as a selector.
    Schema {
        parts: Vec<SchemaPart>,
    },
}
