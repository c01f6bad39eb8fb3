//! Tree-walking evaluator: turns the parsed AST into a flat tree of
//! [`OutputNode`]s ready for [`super::format`] to print. Expression
//! evaluation, control flow, mixin/function application (including
//! `@content`), `@import` inlining, and `@extend` registration all live
//! here; the actual superselector/unification algebra is
//! [`super::selectors`]'s job, numeric unit algebra is [`super::numeric`]'s,
//! and color channel arithmetic is [`super::color`]'s.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::ast::{
    Args, Ast, AtRootFilter, BinOp, DefKind, Expr, ExprId, FnNameRef, ListSeparator as AstListSeparator,
    Params, SchemaPart, SelectorId, Stmt, StmtId, UnOp,
};
use super::builtins;
use super::color;
use super::env::{Callable, Environment, Scope};
use super::import::{ImportError, ImportResolver, ResolvedImport};
use super::numeric;
use super::parser::{self, ParseError};
use super::selectors::{self, ExtendError, ExtendRegistry, ExtendRule};
use super::source::{PathId, SourceStore, Span};
use super::value::{self, Color, ListSeparator as ValueListSeparator, Number, Value};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{message}")]
    Type { span: Span, message: String },
    #[error("{message}")]
    Unit { span: Span, message: String },
    #[error("Undefined variable: ${name}")]
    UndefinedVariable { span: Span, name: String },
    #[error("Undefined mixin: {name}")]
    UndefinedMixin { span: Span, name: String },
    #[error("Undefined function: {name}")]
    UndefinedFunction { span: Span, name: String },
    #[error("{message}")]
    Arity { span: Span, message: String },
    #[error("{message}")]
    UserError { span: Span, message: String },
    #[error("@content used outside of a mixin that was called with a block")]
    ContentWithoutBlock { span: Span },
    #[error("@extend used outside of a ruleset")]
    ExtendOutsideRuleset { span: Span },
    #[error("maximum call depth exceeded")]
    MaxCallDepth { span: Span },
    #[error("loop did not terminate within the iteration limit")]
    LoopLimitExceeded { span: Span },
    #[error("could not read {path}: {message}", path = path.display())]
    Io { path: PathBuf, message: String },
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Extend(#[from] ExtendError),
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            Self::Type { span, .. }
            | Self::Unit { span, .. }
            | Self::UndefinedVariable { span, .. }
            | Self::UndefinedMixin { span, .. }
            | Self::UndefinedFunction { span, .. }
            | Self::Arity { span, .. }
            | Self::UserError { span, .. }
            | Self::ContentWithoutBlock { span, .. }
            | Self::ExtendOutsideRuleset { span, .. }
            | Self::MaxCallDepth { span, .. }
            | Self::LoopLimitExceeded { span, .. } => *span,
            _ => Span::dummy(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagKind {
    Warn,
    Debug,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub message: String,
    pub span: Span,
}

/// The expanded, CSS-shaped tree handed to the formatter. Selectors are
/// kept as arena references (so `@extend` can be applied as a final pass
/// over the whole tree); everything else is already rendered to text.
#[derive(Debug, Clone)]
pub enum OutputNode {
    Ruleset { selector: SelectorId, declarations: Vec<OutputNode> },
    MediaBlock { query: String, body: Vec<OutputNode> },
    AtRule { prelude: String, body: Option<Vec<OutputNode>> },
    Declaration { property: String, value: String, important: bool, span: Span },
    Comment(String),
    Import(String),
}

enum Flow {
    Normal,
    Return(Value),
}

struct CallArgs {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

/// Drives one compilation: evaluates a root statement list against a
/// shared [`Ast`] arena, resolving `@import`s as it goes, and returns the
/// finished [`OutputNode`] forest plus any `@warn`/`@debug` diagnostics.
pub struct Evaluator<'a> {
    env: Environment,
    sources: &'a mut SourceStore,
    importer: &'a mut ImportResolver,
    extends: ExtendRegistry,
    diagnostics: Vec<Diagnostic>,
    selector_stack: Vec<SelectorId>,
    media_stack: Vec<String>,
    dir_stack: Vec<PathBuf>,
    content_stack: Vec<Option<(StmtId, Rc<RefCell<Scope>>)>>,
    call_depth: usize,
    precision: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(sources: &'a mut SourceStore, importer: &'a mut ImportResolver, base_dir: PathBuf, precision: usize) -> Self {
        Self {
            env: Environment::new(),
            sources,
            importer,
            extends: ExtendRegistry::new(),
            diagnostics: Vec::new(),
            selector_stack: Vec::new(),
            media_stack: Vec::new(),
            dir_stack: vec![base_dir],
            content_stack: Vec::new(),
            call_depth: 0,
            precision,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Evaluates `root`'s children, then applies `@extend` expansion as a
    /// final pass over every ruleset selector produced. Returns the output
    /// forest alongside any `@warn`/`@debug` diagnostics collected along
    /// the way.
    pub fn run(mut self, ast: &mut Ast, root: StmtId) -> Result<(Vec<OutputNode>, Vec<Diagnostic>), EvalError> {
        let stmts = self.block_children(ast, root);
        let (mut produced, _flow) = self.eval_block(ast, &stmts)?;
        self.expand_extends(ast, &mut produced, None);
        for err in self.extends.unsatisfied_required(ast) {
            return Err(err.into());
        }
        Ok((produced, self.diagnostics))
    }

    fn expand_extends(&self, ast: &mut Ast, nodes: &mut [OutputNode], media: Option<&str>) {
        for node in nodes.iter_mut() {
            match node {
                OutputNode::Ruleset { selector, declarations } => {
                    *selector = self.extends.expand(ast, *selector, media);
                    self.expand_extends(ast, declarations, media);
                }
                OutputNode::MediaBlock { query, body } => {
                    self.expand_extends(ast, body, Some(query.as_str()));
                }
                OutputNode::AtRule { body: Some(body), .. } => {
                    self.expand_extends(ast, body, media);
                }
                _ => {}
            }
        }
    }

    fn block_children(&self, ast: &Ast, id: StmtId) -> Vec<StmtId> {
        match &ast.stmt(id).kind {
            Stmt::Block { statements, .. } => statements.clone(),
            _ => Vec::new(),
        }
    }

    fn current_dir(&self) -> PathBuf {
        self.dir_stack.last().cloned().unwrap_or_default()
    }

    // ── statements ───────────────────────────────────────────────────────

    fn eval_block(&mut self, ast: &mut Ast, stmts: &[StmtId]) -> Result<(Vec<OutputNode>, Flow), EvalError> {
        let mut out = Vec::new();
        for &id in stmts {
            let flow = self.eval_stmt(ast, id, &mut out)?;
            if let Flow::Return(v) = flow {
                return Ok((out, Flow::Return(v)));
            }
        }
        Ok((out, Flow::Normal))
    }

    fn eval_stmt(&mut self, ast: &mut Ast, id: StmtId, out: &mut Vec<OutputNode>) -> Result<Flow, EvalError> {
        let span = ast.stmt(id).span;
        match ast.stmt(id).kind.clone() {
            Stmt::Block { statements, .. } => {
                self.env.push_child();
                let (mut produced, flow) = self.eval_block(ast, &statements)?;
                out.append(&mut produced);
                self.env.pop();
                Ok(flow)
            }
            Stmt::Ruleset { selector, block } => {
                let resolved_own = self.resolve_selector(ast, selector)?;
                let nested = self.nest_selector(ast, self.selector_stack.last().copied(), resolved_own);
                self.selector_stack.push(nested);
                self.env.push_child();
                let stmts = self.block_children(ast, block);
                let (produced, flow) = self.eval_block(ast, &stmts)?;
                self.env.pop();
                self.selector_stack.pop();
                let mut declarations = Vec::new();
                let mut bubbled = Vec::new();
                for node in produced {
                    match node {
                        OutputNode::Declaration { .. } | OutputNode::Comment(_) => declarations.push(node),
                        other => bubbled.push(other),
                    }
                }
                out.push(OutputNode::Ruleset { selector: nested, declarations });
                out.extend(bubbled);
                Ok(flow)
            }
            Stmt::Propset { property_prefix, block } => {
                let prefix = self.eval_to_css_text(ast, property_prefix)?;
                let stmts = self.block_children(ast, block);
                let (produced, flow) = self.eval_block(ast, &stmts)?;
                for node in produced {
                    match node {
                        OutputNode::Declaration { property, value, important, span } => {
                            out.push(OutputNode::Declaration { property: format!("{prefix}-{property}"), value, important, span });
                        }
                        other => out.push(other),
                    }
                }
                Ok(flow)
            }
            Stmt::MediaBlock { queries, block } => {
                let query_text = self.eval_to_css_text(ast, queries)?;
                self.media_stack.push(query_text.clone());
                let stmts = self.block_children(ast, block);
                let (produced, flow) = self.eval_block(ast, &stmts)?;
                self.media_stack.pop();
                out.push(OutputNode::MediaBlock { query: query_text, body: produced });
                Ok(flow)
            }
            Stmt::AtRule { keyword, selector, value, block } => {
                let mut prelude = format!("@{keyword}");
                if let Some(s) = selector {
                    prelude.push(' ');
                    prelude.push_str(&self.eval_to_css_text(ast, s)?);
                }
                if let Some(v) = value {
                    prelude.push(' ');
                    prelude.push_str(&self.eval_to_css_text(ast, v)?);
                }
                let (body, flow) = match block {
                    Some(b) => {
                        let stmts = self.block_children(ast, b);
                        let (produced, flow) = self.eval_block(ast, &stmts)?;
                        (Some(produced), flow)
                    }
                    None => (None, Flow::Normal),
                };
                out.push(OutputNode::AtRule { prelude, body });
                Ok(flow)
            }
            Stmt::Declaration { property, value, is_important } => {
                let prop_text = self.eval_to_css_text(ast, property)?;
                let value_text = self.eval_to_css_text(ast, value)?;
                out.push(OutputNode::Declaration { property: prop_text, value: value_text, important: is_important, span });
                Ok(Flow::Normal)
            }
            Stmt::Assignment { name, value, is_default, is_global } => {
                if is_default && !self.env.is_default_applicable(&name) {
                    return Ok(Flow::Normal);
                }
                let v = self.eval_expr(ast, value)?;
                self.env.set_variable(&name, v, is_global);
                Ok(Flow::Normal)
            }
            Stmt::Import { urls, media_queries } => {
                self.eval_import(ast, &urls, media_queries, out)?;
                Ok(Flow::Normal)
            }
            Stmt::If { predicate, consequent, alternative } => {
                let cond = self.eval_expr(ast, predicate)?.is_truthy();
                self.env.push_child();
                let flow = if cond {
                    let stmts = self.block_children(ast, consequent);
                    let (mut produced, flow) = self.eval_block(ast, &stmts)?;
                    out.append(&mut produced);
                    flow
                } else if let Some(alt) = alternative {
                    self.eval_stmt(ast, alt, out)?
                } else {
                    Flow::Normal
                };
                self.env.pop();
                Ok(flow)
            }
            Stmt::For { var, lower, upper, inclusive, body } => {
                let lo = self.eval_number_scalar(ast, lower)?;
                let hi = self.eval_number_scalar(ast, upper)?;
                let step: i64 = if lo <= hi { 1 } else { -1 };
                let (mut i, end) = (lo.round() as i64, hi.round() as i64);
                let mut result = Flow::Normal;
                loop {
                    let done = if step > 0 {
                        if inclusive { i > end } else { i >= end }
                    } else if inclusive {
                        i < end
                    } else {
                        i <= end
                    };
                    if done {
                        break;
                    }
                    self.env.push_child();
                    self.env.declare_local(&var, Value::number(i as f64));
                    let stmts = self.block_children(ast, body);
                    let (mut produced, flow) = self.eval_block(ast, &stmts)?;
                    out.append(&mut produced);
                    self.env.pop();
                    if let Flow::Return(v) = flow {
                        result = Flow::Return(v);
                        break;
                    }
                    i += step;
                }
                Ok(result)
            }
            Stmt::Each { vars, iterable, body } => {
                let iterable_value = self.eval_expr(ast, iterable)?;
                let items: Vec<Value> = match iterable_value {
                    Value::Map(pairs) => pairs
                        .into_iter()
                        .map(|(k, v)| Value::List { separator: ValueListSeparator::Space, items: vec![k, v], has_brackets: false })
                        .collect(),
                    other => other.as_list_items(),
                };
                let mut result = Flow::Normal;
                for item in items {
                    self.env.push_child();
                    if vars.len() == 1 {
                        self.env.declare_local(&vars[0], item);
                    } else {
                        let parts = item.as_list_items();
                        for (i, name) in vars.iter().enumerate() {
                            self.env.declare_local(name, parts.get(i).cloned().unwrap_or(Value::Null));
                        }
                    }
                    let stmts = self.block_children(ast, body);
                    let (mut produced, flow) = self.eval_block(ast, &stmts)?;
                    out.append(&mut produced);
                    self.env.pop();
                    if let Flow::Return(v) = flow {
                        result = Flow::Return(v);
                        break;
                    }
                }
                Ok(result)
            }
            Stmt::While { predicate, body } => {
                let mut guard = 0u32;
                loop {
                    guard += 1;
                    if guard > 200_000 {
                        return Err(EvalError::LoopLimitExceeded { span });
                    }
                    if !self.eval_expr(ast, predicate)?.is_truthy() {
                        break;
                    }
                    self.env.push_child();
                    let stmts = self.block_children(ast, body);
                    let (mut produced, flow) = self.eval_block(ast, &stmts)?;
                    out.append(&mut produced);
                    self.env.pop();
                    if let Flow::Return(v) = flow {
                        return Ok(Flow::Return(v));
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Return { value } => Ok(Flow::Return(self.eval_expr(ast, value)?)),
            Stmt::Content => {
                if let Some(Some((body, scope))) = self.content_stack.last().cloned() {
                    let previous = self.env.enter(scope);
                    self.env.push_child();
                    let stmts = self.block_children(ast, body);
                    let (mut produced, _flow) = self.eval_block(ast, &stmts)?;
                    out.append(&mut produced);
                    self.env.pop();
                    self.env.restore(previous);
                }
                Ok(Flow::Normal)
            }
            Stmt::Extend { target, is_optional } => {
                let resolved_target = self.resolve_selector(ast, target)?;
                let extender = self.selector_stack.last().copied().ok_or(EvalError::ExtendOutsideRuleset { span })?;
                self.extends.register(ExtendRule {
                    extender,
                    target: resolved_target,
                    is_optional,
                    media_context: self.media_stack.last().cloned(),
                });
                Ok(Flow::Normal)
            }
            Stmt::Definition { kind, name, parameters, body } => {
                let callable = Callable { name: name.clone(), parameters, body, closure: self.env.snapshot() };
                match kind {
                    DefKind::Mixin => self.env.define_mixin(callable),
                    DefKind::Function => self.env.define_function(callable),
                }
                Ok(Flow::Normal)
            }
            Stmt::MixinCall { name, arguments, content_block } => {
                let callable = self
                    .env
                    .lookup_mixin(&name)
                    .ok_or(EvalError::UndefinedMixin { span, name: name.clone() })?;
                let call_site_scope = self.env.snapshot();
                let (_, produced) = self.invoke(ast, callable, &arguments, content_block, call_site_scope, span)?;
                out.extend(produced);
                Ok(Flow::Normal)
            }
            Stmt::Warning(e) => {
                let v = self.eval_expr(ast, e)?;
                self.diagnostics.push(Diagnostic { kind: DiagKind::Warn, message: interpolate_text(&v), span });
                Ok(Flow::Normal)
            }
            Stmt::ErrorStmt(e) => {
                let v = self.eval_expr(ast, e)?;
                Err(EvalError::UserError { span, message: interpolate_text(&v) })
            }
            Stmt::Debug(e) => {
                let v = self.eval_expr(ast, e)?;
                self.diagnostics.push(Diagnostic { kind: DiagKind::Debug, message: interpolate_text(&v), span });
                Ok(Flow::Normal)
            }
            Stmt::Comment { text, is_loud } => {
                if is_loud {
                    out.push(OutputNode::Comment(text));
                }
                Ok(Flow::Normal)
            }
            Stmt::AtRoot { filter, body } => {
                let keep_media = matches!(&filter, Some(AtRootFilter { with: true, directives }) if directives.iter().any(|d| d == "media"));
                let saved_sel = std::mem::take(&mut self.selector_stack);
                let saved_media = std::mem::take(&mut self.media_stack);
                if keep_media {
                    self.media_stack = saved_media.clone();
                }
                let stmts = self.block_children(ast, body);
                let (mut produced, flow) = self.eval_block(ast, &stmts)?;
                out.append(&mut produced);
                self.selector_stack = saved_sel;
                self.media_stack = saved_media;
                Ok(flow)
            }
        }
    }

    fn eval_import(
        &mut self,
        ast: &mut Ast,
        urls: &[ExprId],
        media_queries: Option<ExprId>,
        out: &mut Vec<OutputNode>,
    ) -> Result<(), EvalError> {
        for &url_expr in urls {
            let url_text = self.eval_to_css_text(ast, url_expr)?;
            let dir = self.current_dir();
            match self.importer.resolve(&url_text, &dir)? {
                ResolvedImport::Passthrough => {
                    let media = match media_queries {
                        Some(mq) => format!(" {}", self.eval_to_css_text(ast, mq)?),
                        None => String::new(),
                    };
                    out.push(OutputNode::Import(format!("{url_text}{media}")));
                }
                ResolvedImport::File { path, already_loaded } => {
                    if already_loaded {
                        continue;
                    }
                    self.importer.enter(&path)?;
                    let text = std::fs::read_to_string(&path)
                        .map_err(|e| EvalError::Io { path: path.clone(), message: e.to_string() })?;
                    let path_id: PathId = self.sources.add(&path, text.clone());
                    let root = parser::parse_into(ast, &text, path_id).map_err(EvalError::Parse)?;
                    let parent_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.clone());
                    self.dir_stack.push(parent_dir);
                    let stmts = self.block_children(ast, root);
                    let (mut produced, _flow) = self.eval_block(ast, &stmts)?;
                    out.append(&mut produced);
                    self.dir_stack.pop();
                    self.importer.exit();
                }
            }
        }
        Ok(())
    }

    // ── calls ────────────────────────────────────────────────────────────

    fn invoke(
        &mut self,
        ast: &mut Ast,
        callable: Rc<Callable>,
        args: &Args,
        content: Option<StmtId>,
        call_site_scope: Rc<RefCell<Scope>>,
        span: Span,
    ) -> Result<(Value, Vec<OutputNode>), EvalError> {
        self.call_depth += 1;
        if self.call_depth > 2048 {
            self.call_depth -= 1;
            return Err(EvalError::MaxCallDepth { span });
        }
        let call_args = self.eval_call_args(ast, args)?;
        let previous = self.env.enter(callable.closure.clone());
        self.env.push_child();
        if let Err(e) = self.bind_params(ast, &callable.parameters, &call_args, span) {
            self.env.pop();
            self.env.restore(previous);
            self.call_depth -= 1;
            return Err(e);
        }
        self.content_stack.push(content.map(|b| (b, call_site_scope)));
        let body_stmts = self.block_children(ast, callable.body);
        let result = self.eval_block(ast, &body_stmts);
        self.content_stack.pop();
        self.env.pop();
        self.env.restore(previous);
        self.call_depth -= 1;
        let (produced, flow) = result?;
        let value = match flow {
            Flow::Return(v) => v,
            Flow::Normal => Value::Null,
        };
        Ok((value, produced))
    }

    fn eval_call_args(&mut self, ast: &mut Ast, args: &Args) -> Result<CallArgs, EvalError> {
        let mut positional = Vec::new();
        for &e in &args.positional {
            positional.push(self.eval_expr(ast, e)?);
        }
        let mut named = HashMap::new();
        for (k, e) in &args.named {
            named.insert(k.clone(), self.eval_expr(ast, *e)?);
        }
        if let Some(rest) = args.rest {
            match self.eval_expr(ast, rest)? {
                Value::Map(pairs) => {
                    for (k, v) in pairs {
                        if let Value::String { text, .. } = k {
                            named.insert(text, v);
                        }
                    }
                }
                other => positional.extend(other.as_list_items()),
            }
        }
        Ok(CallArgs { positional, named })
    }

    fn bind_params(&mut self, ast: &mut Ast, params: &Params, call_args: &CallArgs, span: Span) -> Result<(), EvalError> {
        let mut pos_iter = call_args.positional.iter().cloned();
        let mut saw_rest = false;
        for param in &params.items {
            if param.is_rest {
                saw_rest = true;
                let rest_items: Vec<Value> = pos_iter.by_ref().collect();
                self.env.declare_local(
                    &param.name,
                    Value::List { separator: ValueListSeparator::Comma, items: rest_items, has_brackets: false },
                );
                continue;
            }
            if let Some(v) = pos_iter.next() {
                self.env.declare_local(&param.name, v);
            } else if let Some(v) = call_args.named.get(&param.name) {
                self.env.declare_local(&param.name, v.clone());
            } else if let Some(default) = &param.default {
                let v = self.eval_expr(ast, *default)?;
                self.env.declare_local(&param.name, v);
            } else {
                return Err(EvalError::Arity { span, message: format!("missing argument ${}", param.name) });
            }
        }
        if !saw_rest && pos_iter.next().is_some() {
            return Err(EvalError::Arity { span, message: "too many positional arguments".to_string() });
        }
        Ok(())
    }

    fn eval_function_call(&mut self, ast: &mut Ast, name: &FnNameRef, args: &Args, span: Span) -> Result<Value, EvalError> {
        let fname = self.resolve_fn_name(ast, name)?;
        if let Some(callable) = self.env.lookup_function(&fname) {
            let call_site_scope = self.env.snapshot();
            let (value, _produced) = self.invoke(ast, callable, args, None, call_site_scope, span)?;
            return Ok(value);
        }
        let call_args = self.eval_call_args(ast, args)?;
        if let Some(value) = builtins::call(&fname, &call_args.positional, &call_args.named, span)? {
            return Ok(value);
        }
        // An unrecognized call (`calc(...)`, `var(...)`, a vendor function)
        // passes through as literal CSS text rather than erroring.
        let rendered = call_args
            .positional
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Value::unquoted(format!("{fname}({rendered})")))
    }

    fn resolve_fn_name(&mut self, ast: &mut Ast, name: &FnNameRef) -> Result<String, EvalError> {
        match name {
            FnNameRef::Static(s) => Ok(s.clone()),
            FnNameRef::Schema(parts) => self.eval_schema_to_string(ast, parts),
        }
    }

    // ── expressions ──────────────────────────────────────────────────────

    fn eval_expr(&mut self, ast: &mut Ast, id: ExprId) -> Result<Value, EvalError> {
        let span = ast.expr(id).span;
        match ast.expr(id).kind.clone() {
            Expr::List { separator, items } => {
                let mut vals = Vec::with_capacity(items.len());
                for it in items {
                    vals.push(self.eval_expr(ast, it)?);
                }
                let sep = match separator {
                    AstListSeparator::Comma => ValueListSeparator::Comma,
                    AstListSeparator::Space => ValueListSeparator::Space,
                };
                Ok(Value::List { separator: sep, items: vals, has_brackets: false })
            }
            Expr::Map { pairs } => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push((self.eval_expr(ast, k)?, self.eval_expr(ast, v)?));
                }
                Ok(Value::Map(out))
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(ast, op, lhs, rhs, span),
            Expr::Slash { lhs, rhs } => {
                let l = self.eval_expr(ast, lhs)?;
                let r = self.eval_expr(ast, rhs)?;
                Ok(Value::unquoted(format!("{l}/{r}")))
            }
            Expr::Unary { op, operand } => self.eval_unary(ast, op, operand, span),
            Expr::Variable { name } => self.env.get_variable(&name).ok_or(EvalError::UndefinedVariable { span, name }),
            Expr::FunctionCall { name, arguments } => self.eval_function_call(ast, &name, &arguments, span),
            Expr::Number { value, numer_units, denom_units } => Ok(Value::Number(Number { value, numer_units, denom_units })),
            Expr::Color { r, g, b, a, display_name } => Ok(Value::Color(Color { r, g, b, a, display_name })),
            Expr::Boolean(b) => Ok(Value::Boolean(b)),
            Expr::Null => Ok(Value::Null),
            Expr::StringQuoted { value, .. } => Ok(Value::quoted(value)),
            Expr::StringConstant(name) => match color::lookup_named(&name) {
                Some(c) => Ok(Value::Color(c)),
                None => Ok(Value::unquoted(name)),
            },
            Expr::StringSchema { parts } => Ok(Value::unquoted(self.eval_schema_to_string(ast, &parts)?)),
            Expr::QuotedSchema { parts, .. } => Ok(Value::quoted(self.eval_schema_to_string(ast, &parts)?)),
            Expr::ParentReference => match self.selector_stack.last().copied() {
                Some(sel) => Ok(Value::unquoted(self.selector_to_css_text(ast, sel))),
                None => Ok(Value::Null),
            },
            Expr::Important => Ok(Value::unquoted("!important")),
        }
    }

    fn eval_schema_to_string(&mut self, ast: &mut Ast, parts: &[SchemaPart]) -> Result<String, EvalError> {
        let mut text = String::new();
        for part in parts.to_vec() {
            match part {
                SchemaPart::Literal(s) => text.push_str(&s),
                SchemaPart::Hole(e) => {
                    let v = self.eval_expr(ast, e)?;
                    text.push_str(&interpolate_text(&v));
                }
            }
        }
        Ok(text)
    }

    /// Stringifies an expression the way a declaration value or selector
    /// schema prelude needs: numbers rounded to the configured precision,
    /// everything else via `Display`.
    fn eval_to_css_text(&mut self, ast: &mut Ast, id: ExprId) -> Result<String, EvalError> {
        let v = self.eval_expr(ast, id)?;
        Ok(format_value(&v, self.precision))
    }

    fn eval_number_scalar(&mut self, ast: &mut Ast, id: ExprId) -> Result<f64, EvalError> {
        let span = ast.expr(id).span;
        match self.eval_expr(ast, id)? {
            Value::Number(n) => Ok(n.value),
            other => Err(EvalError::Type { span, message: format!("expected a number, got {}", other.type_name()) }),
        }
    }

    fn eval_unary(&mut self, ast: &mut Ast, op: UnOp, operand: ExprId, span: Span) -> Result<Value, EvalError> {
        let v = self.eval_expr(ast, operand)?;
        match op {
            UnOp::Not => Ok(Value::Boolean(!v.is_truthy())),
            UnOp::Plus => match v {
                Value::Number(n) => Ok(Value::Number(n)),
                other => Err(EvalError::Type { span, message: format!("expected a number, got {}", other.type_name()) }),
            },
            UnOp::Minus => match v {
                Value::Number(n) => Ok(Value::Number(Number { value: -n.value, ..n })),
                other => Err(EvalError::Type { span, message: format!("expected a number, got {}", other.type_name()) }),
            },
        }
    }

    fn eval_binary(&mut self, ast: &mut Ast, op: BinOp, lhs: ExprId, rhs: ExprId, span: Span) -> Result<Value, EvalError> {
        match op {
            BinOp::Or => {
                let l = self.eval_expr(ast, lhs)?;
                if l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval_expr(ast, rhs)
                }
            }
            BinOp::And => {
                let l = self.eval_expr(ast, lhs)?;
                if !l.is_truthy() {
                    Ok(l)
                } else {
                    self.eval_expr(ast, rhs)
                }
            }
            _ => {
                let l = self.eval_expr(ast, lhs)?;
                let r = self.eval_expr(ast, rhs)?;
                match op {
                    BinOp::Eq => Ok(Value::Boolean(values_equal(&l, &r))),
                    BinOp::Neq => Ok(Value::Boolean(!values_equal(&l, &r))),
                    BinOp::Gt | BinOp::Gte | BinOp::Lt | BinOp::Lte => {
                        let (ln, rn) = (as_number(&l, span)?, as_number(&r, span)?);
                        if !numeric::comparable(&ln, &rn) {
                            return Err(EvalError::Unit { span, message: "incompatible units in comparison".to_string() });
                        }
                        let rv = match (ln.single_unit(), rn.single_unit()) {
                            (Some(ul), Some(ur)) => numeric::convert(rn.value, ur, ul).unwrap_or(rn.value),
                            _ => rn.value,
                        };
                        let b = match op {
                            BinOp::Gt => ln.value > rv,
                            BinOp::Gte => ln.value >= rv,
                            BinOp::Lt => ln.value < rv,
                            BinOp::Lte => ln.value <= rv,
                            _ => unreachable!(),
                        };
                        Ok(Value::Boolean(b))
                    }
                    BinOp::Add => self.eval_add(&l, &r, span),
                    BinOp::Sub => self.eval_subtract(&l, &r, span),
                    BinOp::Mul => self.eval_multiply(&l, &r, span),
                    BinOp::Div => self.eval_divide(&l, &r, span),
                    BinOp::Mod => self.eval_modulo(&l, &r, span),
                    BinOp::Or | BinOp::And => unreachable!(),
                }
            }
        }
    }

    fn eval_add(&self, l: &Value, r: &Value, span: Span) -> Result<Value, EvalError> {
        match (l, r) {
            (Value::String { quoted, .. }, _) | (_, Value::String { quoted: quoted @ true, .. }) if matches!(l, Value::String{..}) || matches!(r, Value::String{..}) => {
                let _ = quoted;
                let text = format!("{}{}", interpolate_text(l), interpolate_text(r));
                let result_quoted = matches!(l, Value::String { quoted: true, .. });
                Ok(Value::String { text, quoted: result_quoted })
            }
            (Value::Number(a), Value::Number(b)) => numeric::add(a, b)
                .map(Value::Number)
                .ok_or_else(|| EvalError::Unit { span, message: "incompatible units in addition".to_string() }),
            (Value::Color(a), Value::Number(b)) => Ok(Value::Color(channel_op(a, b.value, |x, y| x + y))),
            (Value::Color(a), Value::Color(b)) => Ok(Value::Color(color_op(a, b, |x, y| x + y))),
            _ => Ok(Value::unquoted(format!("{l}{r}"))),
        }
    }

    fn eval_subtract(&self, l: &Value, r: &Value, span: Span) -> Result<Value, EvalError> {
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => numeric::subtract(a, b)
                .map(Value::Number)
                .ok_or_else(|| EvalError::Unit { span, message: "incompatible units in subtraction".to_string() }),
            (Value::Color(a), Value::Number(b)) => Ok(Value::Color(channel_op(a, b.value, |x, y| x - y))),
            (Value::Color(a), Value::Color(b)) => Ok(Value::Color(color_op(a, b, |x, y| x - y))),
            _ => Ok(Value::unquoted(format!("{l}-{r}"))),
        }
    }

    fn eval_multiply(&self, l: &Value, r: &Value, span: Span) -> Result<Value, EvalError> {
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(numeric::multiply(a, b))),
            _ => Err(EvalError::Type { span, message: format!("can't multiply {} and {}", l.type_name(), r.type_name()) }),
        }
    }

    fn eval_divide(&self, l: &Value, r: &Value, span: Span) -> Result<Value, EvalError> {
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => {
                if b.value == 0.0 {
                    return Err(EvalError::Type { span, message: "division by zero".to_string() });
                }
                Ok(Value::Number(numeric::divide(a, b)))
            }
            _ => Err(EvalError::Type { span, message: format!("can't divide {} by {}", l.type_name(), r.type_name()) }),
        }
    }

    fn eval_modulo(&self, l: &Value, r: &Value, span: Span) -> Result<Value, EvalError> {
        match (l, r) {
            (Value::Number(a), Value::Number(b)) => {
                if !numeric::comparable(a, b) {
                    return Err(EvalError::Unit { span, message: "incompatible units in modulo".to_string() });
                }
                Ok(Value::Number(Number { value: a.value % b.value, numer_units: a.numer_units.clone(), denom_units: a.denom_units.clone() }))
            }
            _ => Err(EvalError::Type { span, message: "modulo requires two numbers".to_string() }),
        }
    }

    // ── selectors ────────────────────────────────────────────────────────

    fn resolve_selector(&mut self, ast: &mut Ast, id: SelectorId) -> Result<SelectorId, EvalError> {
        use super::ast::SelectorKind;
        match ast.selector(id).kind.clone() {
            SelectorKind::Schema { parts } => {
                let text = self.eval_schema_to_string(ast, &parts)?;
                let path = self.sources.lookup(self.current_dir()).unwrap_or(PathId(0));
                Ok(parser::parse_selector_list_standalone(ast, &text, path)?)
            }
            _ => Ok(id),
        }
    }

    /// Combines a ruleset's own (already-resolved) selector with its
    /// enclosing selector, substituting `&` where present or implicitly
    /// prefixing the parent as a descendant ancestor otherwise.
    fn nest_selector(&self, ast: &mut Ast, parent: Option<SelectorId>, child: SelectorId) -> SelectorId {
        use super::ast::SelectorKind;
        let Some(parent) = parent else { return child };
        let parent_complexes = match &ast.selector(parent).kind {
            SelectorKind::List { complexes, .. } => complexes.clone(),
            _ => vec![parent],
        };
        let child_complexes = match &ast.selector(child).kind {
            SelectorKind::List { complexes, .. } => complexes.clone(),
            _ => vec![child],
        };
        let mut result = Vec::new();
        for &pc in &parent_complexes {
            for &cc in &child_complexes {
                result.push(nest_complex(ast, pc, cc));
            }
        }
        let span = ast.selector(child).span;
        ast.alloc_selector(SelectorKind::List { complexes: result, is_optional: false }, span)
    }

    fn selector_to_css_text(&self, ast: &Ast, id: SelectorId) -> String {
        super::format::render_selector(ast, id)
    }

    pub fn extend_registry(&self) -> &ExtendRegistry {
        &self.extends
    }
}

fn nest_complex(ast: &mut Ast, parent: SelectorId, child: SelectorId) -> SelectorId {
    use super::ast::{Combinator, SelectorKind};
    let child_steps = selectors::flatten_complex(ast, child);
    let has_parent_ref = child_steps.iter().any(|s| match &ast.selector(s.compound).kind {
        SelectorKind::Compound { has_parent_ref, .. } => *has_parent_ref,
        _ => false,
    });
    if !has_parent_ref {
        let parent_steps = selectors::flatten_complex(ast, parent);
        let mut steps = parent_steps;
        for (i, step) in child_steps.into_iter().enumerate() {
            let leading = if i == 0 { Some(Combinator::Descendant) } else { step.leading_combinator };
            steps.push(selectors::ComplexStep { leading_combinator: leading, compound: step.compound });
        }
        return rebuild(ast, &steps);
    }
    let parent_steps = selectors::flatten_complex(ast, parent);
    let mut steps = Vec::new();
    for (i, step) in child_steps.into_iter().enumerate() {
        let is_parent_step = match &ast.selector(step.compound).kind {
            SelectorKind::Compound { has_parent_ref, .. } => *has_parent_ref,
            _ => false,
        };
        if is_parent_step {
            let rest = strip_parent_ref(ast, step.compound);
            for (j, ps) in parent_steps.iter().enumerate() {
                let leading = if j == 0 { step.leading_combinator } else { ps.leading_combinator };
                steps.push(selectors::ComplexStep { leading_combinator: leading, compound: ps.compound });
                if j == parent_steps.len() - 1 {
                    if let Some(r) = rest {
                        if let Some(unified) = selectors::unify_compounds(ast, ps.compound, r) {
                            steps.pop();
                            steps.push(selectors::ComplexStep { leading_combinator: leading, compound: unified });
                        }
                    }
                }
            }
        } else {
            let leading = if i == 0 { None } else { step.leading_combinator };
            steps.push(selectors::ComplexStep { leading_combinator: leading, compound: step.compound });
        }
    }
    rebuild(ast, &steps)
}

fn strip_parent_ref(ast: &mut Ast, compound: SelectorId) -> Option<SelectorId> {
    use super::ast::SelectorKind;
    let (simples, span) = match &ast.selector(compound).kind {
        SelectorKind::Compound { simples, .. } => (simples.clone(), ast.selector(compound).span),
        _ => return None,
    };
    let rest: Vec<_> = simples
        .into_iter()
        .filter(|s| !matches!(ast.selector(*s).kind, SelectorKind::ParentRef))
        .collect();
    if rest.is_empty() {
        None
    } else {
        Some(ast.alloc_selector(SelectorKind::Compound { simples: rest, has_parent_ref: false }, span))
    }
}

fn rebuild(ast: &mut Ast, steps: &[selectors::ComplexStep]) -> SelectorId {
    use super::ast::SelectorKind;
    if steps.is_empty() {
        return ast.alloc_selector(SelectorKind::Complex { head: None, combinator: None, reference: None, tail: None }, Span::dummy());
    }
    let mut node = ast.alloc_selector(
        SelectorKind::Complex { head: Some(steps[steps.len() - 1].compound), combinator: None, reference: None, tail: None },
        Span::dummy(),
    );
    for i in (0..steps.len() - 1).rev() {
        let comb = steps[i + 1].leading_combinator;
        node = ast.alloc_selector(
            SelectorKind::Complex { head: Some(steps[i].compound), combinator: comb, reference: None, tail: Some(node) },
            Span::dummy(),
        );
    }
    node
}

/// Renders a value as CSS text with numbers rounded to `precision` decimal
/// places (spec's output-precision knob), recursing into lists and maps.
fn format_value(v: &Value, precision: usize) -> String {
    match v {
        Value::Number(n) => {
            let mut s = value::format_f64_precision(n.value, precision);
            for u in &n.numer_units {
                s.push_str(u);
            }
            if !n.denom_units.is_empty() {
                s.push('/');
                s.push_str(&n.denom_units.join("/"));
            }
            s
        }
        Value::List { separator, items, has_brackets } => {
            let sep = match separator {
                ValueListSeparator::Comma => ", ",
                ValueListSeparator::Space => " ",
            };
            let body = items.iter().map(|item| format_value(item, precision)).collect::<Vec<_>>().join(sep);
            if *has_brackets {
                format!("[{body}]")
            } else {
                body
            }
        }
        Value::Map(pairs) => {
            let body = pairs
                .iter()
                .map(|(k, v)| format!("{}: {}", format_value(k, precision), format_value(v, precision)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("({body})")
        }
        other => other.to_string(),
    }
}

fn interpolate_text(v: &Value) -> String {
    match v {
        Value::String { text, .. } => text.clone(),
        other => other.to_string(),
    }
}

fn as_number(v: &Value, span: Span) -> Result<Number, EvalError> {
    match v {
        Value::Number(n) => Ok(n.clone()),
        other => Err(EvalError::Type { span, message: format!("expected a number, got {}", other.type_name()) }),
    }
}

fn channel_op(c: &Color, amount: f64, op: impl Fn(f64, f64) -> f64) -> Color {
    Color { r: op(c.r, amount), g: op(c.g, amount), b: op(c.b, amount), a: c.a, display_name: None }.clamp_channels()
}

fn color_op(a: &Color, b: &Color, op: impl Fn(f64, f64) -> f64) -> Color {
    Color { r: op(a.r, b.r), g: op(a.g, b.g), b: op(a.b, b.b), a: a.a, display_name: None }.clamp_channels()
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String { text: t1, .. }, Value::String { text: t2, .. }) => t1 == t2,
        (Value::Number(n1), Value::Number(n2)) => {
            if !numeric::comparable(n1, n2) {
                return false;
            }
            match (n1.single_unit(), n2.single_unit()) {
                (Some(u1), Some(u2)) => numeric::convert(n2.value, u2, u1).map(|v2| (n1.value - v2).abs() < 1e-9).unwrap_or(false),
                _ => n1 == n2,
            }
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::import::ImportResolver;
    use super::super::source::SourceStore;

    fn run_source(src: &str) -> (Ast, Vec<OutputNode>) {
        let (mut ast, root) = parser::parse(src, PathId(0)).unwrap();
        let mut sources = SourceStore::new();
        let mut importer = ImportResolver::new(vec![]);
        let eval = Evaluator::new(&mut sources, &mut importer, PathBuf::from("."), 10);
        let (out, _diagnostics) = eval.run(&mut ast, root).unwrap();
        (ast, out)
    }

    #[test]
    fn evaluates_plain_declaration() {
        let (_ast, out) = run_source("a { color: red; }");
        match &out[0] {
            OutputNode::Ruleset { declarations, .. } => match &declarations[0] {
                OutputNode::Declaration { property, value, .. } => {
                    assert_eq!(property, "color");
                    assert_eq!(value, "red");
                }
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn arithmetic_with_units() {
        let (_ast, out) = run_source("a { width: 1in + 48px; }");
        match &out[0] {
            OutputNode::Ruleset { declarations, .. } => match &declarations[0] {
                OutputNode::Declaration { value, .. } => assert_eq!(value, "1.5in"),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn variable_assignment_and_interpolation() {
        let (_ast, out) = run_source("$x: 10px; a { width: #{$x}; }");
        match &out[0] {
            OutputNode::Ruleset { declarations, .. } => match &declarations[0] {
                OutputNode::Declaration { value, .. } => assert_eq!(value, "10px"),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn nested_ruleset_flattens_with_parent_selector() {
        let (_ast, out) = run_source("a { &:hover { color: blue; } }");
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn if_else_chain_picks_branch() {
        let (_ast, out) = run_source("$x: 2; a { @if $x == 1 { color: red; } @else if $x == 2 { color: green; } @else { color: blue; } }");
        match &out[0] {
            OutputNode::Ruleset { declarations, .. } => match &declarations[0] {
                OutputNode::Declaration { value, .. } => assert_eq!(value, "green"),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn mixin_with_content_runs_in_caller_scope() {
        let (_ast, out) = run_source("$x: 1; @mixin wrap { a { @content; } } @include wrap { color: $x; }");
        match &out[0] {
            OutputNode::Ruleset { declarations, .. } => match &declarations[0] {
                OutputNode::Declaration { value, .. } => assert_eq!(value, "1"),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn function_call_returns_value() {
        let (_ast, out) = run_source("@function double($n) { @return $n * 2; } a { width: double(3px); }");
        match &out[0] {
            OutputNode::Ruleset { declarations, .. } => match &declarations[0] {
                OutputNode::Declaration { value, .. } => assert_eq!(value, "6px"),
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn each_over_comma_list() {
        let (_ast, out) = run_source("@each $c in red, green { a { color: $c; } }");
        assert_eq!(out.len(), 2);
    }
}
