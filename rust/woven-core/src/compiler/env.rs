//! Lexically nested environment frames: variables, mixins, and functions
//! each live in their own namespace per scope, and mixin/function bodies
//! close over the scope chain active at their definition site (not the
//! call site) the way ordinary closures do.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{Params, StmtId};
use super::value::Value;

#[derive(Debug, Clone)]
pub struct Callable {
    pub name: String,
    pub parameters: Params,
    pub body: StmtId,
    pub closure: Rc<RefCell<Scope>>,
}

#[derive(Debug, Default)]
pub struct Scope {
    parent: Option<Rc<RefCell<Scope>>>,
    variables: HashMap<String, Value>,
    mixins: HashMap<String, Rc<Callable>>,
    functions: HashMap<String, Rc<Callable>>,
}

impl Scope {
    fn child(parent: Rc<RefCell<Scope>>) -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope { parent: Some(parent), ..Default::default() }))
    }

    fn root() -> Rc<RefCell<Scope>> {
        Rc::new(RefCell::new(Scope::default()))
    }
}

/// A cursor over the current scope chain. Cloning an `Environment` is cheap
/// (it's just an `Rc` bump) but does *not* fork the scopes themselves —
/// clones still see writes made through the original, which is what mixin
/// closures rely on.
#[derive(Clone)]
pub struct Environment {
    current: Rc<RefCell<Scope>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self { current: Scope::root() }
    }

    /// Push a fresh child scope and make it current (rule/block bodies,
    /// `@if`/`@for`/`@each`/`@while` bodies).
    pub fn push_child(&mut self) {
        self.current = Scope::child(self.current.clone());
    }

    /// Pop back to the parent of the current scope.
    pub fn pop(&mut self) {
        let parent = self
            .current
            .borrow()
            .parent
            .clone()
            .expect("pop called on the root scope");
        self.current = parent;
    }

    /// A handle to the current scope, for capturing a closure (mixin/
    /// function definitions) or a content-block call site.
    pub fn snapshot(&self) -> Rc<RefCell<Scope>> {
        self.current.clone()
    }

    /// Swap in a captured scope chain (e.g. a mixin's closure, extended by
    /// a fresh child for its arguments), returning whatever was current so
    /// the caller can restore it afterward.
    pub fn enter(&mut self, scope: Rc<RefCell<Scope>>) -> Rc<RefCell<Scope>> {
        std::mem::replace(&mut self.current, scope)
    }

    pub fn restore(&mut self, previous: Rc<RefCell<Scope>>) {
        self.current = previous;
    }

    pub fn child_of(&self, scope: &Rc<RefCell<Scope>>) -> Rc<RefCell<Scope>> {
        Scope::child(scope.clone())
    }

    // ── variables ────────────────────────────────────────────────────────

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        Self::lookup_variable(&self.current, name)
    }

    fn lookup_variable(scope: &Rc<RefCell<Scope>>, name: &str) -> Option<Value> {
        let s = scope.borrow();
        if let Some(v) = s.variables.get(name) {
            return Some(v.clone());
        }
        s.parent.as_ref().and_then(|p| Self::lookup_variable(p, name))
    }

    /// `true` when `name` is not bound anywhere in the visible chain, or is
    /// bound to `null` — the condition under which `!default` takes effect.
    pub fn is_default_applicable(&self, name: &str) -> bool {
        match self.get_variable(name) {
            None => true,
            Some(Value::Null) => true,
            Some(_) => false,
        }
    }

    /// Implements assignment semantics: `!global` always writes to the
    /// root scope; otherwise, writes to whichever scope in the chain
    /// already holds `name`, or declares it fresh in the current scope if
    /// it isn't bound anywhere yet.
    pub fn set_variable(&mut self, name: &str, value: Value, is_global: bool) {
        if is_global {
            let mut scope = self.current.clone();
            loop {
                let parent = scope.borrow().parent.clone();
                match parent {
                    Some(p) => scope = p,
                    None => break,
                }
            }
            scope.borrow_mut().variables.insert(name.to_string(), value);
            return;
        }
        if Self::assign_if_present(&self.current, name, &value) {
            return;
        }
        self.current.borrow_mut().variables.insert(name.to_string(), value);
    }

    fn assign_if_present(scope: &Rc<RefCell<Scope>>, name: &str, value: &Value) -> bool {
        if scope.borrow().variables.contains_key(name) {
            scope.borrow_mut().variables.insert(name.to_string(), value.clone());
            return true;
        }
        let parent = scope.borrow().parent.clone();
        match parent {
            Some(p) => Self::assign_if_present(&p, name, value),
            None => false,
        }
    }

    /// Declares `name` in the current scope regardless of any existing
    /// binding further up the chain — used for parameter binding, where
    /// a mixin/function argument must shadow an outer variable of the
    /// same name rather than overwrite it.
    pub fn declare_local(&mut self, name: &str, value: Value) {
        self.current.borrow_mut().variables.insert(name.to_string(), value);
    }

    // ── mixins / functions ───────────────────────────────────────────────

    pub fn define_mixin(&mut self, callable: Callable) {
        self.current
            .borrow_mut()
            .mixins
            .insert(callable.name.clone(), Rc::new(callable));
    }

    pub fn define_function(&mut self, callable: Callable) {
        self.current
            .borrow_mut()
            .functions
            .insert(callable.name.clone(), Rc::new(callable));
    }

    pub fn lookup_mixin(&self, name: &str) -> Option<Rc<Callable>> {
        Self::lookup_mixin_in(&self.current, name)
    }

    fn lookup_mixin_in(scope: &Rc<RefCell<Scope>>, name: &str) -> Option<Rc<Callable>> {
        let s = scope.borrow();
        if let Some(c) = s.mixins.get(name) {
            return Some(c.clone());
        }
        s.parent.as_ref().and_then(|p| Self::lookup_mixin_in(p, name))
    }

    pub fn lookup_function(&self, name: &str) -> Option<Rc<Callable>> {
        Self::lookup_function_in(&self.current, name)
    }

    fn lookup_function_in(scope: &Rc<RefCell<Scope>>, name: &str) -> Option<Rc<Callable>> {
        let s = scope.borrow();
        if let Some(c) = s.functions.get(name) {
            return Some(c.clone());
        }
        s.parent.as_ref().and_then(|p| Self::lookup_function_in(p, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::ast::Params;

    fn callable(name: &str, closure: Rc<RefCell<Scope>>) -> Callable {
        Callable { name: name.to_string(), parameters: Params::default(), body: StmtId(0), closure }
    }

    #[test]
    fn set_variable_writes_to_existing_outer_scope() {
        let mut env = Environment::new();
        env.set_variable("x", Value::number(1.0), false);
        env.push_child();
        env.set_variable("x", Value::number(2.0), false);
        env.pop();
        assert_eq!(env.get_variable("x"), Some(Value::number(2.0)));
    }

    #[test]
    fn undeclared_assignment_creates_local_binding() {
        let mut env = Environment::new();
        env.push_child();
        env.set_variable("y", Value::number(1.0), false);
        env.pop();
        assert_eq!(env.get_variable("y"), None);
    }

    #[test]
    fn global_assignment_always_targets_root() {
        let mut env = Environment::new();
        env.push_child();
        env.push_child();
        env.set_variable("z", Value::number(5.0), true);
        env.pop();
        env.pop();
        assert_eq!(env.get_variable("z"), Some(Value::number(5.0)));
    }

    #[test]
    fn default_is_applicable_when_unset_or_null() {
        let mut env = Environment::new();
        assert!(env.is_default_applicable("w"));
        env.set_variable("w", Value::Null, false);
        assert!(env.is_default_applicable("w"));
        env.set_variable("w", Value::number(1.0), false);
        assert!(!env.is_default_applicable("w"));
    }

    #[test]
    fn mixin_lookup_walks_the_chain() {
        let mut env = Environment::new();
        let root_scope = env.snapshot();
        env.define_mixin(callable("m", root_scope));
        env.push_child();
        assert!(env.lookup_mixin("m").is_some());
    }

    #[test]
    fn declare_local_shadows_without_mutating_outer() {
        let mut env = Environment::new();
        env.set_variable("x", Value::number(1.0), false);
        env.push_child();
        env.declare_local("x", Value::number(9.0));
        assert_eq!(env.get_variable("x"), Some(Value::number(9.0)));
        env.pop();
        assert_eq!(env.get_variable("x"), Some(Value::number(1.0)));
    }
}
