//! Local scoping for one callable body.
//!
//! Locals live in a single append-only log per callable. A scope is
//! just a watermark into that log: ancestors and the current branch
//! sit below it, dead sibling branches above it. Introducing a local
//! first truncates the log back to the watermark, so a branch that
//! has exited can never leak its locals into a later sibling, then
//! appends the new local and advances the watermark. Register
//! identifiers are reserved in a set that never shrinks, which keeps
//! truncated siblings from sharing a register with their successors.

use std::collections::BTreeSet;

/// Log of the locals of one callable, shared by all of its scopes.
#[derive(Debug, Default)]
pub struct ScopeLog {
    locals: Vec<Binding>,
    reserved: BTreeSet<String>,
}

/// One view into the log. Copies are cheap; a child scope is simply
/// a copy of the parent's watermark.
#[derive(Debug, Clone, Copy)]
pub struct Scope {
    last: usize,
}

#[derive(Debug)]
struct Binding {
    name: String,
    register: String,
}

impl Scope {
    /// The outermost scope of a callable.
    pub fn top() -> Scope {
        Scope { last: 0 }
    }

    /// A scope that sees everything currently visible but whose
    /// introductions do not outlive the branch it is created for.
    pub fn child(&self) -> Scope {
        Scope { last: self.last }
    }
}

impl ScopeLog {
    pub fn new() -> ScopeLog {
        ScopeLog::default()
    }

    /// Finds the register of the last visible local with the given
    /// source name.
    pub fn find(&self, scope: &Scope, name: &str) -> Option<&str> {
        self.locals[..scope.last]
            .iter()
            .rev()
            .find(|binding| binding.name == name)
            .map(|binding| binding.register.as_str())
    }

    /// Introduces a local into the scope and returns its register
    /// identifier. Invalidates all child scopes.
    pub fn introduce(&mut self, scope: &mut Scope, name: &str) -> String {
        self.locals.truncate(scope.last);
        let register = self.reserve(name);
        self.locals.push(Binding {
            name: name.to_owned(),
            register: register.clone(),
        });
        scope.last += 1;
        register
    }

    /// Reserves a register identifier derived from the name, unique
    /// for the whole callable.
    fn reserve(&mut self, name: &str) -> String {
        if self.reserved.insert(name.to_owned()) {
            return name.to_owned();
        }
        let mut attempt = 1usize;
        loop {
            let candidate = format!("{name}_{attempt}");
            if self.reserved.insert(candidate.clone()) {
                return candidate;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_introduction_shadows_earlier_one() {
        let mut log = ScopeLog::new();
        let mut scope = Scope::top();
        assert_eq!(log.introduce(&mut scope, "v"), "v");
        assert_eq!(log.introduce(&mut scope, "v"), "v_1");
        assert_eq!(log.find(&scope, "v"), Some("v_1"));
    }

    #[test]
    fn child_sees_parent_but_not_the_reverse() {
        let mut log = ScopeLog::new();
        let mut parent = Scope::top();
        log.introduce(&mut parent, "outer");
        let mut child = parent.child();
        log.introduce(&mut child, "inner");
        assert_eq!(log.find(&child, "outer"), Some("outer"));
        assert_eq!(log.find(&child, "inner"), Some("inner"));
        assert_eq!(log.find(&parent, "inner"), None);
    }

    #[test]
    fn sibling_branches_never_share_locals_or_registers() {
        let mut log = ScopeLog::new();
        let parent = Scope::top();
        let mut first_branch = parent.child();
        assert_eq!(log.introduce(&mut first_branch, "v"), "v");
        let mut second_branch = parent.child();
        assert_eq!(log.find(&second_branch, "v"), None);
        assert_eq!(log.introduce(&mut second_branch, "v"), "v_1");
    }

    #[test]
    fn introduction_in_the_parent_invalidates_child_locals() {
        let mut log = ScopeLog::new();
        let mut parent = Scope::top();
        let mut child = parent.child();
        log.introduce(&mut child, "branch_local");
        log.introduce(&mut parent, "after");
        assert_eq!(log.find(&parent, "branch_local"), None);
        assert_eq!(log.find(&parent, "after"), Some("after"));
    }
}
