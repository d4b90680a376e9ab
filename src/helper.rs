//! Hoisted production helper binding, at most one per compilation unit:
//!
//!   var _prodInvariant = require("reactProdInvariant");

use std::collections::HashSet;

use swc_core::common::{Mark, SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{Visit, VisitWith};
use tracing::debug;

use crate::build;
use crate::config::Config;

/// Per-unit transform state. Created when a unit's traversal starts and
/// dropped with it.
#[derive(Debug, Default)]
pub struct UnitState {
    helper: Option<Ident>,
    /// The binding was found already declared in the unit.
    adopted: bool,
}

impl UnitState {
    pub fn helper(&self) -> Option<&Ident> {
        self.helper.as_ref()
    }
}

/// Every identifier name appearing in a unit. Used to pick a helper name
/// that neither shadows nor is shadowed by anything the unit refers to.
#[derive(Debug, Default)]
pub struct UnitNames {
    names: HashSet<String>,
}

impl UnitNames {
    pub fn collect<N: VisitWith<NameCollector>>(node: &N) -> Self {
        let mut collector = NameCollector::default();
        node.visit_with(&mut collector);
        Self {
            names: collector.names,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// `_base`, then `_base2`, `_base3`, ... until unused.
    pub fn fresh(&self, base: &str) -> String {
        let mut i = 1usize;
        loop {
            let candidate = if i > 1 {
                format!("_{base}{i}")
            } else {
                format!("_{base}")
            };
            if !self.contains(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }
}

#[derive(Default)]
pub struct NameCollector {
    names: HashSet<String>,
}

impl Visit for NameCollector {
    fn visit_ident(&mut self, n: &Ident) {
        self.names.insert(n.sym.to_string());
    }
}

#[derive(Debug, Clone)]
pub struct HelperBindingManager {
    base_name: String,
    module: String,
    unresolved: SyntaxContext,
    processed: SyntaxContext,
}

impl HelperBindingManager {
    pub fn new(config: &Config, unresolved: SyntaxContext, processed: SyntaxContext) -> Self {
        Self {
            base_name: config.helper_name.clone(),
            module: config.helper_module.clone(),
            unresolved,
            processed,
        }
    }

    /// Returns the unit's helper binding, creating it on first use.
    pub fn ensure_binding(&self, state: &mut UnitState, names: &UnitNames) -> Ident {
        if let Some(id) = &state.helper {
            return id.clone();
        }
        let name = names.fresh(&self.base_name);
        debug!(binding = %name, module = %self.module, "hoisting production helper");
        let id = Ident::new(
            name.into(),
            DUMMY_SP,
            SyntaxContext::empty().apply_mark(Mark::new()),
        );
        state.helper = Some(id.clone());
        id
    }

    /// Picks up a top-level `var <id> = require("<helper module>")` left by an
    /// earlier run, so the unit keeps a single binding.
    pub fn adopt_existing<'a>(
        &self,
        state: &mut UnitState,
        stmts: impl IntoIterator<Item = &'a Stmt>,
    ) {
        for stmt in stmts {
            let Stmt::Decl(Decl::Var(var)) = stmt else {
                continue;
            };
            for decl in &var.decls {
                let (Pat::Ident(name), Some(init)) = (&decl.name, &decl.init) else {
                    continue;
                };
                if self.is_helper_require(init) {
                    debug!(binding = %name.id.sym, "reusing hoisted production helper");
                    state.helper = Some(name.id.clone());
                    state.adopted = true;
                    return;
                }
            }
        }
    }

    fn is_helper_require(&self, init: &Expr) -> bool {
        let Expr::Call(call) = init else {
            return false;
        };
        let callee = matches!(
            &call.callee,
            Callee::Expr(e) if matches!(&**e, Expr::Ident(i) if &*i.sym == "require")
        );
        callee
            && matches!(
                call.args.as_slice(),
                [ExprOrSpread { spread: None, expr }]
                    if matches!(&**expr, Expr::Lit(Lit::Str(s)) if &*s.value == self.module.as_str())
            )
    }

    /// The top-level declaration for the binding recorded in `state`, unless
    /// the unit already declares it.
    pub fn declaration(&self, state: &UnitState) -> Option<Stmt> {
        if state.adopted {
            return None;
        }
        let id = state.helper.clone()?;
        let require = build::call(
            self.processed,
            Callee::Expr(build::ident_expr("require", self.unresolved)),
            vec![build::arg(build::str_lit(&self.module))],
        );
        Some(build::var_decl(id, Box::new(Expr::Call(require))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_core::common::{Globals, GLOBALS};

    fn manager() -> HelperBindingManager {
        HelperBindingManager::new(
            &Config::default(),
            SyntaxContext::empty(),
            SyntaxContext::empty(),
        )
    }

    fn names(list: &[&str]) -> UnitNames {
        UnitNames {
            names: list.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn fresh_name_skips_taken_names() {
        assert_eq!(names(&[]).fresh("prodInvariant"), "_prodInvariant");
        assert_eq!(
            names(&["_prodInvariant", "_prodInvariant2"]).fresh("prodInvariant"),
            "_prodInvariant3"
        );
    }

    #[test]
    fn binding_is_created_once_per_unit() {
        GLOBALS.set(&Globals::new(), || {
            let m = manager();
            let mut state = UnitState::default();
            assert!(m.declaration(&state).is_none());

            let first = m.ensure_binding(&mut state, &names(&[]));
            let second = m.ensure_binding(&mut state, &names(&[]));
            assert_eq!(first.sym, second.sym);
            assert_eq!(first.ctxt, second.ctxt);
            assert_eq!(&*first.sym, "_prodInvariant");

            let Some(Stmt::Decl(Decl::Var(v))) = m.declaration(&state) else {
                panic!("expected a var declaration");
            };
            assert_eq!(v.decls.len(), 1);
        });
    }

    #[test]
    fn existing_declaration_is_adopted() {
        GLOBALS.set(&Globals::new(), || {
            let m = manager();
            let mut first = UnitState::default();
            m.ensure_binding(&mut first, &names(&[]));
            let decl = m.declaration(&first).unwrap();

            let mut state = UnitState::default();
            m.adopt_existing(&mut state, [&decl]);
            let id = m.ensure_binding(&mut state, &names(&["_prodInvariant"]));
            assert_eq!(&*id.sym, "_prodInvariant");
            assert!(m.declaration(&state).is_none());
        });
    }

    #[test]
    fn unrelated_requires_are_not_adopted() {
        GLOBALS.set(&Globals::new(), || {
            let m = manager();
            let other = build::var_decl(
                Ident::new("x".into(), DUMMY_SP, SyntaxContext::empty()),
                Box::new(Expr::Call(build::call(
                    SyntaxContext::empty(),
                    Callee::Expr(build::ident_expr("require", SyntaxContext::empty())),
                    vec![build::arg(build::str_lit("warning"))],
                ))),
            );
            let mut state = UnitState::default();
            m.adopt_existing(&mut state, [&other]);
            assert!(state.helper().is_none());
        });
    }

    #[test]
    fn fresh_unit_state_starts_empty() {
        GLOBALS.set(&Globals::new(), || {
            let m = manager();
            let mut a = UnitState::default();
            m.ensure_binding(&mut a, &names(&[]));
            let b = UnitState::default();
            assert!(a.helper().is_some());
            assert!(b.helper().is_none());
        });
    }
}
