use swc_core::common::{Mark, SyntaxContext};
use swc_core::ecma::ast::*;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Irrelevant,
    /// `require("<assertion module>")`
    AssertionImport,
    /// `<assertion name>(cond, message, ...args)`
    AssertionCall,
}

/// Name-based call matcher. Callees are matched by symbol only, no binding
/// resolution; the assertion name is a reserved convention in the codebase.
#[derive(Debug, Clone)]
pub struct CallClassifier {
    assertion_name: String,
    assertion_module: String,
    dev_flag: String,
    processed: Mark,
}

impl CallClassifier {
    pub fn new(config: &Config, processed: Mark) -> Self {
        Self {
            assertion_name: config.assertion_name.clone(),
            assertion_module: config.assertion_module.clone(),
            dev_flag: config.dev_flag.clone(),
            processed,
        }
    }

    pub fn processed_ctxt(&self) -> SyntaxContext {
        SyntaxContext::empty().apply_mark(self.processed)
    }

    pub fn is_processed(&self, call: &CallExpr) -> bool {
        call.ctxt.has_mark(self.processed)
    }

    pub fn mark_processed(&self, call: &mut CallExpr) {
        call.ctxt = call.ctxt.apply_mark(self.processed);
    }

    pub fn classify(&self, call: &CallExpr) -> CallKind {
        if self.is_processed(call) {
            return CallKind::Irrelevant;
        }
        let Callee::Expr(callee) = &call.callee else {
            return CallKind::Irrelevant;
        };
        let Expr::Ident(id) = &**callee else {
            return CallKind::Irrelevant;
        };
        let name: &str = &id.sym;
        if name == "require" && self.requires_assertion_module(call) {
            CallKind::AssertionImport
        } else if name == self.assertion_name {
            CallKind::AssertionCall
        } else {
            CallKind::Irrelevant
        }
    }

    /// Recognizes an `if` this rewrite produced, by shape alone, so output
    /// from an earlier run is left alone even without our mark:
    ///
    ///   if (!c) { <assertion>(false, "msg", ...) }
    ///   if (!c) { if (<dev flag>) { <assertion>(false, "msg", ...) } else { <helper>("code", ...) } }
    pub fn is_generated_guard(&self, guard: &IfStmt) -> bool {
        if guard.alt.is_some() {
            return false;
        }
        if !matches!(&*guard.test, Expr::Unary(UnaryExpr { op: UnaryOp::Bang, .. })) {
            return false;
        }
        match block_stmts(&guard.cons) {
            [Stmt::Expr(e)] => self.is_dev_variant(&e.expr),
            [Stmt::If(branch)] => self.is_dev_prod_branch(branch),
            _ => false,
        }
    }

    fn is_dev_prod_branch(&self, branch: &IfStmt) -> bool {
        let flag = matches!(&*branch.test, Expr::Ident(i) if &*i.sym == self.dev_flag.as_str());
        let dev = matches!(block_stmts(&branch.cons), [Stmt::Expr(e)] if self.is_dev_variant(&e.expr));
        let prod = matches!(
            branch.alt.as_deref().map(block_stmts),
            Some([Stmt::Expr(e)]) if is_prod_variant(&e.expr)
        );
        flag && dev && prod
    }

    /// `<assertion>(false, "msg", ...)`
    pub fn is_dev_variant(&self, expr: &Expr) -> bool {
        let Expr::Call(call) = expr else {
            return false;
        };
        let named = matches!(
            &call.callee,
            Callee::Expr(e) if matches!(&**e, Expr::Ident(i) if &*i.sym == self.assertion_name.as_str())
        );
        named
            && matches!(
                call.args.as_slice(),
                [
                    ExprOrSpread { spread: None, expr: first },
                    ExprOrSpread { spread: None, expr: second },
                    ..
                ] if matches!(&**first, Expr::Lit(Lit::Bool(Bool { value: false, .. })))
                    && matches!(&**second, Expr::Lit(Lit::Str(_)))
            )
    }

    fn requires_assertion_module(&self, call: &CallExpr) -> bool {
        match call.args.first() {
            Some(ExprOrSpread { spread: None, expr }) => {
                matches!(&**expr, Expr::Lit(Lit::Str(s)) if &*s.value == self.assertion_module.as_str())
            }
            _ => false,
        }
    }
}

fn block_stmts(s: &Stmt) -> &[Stmt] {
    match s {
        Stmt::Block(b) => &b.stmts,
        _ => &[],
    }
}

/// `<helper>("<digits>", ...)`
fn is_prod_variant(expr: &Expr) -> bool {
    let Expr::Call(call) = expr else {
        return false;
    };
    matches!(&call.callee, Callee::Expr(e) if matches!(&**e, Expr::Ident(_)))
        && matches!(
            call.args.first(),
            Some(ExprOrSpread { spread: None, expr })
                if matches!(&**expr, Expr::Lit(Lit::Str(s)) if !s.value.is_empty() && s.value.bytes().all(|b| b.is_ascii_digit()))
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use swc_core::common::{Globals, DUMMY_SP, GLOBALS};

    fn call(callee: &str, args: Vec<Expr>) -> CallExpr {
        CallExpr {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            callee: Callee::Expr(Box::new(Expr::Ident(Ident::new(
                callee.into(),
                DUMMY_SP,
                SyntaxContext::empty(),
            )))),
            args: args
                .into_iter()
                .map(|e| ExprOrSpread {
                    spread: None,
                    expr: Box::new(e),
                })
                .collect(),
            type_args: None,
        }
    }

    fn str_lit(v: &str) -> Expr {
        Expr::Lit(Lit::Str(Str {
            span: DUMMY_SP,
            value: v.into(),
            raw: None,
        }))
    }

    fn with_classifier(f: impl FnOnce(CallClassifier)) {
        GLOBALS.set(&Globals::new(), || {
            f(CallClassifier::new(&Config::default(), Mark::new()))
        });
    }

    #[test]
    fn recognizes_assertion_import() {
        with_classifier(|c| {
            let req = call("require", vec![str_lit("invariant")]);
            assert_eq!(c.classify(&req), CallKind::AssertionImport);
            let other = call("require", vec![str_lit("warning")]);
            assert_eq!(c.classify(&other), CallKind::Irrelevant);
        });
    }

    #[test]
    fn recognizes_assertion_call_by_name() {
        with_classifier(|c| {
            let inv = call("invariant", vec![str_lit("x"), str_lit("msg")]);
            assert_eq!(c.classify(&inv), CallKind::AssertionCall);
            let other = call("warning", vec![str_lit("x"), str_lit("msg")]);
            assert_eq!(c.classify(&other), CallKind::Irrelevant);
        });
    }

    #[test]
    fn processed_calls_are_irrelevant() {
        with_classifier(|c| {
            let mut inv = call("invariant", vec![str_lit("x"), str_lit("msg")]);
            c.mark_processed(&mut inv);
            assert!(c.is_processed(&inv));
            assert_eq!(c.classify(&inv), CallKind::Irrelevant);
        });
    }

    fn bool_lit(v: bool) -> Expr {
        Expr::Lit(Lit::Bool(Bool { span: DUMMY_SP, value: v }))
    }

    fn stmt(e: Expr) -> Stmt {
        Stmt::Expr(ExprStmt { span: DUMMY_SP, expr: Box::new(e) })
    }

    fn block(stmts: Vec<Stmt>) -> Box<Stmt> {
        Box::new(Stmt::Block(BlockStmt {
            span: DUMMY_SP,
            ctxt: SyntaxContext::empty(),
            stmts,
        }))
    }

    fn guard(body: Stmt) -> IfStmt {
        IfStmt {
            span: DUMMY_SP,
            test: Box::new(Expr::Unary(UnaryExpr {
                span: DUMMY_SP,
                op: UnaryOp::Bang,
                arg: Box::new(Expr::Ident(Ident::new("c".into(), DUMMY_SP, SyntaxContext::empty()))),
            })),
            cons: block(vec![body]),
            alt: None,
        }
    }

    fn dev_call() -> Expr {
        Expr::Call(call("invariant", vec![bool_lit(false), str_lit("msg")]))
    }

    #[test]
    fn recognizes_generated_miss_guard() {
        with_classifier(|c| {
            assert!(c.is_generated_guard(&guard(stmt(dev_call()))));
            let fresh = Expr::Call(call("invariant", vec![str_lit("x"), str_lit("msg")]));
            assert!(!c.is_generated_guard(&guard(stmt(fresh))));
        });
    }

    #[test]
    fn recognizes_generated_hit_guard() {
        with_classifier(|c| {
            let branch = Stmt::If(IfStmt {
                span: DUMMY_SP,
                test: Box::new(Expr::Ident(Ident::new("__DEV__".into(), DUMMY_SP, SyntaxContext::empty()))),
                cons: block(vec![stmt(dev_call())]),
                alt: Some(block(vec![stmt(Expr::Call(call("_prodInvariant", vec![str_lit("12")])))])),
            });
            assert!(c.is_generated_guard(&guard(branch)));
        });
    }

    #[test]
    fn other_dev_flags_are_not_generated() {
        with_classifier(|c| {
            let branch = Stmt::If(IfStmt {
                span: DUMMY_SP,
                test: Box::new(Expr::Ident(Ident::new("debug".into(), DUMMY_SP, SyntaxContext::empty()))),
                cons: block(vec![stmt(dev_call())]),
                alt: Some(block(vec![stmt(Expr::Call(call("_prodInvariant", vec![str_lit("12")])))])),
            });
            assert!(!c.is_generated_guard(&guard(branch)));
        });
    }

    #[test]
    fn member_callee_is_irrelevant() {
        with_classifier(|c| {
            let mut inv = call("invariant", vec![str_lit("x"), str_lit("msg")]);
            inv.callee = Callee::Expr(Box::new(Expr::Member(MemberExpr {
                span: DUMMY_SP,
                obj: Box::new(Expr::Ident(Ident::new(
                    "utils".into(),
                    DUMMY_SP,
                    SyntaxContext::empty(),
                ))),
                prop: MemberProp::Ident(IdentName::new("invariant".into(), DUMMY_SP)),
            })));
            assert_eq!(c.classify(&inv), CallKind::Irrelevant);
        });
    }
}
