//! Small constructors for the nodes the rewrite synthesizes.

use swc_core::common::{Span, SyntaxContext, DUMMY_SP};
use swc_core::ecma::ast::*;

pub fn str_lit(value: &str) -> Box<Expr> {
    Box::new(Expr::Lit(Lit::Str(Str {
        span: DUMMY_SP,
        value: value.into(),
        raw: None,
    })))
}

pub fn bool_lit(value: bool) -> Box<Expr> {
    Box::new(Expr::Lit(Lit::Bool(Bool {
        span: DUMMY_SP,
        value,
    })))
}

pub fn ident_expr(name: &str, ctxt: SyntaxContext) -> Box<Expr> {
    Box::new(Expr::Ident(Ident::new(name.into(), DUMMY_SP, ctxt)))
}

pub fn arg(expr: Box<Expr>) -> ExprOrSpread {
    ExprOrSpread { spread: None, expr }
}

pub fn call(ctxt: SyntaxContext, callee: Callee, args: Vec<ExprOrSpread>) -> CallExpr {
    CallExpr {
        span: DUMMY_SP,
        ctxt,
        callee,
        args,
        type_args: None,
    }
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    Stmt::Expr(ExprStmt {
        span: DUMMY_SP,
        expr: Box::new(expr),
    })
}

pub fn block(stmts: Vec<Stmt>) -> Box<Stmt> {
    Box::new(Stmt::Block(BlockStmt {
        span: DUMMY_SP,
        ctxt: SyntaxContext::empty(),
        stmts,
    }))
}

pub fn if_stmt(span: Span, test: Box<Expr>, cons: Box<Stmt>, alt: Option<Box<Stmt>>) -> Stmt {
    Stmt::If(IfStmt {
        span,
        test,
        cons,
        alt,
    })
}

/// `!expr`, parenthesised unless the operand already binds tighter than `!`.
pub fn negate(expr: Box<Expr>) -> Box<Expr> {
    let arg = match &*expr {
        Expr::Ident(_)
        | Expr::Lit(_)
        | Expr::Member(_)
        | Expr::Call(_)
        | Expr::Paren(_)
        | Expr::Unary(_)
        | Expr::This(_)
        | Expr::Array(_)
        | Expr::Object(_)
        | Expr::Tpl(_) => expr,
        _ => Box::new(Expr::Paren(ParenExpr {
            span: DUMMY_SP,
            expr,
        })),
    };
    Box::new(Expr::Unary(UnaryExpr {
        span: DUMMY_SP,
        op: UnaryOp::Bang,
        arg,
    }))
}

/// `var <name> = <init>;`
pub fn var_decl(name: Ident, init: Box<Expr>) -> Stmt {
    Stmt::Decl(Decl::Var(Box::new(VarDecl {
        span: DUMMY_SP,
        kind: VarDeclKind::Var,
        declare: false,
        decls: vec![VarDeclarator {
            span: DUMMY_SP,
            name: Pat::Ident(BindingIdent {
                id: name,
                type_ann: None,
            }),
            init: Some(init),
            definite: false,
        }],
        ctxt: SyntaxContext::empty(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negate_keeps_simple_operands_bare() {
        let e = negate(ident_expr("cond", SyntaxContext::empty()));
        let Expr::Unary(u) = &*e else { panic!("expected unary") };
        assert_eq!(u.op, UnaryOp::Bang);
        assert!(matches!(&*u.arg, Expr::Ident(_)));
    }

    #[test]
    fn negate_parenthesises_binary_operands() {
        let bin = Box::new(Expr::Bin(BinExpr {
            span: DUMMY_SP,
            op: BinaryOp::LogicalAnd,
            left: ident_expr("a", SyntaxContext::empty()),
            right: ident_expr("b", SyntaxContext::empty()),
        }));
        let e = negate(bin);
        let Expr::Unary(u) = &*e else { panic!("expected unary") };
        assert!(matches!(&*u.arg, Expr::Paren(_)));
    }
}
