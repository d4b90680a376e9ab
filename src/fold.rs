use swc_core::ecma::ast::*;

/// Reduces an expression to a constant string, or reports that it can't.
pub trait StringFolder {
    fn fold(&self, expr: &Expr) -> Option<String>;
}

/// Folds string literals, `+` concatenation, parentheses and template
/// literals whose substitutions fold themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatFolder;

impl StringFolder for ConcatFolder {
    fn fold(&self, expr: &Expr) -> Option<String> {
        match expr {
            Expr::Lit(Lit::Str(s)) => Some(s.value.to_string()),
            Expr::Paren(p) => self.fold(&p.expr),
            Expr::Bin(b) if b.op == BinaryOp::Add => {
                let mut out = self.fold(&b.left)?;
                out.push_str(&self.fold(&b.right)?);
                Some(out)
            }
            Expr::Tpl(t) => {
                let mut out = String::new();
                for (idx, quasi) in t.quasis.iter().enumerate() {
                    out.push_str(&quasi.cooked.as_ref()?.to_string());
                    if let Some(e) = t.exprs.get(idx) {
                        out.push_str(&self.fold(e)?);
                    }
                }
                Some(out)
            }
            _ => None,
        }
    }
}
