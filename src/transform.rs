use std::sync::Arc;

use swc_core::{
    common::{util::take::Take, Mark, SourceMapper, Span, SyntaxContext, DUMMY_SP},
    ecma::{
        ast::*,
        utils::prepend_stmt,
        visit::{VisitMut, VisitMutWith},
    },
};
use tracing::{debug, error, warn};

use crate::build;
use crate::classify::{CallClassifier, CallKind};
use crate::config::Config;
use crate::error::TransformError;
use crate::fold::{ConcatFolder, StringFolder};
use crate::helper::{HelperBindingManager, UnitNames, UnitState};
use crate::registry::{placeholder_count, CodeRegistry, ReverseIndex};

// -----------------------------------------------------------------------------
// Marks & filename helpers
// -----------------------------------------------------------------------------

/// Hygiene marks the transform works with.
///
/// `processed` tags every call the transform generated or already handled;
/// the classifier skips anything carrying it. `unresolved` is the host's
/// mark for free references (`require`, the dev flag).
#[derive(Debug, Clone, Copy)]
pub struct ProcessedMarks {
    pub processed: Mark,
    pub unresolved: Mark,
}

impl ProcessedMarks {
    pub fn new(unresolved: Mark) -> Self {
        Self {
            processed: Mark::new(),
            unresolved,
        }
    }
}

/// Normalize bundler/debugger style filenames for diagnostics.
fn normalize_filename(filename: &str) -> String {
    let mut s = filename.replace('\\', "/");
    s = s.replace("%5Bproject%5D", "[project]");
    s = s.replace("%5bproject%5d", "[project]");
    if let Some(rest) = s.strip_prefix("file:///") {
        s = rest.to_string();
    } else if let Some(rest) = s.strip_prefix("file://") {
        s = rest.to_string();
    }
    for prefix in &["turbopack/[project]/", "/turbopack/[project]/", "[project]/"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    s
}

/// Looks through any parentheses around an expression.
fn unparen(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(p) = expr {
        expr = &*p.expr;
    }
    expr
}

// -----------------------------------------------------------------------------
// Transform
// -----------------------------------------------------------------------------

/// Rewrites `invariant(cond, "msg", ...args)` statements into
///
/// ```js
/// if (!cond) {
///   if (__DEV__) {
///     invariant(false, "msg", ...args);
///   } else {
///     _prodInvariant("<code>", ...args);
///   }
/// }
/// ```
///
/// or into `if (!cond) { invariant(false, "msg", ...args); }` when the
/// registry has no code for the message yet.
pub struct InvariantTransform<F = ConcatFolder> {
    config: Config,
    classifier: CallClassifier,
    helper: HelperBindingManager,
    folder: F,
    unresolved: SyntaxContext,
    source_map: Option<Arc<dyn SourceMapper>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub rewritten: usize,
    pub hits: usize,
    pub misses: usize,
    pub hoisted: Option<String>,
}

impl InvariantTransform<ConcatFolder> {
    pub fn new(config: Config, marks: ProcessedMarks) -> Self {
        let classifier = CallClassifier::new(&config, marks.processed);
        let unresolved = SyntaxContext::empty().apply_mark(marks.unresolved);
        let helper = HelperBindingManager::new(&config, unresolved, classifier.processed_ctxt());
        Self {
            config,
            classifier,
            helper,
            folder: ConcatFolder,
            unresolved,
            source_map: None,
        }
    }
}

impl<F: StringFolder> InvariantTransform<F> {
    pub fn with_folder<G: StringFolder>(self, folder: G) -> InvariantTransform<G> {
        InvariantTransform {
            config: self.config,
            classifier: self.classifier,
            helper: self.helper,
            folder,
            unresolved: self.unresolved,
            source_map: self.source_map,
        }
    }

    pub fn with_source_map(mut self, source_map: Arc<dyn SourceMapper>) -> Self {
        self.source_map = Some(source_map);
        self
    }

    /// Transforms one compilation unit. The registry is read fresh for the
    /// unit. On error `program` is left exactly as it was.
    pub fn apply(&self, program: &mut Program) -> Result<RewriteSummary, TransformError> {
        let registry = CodeRegistry::load(&self.config.registry_source())?;
        self.apply_with_registry(program, &registry)
    }

    pub fn apply_with_registry(
        &self,
        program: &mut Program,
        registry: &CodeRegistry,
    ) -> Result<RewriteSummary, TransformError> {
        let index = registry.invert();
        let mut out = program.clone();
        let mut pass = UnitPass {
            t: self,
            index: &index,
            names: UnitNames::default(),
            state: UnitState::default(),
            summary: RewriteSummary::default(),
            error: None,
        };
        out.visit_mut_with(&mut pass);

        if let Some(err) = pass.error {
            error!(error = %err, "abandoning invariant rewrite for unit");
            return Err(err);
        }
        *program = out;
        Ok(pass.summary)
    }

    fn location(&self, span: Span) -> String {
        if span.is_dummy() {
            return "unknown:0".to_string();
        }
        match &self.source_map {
            Some(cm) => {
                let lo = cm.lookup_char_pos(span.lo());
                format!("{}:{}", normalize_filename(&lo.file.name.to_string()), lo.line)
            }
            None => "unknown:0".to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// Per-unit pass
// -----------------------------------------------------------------------------

struct UnitPass<'a, F> {
    t: &'a InvariantTransform<F>,
    index: &'a ReverseIndex,
    names: UnitNames,
    state: UnitState,
    summary: RewriteSummary,
    error: Option<TransformError>,
}

impl<F: StringFolder> UnitPass<'_, F> {
    fn fail(&mut self, err: TransformError) {
        self.error.get_or_insert(err);
    }

    fn ensure_helper(&mut self) -> Ident {
        self.t.helper.ensure_binding(&mut self.state, &self.names)
    }

    fn take_declaration(&mut self) -> Option<Stmt> {
        let decl = self.t.helper.declaration(&self.state)?;
        self.summary.hoisted = self.state.helper().map(|id| id.sym.to_string());
        Some(decl)
    }

    fn is_assertion_stmt(&self, s: &Stmt) -> bool {
        match s {
            Stmt::Expr(ExprStmt { expr, .. }) => matches!(
                unparen(expr),
                Expr::Call(c) if self.t.classifier.classify(c) == CallKind::AssertionCall
            ),
            _ => false,
        }
    }

    /// Output of an earlier run: only the user's own expressions inside it
    /// (the condition and the trailing arguments) are visited.
    fn visit_generated_guard(&mut self, guard: &mut IfStmt) {
        guard.test.visit_mut_with(self);
        self.visit_generated_branch(&mut guard.cons);
    }

    fn visit_generated_branch(&mut self, s: &mut Stmt) {
        match s {
            Stmt::Block(b) => {
                for stmt in &mut b.stmts {
                    self.visit_generated_branch(stmt);
                }
            }
            Stmt::If(branch) => {
                self.visit_generated_branch(&mut branch.cons);
                if let Some(alt) = &mut branch.alt {
                    self.visit_generated_branch(alt);
                }
            }
            Stmt::Expr(ExprStmt { expr, .. }) => {
                let skip = if self.t.classifier.is_dev_variant(expr) { 2 } else { 1 };
                if let Expr::Call(call) = &mut **expr {
                    for arg in call.args.iter_mut().skip(skip) {
                        arg.visit_mut_with(self);
                    }
                }
            }
            _ => s.visit_mut_children_with(self),
        }
    }

    fn rewrite(&mut self, stmt_span: Span, call: CallExpr) -> Result<Stmt, TransformError> {
        let location = self.t.location(call.span);
        if call.args.iter().take(2).any(|a| a.spread.is_some()) {
            return Err(TransformError::MalformedAssertionCall {
                span: call.span,
                location,
                reason: "spread in condition or message position",
            });
        }

        let span = call.span;
        let mut args = call.args.into_iter();
        let (Some(condition), Some(message)) = (args.next(), args.next()) else {
            return Err(TransformError::MalformedAssertionCall {
                span,
                location,
                reason: "expected a condition and a message",
            });
        };
        let rest: Vec<ExprOrSpread> = args.collect();

        let message = self
            .t
            .folder
            .fold(&message.expr)
            .ok_or_else(|| TransformError::MessageNotStaticallyFoldable {
                span,
                location: location.clone(),
            })?;
        if placeholder_count(&message) != rest.len() {
            warn!(
                at = %location,
                message = %message,
                args = rest.len(),
                "invariant placeholder count does not match argument count"
            );
        }

        let processed = self.t.classifier.processed_ctxt();
        // Production variant gets its own copy of the trailing arguments.
        let prod_rest = rest.clone();

        let mut dev_args = vec![build::arg(build::bool_lit(false)), build::arg(build::str_lit(&message))];
        dev_args.extend(rest);
        let dev = build::expr_stmt(Expr::Call(build::call(processed, call.callee, dev_args)));

        let index = self.index;
        let body = match index.code_for(&message) {
            None => {
                debug!(at = %location, message = %message, "no error code yet, keeping verbose message");
                self.summary.misses += 1;
                dev
            }
            Some(code) => {
                let helper = self.ensure_helper();
                debug!(at = %location, code = %code, helper = %helper.sym, "replacing invariant message with error code");
                let mut prod_args = vec![build::arg(build::str_lit(code))];
                prod_args.extend(prod_rest);
                let prod = build::expr_stmt(Expr::Call(build::call(
                    processed,
                    Callee::Expr(Box::new(Expr::Ident(helper))),
                    prod_args,
                )));
                self.summary.hits += 1;
                build::if_stmt(
                    DUMMY_SP,
                    build::ident_expr(&self.t.config.dev_flag, self.t.unresolved),
                    build::block(vec![dev]),
                    Some(build::block(vec![prod])),
                )
            }
        };

        self.summary.rewritten += 1;
        Ok(build::if_stmt(
            stmt_span,
            build::negate(condition.expr),
            build::block(vec![body]),
            None,
        ))
    }
}

impl<F: StringFolder> VisitMut for UnitPass<'_, F> {
    fn visit_mut_module(&mut self, m: &mut Module) {
        self.names = UnitNames::collect(&*m);
        self.t.helper.adopt_existing(
            &mut self.state,
            m.body.iter().filter_map(|item| match item {
                ModuleItem::Stmt(s) => Some(s),
                ModuleItem::ModuleDecl(_) => None,
            }),
        );
        m.visit_mut_children_with(self);
        if self.error.is_some() {
            return;
        }
        if let Some(decl) = self.take_declaration() {
            prepend_stmt(&mut m.body, ModuleItem::Stmt(decl));
        }
    }

    fn visit_mut_script(&mut self, s: &mut Script) {
        self.names = UnitNames::collect(&*s);
        self.t.helper.adopt_existing(&mut self.state, &s.body);
        s.visit_mut_children_with(self);
        if self.error.is_some() {
            return;
        }
        if let Some(decl) = self.take_declaration() {
            prepend_stmt(&mut s.body, decl);
        }
    }

    fn visit_mut_stmt(&mut self, s: &mut Stmt) {
        if self.error.is_some() {
            return;
        }
        if let Stmt::If(guard) = s {
            if self.t.classifier.is_generated_guard(guard) {
                self.visit_generated_guard(guard);
                return;
            }
        }
        if !self.is_assertion_stmt(s) {
            s.visit_mut_children_with(self);
            return;
        }
        if let Stmt::Expr(ExprStmt { span, expr }) = s.take() {
            let mut expr = *expr;
            while let Expr::Paren(p) = expr {
                expr = *p.expr;
            }
            if let Expr::Call(mut call) = expr {
                // Nested calls in the arguments are handled before this one.
                call.visit_mut_children_with(self);
                if self.error.is_some() {
                    return;
                }
                match self.rewrite(span, call) {
                    Ok(stmt) => *s = stmt,
                    Err(err) => self.fail(err),
                }
            }
        }
    }

    fn visit_mut_call_expr(&mut self, call: &mut CallExpr) {
        if self.error.is_some() {
            return;
        }
        call.visit_mut_children_with(self);
        match self.t.classifier.classify(call) {
            CallKind::AssertionImport => {
                self.ensure_helper();
                self.t.classifier.mark_processed(call);
            }
            CallKind::AssertionCall => {
                let location = self.t.location(call.span);
                self.fail(TransformError::UnsupportedCallPosition {
                    span: call.span,
                    location,
                });
            }
            CallKind::Irrelevant => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bundler_prefixes() {
        assert_eq!(normalize_filename("file:///src/a.js"), "src/a.js");
        assert_eq!(normalize_filename("file://host/a.js"), "host/a.js");
        assert_eq!(normalize_filename("%5Bproject%5D/src/a.js"), "src/a.js");
        assert_eq!(normalize_filename("/turbopack/%5bproject%5d/lib/c.js"), "lib/c.js");
        assert_eq!(normalize_filename("[project]/src/a.js"), "src/a.js");
        assert_eq!(normalize_filename("src\\b.js"), "src/b.js");
    }
}
