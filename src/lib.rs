//! SWC plugin that splits `invariant(cond, "message", ...args)` assertions
//! into a verbose development branch and a production branch that ships a
//! numeric error code instead of the message text.

use std::sync::Arc;

use swc_core::{
    common::{errors::HANDLER, SourceMapper},
    ecma::ast::Program,
    plugin::{plugin_transform, proxies::TransformPluginProgramMetadata},
};

mod build;
pub mod classify;
pub mod config;
pub mod error;
pub mod fold;
pub mod helper;
pub mod registry;
pub mod transform;

pub use classify::{CallClassifier, CallKind};
pub use config::Config;
pub use error::TransformError;
pub use fold::{ConcatFolder, StringFolder};
pub use registry::{CodeRegistry, RegistrySource, ReverseIndex};
pub use transform::{InvariantTransform, ProcessedMarks, RewriteSummary};

// -----------------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------------

#[plugin_transform]
pub fn process_transform(mut program: Program, metadata: TransformPluginProgramMetadata) -> Program {
    let config = match metadata.get_transform_plugin_config() {
        Some(raw) => Config::from_json(&raw),
        None => Ok(Config::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            report(&err);
            return program;
        }
    };

    let source_map: Arc<dyn SourceMapper> = Arc::new(metadata.source_map);
    let transform = InvariantTransform::new(config, ProcessedMarks::new(metadata.unresolved_mark))
        .with_source_map(source_map);

    // On failure the unit comes back untouched.
    if let Err(err) = transform.apply(&mut program) {
        report(&err);
    }
    program
}

fn report(err: &TransformError) {
    let msg = err.to_string();
    HANDLER.with(|handler| match err.span() {
        Some(span) => handler.struct_span_err(span, &msg).emit(),
        None => handler.err(&msg),
    });
}
