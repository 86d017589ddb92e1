//! Built-in renderer.
//!
//! topogen specifies no template language; the bundled renderer writes a
//! deterministic JSON rendering of the context so the daemon is complete
//! end-to-end. Anything fancier plugs in through the same
//! [`TemplateRenderer`] seam.

use std::io::Write;

use tracing::{error, info};

use topogen_core::config::Config;
use topogen_core::context::Context;
use topogen_engine::TemplateRenderer;

/// Renders the context as pretty-printed JSON at `config.dest`.
///
/// The destination is only rewritten when its bytes would change. An empty
/// `dest` dumps to stdout (and always counts as changed). Write errors are
/// logged; the change answer stays the byte comparison result.
pub struct ContextDumpRenderer;

impl ContextDumpRenderer {
    fn render(ctx: &Context) -> Option<Vec<u8>> {
        match serde_json::to_vec_pretty(ctx) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                Some(bytes)
            }
            Err(e) => {
                error!(error = %e, "error rendering context");
                None
            }
        }
    }
}

impl TemplateRenderer for ContextDumpRenderer {
    fn generate_file(&self, config: &Config, ctx: &Context) -> bool {
        let Some(rendered) = Self::render(ctx) else {
            return false;
        };

        if config.dest.is_empty() {
            if let Err(e) = std::io::stdout().write_all(&rendered) {
                error!(error = %e, "error writing context to stdout");
            }
            return true;
        }

        let previous = std::fs::read(&config.dest).ok();
        let changed = previous.as_deref() != Some(rendered.as_slice());
        if changed {
            if let Err(e) = std::fs::write(&config.dest, &rendered) {
                error!(dest = %config.dest, error = %e, "error writing destination file");
            } else {
                info!(
                    dest = %config.dest,
                    bytes = rendered.len(),
                    "destination file written"
                );
            }
        }
        changed
    }
}
