//! Per-run elaboration state.
//!
//! An [`ElaborationContext`] is created once per compilation and threaded
//! through `finalize`. It carries the default clock domain name, the depth
//! limit, the path of modules currently being finalized and the sink that
//! collects warnings. Nothing in it outlives the run.

use kiln_config::ElaborateConfig;
use kiln_diagnostics::{Diagnostic, DiagnosticSink, Origin};
use kiln_ir::{ElabError, ElabResult};

/// Shared mutable state for one elaboration run.
#[derive(Debug)]
pub struct ElaborationContext {
    /// Domain used by `add_sync_default` and by FSMs without an explicit domain.
    pub default_domain: String,
    /// Maximum nesting depth of the module tree.
    pub max_depth: usize,
    /// Modules currently being finalized, outermost first.
    path: Vec<String>,
    /// Collected warnings.
    pub sink: DiagnosticSink,
}

impl ElaborationContext {
    /// Creates a context from the `[elaborate]` configuration table.
    pub fn new(config: &ElaborateConfig) -> Self {
        Self {
            default_domain: config.default_domain.clone(),
            max_depth: config.max_depth,
            path: Vec::new(),
            sink: DiagnosticSink::new(),
        }
    }

    /// Enters a module, failing if the hierarchy becomes too deep.
    pub fn enter(&mut self, name: &str) -> ElabResult<()> {
        self.path.push(name.to_string());
        if self.path.len() > self.max_depth {
            let path = self.path_string();
            self.path.pop();
            return Err(ElabError::HierarchyTooDeep {
                path,
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    /// Leaves the innermost module.
    pub fn exit(&mut self) {
        self.path.pop();
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// The current module path joined with `.`.
    pub fn path_string(&self) -> String {
        self.path.join(".")
    }

    /// An origin pointing at the current module.
    pub fn origin(&self) -> Origin {
        Origin::module(self.path.iter().cloned())
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        self.sink.emit(diag);
    }
}

impl Default for ElaborationContext {
    fn default() -> Self {
        Self::new(&ElaborateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_ir::codes;

    #[test]
    fn defaults_follow_config() {
        let ctx = ElaborationContext::default();
        assert_eq!(ctx.default_domain, "sys");
        assert_eq!(ctx.max_depth, 256);
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    fn enter_and_exit_track_path() {
        let mut ctx = ElaborationContext::default();
        ctx.enter("top").unwrap();
        ctx.enter("uart").unwrap();
        assert_eq!(ctx.path_string(), "top.uart");
        assert_eq!(ctx.origin().path, vec!["top", "uart"]);
        ctx.exit();
        assert_eq!(ctx.path_string(), "top");
    }

    #[test]
    fn depth_limit_enforced() {
        let config = ElaborateConfig {
            default_domain: "sys".into(),
            max_depth: 2,
        };
        let mut ctx = ElaborationContext::new(&config);
        ctx.enter("a").unwrap();
        ctx.enter("b").unwrap();
        let err = ctx.enter("c").unwrap_err();
        assert_eq!(
            err,
            ElabError::HierarchyTooDeep {
                path: "a.b.c".into(),
                max_depth: 2
            }
        );
        assert_eq!(ctx.depth(), 2);
    }

    #[test]
    fn emit_collects_warnings() {
        let ctx = ElaborationContext::default();
        ctx.emit(Diagnostic::warning(codes::W302, "unreachable", ctx.origin()));
        assert_eq!(ctx.sink.len(), 1);
        assert!(!ctx.sink.has_errors());
    }
}
