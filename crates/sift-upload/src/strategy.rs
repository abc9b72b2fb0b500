use std::fmt::Debug;

use crate::check::{CheckContext, CheckResult, CheckerSet};

/// Outcome of one [`CheckingStrategy::apply`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Passes over unchecked files.
    pub passes: usize,
    pub files_checked: usize,
    pub workspace_checked: bool,
    /// Files still unchecked because the pass limit was reached.
    pub pending: usize,
}

impl PassSummary {
    pub fn is_noop(&self) -> bool {
        self.passes == 0 && !self.workspace_checked
    }
}

/// Decides how checkers are run over a workspace.
pub trait CheckingStrategy: Send + Sync + Debug {
    fn apply(&self, ctx: &mut CheckContext<'_>, checkers: &CheckerSet) -> CheckResult<PassSummary>;
}

/// Checks unchecked files one at a time in index order, running every
/// checker's hook chain on a file before moving to the next.
///
/// A file is checked once per change. Files created during a pass are picked
/// up by the next one, up to `max_passes`. Workspace hooks run once at the end. An index with no
/// unchecked files that has not changed since the last call is left alone.
#[derive(Clone, Copy, Debug)]
pub struct Sequential {
    max_passes: usize,
}

impl Default for Sequential {
    fn default() -> Self {
        Self { max_passes: 8 }
    }
}

impl Sequential {
    pub fn new(max_passes: usize) -> Self {
        Self {
            max_passes: max_passes.max(1),
        }
    }
}

impl CheckingStrategy for Sequential {
    fn apply(&self, ctx: &mut CheckContext<'_>, checkers: &CheckerSet) -> CheckResult<PassSummary> {
        let mut summary = PassSummary::default();
        if ctx.index().unchecked().is_empty() && !ctx.index().is_dirty() {
            tracing::debug!("nothing changed, skipping checks");
            return Ok(summary);
        }

        while summary.passes < self.max_passes {
            let pending = ctx.index().unchecked();
            if pending.is_empty() {
                break;
            }
            summary.passes += 1;
            tracing::debug!(pass = summary.passes, files = pending.len(), "checking files");

            for key in pending {
                let still_pending = ctx
                    .index()
                    .get(&key)
                    .is_some_and(|r| r.is_active() && !r.flags.is_checked);
                if !still_pending {
                    continue;
                }

                ctx.begin_file(key);
                for at in 0..checkers.len() {
                    if !checkers.run_file_hooks(at, ctx)? {
                        break;
                    }
                }
                ctx.finish_file();
                summary.files_checked += 1;
            }
        }

        summary.pending = ctx.index().unchecked().len();
        if summary.pending > 0 {
            tracing::warn!(
                pending = summary.pending,
                passes = summary.passes,
                "pass limit reached with files still unchecked"
            );
        }

        for at in 0..checkers.len() {
            checkers.run_workspace_hook(at, ctx)?;
        }
        summary.workspace_checked = true;
        ctx.contents_mut().index.clear_dirty();

        tracing::debug!(?summary, "checks finished");
        Ok(summary)
    }
}
