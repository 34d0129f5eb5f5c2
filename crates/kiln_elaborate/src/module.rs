//! The module builder and the finalize state machine.
//!
//! A [`Module`] accumulates logic into its own [`Fragment`] and owns its
//! submodules. [`Module::finalize_with`] walks the tree bottom-up:
//!
//! 1. finalize every submodule,
//! 2. run the module's final-assembly hook, if any,
//! 3. finalize submodules the hook added,
//! 4. rename clock domains declared by more than one contributor to
//!    `<submodule>_<domain>`,
//! 5. merge every submodule's fragment into the module's own,
//! 6. apply the module's decorators to the merged result.
//!
//! The module then is `Finalized` and accepts no further logic.

use crate::context::ElaborationContext;
use crate::decorate::Decorator;
use kiln_ir::{ClockDomain, ElabError, ElabResult, Fragment, Special, Statement, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, trace};

/// Where a module is in its life cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildState {
    /// Logic and submodules may be added.
    Building,
    /// `finalize` is running; the final-assembly hook may still add logic.
    Finalizing,
    /// The fragment is complete.
    Finalized,
}

/// A final-assembly hook, run once during `finalize` after the module's
/// submodules are finalized and before they are merged.
pub trait Finalizer {
    /// Adds the module's remaining logic.
    fn finalize(self: Box<Self>, module: &mut Module, ctx: &mut ElaborationContext)
        -> ElabResult<()>;
}

impl<F> Finalizer for F
where
    F: FnOnce(&mut Module, &mut ElaborationContext) -> ElabResult<()>,
{
    fn finalize(
        self: Box<Self>,
        module: &mut Module,
        ctx: &mut ElaborationContext,
    ) -> ElabResult<()> {
        (*self)(module, ctx)
    }
}

/// Anything that elaborates to a single flat fragment.
pub trait IntoFragment {
    /// Elaborates `self` with `ctx`.
    fn into_fragment(self, ctx: &mut ElaborationContext) -> ElabResult<Fragment>;
}

impl IntoFragment for Fragment {
    fn into_fragment(self, _ctx: &mut ElaborationContext) -> ElabResult<Fragment> {
        Ok(self)
    }
}

impl IntoFragment for Module {
    fn into_fragment(mut self, ctx: &mut ElaborationContext) -> ElabResult<Fragment> {
        if self.state != BuildState::Finalized {
            self.finalize_with(ctx)?;
        }
        Ok(self.fragment)
    }
}

struct Submodule {
    name: Option<String>,
    module: Module,
}

/// A hardware module under construction.
pub struct Module {
    name: String,
    fragment: Fragment,
    default_sync: Vec<Statement>,
    submodules: Vec<Submodule>,
    finalizer: Option<Box<dyn Finalizer>>,
    decorators: Vec<Decorator>,
    state: BuildState,
}

impl Module {
    /// Creates an empty module. `name` is used in error messages and as the
    /// path component when the module is added anonymously.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fragment: Fragment::new(),
            default_sync: Vec::new(),
            submodules: Vec::new(),
            finalizer: None,
            decorators: Vec::new(),
            state: BuildState::Building,
        }
    }

    /// Wraps an existing fragment.
    pub fn from_fragment(name: impl Into<String>, fragment: Fragment) -> Self {
        Self {
            fragment,
            ..Self::new(name)
        }
    }

    /// The module's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current life-cycle state.
    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Returns `true` once `finalize` has completed.
    pub fn is_finalized(&self) -> bool {
        self.state == BuildState::Finalized
    }

    /// The module's fragment: its own logic while building, the whole
    /// merged subtree once finalized.
    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// Names of submodules, `None` for anonymous ones. Empty once finalized.
    pub fn submodule_names(&self) -> Vec<Option<&str>> {
        self.submodules.iter().map(|s| s.name.as_deref()).collect()
    }

    fn assert_open(&self, what: &str) {
        assert!(
            self.state != BuildState::Finalized,
            "cannot {what} on finalized module `{}`",
            self.name
        );
    }

    /// Appends combinational statements.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_comb(&mut self, stmts: impl IntoIterator<Item = Statement>) {
        self.assert_open("add combinational logic");
        self.fragment.add_comb(stmts);
    }

    /// Appends synchronous statements to `domain`.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_sync(
        &mut self,
        domain: impl Into<String>,
        stmts: impl IntoIterator<Item = Statement>,
    ) {
        self.assert_open("add synchronous logic");
        self.fragment.add_sync(domain, stmts);
    }

    /// Appends synchronous statements to the default domain, resolved from
    /// the elaboration context at finalize time.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_sync_default(&mut self, stmts: impl IntoIterator<Item = Statement>) {
        self.assert_open("add synchronous logic");
        self.default_sync.extend(stmts);
    }

    /// Adds a special.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_special(&mut self, special: impl Into<Special>) {
        self.assert_open("add a special");
        self.fragment.add_special(special.into());
    }

    /// Declares a clock domain.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_clock_domain(&mut self, domain: ClockDomain) {
        self.assert_open("add a clock domain");
        self.fragment.add_clock_domain(domain);
    }

    /// Merges a ready-made fragment into this module.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_fragment(&mut self, fragment: Fragment) {
        self.assert_open("add a fragment");
        self.fragment += fragment;
    }

    /// Adds a submodule, named or anonymous. A named submodule's name must
    /// be unique among its siblings.
    ///
    /// # Panics
    ///
    /// Panics if the module is already finalized.
    pub fn add_submodule(
        &mut self,
        name: Option<&str>,
        module: impl Into<Module>,
    ) -> ElabResult<()> {
        self.assert_open("add a submodule");
        if let Some(name) = name {
            if self.submodules.iter().any(|s| s.name.as_deref() == Some(name)) {
                return Err(ElabError::DuplicateSubmodule {
                    module: self.name.clone(),
                    name: name.to_string(),
                });
            }
        }
        self.submodules.push(Submodule {
            name: name.map(str::to_string),
            module: module.into(),
        });
        Ok(())
    }

    /// Installs the final-assembly hook, replacing any previous one.
    pub fn set_finalizer(&mut self, finalizer: impl Finalizer + 'static) {
        self.finalizer = Some(Box::new(finalizer));
    }

    /// Gates every register of `domain`, submodules included, with `enable`.
    pub fn insert_clock_enable(&mut self, domain: impl Into<String>, enable: impl Into<Value>) {
        self.decorators.push(Decorator::ClockEnable {
            domain: domain.into(),
            enable: enable.into(),
        });
    }

    /// Adds a synchronous reset to every register of `domain`, submodules
    /// included.
    pub fn insert_reset(&mut self, domain: impl Into<String>, reset: impl Into<Value>) {
        self.decorators.push(Decorator::Reset {
            domain: domain.into(),
            reset: reset.into(),
        });
    }

    /// Renames clock domains throughout the module and its submodules.
    pub fn rename_clock_domains<K, V>(&mut self, map: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = map
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<BTreeMap<String, String>>();
        self.decorators.push(Decorator::RenameDomains(map));
    }

    /// Finalizes with a default context.
    pub fn finalize(&mut self) -> ElabResult<()> {
        self.finalize_with(&mut ElaborationContext::default())
    }

    /// Elaborates the module tree into this module's fragment.
    pub fn finalize_with(&mut self, ctx: &mut ElaborationContext) -> ElabResult<()> {
        if self.state != BuildState::Building {
            return Err(ElabError::AlreadyFinalized {
                module: self.path_in(ctx),
            });
        }
        ctx.enter(&self.name)?;
        let result = self.run_finalize(ctx);
        ctx.exit();
        result
    }

    fn path_in(&self, ctx: &ElaborationContext) -> String {
        let parent = ctx.path_string();
        if parent.is_empty() {
            self.name.clone()
        } else {
            format!("{parent}.{}", self.name)
        }
    }

    fn run_finalize(&mut self, ctx: &mut ElaborationContext) -> ElabResult<()> {
        debug!(module = %ctx.path_string(), "finalizing");
        self.state = BuildState::Finalizing;

        self.finalize_submodules(ctx)?;
        if let Some(hook) = self.finalizer.take() {
            hook.finalize(self, ctx)?;
            self.finalize_submodules(ctx)?;
        }

        if !self.default_sync.is_empty() {
            let stmts = std::mem::take(&mut self.default_sync);
            self.fragment.add_sync(ctx.default_domain.clone(), stmts);
        }

        self.resolve_domain_collisions(ctx)?;
        for sub in std::mem::take(&mut self.submodules) {
            self.fragment += sub.module.fragment;
        }
        for decorator in std::mem::take(&mut self.decorators) {
            decorator.apply(&mut self.fragment);
        }
        self.fragment.check_clock_domains()?;

        self.state = BuildState::Finalized;
        Ok(())
    }

    fn finalize_submodules(&mut self, ctx: &mut ElaborationContext) -> ElabResult<()> {
        for sub in &mut self.submodules {
            if !sub.module.is_finalized() {
                if let Some(name) = &sub.name {
                    sub.module.name = name.clone();
                }
                sub.module.finalize_with(ctx)?;
            }
        }
        Ok(())
    }

    /// Renames every clock domain declared by more than one contributor in
    /// the named submodules that declare it.
    ///
    /// This module's own declarations count as a contributor, so a named
    /// child is renamed even when only its parent shares the domain, and an
    /// anonymous child in that position fails with
    /// `AnonymousDomainCollision`. The parent's copy always keeps its name.
    fn resolve_domain_collisions(&mut self, ctx: &ElaborationContext) -> ElabResult<()> {
        let mut declared: BTreeMap<String, usize> = BTreeMap::new();
        for name in self.fragment.declared_domains() {
            *declared.entry(name).or_default() += 1;
        }
        for sub in &self.submodules {
            for name in sub.module.fragment.declared_domains() {
                *declared.entry(name).or_default() += 1;
            }
        }

        for (domain, count) in declared {
            if count < 2 {
                continue;
            }
            for sub in &mut self.submodules {
                if sub.module.fragment.clock_domain(&domain).is_none() {
                    continue;
                }
                let Some(prefix) = &sub.name else {
                    return Err(ElabError::AnonymousDomainCollision {
                        module: ctx.path_string(),
                        domain,
                    });
                };
                let renamed = format!("{prefix}_{domain}");
                trace!(from = %domain, to = %renamed, "renaming colliding clock domain");
                sub.module.fragment.rename_clock_domain(&domain, &renamed);
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("submodules", &self.submodule_names())
            .field("fragment", &self.fragment)
            .finish_non_exhaustive()
    }
}

impl From<Fragment> for Module {
    fn from(fragment: Fragment) -> Self {
        Module::from_fragment("fragment", fragment)
    }
}
