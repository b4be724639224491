//! Derived diagnostics: quantities computed from the driver state.
//!
//! A [`DerivedKind`] recognizes a family of names and turns each into a
//! [`DerivedRecipe`]. The [`DerivedRegistry`] tries its kinds in
//! registration order and produces a [`DerivedPlan`] once, when the
//! diagnostics are built; every timestep then just runs the plan.
//!
//! Names no kind recognizes are logged and skipped, never an error.

use std::fmt;

use gridiag_core::{DriverState, Quantity};
use indexmap::IndexMap;

use crate::column::integrate;
use crate::error::DiagnosticsError;

/// Prefix of column-integral diagnostic names.
pub const COLUMN_INTEGRATED_PREFIX: &str = "column_integrated_";

/// Dycore variable holding layer pressure thickness.
pub const DELP: &str = "delp";

/// A resolved derived diagnostic, ready to run against a state.
pub trait DerivedRecipe: fmt::Debug + Send {
    /// Compute the diagnostic. Inputs are only read.
    fn compute(&self, state: &DriverState) -> Result<Quantity, DiagnosticsError>;
}

/// A family of derived diagnostic names.
pub trait DerivedKind: Send + Sync {
    /// Short name of the family, for logs.
    fn kind(&self) -> &str;

    /// The recipe for `name`, or `None` if this kind does not apply.
    fn parse(&self, name: &str) -> Option<Box<dyn DerivedRecipe>>;
}

// ── Column integral ────────────────────────────────────────────────

/// `column_integrated_<tracer>`: mass-weighted vertical integral of a
/// dycore tracer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColumnIntegratedKind;

impl DerivedKind for ColumnIntegratedKind {
    fn kind(&self) -> &str {
        "column_integrated"
    }

    fn parse(&self, name: &str) -> Option<Box<dyn DerivedRecipe>> {
        let tracer = name.strip_prefix(COLUMN_INTEGRATED_PREFIX)?;
        if tracer.is_empty() {
            return None;
        }
        Some(Box::new(ColumnIntegrated::new(tracer)))
    }
}

/// Column integral of one tracer, weighted by `delp`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnIntegrated {
    tracer: String,
}

impl ColumnIntegrated {
    /// Integrate the dycore variable `tracer`.
    pub fn new(tracer: impl Into<String>) -> Self {
        Self {
            tracer: tracer.into(),
        }
    }

    /// Name of the integrated tracer.
    pub fn tracer(&self) -> &str {
        &self.tracer
    }
}

impl DerivedRecipe for ColumnIntegrated {
    fn compute(&self, state: &DriverState) -> Result<Quantity, DiagnosticsError> {
        let tracer = state.dycore_state.require(&self.tracer)?;
        let delp = state.dycore_state.require(DELP)?;
        Ok(integrate(tracer, delp)?)
    }
}

// ── Registry ───────────────────────────────────────────────────────

/// Ordered set of derived kinds. The default registry knows
/// [`ColumnIntegratedKind`].
pub struct DerivedRegistry {
    kinds: Vec<Box<dyn DerivedKind>>,
}

impl DerivedRegistry {
    /// A registry with no kinds at all.
    pub fn empty() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Add a kind. Earlier kinds win when several accept a name.
    pub fn register(&mut self, kind: Box<dyn DerivedKind>) -> &mut Self {
        self.kinds.push(kind);
        self
    }

    /// Resolve `names` into a plan, warning about every unsupported name.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> DerivedPlan {
        let mut plan = DerivedPlan::default();
        for name in names {
            let name = name.as_ref();
            match self.kinds.iter().find_map(|k| k.parse(name)) {
                Some(recipe) => {
                    plan.entries.push((name.to_string(), recipe));
                }
                None => {
                    log::warn!("{name} is not a supported diagnostic variable.");
                    plan.unsupported.push(name.to_string());
                }
            }
        }
        plan
    }
}

impl Default for DerivedRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ColumnIntegratedKind));
        registry
    }
}

impl fmt::Debug for DerivedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.kinds.iter().map(|k| k.kind()))
            .finish()
    }
}

// ── Plan ───────────────────────────────────────────────────────────

/// Derived diagnostics resolved for one configuration.
#[derive(Debug, Default)]
pub struct DerivedPlan {
    entries: Vec<(String, Box<dyn DerivedRecipe>)>,
    unsupported: Vec<String>,
}

impl DerivedPlan {
    /// Names that will be computed, in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Names that were requested but not recognized.
    pub fn unsupported(&self) -> &[String] {
        &self.unsupported
    }

    /// Returns `true` if nothing will be computed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every recipe against `state`.
    pub fn compute(
        &self,
        state: &DriverState,
    ) -> Result<IndexMap<String, Quantity>, DiagnosticsError> {
        self.entries
            .iter()
            .map(|(name, recipe)| Ok((name.clone(), recipe.compute(state)?)))
            .collect()
    }
}
