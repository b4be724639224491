//! Driver state and grid metadata as seen by the diagnostics layer.

use indexmap::IndexMap;

use crate::error::StateError;
use crate::quantity::Quantity;

/// One named sub-state: variable name to quantity, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubState {
    fields: IndexMap<String, Quantity>,
}

impl SubState {
    /// An empty sub-state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a variable, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, quantity: Quantity) -> Option<Quantity> {
        self.fields.insert(name.into(), quantity)
    }

    /// Look up a variable.
    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.fields.get(name)
    }

    /// Look up a variable that must be present.
    pub fn require(&self, name: &str) -> Result<&Quantity, StateError> {
        self.get(name).ok_or_else(|| StateError::MissingVariable {
            name: name.to_string(),
        })
    }

    /// Whether the variable is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Variable names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no variables are present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Quantity)> for SubState {
    fn from_iter<I: IntoIterator<Item = (S, Quantity)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// The simulation state handed to diagnostics each timestep.
///
/// The driver owns it; diagnostics only borrows it for the duration of
/// a single store call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DriverState {
    /// Dynamical-core prognostic variables (winds, tracers, `delp`, ...).
    pub dycore_state: SubState,
    /// Physics-parameterization variables.
    pub physics_state: SubState,
}

impl DriverState {
    /// Build a state from its two sub-states.
    pub fn new(dycore_state: SubState, physics_state: SubState) -> Self {
        Self {
            dycore_state,
            physics_state,
        }
    }

    /// Resolve a variable against the union of both sub-states.
    ///
    /// A name defined on exactly one sub-state resolves to that quantity.
    /// A name defined on both is [`StateError::AmbiguousVariable`]; on
    /// neither, [`StateError::MissingVariable`].
    pub fn resolve(&self, name: &str) -> Result<&Quantity, StateError> {
        match (self.dycore_state.get(name), self.physics_state.get(name)) {
            (Some(q), None) | (None, Some(q)) => Ok(q),
            (Some(_), Some(_)) => Err(StateError::AmbiguousVariable {
                name: name.to_string(),
            }),
            (None, None) => Err(StateError::MissingVariable {
                name: name.to_string(),
            }),
        }
    }

    /// Resolve several names at once, preserving the requested order.
    pub fn resolve_all<'a, S: AsRef<str>>(
        &'a self,
        names: &[S],
    ) -> Result<IndexMap<String, &'a Quantity>, StateError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.resolve(name).map(|q| (name.to_string(), q))
            })
            .collect()
    }
}

/// Grid geometry that stays constant for the whole run.
#[derive(Clone, Debug, PartialEq)]
pub struct GridData {
    /// Cell-centre latitude.
    pub lat: Quantity,
    /// Cell-centre longitude.
    pub lon: Quantity,
}

impl GridData {
    /// Bundle latitude and longitude fields.
    pub fn new(lat: Quantity, lon: Quantity) -> Self {
        Self { lat, lon }
    }
}
