//! Mutation driver configuration.

use serde::{Deserialize, Serialize};

/// Knobs for [`crate::mutate_program`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutatorConfig {
    /// Upper bound on instructions rewritten in one round. Each round picks
    /// a count uniformly from `1..=max_simultaneous_mutations`.
    pub max_simultaneous_mutations: usize,
    /// Validate the program after each round.
    pub validate_after_mutation: bool,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            max_simultaneous_mutations: 7,
            validate_after_mutation: cfg!(debug_assertions),
        }
    }
}

impl MutatorConfig {
    pub fn with_max_simultaneous_mutations(mut self, max: usize) -> Self {
        self.max_simultaneous_mutations = max;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate_after_mutation = validate;
        self
    }
}
