//! Derived-column templates
//!
//! The number of expected-rate columns, transaction types and percent-of
//! denominators is only known once the input schema is seen. Each derived
//! column is therefore produced from a static template (an output-name
//! pattern plus a typed evaluation) applied to every target column.

use std::fmt;

/// Evaluation of a derived value for a group and a target column index
pub type Eval<C> = fn(&C, usize) -> f64;

/// Output-name pattern `{prefix}{target}{suffix}` with its evaluation
pub struct Template<C> {
    prefix: &'static str,
    suffix: &'static str,
    eval: Eval<C>,
}

impl<C> Template<C> {
    pub const fn new(prefix: &'static str, suffix: &'static str, eval: Eval<C>) -> Self {
        Self {
            prefix,
            suffix,
            eval,
        }
    }

    pub fn output_name(&self, target: &str) -> String {
        format!("{}{}{}", self.prefix, target, self.suffix)
    }
}

/// A template bound to one target column
pub struct Formula<C> {
    name: String,
    target: usize,
    eval: Eval<C>,
}

impl<C> Formula<C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, group: &C) -> f64 {
        (self.eval)(group, self.target)
    }
}

impl<C> Clone for Formula<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            target: self.target,
            eval: self.eval,
        }
    }
}

impl<C> fmt::Debug for Formula<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formula")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish()
    }
}

/// Instantiate every template for every target, template-major.
///
/// No targets, no formulas.
pub fn generate<C>(templates: &[Template<C>], targets: &[String]) -> Vec<Formula<C>> {
    templates
        .iter()
        .flat_map(|template| {
            targets.iter().enumerate().map(move |(idx, target)| Formula {
                name: template.output_name(target),
                target: idx,
                eval: template.eval,
            })
        })
        .collect()
}
