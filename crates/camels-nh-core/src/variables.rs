use std::collections::{HashMap, HashSet};

use crate::config::DatasetConfig;

/// Temperature-like variables that get daily `_max` and `_min` companions
/// unless `dataset.extreme_vars` overrides them.
pub const DEFAULT_EXTREME_VARS: [&str; 2] = ["t", "tmean"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

/// Classification rules shared by every source of a run.
#[derive(Debug, Clone, Default)]
pub struct VariablePolicy {
    sum_vars: HashSet<String>,
    mean_vars: HashSet<String>,
    repeated_vars: HashSet<String>,
    extreme_vars: HashSet<String>,
}

impl VariablePolicy {
    /// `mean_vars` is derived as `input_vars` minus `sum_vars`; names occurring
    /// more than once in `input_vars` are the repeated set.
    pub fn new<S: AsRef<str>>(input_vars: &[S], sum_vars: &[S], extreme_vars: &[S]) -> Self {
        let sum_vars: HashSet<String> = sum_vars.iter().map(|v| v.as_ref().to_string()).collect();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for var in input_vars {
            *counts.entry(var.as_ref()).or_insert(0) += 1;
        }
        let repeated_vars = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(name, _)| (*name).to_string())
            .collect();

        let mean_vars = input_vars
            .iter()
            .map(|v| v.as_ref())
            .filter(|v| !sum_vars.contains(*v))
            .map(str::to_string)
            .collect();

        Self {
            sum_vars,
            mean_vars,
            repeated_vars,
            extreme_vars: extreme_vars.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }

    pub fn from_config(dataset: &DatasetConfig) -> Self {
        match &dataset.extreme_vars {
            Some(extreme) => Self::new(&dataset.input_vars, &dataset.sum_vars, extreme),
            None => {
                let extreme: Vec<String> =
                    DEFAULT_EXTREME_VARS.iter().map(|v| v.to_string()).collect();
                Self::new(&dataset.input_vars, &dataset.sum_vars, &extreme)
            }
        }
    }

    /// `None` means the variable is unclassified and dropped on reduction.
    pub fn classify(&self, var: &str) -> Option<Aggregation> {
        if self.sum_vars.contains(var) {
            Some(Aggregation::Sum)
        } else if self.mean_vars.contains(var) {
            Some(Aggregation::Mean)
        } else {
            None
        }
    }

    pub fn is_repeated(&self, var: &str) -> bool {
        self.repeated_vars.contains(var)
    }

    pub fn is_extreme(&self, var: &str) -> bool {
        self.extreme_vars.contains(var)
    }

    pub fn output_name(&self, var: &str, source_tag: &str) -> String {
        if self.is_repeated(var) {
            format!("{var}_{source_tag}")
        } else {
            var.to_string()
        }
    }

    /// `(max, min)` column names for a temperature-like variable.
    pub fn companion_names(&self, var: &str, source_tag: &str) -> (String, String) {
        let companion = |suffix: &str| {
            let name = format!("{var}_{suffix}");
            if self.is_repeated(var) || self.is_repeated(&name) {
                format!("{name}_{source_tag}")
            } else {
                name
            }
        };
        (companion("max"), companion("min"))
    }
}
