//! Dependency graph construction and topological sorting

use crate::config::{BringupFile, IncludeConfig};
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};

/// An enabled include with its direct dependencies
#[derive(Debug, Clone)]
pub struct ResolvedInclude {
    pub name: String,
    pub config: IncludeConfig,
    pub dependencies: Vec<String>,
}

/// Dependency graph for enabled includes
#[derive(Debug)]
pub struct DependencyGraph {
    /// Includes in topological order
    pub includes: Vec<ResolvedInclude>,
}

impl DependencyGraph {
    /// Build a dependency graph from a profile
    pub fn build(profile: &BringupFile, enabled: &HashSet<String>) -> Result<Self, DependencyError> {
        let mut resolved: IndexMap<String, ResolvedInclude> = IndexMap::new();

        for (name, config) in &profile.includes {
            if !enabled.contains(name) {
                continue;
            }

            resolved.insert(
                name.clone(),
                ResolvedInclude {
                    name: name.clone(),
                    config: config.clone(),
                    dependencies: config.depends_on.clone(),
                },
            );
        }

        // All dependencies must be enabled too
        for (name, include) in &resolved {
            for dep_name in &include.dependencies {
                if resolved.contains_key(dep_name) {
                    continue;
                }
                if profile.includes.contains_key(dep_name) {
                    return Err(DependencyError::DisabledDependency {
                        include: name.clone(),
                        dependency: dep_name.clone(),
                    });
                }
                return Err(DependencyError::UnknownDependency {
                    include: name.clone(),
                    dependency: dep_name.clone(),
                });
            }
        }

        let includes = Self::topological_sort(&resolved)?;
        Ok(Self { includes })
    }

    /// Kahn's algorithm; among ready includes the earliest declared leaves first
    fn topological_sort(
        includes: &IndexMap<String, ResolvedInclude>,
    ) -> Result<Vec<ResolvedInclude>, DependencyError> {
        let mut in_degree: Vec<usize> = includes
            .values()
            .map(|include| include.dependencies.len())
            .collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); includes.len()];

        for (index, include) in includes.values().enumerate() {
            for dep_name in &include.dependencies {
                if let Some(dep_index) = includes.get_index_of(dep_name) {
                    dependents[dep_index].push(index);
                }
            }
        }

        // Keyed by declaration index
        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(index, _)| index)
            .collect();

        let mut sorted: Vec<ResolvedInclude> = Vec::with_capacity(includes.len());

        while let Some(index) = ready.pop_first() {
            if let Some((_, include)) = includes.get_index(index) {
                sorted.push(include.clone());
            }

            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if sorted.len() != includes.len() {
            let sorted_names: HashSet<&str> = sorted.iter().map(|n| n.name.as_str()).collect();
            let cycle: Vec<String> = includes
                .keys()
                .filter(|name| !sorted_names.contains(name.as_str()))
                .cloned()
                .collect();

            return Err(DependencyError::CyclicDependency(cycle));
        }

        Ok(sorted)
    }

    /// Get the launch order
    pub fn launch_order(&self) -> impl Iterator<Item = &ResolvedInclude> {
        self.includes.iter()
    }

    /// Get the shutdown order (reverse of launch order)
    pub fn shutdown_order(&self) -> impl Iterator<Item = &ResolvedInclude> {
        self.includes.iter().rev()
    }
}

/// Errors that can occur when building the dependency graph
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Include '{include}' depends on unknown include '{dependency}'")]
    UnknownDependency { include: String, dependency: String },

    #[error("Include '{include}' depends on disabled include '{dependency}'")]
    DisabledDependency { include: String, dependency: String },

    #[error("Cyclic dependency detected involving includes: {}", .0.join(", "))]
    CyclicDependency(Vec<String>),
}
