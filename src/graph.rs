// src/graph.rs

//! The dependency graph engine.
//!
//! Nodes are `name@version`; edges carry only names. An edge resolves to
//! the first node in insertion order whose name matches; version
//! disambiguation is not attempted. Ordering uses Kahn's algorithm with
//! FIFO processing, so ties break by insertion order and the output is
//! deterministic for a given input sequence. The engine never refuses to
//! proceed: unresolved names are tolerated and cycle leftovers are
//! appended (with a warning) rather than blocking a world rebuild.

use crate::recipe::Recipe;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tracing::{debug, warn};

/// One graph node: a recipe identity plus where it came from.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub version: String,
    pub recipe_dir: PathBuf,
}

impl Node {
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    /// First node index claiming each name.
    by_name: HashMap<String, usize>,
    /// Resolved edges: dependency index -> dependent indices.
    dependents: Vec<Vec<usize>>,
    /// Number of resolved dependencies per node.
    in_degree: Vec<usize>,
    /// Declared dependency names per node, resolved or not.
    depends: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an ordered recipe set.
    pub fn from_recipes(recipes: &[Recipe]) -> Self {
        let mut graph = Self::new();
        for recipe in recipes {
            graph.add_node(recipe);
        }
        graph.resolve_edges();
        graph
    }

    fn add_node(&mut self, recipe: &Recipe) {
        let index = self.nodes.len();
        self.by_name.entry(recipe.name.clone()).or_insert(index);
        self.nodes.push(Node {
            name: recipe.name.clone(),
            version: recipe.version.clone(),
            recipe_dir: recipe.recipe_dir.clone(),
        });
        self.dependents.push(Vec::new());
        self.in_degree.push(0);
        self.depends.push(recipe.depends.clone());
    }

    fn resolve_edges(&mut self) {
        for dependent in 0..self.nodes.len() {
            for dep_name in self.depends[dependent].clone() {
                match self.by_name.get(&dep_name) {
                    Some(&dep) if dep != dependent => {
                        self.dependents[dep].push(dependent);
                        self.in_degree[dependent] += 1;
                    }
                    Some(_) => {
                        debug!(
                            "{} depends on itself, edge ignored",
                            self.nodes[dependent].label()
                        );
                    }
                    None => {
                        // The name is not in the input set; the node still
                        // participates with one dependency fewer.
                        debug!(
                            "{} depends on '{dep_name}', not in the input set",
                            self.nodes[dependent].label()
                        );
                    }
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Kahn's algorithm: nodes in the order their in-degree reaches zero.
    ///
    /// Cycle members never reach zero; they are appended in insertion
    /// order after a warning so the caller can still make best-effort
    /// progress.
    pub fn topo_order(&self) -> Vec<&Node> {
        let mut in_degree = self.in_degree.clone();
        let mut queue: VecDeque<usize> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut emitted = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(index) = queue.pop_front() {
            emitted[index] = true;
            order.push(&self.nodes[index]);
            for &dependent in &self.dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<String> = (0..self.nodes.len())
                .filter(|&i| !emitted[i])
                .map(|i| self.nodes[i].label())
                .collect();
            warn!(
                "dependency cycle among {{{}}}, appending in declaration order",
                stuck.join(", ")
            );
            for i in 0..self.nodes.len() {
                if !emitted[i] {
                    order.push(&self.nodes[i]);
                }
            }
        }

        order
    }
}
