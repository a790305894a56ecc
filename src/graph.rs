//! Dependency resolver (spec §4.3, component C3).
//!
//! Builds the directed dependency graph over container-configuration
//! instances, synthetic attached-volume nodes, and synthetic network
//! nodes; produces the forward (dependency-first) and reverse
//! (dependent-first) traversal orders the Action generator family needs,
//! and detects cycles.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;

use crate::error::{LandscapeError, LandscapeResult};
use crate::model::container::UseTarget;
use crate::model::map::ContainerMap;
use crate::model::merge::expand;
use crate::model::NetworkMode;

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeId {
    /// One instance of a container configuration (`instance` is `None`
    /// for the single default instance).
    Container {
        config: String,
        instance: Option<String>,
    },
    /// A materialized attached volume, owned by `owner`.
    AttachedVolume { owner: String, alias: String },
    /// A user-defined network.
    Network { name: String },
}

impl NodeId {
    pub fn display_name(&self) -> String {
        match self {
            Self::Container { config, instance } => match instance {
                Some(i) => format!("{config}.{i}"),
                None => config.clone(),
            },
            Self::AttachedVolume { owner, alias } => format!("{owner}~{alias}"),
            Self::Network { name } => format!("network:{name}"),
        }
    }
}

/// The directed dependency DAG for one [`ContainerMap`].
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// All known nodes, in declaration order (used as the tie-break for
    /// traversal ordering).
    pub nodes: IndexSet<NodeId>,
    /// dependent -> its dependencies (edges point toward what must exist
    /// first).
    edges: HashMap<NodeId, Vec<NodeId>>,
}

impl DependencyGraph {
    fn add_node(&mut self, node: NodeId) {
        self.edges.entry(node.clone()).or_default();
        self.nodes.insert(node);
    }

    fn add_edge(&mut self, dependent: NodeId, dependency: NodeId) {
        self.add_node(dependent.clone());
        self.add_node(dependency.clone());
        let deps = self.edges.entry(dependent).or_default();
        if !deps.contains(&dependency) {
            deps.push(dependency);
        }
    }

    pub fn dependencies_of(&self, node: &NodeId) -> &[NodeId] {
        self.edges.get(node).map_or(&[], Vec::as_slice)
    }

    /// Build the graph for every non-abstract configuration in `map`.
    pub fn build(map: &ContainerMap) -> LandscapeResult<Self> {
        let mut graph = Self::default();

        for (name, config) in &map.containers {
            if config.is_abstract {
                continue;
            }
            let effective = expand(map, name)?;
            for instance in effective.effective_instances() {
                let instance = instance.map(str::to_string);
                let node = NodeId::Container {
                    config: name.clone(),
                    instance: instance.clone(),
                };
                graph.add_node(node.clone());

                for attach in &effective.attaches {
                    let vol = NodeId::AttachedVolume {
                        owner: name.clone(),
                        alias: attach.alias.clone(),
                    };
                    graph.add_edge(node.clone(), vol);
                }

                for use_spec in &effective.uses {
                    match &use_spec.target {
                        UseTarget::Container(target) => {
                            for dep in all_instances(map, target)? {
                                graph.add_edge(node.clone(), dep);
                            }
                        }
                        UseTarget::Attached(alias) => {
                            graph.add_edge(
                                node.clone(),
                                NodeId::AttachedVolume {
                                    owner: name.clone(),
                                    alias: alias.clone(),
                                },
                            );
                        }
                        UseTarget::ParentAttached { parent, alias } => {
                            graph.add_edge(
                                node.clone(),
                                NodeId::AttachedVolume {
                                    owner: parent.clone(),
                                    alias: alias.clone(),
                                },
                            );
                        }
                    }
                }

                for link in &effective.links {
                    for dep in all_instances(map, &link.container)? {
                        graph.add_edge(node.clone(), dep);
                    }
                }

                if let Some(NetworkMode::Config {
                    name: target,
                    instance: target_instance,
                }) = &effective.network_mode
                {
                    match target_instance {
                        Some(instance) => graph.add_edge(
                            node.clone(),
                            NodeId::Container {
                                config: target.clone(),
                                instance: Some(instance.clone()),
                            },
                        ),
                        None => {
                            for dep in all_instances(map, target)? {
                                graph.add_edge(node.clone(), dep);
                            }
                        }
                    }
                }

                for endpoint in &effective.networks {
                    graph.add_edge(
                        node.clone(),
                        NodeId::Network {
                            name: endpoint.network.clone(),
                        },
                    );
                }
            }
        }

        Ok(graph)
    }

    /// Topological, dependency-first order over the whole graph (used by
    /// create/start/startup/update/pull).
    pub fn forward_order(&self) -> LandscapeResult<Vec<NodeId>> {
        self.forward_order_over(self.nodes.iter().cloned().collect())
    }

    /// Dependent-first order, the reverse of [`Self::forward_order`]
    /// (used by stop/remove/shutdown).
    pub fn reverse_order(&self) -> LandscapeResult<Vec<NodeId>> {
        let mut order = self.forward_order()?;
        order.reverse();
        Ok(order)
    }

    /// Forward order restricted to the transitive dependency closure of
    /// `roots` (used when planning a single configuration or group).
    pub fn forward_order_for(&self, roots: &[NodeId]) -> LandscapeResult<Vec<NodeId>> {
        let closure = self.transitive_closure(roots);
        self.forward_order_over(closure)
    }

    pub fn reverse_order_for(&self, roots: &[NodeId]) -> LandscapeResult<Vec<NodeId>> {
        let mut order = self.forward_order_for(roots)?;
        order.reverse();
        Ok(order)
    }

    fn transitive_closure(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        let mut closure = Vec::new();
        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            closure.push(node.clone());
            for dep in self.dependencies_of(&node) {
                stack.push(dep.clone());
            }
        }
        closure
    }

    /// Kahn's algorithm with a stable tie-break: among ready nodes, the
    /// one that appears earliest in declaration order goes first (spec
    /// §4.3 "stable tie-breaks").
    fn forward_order_over(&self, scope: Vec<NodeId>) -> LandscapeResult<Vec<NodeId>> {
        let scope_set: HashSet<NodeId> = scope.iter().cloned().collect();

        let mut indegree: HashMap<NodeId, usize> = HashMap::new();
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in &scope {
            indegree.entry(node.clone()).or_insert(0);
        }
        for node in &scope {
            for dep in self.dependencies_of(node) {
                if !scope_set.contains(dep) {
                    continue;
                }
                *indegree.entry(node.clone()).or_insert(0) += 1;
                dependents.entry(dep.clone()).or_default().push(node.clone());
            }
        }

        let declared_index: HashMap<&NodeId, usize> =
            self.nodes.iter().enumerate().map(|(i, n)| (n, i)).collect();

        let mut ready: Vec<NodeId> = scope
            .iter()
            .filter(|n| indegree.get(*n).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();
        ready.sort_by_key(|n| declared_index.get(n).copied().unwrap_or(usize::MAX));

        let mut order = Vec::with_capacity(scope.len());
        let mut remaining = indegree;

        while !ready.is_empty() {
            ready.sort_by_key(|n| declared_index.get(n).copied().unwrap_or(usize::MAX));
            let node = ready.remove(0);
            order.push(node.clone());
            if let Some(next) = dependents.get(&node) {
                for dependent in next {
                    if let Some(count) = remaining.get_mut(dependent) {
                        *count -= 1;
                        if *count == 0 {
                            ready.push(dependent.clone());
                        }
                    }
                }
            }
        }

        if order.len() != scope.len() {
            let cyclic: Vec<String> = scope
                .iter()
                .filter(|n| !order.contains(n))
                .map(NodeId::display_name)
                .collect();
            return Err(LandscapeError::circular_dependency(cyclic));
        }

        Ok(order)
    }
}

fn all_instances(map: &ContainerMap, config_name: &str) -> LandscapeResult<Vec<NodeId>> {
    let config = map.containers.get(config_name).ok_or_else(|| {
        LandscapeError::map_integrity(&map.name, format!("unknown configuration '{config_name}'"))
    })?;
    Ok(config
        .effective_instances()
        .into_iter()
        .map(|instance| NodeId::Container {
            config: config_name.to_string(),
            instance: instance.map(str::to_string),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::container::{ContainerConfig, UseSpec};

    fn chain_map() -> ContainerMap {
        let mut map = ContainerMap::new("m");
        map.containers.insert(
            "app".to_string(),
            ContainerConfig {
                image: Some("app".to_string()),
                ..Default::default()
            },
        );
        map.containers.insert(
            "web".to_string(),
            ContainerConfig {
                image: Some("web".to_string()),
                uses: vec![UseSpec {
                    target: UseTarget::Container("app".to_string()),
                    container_path: None,
                }],
                ..Default::default()
            },
        );
        map
    }

    #[test]
    fn forward_order_puts_dependency_before_dependent() {
        let map = chain_map();
        let graph = DependencyGraph::build(&map).unwrap();
        let order = graph.forward_order().unwrap();
        let app_index = order
            .iter()
            .position(|n| matches!(n, NodeId::Container { config, .. } if config == "app"))
            .unwrap();
        let web_index = order
            .iter()
            .position(|n| matches!(n, NodeId::Container { config, .. } if config == "web"))
            .unwrap();
        assert!(app_index < web_index);
    }

    #[test]
    fn reverse_order_is_exact_reverse_of_forward() {
        let map = chain_map();
        let graph = DependencyGraph::build(&map).unwrap();
        let forward = graph.forward_order().unwrap();
        let reverse = graph.reverse_order().unwrap();
        let mut expected = forward.clone();
        expected.reverse();
        assert_eq!(reverse, expected);
    }

    #[test]
    fn cycle_is_reported() {
        let mut map = ContainerMap::new("m");
        map.containers.insert(
            "a".to_string(),
            ContainerConfig {
                uses: vec![UseSpec {
                    target: UseTarget::Container("b".to_string()),
                    container_path: None,
                }],
                ..Default::default()
            },
        );
        map.containers.insert(
            "b".to_string(),
            ContainerConfig {
                uses: vec![UseSpec {
                    target: UseTarget::Container("a".to_string()),
                    container_path: None,
                }],
                ..Default::default()
            },
        );
        let graph = DependencyGraph::build(&map).unwrap();
        let err = graph.forward_order().unwrap_err();
        assert!(matches!(err, LandscapeError::CircularDependency { .. }));
    }
}
