//! Dependency ordering.
//!
//! Depth-first topological sort over plugin names. Nodes are visited in
//! discovery order and dependencies in declaration order, so the result only
//! depends on the inputs' order.

use std::collections::HashMap;

use super::PluginLoadError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// A plugin as seen by the resolver.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub dependencies: Vec<String>,
}

/// Return node indices ordered so every node follows its dependencies.
pub fn resolve_order(nodes: &[Node]) -> Result<Vec<usize>, PluginLoadError> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.name.as_str(), i).is_some() {
            return Err(PluginLoadError::Duplicate(node.name.clone()));
        }
    }

    let mut marks = vec![Mark::Unvisited; nodes.len()];
    let mut path = Vec::new();
    let mut order = Vec::with_capacity(nodes.len());
    for i in 0..nodes.len() {
        visit(i, nodes, &index, &mut marks, &mut path, &mut order)?;
    }
    Ok(order)
}

fn visit(
    i: usize,
    nodes: &[Node],
    index: &HashMap<&str, usize>,
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), PluginLoadError> {
    match marks[i] {
        Mark::Done => return Ok(()),
        Mark::InProgress => {
            let start = path.iter().position(|&p| p == i).unwrap_or(0);
            let mut cycle: Vec<String> =
                path[start..].iter().map(|&p| nodes[p].name.clone()).collect();
            cycle.push(nodes[i].name.clone());
            return Err(PluginLoadError::Cycle(cycle));
        }
        Mark::Unvisited => {}
    }

    marks[i] = Mark::InProgress;
    path.push(i);
    for dependency in &nodes[i].dependencies {
        let Some(&dep) = index.get(dependency.as_str()) else {
            return Err(PluginLoadError::MissingDependency {
                plugin: nodes[i].name.clone(),
                dependency: dependency.clone(),
            });
        };
        visit(dep, nodes, index, marks, path, order)?;
    }
    path.pop();
    marks[i] = Mark::Done;
    order.push(i);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, deps: &[&str]) -> Node {
        Node {
            name: name.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn names(nodes: &[Node], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| nodes[i].name.clone()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let nodes = vec![node("c", &["b"]), node("b", &["a"]), node("a", &[])];
        let order = resolve_order(&nodes).unwrap();
        assert_eq!(names(&nodes, &order), ["a", "b", "c"]);
    }

    #[test]
    fn test_independent_nodes_keep_discovery_order() {
        let nodes = vec![node("x", &[]), node("y", &[]), node("z", &["x"])];
        let order = resolve_order(&nodes).unwrap();
        assert_eq!(names(&nodes, &order), ["x", "y", "z"]);
        assert_eq!(resolve_order(&nodes).unwrap(), order);
    }

    #[test]
    fn test_cycle_names_path() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"])];
        assert_eq!(
            resolve_order(&nodes),
            Err(PluginLoadError::Cycle(vec!["a".into(), "b".into(), "a".into()]))
        );
        assert_eq!(
            resolve_order(&nodes).unwrap_err().to_string(),
            "circular plugin dependency: a -> b -> a"
        );
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let nodes = vec![node("a", &["a"])];
        assert_eq!(
            resolve_order(&nodes),
            Err(PluginLoadError::Cycle(vec!["a".into(), "a".into()]))
        );
    }

    #[test]
    fn test_missing_dependency() {
        let nodes = vec![node("reports", &["ledger"])];
        assert_eq!(
            resolve_order(&nodes),
            Err(PluginLoadError::MissingDependency {
                plugin: "reports".into(),
                dependency: "ledger".into(),
            })
        );
    }

    #[test]
    fn test_duplicate_names() {
        let nodes = vec![node("a", &[]), node("a", &[])];
        assert_eq!(resolve_order(&nodes), Err(PluginLoadError::Duplicate("a".into())));
    }
}
