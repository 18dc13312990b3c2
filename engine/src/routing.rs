use std::collections::HashSet;
use std::hash::Hash;

/// Whether adding the edge `from -> to` closes a cycle, given the outgoing
/// edges `neighbors` yields for each node.
pub fn would_create_cycle<Node, Neighbors, Iter>(
    from: &Node,
    to: &Node,
    mut neighbors: Neighbors,
) -> bool
where
    Node: Clone + Eq + Hash,
    Neighbors: FnMut(&Node) -> Iter,
    Iter: IntoIterator<Item = Node>,
{
    reaches(to, from, &mut neighbors)
}

/// Depth-first search from `start`; every node is expanded at most once.
fn reaches<Node, Neighbors, Iter>(start: &Node, target: &Node, neighbors: &mut Neighbors) -> bool
where
    Node: Clone + Eq + Hash,
    Neighbors: FnMut(&Node) -> Iter,
    Iter: IntoIterator<Item = Node>,
{
    let mut visited = HashSet::new();
    let mut pending = vec![start.clone()];
    while let Some(node) = pending.pop() {
        if &node == target {
            return true;
        }
        if visited.insert(node.clone()) {
            pending.extend(neighbors(&node));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::would_create_cycle;
    use std::collections::HashMap;

    fn graph(edges: &[(&'static str, &'static str)]) -> HashMap<&'static str, Vec<&'static str>> {
        let mut graph: HashMap<_, Vec<_>> = HashMap::new();
        for (from, to) in edges {
            graph.entry(*from).or_default().push(*to);
        }
        graph
    }

    #[test]
    fn detects_indirect_feedback() {
        let graph = graph(&[("drums", "bus"), ("bus", "master")]);
        assert!(would_create_cycle(&"master", &"drums", |node| {
            graph.get(node).cloned().unwrap_or_default()
        }));
    }

    #[test]
    fn link_into_itself_is_a_cycle() {
        let graph = graph(&[]);
        assert!(would_create_cycle(&"bus", &"bus", |node| {
            graph.get(node).cloned().unwrap_or_default()
        }));
    }

    #[test]
    fn allows_fan_in() {
        let graph = graph(&[("drums", "master"), ("bass", "master")]);
        assert!(!would_create_cycle(&"drums", &"bus", |node| {
            graph.get(node).cloned().unwrap_or_default()
        }));
        assert!(!would_create_cycle(&"bus", &"master", |node| {
            graph.get(node).cloned().unwrap_or_default()
        }));
    }
}
