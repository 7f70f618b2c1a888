use std::collections::HashMap;

use crate::mesh::Mesh;
use crate::misc::ordered;

/// Face-adjacency graph with one node per mesh triangle.
///
/// Each node carries a label: 0 marks an unassigned face,
/// a label i in [1, K] references view i - 1.
pub struct Graph {
    labels: Vec<usize>,
    adjacency: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new(num_nodes: usize) -> Graph {
        Graph {
            labels: vec![0; num_nodes],
            adjacency: vec![Vec::new(); num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    pub fn label(&self, node: usize) -> usize {
        self.labels[node]
    }

    pub fn set_label(&mut self, node: usize, label: usize) {
        self.labels[node] = label;
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn adjacent(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }
}

/// Connects every pair of faces sharing an edge.
pub fn build_adjacency_graph(mesh: &Mesh) -> Graph {
    let mut graph = Graph::new(mesh.faces.len());

    let mut faces_around_edge: HashMap<[usize; 2], Vec<usize>> =
        HashMap::new();
    for (face_idx, &[v0, v1, v2]) in mesh.faces.iter().enumerate() {
        for e in [[v0, v1], [v0, v2], [v1, v2]] {
            faces_around_edge
                .entry(ordered(e))
                .or_insert_with(Vec::new)
                .push(face_idx);
        }
    }

    for faces in faces_around_edge.values() {
        for (i, &f0) in faces.iter().enumerate() {
            for &f1 in &faces[i + 1..] {
                graph.adjacency[f0].push(f1);
                graph.adjacency[f1].push(f0);
            }
        }
    }

    for neighbours in graph.adjacency.iter_mut() {
        neighbours.sort_unstable();
        neighbours.dedup();
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tetrahedron;

    #[test]
    fn test_tetrahedron_adjacency() {
        let graph = build_adjacency_graph(&tetrahedron());
        assert_eq!(graph.num_nodes(), 4);

        // Every tetrahedron face borders the three others.
        for node in 0..4 {
            let mut expected: Vec<usize> =
                (0..4).filter(|&n| n != node).collect();
            expected.sort_unstable();
            assert_eq!(graph.adjacent(node), expected.as_slice());
        }
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let graph = build_adjacency_graph(&tetrahedron());
        for node in 0..graph.num_nodes() {
            for &other in graph.adjacent(node) {
                assert!(graph.adjacent(other).contains(&node));
            }
        }
    }

    #[test]
    fn test_labels_default_to_zero() {
        let graph = Graph::new(3);
        assert_eq!(graph.labels(), &[0, 0, 0]);
    }
}
