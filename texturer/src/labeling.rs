use std::path::Path;

use base::defs::{Error, ErrorKind::*, Result};
use base::util::fs;

use crate::cost::DataCosts;
use crate::graph::Graph;

/// Penalty for assigning adjacent faces to different views.
const SMOOTHNESS_TERM: f64 = 0.5;

/// Data cost charged to a face left without a view.
const UNLABELED_COST: f64 = 100.0;

const MAX_SWEEPS: usize = 20;

/// Mutates graph labels in place to minimize the total data cost
/// plus a smoothness penalty between adjacent faces.
///
/// Runs greedy local descent sweeps until no label changes or the
/// sweep budget runs out. The result is a valid labeling in either
/// case.
pub fn view_selection(costs: &DataCosts, graph: &mut Graph) {
    // Seed every face with its cheapest view.
    for node in 0..graph.num_nodes() {
        let label = costs
            .row(node)
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|&(view, _)| view as usize + 1)
            .unwrap_or(0);
        graph.set_label(node, label);
    }

    for _ in 0..MAX_SWEEPS {
        let mut changes = 0;
        for node in 0..graph.num_nodes() {
            let current = graph.label(node);
            let mut best_label = current;
            let mut best_energy = node_energy(costs, graph, node, current);

            for &(view, _) in costs.row(node) {
                let candidate = view as usize + 1;
                if candidate == current {
                    continue;
                }
                let energy = node_energy(costs, graph, node, candidate);
                if energy < best_energy {
                    best_energy = energy;
                    best_label = candidate;
                }
            }

            if best_label != current {
                graph.set_label(node, best_label);
                changes += 1;
            }
        }
        if changes == 0 {
            break;
        }
    }
}

fn node_energy(
    costs: &DataCosts,
    graph: &Graph,
    node: usize,
    label: usize,
) -> f64 {
    let data = if label == 0 {
        UNLABELED_COST
    } else {
        match costs.get(node, label - 1) {
            Some(cost) => cost as f64,
            None => return f64::INFINITY,
        }
    };
    let cut_edges = graph
        .adjacent(node)
        .iter()
        .filter(|&&other| graph.label(other) != label)
        .count();
    data + cut_edges as f64 * SMOOTHNESS_TERM
}

/// Copies a precomputed label vector into the graph.
///
/// The vector is valid iff it has one entry per graph node and no
/// entry exceeds the view count. Labels are 1-based view references
/// with 0 marking an unassigned face, so the view count itself is the
/// largest admissible value. On failure the graph is left untouched.
pub fn apply_labeling(
    labeling: &[usize],
    num_views: usize,
    graph: &mut Graph,
) -> Result<()> {
    let mismatch = |what: String| {
        Err(Error::new(
            LabelingMismatch,
            format!(
                "labeling does not match this mesh/scene combination: {}",
                what
            ),
        ))
    };

    if labeling.len() != graph.num_nodes() {
        return mismatch(format!(
            "{} entries for {} faces",
            labeling.len(),
            graph.num_nodes()
        ));
    }

    for (node, &label) in labeling.iter().enumerate() {
        if label > num_views {
            return mismatch(format!(
                "label {} of face {} exceeds {} views",
                label, node, num_views
            ));
        }
    }

    for (node, &label) in labeling.iter().enumerate() {
        graph.set_label(node, label);
    }

    Ok(())
}

pub fn load_labeling<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    fs::read_json_gz(path)
}

pub fn save_labeling<P: AsRef<Path>>(path: P, graph: &Graph) -> Result<()> {
    fs::write_json_gz(path, &graph.labels().to_vec())
}
