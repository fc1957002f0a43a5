//! Static prerequisite graph over a customer's stages.
//!
//! Stages are addressed by their position in an arena (`Vec<StageKey>`), and
//! edges are adjacency lists of arena indices. The graph is built once at
//! enrollment and rejected if it contains a cycle; afterwards only stage
//! statuses change.

use std::collections::{HashMap, HashSet};

use ledger_core::{LedgerError, StageKey};
use serde::{Deserialize, Serialize};

/// "`dependent` cannot start until `prerequisite` is complete."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// The gated stage
    pub dependent: StageKey,
    /// The stage that must complete first
    pub prerequisite: StageKey,
}

impl DependencyEdge {
    /// Create an edge.
    pub fn new(dependent: StageKey, prerequisite: StageKey) -> Self {
        Self { dependent, prerequisite }
    }
}

/// Serialized form of the graph: the arena and its edge list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphRepr {
    stages: Vec<StageKey>,
    edges: Vec<DependencyEdge>,
}

/// An acyclic prerequisite graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphRepr", into = "GraphRepr")]
pub struct DependencyGraph {
    /// Arena of stage keys
    nodes: Vec<StageKey>,
    /// key -> arena index
    index: HashMap<StageKey, usize>,
    /// node -> [prerequisites]
    prerequisites: Vec<Vec<usize>>,
    /// node -> [dependents]
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build a graph over `stages` with the given edges.
    ///
    /// Fails with `DuplicateStage` if a key repeats, `UnknownStage` if an
    /// edge names a stage outside `stages`, and `CyclicDependency` if the
    /// edges form a cycle (including a stage depending on itself).
    pub fn build(stages: Vec<StageKey>, edges: &[DependencyEdge]) -> Result<Self, LedgerError> {
        let mut index = HashMap::with_capacity(stages.len());
        for (i, key) in stages.iter().enumerate() {
            if index.insert(*key, i).is_some() {
                return Err(LedgerError::DuplicateStage(*key));
            }
        }

        let mut prerequisites = vec![Vec::new(); stages.len()];
        let mut dependents = vec![Vec::new(); stages.len()];
        let mut seen = HashSet::new();

        for edge in edges {
            let dep = *index
                .get(&edge.dependent)
                .ok_or(LedgerError::UnknownStage(edge.dependent))?;
            let pre = *index
                .get(&edge.prerequisite)
                .ok_or(LedgerError::UnknownStage(edge.prerequisite))?;

            if seen.insert((dep, pre)) {
                prerequisites[dep].push(pre);
                dependents[pre].push(dep);
            }
        }

        let graph = Self {
            nodes: stages,
            index,
            prerequisites,
            dependents,
        };

        if let Some(cycle) = graph.find_cycle() {
            return Err(LedgerError::CyclicDependency { cycle });
        }

        Ok(graph)
    }

    /// Edges chaining `stages` linearly: each stage depends on the one before.
    pub fn linear_chain(stages: &[StageKey]) -> Vec<DependencyEdge> {
        stages
            .windows(2)
            .map(|pair| DependencyEdge::new(pair[1], pair[0]))
            .collect()
    }

    /// Whether a stage is part of the graph.
    pub fn contains(&self, key: StageKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no stages.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All stages in arena order.
    pub fn stages(&self) -> &[StageKey] {
        &self.nodes
    }

    /// Direct prerequisites of a stage.
    pub fn prerequisites(&self, key: StageKey) -> Result<Vec<StageKey>, LedgerError> {
        let i = self.position(key)?;
        Ok(self.prerequisites[i].iter().map(|&p| self.nodes[p]).collect())
    }

    /// Stages that directly depend on `key`.
    pub fn dependents(&self, key: StageKey) -> Result<Vec<StageKey>, LedgerError> {
        let i = self.position(key)?;
        Ok(self.dependents[i].iter().map(|&d| self.nodes[d]).collect())
    }

    /// Every edge in the graph.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.prerequisites
            .iter()
            .enumerate()
            .flat_map(|(dep, pres)| {
                pres.iter()
                    .map(move |&pre| DependencyEdge::new(self.nodes[dep], self.nodes[pre]))
            })
            .collect()
    }

    /// Stages ordered so that every prerequisite precedes its dependents.
    ///
    /// Ties keep arena order.
    pub fn topological_order(&self) -> Vec<StageKey> {
        let mut remaining: Vec<usize> = self.prerequisites.iter().map(Vec::len).collect();
        let mut placed = vec![false; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        while order.len() < self.nodes.len() {
            let Some(next) = (0..self.nodes.len()).find(|&i| !placed[i] && remaining[i] == 0) else {
                // Unreachable for a graph that passed cycle detection.
                break;
            };
            placed[next] = true;
            order.push(self.nodes[next]);
            for &dep in &self.dependents[next] {
                remaining[dep] -= 1;
            }
        }

        order
    }

    pub(crate) fn position(&self, key: StageKey) -> Result<usize, LedgerError> {
        self.index
            .get(&key)
            .copied()
            .ok_or(LedgerError::UnknownStage(key))
    }

    pub(crate) fn prerequisite_indices(&self, i: usize) -> &[usize] {
        &self.prerequisites[i]
    }

    pub(crate) fn key_at(&self, i: usize) -> StageKey {
        self.nodes[i]
    }

    /// Depth-first search for a cycle; returns the stages on it.
    fn find_cycle(&self) -> Option<Vec<StageKey>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut on_stack = vec![false; self.nodes.len()];
        let mut path = Vec::new();

        for start in 0..self.nodes.len() {
            if !visited[start] {
                if let Some(cycle) = self.visit(start, &mut visited, &mut on_stack, &mut path) {
                    return Some(cycle.into_iter().map(|i| self.nodes[i]).collect());
                }
            }
        }

        None
    }

    fn visit(
        &self,
        node: usize,
        visited: &mut [bool],
        on_stack: &mut [bool],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        visited[node] = true;
        on_stack[node] = true;
        path.push(node);

        for &pre in &self.prerequisites[node] {
            if !visited[pre] {
                if let Some(cycle) = self.visit(pre, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack[pre] {
                if let Some(start) = path.iter().position(|&n| n == pre) {
                    return Some(path[start..].to_vec());
                }
            }
        }

        path.pop();
        on_stack[node] = false;
        None
    }
}

impl TryFrom<GraphRepr> for DependencyGraph {
    type Error = LedgerError;

    fn try_from(repr: GraphRepr) -> Result<Self, Self::Error> {
        DependencyGraph::build(repr.stages, &repr.edges)
    }
}

impl From<DependencyGraph> for GraphRepr {
    fn from(graph: DependencyGraph) -> Self {
        GraphRepr {
            edges: graph.edges(),
            stages: graph.nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{TrackKind, TrainingStage, VisaStep};

    fn training(stage: TrainingStage) -> StageKey {
        StageKey::Training(stage)
    }

    fn visa(step: VisaStep) -> StageKey {
        StageKey::Visa(step)
    }

    #[test]
    fn test_linear_chain_edges() {
        let keys = StageKey::all_of(TrackKind::Training);
        let edges = DependencyGraph::linear_chain(&keys);
        assert_eq!(edges.len(), 3);
        assert_eq!(
            edges[0],
            DependencyEdge::new(training(TrainingStage::Practical), training(TrainingStage::Theory))
        );
    }

    #[test]
    fn test_build_and_query() {
        let keys = StageKey::all_of(TrackKind::Visa);
        let graph = DependencyGraph::build(keys.clone(), &DependencyGraph::linear_chain(&keys)).unwrap();

        assert_eq!(graph.len(), 7);
        assert!(graph.prerequisites(visa(VisaStep::Checklist)).unwrap().is_empty());
        assert_eq!(
            graph.prerequisites(visa(VisaStep::Lmia)).unwrap(),
            vec![visa(VisaStep::JobOffer)]
        );
        assert_eq!(
            graph.dependents(visa(VisaStep::Lmia)).unwrap(),
            vec![visa(VisaStep::SkillsAssessment)]
        );
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let theory = training(TrainingStage::Theory);
        let err = DependencyGraph::build(vec![theory], &[DependencyEdge::new(theory, theory)]).unwrap_err();
        assert_eq!(err, LedgerError::CyclicDependency { cycle: vec![theory] });
    }

    #[test]
    fn test_three_stage_cycle_is_reported() {
        let keys = StageKey::all_of(TrackKind::Training);
        let mut edges = DependencyGraph::linear_chain(&keys[..3]);
        edges.push(DependencyEdge::new(keys[0], keys[2]));

        match DependencyGraph::build(keys.clone(), &edges) {
            Err(LedgerError::CyclicDependency { cycle }) => {
                assert_eq!(cycle.len(), 3);
                assert!(cycle.contains(&keys[0]));
                assert!(cycle.contains(&keys[1]));
                assert!(cycle.contains(&keys[2]));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_and_duplicate_stages() {
        let theory = training(TrainingStage::Theory);
        let lmia = visa(VisaStep::Lmia);

        let err = DependencyGraph::build(vec![theory], &[DependencyEdge::new(lmia, theory)]).unwrap_err();
        assert_eq!(err, LedgerError::UnknownStage(lmia));

        let err = DependencyGraph::build(vec![theory, theory], &[]).unwrap_err();
        assert_eq!(err, LedgerError::DuplicateStage(theory));
    }

    #[test]
    fn test_duplicate_edges_are_collapsed() {
        let keys = vec![training(TrainingStage::Theory), training(TrainingStage::Practical)];
        let edge = DependencyEdge::new(keys[1], keys[0]);
        let graph = DependencyGraph::build(keys, &[edge, edge]).unwrap();
        assert_eq!(graph.edges(), vec![edge]);
    }

    #[test]
    fn test_topological_order_puts_prerequisites_first() {
        let keys = StageKey::all_of(TrackKind::Training);
        // Reverse chain: theory depends on practical, practical on video, ...
        let edges: Vec<_> = keys.windows(2).map(|w| DependencyEdge::new(w[0], w[1])).collect();
        let graph = DependencyGraph::build(keys.clone(), &edges).unwrap();

        let order = graph.topological_order();
        let reversed: Vec<_> = keys.into_iter().rev().collect();
        assert_eq!(order, reversed);
    }

    #[test]
    fn test_serde_round_trip_rebuilds_index() {
        let keys = StageKey::all_of(TrackKind::English);
        let graph = DependencyGraph::build(keys.clone(), &DependencyGraph::linear_chain(&keys)).unwrap();

        let json = serde_json::to_string(&graph).unwrap();
        let restored: DependencyGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.edges(), graph.edges());
        assert!(restored.contains(keys[4]));
    }

    #[test]
    fn test_deserializing_a_cycle_fails() {
        let theory = training(TrainingStage::Theory);
        let repr = GraphRepr {
            stages: vec![theory],
            edges: vec![DependencyEdge::new(theory, theory)],
        };
        let json = serde_json::to_string(&repr).unwrap();
        assert!(serde_json::from_str::<DependencyGraph>(&json).is_err());
    }
}
