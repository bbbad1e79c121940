//! Deterministic contradiction sweep over a committed pedigree. Checks run
//! in a fixed order and iterate individuals by ascending id, so an
//! unchanged graph always produces an identical conflict list.

use crate::config::{SexRolePolicy, ValidationConfig};
use crate::error::GraphError;
use crate::pedigree::graph::PedigreeGraph;
use crate::schema::record::{IndividualId, RelationshipKind, Sex};
use crate::types::{ConflictKind, ConflictRecord, ConflictSeverity};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, instrument};

pub struct ConflictDetector {
    config: ValidationConfig,
}

impl ConflictDetector {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Run every check in order and number the results 1..n.
    #[instrument(skip(self, graph))]
    pub fn detect(&self, graph: &PedigreeGraph) -> Vec<ConflictRecord> {
        let mut conflicts = Vec::new();

        self.check_cycles(graph, &mut conflicts);
        self.check_excess_parents(graph, &mut conflicts);
        self.check_probands(graph, &mut conflicts);
        self.check_sex_roles(graph, &mut conflicts);
        self.check_timing(graph, &mut conflicts);
        self.check_duplicates(graph, &mut conflicts);
        self.check_dangling(graph, &mut conflicts);

        renumber(&mut conflicts);
        debug!(conflicts = conflicts.len(), "conflict sweep complete");
        conflicts
    }

    /// The mutation guards prevent ancestry cycles; this re-verifies in
    /// case a graph was assembled by other means.
    fn check_cycles(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        let mut cyclic: Vec<IndividualId> = Vec::new();
        for id in graph.ids() {
            let mut visited = HashSet::new();
            let mut queue = VecDeque::new();
            queue.push_back(id);
            let mut found = false;
            while let Some(current) = queue.pop_front() {
                for parent in graph.parents_of(current) {
                    if parent == id {
                        found = true;
                        break;
                    }
                    if visited.insert(parent) {
                        queue.push_back(parent);
                    }
                }
                if found {
                    break;
                }
            }
            if found {
                cyclic.push(id);
            }
        }
        if !cyclic.is_empty() {
            out.push(conflict(
                ConflictKind::RelationshipCycle,
                ConflictSeverity::Blocking,
                cyclic.clone(),
                format!("ancestry cycle involving {}", label_list(graph, &cyclic)),
                vec![format!(
                    "remove one parent edge along the cycle involving {}",
                    label_list(graph, &cyclic)
                )],
            ));
        }
    }

    fn check_excess_parents(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        for id in graph.ids() {
            let parents = graph.biological_parents_of(id);
            if parents.len() > 2 {
                let mut involved = vec![id];
                involved.extend(&parents);
                let surplus = parents.len() - 2;
                out.push(conflict(
                    ConflictKind::ExcessParents,
                    ConflictSeverity::Blocking,
                    involved,
                    format!(
                        "{} has {} recorded biological parents",
                        display(graph, id),
                        parents.len()
                    ),
                    vec![
                        format!(
                            "remove {} surplus parent edge{} into {}",
                            surplus,
                            if surplus == 1 { "" } else { "s" },
                            display(graph, id)
                        ),
                        format!(
                            "mark step or adoptive parents of {} as non-biological",
                            display(graph, id)
                        ),
                    ],
                ));
            }
        }
    }

    fn check_probands(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        let probands: Vec<IndividualId> = graph
            .ids()
            .into_iter()
            .filter(|&id| graph.individual(id).map(|i| i.proband).unwrap_or(false))
            .collect();
        if probands.len() > 1 {
            out.push(conflict(
                ConflictKind::MultipleProbands,
                ConflictSeverity::Blocking,
                probands.clone(),
                format!("{} individuals marked as proband", probands.len()),
                vec![format!(
                    "keep one proband and clear the flag on the other {}",
                    probands.len() - 1
                )],
            ));
        }
    }

    /// A child's two considered parents sharing a known sex is structurally
    /// impossible for conception. Adoptive edges are skipped unless the
    /// configuration pulls them in; severity is a deployment choice.
    fn check_sex_roles(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        let severity = match self.config.sex_role {
            SexRolePolicy::Disabled => return,
            SexRolePolicy::Advisory => ConflictSeverity::Advisory,
            SexRolePolicy::Blocking => ConflictSeverity::Blocking,
        };

        for child in graph.ids() {
            let parents = if self.config.include_non_biological {
                graph.parents_of(child)
            } else {
                graph.biological_parents_of(child)
            };
            if parents.len() != 2 {
                continue;
            }
            let sexes: Vec<Sex> = parents
                .iter()
                .filter_map(|&p| graph.individual(p).map(|i| i.sex_at_birth))
                .collect();
            if sexes.len() == 2
                && sexes[0] != Sex::Unknown
                && sexes[0] == sexes[1]
            {
                let word = match sexes[0] {
                    Sex::Male => "male",
                    Sex::Female => "female",
                    Sex::Unknown => continue,
                };
                let mut involved = parents.clone();
                involved.push(child);
                out.push(conflict(
                    ConflictKind::SexRoleViolation,
                    severity,
                    involved,
                    format!(
                        "both recorded parents of {} are {}",
                        display(graph, child),
                        word
                    ),
                    vec![
                        format!(
                            "correct the recorded sex of {} or {}",
                            display(graph, parents[0]),
                            display(graph, parents[1])
                        ),
                        format!(
                            "mark one parent edge into {} as non-biological",
                            display(graph, child)
                        ),
                    ],
                ));
            }
        }
    }

    fn check_timing(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        for rel in sorted_relationships(graph) {
            if rel.kind != RelationshipKind::ParentOf {
                continue;
            }
            let (Some(parent), Some(child)) =
                (graph.individual(rel.from), graph.individual(rel.to))
            else {
                continue;
            };
            let (Some(parent_dob), Some(child_dob)) =
                (parent.date_of_birth, child.date_of_birth)
            else {
                continue;
            };

            if child_dob <= parent_dob {
                out.push(conflict(
                    ConflictKind::ImplausibleTiming,
                    ConflictSeverity::Advisory,
                    vec![rel.from, rel.to],
                    format!(
                        "{} was born on or before their parent {}",
                        child.display_label(),
                        parent.display_label()
                    ),
                    vec![
                        format!(
                            "verify the dates of birth of {} and {}",
                            parent.display_label(),
                            child.display_label()
                        ),
                        format!(
                            "remove the parent edge {} -> {} if misattributed",
                            parent.display_label(),
                            child.display_label()
                        ),
                    ],
                ));
            } else if let Some(age) = child_dob.years_since(parent_dob) {
                if age < self.config.min_parent_age {
                    out.push(conflict(
                        ConflictKind::ImplausibleTiming,
                        ConflictSeverity::Advisory,
                        vec![rel.from, rel.to],
                        format!(
                            "{} was {} at the birth of {}",
                            parent.display_label(),
                            age,
                            child.display_label()
                        ),
                        vec![format!(
                            "verify the dates of birth of {} and {}",
                            parent.display_label(),
                            child.display_label()
                        )],
                    ));
                }
            }
        }
    }

    fn check_duplicates(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        let mut seen = HashSet::new();
        for rel in sorted_relationships(graph) {
            let key = match rel.kind {
                RelationshipKind::ParentOf => (rel.kind, rel.from, rel.to),
                RelationshipKind::PartnerOf => {
                    let (a, b) = if rel.from <= rel.to {
                        (rel.from, rel.to)
                    } else {
                        (rel.to, rel.from)
                    };
                    (rel.kind, a, b)
                }
            };
            if !seen.insert(key) {
                out.push(conflict(
                    ConflictKind::DuplicateRelationship,
                    ConflictSeverity::Advisory,
                    vec![rel.from, rel.to],
                    format!(
                        "relationship between {} and {} recorded more than once",
                        display(graph, rel.from),
                        display(graph, rel.to)
                    ),
                    vec![format!(
                        "remove the duplicate edge between {} and {}",
                        display(graph, rel.from),
                        display(graph, rel.to)
                    )],
                ));
            }
        }
    }

    fn check_dangling(&self, graph: &PedigreeGraph, out: &mut Vec<ConflictRecord>) {
        for rel in sorted_relationships(graph) {
            for endpoint in [rel.from, rel.to] {
                if !graph.contains(endpoint) {
                    out.push(conflict(
                        ConflictKind::DanglingReference,
                        ConflictSeverity::Blocking,
                        vec![endpoint],
                        format!("relationship references missing individual {}", endpoint),
                        vec![
                            format!("remove the relationship referencing {}", endpoint),
                            format!("add individual {} to the record", endpoint),
                        ],
                    ));
                }
            }
        }
    }
}

/// Map a rejected mutation to the conflict it would have caused, so build
/// failures and detector output share one reporting surface.
pub fn rejection_conflict(rejection: &GraphError) -> ConflictRecord {
    let (kind, severity, individuals, description, suggested_actions) = match rejection {
        GraphError::DanglingReference(id) => (
            ConflictKind::DanglingReference,
            ConflictSeverity::Blocking,
            vec![*id],
            format!("relationship references missing individual {}", id),
            vec![
                format!("remove the relationship referencing {}", id),
                format!("add individual {} to the record", id),
            ],
        ),
        GraphError::RelationshipCycle { parent, child } => (
            ConflictKind::RelationshipCycle,
            ConflictSeverity::Blocking,
            vec![*parent, *child],
            format!("edge {} -> {} would create an ancestry cycle", parent, child),
            vec![format!("drop the parent edge {} -> {}", parent, child)],
        ),
        GraphError::ExcessParents { child } => (
            ConflictKind::ExcessParents,
            ConflictSeverity::Blocking,
            vec![*child],
            format!("{} already has two biological parents", child),
            vec![
                format!("remove one existing parent edge into {}", child),
                "mark the new edge as non-biological".to_string(),
            ],
        ),
        GraphError::DuplicateRelationship { from, to } => (
            ConflictKind::DuplicateRelationship,
            ConflictSeverity::Advisory,
            vec![*from, *to],
            format!("relationship between {} and {} recorded more than once", from, to),
            vec![format!("remove the duplicate edge between {} and {}", from, to)],
        ),
        GraphError::DuplicateIndividual(id) => (
            ConflictKind::DuplicateIndividual,
            ConflictSeverity::Blocking,
            vec![*id],
            format!("individual {} appears more than once", id),
            vec![format!("merge or renumber the duplicate entries for {}", id)],
        ),
        GraphError::DuplicateProband { candidate, existing } => (
            ConflictKind::MultipleProbands,
            ConflictSeverity::Blocking,
            vec![*existing, *candidate],
            format!("{} and {} both marked as proband", existing, candidate),
            vec![format!(
                "clear the proband flag on {} or {}",
                existing, candidate
            )],
        ),
        GraphError::SelfRelationship(id) => (
            ConflictKind::RelationshipCycle,
            ConflictSeverity::Blocking,
            vec![*id],
            format!("{} cannot be related to themselves", id),
            vec![format!("remove the self-referencing edge on {}", id)],
        ),
        GraphError::UnknownIndividual(id) => (
            ConflictKind::DanglingReference,
            ConflictSeverity::Blocking,
            vec![*id],
            format!("individual {} is not in the pedigree", id),
            vec![format!("add individual {} to the record", id)],
        ),
        GraphError::UnknownRelationship { from, to } => (
            ConflictKind::DanglingReference,
            ConflictSeverity::Blocking,
            vec![*from, *to],
            format!("no such relationship between {} and {}", from, to),
            vec![format!(
                "record the relationship between {} and {} before editing it",
                from, to
            )],
        ),
    };
    ConflictRecord {
        id: 0,
        kind,
        severity,
        individuals,
        description,
        suggested_actions,
    }
}

/// Assign 1-based sequence ids in list order.
pub fn renumber(conflicts: &mut [ConflictRecord]) {
    for (index, conflict) in conflicts.iter_mut().enumerate() {
        conflict.id = index as u32 + 1;
    }
}

fn conflict(
    kind: ConflictKind,
    severity: ConflictSeverity,
    individuals: Vec<IndividualId>,
    description: String,
    suggested_actions: Vec<String>,
) -> ConflictRecord {
    ConflictRecord {
        id: 0,
        kind,
        severity,
        individuals,
        description,
        suggested_actions,
    }
}

fn sorted_relationships(graph: &PedigreeGraph) -> Vec<crate::schema::record::Relationship> {
    let mut rels: Vec<_> = graph.relationships().cloned().collect();
    rels.sort_by_key(|r| (r.kind as u8, r.from, r.to));
    rels
}

fn display(graph: &PedigreeGraph, id: IndividualId) -> String {
    graph
        .individual(id)
        .map(|i| i.display_label())
        .unwrap_or_else(|| format!("individual {}", id))
}

fn label_list(graph: &PedigreeGraph, ids: &[IndividualId]) -> String {
    ids.iter()
        .map(|&id| display(graph, id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::{Individual, Relationship, SourceKind, SourceMethod};
    use chrono::NaiveDate;

    fn id(n: u64) -> IndividualId {
        IndividualId(n)
    }

    fn person(n: u64, sex: Sex) -> Individual {
        let mut individual = Individual::new(id(n));
        individual.sex_at_birth = sex;
        individual
    }

    fn same_sex_parent_fixture() -> PedigreeGraph {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph.add_individual(person(1, Sex::Male)).unwrap();
        graph.add_individual(person(2, Sex::Male)).unwrap();
        graph.add_individual(person(3, Sex::Unknown)).unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(3)))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(2), id(3)))
            .unwrap();
        graph
    }

    #[test]
    fn test_clean_trio_has_no_conflicts() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph.add_individual(person(1, Sex::Male)).unwrap();
        graph.add_individual(person(2, Sex::Female)).unwrap();
        graph.add_individual(person(3, Sex::Female)).unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(3)))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(2), id(3)))
            .unwrap();

        let detector = ConflictDetector::new(&ValidationConfig::default());
        assert!(detector.detect(&graph).is_empty());
    }

    #[test]
    fn test_same_sex_parents_are_advisory_by_default() {
        let detector = ConflictDetector::new(&ValidationConfig::default());
        let conflicts = detector.detect(&same_sex_parent_fixture());

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::SexRoleViolation);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Advisory);
        assert_eq!(conflicts[0].individuals, vec![id(1), id(2), id(3)]);
    }

    #[test]
    fn test_sex_role_policy_blocking_and_disabled() {
        let mut config = ValidationConfig::default();
        config.sex_role = SexRolePolicy::Blocking;
        let conflicts = ConflictDetector::new(&config).detect(&same_sex_parent_fixture());
        assert_eq!(conflicts[0].severity, ConflictSeverity::Blocking);

        config.sex_role = SexRolePolicy::Disabled;
        let conflicts = ConflictDetector::new(&config).detect(&same_sex_parent_fixture());
        assert!(conflicts.is_empty());
    }

    #[test]
    fn test_adoptive_edges_skip_sex_role_check_unless_configured() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph.add_individual(person(1, Sex::Male)).unwrap();
        graph.add_individual(person(2, Sex::Male)).unwrap();
        graph.add_individual(person(3, Sex::Unknown)).unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(3)).non_biological())
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(2), id(3)).non_biological())
            .unwrap();

        let default_detector = ConflictDetector::new(&ValidationConfig::default());
        assert!(default_detector.detect(&graph).is_empty());

        let mut config = ValidationConfig::default();
        config.include_non_biological = true;
        let conflicts = ConflictDetector::new(&config).detect(&graph);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::SexRoleViolation);
    }

    #[test]
    fn test_unknown_sex_parents_do_not_trigger_sex_role() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph.add_individual(person(1, Sex::Unknown)).unwrap();
        graph.add_individual(person(2, Sex::Unknown)).unwrap();
        graph.add_individual(person(3, Sex::Female)).unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(3)))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(2), id(3)))
            .unwrap();

        let detector = ConflictDetector::new(&ValidationConfig::default());
        assert!(detector.detect(&graph).is_empty());
    }

    #[test]
    fn test_child_born_before_parent_is_advisory() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        let mut parent = person(1, Sex::Female);
        parent.date_of_birth = NaiveDate::from_ymd_opt(1990, 6, 1);
        let mut child = person(2, Sex::Male);
        child.date_of_birth = NaiveDate::from_ymd_opt(1970, 1, 1);
        graph.add_individual(parent).unwrap();
        graph.add_individual(child).unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(2)))
            .unwrap();

        let conflicts = ConflictDetector::new(&ValidationConfig::default()).detect(&graph);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ImplausibleTiming);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Advisory);
        assert!(conflicts[0].description.contains("born on or before"));
    }

    #[test]
    fn test_underage_parent_is_advisory() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        let mut parent = person(1, Sex::Female);
        parent.date_of_birth = NaiveDate::from_ymd_opt(1990, 6, 1);
        let mut child = person(2, Sex::Male);
        child.date_of_birth = NaiveDate::from_ymd_opt(2000, 1, 1);
        graph.add_individual(parent).unwrap();
        graph.add_individual(child).unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(2)))
            .unwrap();

        let conflicts = ConflictDetector::new(&ValidationConfig::default()).detect(&graph);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].description.contains("was 9 at the birth"));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let detector = ConflictDetector::new(&ValidationConfig::default());
        let graph = same_sex_parent_fixture();
        let first = detector.detect(&graph);
        let second = detector.detect(&graph);
        assert_eq!(first, second);
    }

    #[test]
    fn test_rejection_mapping_preserves_severity_semantics() {
        let cycle = rejection_conflict(&GraphError::RelationshipCycle {
            parent: id(1),
            child: id(2),
        });
        assert_eq!(cycle.kind, ConflictKind::RelationshipCycle);
        assert_eq!(cycle.severity, ConflictSeverity::Blocking);

        let duplicate = rejection_conflict(&GraphError::DuplicateRelationship {
            from: id(1),
            to: id(2),
        });
        assert_eq!(duplicate.severity, ConflictSeverity::Advisory);
    }

    #[test]
    fn test_every_conflict_carries_candidate_edits() {
        let detector = ConflictDetector::new(&ValidationConfig::default());
        let conflicts = detector.detect(&same_sex_parent_fixture());
        assert!(!conflicts[0].suggested_actions.is_empty());
        assert!(conflicts[0]
            .suggested_actions
            .iter()
            .any(|action| action.contains("sex")));

        let rejection = rejection_conflict(&GraphError::DanglingReference(id(9)));
        assert!(rejection
            .suggested_actions
            .iter()
            .any(|action| action.contains("add individual #9")));

        let serialized = serde_json::to_value(&rejection).unwrap();
        assert!(serialized.get("suggested_actions").is_some());
    }

    #[test]
    fn test_renumber_assigns_sequence_ids() {
        let mut conflicts = vec![
            rejection_conflict(&GraphError::SelfRelationship(id(1))),
            rejection_conflict(&GraphError::UnknownIndividual(id(2))),
        ];
        renumber(&mut conflicts);
        assert_eq!(conflicts[0].id, 1);
        assert_eq!(conflicts[1].id, 2);
    }
}
