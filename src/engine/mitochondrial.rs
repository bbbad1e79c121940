//! Mitochondrial pattern rules. mtDNA passes only through the egg, so the
//! decisive signal is paternal transmission: an affected father whose child
//! is affected without a plausibly affected mother rules the pattern out.
//! That check runs before the maternal-line checks so a father is never
//! scored on his own ancestry while his children already disprove the
//! hypothesis.
//!
//! An unaffected child of an affected mother stays neutral rather than
//! contradicting. Heteroplasmy makes maternal transmission incompletely
//! penetrant, so absence of the condition in one child proves nothing.

use crate::engine::rules::{Classification, ConditionView, PatternEvaluator, ViewMember};
use crate::schema::record::{AffectedStatus, Sex};
use crate::types::PatternHypothesis;

pub struct MitochondrialEvaluator;

impl MitochondrialEvaluator {
    /// An affected child of `member` whose other recorded parent cannot
    /// account for the condition. Children are visited in ascending id
    /// order, so the reported child is stable across runs.
    fn paternal_transmission<'a>(
        member: &ViewMember,
        view: &'a ConditionView,
    ) -> Option<&'a ViewMember> {
        member
            .children
            .iter()
            .filter_map(|&child| view.member(child))
            .find(|child| {
                if !child.is_affected() {
                    return false;
                }
                match view.co_parent_of(member.id, child.id) {
                    None => true,
                    Some(co_parent) => co_parent.is_unaffected(),
                }
            })
    }
}

impl PatternEvaluator for MitochondrialEvaluator {
    fn id(&self) -> &'static str {
        "mitochondrial"
    }

    fn pattern(&self) -> PatternHypothesis {
        PatternHypothesis::Mitochondrial
    }

    fn classify(
        &self,
        member: &ViewMember,
        view: &ConditionView,
    ) -> (Classification, Option<String>) {
        if member.sex == Sex::Male && member.is_affected() {
            if let Some(child) = Self::paternal_transmission(member, view) {
                return (
                    Classification::Contradicting,
                    Some(format!(
                        "{}: affected father of affected {}, but mitochondria never pass through sperm",
                        member.label, child.label
                    )),
                );
            }
        }

        if member.is_affected() {
            return match view.mother_of(member.id).map(|m| m.status) {
                Some(AffectedStatus::Affected) => (
                    Classification::Supporting,
                    Some(format!(
                        "{}: affected on an affected maternal line",
                        member.label
                    )),
                ),
                Some(AffectedStatus::Unaffected) => (
                    Classification::Contradicting,
                    Some(format!(
                        "{}: affected though mother is recorded unaffected",
                        member.label
                    )),
                ),
                _ => (Classification::Neutral, None),
            };
        }

        (Classification::Neutral, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedigree::graph::PedigreeGraph;
    use crate::schema::record::{
        ConditionId, Individual, IndividualId, Relationship, SourceKind, SourceMethod,
    };
    use std::collections::HashSet;

    fn id(n: u64) -> IndividualId {
        IndividualId(n)
    }

    fn condition() -> ConditionId {
        ConditionId::new("melas")
    }

    fn person(n: u64, sex: Sex, status: AffectedStatus) -> Individual {
        let mut individual = Individual::new(id(n));
        individual.sex_at_birth = sex;
        individual.conditions.insert(condition(), status);
        individual
    }

    fn family(members: Vec<Individual>, parent_edges: &[(u64, u64)]) -> PedigreeGraph {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        for member in members {
            graph.add_individual(member).unwrap();
        }
        for &(parent, child) in parent_edges {
            graph
                .add_relationship(Relationship::parent_of(id(parent), id(child)))
                .unwrap();
        }
        graph
    }

    fn classify(graph: &PedigreeGraph, n: u64) -> Classification {
        let view = ConditionView::new(graph, &condition(), &HashSet::new());
        let member = view.member(id(n)).unwrap().clone();
        MitochondrialEvaluator.classify(&member, &view).0
    }

    #[test]
    fn test_maternal_line_supports_children_of_either_sex() {
        let graph = family(
            vec![
                person(1, Sex::Female, AffectedStatus::Affected),
                person(2, Sex::Male, AffectedStatus::Affected),
                person(3, Sex::Female, AffectedStatus::Affected),
            ],
            &[(1, 2), (1, 3)],
        );
        assert_eq!(classify(&graph, 2), Classification::Supporting);
        assert_eq!(classify(&graph, 3), Classification::Supporting);
    }

    #[test]
    fn test_paternal_transmission_contradicts_the_father() {
        let graph = family(
            vec![
                person(1, Sex::Male, AffectedStatus::Affected),
                person(2, Sex::Female, AffectedStatus::Unaffected),
                person(3, Sex::Male, AffectedStatus::Affected),
            ],
            &[(1, 3), (2, 3)],
        );
        assert_eq!(classify(&graph, 1), Classification::Contradicting);
        // the child also contradicts through his unaffected mother
        assert_eq!(classify(&graph, 3), Classification::Contradicting);
    }

    #[test]
    fn test_affected_co_parent_excuses_the_father() {
        let graph = family(
            vec![
                person(1, Sex::Male, AffectedStatus::Affected),
                person(2, Sex::Female, AffectedStatus::Affected),
                person(3, Sex::Male, AffectedStatus::Affected),
            ],
            &[(1, 3), (2, 3)],
        );
        // transmission can run through the affected mother, so the father
        // falls back to his own maternal line, which is unrecorded
        assert_eq!(classify(&graph, 1), Classification::Neutral);
        assert_eq!(classify(&graph, 3), Classification::Supporting);
    }

    #[test]
    fn test_father_with_no_recorded_co_parent_still_contradicts() {
        let graph = family(
            vec![
                person(1, Sex::Male, AffectedStatus::Affected),
                person(2, Sex::Female, AffectedStatus::Affected),
            ],
            &[(1, 2)],
        );
        assert_eq!(classify(&graph, 1), Classification::Contradicting);
    }

    #[test]
    fn test_unaffected_child_of_affected_mother_is_neutral() {
        let graph = family(
            vec![
                person(1, Sex::Female, AffectedStatus::Affected),
                person(2, Sex::Male, AffectedStatus::Unaffected),
            ],
            &[(1, 2)],
        );
        assert_eq!(classify(&graph, 2), Classification::Neutral);
    }

    #[test]
    fn test_trace_names_the_blocking_child() {
        let graph = family(
            vec![
                person(1, Sex::Male, AffectedStatus::Affected),
                person(2, Sex::Female, AffectedStatus::Unaffected),
                person(3, Sex::Male, AffectedStatus::Affected),
            ],
            &[(1, 3), (2, 3)],
        );
        let view = ConditionView::new(&graph, &condition(), &HashSet::new());
        let member = view.member(id(1)).unwrap().clone();
        let (_, reason) = MitochondrialEvaluator.classify(&member, &view);
        let reason = reason.unwrap();
        assert!(reason.contains("individual #1"));
        assert!(reason.contains("individual #3"));
    }
}
