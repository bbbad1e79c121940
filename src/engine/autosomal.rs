//! Autosomal pattern rules.
//!
//! Classification tables, fixed and reviewable:
//! - recessive: an affected individual with both recorded parents
//!   unaffected supports; an affected child of an affected parent
//!   contradicts (consecutive-generation transmission reads dominant).
//! - dominant: an affected individual with an affected parent supports;
//!   an affected individual whose two recorded parents are both
//!   unaffected contradicts.
//! Everyone else is neutral, including unaffected relatives and
//! individuals with incomplete parent data.

use crate::engine::rules::{Classification, ConditionView, PatternEvaluator, ViewMember};
use crate::types::PatternHypothesis;

pub struct AutosomalRecessiveEvaluator;

impl PatternEvaluator for AutosomalRecessiveEvaluator {
    fn id(&self) -> &'static str {
        "autosomal_recessive"
    }

    fn pattern(&self) -> PatternHypothesis {
        PatternHypothesis::AutosomalRecessive
    }

    fn classify(
        &self,
        member: &ViewMember,
        view: &ConditionView,
    ) -> (Classification, Option<String>) {
        if !member.is_affected() {
            return (Classification::Neutral, None);
        }
        if view.any_parent_affected(member.id) {
            return (
                Classification::Contradicting,
                Some(format!(
                    "{}: affected child of an affected parent, which reads as vertical transmission",
                    member.label
                )),
            );
        }
        if view.both_parents_unaffected(member.id) {
            return (
                Classification::Supporting,
                Some(format!(
                    "{}: affected while both recorded parents are unaffected",
                    member.label
                )),
            );
        }
        (Classification::Neutral, None)
    }
}

pub struct AutosomalDominantEvaluator;

impl PatternEvaluator for AutosomalDominantEvaluator {
    fn id(&self) -> &'static str {
        "autosomal_dominant"
    }

    fn pattern(&self) -> PatternHypothesis {
        PatternHypothesis::AutosomalDominant
    }

    fn classify(
        &self,
        member: &ViewMember,
        view: &ConditionView,
    ) -> (Classification, Option<String>) {
        if !member.is_affected() {
            return (Classification::Neutral, None);
        }
        if view.any_parent_affected(member.id) {
            return (
                Classification::Supporting,
                Some(format!(
                    "{}: affected with an affected parent in the generation above",
                    member.label
                )),
            );
        }
        if view.both_parents_unaffected(member.id) {
            return (
                Classification::Contradicting,
                Some(format!(
                    "{}: affected though both recorded parents are unaffected",
                    member.label
                )),
            );
        }
        (Classification::Neutral, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pedigree::graph::PedigreeGraph;
    use crate::schema::record::{
        AffectedStatus, ConditionId, Individual, IndividualId, Relationship, Sex, SourceKind,
        SourceMethod,
    };
    use std::collections::HashSet;

    fn id(n: u64) -> IndividualId {
        IndividualId(n)
    }

    fn condition() -> ConditionId {
        ConditionId::new("marfan")
    }

    fn person(n: u64, sex: Sex, status: AffectedStatus) -> Individual {
        let mut individual = Individual::new(id(n));
        individual.sex_at_birth = sex;
        individual.conditions.insert(condition(), status);
        individual
    }

    fn view_of(graph: &PedigreeGraph) -> ConditionView {
        ConditionView::new(graph, &condition(), &HashSet::new())
    }

    fn classify(
        evaluator: &dyn PatternEvaluator,
        view: &ConditionView,
        n: u64,
    ) -> Classification {
        let member = view.member(id(n)).unwrap();
        evaluator.classify(member, view).0
    }

    /// Affected parent 1, unaffected parent 2, affected child 3.
    fn dominant_family() -> PedigreeGraph {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph
            .add_individual(person(1, Sex::Male, AffectedStatus::Affected))
            .unwrap();
        graph
            .add_individual(person(2, Sex::Female, AffectedStatus::Unaffected))
            .unwrap();
        graph
            .add_individual(person(3, Sex::Female, AffectedStatus::Affected))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(3)))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(2), id(3)))
            .unwrap();
        graph
    }

    /// Two unaffected parents with an affected child.
    fn recessive_family() -> PedigreeGraph {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph
            .add_individual(person(1, Sex::Male, AffectedStatus::Unaffected))
            .unwrap();
        graph
            .add_individual(person(2, Sex::Female, AffectedStatus::Unaffected))
            .unwrap();
        graph
            .add_individual(person(3, Sex::Male, AffectedStatus::Affected))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(3)))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(2), id(3)))
            .unwrap();
        graph
    }

    #[test]
    fn test_recessive_supports_affected_child_of_unaffected_parents() {
        let graph = recessive_family();
        let view = view_of(&graph);
        let evaluator = AutosomalRecessiveEvaluator;

        assert_eq!(classify(&evaluator, &view, 3), Classification::Supporting);
        assert_eq!(classify(&evaluator, &view, 1), Classification::Neutral);
        assert_eq!(classify(&evaluator, &view, 2), Classification::Neutral);
    }

    #[test]
    fn test_recessive_contradicted_by_vertical_transmission() {
        let graph = dominant_family();
        let view = view_of(&graph);
        let evaluator = AutosomalRecessiveEvaluator;

        assert_eq!(
            classify(&evaluator, &view, 3),
            Classification::Contradicting
        );
    }

    #[test]
    fn test_dominant_supports_vertical_transmission() {
        let graph = dominant_family();
        let view = view_of(&graph);
        let evaluator = AutosomalDominantEvaluator;

        assert_eq!(classify(&evaluator, &view, 3), Classification::Supporting);
        // the founder has no recorded parents, so they stay neutral
        assert_eq!(classify(&evaluator, &view, 1), Classification::Neutral);
    }

    #[test]
    fn test_dominant_contradicted_when_parents_are_clear() {
        let graph = recessive_family();
        let view = view_of(&graph);
        let evaluator = AutosomalDominantEvaluator;

        assert_eq!(
            classify(&evaluator, &view, 3),
            Classification::Contradicting
        );
    }

    #[test]
    fn test_single_known_parent_is_not_enough_to_classify() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph
            .add_individual(person(1, Sex::Female, AffectedStatus::Unaffected))
            .unwrap();
        graph
            .add_individual(person(2, Sex::Male, AffectedStatus::Affected))
            .unwrap();
        graph
            .add_relationship(Relationship::parent_of(id(1), id(2)))
            .unwrap();

        let view = view_of(&graph);
        assert_eq!(
            classify(&AutosomalRecessiveEvaluator, &view, 2),
            Classification::Neutral
        );
        assert_eq!(
            classify(&AutosomalDominantEvaluator, &view, 2),
            Classification::Neutral
        );
    }
}
