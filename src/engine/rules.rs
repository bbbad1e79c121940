//! Inheritance-pattern evaluation. Evaluators classify each individual as
//! supporting, contradicting or neutral for one condition; the engine owns
//! scoring, ranking and isolation so every evaluator stays a pure table of
//! classification rules.

use crate::engine::{autosomal, mitochondrial, x_linked};
use crate::error::EngineError;
use crate::pedigree::graph::PedigreeGraph;
use crate::schema::record::{AffectedStatus, ConditionId, IndividualId, Sex};
use crate::types::{InheritanceFinding, PatternHypothesis};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, instrument, warn};

/// How one individual bears on a pattern hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Supporting,
    Contradicting,
    Neutral,
}

/// One individual as seen through a single condition. Masked individuals
/// keep their position in the family structure but carry unknown status
/// and sex, so they can never be informative.
#[derive(Debug, Clone)]
pub struct ViewMember {
    pub id: IndividualId,
    pub label: String,
    pub sex: Sex,
    pub status: AffectedStatus,
    pub parents: Vec<IndividualId>,
    pub children: Vec<IndividualId>,
}

impl ViewMember {
    pub fn is_affected(&self) -> bool {
        self.status == AffectedStatus::Affected
    }

    pub fn is_unaffected(&self) -> bool {
        self.status == AffectedStatus::Unaffected
    }
}

/// Precomputed per-condition population view. Parent and child links
/// follow biological edges only; inheritance does not flow through
/// adoptive relationships.
pub struct ConditionView {
    condition: ConditionId,
    members: Vec<ViewMember>,
    index: HashMap<IndividualId, usize>,
}

impl ConditionView {
    pub fn new(
        graph: &PedigreeGraph,
        condition: &ConditionId,
        masked: &HashSet<IndividualId>,
    ) -> Self {
        let ids = graph.ids();

        let mut children_of: HashMap<IndividualId, Vec<IndividualId>> = HashMap::new();
        for &id in &ids {
            for parent in graph.biological_parents_of(id) {
                children_of.entry(parent).or_default().push(id);
            }
        }

        let mut members = Vec::with_capacity(ids.len());
        let mut index = HashMap::with_capacity(ids.len());
        for &id in &ids {
            let Some(individual) = graph.individual(id) else {
                continue;
            };
            let is_masked = masked.contains(&id);
            let member = ViewMember {
                id,
                label: individual.display_label(),
                sex: if is_masked {
                    Sex::Unknown
                } else {
                    individual.sex_at_birth
                },
                status: if is_masked {
                    AffectedStatus::Unknown
                } else {
                    individual.affected_status(condition)
                },
                parents: graph.biological_parents_of(id),
                children: children_of.remove(&id).unwrap_or_default(),
            };
            index.insert(id, members.len());
            members.push(member);
        }

        ConditionView {
            condition: condition.clone(),
            members,
            index,
        }
    }

    pub fn condition(&self) -> &ConditionId {
        &self.condition
    }

    /// Members in ascending id order.
    pub fn members(&self) -> &[ViewMember] {
        &self.members
    }

    pub fn member(&self, id: IndividualId) -> Option<&ViewMember> {
        self.index.get(&id).map(|&i| &self.members[i])
    }

    pub fn status(&self, id: IndividualId) -> AffectedStatus {
        self.member(id)
            .map(|m| m.status)
            .unwrap_or(AffectedStatus::Unknown)
    }

    pub fn label(&self, id: IndividualId) -> String {
        self.member(id)
            .map(|m| m.label.clone())
            .unwrap_or_else(|| format!("individual {}", id))
    }

    /// The biological mother, when a parent with recorded female sex exists.
    pub fn mother_of(&self, id: IndividualId) -> Option<&ViewMember> {
        self.parent_by_sex(id, Sex::Female)
    }

    pub fn father_of(&self, id: IndividualId) -> Option<&ViewMember> {
        self.parent_by_sex(id, Sex::Male)
    }

    fn parent_by_sex(&self, id: IndividualId, sex: Sex) -> Option<&ViewMember> {
        let member = self.member(id)?;
        member
            .parents
            .iter()
            .filter_map(|&p| self.member(p))
            .find(|parent| parent.sex == sex)
    }

    /// Both recorded parents known to be unaffected. False when fewer than
    /// two parents are recorded or any status is unknown.
    pub fn both_parents_unaffected(&self, id: IndividualId) -> bool {
        let Some(member) = self.member(id) else {
            return false;
        };
        member.parents.len() == 2
            && member
                .parents
                .iter()
                .all(|&p| self.status(p) == AffectedStatus::Unaffected)
    }

    pub fn any_parent_affected(&self, id: IndividualId) -> bool {
        let Some(member) = self.member(id) else {
            return false;
        };
        member
            .parents
            .iter()
            .any(|&p| self.status(p) == AffectedStatus::Affected)
    }

    /// The other biological parent of `child`, from the viewpoint of
    /// `parent`.
    pub fn co_parent_of(
        &self,
        parent: IndividualId,
        child: IndividualId,
    ) -> Option<&ViewMember> {
        let member = self.member(child)?;
        member
            .parents
            .iter()
            .filter(|&&p| p != parent)
            .filter_map(|&p| self.member(p))
            .next()
    }
}

/// A single inheritance-pattern rule set. Implementations classify one
/// member at a time and return a trace line for every informative call.
pub trait PatternEvaluator: Send + Sync {
    fn id(&self) -> &'static str;
    fn pattern(&self) -> PatternHypothesis;
    fn classify(&self, member: &ViewMember, view: &ConditionView)
        -> (Classification, Option<String>);
}

/// Runs registered evaluators over a condition and ranks their findings.
/// Registration order is the tie-break order, so adding an evaluator never
/// reshuffles existing results.
pub struct RuleEngine {
    evaluators: Vec<Box<dyn PatternEvaluator>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    /// The standard five-pattern registry.
    pub fn with_default_evaluators() -> Self {
        let mut engine = Self::new();
        engine.register(Box::new(autosomal::AutosomalRecessiveEvaluator));
        engine.register(Box::new(autosomal::AutosomalDominantEvaluator));
        engine.register(Box::new(x_linked::XLinkedRecessiveEvaluator));
        engine.register(Box::new(x_linked::XLinkedDominantEvaluator));
        engine.register(Box::new(mitochondrial::MitochondrialEvaluator));
        engine
    }

    pub fn register(&mut self, evaluator: Box<dyn PatternEvaluator>) {
        self.evaluators.push(evaluator);
    }

    pub fn evaluator_count(&self) -> usize {
        self.evaluators.len()
    }

    /// Evaluate one condition across the unmasked population. Findings come
    /// back sorted by consistency, strongest first.
    #[instrument(skip(self, graph, masked), fields(condition = %condition))]
    pub fn evaluate_condition(
        &self,
        graph: &PedigreeGraph,
        condition: &ConditionId,
        masked: &HashSet<IndividualId>,
    ) -> Result<Vec<InheritanceFinding>, EngineError> {
        if self.evaluators.is_empty() {
            return Err(EngineError::EmptyRegistry);
        }
        if !graph.condition_ids().contains(condition) {
            return Err(EngineError::UnknownCondition(condition.to_string()));
        }

        let view = ConditionView::new(graph, condition, masked);
        let mut findings = Vec::with_capacity(self.evaluators.len());

        for evaluator in &self.evaluators {
            let outcome = catch_unwind(AssertUnwindSafe(|| run_evaluator(evaluator.as_ref(), &view)));
            let finding = match outcome {
                Ok(finding) => finding,
                Err(_) => {
                    warn!(
                        rule = evaluator.id(),
                        "evaluator panicked; recording an indeterminate finding"
                    );
                    InheritanceFinding::indeterminate(condition.clone(), evaluator.id())
                }
            };
            findings.push(finding);
        }

        // stable sort keeps registration order for equal scores
        findings.sort_by(|a, b| {
            b.consistency
                .partial_cmp(&a.consistency)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            findings = findings.len(),
            top = findings.first().map(|f| f.rule_id.as_str()).unwrap_or("-"),
            "condition evaluated"
        );
        Ok(findings)
    }

    /// Evaluate every condition present in the pedigree.
    pub fn evaluate_all(
        &self,
        graph: &PedigreeGraph,
        masked: &HashSet<IndividualId>,
    ) -> Result<BTreeMap<ConditionId, Vec<InheritanceFinding>>, EngineError> {
        let mut results = BTreeMap::new();
        for condition in graph.condition_ids() {
            let findings = self.evaluate_condition(graph, &condition, masked)?;
            results.insert(condition, findings);
        }
        Ok(results)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}

fn run_evaluator(evaluator: &dyn PatternEvaluator, view: &ConditionView) -> InheritanceFinding {
    let mut supporting = Vec::new();
    let mut contradicting = Vec::new();
    let mut trace = Vec::new();

    for member in view.members() {
        let (classification, reason) = evaluator.classify(member, view);
        match classification {
            Classification::Supporting => supporting.push(member.id),
            Classification::Contradicting => contradicting.push(member.id),
            Classification::Neutral => continue,
        }
        if let Some(reason) = reason {
            trace.push(reason);
        }
    }

    let informative = supporting.len() + contradicting.len();
    if informative == 0 {
        return InheritanceFinding::indeterminate(view.condition().clone(), evaluator.id());
    }

    InheritanceFinding {
        condition: view.condition().clone(),
        pattern: evaluator.pattern(),
        rule_id: evaluator.id().to_string(),
        consistency: supporting.len() as f64 / informative as f64,
        supporting,
        contradicting,
        trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::{Individual, Relationship, SourceKind, SourceMethod};

    fn id(n: u64) -> IndividualId {
        IndividualId(n)
    }

    fn condition() -> ConditionId {
        ConditionId::new("cystic fibrosis")
    }

    fn person(n: u64, sex: Sex, status: Option<AffectedStatus>) -> Individual {
        let mut individual = Individual::new(id(n));
        individual.sex_at_birth = sex;
        if let Some(status) = status {
            individual.conditions.insert(condition(), status);
        }
        individual
    }

    /// Unaffected parents (1 father, 2 mother), affected son 3 and
    /// affected daughter 4.
    fn recessive_family() -> PedigreeGraph {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph
            .add_individual(person(1, Sex::Male, Some(AffectedStatus::Unaffected)))
            .unwrap();
        graph
            .add_individual(person(2, Sex::Female, Some(AffectedStatus::Unaffected)))
            .unwrap();
        graph
            .add_individual(person(3, Sex::Male, Some(AffectedStatus::Affected)))
            .unwrap();
        graph
            .add_individual(person(4, Sex::Female, Some(AffectedStatus::Affected)))
            .unwrap();
        for child in [3, 4] {
            graph
                .add_relationship(Relationship::parent_of(id(1), id(child)))
                .unwrap();
            graph
                .add_relationship(Relationship::parent_of(id(2), id(child)))
                .unwrap();
        }
        graph
    }

    struct PanickingEvaluator;

    impl PatternEvaluator for PanickingEvaluator {
        fn id(&self) -> &'static str {
            "panicking"
        }
        fn pattern(&self) -> PatternHypothesis {
            PatternHypothesis::AutosomalDominant
        }
        fn classify(
            &self,
            _member: &ViewMember,
            _view: &ConditionView,
        ) -> (Classification, Option<String>) {
            panic!("rule table corrupt")
        }
    }

    #[test]
    fn test_recessive_family_ranks_ar_first_with_both_siblings() {
        let graph = recessive_family();
        let engine = RuleEngine::with_default_evaluators();
        let findings = engine
            .evaluate_condition(&graph, &condition(), &HashSet::new())
            .unwrap();

        let top = &findings[0];
        assert_eq!(top.pattern, PatternHypothesis::AutosomalRecessive);
        assert_eq!(top.consistency, 1.0);
        assert_eq!(top.supporting, vec![id(3), id(4)]);
        assert!(top.trace.iter().any(|line| line.contains("individual #3")));
        assert!(top.trace.iter().any(|line| line.contains("individual #4")));

        for finding in &findings {
            assert!((0.0..=1.0).contains(&finding.consistency));
        }
    }

    #[test]
    fn test_zero_informative_population_is_indeterminate() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph
            .add_individual(person(1, Sex::Male, Some(AffectedStatus::Unknown)))
            .unwrap();

        let engine = RuleEngine::with_default_evaluators();
        let findings = engine
            .evaluate_condition(&graph, &condition(), &HashSet::new())
            .unwrap();

        assert!(findings
            .iter()
            .all(|f| f.pattern == PatternHypothesis::Indeterminate));
        assert!(findings.iter().all(|f| f.consistency == 0.0));
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let mut graph = PedigreeGraph::new(SourceKind::Upload, SourceMethod::Manual);
        graph
            .add_individual(person(1, Sex::Male, Some(AffectedStatus::Affected)))
            .unwrap();

        let engine = RuleEngine::with_default_evaluators();
        let findings = engine
            .evaluate_condition(&graph, &condition(), &HashSet::new())
            .unwrap();

        // a lone affected male supports only the X-linked recessive rule;
        // the remaining four stay indeterminate in registration order
        assert_eq!(findings[0].rule_id, "x_linked_recessive");
        let tail: Vec<&str> = findings[1..].iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(
            tail,
            vec![
                "autosomal_recessive",
                "autosomal_dominant",
                "x_linked_dominant",
                "mitochondrial"
            ]
        );
    }

    #[test]
    fn test_panicking_evaluator_is_isolated() {
        let graph = recessive_family();
        let mut engine = RuleEngine::with_default_evaluators();
        engine.register(Box::new(PanickingEvaluator));

        let findings = engine
            .evaluate_condition(&graph, &condition(), &HashSet::new())
            .unwrap();

        assert_eq!(findings.len(), 6);
        let poisoned = findings.iter().find(|f| f.rule_id == "panicking").unwrap();
        assert_eq!(poisoned.pattern, PatternHypothesis::Indeterminate);
        assert!(findings
            .iter()
            .any(|f| f.pattern == PatternHypothesis::AutosomalRecessive && f.consistency == 1.0));
    }

    #[test]
    fn test_masked_individuals_are_uninformative() {
        let graph = recessive_family();
        let engine = RuleEngine::with_default_evaluators();
        let masked: HashSet<IndividualId> = [id(3), id(4)].into_iter().collect();

        let findings = engine
            .evaluate_condition(&graph, &condition(), &masked)
            .unwrap();

        // with both affected children masked nothing informative remains
        assert!(findings
            .iter()
            .all(|f| f.pattern == PatternHypothesis::Indeterminate));
    }

    #[test]
    fn test_unknown_condition_is_a_typed_error() {
        let graph = recessive_family();
        let engine = RuleEngine::with_default_evaluators();
        let err = engine
            .evaluate_condition(&graph, &ConditionId::new("unrecorded"), &HashSet::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownCondition(_)));
    }

    #[test]
    fn test_empty_registry_is_a_typed_error() {
        let graph = recessive_family();
        let engine = RuleEngine::new();
        let err = engine
            .evaluate_condition(&graph, &condition(), &HashSet::new())
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyRegistry));
    }

    #[test]
    fn test_evaluate_all_covers_every_condition() {
        let mut graph = recessive_family();
        let mut extra = person(5, Sex::Female, None);
        extra
            .conditions
            .insert(ConditionId::new("asthma"), AffectedStatus::Affected);
        graph.add_individual(extra).unwrap();

        let engine = RuleEngine::with_default_evaluators();
        let results = engine.evaluate_all(&graph, &HashSet::new()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.contains_key(&ConditionId::new("asthma")));
        assert!(results.contains_key(&condition()));
    }
}
