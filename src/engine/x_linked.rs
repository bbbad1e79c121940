//! X-linked pattern rules.
//!
//! Classification tables, fixed and reviewable:
//! - recessive: affected males support; an affected female with a
//!   recorded unaffected father contradicts (she would need a paternal
//!   copy); an unaffected son of an affected mother contradicts, since a
//!   homozygous mother passes the trait to every son.
//! - dominant: an affected individual with an affected mother, or an
//!   affected daughter of an affected father, supports; an unaffected
//!   daughter of an affected father contradicts (the paternal X reaches
//!   every daughter); an affected son whose only affected parent is the
//!   father contradicts, because the X never passes father to son.

use crate::engine::rules::{Classification, ConditionView, PatternEvaluator, ViewMember};
use crate::schema::record::{AffectedStatus, Sex};
use crate::types::PatternHypothesis;

pub struct XLinkedRecessiveEvaluator;

impl PatternEvaluator for XLinkedRecessiveEvaluator {
    fn id(&self) -> &'static str {
        "x_linked_recessive"
    }

    fn pattern(&self) -> PatternHypothesis {
        PatternHypothesis::XLinkedRecessive
    }

    fn classify(
        &self,
        member: &ViewMember,
        view: &ConditionView,
    ) -> (Classification, Option<String>) {
        match (member.sex, member.status) {
            (Sex::Male, AffectedStatus::Affected) => (
                Classification::Supporting,
                Some(format!(
                    "{}: affected male, consistent with transmission through a carrier mother",
                    member.label
                )),
            ),
            (Sex::Female, AffectedStatus::Affected) => {
                match view.father_of(member.id) {
                    Some(father) if father.is_unaffected() => (
                        Classification::Contradicting,
                        Some(format!(
                            "{}: affected female whose father {} is unaffected",
                            member.label, father.label
                        )),
                    ),
                    Some(father) if father.is_affected() => (
                        Classification::Supporting,
                        Some(format!(
                            "{}: affected female with an affected father",
                            member.label
                        )),
                    ),
                    _ => (Classification::Neutral, None),
                }
            }
            (Sex::Male, AffectedStatus::Unaffected) => {
                match view.mother_of(member.id) {
                    Some(mother) if mother.is_affected() => (
                        Classification::Contradicting,
                        Some(format!(
                            "{}: unaffected son of affected mother {}, who would transmit to every son",
                            member.label, mother.label
                        )),
                    ),
                    _ => (Classification::Neutral, None),
                }
            }
            _ => (Classification::Neutral, None),
        }
    }
}

pub struct XLinkedDominantEvaluator;

impl PatternEvaluator for XLinkedDominantEvaluator {
    fn id(&self) -> &'static str {
        "x_linked_dominant"
    }

    fn pattern(&self) -> PatternHypothesis {
        PatternHypothesis::XLinkedDominant
    }

    fn classify(
        &self,
        member: &ViewMember,
        view: &ConditionView,
    ) -> (Classification, Option<String>) {
        let mother = view.mother_of(member.id);
        let father = view.father_of(member.id);
        let mother_affected = mother.map(|m| m.is_affected()).unwrap_or(false);
        let father_affected = father.map(|f| f.is_affected()).unwrap_or(false);

        if member.is_affected() {
            if mother_affected {
                return (
                    Classification::Supporting,
                    Some(format!(
                        "{}: affected with an affected mother",
                        member.label
                    )),
                );
            }
            if father_affected {
                return match member.sex {
                    Sex::Female => (
                        Classification::Supporting,
                        Some(format!(
                            "{}: affected daughter of an affected father",
                            member.label
                        )),
                    ),
                    Sex::Male => {
                        if mother.map(|m| m.is_unaffected()).unwrap_or(false) {
                            (
                                Classification::Contradicting,
                                Some(format!(
                                    "{}: affected son attributed to his father, but the X never passes father to son",
                                    member.label
                                )),
                            )
                        } else {
                            (Classification::Neutral, None)
                        }
                    }
                    Sex::Unknown => (Classification::Neutral, None),
                };
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
            return (Classification::Neutral, None);
        }

        if member.is_unaffected() && member.sex == Sex::Female && father_affected {
            if let Some(father) = father {
                return (
                    Classification::Contradicting,
                    Some(format!(
                        "{}: unaffected daughter of affected father {}, whose X reaches every daughter",
                        member.label, father.label
                    )),
                );
            }
        }

        (Classification::Neutral, None)
    }
}
