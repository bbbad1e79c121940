//! Risk aggregation: ranked pattern findings per condition become at most
//! one risk flag per condition. Every flag is traceable to the rules and
//! individuals behind it; a flag that cannot name its evidence is not
//! emitted.

use crate::config::RiskBands;
use crate::schema::record::{ConditionId, IndividualId};
use crate::types::{ConflictRecord, FlagProvenance, InheritanceFinding, RiskBand, RiskFlag};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

pub struct RiskAggregator {
    bands: RiskBands,
}

impl RiskAggregator {
    pub fn new(bands: &RiskBands) -> Self {
        RiskAggregator {
            bands: bands.clone(),
        }
    }

    /// One pass over the per-condition findings, in condition order so the
    /// same inputs always yield the same flag order. Conditions whose
    /// findings are all indeterminate produce no flag.
    #[instrument(skip(self, findings, conflicts))]
    pub fn aggregate(
        &self,
        findings: &BTreeMap<ConditionId, Vec<InheritanceFinding>>,
        conflicts: &[ConflictRecord],
    ) -> Vec<RiskFlag> {
        let mut flags = Vec::new();

        for (condition, ranked) in findings {
            let informative: Vec<&InheritanceFinding> =
                ranked.iter().filter(|f| f.is_informative()).collect();
            let Some(top) = informative.first() else {
                debug!(condition = %condition, "no informative findings; no flag");
                continue;
            };

            let provenance = Self::provenance(&informative);
            if provenance.is_empty() {
                debug!(condition = %condition, "flag without evidence suppressed");
                continue;
            }

            let advisory_conflicts: Vec<ConflictRecord> = conflicts
                .iter()
                .filter(|conflict| {
                    !conflict.is_blocking()
                        && provenance
                            .individuals
                            .iter()
                            .any(|&id| conflict.involves(id))
                })
                .cloned()
                .collect();

            let band = self.band(top.consistency);
            flags.push(RiskFlag {
                condition: condition.clone(),
                rationale: rationale(condition, top, band, !advisory_conflicts.is_empty()),
                band,
                findings: ranked.clone(),
                provenance,
                advisory_conflicts,
            });
        }

        debug!(flags = flags.len(), "risk aggregation complete");
        flags
    }

    fn band(&self, consistency: f64) -> RiskBand {
        if consistency >= self.bands.high {
            RiskBand::High
        } else if consistency >= self.bands.moderate {
            RiskBand::Moderate
        } else {
            RiskBand::Low
        }
    }

    /// Union of the evidence behind the informative findings. Sorted and
    /// deduplicated so flag provenance is stable across runs.
    fn provenance(informative: &[&InheritanceFinding]) -> FlagProvenance {
        let mut rule_ids: Vec<String> = Vec::new();
        let mut individuals: Vec<IndividualId> = Vec::new();
        for finding in informative {
            if !rule_ids.contains(&finding.rule_id) {
                rule_ids.push(finding.rule_id.clone());
            }
            individuals.extend(&finding.supporting);
        }
        individuals.sort();
        individuals.dedup();
        FlagProvenance {
            rule_ids,
            individuals,
        }
    }
}

/// Deliberately hedged wording. The engine surfaces hypotheses for a
/// clinician; it never states a diagnosis or a numeric probability of
/// disease.
fn rationale(
    condition: &ConditionId,
    top: &InheritanceFinding,
    band: RiskBand,
    caveated: bool,
) -> String {
    let strength = match band {
        RiskBand::High => "strongly consistent with",
        RiskBand::Moderate => "moderately consistent with",
        RiskBand::Low => "weakly consistent with",
    };
    let mut text = format!(
        "The reported family history of {} is {} a {} inheritance pattern \
         (consistency {:.2}, {} supporting family member{}). This is a pattern \
         hypothesis, not a diagnosis; professional genetic counseling is recommended.",
        condition,
        strength,
        top.pattern.label(),
        top.consistency,
        top.supporting.len(),
        if top.supporting.len() == 1 { "" } else { "s" },
    );
    if caveated {
        text.push_str(
            " Advisory data conflicts touch the supporting evidence; see the attached conflicts.",
        );
    }
    text
}
