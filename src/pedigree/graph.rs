use crate::error::GraphError;
use crate::schema::record::{
    Individual, IndividualId, PedigreeRecord, Provenance, Relationship, RelationshipKind,
    SourceKind, SourceMethod, CURRENT_SCHEMA_VERSION,
};
use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

/// Canonical in-memory pedigree. Wraps a petgraph DiGraph whose nodes are
/// individual ids and whose edges carry the full relationship data.
///
/// Every mutation validates before it commits: a rejected mutation returns
/// a typed [`GraphError`] and leaves the graph byte-for-byte unchanged.
/// Committed edges are never rewritten by later mutations, so confidence
/// and origin data survive unrelated edits.
pub struct PedigreeGraph {
    graph: DiGraph<IndividualId, Relationship>,
    node_map: HashMap<IndividualId, NodeIndex>,
    individuals: HashMap<IndividualId, Individual>,
    provenance: Provenance,
    created_at: DateTime<Utc>,
}

impl PedigreeGraph {
    pub fn new(source: SourceKind, method: SourceMethod) -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            individuals: HashMap::new(),
            provenance: Provenance {
                source,
                method,
                notes: Vec::new(),
            },
            created_at: Utc::now(),
        }
    }

    /// Load a record through the checked mutations. Entries the guards
    /// reject are returned instead of applied, so a hostile payload still
    /// yields a valid graph plus the list of everything wrong with it.
    pub fn from_record(record: &PedigreeRecord) -> (Self, Vec<GraphError>) {
        let mut pedigree = Self::new(record.provenance.source, record.provenance.method);
        pedigree.provenance = record.provenance.clone();
        pedigree.created_at = record.created_at;

        let mut rejections = Vec::new();
        for individual in &record.individuals {
            if let Err(rejection) = pedigree.add_individual(individual.clone()) {
                rejections.push(rejection);
            }
        }
        for relationship in &record.relationships {
            if let Err(rejection) = pedigree.add_relationship(relationship.clone()) {
                rejections.push(rejection);
            }
        }

        debug!(
            individuals = pedigree.individual_count(),
            relationships = pedigree.relationship_count(),
            rejections = rejections.len(),
            "loaded pedigree from record"
        );
        (pedigree, rejections)
    }

    /// Serialize back to the persisted form. Output ordering is
    /// deterministic: individuals by id, relationships by (kind, from, to).
    pub fn to_record(&self) -> PedigreeRecord {
        let mut individuals: Vec<Individual> = self.individuals.values().cloned().collect();
        individuals.sort_by_key(|i| i.id);

        let mut relationships: Vec<Relationship> =
            self.graph.edge_weights().cloned().collect();
        relationships.sort_by_key(|r| (r.kind as u8, r.from, r.to));

        PedigreeRecord {
            schema_version: CURRENT_SCHEMA_VERSION,
            created_at: self.created_at,
            individuals,
            relationships,
            provenance: self.provenance.clone(),
        }
    }

    pub fn individual_count(&self) -> usize {
        self.individuals.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: IndividualId) -> bool {
        self.individuals.contains_key(&id)
    }

    pub fn individual(&self, id: IndividualId) -> Option<&Individual> {
        self.individuals.get(&id)
    }

    pub fn proband(&self) -> Option<&Individual> {
        self.individuals.values().find(|i| i.proband)
    }

    /// All ids, ascending. The iteration order for every deterministic sweep.
    pub fn ids(&self) -> Vec<IndividualId> {
        let mut ids: Vec<IndividualId> = self.individuals.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Distinct conditions mentioned by any individual, sorted.
    pub fn condition_ids(&self) -> Vec<crate::schema::record::ConditionId> {
        let mut conditions: Vec<_> = self
            .individuals
            .values()
            .flat_map(|i| i.conditions.keys().cloned())
            .collect();
        conditions.sort();
        conditions.dedup();
        conditions
    }

    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.graph.edge_weights()
    }

    /// Add a new individual. Duplicate ids and second probands are rejected.
    pub fn add_individual(&mut self, individual: Individual) -> Result<(), GraphError> {
        if self.individuals.contains_key(&individual.id) {
            return Err(GraphError::DuplicateIndividual(individual.id));
        }
        if individual.proband {
            if let Some(existing) = self.proband() {
                return Err(GraphError::DuplicateProband {
                    candidate: individual.id,
                    existing: existing.id,
                });
            }
        }
        let index = self.graph.add_node(individual.id);
        self.node_map.insert(individual.id, index);
        self.individuals.insert(individual.id, individual);
        Ok(())
    }

    /// Replace the demographic and clinical fields of an existing
    /// individual. Relationships are untouched.
    pub fn update_individual(&mut self, individual: Individual) -> Result<(), GraphError> {
        if !self.individuals.contains_key(&individual.id) {
            return Err(GraphError::UnknownIndividual(individual.id));
        }
        if individual.proband {
            if let Some(existing) = self.proband() {
                if existing.id != individual.id {
                    return Err(GraphError::DuplicateProband {
                        candidate: individual.id,
                        existing: existing.id,
                    });
                }
            }
        }
        self.individuals.insert(individual.id, individual);
        Ok(())
    }

    /// Add a relationship after running every pre-commit guard: endpoints
    /// exist, no self-edges, no duplicates, at most two biological parents
    /// per child, and no ancestry cycles.
    pub fn add_relationship(&mut self, relationship: Relationship) -> Result<(), GraphError> {
        let mut relationship = relationship;
        if relationship.kind == RelationshipKind::PartnerOf && relationship.from > relationship.to
        {
            std::mem::swap(&mut relationship.from, &mut relationship.to);
        }

        if relationship.from == relationship.to {
            return Err(GraphError::SelfRelationship(relationship.from));
        }
        let from_index = *self
            .node_map
            .get(&relationship.from)
            .ok_or(GraphError::DanglingReference(relationship.from))?;
        let to_index = *self
            .node_map
            .get(&relationship.to)
            .ok_or(GraphError::DanglingReference(relationship.to))?;

        if self.edge_exists(relationship.kind, relationship.from, relationship.to) {
            return Err(GraphError::DuplicateRelationship {
                from: relationship.from,
                to: relationship.to,
            });
        }

        if relationship.kind == RelationshipKind::ParentOf {
            if relationship.biological {
                let biological_parents = self.biological_parents_of(relationship.to).len();
                if biological_parents >= 2 {
                    return Err(GraphError::ExcessParents {
                        child: relationship.to,
                    });
                }
            }
            // parent reachable below the child means the new edge closes a loop
            if self.is_ancestor_of(relationship.to, relationship.from) {
                return Err(GraphError::RelationshipCycle {
                    parent: relationship.from,
                    child: relationship.to,
                });
            }
        }

        self.graph.add_edge(from_index, to_index, relationship);
        Ok(())
    }

    /// Remove one relationship and return it. Partner edges match in either
    /// endpoint order.
    pub fn remove_relationship(
        &mut self,
        kind: RelationshipKind,
        from: IndividualId,
        to: IndividualId,
    ) -> Result<Relationship, GraphError> {
        let edge = self
            .find_edge(kind, from, to)
            .ok_or(GraphError::UnknownRelationship { from, to })?;
        let removed = self
            .graph
            .remove_edge(edge)
            .ok_or(GraphError::UnknownRelationship { from, to })?;
        Ok(removed)
    }

    /// Immediate parents of an individual (biological and adoptive).
    pub fn parents_of(&self, id: IndividualId) -> Vec<IndividualId> {
        self.incident_ids(id, Direction::Incoming, RelationshipKind::ParentOf)
    }

    pub fn biological_parents_of(&self, id: IndividualId) -> Vec<IndividualId> {
        let Some(&index) = self.node_map.get(&id) else {
            return Vec::new();
        };
        let mut parents: Vec<IndividualId> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .filter(|e| e.weight().kind == RelationshipKind::ParentOf && e.weight().biological)
            .map(|e| e.weight().from)
            .collect();
        parents.sort();
        parents
    }

    pub fn children_of(&self, id: IndividualId) -> Vec<IndividualId> {
        self.incident_ids(id, Direction::Outgoing, RelationshipKind::ParentOf)
    }

    /// Partners in either stored direction.
    pub fn partners_of(&self, id: IndividualId) -> Vec<IndividualId> {
        let Some(&index) = self.node_map.get(&id) else {
            return Vec::new();
        };
        let mut partners: Vec<IndividualId> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .chain(self.graph.edges_directed(index, Direction::Incoming))
            .filter(|e| e.weight().kind == RelationshipKind::PartnerOf)
            .map(|e| {
                if e.weight().from == id {
                    e.weight().to
                } else {
                    e.weight().from
                }
            })
            .collect();
        partners.sort();
        partners.dedup();
        partners
    }

    /// True when `ancestor` appears anywhere above `descendant` through
    /// parent edges.
    pub fn is_ancestor_of(&self, ancestor: IndividualId, descendant: IndividualId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(descendant);
        visited.insert(descendant);

        while let Some(current) = queue.pop_front() {
            for parent in self.parents_of(current) {
                if parent == ancestor {
                    return true;
                }
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        false
    }

    fn incident_ids(
        &self,
        id: IndividualId,
        direction: Direction,
        kind: RelationshipKind,
    ) -> Vec<IndividualId> {
        let Some(&index) = self.node_map.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<IndividualId> = self
            .graph
            .edges_directed(index, direction)
            .filter(|e| e.weight().kind == kind)
            .map(|e| match direction {
                Direction::Incoming => e.weight().from,
                Direction::Outgoing => e.weight().to,
            })
            .collect();
        ids.sort();
        ids
    }

    fn edge_exists(&self, kind: RelationshipKind, from: IndividualId, to: IndividualId) -> bool {
        self.find_edge(kind, from, to).is_some()
    }

    fn find_edge(
        &self,
        kind: RelationshipKind,
        from: IndividualId,
        to: IndividualId,
    ) -> Option<petgraph::graph::EdgeIndex> {
        self.graph.edge_indices().find(|&edge| {
            let weight = &self.graph[edge];
            if weight.kind != kind {
                return false;
            }
            let same = weight.from == from && weight.to == to;
            let flipped = kind == RelationshipKind::PartnerOf
                && weight.from == to
                && weight.to == from;
            same || flipped
        })
    }
}
