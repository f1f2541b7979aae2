//! Duplicate detection for entities, relations, and observations.
//!
//! Candidates are scored against the existing graph (and optionally the graph
//! against itself) with the similarity engine. Scores at or above the
//! configured thresholds are reported together with a match classification.
//! Detection is read-only.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::model::{Entity, KnowledgeGraph, ObservationInput, Relation};
use crate::similarity::{edit_similarity, similarity, MatchMode};

const ENTITY_NAME_WEIGHT: f64 = 0.7;
const ENTITY_TYPE_WEIGHT: f64 = 0.3;
const RELATION_FROM_WEIGHT: f64 = 0.35;
const RELATION_TO_WEIGHT: f64 = 0.35;
const RELATION_TYPE_WEIGHT: f64 = 0.3;
const SEMANTIC_MATCH_EDIT_FLOOR: f64 = 0.9;
/// Absorbs floating-point noise so a score equal to its threshold is reported.
const SCORE_TOLERANCE: f64 = 1e-9;

/// Named bundle of threshold and mode defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePreset {
    Strict,
    Standard,
    Loose,
}

impl DuplicatePreset {
    pub fn policy(self) -> DuplicatePolicy {
        let (entity_threshold, observation_threshold, semantic_matching) = match self {
            Self::Strict => (0.95, 0.90, false),
            Self::Standard => (0.80, 0.70, false),
            Self::Loose => (0.60, 0.50, true),
        };
        DuplicatePolicy {
            entity_threshold,
            observation_threshold,
            include_entity_type: true,
            semantic_matching,
        }
    }
}

/// Caller-facing options; explicit fields override the preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateCheckOptions {
    pub preset: Option<DuplicatePreset>,
    pub entity_threshold: Option<f64>,
    pub observation_threshold: Option<f64>,
    pub include_entity_type: Option<bool>,
    pub semantic_matching: Option<bool>,
}

impl DuplicateCheckOptions {
    /// Fills from the preset (`standard` when absent), then applies overrides.
    pub fn resolve(&self) -> GraphResult<DuplicatePolicy> {
        let mut policy = self.preset.unwrap_or(DuplicatePreset::Standard).policy();
        if let Some(threshold) = self.entity_threshold {
            policy.entity_threshold = validate_threshold("entity", threshold)?;
        }
        if let Some(threshold) = self.observation_threshold {
            policy.observation_threshold = validate_threshold("observation", threshold)?;
        }
        if let Some(include_entity_type) = self.include_entity_type {
            policy.include_entity_type = include_entity_type;
        }
        if let Some(semantic_matching) = self.semantic_matching {
            policy.semantic_matching = semantic_matching;
        }
        Ok(policy)
    }
}

/// Fully resolved detection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuplicatePolicy {
    pub entity_threshold: f64,
    pub observation_threshold: f64,
    pub include_entity_type: bool,
    pub semantic_matching: bool,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        DuplicatePreset::Standard.policy()
    }
}

impl DuplicatePolicy {
    pub fn match_mode(&self) -> MatchMode {
        MatchMode::from_semantic_flag(self.semantic_matching)
    }
}

/// Records to check plus detection options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindDuplicatesRequest {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    pub observations: Vec<ObservationInput>,
    /// Also scan existing entities and relations pairwise.
    pub check_within_existing: bool,
    pub options: DuplicateCheckOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateType {
    /// Every compared field is identical.
    Structural,
    Semantic,
}

/// Whether a pair came from a candidate check or the within-graph scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateSource {
    Candidate,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDuplicate {
    pub candidate: Entity,
    pub existing: Entity,
    pub similarity_score: f64,
    pub match_type: MatchType,
    pub duplicate_type: DuplicateType,
    pub source: DuplicateSource,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationDuplicate {
    pub candidate: Relation,
    pub existing: Relation,
    pub similarity_score: f64,
    pub match_type: MatchType,
    pub duplicate_type: DuplicateType,
    pub source: DuplicateSource,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDuplicate {
    pub entity_name: String,
    pub candidate: String,
    pub existing: String,
    pub similarity_score: f64,
    pub match_type: MatchType,
    pub duplicate_type: DuplicateType,
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateStatistics {
    pub total_duplicates: usize,
    pub entity_duplicates: usize,
    pub relation_duplicates: usize,
    pub observation_duplicates: usize,
    pub exact_matches: usize,
    pub fuzzy_matches: usize,
    pub semantic_matches: usize,
    pub candidates_checked: usize,
    pub has_duplicates: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    pub entity_duplicates: Vec<EntityDuplicate>,
    pub relation_duplicates: Vec<RelationDuplicate>,
    pub observation_duplicates: Vec<ObservationDuplicate>,
    pub statistics: DuplicateStatistics,
}

/// Scores the request's candidates against `graph` under the resolved options.
pub fn find_duplicates(
    graph: &KnowledgeGraph,
    request: &FindDuplicatesRequest,
) -> GraphResult<DuplicateReport> {
    let policy = request.options.resolve()?;
    let mut report = DuplicateReport::default();

    for candidate in &request.entities {
        for existing in &graph.entities {
            if let Some(found) =
                compare_entities(candidate, existing, &policy, DuplicateSource::Candidate)
            {
                report.entity_duplicates.push(found);
            }
        }
    }
    for candidate in &request.relations {
        for existing in &graph.relations {
            if let Some(found) =
                compare_relations(candidate, existing, &policy, DuplicateSource::Candidate)
            {
                report.relation_duplicates.push(found);
            }
        }
    }
    for input in &request.observations {
        let Some(entity) = graph.entity(&input.entity_name) else {
            continue;
        };
        for candidate in &input.contents {
            for existing in &entity.observations {
                if let Some(found) = compare_observations(&entity.name, candidate, existing, &policy)
                {
                    report.observation_duplicates.push(found);
                }
            }
        }
    }

    if request.check_within_existing {
        for (position, left) in graph.entities.iter().enumerate() {
            for right in &graph.entities[position + 1..] {
                if let Some(found) =
                    compare_entities(left, right, &policy, DuplicateSource::Existing)
                {
                    report.entity_duplicates.push(found);
                }
            }
        }
        for (position, left) in graph.relations.iter().enumerate() {
            for right in &graph.relations[position + 1..] {
                if let Some(found) =
                    compare_relations(left, right, &policy, DuplicateSource::Existing)
                {
                    report.relation_duplicates.push(found);
                }
            }
        }
    }

    report
        .entity_duplicates
        .sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
    report
        .relation_duplicates
        .sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
    report
        .observation_duplicates
        .sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));

    let candidates_checked = request.entities.len()
        + request.relations.len()
        + request
            .observations
            .iter()
            .map(|input| input.contents.len())
            .sum::<usize>();
    report.statistics = summarize(&report, candidates_checked);
    Ok(report)
}

/// `0.7 * name + 0.3 * type`, with the type term pinned to 1.0 when excluded.
pub fn compare_entities(
    candidate: &Entity,
    existing: &Entity,
    policy: &DuplicatePolicy,
    source: DuplicateSource,
) -> Option<EntityDuplicate> {
    let mode = policy.match_mode();
    let name_score = similarity(&candidate.name, &existing.name, mode);
    let type_score = if policy.include_entity_type {
        similarity(&candidate.entity_type, &existing.entity_type, mode)
    } else {
        1.0
    };
    let structural = candidate.name == existing.name
        && (!policy.include_entity_type || candidate.entity_type == existing.entity_type);
    let score = combined_score(
        structural,
        ENTITY_NAME_WEIGHT * name_score + ENTITY_TYPE_WEIGHT * type_score,
    );
    if !meets_threshold(score, policy.entity_threshold) {
        return None;
    }

    Some(EntityDuplicate {
        details: format!(
            "entity '{}' is {} similar to '{}' (name {}, type {})",
            candidate.name,
            percent(score),
            existing.name,
            percent(name_score),
            percent(type_score)
        ),
        match_type: classify_match(&candidate.name, &existing.name, policy),
        duplicate_type: duplicate_type(structural),
        candidate: candidate.clone(),
        existing: existing.clone(),
        similarity_score: score,
        source,
    })
}

/// `0.35 * from + 0.35 * to + 0.3 * relationType`, gated by the entity threshold.
pub fn compare_relations(
    candidate: &Relation,
    existing: &Relation,
    policy: &DuplicatePolicy,
    source: DuplicateSource,
) -> Option<RelationDuplicate> {
    let mode = policy.match_mode();
    let from_score = similarity(&candidate.from, &existing.from, mode);
    let to_score = similarity(&candidate.to, &existing.to, mode);
    let type_score = similarity(&candidate.relation_type, &existing.relation_type, mode);
    let structural = candidate == existing;
    let score = combined_score(
        structural,
        RELATION_FROM_WEIGHT * from_score
            + RELATION_TO_WEIGHT * to_score
            + RELATION_TYPE_WEIGHT * type_score,
    );
    if !meets_threshold(score, policy.entity_threshold) {
        return None;
    }

    Some(RelationDuplicate {
        details: format!(
            "relation '{}' -[{}]-> '{}' is {} similar to '{}' -[{}]-> '{}'",
            candidate.from,
            candidate.relation_type,
            candidate.to,
            percent(score),
            existing.from,
            existing.relation_type,
            existing.to
        ),
        match_type: classify_match(
            &relation_signature(candidate),
            &relation_signature(existing),
            policy,
        ),
        duplicate_type: duplicate_type(structural),
        candidate: candidate.clone(),
        existing: existing.clone(),
        similarity_score: score,
        source,
    })
}

/// Scores one candidate observation against one stored observation of `entity_name`.
pub fn compare_observations(
    entity_name: &str,
    candidate: &str,
    existing: &str,
    policy: &DuplicatePolicy,
) -> Option<ObservationDuplicate> {
    let structural = candidate == existing;
    let score = combined_score(
        structural,
        similarity(candidate, existing, policy.match_mode()),
    );
    if !meets_threshold(score, policy.observation_threshold) {
        return None;
    }

    Some(ObservationDuplicate {
        entity_name: entity_name.to_string(),
        candidate: candidate.to_string(),
        existing: existing.to_string(),
        similarity_score: score,
        match_type: classify_match(candidate, existing, policy),
        duplicate_type: duplicate_type(structural),
        details: format!(
            "observation on '{entity_name}' is {} similar to an existing observation",
            percent(score)
        ),
    })
}

fn validate_threshold(field: &'static str, value: f64) -> GraphResult<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GraphError::InvalidThreshold { field, value })
    }
}

fn combined_score(structural: bool, weighted: f64) -> f64 {
    if structural {
        1.0
    } else {
        weighted.clamp(0.0, 1.0)
    }
}

fn meets_threshold(score: f64, threshold: f64) -> bool {
    score + SCORE_TOLERANCE >= threshold
}

fn classify_match(candidate: &str, existing: &str, policy: &DuplicatePolicy) -> MatchType {
    if candidate == existing {
        MatchType::Exact
    } else if policy.semantic_matching
        && edit_similarity(candidate, existing) > SEMANTIC_MATCH_EDIT_FLOOR
    {
        MatchType::Semantic
    } else {
        MatchType::Fuzzy
    }
}

fn duplicate_type(structural: bool) -> DuplicateType {
    if structural {
        DuplicateType::Structural
    } else {
        DuplicateType::Semantic
    }
}

fn relation_signature(relation: &Relation) -> String {
    format!("{} {} {}", relation.from, relation.relation_type, relation.to)
}

fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

fn summarize(report: &DuplicateReport, candidates_checked: usize) -> DuplicateStatistics {
    let match_types = report
        .entity_duplicates
        .iter()
        .map(|found| found.match_type)
        .chain(report.relation_duplicates.iter().map(|found| found.match_type))
        .chain(
            report
                .observation_duplicates
                .iter()
                .map(|found| found.match_type),
        )
        .collect::<Vec<_>>();
    let count = |wanted: MatchType| {
        match_types
            .iter()
            .filter(|match_type| **match_type == wanted)
            .count()
    };
    let total_duplicates = match_types.len();
    DuplicateStatistics {
        total_duplicates,
        entity_duplicates: report.entity_duplicates.len(),
        relation_duplicates: report.relation_duplicates.len(),
        observation_duplicates: report.observation_duplicates.len(),
        exact_matches: count(MatchType::Exact),
        fuzzy_matches: count(MatchType::Fuzzy),
        semantic_matches: count(MatchType::Semantic),
        candidates_checked,
        has_duplicates: total_duplicates > 0,
    }
}
