//! Resource Allocation stage
//!
//! ## Selection policy
//!
//! Candidates are the catalog's available ambulances and hospitals, ranked
//! nearest-first by the proximity ranker (bounded by `max_distance_km` when
//! configured) and truncated to `candidate_limit`. The ranked lists go into
//! the prompt; the response then steers the choice:
//!
//! - **Ambulance count**: the "N ambulances" phrase in the response, or 2 at
//!   or above `critical_severity` and 1 below it. At least one ambulance is
//!   sent whenever any is available, and never more than are available.
//! - **Which ambulances**: ids named in a structured response first, then ids
//!   mentioned in the text in mention order, then the nearest remaining.
//! - **Hospital**: a structured id, else the earliest id or name mentioned,
//!   else the nearest hospital whose emergency department can accept, else
//!   the nearest hospital, else none.
//!
//! With no available ambulances the selection is empty; that is a valid
//! recommendation, not an error.

use std::sync::Arc;

use async_trait::async_trait;

use super::{reason, AdvisoryStage, StageContext, StageError, StageOutput, ALLOCATION_PERSONA};
use crate::catalog::ResourceCatalog;
use crate::config::AllocationConfig;
use crate::geo::{self, MapsProvider};
use crate::llm::LlmBackend;
use crate::parsing::allocation::find_mention;
use crate::parsing::{AllocationFindings, HeuristicAllocationParser, JsonFirst, ResponseParser};
use crate::types::{Incident, RankedResource, RecommendedResources, ResourceAllocation, StageKind};

type AllocationParser = Box<dyn ResponseParser<Output = AllocationFindings>>;

pub struct ResourceAllocationStage {
    backend: Arc<dyn LlmBackend>,
    catalog: Arc<ResourceCatalog>,
    maps: Arc<dyn MapsProvider>,
    config: AllocationConfig,
    search_radius_m: u32,
    parser: AllocationParser,
}

impl ResourceAllocationStage {
    pub fn new(
        backend: Arc<dyn LlmBackend>,
        catalog: Arc<ResourceCatalog>,
        maps: Arc<dyn MapsProvider>,
        config: AllocationConfig,
    ) -> Self {
        Self {
            backend,
            catalog,
            maps,
            config,
            search_radius_m: crate::config::defaults::MAPS_SEARCH_RADIUS_M,
            parser: Box::new(JsonFirst::new(HeuristicAllocationParser)),
        }
    }

    #[must_use]
    pub fn with_search_radius(mut self, radius_m: u32) -> Self {
        self.search_radius_m = radius_m;
        self
    }

    #[must_use]
    pub fn with_parser(mut self, parser: AllocationParser) -> Self {
        self.parser = parser;
        self
    }

    fn default_ambulance_count(&self, severity: i32) -> usize {
        if severity >= self.config.critical_severity {
            2
        } else {
            1
        }
    }

    pub fn build_prompt(
        incident: &Incident,
        severity: i32,
        address: Option<&str>,
        ambulances: &[RankedResource],
        hospitals: &[RankedResource],
        mapped_hospital: Option<&str>,
    ) -> String {
        let address = incident
            .location
            .description
            .as_deref()
            .or(address)
            .map(|place| format!("Address: {place}\n"))
            .unwrap_or_default();
        let ambulance_lines = listing(ambulances.iter().map(ToString::to_string));
        let hospital_lines = listing(hospitals.iter().map(|h| {
            let beds = h
                .resource
                .capacity()
                .map_or_else(|| "unknown".to_string(), |c| c.available_beds.to_string());
            format!("{h}, ED beds available: {beds}")
        }));
        let mapped = mapped_hospital
            .map(|name| format!("Nearest hospital found on the map: {name}\n"))
            .unwrap_or_default();

        format!(
            "{ALLOCATION_PERSONA}

Optimize resource allocation for this emergency:
Severity Level: {severity}
Location: {lat:.5}, {lng:.5}
{address}Chief Complaint: {complaint}

Available Ambulances (nearest first):
{ambulance_lines}Available Hospitals (nearest first):
{hospital_lines}{mapped}
Determine:
1. Number and type of ambulances needed (e.g. \"dispatch 2 ambulances\") and which units
2. Best receiving hospital, by id
3. Additional resource requirements, as a list under \"Additional Resources:\"
",
            lat = incident.location.latitude,
            lng = incident.location.longitude,
            complaint = incident.chief_complaint,
        )
    }
}

/// `- item` lines, or a single `- none`.
fn listing(items: impl Iterator<Item = String>) -> String {
    let lines: String = items.map(|item| format!("- {item}\n")).collect();
    if lines.is_empty() {
        "- none\n".to_string()
    } else {
        lines
    }
}

/// Choose ambulances: explicit ids, then text mentions, then nearest.
fn select_ambulances(
    ranked: &[RankedResource],
    findings: &AllocationFindings,
    response: &str,
    count: usize,
) -> Vec<RankedResource> {
    let mut order: Vec<usize> = Vec::with_capacity(ranked.len());

    for id in &findings.ambulance_ids {
        if let Some(i) = ranked.iter().position(|r| r.resource.id.eq_ignore_ascii_case(id)) {
            if !order.contains(&i) {
                order.push(i);
            }
        }
    }

    let mut mentioned: Vec<(usize, usize)> = ranked
        .iter()
        .enumerate()
        .filter(|(i, _)| !order.contains(i))
        .filter_map(|(i, r)| find_mention(response, &r.resource.id).map(|pos| (pos, i)))
        .collect();
    mentioned.sort_unstable();
    order.extend(mentioned.into_iter().map(|(_, i)| i));

    for i in 0..ranked.len() {
        if !order.contains(&i) {
            order.push(i);
        }
    }

    order.into_iter().take(count).map(|i| ranked[i].clone()).collect()
}

/// Choose a hospital: explicit id, then earliest mention, then nearest that can accept.
fn select_hospital(
    ranked: &[RankedResource],
    findings: &AllocationFindings,
    response: &str,
) -> Option<RankedResource> {
    if let Some(id) = &findings.hospital_id {
        if let Some(h) = ranked.iter().find(|r| r.resource.id.eq_ignore_ascii_case(id)) {
            return Some(h.clone());
        }
    }

    let earliest_mention = ranked
        .iter()
        .filter_map(|r| {
            let by_id = find_mention(response, &r.resource.id);
            let by_name = r.resource.name.as_deref().and_then(|n| find_mention(response, n));
            by_id.into_iter().chain(by_name).min().map(|pos| (pos, r))
        })
        .min_by_key(|(pos, _)| *pos);
    if let Some((_, h)) = earliest_mention {
        return Some(h.clone());
    }

    ranked
        .iter()
        .find(|r| r.resource.capacity().is_some_and(|c| c.can_accept()))
        .or_else(|| ranked.first())
        .cloned()
}

#[async_trait]
impl AdvisoryStage for ResourceAllocationStage {
    fn kind(&self) -> StageKind {
        StageKind::ResourceAllocation
    }

    async fn process(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let incident = ctx.incident;
        let severity = ctx.require_severity()?.severity_level;

        // One snapshot for both queries so a concurrent reload cannot mix catalogs
        let snapshot = self.catalog.snapshot();
        let max = self.config.max_distance_km;
        let mut ambulances = geo::rank(&incident.location, &snapshot.available_ambulances(), max)?;
        let mut hospitals = geo::rank(&incident.location, &snapshot.available_hospitals(), max)?;
        ambulances.truncate(self.config.candidate_limit);
        hospitals.truncate(self.config.candidate_limit);

        let address = if incident.location.description.is_none() {
            self.maps
                .reverse_geocode(&incident.location)
                .await?
                .map(|d| d.formatted_address)
        } else {
            None
        };

        let mapped_hospital = if hospitals.is_empty() {
            self.maps
                .nearest_hospital(&incident.location, self.search_radius_m)
                .await?
                .map(|p| match p.vicinity {
                    Some(v) => format!("{} ({v})", p.name),
                    None => p.name,
                })
        } else {
            None
        };

        let prompt = Self::build_prompt(
            incident,
            severity,
            address.as_deref(),
            &ambulances,
            &hospitals,
            mapped_hospital.as_deref(),
        );
        let response = reason(self.backend.as_ref(), self.kind(), &prompt).await?;
        let findings = self.parser.parse(&response);

        let requested = findings
            .ambulance_count
            .unwrap_or_else(|| self.default_ambulance_count(severity));
        let count = if ambulances.is_empty() {
            0
        } else {
            requested.clamp(1, ambulances.len())
        };

        let selected_ambulances = select_ambulances(&ambulances, &findings, &response, count);
        let hospital = select_hospital(&hospitals, &findings, &response);

        let mut additional_resources = findings.additional_resources;
        if let Some(name) = mapped_hospital {
            additional_resources.push(format!("Nearest mapped hospital: {name}"));
        }

        tracing::debug!(
            incident_id = %incident.id,
            candidates_ambulances = ambulances.len(),
            candidates_hospitals = hospitals.len(),
            selected = selected_ambulances.len(),
            hospital = hospital.as_ref().map_or("none", |h| h.resource.id.as_str()),
            "Allocation selected"
        );

        Ok(StageOutput::Allocation(ResourceAllocation {
            recommended_resources: RecommendedResources {
                ambulances: selected_ambulances,
                hospital,
                additional_resources,
            },
            incident_address: address,
            raw_allocation_plan: response,
        }))
    }
}
