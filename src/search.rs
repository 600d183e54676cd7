use tracing::{debug, info};

use crate::domain::{SearchConstraints, SequenceRecordId, TaxonInput, TaxonomyId};
use crate::entrez::{SequenceService, TaxonomyService};
use crate::error::KiraError;
use crate::taxonomy::immediate_parent;

/// Resolves an input to a taxonomy id. Ids are trusted as given; names go to
/// the taxonomy service, whose tie-break decides ambiguous names.
pub fn resolve_taxon<T>(taxonomy: &T, input: &TaxonInput) -> Result<Option<TaxonomyId>, KiraError>
where
    T: TaxonomyService + ?Sized,
{
    match input {
        TaxonInput::Id { id, .. } => Ok(Some(*id)),
        TaxonInput::Name(name) => taxonomy.resolve_name(name),
    }
}

pub fn build_query(id: TaxonomyId, constraints: &SearchConstraints) -> String {
    let mut query = format!("txid{id}[Organism:exp] AND {}[SLEN]", constraints.seq_range);
    if let Some(filter) = constraints
        .filter
        .as_deref()
        .map(str::trim)
        .filter(|filter| !filter.is_empty())
    {
        query.push_str(&format!(" AND ({filter})"));
    }
    query
}

/// Record ids for `id` under `constraints`, or `None` when the search
/// matched nothing. A non-zero count with no ids returned (a zero limit)
/// is `Some` of an empty list.
pub fn search_sequences<S>(
    sequences: &S,
    id: TaxonomyId,
    constraints: &SearchConstraints,
) -> Result<Option<Vec<SequenceRecordId>>, KiraError>
where
    S: SequenceService + ?Sized,
{
    let query = build_query(id, constraints);
    let hits = sequences.search(&query, constraints.max_records)?;
    debug!(%id, count = hits.count, returned = hits.ids.len(), "sequence search");
    if hits.count == 0 {
        return Ok(None);
    }
    Ok(Some(hits.ids))
}

/// How a relative is looked up when a taxon has no records of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackPlan {
    /// Walk one rank up the lineage of a resolved id.
    Ancestry(TaxonomyId),
    /// No id, but the name looks like a binomial: try its genus.
    Genus(String),
    None,
}

impl FallbackPlan {
    pub fn for_input(input: &TaxonInput, resolved: Option<TaxonomyId>) -> Self {
        if let Some(id) = resolved {
            return FallbackPlan::Ancestry(id);
        }
        match input.as_name() {
            Some(name) if name.split_whitespace().count() > 1 => {
                let genus = name.split_whitespace().next().unwrap_or_default();
                FallbackPlan::Genus(genus.to_string())
            }
            _ => FallbackPlan::None,
        }
    }
}

pub fn find_relative<T>(taxonomy: &T, plan: &FallbackPlan) -> Result<Option<TaxonomyId>, KiraError>
where
    T: TaxonomyService + ?Sized,
{
    match plan {
        FallbackPlan::Ancestry(id) => {
            let lineage = taxonomy.lineage(*id)?;
            let Some(parent) = immediate_parent(&lineage) else {
                debug!(%id, "no parent rank in lineage");
                return Ok(None);
            };
            info!(%id, parent = %parent.name, rank = %parent.rank, "falling back to parent taxon");
            resolve_taxon(taxonomy, &TaxonInput::name(parent.name.clone()))
        }
        FallbackPlan::Genus(genus) => {
            info!(genus = %genus, "falling back to genus");
            resolve_taxon(taxonomy, &TaxonInput::name(genus.clone()))
        }
        FallbackPlan::None => Ok(None),
    }
}
