use std::time::{Duration, Instant};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{
    BatchResult, SearchConstraints, SequenceRecordId, TaxonEntry, TaxonInput, TaxonResult,
    TaxonomyId,
};
use crate::entrez::{SequenceService, TaxonomyService};
use crate::error::KiraError;
use crate::search::{FallbackPlan, find_relative, resolve_taxon, search_sequences};
use crate::summary::fetch_summaries;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub get_related: bool,
    pub verbose: bool,
    pub workers: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            get_related: false,
            verbose: false,
            workers: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub label: String,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Sync {
    fn event(&self, event: ProgressEvent);
}

/// One retrieval run: the remote collaborators plus the constraints every
/// taxon of the batch is searched under.
pub struct Pipeline<S: SequenceService, T: TaxonomyService> {
    sequences: S,
    taxonomy: T,
    constraints: SearchConstraints,
}

impl<S: SequenceService, T: TaxonomyService> Pipeline<S, T> {
    pub fn new(sequences: S, taxonomy: T, constraints: SearchConstraints) -> Self {
        Self {
            sequences,
            taxonomy,
            constraints,
        }
    }

    /// Runs every input. A single input yields its result directly and its
    /// error propagates; with several inputs each failure is logged and
    /// recorded against its label while the rest of the batch proceeds.
    pub fn run(
        &self,
        inputs: &[TaxonInput],
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<BatchResult, KiraError> {
        match inputs {
            [] => Err(KiraError::InvalidTaxonInput(
                "no taxon names or ids supplied".to_string(),
            )),
            [input] => {
                let result = self.run_taxon(input, options, sink)?;
                Ok(BatchResult::Single {
                    label: input.label().to_string(),
                    result,
                })
            }
            _ => {
                let outcomes = if options.workers > 1 {
                    let pool = ThreadPoolBuilder::new()
                        .num_threads(options.workers)
                        .build()
                        .map_err(|err| KiraError::WorkerPool(err.to_string()))?;
                    pool.install(|| {
                        inputs
                            .par_iter()
                            .map(|input| self.run_taxon(input, options, sink))
                            .collect::<Vec<_>>()
                    })
                } else {
                    inputs
                        .iter()
                        .map(|input| self.run_taxon(input, options, sink))
                        .collect::<Vec<_>>()
                };

                let entries = inputs
                    .iter()
                    .zip(outcomes)
                    .map(|(input, outcome)| {
                        if let Err(err) = &outcome {
                            warn!(taxon = input.label(), error = %err, "taxon failed; continuing batch");
                        }
                        TaxonEntry {
                            label: input.label().to_string(),
                            outcome,
                        }
                    })
                    .collect();
                Ok(BatchResult::Multiple(entries))
            }
        }
    }

    /// Resolve, search (with optional fallback) and summarize one taxon.
    pub fn run_taxon(
        &self,
        input: &TaxonInput,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<TaxonResult, KiraError> {
        let started = Instant::now();
        let label = input.label();
        self.narrate(sink, options, label, "phase=Resolve; looking up taxonomy id", None);

        let resolved = resolve_taxon(&self.taxonomy, input)?;
        let target = match resolved {
            Some(id) => id,
            None => {
                let relative = if options.get_related {
                    let plan = FallbackPlan::for_input(input, None);
                    find_relative(&self.taxonomy, &plan)?
                } else {
                    None
                };
                let Some(relative) = relative else {
                    return Err(KiraError::UnresolvedTaxon(label.to_string()));
                };
                self.narrate(
                    sink,
                    options,
                    label,
                    &format!("phase=Fallback; name unresolved, using relative {relative}"),
                    None,
                );
                relative
            }
        };

        info!(taxon = label, id = %target, "searching sequences");
        self.narrate(
            sink,
            options,
            label,
            &format!("phase=Search; taxonomy id {target}"),
            None,
        );
        let mut ids = search_sequences(&self.sequences, target, &self.constraints)?;

        if ids.is_none() && options.get_related && resolved.is_some() {
            ids = self.search_relative(input, resolved, options, sink)?;
        }

        let result = match ids {
            Some(ids) => {
                self.narrate(
                    sink,
                    options,
                    label,
                    &format!("phase=Summary; fetching {} records", ids.len()),
                    None,
                );
                TaxonResult::new(fetch_summaries(
                    &self.sequences,
                    &ids,
                    self.constraints.keep_hypothetical,
                )?)
            }
            None => {
                self.narrate(sink, options, label, "phase=Search; no records found", None);
                TaxonResult::empty()
            }
        };

        self.narrate(
            sink,
            options,
            label,
            &format!("phase=Done; {} records", result.len()),
            Some(started.elapsed()),
        );
        Ok(result)
    }

    fn search_relative(
        &self,
        input: &TaxonInput,
        resolved: Option<TaxonomyId>,
        options: &RunOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Option<Vec<SequenceRecordId>>, KiraError> {
        let plan = FallbackPlan::for_input(input, resolved);
        let Some(relative) = find_relative(&self.taxonomy, &plan)? else {
            self.narrate(
                sink,
                options,
                input.label(),
                "phase=Fallback; no related taxon found",
                None,
            );
            return Ok(None);
        };
        self.narrate(
            sink,
            options,
            input.label(),
            &format!("phase=Fallback; no records, retrying with related taxon {relative}"),
            None,
        );
        search_sequences(&self.sequences, relative, &self.constraints)
    }

    fn narrate(
        &self,
        sink: &dyn ProgressSink,
        options: &RunOptions,
        label: &str,
        message: &str,
        elapsed: Option<Duration>,
    ) {
        if !options.verbose {
            return;
        }
        sink.event(ProgressEvent {
            label: label.to_string(),
            message: message.to_string(),
            elapsed,
        });
    }
}
