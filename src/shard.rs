//! The sky-region sharder (C7): partitions images into disjoint sky-region
//! groups, drives each group's sequential per-epoch association, and merges
//! the resulting identity spaces without collision.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use log::{debug, info, trace};
use rayon::prelude::*;

use crate::aggregate::aggregate;
use crate::associate::{associate_advanced, associate_basic};
use crate::config::{AssociationMethod, Config};
use crate::error::AssocError;
use crate::finalise::{finalise, SourceRecord};
use crate::frame::{deduplicate, ReferenceFrame, Row, RunningFrame};
use crate::loader::{ImageDescriptor, MeasurementLoader};

/// The result of associating one sky-region group end to end.
pub struct GroupResult {
    pub running: RunningFrame,
    pub reference: ReferenceFrame,
    pub sources: Vec<SourceRecord>,
}

/// Associate all epochs of a single sky-region group sequentially
/// (`spec.md` §4.7, §5).
pub fn run_group(
    images: &[ImageDescriptor],
    loader: &dyn MeasurementLoader,
    config: &Config,
) -> Result<GroupResult, AssocError> {
    let mut by_epoch: BTreeMap<i64, Vec<&ImageDescriptor>> = BTreeMap::new();
    for image in images {
        by_epoch.entry(image.epoch).or_default().push(image);
    }

    let mut epochs = by_epoch.into_iter();
    let (_first_epoch, first_images) = match epochs.next() {
        Some(pair) => pair,
        None => {
            return Ok(GroupResult {
                running: RunningFrame::new(),
                reference: ReferenceFrame::new(),
                sources: Vec::new(),
            })
        }
    };

    let initial_epoch_images: HashSet<String> =
        first_images.iter().map(|img| img.name.clone()).collect();

    debug!(
        "Seeding initial reference frame from {} image(s)",
        first_images.len()
    );
    let mut running = RunningFrame::new();
    let mut first_rows = load_batch(&first_images, loader, config)?;
    let mut reference = ReferenceFrame::from_initial_batch(&first_rows);
    for (row, reference_row) in first_rows.iter_mut().zip(&reference.rows) {
        row.source = reference_row.source;
    }
    running.rows.extend(first_rows);
    trace!("Initial reference frame has {} identities", reference.rows.len());

    for (epoch, epoch_images) in epochs {
        let new_rows = load_batch(&epoch_images, loader, config)?;
        trace!("Epoch {epoch}: associating {} new row(s)", new_rows.len());
        let beam_bmaj_max = epoch_images
            .iter()
            .map(|img| img.beam_bmaj_deg)
            .fold(0.0_f64, f64::max);

        match config.association_method {
            AssociationMethod::Basic => {
                associate_basic(&mut reference, &mut running, new_rows, config.association_radius)
            }
            AssociationMethod::Advanced | AssociationMethod::Deruiter => associate_advanced(
                &mut reference,
                &mut running,
                new_rows,
                config,
                beam_bmaj_max,
            ),
        }

        aggregate(&running, &mut reference);
    }

    let sources = finalise(&running, &reference, &initial_epoch_images)
        .map_err(AssocError::from)?;
    info!(
        "Finalised {} source(s) from {} running row(s)",
        sources.len(),
        running.rows.len()
    );

    Ok(GroupResult {
        running,
        reference,
        sources,
    })
}

fn load_batch(
    images: &[&ImageDescriptor],
    loader: &dyn MeasurementLoader,
    config: &Config,
) -> Result<Vec<Row>, AssocError> {
    let mut rows = Vec::new();
    for image in images {
        let measurements = loader
            .load(&image.measurements_path)
            .map_err(AssocError::Loader)?;
        for m in measurements {
            rows.push(Row::from_measurement(m, config).map_err(AssocError::from)?);
        }
    }
    Ok(deduplicate(rows, config.duplicate_limit))
}

/// Associate every sky-region group and merge the per-group outputs into one
/// globally-unique identity namespace (`spec.md` §4.7).
///
/// Groups run in parallel on a pool sized to `num_cpus - 1`, per `spec.md`
/// §5's recommended scheduling model; no shared mutable state is touched
/// between workers.
pub fn run_sharded(
    images: &[ImageDescriptor],
    loader: &(dyn MeasurementLoader + Sync),
    config: &Config,
) -> Result<(RunningFrame, Vec<SourceRecord>), AssocError> {
    let groups: Vec<(i64, Vec<ImageDescriptor>)> = images
        .iter()
        .cloned()
        .into_group_map_by(|img| img.skyreg_group)
        .into_iter()
        .sorted_by_key(|(group, _)| *group)
        .collect();

    let n_threads = std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(1)
        .min(groups.len().max(1));
    info!(
        "Associating {} sky-region group(s) on {n_threads} thread(s)",
        groups.len()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|e| AssocError::InvariantViolation(format!("failed to build thread pool: {e}")))?;

    let results: Vec<Result<GroupResult, AssocError>> = pool.install(|| {
        groups
            .par_iter()
            .map(|(group, group_images)| {
                run_group(group_images, loader, config).map_err(|source| AssocError::Shard {
                    group: *group,
                    source: Box::new(source),
                })
            })
            .collect()
    });

    let mut merged_running = RunningFrame::new();
    let mut merged_sources = Vec::new();
    let mut offset: i64 = 0;

    for group_result in results {
        let mut group_result = group_result?;

        let group_max = group_result.running.max_source();
        if offset > 0 {
            for row in group_result.running.rows.iter_mut() {
                row.source += offset;
                row.related = row.related.iter().map(|r| r + offset).collect();
            }
            for source in group_result.sources.iter_mut() {
                source.source += offset;
                source.related = source.related.iter().map(|r| r + offset).collect();
            }
        }

        merged_running.rows.extend(group_result.running.rows);
        merged_sources.extend(group_result.sources);
        offset += group_max;
    }

    check_dense_identities(&merged_sources)?;

    Ok((merged_running, merged_sources))
}

/// `spec.md` invariant 1: identities are positive integers, dense from 1
/// upward, after the offset merge.
fn check_dense_identities(sources: &[SourceRecord]) -> Result<(), AssocError> {
    let mut ids: Vec<i64> = sources.iter().map(|s| s.source).collect();
    ids.sort_unstable();
    ids.dedup();
    for (i, id) in ids.iter().enumerate() {
        if *id != (i + 1) as i64 {
            return Err(AssocError::InvariantViolation(format!(
                "identity namespace is not dense after merge: expected {}, found {}",
                i + 1,
                id
            )));
        }
    }
    Ok(())
}
