//! Orders jobs by a weighted-shortest-processing-time rating, which decides the decomposition
//! group each job ends up in.

use thiserror::Error;

use crate::instance::Job;

/// A job whose operations consume no resource at all, which means it cannot be rated.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("job {job} has a total resource consumption of zero")]
pub struct DegenerateJob {
    /// The (0-based) position of the job in the instance.
    pub job: usize,
}

/// The jobs of an instance in descending order of priority, together with their original ids.
#[derive(Debug, Clone)]
pub struct PrioritisedJobs<'a> {
    jobs: Vec<&'a Job>,
    original_ids: Vec<usize>,
}

impl<'a> PrioritisedJobs<'a> {
    /// The jobs in priority order.
    pub fn jobs(&self) -> &[&'a Job] {
        &self.jobs
    }

    /// `original_ids()[position]` is the id of the job at `position` in [`Self::jobs`].
    pub fn original_ids(&self) -> &[usize] {
        &self.original_ids
    }
}

/// The rating of a job: its weight per unit of consumed resource.
pub fn rating(job: &Job) -> Option<f64> {
    let total_resource = job.total_resource();
    if total_resource == 0 {
        return None;
    }

    Some(job.weight / total_resource as f64)
}

/// Sort the jobs by descending [`rating`]. Jobs with the same rating keep their relative input
/// order, so the result is fully determined by the input.
pub fn prioritise(jobs: &[Job]) -> Result<PrioritisedJobs<'_>, DegenerateJob> {
    let ratings = jobs
        .iter()
        .enumerate()
        .map(|(job_id, job)| rating(job).ok_or(DegenerateJob { job: job_id }))
        .collect::<Result<Vec<_>, _>>()?;

    let mut original_ids = (0..jobs.len()).collect::<Vec<_>>();
    // `sort_by` is stable, which provides the tie-breaking on input order.
    original_ids.sort_by(|&lhs, &rhs| ratings[rhs].total_cmp(&ratings[lhs]));

    Ok(PrioritisedJobs {
        jobs: original_ids.iter().map(|&job_id| &jobs[job_id]).collect(),
        original_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Operation;

    fn job(weight: f64, operations: &[(u32, u32)]) -> Job {
        Job::new(
            weight,
            operations
                .iter()
                .map(|&(slice_count, duration)| Operation::new(slice_count, duration, vec![]))
                .collect(),
        )
    }

    #[test]
    fn jobs_are_ordered_by_descending_rating() {
        let jobs = vec![
            job(1.0, &[(1, 10)]),
            job(2.0, &[(1, 2)]),
            job(3.0, &[(2, 3)]),
        ];

        let prioritised = prioritise(&jobs).expect("no degenerate jobs");

        assert_eq!(prioritised.original_ids(), &[1, 2, 0]);
        assert_eq!(prioritised.jobs()[0], &jobs[1]);
        assert_eq!(prioritised.jobs()[2], &jobs[0]);
    }

    #[test]
    fn ties_keep_the_input_order() {
        let jobs = vec![
            job(1.0, &[(1, 4)]),
            job(2.0, &[(2, 2), (1, 4)]),
            job(1.0, &[(2, 2)]),
            job(5.0, &[(1, 1)]),
        ];

        let prioritised = prioritise(&jobs).expect("no degenerate jobs");

        assert_eq!(prioritised.original_ids(), &[3, 0, 1, 2]);
    }

    #[test]
    fn prioritising_is_deterministic() {
        let jobs = (0..20)
            .map(|index| job(f64::from(index % 3), &[(1 + index % 2, 1 + index % 4)]))
            .collect::<Vec<_>>();

        let first = prioritise(&jobs).expect("no degenerate jobs");
        let second = prioritise(&jobs).expect("no degenerate jobs");

        assert_eq!(first.original_ids(), second.original_ids());
    }

    #[test]
    fn jobs_without_resource_consumption_are_degenerate() {
        let jobs = vec![job(1.0, &[(1, 1)]), job(1.0, &[(0, 0)])];

        assert_eq!(prioritise(&jobs).unwrap_err(), DegenerateJob { job: 1 });
    }

    #[test]
    fn jobs_without_operations_are_degenerate() {
        let jobs = vec![job(1.0, &[])];

        assert_eq!(prioritise(&jobs).unwrap_err(), DegenerateJob { job: 0 });
    }

    #[test]
    fn operations_without_duration_do_not_make_a_job_degenerate() {
        let jobs = vec![job(1.0, &[(3, 0), (1, 2)])];

        assert_eq!(rating(&jobs[0]), Some(0.5));
        assert!(prioritise(&jobs).is_ok());
    }
}
