//! Schedules: a start time and a set of slices for every operation of an instance.
//!
//! A schedule is written as one line per operation, for every job in input order and every
//! operation of the job in order: the start time followed by the (1-indexed) slices.

use std::io::BufRead;
use std::io::Write;

use itertools::Itertools;
use thiserror::Error;

use crate::instance::parse_token;
use crate::instance::Instance;
use crate::instance::LineReader;
use crate::instance::ParseError;

/// Where and when an operation runs. Slices are 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledOperation {
    pub start: i32,
    pub slices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    jobs: Vec<Vec<ScheduledOperation>>,
}

impl Schedule {
    /// `jobs[j][o]` is the scheduled operation `o` of job `j`.
    pub fn new(jobs: Vec<Vec<ScheduledOperation>>) -> Self {
        Schedule { jobs }
    }

    pub fn jobs(&self) -> &[Vec<ScheduledOperation>] {
        &self.jobs
    }

    pub fn operation(&self, job: usize, operation: usize) -> &ScheduledOperation {
        &self.jobs[job][operation]
    }

    /// Write the schedule in the output format.
    pub fn write(&self, mut writer: impl Write) -> std::io::Result<()> {
        for operation in self.jobs.iter().flatten() {
            let slices = operation.slices.iter().map(|slice| slice + 1).join(" ");
            if slices.is_empty() {
                writeln!(writer, "{}", operation.start)?;
            } else {
                writeln!(writer, "{} {slices}", operation.start)?;
            }
        }

        writer.flush()
    }

    /// Read a schedule for `instance` from the output format.
    ///
    /// Only the shape of the schedule is checked: there must be exactly one line per operation
    /// of the instance. Use [`Schedule::check`] to validate its contents.
    pub fn parse(reader: impl BufRead, instance: &Instance) -> Result<Schedule, ParseError> {
        let mut lines = LineReader::new(reader);

        let jobs = instance
            .jobs()
            .iter()
            .map(|job| {
                job.operations
                    .iter()
                    .map(|_| {
                        let (line, tokens) = lines.next_line("scheduled operation")?;
                        let start = parse_token::<i32>(&tokens[0], line, "start time")?;
                        let slices = tokens[1..]
                            .iter()
                            .map(|token| match parse_token::<usize>(token, line, "slice")? {
                                0 => Err(ParseError::InvalidToken {
                                    line,
                                    token: token.clone(),
                                    expected: "slice",
                                }),
                                slice => Ok(slice - 1),
                            })
                            .collect::<Result<Vec<_>, _>>()?;

                        Ok::<_, ParseError>(ScheduledOperation { start, slices })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        lines.expect_end()?;

        Ok(Schedule { jobs })
    }

    /// Verify that the schedule is a valid solution of `instance`: every operation runs on
    /// exactly its required number of distinct slices at a non-negative time, after all of its
    /// dependencies have ended, and no two operations use the same slice at the same time.
    pub fn check(&self, instance: &Instance) -> Result<(), ScheduleViolation> {
        self.check_shape(instance)?;

        let mut slice_usage: Vec<Vec<(i64, i64, usize, usize)>> =
            vec![vec![]; instance.num_slices()];

        for (job_id, (job, scheduled)) in instance.jobs().iter().zip(&self.jobs).enumerate() {
            for (operation_id, (operation, scheduled_operation)) in
                job.operations.iter().zip(scheduled).enumerate()
            {
                if scheduled_operation.slices.len() != operation.slice_count as usize {
                    return Err(ScheduleViolation::SliceCountMismatch {
                        job: job_id,
                        operation: operation_id,
                        expected: operation.slice_count as usize,
                        actual: scheduled_operation.slices.len(),
                    });
                }

                if scheduled_operation.start < 0 {
                    return Err(ScheduleViolation::NegativeStart {
                        job: job_id,
                        operation: operation_id,
                        start: scheduled_operation.start,
                    });
                }

                let start = i64::from(scheduled_operation.start);
                for &dependency in &operation.dependencies {
                    let dependency_end = i64::from(scheduled[dependency].start)
                        + i64::from(job.operations[dependency].duration);
                    if start < dependency_end {
                        return Err(ScheduleViolation::PrecedenceViolated {
                            job: job_id,
                            operation: operation_id,
                            dependency,
                        });
                    }
                }

                let end = start + i64::from(operation.duration);
                for (index, &slice) in scheduled_operation.slices.iter().enumerate() {
                    if slice >= instance.num_slices() {
                        return Err(ScheduleViolation::SliceOutOfRange {
                            job: job_id,
                            operation: operation_id,
                            slice,
                        });
                    }
                    if scheduled_operation.slices[..index].contains(&slice) {
                        return Err(ScheduleViolation::DuplicateSlice {
                            job: job_id,
                            operation: operation_id,
                            slice,
                        });
                    }

                    if end > start {
                        slice_usage[slice].push((start, end, job_id, operation_id));
                    }
                }
            }
        }

        for (slice, usage) in slice_usage.iter_mut().enumerate() {
            usage.sort_unstable();
            // If any two intervals on a slice overlap, two consecutive ones (by start) do.
            if let Some((first, second)) = usage
                .iter()
                .tuple_windows()
                .find(|(first, second)| second.0 < first.1)
            {
                return Err(ScheduleViolation::Overlap {
                    slice,
                    first: (first.2, first.3),
                    second: (second.2, second.3),
                });
            }
        }

        Ok(())
    }

    fn check_shape(&self, instance: &Instance) -> Result<(), ScheduleViolation> {
        for (job_id, job) in instance.jobs().iter().enumerate() {
            let scheduled = self.jobs.get(job_id).map_or(0, Vec::len);
            if scheduled < job.operations.len() {
                return Err(ScheduleViolation::MissingOperation {
                    job: job_id,
                    operation: scheduled,
                });
            }
            if scheduled > job.operations.len() {
                return Err(ScheduleViolation::UnexpectedOperation {
                    job: job_id,
                    operation: job.operations.len(),
                });
            }
        }

        if self.jobs.len() > instance.jobs().len() {
            return Err(ScheduleViolation::UnexpectedOperation {
                job: instance.jobs().len(),
                operation: 0,
            });
        }

        Ok(())
    }
}

/// The first reason a schedule is not a solution of its instance. Jobs, operations and slices
/// are 0-based.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleViolation {
    #[error("operation {operation} of job {job} is not scheduled")]
    MissingOperation { job: usize, operation: usize },

    #[error("operation {operation} of job {job} is scheduled but does not exist")]
    UnexpectedOperation { job: usize, operation: usize },

    #[error("operation {operation} of job {job} uses {actual} slices instead of {expected}")]
    SliceCountMismatch {
        job: usize,
        operation: usize,
        expected: usize,
        actual: usize,
    },

    #[error("operation {operation} of job {job} uses slice {slice}, which does not exist")]
    SliceOutOfRange {
        job: usize,
        operation: usize,
        slice: usize,
    },

    #[error("operation {operation} of job {job} uses slice {slice} more than once")]
    DuplicateSlice {
        job: usize,
        operation: usize,
        slice: usize,
    },

    #[error("operation {operation} of job {job} starts at negative time {start}")]
    NegativeStart {
        job: usize,
        operation: usize,
        start: i32,
    },

    #[error("operation {operation} of job {job} starts before its dependency {dependency} ends")]
    PrecedenceViolated {
        job: usize,
        operation: usize,
        dependency: usize,
    },

    #[error("operations {first:?} and {second:?} (job, operation) overlap on slice {slice}")]
    Overlap {
        slice: usize,
        first: (usize, usize),
        second: (usize, usize),
    },
}

/// Collects the schedules of jobs as the groups they belong to get solved.
#[derive(Debug)]
pub(crate) struct ScheduleBuilder {
    jobs: Vec<Option<Vec<ScheduledOperation>>>,
}

impl ScheduleBuilder {
    pub(crate) fn new(num_jobs: usize) -> Self {
        ScheduleBuilder {
            jobs: vec![None; num_jobs],
        }
    }

    pub(crate) fn insert(&mut self, job: usize, operations: Vec<ScheduledOperation>) {
        debug_assert!(self.jobs[job].is_none(), "job {job} is scheduled twice");
        self.jobs[job] = Some(operations);
    }

    /// The schedule, if every job was inserted.
    pub(crate) fn finish(self) -> Result<Schedule, ScheduleViolation> {
        let jobs = self
            .jobs
            .into_iter()
            .enumerate()
            .map(|(job, operations)| {
                operations.ok_or(ScheduleViolation::MissingOperation { job, operation: 0 })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Schedule { jobs })
    }
}
