//! The scheduling instance: a number of interchangeable slices and a list of weighted jobs, each
//! of which is a chain of [`Operation`]s.
//!
//! Instances are read from a line-oriented text format:
//! ```text
//! S                  number of slices
//! N                  number of jobs
//! K                  number of operations of the first job
//! W                  weight of the first job
//! M D C d1 .. dC     slices, duration and (1-indexed) dependencies of each of the K operations
//! ...
//! ```
//! Blank lines are ignored.

use std::io::BufRead;
use std::str::FromStr;

use thiserror::Error;

/// An atomic unit of work of a [`Job`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    /// The number of slices the operation occupies for its whole duration.
    pub slice_count: u32,
    /// The processing time of the operation.
    pub duration: u32,
    /// The (0-based) indices of the operations of the same job which have to be completed before
    /// this operation can start. All of them precede this operation in the job.
    pub dependencies: Vec<usize>,
}

impl Operation {
    pub fn new(slice_count: u32, duration: u32, dependencies: Vec<usize>) -> Self {
        Operation {
            slice_count,
            duration,
            dependencies,
        }
    }

    /// The amount of resource this operation consumes, i.e. `slice_count * duration`.
    pub fn resource_consumption(&self) -> u64 {
        u64::from(self.slice_count) * u64::from(self.duration)
    }
}

/// A weighted chain of [`Operation`]s. The identity of a job is its position in the [`Instance`].
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub weight: f64,
    pub operations: Vec<Operation>,
}

impl Job {
    pub fn new(weight: f64, operations: Vec<Operation>) -> Self {
        Job { weight, operations }
    }

    /// The summed resource consumption of all operations of the job.
    pub fn total_resource(&self) -> u64 {
        self.operations
            .iter()
            .map(Operation::resource_consumption)
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    num_slices: usize,
    jobs: Vec<Job>,
}

impl Instance {
    /// Create a new instance.
    ///
    /// # Panics
    /// If an operation depends on an operation which does not precede it in its job.
    pub fn new(num_slices: usize, jobs: Vec<Job>) -> Self {
        for (job_id, job) in jobs.iter().enumerate() {
            for (operation_id, operation) in job.operations.iter().enumerate() {
                assert!(
                    operation
                        .dependencies
                        .iter()
                        .all(|&dependency| dependency < operation_id),
                    "operation {operation_id} of job {job_id} depends on an operation which does not precede it"
                );
            }
        }

        Instance { num_slices, jobs }
    }

    pub fn num_slices(&self) -> usize {
        self.num_slices
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn num_operations(&self) -> usize {
        self.jobs.iter().map(|job| job.operations.len()).sum()
    }

    /// Parse an instance from the line-oriented input format.
    pub fn parse(reader: impl BufRead) -> Result<Instance, ParseError> {
        let mut lines = LineReader::new(reader);

        let (line, [num_slices]) = lines.next_values::<u32, 1>("slice count")?;
        if num_slices == 0 {
            return Err(ParseError::NoSlices { line });
        }
        let (_, [num_jobs]) = lines.next_values::<usize, 1>("job count")?;

        let mut jobs = Vec::with_capacity(num_jobs);
        for _ in 0..num_jobs {
            jobs.push(parse_job(&mut lines)?);
        }

        lines.expect_end()?;

        Ok(Instance::new(num_slices as usize, jobs))
    }
}

fn parse_job<R: BufRead>(lines: &mut LineReader<R>) -> Result<Job, ParseError> {
    let (_, [num_operations]) = lines.next_values::<usize, 1>("operation count")?;
    let (line, [weight]) = lines.next_values::<f64, 1>("job weight")?;
    if !weight.is_finite() || weight < 0.0 {
        return Err(ParseError::InvalidWeight { line, weight });
    }

    let mut operations = Vec::with_capacity(num_operations);
    for operation_id in 0..num_operations {
        let (line, tokens) = lines.next_line("operation")?;
        if tokens.len() < 3 {
            return Err(ParseError::IncorrectNumberOfValues {
                line,
                expected: 3,
                actual: tokens.len(),
            });
        }

        let slice_count = parse_token::<u32>(&tokens[0], line, "slice count")?;
        let duration = parse_token::<u32>(&tokens[1], line, "duration")?;
        if i32::try_from(duration).is_err() {
            return Err(ParseError::IntegerOverflow {
                line,
                value: u64::from(duration),
            });
        }
        let num_dependencies = parse_token::<usize>(&tokens[2], line, "dependency count")?;
        if tokens.len() != 3 + num_dependencies {
            return Err(ParseError::IncorrectNumberOfValues {
                line,
                expected: 3 + num_dependencies,
                actual: tokens.len(),
            });
        }

        let dependencies = tokens[3..]
            .iter()
            .map(|token| {
                let dependency = parse_token::<usize>(token, line, "dependency")?;
                // Dependencies are 1-indexed in the input.
                if dependency == 0 || dependency > operation_id {
                    return Err(ParseError::InvalidDependency {
                        line,
                        operation: operation_id + 1,
                        dependency,
                    });
                }
                Ok(dependency - 1)
            })
            .collect::<Result<Vec<_>, _>>()?;

        operations.push(Operation::new(slice_count, duration, dependencies));
    }

    Ok(Job::new(weight, operations))
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of input on line {line}, expected {expected}")]
    UnexpectedEndOfInput { line: usize, expected: &'static str },

    #[error("invalid {expected} '{token}' on line {line}")]
    InvalidToken {
        line: usize,
        token: String,
        expected: &'static str,
    },

    #[error("expected {expected} values on line {line}, got {actual}")]
    IncorrectNumberOfValues {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("operation {operation} on line {line} depends on operation {dependency}, which does not precede it")]
    InvalidDependency {
        line: usize,
        operation: usize,
        dependency: usize,
    },

    #[error("invalid job weight {weight} on line {line}")]
    InvalidWeight { line: usize, weight: f64 },

    #[error("value {value} on line {line} does not fit in the supported time range")]
    IntegerOverflow { line: usize, value: u64 },

    #[error("the instance on line {line} has no slices")]
    NoSlices { line: usize },

    #[error("unexpected content on line {line} after the last job")]
    TrailingContent { line: usize },
}

/// Reads the non-blank lines of an input and splits them into whitespace-separated tokens, while
/// keeping track of the (1-based) line number for error reporting.
#[derive(Debug)]
pub(crate) struct LineReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> LineReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        LineReader {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    pub(crate) fn next_line(
        &mut self,
        expected: &'static str,
    ) -> Result<(usize, Vec<String>), ParseError> {
        for line in self.lines.by_ref() {
            self.line_number += 1;
            let line = line?;

            let tokens = line
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>();
            if !tokens.is_empty() {
                return Ok((self.line_number, tokens));
            }
        }

        Err(ParseError::UnexpectedEndOfInput {
            line: self.line_number + 1,
            expected,
        })
    }

    /// Read a line consisting of exactly `N` values.
    pub(crate) fn next_values<T: FromStr, const N: usize>(
        &mut self,
        expected: &'static str,
    ) -> Result<(usize, [T; N]), ParseError> {
        let (line, tokens) = self.next_line(expected)?;
        if tokens.len() != N {
            return Err(ParseError::IncorrectNumberOfValues {
                line,
                expected: N,
                actual: tokens.len(),
            });
        }

        let values = tokens
            .iter()
            .map(|token| parse_token::<T>(token, line, expected))
            .collect::<Result<Vec<_>, _>>()?;

        match values.try_into() {
            Ok(values) => Ok((line, values)),
            Err(_) => unreachable!("the number of tokens was checked"),
        }
    }

    /// Succeeds if there are only blank lines left.
    pub(crate) fn expect_end(&mut self) -> Result<(), ParseError> {
        match self.next_line("end of input") {
            Ok((line, _)) => Err(ParseError::TrailingContent { line }),
            Err(ParseError::UnexpectedEndOfInput { .. }) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

pub(crate) fn parse_token<T: FromStr>(
    token: &str,
    line: usize,
    expected: &'static str,
) -> Result<T, ParseError> {
    token.parse::<T>().map_err(|_| ParseError::InvalidToken {
        line,
        token: token.to_owned(),
        expected,
    })
}
