use thiserror::Error;

use crate::engine::EngineError;
use crate::engine::SolveStatus;
use crate::model::ModelError;
use crate::priority::DegenerateJob;
use crate::schedule::ScheduleViolation;

pub type JobShopResult<T> = Result<T, JobShopError>;

#[derive(Debug, Error)]
pub enum JobShopError {
    #[error(transparent)]
    DegenerateJob(#[from] DegenerateJob),

    #[error("failed to build the model of group {group}, more details: {source}")]
    Model { group: usize, source: ModelError },

    #[error("the engine failed on group {group}, more details: {source}")]
    Engine { group: usize, source: EngineError },

    #[error("group {group} with jobs {job_ids:?} ended with status {status} without a solution")]
    Scheduling {
        group: usize,
        job_ids: Vec<usize>,
        status: SolveStatus,
    },

    #[error("the schedule is invalid, more details: {0}")]
    InvalidSchedule(#[from] ScheduleViolation),
}
