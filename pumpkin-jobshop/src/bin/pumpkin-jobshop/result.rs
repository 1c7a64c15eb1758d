use pumpkin_jobshop::JobShopError;
use pumpkin_jobshop::ParseError;
use thiserror::Error;

pub(crate) type CliResult<T> = Result<T, CliError>;

#[derive(Error, Debug)]
pub(crate) enum CliError {
    #[error("IO error, more details: {0}")]
    IOError(#[from] std::io::Error),
    #[error("The instance file is invalid, more details: {0}")]
    InvalidInstance(#[from] ParseError),
    #[error("Failed to schedule the instance, more details: {0}")]
    JobShop(#[from] JobShopError),
    #[error("The time out {0} is not a valid number of seconds.")]
    InvalidTimeOut(f64),
}
