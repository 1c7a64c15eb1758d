mod result;

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::num::NonZero;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::error;
use log::info;
use log::LevelFilter;
use pumpkin_jobshop::decompose;
use pumpkin_jobshop::decomposition::DEFAULT_GROUP_SIZE;
use pumpkin_jobshop::engine::OsSignal;
use pumpkin_jobshop::engine::PumpkinEngine;
use pumpkin_jobshop::engine::PumpkinEngineOptions;
use pumpkin_jobshop::model::ModelOptions;
use pumpkin_jobshop::DecompositionOptions;
use pumpkin_jobshop::Instance;
use pumpkin_jobshop::JobShopError;
use pumpkin_jobshop::Schedule;
use pumpkin_solver::optimisation::OptimisationStrategy;
use result::CliError;
use result::CliResult;
use tempfile::NamedTempFile;

#[derive(Debug, Parser)]
#[command(
    help_template = "\
{before-help}{name} {version}
Authors: {author}
About: {about}

{usage-heading}\n{tab}{usage}

{all-args}{after-help}
",
    author,
    version,
    about,
    arg_required_else_help = true
)]
struct Args {
    /// The instance to schedule.
    ///
    /// The first line holds the number of slices and the second line the number of jobs. Every
    /// job starts with a line holding its number of operations and a line holding its weight,
    /// followed by one line per operation: the number of slices, the duration, the number of
    /// dependencies and the (1-indexed) operations it depends on.
    #[clap(verbatim_doc_comment)]
    input_path: PathBuf,

    /// The file to write the schedule to.
    ///
    /// For every job and every operation of that job, one line holding the start time followed
    /// by the (1-indexed) slices of the operation. The file is only written when every job has
    /// been scheduled.
    #[clap(verbatim_doc_comment)]
    output_path: PathBuf,

    /// The maximum number of jobs which are scheduled together.
    ///
    /// Jobs are grouped in order of decreasing weight per unit of consumed resource. Larger
    /// groups lead to better schedules, but to larger models.
    ///
    /// Possible values: usize, at least 1
    #[arg(
        short = 'g',
        long = "group_size",
        default_value_t = DEFAULT_GROUP_SIZE,
        verbatim_doc_comment
    )]
    group_size: NonZero<usize>,

    /// The time budget for scheduling a single group, in seconds.
    ///
    /// When the budget runs out, the best schedule found for the group so far is kept. If no
    /// schedule was found at all, the run fails.
    ///
    /// Possible values: f64
    #[arg(short = 't', long = "time_out", default_value_t = 960.0, verbatim_doc_comment)]
    time_out: f64,

    /// Enables logging of the progress of every group.
    ///
    /// Possible values: bool
    #[arg(short = 'v', long = "verbose", verbatim_doc_comment)]
    verbose: bool,

    /// Determine what type of optimisation strategy is used for every group.
    #[arg(long = "optimisation-strategy", value_enum, default_value_t)]
    optimisation_strategy: OptimisationStrategy,

    /// Do not order operations which start at the same time by their slices.
    ///
    /// This makes the model of every group smaller, at the cost of a larger search space.
    ///
    /// Possible values: bool
    #[arg(long = "no-symmetry-breaking", verbatim_doc_comment)]
    no_symmetry_breaking: bool,

    /// Validate the schedule before writing it.
    ///
    /// Possible values: bool
    #[arg(long = "check", verbatim_doc_comment)]
    check: bool,
}

fn configure_logging(verbose: bool) {
    let level_filter = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .format(move |buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .filter_level(level_filter)
        .target(env_logger::Target::Stdout)
        .init();
    info!("Logging successfully configured");
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            error!("Execution failed, error: {e}");
            std::process::exit(1);
        }
    }
}

fn run() -> CliResult<()> {
    let args = Args::parse();

    configure_logging(args.verbose);

    let time_budget = Duration::try_from_secs_f64(args.time_out)
        .map_err(|_| CliError::InvalidTimeOut(args.time_out))?;

    let instance = Instance::parse(BufReader::new(File::open(&args.input_path)?))?;
    info!(
        "Read {} jobs with {} operations on {} slices",
        instance.jobs().len(),
        instance.num_operations(),
        instance.num_slices()
    );

    let options = DecompositionOptions {
        group_size: args.group_size,
        time_budget,
        model: ModelOptions {
            symmetry_breaking: !args.no_symmetry_breaking,
        },
    };
    let mut engine = PumpkinEngine::new(PumpkinEngineOptions {
        optimisation_strategy: args.optimisation_strategy,
    })
    .with_os_signal(OsSignal::install()?);

    let decomposition = decompose(&instance, &options, &mut engine)?;
    info!("Scheduled {} groups", decomposition.groups.len());

    if args.check {
        decomposition
            .schedule
            .check(&instance)
            .map_err(JobShopError::from)?;
        info!("The schedule is valid");
    }

    write_atomically(&decomposition.schedule, &args.output_path)
}

/// Write the schedule to a temporary file next to `path`, and move it into place once it is
/// complete.
fn write_atomically(schedule: &Schedule, path: &Path) -> CliResult<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let file = NamedTempFile::new_in(directory)?;
    schedule.write(BufWriter::new(file.as_file()))?;
    file.as_file().sync_all()?;

    let _ = file.persist(path).map_err(|e| e.error)?;

    Ok(())
}
