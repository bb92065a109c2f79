use crate::*;
use std::io::{self, Write};

#[cfg(feature = "bin")]
pub mod bin {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[derive(Debug, Parser)]
    #[command(version = env!("FULL_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
    struct Args {
        /// The task files (JSON) to synthesize programs for
        inputs: Vec<PathBuf>,
        /// Overrides the largest program size of every task
        #[clap(long)]
        max_prog_size: Option<usize>,
        /// Overrides the time limit of every task, in seconds
        #[clap(long)]
        time_limit: Option<f64>,
        /// Overrides how many programs to accept per task
        #[clap(long)]
        solution_limit: Option<usize>,
        /// Replaces the operator set of every task (comma separated)
        #[clap(long, value_delimiter = ',')]
        operators: Option<Vec<String>>,
        /// Prints the output table of every accepted program
        #[clap(long)]
        show_output: bool,
        /// Prints a summary of the search after each task
        #[clap(long)]
        report: bool,
    }

    impl Args {
        fn apply(&self, task: &mut Task) -> Result<(), Error> {
            if let Some(size) = self.max_prog_size {
                task.budgets.max_prog_size = size;
            }
            if let Some(secs) = self.time_limit {
                task.budgets.time_limit = crate::task::seconds(secs)?;
            }
            if let Some(limit) = self.solution_limit {
                task.budgets.solution_limit = limit;
            }
            if let Some(operators) = &self.operators {
                task.config.operators = Config::with_operators(operators.as_slice())?.operators;
            }
            task.budgets.validate()
        }
    }

    /// Start the command-line interface.
    #[allow(clippy::disallowed_macros)]
    pub fn cli() {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .format_timestamp(None)
            .format_target(false)
            .parse_default_env()
            .init();

        let args = Args::parse();
        if args.inputs.is_empty() {
            log::error!("Pass in some task files as arguments");
            std::process::exit(1)
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut total = SynthesisReport::default();
        for input in &args.inputs {
            let result = Task::load(input).and_then(|mut task| {
                args.apply(&mut task)?;
                task.run()
            });
            let synthesis = match result {
                Ok(synthesis) => synthesis,
                Err(err) => {
                    log::error!("{}: {err}", input.display());
                    std::process::exit(1)
                }
            };
            log::info!(
                "{}: {} programs found",
                input.display(),
                synthesis.solutions.len()
            );
            let written = write_synthesis(&mut out, &synthesis, args.show_output).and_then(|()| {
                if args.report {
                    write!(out, "{}", synthesis.report)
                } else {
                    Ok(())
                }
            });
            if let Err(err) = written {
                log::error!("{err}");
                std::process::exit(1)
            }
            total = total.union(&synthesis.report);
        }
        if args.report && args.inputs.len() > 1 {
            log::info!("Overall statistics:\n{total}");
        }
    }
}

/// Writes every accepted program as a sequence of statements, optionally
/// followed by its output table.
pub fn write_synthesis(out: &mut impl Write, synthesis: &Synthesis, show_output: bool) -> io::Result<()> {
    if synthesis.solutions.is_empty() {
        writeln!(out, "No program found")?;
    }
    for (i, solution) in synthesis.solutions.iter().enumerate() {
        writeln!(out, "# solution {i}")?;
        for statement in solution.program.to_statements() {
            writeln!(out, "{statement}")?;
        }
        if solution.program.size() == 0 {
            writeln!(out, "{}", solution.program)?;
        }
        if show_output {
            write!(out, "{}", solution.output)?;
        }
    }
    Ok(())
}
