//! catalog-itest - integration tests for build/query batch programs
//!
//! Usage: `catalog-itest <path-to-subject-binary>`

use clap::error::ErrorKind;
use clap::Parser;
use catalog_itest::commands::Cli;
use catalog_itest::common::logging;
use catalog_itest::testing::{Reporter, RunStatus};
use catalog_itest::{cli, Error};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(RunStatus::Passed.code());
        }
        Err(e) => {
            let _ = e.print();
            let mut reporter = Reporter::stdout();
            reporter.starting();
            reporter.fatal(&Error::Argument(
                "please pass path to the subject binary file as a single parameter".to_string(),
            ));
            std::process::exit(RunStatus::InvalidArguments.code());
        }
    };

    logging::init_cli(args.verbose);

    let status = cli::run(args).await;
    std::process::exit(status.code());
}
