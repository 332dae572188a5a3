mod analyze;
mod cli;
mod collect;
mod csv_export;
mod exit_codes;
mod logging;
mod output;
mod run;
mod run_error;

use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    exit_codes::ExitCode::Success.as_i32()
                }
                _ => exit_codes::ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    if let Err(err) = logging::init(cli.log_format) {
        eprintln!("failed to initialize logging: {err:#}");
    }

    let result = match cli.command {
        cli::Command::Run(args) => run::run(args).await,
        cli::Command::Collect(args) => collect::collect(args).await,
        cli::Command::Analyze(args) => analyze::analyze(args),
    };

    let code = match result {
        Ok(code) => code.as_i32(),
        Err(err) => {
            eprintln!("{err}");
            err.exit_code().as_i32()
        }
    };

    std::process::exit(code);
}
