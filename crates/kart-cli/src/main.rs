use clap::Parser;

mod cli;
mod commands;

fn main() {
    tracing_subscriber::fmt::init();
    let cli = cli::Cli::parse();

    if let Err(err) = commands::run_command(cli) {
        eprintln!("error: {err:#}");

        let code = if let Some(cli_err) = err.downcast_ref::<commands::CliError>() {
            cli_err.code
        } else if let Some(repo_err) = err.downcast_ref::<kart_repo::RepoError>() {
            commands::exit_code_for_repo_error(repo_err)
        } else {
            commands::exit_code::GENERIC_FAILURE
        };

        std::process::exit(code);
    }
}
