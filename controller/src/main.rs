mod attach;

use anyhow::Result;
use clap::{Parser, Subcommand};
use forking_core::args::ServiceArgs;
use forking_protocol::{ControlClient, ControlCommand, ControlResponse};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "controller")]
#[command(about = "CLI Controller for the forking service")]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    /// Seconds to wait for the service to answer
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the service is alive
    Hello,
    /// Ask the service to stop and drain its workers
    Quit,
    /// Spawn a worker
    Fork {
        /// Integer handed to the worker
        #[arg(allow_negative_numbers = true)]
        argument: i64,
        /// Connect this terminal to the worker's pipes
        #[arg(short, long)]
        attach: bool,
    },
    /// Send a raw request line and print the raw answer
    Send {
        /// Request line, without the trailing newline
        line: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let client = ControlClient::new(cli.service.to_config().address())
        .with_timeout(Duration::from_secs(cli.timeout));

    let response = match cli.command {
        Commands::Hello => client.send_command(ControlCommand::Hello).await?,
        Commands::Quit => client.send_command(ControlCommand::Quit).await?,
        Commands::Fork { argument, attach } => {
            let response = client
                .send_command(ControlCommand::Fork { argument })
                .await?;
            if let (true, ControlResponse::Forked(directory)) = (attach, &response) {
                let directory = directory.clone();
                tokio::task::spawn_blocking(move || attach::attach(&directory)).await??;
                return Ok(ExitCode::SUCCESS);
            }
            response
        }
        Commands::Send { line } => {
            let answer = client.send_line(&line).await?;
            print!("{}", answer);
            return Ok(exit_code(&ControlResponse::parse(&answer)));
        }
    };

    print_response(&response);
    Ok(exit_code(&response))
}

fn print_response(response: &ControlResponse) {
    match response {
        ControlResponse::Alive | ControlResponse::Quitting => print!("{}", response.to_line()),
        ControlResponse::Forked(directory) => println!("{}", directory.display()),
        ControlResponse::Failure(reason) => eprintln!("FAILURE: {}", reason),
    }
}

fn exit_code(response: &ControlResponse) -> ExitCode {
    if response.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
