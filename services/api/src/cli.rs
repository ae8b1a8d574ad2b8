use crate::demo::{run_demo, run_projection, DemoArgs, ProjectionArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use legal_intake::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Legal Request Intake",
    about = "Run and demonstrate the insolvency and conciliation request intake service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk an insolvency request through every section and submit it in memory
    Demo(DemoArgs),
    /// Print or export the amortization schedule of a payment proposal
    Projection(ProjectionArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Projection(args) => run_projection(args),
    }
}
