use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod monitor;

#[derive(Parser)]
#[command(name = "spider-monitor")]
#[command(about = "Watch and trigger spider runs over the admin socket")]
struct Cli {
    /// TOML config with a [socket] section; defaults apply when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream run status pushes for one spider until the socket closes
    Watch {
        #[arg(long)]
        spider_id: u64,

        /// Send a run command once the socket is open
        #[arg(long)]
        run: bool,

        /// Close the socket after this many milliseconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Socket path; defaults to the spider's run status path
        #[arg(long)]
        path: Option<String>,
    },
    /// Print the socket endpoint a path resolves to
    Endpoint { path: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    let config = match monitor::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    let outcome = match cli.command {
        Commands::Watch {
            spider_id,
            run,
            timeout,
            path,
        } => {
            let options = monitor::WatchOptions {
                spider_id,
                run,
                timeout_ms: timeout,
                path,
            };
            monitor::run_watch(config, options).await
        }
        Commands::Endpoint { path } => monitor::print_endpoint(&config, &path),
    };

    match outcome {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}
