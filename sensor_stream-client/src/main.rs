// src/main.rs

mod cli;

use clap::Parser;
use dotenv::dotenv;
use log::{debug, error, info};
use sensor_stream_lib::{ClientError, SessionEnd, Supervisor, feed_json_lines};
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::runtime::Runtime;

use crate::cli::Args;

/* SENSOR_STREAM_PASSWORD=... RUST_LOG=sensor_stream_lib=debug \
cargo run -p sensor_stream-client -- Alice -f readings.csv */

/// How long runtime shutdown waits for blocking work, such as a stdin read.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    // a .env file is optional for the client
    dotenv().ok();
    let args = Args::parse();

    // initialize logger and panic hook
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level.as_str())).init();
    std::panic::set_hook(Box::new(|info| {
        error!("Thread panic: {:?}", info);
    }));

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let end = runtime.block_on(run(args));
    shutdown(runtime);

    if end.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Stop the runtime without waiting on a feed task parked in a blocking read.
fn shutdown(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

async fn run(args: Args) -> SessionEnd {
    let built = args
        .into_session_config()
        .map_err(ClientError::from)
        .and_then(|config| {
            info!("Session config: {config:?}");
            Supervisor::from_config(config)
        });
    let (supervisor, feed) = match built {
        Ok(built) => built,
        Err(e) => {
            let end = SessionEnd::Failed(e);
            error!("{end}");
            return end;
        }
    };

    // live device readings arrive as JSON lines on stdin
    if let Some(feed) = feed {
        tokio::spawn(async move {
            match feed_json_lines(BufReader::new(tokio::io::stdin()), feed).await {
                Ok(forwarded) => debug!("Device feed finished after {forwarded} readings"),
                Err(e) => error!("Device feed failed: {e}"),
            }
        });
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    supervisor.run(shutdown).await
}
