use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use iocraft::prelude::*;

use pict::{
    client::{ClientConfig, ObsClient, Session},
    config, pipeline,
    pipeline::{Outcome, Report},
    ui::{self, ErrorMessage, RunSummary, SuccessMessage},
};

#[derive(Parser)]
#[command(name = "pict")]
#[command(version)]
#[command(about = "Set your LINE profile picture to the image attached to a chat message")]
struct Cli {
    /// Access token of the account
    token: String,
    /// Member id (mid) of the account
    mid: String,
    /// Id of the message whose attachment becomes the new picture
    message_id: String,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

fn main() -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let _rt_guard = rt.enter();
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();
    init_tracing();

    let config = config::read_config()?;
    let strict_exit = config.strict_exit;
    let client = ObsClient::new(ClientConfig {
        endpoints: config.endpoints,
        identity: config.identity,
        session: Session {
            access_token: cli.token,
            mid: cli.mid,
        },
        channel_id: config.channel_id,
    })?;

    let report = rt.block_on(pipeline::run_pipeline(&client, &cli.message_id));
    print_report(&report, &client.session().mid);

    if strict_exit && !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(report: &Report, mid: &str) {
    element! {
        RunSummary(
            title: format!("message {}", report.message_id),
            steps: ui::steps_from_report(report)
        )
    }
    .print();

    match &report.outcome {
        Outcome::Updated => {
            element!(SuccessMessage(message: format!("Profile picture of {} updated", mid))).print();
        }
        Outcome::DownloadFailed(e) => {
            element!(ErrorMessage(message: format!("Download failed: {}", e))).print();
        }
        Outcome::UploadFailed(e) => {
            element!(ErrorMessage(message: format!("Upload failed: {}", e))).print();
        }
    }
}
