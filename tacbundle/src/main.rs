use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use tacbundle::input::{InputProvider, PromptInput};
use tacbundle::transport::{Connector, LocalConnector, SshConnector};
use tacbundle::{
    CollectionJob, Collector, CollectorConfig, ErrorKind, ExecutionMode, JobReport, Result,
    SessionManager, TransferOutcome, TransferRequest,
};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    initialize_logging(args.verbose);

    match run(&args).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

fn initialize_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

async fn run(args: &Args) -> Result<JobReport> {
    let mut config = match &args.config {
        Some(path) => CollectorConfig::load(path)?,
        None => CollectorConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    let mut job = CollectionJob::new(args.case_id.as_deref(), &config.placeholder_case_id)?;
    let request = args.transfer_request(&config, job.case_id());

    let mode = ExecutionMode::detect();
    info!("running {} against {}", mode, args.host);

    match mode {
        ExecutionMode::OnDevice => {
            collect(LocalConnector::default(), args, config, mode, &mut job, &request).await
        }
        ExecutionMode::Remote => {
            collect(SshConnector::default(), args, config, mode, &mut job, &request).await
        }
    }
}

async fn collect<C: Connector>(
    connector: C,
    args: &Args,
    config: CollectorConfig,
    mode: ExecutionMode,
    job: &mut CollectionJob,
    request: &TransferRequest,
) -> Result<JobReport> {
    let mut builder = SessionManager::builder(connector)
        .port(config.ssh.port)
        .timeout(config.timeouts.connect())
        .command_timeout(config.timeouts.command())
        .close_timeout(config.timeouts.close())
        .host_key_verification(config.ssh.host_key_verification.clone());

    if let Some(path) = &config.ssh.known_hosts {
        builder = builder.known_hosts_path(path);
    }

    builder = match (&args.key, &args.passphrase, &args.password) {
        (Some(key), Some(passphrase), _) => builder.private_key_with_passphrase(key, passphrase),
        (Some(key), None, _) => builder.private_key(key),
        (None, _, Some(password)) => builder.password(password),
        (None, _, None) => builder.prompt_password(),
    };

    let collector = Collector::new(builder.build(), config, mode);
    let input: &dyn InputProvider = &PromptInput;
    collector
        .collect(job, &args.host, &args.user, request, input, interrupted())
        .await
}

/// Resolves on Ctrl-C.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

fn print_summary(report: &JobReport) {
    println!("case:     {}", report.case_id);
    println!("device:   {} (EOS {})", report.device.identifier, report.device.version);
    println!("strategy: {}", report.strategy);
    println!("artifact: {}", report.artifact.remote_path);
    match &report.outcome {
        TransferOutcome::Downloaded { local_path, bytes } => {
            println!("saved:    {} ({} bytes)", local_path.display(), bytes);
        }
        TransferOutcome::Uploaded { destination } => {
            println!("sent to:  {destination}");
        }
    }
    if let Some(dir) = &report.extracted {
        println!("extracted: {}", dir.display());
    }
    if let Some(reason) = &report.extraction_error {
        println!("not extracted: {reason}");
    }
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Configuration | ErrorKind::Encoding => 2,
        ErrorKind::Authentication => 3,
        ErrorKind::Connectivity => 4,
        ErrorKind::Timeout => 5,
        ErrorKind::Parse | ErrorKind::Command => 6,
        ErrorKind::ArtifactNotFound => 7,
        ErrorKind::Transfer => 8,
        ErrorKind::Io => 9,
        ErrorKind::Interrupted => 130,
    }
}
