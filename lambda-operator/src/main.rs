//! Lambda platform operator entrypoint (spec.md SPEC_FULL ambient stack:
//! CLI, telemetry bootstrap, controller wiring).
mod agent_reconciler;
mod config;
mod context;
mod error;
mod events;
mod function_reconciler;
mod health;
mod metrics;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use lambda_core::agent::LambdaAgent;
use lambda_core::function::LambdaFunction;
use prometheus::Registry;
use tracing::{error, info, warn};

use config::Config;
use context::Context;
use metrics::Metrics;

#[derive(Parser)]
#[command(name = "lambda-operator", about = "Reconciles LambdaFunction and LambdaAgent custom resources")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reconcile loops (default when no subcommand is given).
    Run,
    /// Print the CustomResourceDefinition YAML for both kinds to stdout.
    Crd,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Crd => print_crds(),
        Command::Run => run().await,
    }
}

fn print_crds() -> color_eyre::Result<()> {
    println!("{}", serde_yaml::to_string(&LambdaFunction::crd())?);
    println!("---");
    println!("{}", serde_yaml::to_string(&LambdaAgent::crd())?);
    Ok(())
}

async fn run() -> color_eyre::Result<()> {
    let config = Config::default();
    telemetry::init(&config);
    info!(health_addr = %config.health_addr, "starting lambda-operator");

    let client = Client::try_default().await?;
    let registry = Registry::new();
    let metrics = Metrics::new().register(&registry)?;
    let ctx = Context::new(client.clone(), config.clone(), metrics);

    let health_router = health::router(ctx.clone(), registry);
    let health_listener = tokio::net::TcpListener::bind(ctx.config.health_addr.as_str()).await?;
    let health_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_router).await {
            error!(error = %e, "health server exited");
        }
    });

    let functions: Api<LambdaFunction> = Api::all(client.clone());
    let function_controller = Controller::new(functions, watcher::Config::default())
        .shutdown_on_signal()
        .run(function_reconciler::reconcile, function_reconciler::error_policy, ctx.clone())
        .for_each(|res| async move {
            match res {
                Ok((obj, _action)) => info!(?obj, "function reconciled"),
                Err(e) => warn!(error = %e, "function reconcile error"),
            }
        });

    let agents: Api<LambdaAgent> = Api::all(client.clone());
    let agent_controller = Controller::new(agents, watcher::Config::default())
        .shutdown_on_signal()
        .run(agent_reconciler::reconcile, agent_reconciler::error_policy, ctx.clone())
        .for_each(|res| async move {
            match res {
                Ok((obj, _action)) => info!(?obj, "agent reconciled"),
                Err(e) => warn!(error = %e, "agent reconcile error"),
            }
        });

    tokio::join!(function_controller, agent_controller);

    // Controllers only return once their shutdown signal has fired; give
    // in-flight reconciles a bounded window to drain (spec.md §4.8).
    let deadline = ctx.config.shutdown_drain_deadline;
    let start = std::time::Instant::now();
    while ctx.queue.in_flight_count() > 0 && start.elapsed() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    health_server.abort();
    info!("lambda-operator shut down");
    Ok(())
}
