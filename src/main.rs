//! credit-risk entrypoint: batch processing and training commands, the
//! prediction API server and registry maintenance.

use anyhow::{Context, Result};
use clap::Parser;
use credit_risk::{
    api::{build_router, AppState, PredictionService},
    cli::{Cli, Command, ModelsCommand},
    config::AppConfig,
    dataset::{load_processed, PROCESSED_FILE_NAME},
    logging::StructuredLogger,
    processing,
    storage::ModelRegistry,
    training::Trainer,
};
use std::path::PathBuf;
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?.apply_env()?;

    StructuredLogger::init(&config.log);
    info!(config = %cli.config.display(), "credit-risk starting");

    match cli.command {
        Command::Process {
            raw_data_path,
            processed_data_dir,
        } => {
            let mut data = config.data.clone();
            if let Some(p) = raw_data_path {
                data.raw_data_path = p;
            }
            if let Some(d) = processed_data_dir {
                data.processed_data_dir = d;
            }
            let summary = processing::run_with_config(&data, &config.labeling)
                .with_context(|| format!("processing {}", data.raw_data_path.display()))?;
            StructuredLogger::emit_json(&summary, &mut std::io::stdout())?;
        }

        Command::Train {
            processed_data_path,
            model_name,
        } => {
            let path: PathBuf = processed_data_path
                .unwrap_or_else(|| config.data.processed_data_dir.join(PROCESSED_FILE_NAME));
            let model_name = model_name.unwrap_or_else(|| config.serving.model_name.clone());
            let data = load_processed(&path)
                .with_context(|| format!("loading training data from {}", path.display()))?;
            let registry = ModelRegistry::open(&config.registry.root)
                .with_context(|| format!("opening registry {}", config.registry.root.display()))?;
            let trainer = Trainer::new(config.training.clone(), config.registry.experiment.clone());
            let summary = trainer.run(&data, &registry, &model_name).context("training run failed")?;
            StructuredLogger::emit_json(&summary, &mut std::io::stdout())?;
        }

        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.serving.host.clone());
            let port = port.unwrap_or(config.serving.port);
            let service = PredictionService::open(
                &config.registry.root,
                &config.serving.model_name,
                config.serving.model_stage,
            );
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?;
            runtime.block_on(serve(AppState::new(service), &host, port))?;
        }

        Command::Models { command } => {
            let registry = ModelRegistry::open(&config.registry.root)
                .with_context(|| format!("opening registry {}", config.registry.root.display()))?;
            match command {
                ModelsCommand::List { model_name } => {
                    let name = model_name.unwrap_or_else(|| config.serving.model_name.clone());
                    for version in registry.list_versions(&name)? {
                        StructuredLogger::emit_json(&version, &mut std::io::stdout())?;
                    }
                }
                ModelsCommand::Promote {
                    version,
                    stage,
                    model_name,
                } => {
                    let name = model_name.unwrap_or_else(|| config.serving.model_name.clone());
                    let updated = registry.transition_stage(&name, version, stage, true)?;
                    StructuredLogger::emit_json(&updated, &mut std::io::stdout())?;
                }
            }
        }
    }

    Ok(())
}

async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    info!(addr = %listener.local_addr()?, ready = state.service.is_ready(), "prediction API listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("prediction API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
