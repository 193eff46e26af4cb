use std::sync::Arc;

use clap::Parser;
use dancegrade::cli::{Cli, Command};
use dancegrade::config::Configuration;
use dancegrade::error::AppError;
use dancegrade::game::StepCatalog;
use dancegrade::intake::client::ClientManager;
use dancegrade::network::Server;
use dancegrade::services::SidecarClient;
use dancegrade::steps::StepExtractorBuilder;
use dancegrade::storage::{SqliteStorage, Storage};
use tracing::{error, info, Level};

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn serve(
    configuration: &Configuration,
    storage: Arc<dyn Storage>,
    sidecar: SidecarClient,
) -> Result<(), AppError> {
    let catalog = Arc::new(StepCatalog::new(storage.clone()));
    let (manager, handle) = ClientManager::new(
        Arc::new(sidecar),
        catalog,
        storage,
        configuration.frame_buffer_size,
    );
    let server = Server::bind(configuration.port, handle, configuration.max_frame_bytes).await?;
    let result = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Could not listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
    manager.stop();
    result
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    let configuration = cli.apply(Configuration::load()?);
    init_logging(configuration.log_level());

    let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::open(&configuration.database_path)?);
    let sidecar = SidecarClient::new(&configuration.sidecar_addr, configuration.max_frame_bytes);

    match cli.command() {
        Command::Serve => serve(&configuration, storage, sidecar).await,
        Command::Extract { video, selected } => {
            let video = configuration.reference_path(&video);
            let sidecar = Arc::new(sidecar);
            let extractor = StepExtractorBuilder::new(
                sidecar.clone(),
                sidecar.clone(),
                sidecar,
                storage,
            )
            .sample_rate(configuration.analysis_sample_rate)
            .build();
            let id = extractor.extract_steps(&video, selected).await?;
            info!("Extracted {} as reference {}", video.display(), id);
            Ok(())
        }
        Command::List => {
            for reference in storage.list_references()? {
                let marker = if reference.selected { "*" } else { " " };
                println!(
                    "{} {:>4}  {:<24} {}",
                    marker, reference.id, reference.title, reference.filepath
                );
            }
            Ok(())
        }
    }
}
