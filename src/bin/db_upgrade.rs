use clap::Parser;
use deltacloud::utils::logger;
use deltacloud::{Server, ServerConfig, TomlConfig, UpgradeArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = UpgradeArgs::parse();
    logger::init_cli_logger(args.verbose);

    let config = match &args.config {
        Some(path) => ServerConfig::from_toml(TomlConfig::from_file(path)?),
        None => ServerConfig::default(),
    };
    let config = ServerConfig {
        storage_enabled: true,
        ..config
    };

    tracing::info!("Upgrading database at {}", config.database_url());
    let server = Server::new(config);

    let result = async {
        let Some(db) = server.open_database(true).await? else {
            return Ok(0);
        };
        let pending = db.pending_migrations().await?.len();
        if pending > 0 {
            db.upgrade().await?;
        }
        Ok::<usize, deltacloud::DeltacloudError>(pending)
    }
    .await;

    match result {
        Ok(0) => {
            tracing::info!("✅ Database is already up to date");
            println!("✅ Database is already up to date");
        }
        Ok(applied) => {
            tracing::info!("✅ Applied {} migration(s)", applied);
            println!("✅ Applied {} migration(s)", applied);
        }
        Err(e) => {
            tracing::error!("❌ Upgrade failed: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    }

    Ok(())
}
