use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqlscribe")]
#[command(about = "natural-language query service for tenant sqlite stores", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind
        #[arg(long, env = "SQLSCRIBE_BIND", default_value = "127.0.0.1:8000")]
        bind: String,

        /// Root directory holding per-tenant database stores
        #[arg(long, env = "DB_DIR")]
        db_dir: Option<PathBuf>,

        /// SQLite file holding user credentials
        #[arg(long, env = "USER_DB", default_value = "data/userdata.db")]
        user_db: PathBuf,

        /// Secret used to sign access tokens
        #[arg(long, env = "SQLSCRIBE_JWT_SECRET")]
        jwt_secret: String,

        /// Number of HTTP workers (0 = one per core)
        #[arg(long, env = "SQLSCRIBE_WORKERS", default_value = "0")]
        workers: usize,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Serve {
                bind,
                db_dir,
                user_db,
                jwt_secret,
                workers,
            } => serve(bind, db_dir, user_db, jwt_secret, workers).await,
        }
    }
}

async fn serve(
    bind: String,
    db_dir: Option<PathBuf>,
    user_db: PathBuf,
    jwt_secret: String,
    workers: usize,
) -> Result<()> {
    use crate::auth::AuthService;
    use crate::routes::{self, AppState};
    use actix_web::{middleware, web, App, HttpServer};
    use common::agent::QueryPipeline;
    use common::config::ServiceConfig;
    use common::llm::GeminiClient;
    use common::store::StoreResolver;
    use common::tracing::init_tracing;
    use std::sync::Arc;

    let _guard = init_tracing("sqlscribe")?;

    let mut config = ServiceConfig::from_env()?;
    if let Some(db_dir) = db_dir {
        config.db_root = db_dir;
    }

    tracing::info!(
        root = %config.db_root.display(),
        model = %config.generation.model,
        "starting service"
    );

    let resolver = StoreResolver::new(config.db_root.clone())
        .with_tenantless_fallback(config.tenantless_fallback);
    let client = Arc::new(GeminiClient::new(&config.generation)?);
    let pipeline = Arc::new(QueryPipeline::new(client, resolver.clone()));
    let auth = Arc::new(AuthService::new(user_db, jwt_secret)?);

    let state = web::Data::new(AppState {
        pipeline,
        resolver,
        auth,
    });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind(&bind)?;

    let server = if workers > 0 {
        server.workers(workers)
    } else {
        server
    };

    tracing::info!("listening on {}", bind);
    let server = server.run();
    let handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, stopping server");
            handle.stop(true).await;
        }
    }

    Ok(())
}
