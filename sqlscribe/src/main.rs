use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod auth;
mod cmd;
mod routes;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load .env before clap reads env-backed arguments
    dotenvy::dotenv().ok();

    let args = cmd::Cli::parse();
    args.execute().await
}
