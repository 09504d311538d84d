use anyhow::Context;
use sea_orm_migration::prelude::*;
use std::env;

use wardrobe_migration::Migrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("cli");

    match command {
        "up" => {
            println!("Running migrations up...");
            let db = get_database_connection().await?;
            Migrator::up(&db, None).await?;
            println!("Completed migrations up.");
        }
        "down" => {
            println!("Running migrations down...");
            let db = get_database_connection().await?;
            Migrator::down(&db, None).await?;
            println!("Completed migrations down.");
        }
        "fresh" => {
            println!("Refreshing database (down then up)...");
            let db = get_database_connection().await?;
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
            println!("Database refresh completed.");
        }
        "status" => {
            let db = get_database_connection().await?;
            let pending: Vec<String> = Migrator::get_pending_migrations(&db)
                .await?
                .iter()
                .map(|m| m.name().to_string())
                .collect();

            println!("Migration Status:");
            for migration in Migrator::migrations() {
                let name = migration.name();
                let state = if pending.iter().any(|p| p == name) {
                    "Pending"
                } else {
                    "Applied"
                };
                println!("{}: {}", name, state);
            }
        }
        _ => {
            cli::run_cli(Migrator).await;
        }
    }

    Ok(())
}

async fn get_database_connection() -> anyhow::Result<sea_orm::DatabaseConnection> {
    let database_url =
        env::var("DATABASE_URL").context("DATABASE_URL environment variable must be set")?;

    sea_orm::Database::connect(&database_url)
        .await
        .context("failed to connect to the database")
}
