mod cli;

use clap::Parser;
use cli::{Cli, Command};
use eyre::{Context, Result};
use rusqlite::Connection;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let db_path = cli.store_dir.join("store.sqlite3");
    let conn = Connection::open(&db_path)
        .with_context(|| format!("opening store at {}", db_path.display()))?;

    match cli.command {
        Command::Stats => {
            let mut stmt = conn.prepare(
                "SELECT collection, COUNT(*) FROM records GROUP BY collection ORDER BY collection",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (collection, count) = row?;
                println!("{collection:<24} {count}");
            }
        }
        Command::Get { key } => {
            let value: Option<String> = conn
                .query_row(
                    "SELECT value FROM kv WHERE key = ?1 AND (expires_at IS NULL OR expires_at > strftime('%s','now')*1000)",
                    [&key],
                    |row| row.get(0),
                )
                .ok();
            match value {
                Some(v) => println!("{v}"),
                None => println!("(nil)"),
            }
        }
    }

    Ok(())
}
