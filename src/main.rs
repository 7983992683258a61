//! wikiquery - run a single MediaWiki API query from the command line
//!
//! Builds a `WikiClient` from the config file and CLI flags, runs the query
//! and prints the response to stdout. Logs go to stderr; set `RUST_LOG`
//! (e.g. `RUST_LOG=wikiquery=debug`) to see cache and throttle decisions.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use serde_json::Value;
use tracing::{debug, info};

use wikiquery::cli::{Cli, QueryPlan};
use wikiquery::WikiClient;

async fn run(plan: QueryPlan) -> Result<(), Box<dyn std::error::Error>> {
    let client = WikiClient::new(&plan.config)?;
    let request = client.request_for(&plan.params)?;
    info!(url = request.cache_key(), "querying API");

    let output = if plan.raw {
        client.query_raw(&plan.params).await?
    } else if let Some(max_batches) = plan.continue_batches {
        let batches = client.query_continued(&plan.params, max_batches).await?;
        debug!(batches = batches.len(), "pagination finished");
        serde_json::to_vec_pretty(&Value::Array(batches))?
    } else {
        let value = client.query(&plan.params).await?;
        serde_json::to_vec_pretty(&value)?
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(&output)?;
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let plan = match QueryPlan::from_cli(&cli) {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(2);
        }
    };

    if let Err(err) = run(plan).await {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
