use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management CLI for the FHIR relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "FHIR_RELAY_URL")]
    url: String,

    /// Ingress path prefix.
    #[arg(long, default_value = "/iDAAS")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay health and the active vendor
    Status,
    /// List the resource table
    Resources,
    /// Send a FHIR resource file through the relay
    Send {
        /// Resource ingress path, e.g. `patient`
        resource: String,
        /// JSON file to send as the body
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Resources => {
            let res = client.get(format!("{base}/admin/resources")).send().await?;
            print_response(res).await?;
        }
        Commands::Send { resource, file } => {
            let body = tokio::fs::read(&file).await?;
            let prefix = cli.prefix.trim_end_matches('/');
            let res = client
                .post(format!("{base}{prefix}/{resource}"))
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;
            if let Some(id) = res.headers().get("x-request-id").and_then(|v| v.to_str().ok()) {
                eprintln!("Exchange: {id}");
            }
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: relay returned status {status}");
        if !text.is_empty() {
            eprintln!("Response: {text}");
        }
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
