use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "property-cli")]
#[command(about = "Command-line client for the property listing service", long_about = None)]
struct Cli {
    /// Base URL of the service, including the path prefix in production
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Bearer token forwarded to the property store
    #[arg(short, long, env = "PROPERTY_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service liveness
    Health,
    /// Dump Prometheus metrics
    Metrics,
    /// List properties
    List {
        /// Maximum number of properties (0 = all)
        #[arg(short, long, default_value_t = 0)]
        count: usize,
    },
    /// Fetch one property by ID
    Get { id: String },
    /// List the properties owned by a user
    ByUser { user_id: String },
    /// Delete a property by ID
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", origin(base))).send().await?;
            print_response(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", origin(base))).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if status.is_success() {
                print!("{}", text);
            } else {
                eprintln!("Error: service returned status {}", status);
                eprintln!("Response: {}", text);
            }
        }
        Commands::List { count } => {
            let res = client
                .get(format!("{}/properties", base))
                .query(&[("count", count)])
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Get { id } => {
            let res = client
                .get(format!("{}/properties/{}", base, id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ByUser { user_id } => {
            let res = client
                .get(format!("{}/properties/user/{}", base, user_id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Delete { id } => {
            let res = client
                .delete(format!("{}/properties/{}", base, id))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

/// `/health` and `/metrics` are never prefixed; strip any path from the base URL.
fn origin(base: &str) -> String {
    match reqwest::Url::parse(base) {
        Ok(url) => url.origin().ascii_serialization(),
        Err(_) => base.to_string(),
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
