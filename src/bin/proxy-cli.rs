use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the proxy runtime", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "PROXY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show runtime status
    Status,
    /// List clusters, destinations and their health
    Clusters {
        /// Only show this cluster
        #[arg(long)]
        id: Option<String>,
    },
    /// Probe every destination now and wait for the sweep to finish
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/admin/status")).headers(headers).send().await?;
            print_response(res, |json| json).await?;
        }
        Commands::Clusters { id } => {
            let res = client.get(format!("{base}/admin/clusters")).headers(headers).send().await?;
            print_response(res, |json| match (&id, json) {
                (Some(id), Value::Array(clusters)) => Value::Array(
                    clusters
                        .into_iter()
                        .filter(|c| c.get("id").and_then(Value::as_str) == Some(id.as_str()))
                        .collect(),
                ),
                (_, json) => json,
            })
            .await?;
        }
        Commands::Check => {
            let res = client.post(format!("{base}/admin/health/check")).headers(headers).send().await?;
            print_response(res, |json| json).await?;
        }
    }

    Ok(())
}

async fn print_response(
    res: reqwest::Response,
    select: impl FnOnce(Value) -> Value,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: admin endpoint returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&select(json))?);
    Ok(())
}
