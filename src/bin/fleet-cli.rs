use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "fleet-cli")]
#[command(about = "Management CLI for the fleet controller", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check controller status and fleet size
    Status,
    /// List backend membership, health, and in-flight counts
    Backends,
    /// Show the last scale action
    Scaling,
    /// Tail the perimeter decision log
    Decisions {
        /// Number of decisions to fetch
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Dry-run a request tuple against a perimeter
    Evaluate {
        /// Perimeter name
        perimeter: String,
        /// inbound or outbound
        direction: String,
        /// tcp, udp, or icmp
        protocol: String,
        port: u16,
        source: String,
        destination: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(cli.timeout))
        .build()?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Backends => {
            let res = client
                .get(format!("{}/admin/backends", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Scaling => {
            let res = client
                .get(format!("{}/admin/scaling", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Decisions { limit } => {
            let res = client
                .get(format!("{}/admin/decisions?limit={}", cli.url, limit))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Evaluate {
            perimeter,
            direction,
            protocol,
            port,
            source,
            destination,
        } => {
            let body = serde_json::json!({
                "perimeter": perimeter,
                "direction": direction,
                "protocol": protocol,
                "port": port,
                "source": source,
                "destination": destination,
            });
            let res = client
                .post(format!("{}/admin/perimeter/evaluate", cli.url))
                .headers(headers)
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    let value: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
