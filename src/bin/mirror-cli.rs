use clap::{Parser, Subcommand};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;

use api_mirror::config::UpstreamConfig;
use api_mirror::forwarder::url::{mirror_url_for, upstream_url, API_PREFIX};
use api_mirror::http::X_MIRROR_RENDER;

#[derive(Parser)]
#[command(name = "mirror-cli")]
#[command(about = "Request tester and helper CLI for the API mirror", long_about = None)]
struct Cli {
    /// Base URL of a running mirror.
    #[arg(short, long, default_value = "http://localhost:3001", env = "MIRROR_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check mirror liveness
    Health,
    /// Send a request through the mirror and print the normalized reply
    Request {
        /// Upstream endpoint, e.g. `list` or `search`
        endpoint: String,

        /// API token, sent as the first query parameter
        #[arg(short, long, env = "MIRROR_TOKEN")]
        token: Option<String>,

        /// Extra query parameters: `key1=value1&key2=value2`
        #[arg(short, long)]
        params: Option<String>,

        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Request body for POST/PUT/PATCH
        #[arg(short, long)]
        data: Option<String>,

        /// Ask for compact rather than pretty JSON
        #[arg(long)]
        compact: bool,
    },
    /// Rewrite an upstream URL into the matching mirror URL
    Convert {
        /// Original upstream URL
        original: String,

        #[arg(long, default_value_t = UpstreamConfig::default().base_url)]
        upstream: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url.trim_end_matches('/'))).send().await?;
            print_response(res).await?;
        }
        Commands::Request {
            endpoint,
            token,
            params,
            method,
            data,
            compact,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())?;
            let query = build_query(token.as_deref(), params.as_deref());
            let url = upstream_url(
                &format!("{}{}", cli.url.trim_end_matches('/'), API_PREFIX),
                endpoint.trim_start_matches('/'),
                query.as_deref(),
            );
            println!("{} {}", method, url);

            let mut req = client
                .request(method, &url)
                .header(X_MIRROR_RENDER, if compact { "compact" } else { "pretty" });
            if let Some(data) = data {
                req = req.header(CONTENT_TYPE, "application/json").body(data);
            }
            print_response(req.send().await?).await?;
        }
        Commands::Convert { original, upstream } => {
            println!("{}", mirror_url_for(&upstream, &cli.url, &original)?);
        }
    }

    Ok(())
}

/// `token=<t>` first, then the caller's parameters.
fn build_query(token: Option<&str>, params: Option<&str>) -> Option<String> {
    let parts: Vec<String> = token
        .filter(|t| !t.is_empty())
        .map(|t| format!("token={}", t))
        .into_iter()
        .chain(
            params
                .map(|p| p.trim_start_matches(['?', '&']).to_string())
                .filter(|p| !p.is_empty()),
        )
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("&"))
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let content_type = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let body = res.text().await?;

    println!("Status: {}", status);
    println!("Content-Type: {}", content_type);
    println!();

    match serde_json::from_str::<Value>(&body) {
        Ok(json) if !status.is_success() => {
            let message = json.get("message").and_then(Value::as_str).unwrap_or(body.as_str());
            eprintln!("Error: {}", message);
            println!("{}", body);
        }
        _ => println!("{}", body),
    }
    Ok(())
}
