// edgectl.rs
// Command-line client for the session edge

use anyhow::{anyhow, Context};
use dotenv::dotenv;
use serde_json::Value;
use std::env;
use tracing_subscriber::EnvFilter;

use session_edge::client::ApiClient;
use session_edge::session::CredentialStore;

const DEFAULT_EDGE_URL: &str = "http://localhost:3000";
const DEFAULT_SESSION_FILE: &str = ".edge_session.json";

fn print_usage() {
    println!("Usage: edgectl <command> [args]\n");
    println!("Commands:");
    println!("  login <email> [password]   Log in (password falls back to EDGE_PASSWORD)");
    println!("  me                         Show the current user");
    println!("  whoami                     Show the claims of the current access token");
    println!("  get <path>                 GET an edge path, e.g. /api/campaigns");
    println!("  logout                     Log out and forget the stored session");
    println!("\nEnvironment:");
    println!("  EDGE_URL            Edge base URL (default {})", DEFAULT_EDGE_URL);
    println!("  EDGE_SESSION_FILE   Where the refresh token is kept (default {})", DEFAULT_SESSION_FILE);
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let edge_url = env::var("EDGE_URL").unwrap_or_else(|_| DEFAULT_EDGE_URL.to_string());
    let session_file =
        env::var("EDGE_SESSION_FILE").unwrap_or_else(|_| DEFAULT_SESSION_FILE.to_string());

    let client = ApiClient::new(&edge_url, CredentialStore::with_refresh_file(&session_file))
        .context("failed to build HTTP client")?;

    match args.first().map(String::as_str) {
        Some("login") => {
            let email = args.get(1).ok_or_else(|| anyhow!("login needs an email"))?;
            let password = match args.get(2) {
                Some(p) => p.clone(),
                None => env::var("EDGE_PASSWORD")
                    .map_err(|_| anyhow!("pass a password or set EDGE_PASSWORD"))?,
            };
            let user = client.login(email, &password).await?;
            println!("✅ Logged in");
            print_json(&user)?;
        }
        Some("me") => {
            let user = client.me().await?;
            print_json(&user)?;
        }
        Some("whoami") => {
            // access tokens are not persisted; `me` refreshes one if needed
            client.me().await?;
            match client.claims() {
                Some(claims) => {
                    println!("subject: {}", claims.sub);
                    println!("email:   {}", claims.email.as_deref().unwrap_or("-"));
                    if let Some(exp) = claims.expires_at() {
                        println!("expires: {}", exp.to_rfc3339());
                    }
                }
                None => println!("Access token is opaque, no claims to show"),
            }
        }
        Some("get") => {
            let path = args.get(1).ok_or_else(|| anyhow!("get needs a path"))?;
            let body: Value = client.get_json(path).await?;
            print_json(&body)?;
        }
        Some("logout") => {
            client.logout().await?;
            println!("👋 Logged out");
        }
        _ => print_usage(),
    }

    Ok(())
}
