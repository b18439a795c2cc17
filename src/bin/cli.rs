//! Sensorcast CLI
//!
//! Command-line client for a running Sensorcast server:
//! - Post readings (e.g. from a device simulator)
//! - Show history and the latest reading
//! - Print a default config file

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sensorcast::config::generate_default_config;
use sensorcast::storage::Reading;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensorcast-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Client for the Sensorcast reading server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:3000", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Post a reading
    Post {
        /// Temperature in °C
        #[arg(allow_negative_numbers = true)]
        temperature: f64,
        /// Relative humidity in %
        humidity: f64,
    },

    /// Show recent readings, newest first
    Recent {
        /// Number of readings
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the latest reading
    Latest,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.api_url.trim_end_matches('/');

    match cli.command {
        Commands::Post {
            temperature,
            humidity,
        } => {
            let response = client
                .post(format!("{}/api/readings", base))
                .json(&json!({ "temperature": temperature, "humidity": humidity }))
                .send()
                .await
                .context("Failed to reach server")?;

            let reading: Reading = parse_response(response).await?;
            print_readings(&cli.format, &[reading])?;
        }

        Commands::Recent { limit } => {
            let response = client
                .get(format!("{}/api/readings", base))
                .query(&[("limit", limit)])
                .send()
                .await
                .context("Failed to reach server")?;

            let readings: Vec<Reading> = parse_response(response).await?;
            if readings.is_empty() && cli.format != "json" {
                println!("No readings yet");
            } else {
                print_readings(&cli.format, &readings)?;
            }
        }

        Commands::Latest => {
            let response = client
                .get(format!("{}/api/readings/latest", base))
                .send()
                .await
                .context("Failed to reach server")?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                println!("No readings yet");
                return Ok(());
            }
            let reading: Reading = parse_response(response).await?;
            print_readings(&cli.format, &[reading])?;
        }

        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Decode a successful response, or turn the server's error body into an error
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> anyhow::Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body["error"]["message"]
            .as_str()
            .unwrap_or("no error details")
            .to_string();
        bail!("Server returned {}: {}", status, message);
    }
    Ok(response.json().await?)
}

fn print_readings(format: &str, readings: &[Reading]) -> anyhow::Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(readings)?),
        _ => {
            println!(
                "{:>6}  {:>8}  {:>8}  {}",
                "ID", "TEMP °C", "HUM %", "CREATED AT"
            );
            for r in readings {
                println!(
                    "{:>6}  {:>8.1}  {:>8.1}  {}",
                    r.id, r.temperature, r.humidity, r.created_at
                );
            }
        }
    }
    Ok(())
}
