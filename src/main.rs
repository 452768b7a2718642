use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pricebook::shared::config::{ConfigLoader, EngineConfig};
use pricebook::PricingService;

#[derive(Parser)]
#[command(name = "pricebook")]
#[command(version, about = "Marketplace price aggregation and conversion engine")]
struct Cli {
    /// Path to config file (defaults to Config.toml when present)
    #[arg(long)]
    config: Option<String>,

    /// Print raw JSON instead of formatted output
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the current canonical price for a product
    Price {
        /// Product identifier matched against the order-book metadata
        product_key: String,
    },

    /// Aggregate the rolling sales window for a product
    Stats {
        product_key: String,
    },

    /// Current price and sales window together
    Full {
        product_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pricebook=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let service = PricingService::new(&config);

    match cli.command {
        Commands::Price { product_key } => {
            let result = service.current_price(&product_key).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_price(&product_key, &result);
            }
        }
        Commands::Stats { product_key } => {
            let stats = service.sales_stats(&product_key).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&product_key, &stats);
            }
        }
        Commands::Full { product_key } => {
            let (result, stats) = service.full_quote(&product_key).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "price": result,
                        "sales": stats,
                    }))?
                );
            } else {
                print_price(&product_key, &result);
                println!();
                print_stats(&product_key, &stats);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(ConfigLoader::load_from(path)?),
        None => match ConfigLoader::load_config() {
            Ok(config) => Ok(config),
            Err(_) => {
                println!("ℹ️  No Config.toml found, using built-in defaults");
                Ok(EngineConfig::default())
            }
        },
    }
}

fn print_price(product_key: &str, result: &pricebook::PricingResult) {
    println!("💰 Current price for {}", product_key);
    match &result.prices {
        Some(prices) => {
            println!("  Coin:  {}", prices.coin);
            println!("  USD:   {}", prices.usd);
            println!("  Local: {}", prices.local);
            let metadata = result.source_metadata();
            if let Some(name) = metadata.get("name").and_then(|v| v.as_str()) {
                println!("  Item:  {}", name);
            }
            if let Some(rarity) = metadata.get("rarity").and_then(|v| v.as_str()) {
                println!("  Rarity: {}", rarity);
            }
            if let Some(address) = &result.derived_collection_address {
                println!("  Collection: {}", address);
            }
        }
        None => println!("  ⚠️  No sellable order found"),
    }
}

fn print_stats(product_key: &str, stats: &pricebook::SalesWindowStats) {
    println!("📈 Sales window for {} (ending {})", product_key, stats.window_end);
    println!("  Sales:     {}", stats.sales_count);
    println!("  Volume:    {}", stats.volume_local);
    println!("  Average:   {}", stats.avg_local);
    println!("  Last sale: {}", stats.last_sale_local);
    println!("  Change:    {}%", stats.pct_change);
}
