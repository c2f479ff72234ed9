use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;

use cpe_config_sync::domain::capability::CapabilityTable;

/// Inspect device capability headers
#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode an X-System-Supported-Docs value into the feature map
    Decode {
        /// Comma separated group tokens, e.g. "16777279,33554439"
        header: String,

        /// Print only the features that are enabled
        #[arg(long)]
        enabled_only: bool,
    },
    /// Encode a list of feature names into a capability bitmap
    Encode {
        #[arg(required = true)]
        features: Vec<String>,
    },
    /// List every known feature name
    Features,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let table = CapabilityTable::default();

    match cli.command {
        Command::Decode {
            header,
            enabled_only,
        } => {
            let bitmap = table
                .aggregate_bitmap(&header)
                .with_context(|| format!("invalid capability header: {}", header))?;
            println!("bitmap: {} (0x{:x})", bitmap, bitmap);
            for (name, enabled) in table.supported_feature_map(bitmap) {
                if enabled || !enabled_only {
                    println!("{:<20} {}", name, enabled);
                }
            }
        }
        Command::Encode { features } => {
            let mut requested = BTreeMap::new();
            for feature in features {
                if !table.is_known_feature(&feature) {
                    anyhow::bail!("unknown feature: {}", feature);
                }
                requested.insert(feature, true);
            }
            let bitmap = table.bitmap_from_feature_map(&requested);
            println!("{}", bitmap);
        }
        Command::Features => {
            for name in table.feature_names() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
