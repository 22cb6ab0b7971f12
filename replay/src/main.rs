//! Replay recorded block submissions through the grader offline.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use oprgrade_common::block::GradedBlock;
use oprgrade_common::difficulty::Sha256Hash;
use oprgrade_common::grader::BlockGrader;
use oprgrade_common::{AssetRegistry, GraderVersion, Record};
use rayon::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Submission files to grade, one height each
    #[arg(required = true)]
    submissions: Vec<PathBuf>,

    /// JSON array of asset identifiers in price-slot order
    #[arg(short, long, env = "OPRGRADE_ASSETS")]
    assets: PathBuf,

    /// Grader version to use when a file does not name one
    #[arg(long, value_enum, default_value = "v1", env = "OPRGRADE_VERSION")]
    grader: GraderVersion,

    /// Grade in parallel with this many threads
    #[arg(short, long, default_value_t = 4, env = "OPRGRADE_THREADS")]
    threads: usize,

    /// Print each graded block as JSON
    #[arg(short, long, env = "OPRGRADE_JSON")]
    json: bool,
}

/// One height's submissions as recorded by the intake layer.
#[derive(Debug, Deserialize)]
struct BlockSubmissions {
    height: i32,
    #[serde(default)]
    version: Option<u8>,
    #[serde(default)]
    previous_winners: Vec<String>,
    records: Vec<Record>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Could not parse {}", path.display()))
}

/// Grade one height. The file's version wins over the command line default.
fn replay_block(
    submissions: BlockSubmissions,
    registry: &AssetRegistry,
    default_version: GraderVersion,
) -> Result<GradedBlock> {
    let mut grader = match submissions.version {
        Some(version) => BlockGrader::new(
            version,
            submissions.height,
            submissions.previous_winners,
            registry.clone(),
        )
        .with_context(|| format!("Height {}", submissions.height))?,
        None => BlockGrader::for_version(
            default_version,
            submissions.height,
            submissions.previous_winners,
            registry.clone(),
            Sha256Hash,
        ),
    };

    let mismatched = submissions
        .records
        .iter()
        .filter(|r| !grader.verify_prior_winners(r))
        .count();
    if mismatched > 0 {
        warn!(
            "Height {}: {} submissions reference the wrong previous winners",
            submissions.height, mismatched
        );
    }

    grader.add_records(submissions.records)?;
    Ok(grader.grade().clone())
}

fn print_summary(block: &GradedBlock) {
    if block.empty {
        println!(
            "Height {} ({}): no winners, {} unique and {} honest submissions",
            block.height, block.version, block.unique_count, block.honest_count
        );
        return;
    }
    println!(
        "Height {} ({}): {} honest submissions, {} graded",
        block.height,
        block.version,
        block.honest_count,
        block.graded.len()
    );
    for (payout, winner) in block.payouts().iter().zip(&block.winners) {
        println!(
            "  #{:<2} {}  grade {:.6e}  reward {}",
            payout.rank, payout.short_hash, winner.grade, payout.reward
        );
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logger
    env_logger::init();

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads)
        .build_global()
        .context("Could not start the thread pool")?;

    let registry: AssetRegistry = read_json(&cli.assets)?;
    info!("Loaded {} assets", registry.len());

    // Heights share nothing, so each file is graded on its own
    let blocks: Vec<GradedBlock> = cli
        .submissions
        .par_iter()
        .map(|path| {
            let submissions: BlockSubmissions = read_json(path)?;
            replay_block(submissions, &registry, cli.grader)
        })
        .collect::<Result<_>>()?;

    for block in &blocks {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(block)?);
        } else {
            print_summary(block);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> AssetRegistry {
        serde_json::from_str(r#"["USD", "XAU"]"#).unwrap()
    }

    fn submissions(version: Option<u8>, count: usize) -> BlockSubmissions {
        // Records do not claim a real SHA-256 difficulty, so none are honest
        let records = (0..count)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "nonce": format!("{i:02x}"),
                    "record_hash": "00",
                    "claimed_difficulty": 1,
                    "prices": [1.0, 100.0],
                    "entry_id": format!("{i:02x}"),
                }))
                .unwrap()
            })
            .collect();
        BlockSubmissions {
            height: 3,
            version,
            previous_winners: vec![],
            records,
        }
    }

    #[test]
    fn test_parse_block_submissions() {
        let parsed: BlockSubmissions = serde_json::from_str(
            r#"{"height": 9, "records": [
                {"nonce": "01", "record_hash": "02", "claimed_difficulty": 3,
                 "prices": [1.0, 2.0], "entry_id": "04"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.height, 9);
        assert_eq!(parsed.version, None);
        assert!(parsed.previous_winners.is_empty());
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_replay_uses_file_version() {
        let block = replay_block(submissions(Some(2), 12), &registry(), GraderVersion::V1).unwrap();
        assert_eq!(block.version, GraderVersion::V2);
        assert_eq!(block.height, 3);
        assert!(block.empty);
        assert_eq!(block.unique_count, 12);
        assert_eq!(block.honest_count, 0);
    }

    #[test]
    fn test_replay_falls_back_to_default_version() {
        let block = replay_block(submissions(None, 12), &registry(), GraderVersion::V1).unwrap();
        assert_eq!(block.version, GraderVersion::V1);
    }

    #[test]
    fn test_replay_rejects_unknown_version() {
        assert!(replay_block(submissions(Some(9), 12), &registry(), GraderVersion::V1).is_err());
    }
}
