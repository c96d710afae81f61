//! Command-line interface for the indexed Merkle tree tool.

use std::path::PathBuf;

use clap::Parser;
use eyre::{Context as _, Result};
use imt_core::field::{Fr, field_from_decimal};

#[derive(Debug, Parser)]
#[command(name = "imt")]
#[command(about = "Indexed Merkle tree tool for building trees and producing proofs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Build a tree from a records file and print its root
    Build {
        #[command(flatten)]
        config: CommonArgs,
        /// Insert the records as one atomic batch and write its transition
        /// proof to this JSON file (otherwise records are inserted one by
        /// one)
        #[arg(long, env = "BATCH_PROOF_OUTPUT_FILE")]
        batch_proof_output_file: Option<PathBuf>,
    },
    /// Produce a membership proof for a present key, or an exclusion proof
    /// for an absent one
    Prove {
        #[command(flatten)]
        config: CommonArgs,
        /// Key to prove, as a decimal field element
        #[arg(short, long, env = "KEY", value_parser = parse_field)]
        key: Fr,
        /// Write the proof to this JSON file
        #[arg(long, env = "PROOF_OUTPUT_FILE", default_value = "proof.json")]
        proof_output_file: PathBuf,
    },
    /// Verify a proof file
    Verify {
        /// Kind of proof stored in the file
        #[arg(long, env = "PROOF_KIND", value_enum)]
        kind: ProofKind,
        /// Proof JSON file to check
        #[arg(long, env = "PROOF_FILE", default_value = "proof.json")]
        proof_file: PathBuf,
    },
}

#[derive(Debug, clap::Args)]
pub struct CommonArgs {
    /// Records file: a JSON array of `{"key": "...", "value": "..."}`
    /// decimal pairs
    #[arg(long, env = "RECORDS_FILE", default_value = "records.json")]
    pub records_file: PathBuf,

    /// Tree depth (fixed at creation; capacity is 2^depth records)
    #[arg(long, env = "TREE_DEPTH", default_value_t = 32)]
    pub depth: u8,
}

/// The proof flavors the `verify` command understands.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ProofKind {
    /// A Merkle opening of one record (also used for exclusion)
    Membership,
    /// A single-insertion transition proof
    Insertion,
    /// A batch-insertion transition proof
    Batch,
}

/// Parse a decimal string into a canonical field element.
fn parse_field(s: &str) -> Result<Fr> {
    field_from_decimal(s).wrap_err("Key must be a decimal field element below the modulus")
}
