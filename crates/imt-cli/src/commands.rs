//! Command implementations.

use std::fs;
use std::path::Path;

use eyre::{Context as _, Result, ensure};
use imt::{BatchInsertionProof, IndexedMerkleTree, InsertionProof, MembershipProof};
use imt_core::field::{Fr, field_from_decimal};
use imt_core::hash::PoseidonHasher;
use serde::Deserialize;

use crate::cli::{CommonArgs, ProofKind};

/// One entry of the records file.
#[derive(Debug, Deserialize)]
struct RecordEntry {
    key: String,
    value: String,
}

fn load_records(path: &Path) -> Result<Vec<(Fr, Fr)>> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read records file {}", path.display()))?;
    let entries: Vec<RecordEntry> = serde_json::from_str(&text)
        .wrap_err("Records file is not a JSON array of key/value pairs")?;

    entries
        .iter()
        .map(|entry| {
            let key = field_from_decimal(&entry.key)
                .wrap_err_with(|| format!("Invalid key '{}'", entry.key))?;
            let value = field_from_decimal(&entry.value)
                .wrap_err_with(|| format!("Invalid value '{}'", entry.value))?;
            Ok((key, value))
        })
        .collect()
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).wrap_err("Failed to serialize proof")?;
    fs::write(path, json)
        .wrap_err_with(|| format!("Failed to write proof file {}", path.display()))
}

/// Build a tree from the records file and report its root.
pub fn build(config: &CommonArgs, batch_proof_output_file: Option<&Path>) -> Result<()> {
    let items = load_records(&config.records_file)?;
    let mut tree = IndexedMerkleTree::new(config.depth)?;

    if let Some(path) = batch_proof_output_file {
        let proof = tree.insert_batch_with_progress(&items, |done, total| {
            tracing::debug!(done, total, "batch insertion progress");
        })?;
        write_json(path, &proof)?;
        tracing::info!(proof = %path.display(), "batch transition proof written");
    } else {
        for (key, value) in items {
            tree.insert(key, value)?;
        }
    }

    tracing::info!(
        root = %tree.root(),
        records = tree.leaf_count(),
        depth = tree.depth(),
        "tree built"
    );
    Ok(())
}

/// Prove membership of a present key, or exclusion of an absent one.
pub fn prove(config: &CommonArgs, key: Fr, proof_output_file: &Path) -> Result<()> {
    let items = load_records(&config.records_file)?;
    let mut tree = IndexedMerkleTree::new(config.depth)?;
    for (record_key, value) in items {
        tree.insert(record_key, value)?;
    }

    let (proof, kind) = if tree.contains(key) {
        (tree.prove(key)?, "membership")
    } else {
        (tree.prove_exclusion(key)?, "exclusion")
    };
    write_json(proof_output_file, &proof)?;

    tracing::info!(
        kind,
        key = %key,
        root = %proof.root,
        proof = %proof_output_file.display(),
        "proof written"
    );
    Ok(())
}

/// Verify a proof file against the roots it carries.
pub fn verify(kind: ProofKind, proof_file: &Path) -> Result<()> {
    let text = fs::read_to_string(proof_file)
        .wrap_err_with(|| format!("Failed to read proof file {}", proof_file.display()))?;
    let hasher = PoseidonHasher;

    let valid = match kind {
        ProofKind::Membership => {
            let proof: MembershipProof =
                serde_json::from_str(&text).wrap_err("Proof file is not a membership proof")?;
            proof.verify(&hasher)
        }
        ProofKind::Insertion => {
            let proof: InsertionProof =
                serde_json::from_str(&text).wrap_err("Proof file is not an insertion proof")?;
            proof.verify(&hasher)
        }
        ProofKind::Batch => {
            let proof: BatchInsertionProof = serde_json::from_str(&text)
                .wrap_err("Proof file is not a batch insertion proof")?;
            proof.verify(&hasher)
        }
    };

    ensure!(valid, "proof failed verification");
    tracing::info!(proof = %proof_file.display(), "proof verified");
    Ok(())
}
