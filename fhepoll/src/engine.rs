use crate::*;

use async_trait::async_trait;
use ethers::types::{Address, Bytes};
use rand::RngCore;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// The external encryption engine seam.
///
/// An engine turns a plaintext 32-bit value into a ciphertext handle and an
/// input proof bound to a (contract, user) pair. Implementations perform any
/// one-time setup lazily on first use, so callers never initialize an engine
/// explicitly.
#[async_trait]
pub trait EncryptionEngine: Send + Sync {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<EncryptedBallot, Error>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayerKey {
    public_key_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayerProof {
    handles: Vec<String>,
    input_proof: String,
}

/// HTTP client for the relayer service that performs ciphertext generation.
pub struct RelayerEngine {
    http: reqwest::Client,
    base_url: String,
    key: OnceCell<RelayerKey>,
}

impl RelayerEngine {
    pub fn new(base_url: impl Into<String>) -> Self {
        RelayerEngine {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            key: OnceCell::new(),
        }
    }

    /// Fetch the relayer's public key material.
    ///
    /// Runs at most once per session; concurrent first callers wait on the
    /// same in-flight request rather than fetching twice.
    async fn key(&self) -> Result<&RelayerKey, Error> {
        self.key
            .get_or_try_init(|| async {
                let url = format!("{}/v1/keyurl", self.base_url);
                let resp = self
                    .http
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Error::NetworkError(e.to_string()))?
                    .error_for_status()
                    .map_err(|e| Error::EncryptionFailure(e.to_string()))?;
                resp.json::<RelayerKey>()
                    .await
                    .map_err(|e| Error::EncryptionFailure(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl EncryptionEngine for RelayerEngine {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> Result<EncryptedBallot, Error> {
        let key = self.key().await?;
        let url = format!("{}/v1/input-proof", self.base_url);
        let body = serde_json::json!({
            "keyId": key.public_key_id,
            "contractAddress": format!("{:#x}", contract),
            "userAddress": format!("{:#x}", user),
            "values": [{ "type": "uint32", "value": value }],
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::EncryptionFailure(e.to_string()))?;
        let proof: RelayerProof = resp
            .json()
            .await
            .map_err(|e| Error::EncryptionFailure(e.to_string()))?;

        let handle = proof
            .handles
            .first()
            .ok_or_else(|| Error::EncryptionFailure("relayer returned no ciphertext handle".into()))?;
        let handle = decode_handle(handle)?;
        let input_proof = hex::decode(proof.input_proof.trim_start_matches("0x"))
            .map_err(|e| Error::EncryptionFailure(format!("bad input proof hex: {}", e)))?;

        Ok(EncryptedBallot {
            handle,
            input_proof: Bytes::from(input_proof),
        })
    }
}

fn decode_handle(hex_str: &str) -> Result<[u8; 32], Error> {
    let bytes = hex::decode(hex_str.trim_start_matches("0x"))
        .map_err(|e| Error::EncryptionFailure(format!("bad handle hex: {}", e)))?;
    if bytes.len() != 32 {
        return Err(Error::EncryptionFailure(format!(
            "handle must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// In-memory engine for tests and local development.
///
/// Handles and proofs are randomized per call, so two encryptions of the same
/// value never collide. The proof embeds the (contract, user) pair it was
/// generated for, which [`MockEngine::proof_binds`] checks.
#[derive(Default)]
pub struct MockEngine {
    calls: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine::default()
    }

    /// Number of encryptions performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether a proof produced by this engine is bound to the given pair.
    pub fn proof_binds(proof: &[u8], contract: Address, user: Address) -> bool {
        proof.len() == 56
            && &proof[16..36] == contract.as_bytes()
            && &proof[36..56] == user.as_bytes()
    }
}

#[async_trait]
impl EncryptionEngine for MockEngine {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        _value: u32,
    ) -> Result<EncryptedBallot, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut handle = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut handle);

        let mut proof = vec![0u8; 16];
        rand::thread_rng().fill_bytes(&mut proof);
        proof.extend_from_slice(contract.as_bytes());
        proof.extend_from_slice(user.as_bytes());

        Ok(EncryptedBallot {
            handle,
            input_proof: Bytes::from(proof),
        })
    }
}
