use crate::*;

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::info;

/// Connection settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    /// Hex-encoded signing key for the local wallet.
    pub private_key: String,
    /// When set, connecting to any other chain is an error.
    pub chain_id: Option<u64>,
    pub relayer_url: String,
}

impl SessionConfig {
    /// Read settings from `FHEPOLL_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let rpc_url = std::env::var("FHEPOLL_RPC_URL")
            .unwrap_or_else(|_| "http://localhost:8545".to_string());
        let contract_address = std::env::var("FHEPOLL_CONTRACT")
            .map_err(|_| Error::InvalidArgument("FHEPOLL_CONTRACT is not set".into()))?
            .parse::<Address>()
            .map_err(|e| Error::InvalidArgument(format!("bad contract address: {}", e)))?;
        let private_key = std::env::var("FHEPOLL_PRIVATE_KEY")
            .map_err(|_| Error::InvalidArgument("FHEPOLL_PRIVATE_KEY is not set".into()))?;
        let chain_id = std::env::var("FHEPOLL_CHAIN_ID").ok().and_then(|s| s.parse().ok());
        let relayer_url = std::env::var("FHEPOLL_RELAYER_URL")
            .unwrap_or_else(|_| "http://localhost:7077".to_string());

        Ok(SessionConfig {
            rpc_url,
            contract_address,
            private_key,
            chain_id,
            relayer_url,
        })
    }
}

/// A connected session: provider, signer, and the bound contract instance.
///
/// Write-once, read-many. All fields are immutable after connect, so the
/// session can be shared freely between operations. Two sessions against
/// different contracts or wallets can coexist in one process.
pub struct PollSession {
    client: Arc<ChainClient>,
    contract: PollContract,
    contract_address: Address,
    address: Address,
    chain_id: u64,
}

impl PollSession {
    pub async fn connect(config: &SessionConfig) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| Error::NetworkError(format!("bad rpc url: {}", e)))?;
        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))?
            .low_u64();
        if let Some(expected) = config.chain_id {
            if expected != chain_id {
                return Err(Error::NetworkError(format!(
                    "connected to chain {}, expected chain {}",
                    chain_id, expected
                )));
            }
        }

        let wallet = config
            .private_key
            .parse::<LocalWallet>()
            .map_err(|e| Error::WalletUnavailable(e.to_string()))?
            .with_chain_id(chain_id);
        let address = wallet.address();

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let contract = PrivatePolls::new(config.contract_address, client.clone());

        info!(%address, chain_id, contract = %config.contract_address, "session connected");
        Ok(PollSession {
            client,
            contract,
            contract_address: config.contract_address,
            address,
            chain_id,
        })
    }

    pub fn contract(&self) -> &PollContract {
        &self.contract
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Address of the connected wallet.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Current balance of the session wallet, in wei.
    pub async fn balance(&self) -> Result<U256, Error> {
        self.client
            .get_balance(self.address, None)
            .await
            .map_err(|e| Error::NetworkError(e.to_string()))
    }
}
