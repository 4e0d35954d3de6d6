use crate::{SignedTransfer, SigningError, TransferRequest, collaborators::TransferSigner};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tracing::debug;

/// Signs transfer requests with a local private key
pub struct EcdsaTransferSigner {
    wallet: LocalWallet,
}

impl EcdsaTransferSigner {
    /// Creates a signer from a hex-encoded private key (with or without `0x`)
    pub fn from_private_key(key: &str) -> Result<Self, SigningError> {
        let wallet = key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| SigningError(format!("invalid private key: {e}")))?;
        Ok(Self { wallet })
    }

    /// Address derived from the signing key
    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl TransferSigner for EcdsaTransferSigner {
    async fn sign(&self, request: &TransferRequest) -> Result<SignedTransfer, SigningError> {
        // The key must belong to the paying account
        if request.sender != self.wallet.address() {
            return Err(SigningError(format!(
                "signer {:?} cannot sign for {:?}",
                self.wallet.address(),
                request.sender
            )));
        }

        let hash = request.hash();
        let signature = self
            .wallet
            .sign_hash(hash)
            .map_err(|e| SigningError(e.to_string()))?;
        debug!("Signed transfer {:?} with nonce {}", hash, request.nonce);

        Ok(SignedTransfer {
            request: request.clone(),
            hash,
            signature,
        })
    }
}
