//! ENS Resolver Module
//!
//! Resolves name-service recipients through an L1 JSON-RPC endpoint.

use crate::{ResolutionError, collaborators::NameResolver, config::L1Config};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;
use tracing::debug;

/// Name resolver backed by an L1 provider
///
/// Uses the ENS registry the provider's chain knows about.
pub struct EnsResolver {
    /// L1 JSON-RPC provider
    provider: Provider<Http>,
}

impl EnsResolver {
    /// Creates a resolver for the configured L1 endpoint
    ///
    /// # Arguments
    /// * `config` - L1 configuration (RPC endpoint)
    pub fn new(config: &L1Config) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())?;
        Ok(Self { provider })
    }
}

#[async_trait]
impl NameResolver for EnsResolver {
    async fn resolve_name(&self, name: &str) -> Result<Address, ResolutionError> {
        let error = |message: String| ResolutionError {
            name: name.to_string(),
            message,
        };

        let address = self
            .provider
            .resolve_name(name)
            .await
            .map_err(|e| error(e.to_string()))?;

        // An unset resolver record comes back as the zero address
        if address.is_zero() {
            return Err(error("no address record".to_string()));
        }

        debug!("ENS {} -> {:?}", name, address);
        Ok(address)
    }
}
