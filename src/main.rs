use l2_transfer::{
    SenderAccount,
    api::Server,
    collaborators::Collaborators,
    config::Config,
    l1::EnsResolver,
    relayer::RelayerClient,
    signing::EcdsaTransferSigner,
    state::SnapshotStore,
    sync::SnapshotPoller,
    validation::TransferValidator,
};
use std::sync::Arc;
use tracing::{info, warn};

/// The main entry point for the transfer client.
///
/// This function:
/// 1. Initializes logging and loads the configuration
/// 2. Loads the signing key from the environment
/// 3. Builds the snapshot store, relayer client and ENS resolver
/// 4. Wires them into a transfer validator
/// 5. Fills the snapshot once, then keeps it fresh in the background
/// 6. Serves the JSON-RPC API
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging using tracing_subscriber.
    // This sets up a default formatter that prints logs to stdout.
    tracing_subscriber::fmt::init();

    // Load the application configuration from the TOML file.
    // The account's API key is redacted from this log line.
    let config = Config::load("config/default.toml")?;
    info!("Transfer client starting with config: {:?}", config);

    // The signing key never lives in the config file
    let signer = EcdsaTransferSigner::from_private_key(&config.signer_key()?)?;
    if signer.address() != config.account.address {
        warn!(
            "Signing key address {:?} does not match account {:?}",
            signer.address(),
            config.account.address
        );
    }

    // The store is shared by the validator (reads) and the poller (writes)
    let store = SnapshotStore::new();
    let relayer = RelayerClient::new(&config.relayer)?;
    let ens = EnsResolver::new(&config.l1)?;

    // The relayer client serves account lookup, submission and history
    let collaborators = Collaborators {
        tokens: Arc::new(store.clone()),
        fees: Arc::new(store.clone()),
        balances: Arc::new(store.clone()),
        accounts: Arc::new(relayer.clone()),
        names: Arc::new(ens),
        signer: Arc::new(signer),
        submitter: Arc::new(relayer.clone()),
        history: Some(Arc::new(relayer.clone())),
    };
    let validator = TransferValidator::new(
        config.validator.clone(),
        config.exchange.clone(),
        collaborators,
    );

    let sender = SenderAccount {
        address: config.account.address,
        account_id: config.account.account_id,
        api_key: config.account.api_key.clone(),
    };

    let poller = SnapshotPoller::new(
        relayer,
        store,
        validator.clone(),
        config.account.account_id,
        config.relayer.poll_interval_ms,
    );
    // Populate the snapshot once before serving; the poller retries on its own schedule
    if let Err(e) = poller.refresh().await {
        warn!("Initial snapshot refresh failed: {:?}", e);
    }
    tokio::spawn(async move {
        if let Err(e) = poller.start().await {
            tracing::error!("Snapshot poller error: {:?}", e);
        }
    });
    info!("Snapshot poller started");

    // Start the API server. Dialogs are opened by the presentation layer
    // through `transfer_open`; the `?` propagates bind failures.
    let server = Server::new(config.api.clone(), validator, sender);
    server.start().await?;

    Ok(())
}
