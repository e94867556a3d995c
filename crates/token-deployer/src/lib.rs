pub mod arguments;
pub mod artifact;
pub mod config;
pub mod deploy_service;
pub mod factory;
pub mod traits;
pub mod verify;

use {
    crate::{
        artifact::Artifacts,
        config::Config,
        deploy_service::DeployService,
        factory::{ArtifactFactories, Confirmation},
        traits::Verifier,
        verify::{EtherscanVerifier, Polling, Settings},
    },
    alloy::{providers::Provider, signers::local::PrivateKeySigner},
    anyhow::{Context, Result, anyhow, ensure},
    std::sync::Arc,
};

/// Runs the deployment and returns the process exit status.
pub async fn main(args: arguments::Arguments) -> u8 {
    match build(&args).await {
        Ok(service) => service.run_to_exit_code().await,
        Err(err) => {
            tracing::error!(?err, "failed to set up deployment");
            1
        }
    }
}

async fn build(args: &arguments::Arguments) -> Result<DeployService> {
    let config = match &args.config {
        Some(path) => config::load(path).await?,
        None => Config::default(),
    };
    let network = config.network(&args.network);
    let node_url = match (&args.node_url, network) {
        (Some(url), _) => url.clone(),
        (None, Some(network)) => network.url.clone(),
        (None, None) => {
            return Err(anyhow!(
                "network {:?} is not configured and no node URL was given",
                args.network
            ));
        }
    };

    let private_key = args
        .private_key
        .clone()
        .or_else(|| {
            network
                .and_then(|network| network.accounts.first())
                .map(|key| key.0.clone())
        })
        .context("no deployer account configured")?;
    let signer: PrivateKeySigner = private_key
        .parse()
        .map_err(|_| anyhow!("invalid deployer private key"))?;
    let deployer = signer.address();

    let provider = ethrpc::alloy::provider_with_signer(&node_url, "deployer", signer);
    let chain_id = provider
        .get_chain_id()
        .await
        .context("fetch chain ID from node")?;
    if let Some(expected) = network.and_then(|network| network.chain_id) {
        ensure!(
            chain_id == expected,
            "node is on chain {chain_id}, but network {:?} is configured for chain {expected}",
            args.network
        );
    }
    tracing::info!(network = %args.network, chain_id, ?deployer, "connected to node");

    let artifacts = Artifacts::new(&args.artifacts);
    let confirmation = Confirmation {
        confirmations: args
            .confirmations
            .or_else(|| network.and_then(|network| network.confirmations))
            .unwrap_or(1),
        timeout: args.confirmation_timeout,
    };
    let factories = ArtifactFactories::new(provider, deployer, artifacts.clone(), confirmation);

    let verifier = verifier(args, &config, &node_url, chain_id, artifacts)?;

    Ok(DeployService::new(
        Arc::new(factories),
        verifier,
        args.contract.clone(),
        args.constructor_args.clone(),
    ))
}

fn verifier(
    args: &arguments::Arguments,
    config: &Config,
    node_url: &url::Url,
    chain_id: u64,
    artifacts: Artifacts,
) -> Result<Option<Arc<dyn Verifier>>> {
    if args.skip_verify {
        return Ok(None);
    }
    let Some(api_key) = args
        .etherscan_api_key
        .clone()
        .or_else(|| config.etherscan.api_key.clone())
    else {
        tracing::warn!("no block explorer API key configured, skipping source verification");
        return Ok(None);
    };

    let verifier = EtherscanVerifier::new(
        Settings {
            api_url: config.etherscan.api_url.clone(),
            api_key,
            chain_id,
            browser_url: config.etherscan.browser_url.clone(),
            compiler_version: config.solidity_version().to_string(),
            http_timeout: args.http_timeout,
            polling: Polling {
                interval: args.verify_poll_interval,
                max_attempts: args.verify_max_attempts,
            },
        },
        artifacts,
        Arc::new(ethrpc::alloy::provider(node_url, "verifier")),
    )?;
    Ok(Some(Arc::new(verifier)))
}

#[cfg(test)]
mod tests {
    use {super::*, clap::Parser};

    #[tokio::test]
    async fn unknown_network_without_node_url_fails_setup() {
        let args = arguments::Arguments::try_parse_from([
            "token-deployer",
            "--network",
            "sepolia",
            "--private-key",
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ])
        .unwrap();

        assert_eq!(main(args).await, 1);
    }

    #[tokio::test]
    async fn missing_account_fails_setup() {
        let args = arguments::Arguments::try_parse_from(["token-deployer"]).unwrap();

        let err = build(&args).await.err().unwrap();
        assert!(err.to_string().contains("no deployer account"));
    }

    #[tokio::test]
    async fn invalid_private_key_fails_setup() {
        let args =
            arguments::Arguments::try_parse_from(["token-deployer", "--private-key", "0x1234"])
                .unwrap();

        let err = build(&args).await.err().unwrap();
        assert_eq!(err.to_string(), "invalid deployer private key");
    }

    #[test]
    fn verification_is_skipped_without_api_key() {
        let args = arguments::Arguments::try_parse_from(["token-deployer"]).unwrap();
        let node_url = "http://localhost:8545".parse().unwrap();

        let verifier =
            verifier(&args, &Config::default(), &node_url, 1, Artifacts::new("artifacts")).unwrap();

        assert!(verifier.is_none());
    }

    #[tokio::test]
    async fn verification_can_be_skipped() {
        let args = arguments::Arguments::try_parse_from([
            "token-deployer",
            "--skip-verify",
            "--etherscan-api-key",
            "ABC123",
        ])
        .unwrap();
        let node_url = "http://localhost:8545".parse().unwrap();

        let skipped =
            verifier(&args, &Config::default(), &node_url, 1, Artifacts::new("artifacts")).unwrap();
        assert!(skipped.is_none());

        let args = arguments::Arguments::try_parse_from([
            "token-deployer",
            "--etherscan-api-key",
            "ABC123",
        ])
        .unwrap();
        let enabled =
            verifier(&args, &Config::default(), &node_url, 1, Artifacts::new("artifacts")).unwrap();
        assert!(enabled.is_some());
    }
}
