use {
    crate::traits::{ContractFactories, VerificationOutcome, VerificationRequest, Verifier},
    alloy::primitives::{Address, TxHash},
    anyhow::{Context, Result},
    std::sync::Arc,
};

pub struct DeployService {
    factories: Arc<dyn ContractFactories>,
    verifier: Option<Arc<dyn Verifier>>,
    contract: String,
    constructor_args: Vec<String>,
}

/// Result of a successful deployment.
#[derive(Debug, PartialEq, Eq)]
pub struct Deployed {
    pub address: Address,
    pub transaction_hash: TxHash,
    /// `None` if verification was skipped or failed.
    pub verification: Option<VerificationOutcome>,
}

impl DeployService {
    pub fn new(
        factories: Arc<dyn ContractFactories>,
        verifier: Option<Arc<dyn Verifier>>,
        contract: String,
        constructor_args: Vec<String>,
    ) -> Self {
        Self {
            factories,
            verifier,
            contract,
            constructor_args,
        }
    }

    /// Deploys the contract, waits for it to be mined and submits its
    /// sources for verification. Verification errors are logged and do not
    /// fail the deployment.
    pub async fn run(&self) -> Result<Deployed> {
        let factory = self
            .factories
            .get_contract_factory(&self.contract)
            .await
            .with_context(|| format!("get contract factory for {}", self.contract))?;

        tracing::info!(args = ?self.constructor_args, "starting deploying token...");
        let pending = factory
            .deploy(&self.constructor_args)
            .await
            .context("deploy contract")?;
        let address = pending.address();
        let transaction_hash = pending.transaction_hash();
        tracing::info!(?transaction_hash, "token deployed with address: {address}");

        tracing::info!("waiting for deployment...");
        pending
            .wait_for_deployment()
            .await
            .context("wait for deployment")?;

        let Some(verifier) = &self.verifier else {
            tracing::info!("source verification disabled");
            return Ok(Deployed {
                address,
                transaction_hash,
                verification: None,
            });
        };

        tracing::info!("starting verify token...");
        let request = VerificationRequest {
            address,
            contract: factory.fully_qualified_name(),
            constructor_arguments: self.constructor_args.clone(),
        };
        let verification = match verifier.verify(&request).await {
            Ok(outcome) => {
                match &outcome {
                    VerificationOutcome::Verified { url: Some(url) } => {
                        tracing::info!(%url, "verify success")
                    }
                    VerificationOutcome::Verified { url: None } => tracing::info!("verify success"),
                    VerificationOutcome::AlreadyVerified => {
                        tracing::info!("verify success, contract was already verified")
                    }
                }
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!("{err:#}");
                None
            }
        };

        Ok(Deployed {
            address,
            transaction_hash,
            verification,
        })
    }

    /// Runs the deployment and maps the result to a process exit status.
    pub async fn run_to_exit_code(&self) -> u8 {
        match self.run().await {
            Ok(_) => 0,
            Err(err) => {
                tracing::error!(?err, "deployment failed");
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::traits::{
            MockContractFactories,
            MockContractFactory,
            MockPendingDeployment,
            MockVerifier,
        },
        alloy::primitives::{address, b256},
        anyhow::anyhow,
        mockall::predicate::eq,
    };

    const TOKEN: Address = address!("0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d");
    const TX: TxHash = b256!("0x2a5b1d5a7a3b0f8b6f1f2b5c0c5e9ad0f1c4a5f0c4e0d6b3b8a0f2e1d2c3b4a5");

    fn pending(wait: Result<()>) -> MockPendingDeployment {
        let mut pending = MockPendingDeployment::new();
        pending.expect_address().return_const(TOKEN);
        pending.expect_transaction_hash().return_const(TX);
        pending
            .expect_wait_for_deployment()
            .times(1)
            .return_once(move || wait);
        pending
    }

    fn factories(wait: Result<()>) -> MockContractFactories {
        let mut factory = MockContractFactory::new();
        factory
            .expect_fully_qualified_name()
            .return_const("contracts/Token.sol:Token".to_string());
        factory
            .expect_deploy()
            .withf(|args| args == ["Vara", "VARA"])
            .times(1)
            .return_once(move |_| Ok(Box::new(pending(wait))));

        let mut factories = MockContractFactories::new();
        factories
            .expect_get_contract_factory()
            .with(eq("Token"))
            .times(1)
            .return_once(move |_| Ok(Box::new(factory)));
        factories
    }

    fn service(factories: MockContractFactories, verifier: Option<MockVerifier>) -> DeployService {
        DeployService::new(
            Arc::new(factories),
            verifier.map(|verifier| Arc::new(verifier) as Arc<dyn Verifier>),
            "Token".to_string(),
            vec!["Vara".to_string(), "VARA".to_string()],
        )
    }

    fn expected_request() -> VerificationRequest {
        VerificationRequest {
            address: TOKEN,
            contract: "contracts/Token.sol:Token".to_string(),
            constructor_arguments: vec!["Vara".to_string(), "VARA".to_string()],
        }
    }

    #[tokio::test]
    async fn deploys_and_verifies() {
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify()
            .with(eq(expected_request()))
            .times(1)
            .returning(|_| Ok(VerificationOutcome::Verified { url: None }));
        let service = service(factories(Ok(())), Some(verifier));

        let deployed = service.run().await.unwrap();

        assert_eq!(
            deployed,
            Deployed {
                address: TOKEN,
                transaction_hash: TX,
                verification: Some(VerificationOutcome::Verified { url: None }),
            }
        );
    }

    #[tokio::test]
    async fn successful_deployment_exits_with_zero() {
        let (_guard, logs) = observe::tracing::capture("token_deployer=info");
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify()
            .returning(|_| Ok(VerificationOutcome::AlreadyVerified));

        assert_eq!(
            service(factories(Ok(())), Some(verifier))
                .run_to_exit_code()
                .await,
            0
        );
        assert_eq!(logs.count(&format!("token deployed with address: {TOKEN}")), 1);
        assert_eq!(logs.count("token deployed with address"), 1);
        assert_eq!(logs.count("verify success"), 1);
        assert_eq!(logs.count("deployment failed"), 0);
    }

    #[tokio::test]
    async fn verification_failure_is_not_fatal() {
        let (_guard, logs) = observe::tracing::capture("token_deployer=info");
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify()
            .times(1)
            .returning(|_| Err(anyhow!("explorer unavailable")));

        let deployed = service(factories(Ok(())), Some(verifier))
            .run()
            .await
            .unwrap();

        assert_eq!(deployed.address, TOKEN);
        assert_eq!(deployed.verification, None);
        assert_eq!(logs.count("explorer unavailable"), 1);
        assert_eq!(logs.count("verify success"), 0);
    }

    #[tokio::test]
    async fn verification_failure_exits_with_zero() {
        let (_guard, logs) = observe::tracing::capture("token_deployer=info");
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify()
            .returning(|_| Err(anyhow!("explorer unavailable")));

        assert_eq!(
            service(factories(Ok(())), Some(verifier))
                .run_to_exit_code()
                .await,
            0
        );
        assert_eq!(logs.count("explorer unavailable"), 1);
        assert_eq!(logs.count("deployment failed"), 0);
    }

    #[tokio::test]
    async fn deploys_without_verifier() {
        let deployed = service(factories(Ok(())), None).run().await.unwrap();

        assert_eq!(deployed.verification, None);
    }

    #[tokio::test]
    async fn factory_failure_exits_with_one() {
        let (_guard, logs) = observe::tracing::capture("token_deployer=info");
        let mut factories = MockContractFactories::new();
        factories
            .expect_get_contract_factory()
            .returning(|_| Err(anyhow!("artifact not found")));
        let mut verifier = MockVerifier::new();
        verifier.expect_verify().never();

        let deployer = service(factories, Some(verifier));

        assert!(deployer.run().await.is_err());
        assert_eq!(deployer.run_to_exit_code().await, 1);
        assert_eq!(logs.count("deployment failed"), 1);
        assert!(logs.contents().contains("artifact not found"));
        assert_eq!(logs.count("token deployed with address"), 0);
    }

    #[tokio::test]
    async fn confirmation_failure_exits_with_one() {
        let (_guard, logs) = observe::tracing::capture("token_deployer=info");
        let mut verifier = MockVerifier::new();
        verifier.expect_verify().never();
        let deployer = service(factories(Err(anyhow!("transaction reverted"))), Some(verifier));

        assert_eq!(deployer.run_to_exit_code().await, 1);
        assert_eq!(logs.count("token deployed with address"), 1);
        assert_eq!(logs.count("deployment failed"), 1);
        assert!(logs.contents().contains("transaction reverted"));
        assert_eq!(logs.count("starting verify token"), 0);
    }

    #[tokio::test]
    async fn deploy_failure_exits_with_one() {
        let mut factory = MockContractFactory::new();
        factory
            .expect_deploy()
            .returning(|_| Err(anyhow!("insufficient funds")));
        let mut factories = MockContractFactories::new();
        factories
            .expect_get_contract_factory()
            .return_once(move |_| Ok(Box::new(factory)));

        assert_eq!(service(factories, None).run_to_exit_code().await, 1);
    }
}
