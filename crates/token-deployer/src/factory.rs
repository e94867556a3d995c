//! Contract factories backed by compiled artifacts and a signing provider.

use {
    crate::{
        artifact::{Artifact, Artifacts},
        traits::{ContractFactories, ContractFactory, PendingDeployment},
    },
    alloy::{
        network::TransactionBuilder,
        primitives::{Address, Bytes, TxHash},
        providers::{PendingTransactionBuilder, Provider},
        rpc::types::TransactionRequest,
    },
    anyhow::{Context, Result, bail, ensure},
    ethrpc::AlloyProvider,
    std::time::Duration,
};

/// How long to wait for a deployment transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Confirmation {
    /// Number of blocks including the one the transaction got mined in.
    pub confirmations: u64,
    pub timeout: Option<Duration>,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self {
            confirmations: 1,
            timeout: None,
        }
    }
}

pub struct ArtifactFactories {
    provider: AlloyProvider,
    deployer: Address,
    artifacts: Artifacts,
    confirmation: Confirmation,
}

impl ArtifactFactories {
    /// `provider` has to be able to sign transactions for `deployer`.
    pub fn new(
        provider: AlloyProvider,
        deployer: Address,
        artifacts: Artifacts,
        confirmation: Confirmation,
    ) -> Self {
        Self {
            provider,
            deployer,
            artifacts,
            confirmation,
        }
    }
}

#[async_trait::async_trait]
impl ContractFactories for ArtifactFactories {
    async fn get_contract_factory(&self, name: &str) -> Result<Box<dyn ContractFactory>> {
        let artifact = self.artifacts.read_artifact(name).await?;
        let bytecode = artifact.deployable_bytecode()?;
        tracing::debug!(
            contract = %artifact.fully_qualified_name(),
            bytecode_len = bytecode.len(),
            "loaded contract artifact"
        );
        Ok(Box::new(Factory {
            provider: self.provider.clone(),
            deployer: self.deployer,
            artifact,
            bytecode,
            confirmation: self.confirmation,
        }))
    }
}

struct Factory {
    provider: AlloyProvider,
    deployer: Address,
    artifact: Artifact,
    bytecode: Bytes,
    confirmation: Confirmation,
}

impl Factory {
    /// Creation code followed by the ABI-encoded constructor arguments.
    fn deployment_code(&self, constructor_args: &[String]) -> Result<Bytes> {
        let args = self.artifact.encode_constructor_args(constructor_args)?;
        Ok([self.bytecode.as_ref(), &args].concat().into())
    }
}

#[async_trait::async_trait]
impl ContractFactory for Factory {
    fn fully_qualified_name(&self) -> String {
        self.artifact.fully_qualified_name()
    }

    async fn deploy(&self, constructor_args: &[String]) -> Result<Box<dyn PendingDeployment>> {
        let code = self.deployment_code(constructor_args)?;
        let nonce = self
            .provider
            .get_transaction_count(self.deployer)
            .pending()
            .await
            .context("fetch deployer nonce")?;
        // The address only depends on the sender and its nonce so it is known
        // before the transaction is mined.
        let address = self.deployer.create(nonce);

        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_nonce(nonce)
            .with_deploy_code(code);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .context("submit deployment transaction")?;
        let transaction_hash = *pending.tx_hash();
        tracing::debug!(
            ?transaction_hash,
            nonce,
            deployer = ?self.deployer,
            "submitted deployment"
        );

        Ok(Box::new(Deployment {
            provider: self.provider.clone(),
            address,
            transaction_hash,
            confirmation: self.confirmation,
        }))
    }
}

struct Deployment {
    provider: AlloyProvider,
    address: Address,
    transaction_hash: TxHash,
    confirmation: Confirmation,
}

#[async_trait::async_trait]
impl PendingDeployment for Deployment {
    fn address(&self) -> Address {
        self.address
    }

    fn transaction_hash(&self) -> TxHash {
        self.transaction_hash
    }

    async fn wait_for_deployment(&self) -> Result<()> {
        let receipt =
            PendingTransactionBuilder::new(self.provider.root().clone(), self.transaction_hash)
                .with_required_confirmations(self.confirmation.confirmations)
                .with_timeout(self.confirmation.timeout)
                .get_receipt()
                .await
                .context("wait for deployment transaction")?;
        tracing::debug!(
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "deployment transaction mined"
        );

        ensure!(
            receipt.status(),
            "deployment transaction {:?} reverted",
            self.transaction_hash
        );
        match receipt.contract_address {
            Some(address) if address == self.address => Ok(()),
            Some(address) => bail!(
                "contract was created at {address} instead of the expected {}",
                self.address
            ),
            None => bail!(
                "transaction {:?} did not create a contract",
                self.transaction_hash
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::artifact::testing::*,
        alloy::{
            primitives::{U64, address, b256},
            providers::mock::Asserter,
            sol_types::SolValue,
        },
        serde_json::json,
    };

    const DEPLOYER: Address = address!("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0");
    const TX: TxHash = b256!("0x2a5b1d5a7a3b0f8b6f1f2b5c0c5e9ad0f1c4a5f0c4e0d6b3b8a0f2e1d2c3b4a5");

    fn factories(root: &std::path::Path, asserter: Asserter) -> ArtifactFactories {
        ArtifactFactories::new(
            ethrpc::alloy::mocked_provider(asserter),
            DEPLOYER,
            Artifacts::new(root),
            Confirmation::default(),
        )
    }

    fn deployment(asserter: Asserter, address: Address) -> Deployment {
        Deployment {
            provider: ethrpc::alloy::mocked_provider(asserter),
            address,
            transaction_hash: TX,
            confirmation: Confirmation {
                confirmations: 0,
                timeout: Some(Duration::from_secs(5)),
            },
        }
    }

    fn receipt(success: bool, contract_address: Option<Address>) -> serde_json::Value {
        json!({
            "type": "0x2",
            "status": if success { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0x5208",
            "logs": [],
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "transactionHash": TX,
            "transactionIndex": "0x0",
            "blockHash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": DEPLOYER,
            "to": null,
            "contractAddress": contract_address,
        })
    }

    /// Pushes the receipt for every lookup the confirmation wait may do.
    fn push_receipt(asserter: &Asserter, receipt: &serde_json::Value) {
        asserter.push_success(receipt);
        asserter.push_success(receipt);
    }

    #[tokio::test]
    async fn factory_for_known_contract() {
        let dir = tempfile::tempdir().unwrap();
        write_token_artifacts(dir.path());
        let factories = factories(dir.path(), Asserter::new());

        let factory = factories.get_contract_factory("Token").await.unwrap();

        assert_eq!(factory.fully_qualified_name(), "contracts/Token.sol:Token");
    }

    #[tokio::test]
    async fn factory_for_unknown_contract_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_token_artifacts(dir.path());
        let factories = factories(dir.path(), Asserter::new());

        assert!(factories.get_contract_factory("Bridge").await.is_err());
    }

    #[tokio::test]
    async fn deployment_code_appends_constructor_args() {
        let dir = tempfile::tempdir().unwrap();
        write_token_artifacts(dir.path());
        let artifact = Artifacts::new(dir.path()).read_artifact("Token").await.unwrap();
        let bytecode = artifact.deployable_bytecode().unwrap();
        let factory = Factory {
            provider: ethrpc::alloy::mocked_provider(Asserter::new()),
            deployer: Address::ZERO,
            artifact,
            bytecode: bytecode.clone(),
            confirmation: Confirmation::default(),
        };

        let code = factory
            .deployment_code(&["Vara".to_string(), "VARA".to_string()])
            .unwrap();

        let args = ("Vara".to_string(), "VARA".to_string()).abi_encode_params();
        assert_eq!(&code[..bytecode.len()], bytecode.as_ref());
        assert_eq!(&code[bytecode.len()..], args.as_slice());
        assert!(factory.deployment_code(&[]).is_err());
    }

    #[tokio::test]
    async fn deploy_fails_when_nonce_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        write_token_artifacts(dir.path());
        let asserter = Asserter::new();
        asserter.push_failure_msg("node unavailable");
        let factories = factories(dir.path(), asserter);

        let factory = factories.get_contract_factory("Token").await.unwrap();
        let result = factory
            .deploy(&["Vara".to_string(), "VARA".to_string()])
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn deploy_predicts_address_from_pending_nonce() {
        let dir = tempfile::tempdir().unwrap();
        write_token_artifacts(dir.path());
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(7));
        asserter.push_success(&TX);
        let factories = factories(dir.path(), asserter);

        let factory = factories.get_contract_factory("Token").await.unwrap();
        let pending = factory
            .deploy(&["Vara".to_string(), "VARA".to_string()])
            .await
            .unwrap();

        assert_eq!(pending.address(), DEPLOYER.create(7));
        assert_eq!(pending.transaction_hash(), TX);
    }

    #[tokio::test]
    async fn confirmed_deployment_at_expected_address() {
        let address = DEPLOYER.create(7);
        let asserter = Asserter::new();
        push_receipt(&asserter, &receipt(true, Some(address)));

        deployment(asserter, address)
            .wait_for_deployment()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reverted_deployment_fails() {
        let address = DEPLOYER.create(7);
        let asserter = Asserter::new();
        push_receipt(&asserter, &receipt(false, Some(address)));

        let err = deployment(asserter, address)
            .wait_for_deployment()
            .await
            .unwrap_err();

        assert!(err.to_string().contains("reverted"), "{err:?}");
    }

    #[tokio::test]
    async fn deployment_at_unexpected_address_fails() {
        let address = DEPLOYER.create(7);
        let asserter = Asserter::new();
        push_receipt(&asserter, &receipt(true, Some(DEPLOYER.create(8))));

        let err = deployment(asserter, address)
            .wait_for_deployment()
            .await
            .unwrap_err();

        assert!(
            err.to_string().contains("instead of the expected"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn transaction_without_created_contract_fails() {
        let address = DEPLOYER.create(7);
        let asserter = Asserter::new();
        push_receipt(&asserter, &receipt(true, None));

        let err = deployment(asserter, address)
            .wait_for_deployment()
            .await
            .unwrap_err();

        assert!(
            err.to_string().contains("did not create a contract"),
            "{err:?}"
        );
    }
}
