//! Trait definitions for external system boundaries.
//!
//! These traits abstract the node, the compiled artifacts and the block
//! explorer so the deployment procedure can be unit tested with mocks.

use {
    alloy::primitives::{Address, Bytes, TxHash},
    anyhow::Result,
};

/// Hands out deployable factories for named contract types.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContractFactories: Send + Sync {
    /// Resolves the contract by bare name (`Token`) or fully qualified name
    /// (`contracts/Token.sol:Token`).
    async fn get_contract_factory(&self, name: &str) -> Result<Box<dyn ContractFactory>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContractFactory: Send + Sync {
    /// Fully qualified name of the contract this factory deploys.
    fn fully_qualified_name(&self) -> String;

    /// Submits the contract creation transaction. Returns as soon as the node
    /// accepted the transaction, without waiting for it to be mined.
    async fn deploy(&self, constructor_args: &[String]) -> Result<Box<dyn PendingDeployment>>;
}

/// A submitted but not yet confirmed contract creation.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PendingDeployment: Send + Sync {
    /// Address the contract will live at once the transaction is mined.
    fn address(&self) -> Address;

    fn transaction_hash(&self) -> TxHash;

    /// Resolves once the creation transaction is confirmed and actually
    /// created the contract at [`PendingDeployment::address`].
    async fn wait_for_deployment(&self) -> Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationRequest {
    pub address: Address,
    /// Fully qualified contract name, e.g. `contracts/Token.sol:Token`.
    pub contract: String,
    pub constructor_arguments: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The explorer accepted the submitted sources. Carries the explorer page
    /// of the contract when a browser URL is configured.
    Verified { url: Option<String> },
    /// The explorer already had sources for this address.
    AlreadyVerified,
}

/// Submits contract sources to a block explorer.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationOutcome>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CodeFetching: Send + Sync {
    /// Fetches the runtime code at the specified address.
    async fn code(&self, address: Address) -> Result<Bytes>;
}
