//! Source verification through an Etherscan-compatible block explorer API.

use {
    crate::{
        artifact::Artifacts,
        traits::{CodeFetching, VerificationOutcome, VerificationRequest, Verifier},
    },
    alloy::{
        primitives::{Address, Bytes},
        providers::Provider,
    },
    anyhow::{Context, Result},
    ethrpc::AlloyProvider,
    reqwest::{Client, Url},
    serde::Deserialize,
    std::{sync::Arc, time::Duration},
};

const USER_AGENT: &str = concat!("token-deployer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "the contract was compiled with solidity {compiled}, but the configured compiler version \
         is {configured}"
    )]
    CompilerVersionMismatch {
        compiled: String,
        configured: String,
    },
    #[error("the address {0} has no bytecode, is the contract deployed to this network?")]
    NoBytecode(Address),
    #[error("the explorer rejected the request: {0}")]
    Explorer(String),
    #[error("verification still pending after {0} status checks")]
    StillPending(u32),
}

/// Status polling of a submitted verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Polling {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: 20,
        }
    }
}

pub struct EtherscanVerifier {
    client: Client,
    api_url: Url,
    api_key: String,
    chain_id: u64,
    browser_url: Option<Url>,
    compiler_version: String,
    artifacts: Artifacts,
    code: Arc<dyn CodeFetching>,
    polling: Polling,
}

pub struct Settings {
    pub api_url: Url,
    pub api_key: String,
    pub chain_id: u64,
    pub browser_url: Option<Url>,
    /// Compiler version from the project configuration.
    pub compiler_version: String,
    pub http_timeout: Duration,
    pub polling: Polling,
}

impl EtherscanVerifier {
    pub fn new(
        settings: Settings,
        artifacts: Artifacts,
        code: Arc<dyn CodeFetching>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("build explorer HTTP client")?;
        Ok(Self {
            client,
            api_url: settings.api_url,
            api_key: settings.api_key,
            chain_id: settings.chain_id,
            browser_url: settings.browser_url,
            compiler_version: settings.compiler_version,
            artifacts,
            code,
            polling: settings.polling,
        })
    }

    /// Whether the explorer already has sources for `address`.
    async fn is_verified(&self, address: Address) -> Result<bool> {
        let response: Response<serde_json::Value> = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("chainid", self.chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "getsourcecode".to_string()),
                ("address", address.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !response.is_ok() {
            return Err(Error::Explorer(response.message_with_result()).into());
        }

        let sources: Vec<SourceCode> = serde_json::from_value(response.result)
            .context("unexpected getsourcecode result")?;
        Ok(sources
            .first()
            .is_some_and(|source| !source.source_code.is_empty()))
    }

    async fn submit(&self, form: &[(&str, String)]) -> Result<Submission> {
        let response: Response<String> = self
            .client
            .post(self.api_url.clone())
            .query(&[("chainid", self.chain_id.to_string())])
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if response.is_ok() {
            return Ok(Submission::Guid(response.result));
        }
        match Status::from_result(&response.result) {
            Status::AlreadyVerified => Ok(Submission::AlreadyVerified),
            _ => Err(Error::Explorer(response.message_with_result()).into()),
        }
    }

    async fn status(&self, guid: &str) -> Result<Status> {
        let response: Response<String> = self
            .client
            .get(self.api_url.clone())
            .query(&[
                ("chainid", self.chain_id.to_string()),
                ("module", "contract".to_string()),
                ("action", "checkverifystatus".to_string()),
                ("guid", guid.to_string()),
                ("apikey", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(Status::from_result(&response.result))
    }

    async fn poll(&self, guid: &str) -> Result<Status> {
        for attempt in 1..=self.polling.max_attempts {
            tokio::time::sleep(self.polling.interval).await;
            let status = self.status(guid).await?;
            tracing::debug!(guid, attempt, ?status, "verification status");
            if status != Status::Pending {
                return Ok(status);
            }
        }
        Err(Error::StillPending(self.polling.max_attempts).into())
    }

    fn contract_url(&self, address: Address) -> Option<String> {
        let mut base = self.browser_url.clone()?;
        // Without a trailing slash `join` replaces the last path segment.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let url = base.join(&format!("address/{address}#code")).ok()?;
        Some(url.to_string())
    }
}

#[async_trait::async_trait]
impl Verifier for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationOutcome> {
        let artifact = self.artifacts.read_artifact(&request.contract).await?;
        let build_info = self.artifacts.read_build_info(&artifact).await?;
        if build_info.solc_version != self.compiler_version {
            return Err(Error::CompilerVersionMismatch {
                compiled: build_info.solc_version,
                configured: self.compiler_version.clone(),
            }
            .into());
        }

        let code = self
            .code
            .code(request.address)
            .await
            .context("fetch deployed code")?;
        if code.is_empty() {
            return Err(Error::NoBytecode(request.address).into());
        }

        if self.is_verified(request.address).await? {
            tracing::info!(address = %request.address, "contract is already verified");
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        let constructor_args = artifact.encode_constructor_args(&request.constructor_arguments)?;
        let form = [
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", serde_json::to_string(&build_info.input)?),
            ("codeformat", "solidity-standard-json-input".to_string()),
            ("contractname", artifact.fully_qualified_name()),
            ("compilerversion", format!("v{}", build_info.solc_long_version)),
            // sic, the explorer API expects this spelling
            ("constructorArguements", const_hex::encode(constructor_args)),
        ];
        let guid = match self.submit(&form).await? {
            Submission::Guid(guid) => guid,
            Submission::AlreadyVerified => return Ok(VerificationOutcome::AlreadyVerified),
        };
        tracing::info!(
            contract = %artifact.fully_qualified_name(),
            guid,
            "submitted source code for verification"
        );

        match self.poll(&guid).await? {
            Status::Verified => Ok(VerificationOutcome::Verified {
                url: self.contract_url(request.address),
            }),
            Status::AlreadyVerified => Ok(VerificationOutcome::AlreadyVerified),
            Status::Pending => Err(Error::StillPending(self.polling.max_attempts).into()),
            Status::Failed(reason) => Err(Error::Explorer(reason).into()),
        }
    }
}

#[async_trait::async_trait]
impl CodeFetching for AlloyProvider {
    async fn code(&self, address: Address) -> Result<Bytes> {
        Ok(self.get_code_at(address).await?)
    }
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    status: String,
    message: String,
    result: T,
}

impl<T> Response<T> {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

impl Response<String> {
    fn message_with_result(&self) -> String {
        format!("{}: {}", self.message, self.result)
    }
}

impl Response<serde_json::Value> {
    fn message_with_result(&self) -> String {
        match &self.result {
            serde_json::Value::String(result) => format!("{}: {result}", self.message),
            result => format!("{}: {result}", self.message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceCode {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
}

enum Submission {
    Guid(String),
    AlreadyVerified,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Status {
    Pending,
    Verified,
    AlreadyVerified,
    Failed(String),
}

impl Status {
    fn from_result(result: &str) -> Self {
        match result {
            "Pending in queue" => Self::Pending,
            "Pass - Verified" => Self::Verified,
            result
                if result.starts_with("Contract source code already verified")
                    || result.starts_with("Already Verified") =>
            {
                Self::AlreadyVerified
            }
            result => Self::Failed(result.to_string()),
        }
    }
}
