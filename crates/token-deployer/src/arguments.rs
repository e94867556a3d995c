use {
    clap::Parser,
    std::{
        fmt::{self, Display, Formatter},
        path::PathBuf,
        time::Duration,
    },
    tracing::level_filters::LevelFilter,
    url::Url,
};

#[derive(Parser)]
#[clap(version, about = "Deploys a token contract and verifies its sources")]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// Path to the TOML project configuration (compiler version, networks,
    /// explorer). Built-in defaults are used when omitted.
    #[clap(long, env)]
    pub config: Option<PathBuf>,

    /// Name of the network from the configuration to deploy to.
    #[clap(long, env, default_value = "localhost")]
    pub network: String,

    /// The Ethereum node URL to connect to. Overrides the URL of the selected
    /// network.
    #[clap(long, env)]
    pub node_url: Option<Url>,

    /// Private key of the deployer account. Overrides the accounts of the
    /// selected network.
    #[clap(long, env)]
    pub private_key: Option<String>,

    /// Directory containing the compiled contract artifacts.
    #[clap(long, env, default_value = "artifacts")]
    pub artifacts: PathBuf,

    /// Bare or fully qualified name of the contract to deploy.
    #[clap(long, env, default_value = "Token")]
    pub contract: String,

    /// Constructor arguments, used both for the deployment and for the
    /// source verification. Arguments are separated by commas, so a single
    /// argument can not contain one.
    #[clap(long, env, value_delimiter = ',', default_value = "Vara,VARA")]
    pub constructor_args: Vec<String>,

    /// Number of confirmations to wait for. Overrides the value of the
    /// selected network, defaults to 1.
    #[clap(long, env, value_parser = clap::value_parser!(u64).range(1..))]
    pub confirmations: Option<u64>,

    /// Give up waiting for the deployment transaction after this long. Waits
    /// forever when omitted.
    #[clap(long, env, value_parser = humantime::parse_duration)]
    pub confirmation_timeout: Option<Duration>,

    /// Deploy without submitting the sources to the block explorer.
    #[clap(long, env)]
    pub skip_verify: bool,

    /// Block explorer API key. Overrides the key from the configuration.
    #[clap(long, env)]
    pub etherscan_api_key: Option<String>,

    /// Delay between two verification status checks.
    #[clap(
        long,
        env,
        default_value = "3s",
        value_parser = humantime::parse_duration,
    )]
    pub verify_poll_interval: Duration,

    /// How many times the verification status is checked before giving up.
    #[clap(long, env, default_value = "20")]
    pub verify_max_attempts: u32,

    /// Timeout for requests to the block explorer.
    #[clap(
        long,
        env,
        default_value = "30s",
        value_parser = humantime::parse_duration,
    )]
    pub http_timeout: Duration,
}

#[derive(Parser)]
#[group(skip)]
pub struct LoggingArguments {
    #[clap(
        long,
        env,
        default_value = "warn,token_deployer=debug,ethrpc=info,observe=info"
    )]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// Emit log lines as JSON objects.
    #[clap(long, env)]
    pub use_json_logs: bool,
}

impl LoggingArguments {
    pub fn observe_config(&self) -> observe::Config {
        observe::Config::new(
            &self.log_filter,
            self.log_stderr_threshold.into_level(),
            self.use_json_logs,
        )
    }
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
            use_json_logs,
        } = self;

        writeln!(f, "log_filter: {log_filter}")?;
        writeln!(f, "log_stderr_threshold: {log_stderr_threshold}")?;
        writeln!(f, "use_json_logs: {use_json_logs}")?;
        Ok(())
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            config,
            network,
            node_url,
            private_key,
            artifacts,
            contract,
            constructor_args,
            confirmations,
            confirmation_timeout,
            skip_verify,
            etherscan_api_key,
            verify_poll_interval,
            verify_max_attempts,
            http_timeout,
        } = self;

        write!(f, "{logging}")?;
        display_option(f, "config", &config.as_ref().map(|path| path.display()))?;
        writeln!(f, "network: {network}")?;
        display_option(f, "node_url", node_url)?;
        display_secret_option(f, "private_key", private_key)?;
        writeln!(f, "artifacts: {}", artifacts.display())?;
        writeln!(f, "contract: {contract}")?;
        writeln!(f, "constructor_args: {constructor_args:?}")?;
        display_option(f, "confirmations", confirmations)?;
        writeln!(f, "confirmation_timeout: {confirmation_timeout:?}")?;
        writeln!(f, "skip_verify: {skip_verify}")?;
        display_secret_option(f, "etherscan_api_key", etherscan_api_key)?;
        writeln!(f, "verify_poll_interval: {verify_poll_interval:?}")?;
        writeln!(f, "verify_max_attempts: {verify_max_attempts}")?;
        writeln!(f, "http_timeout: {http_timeout:?}")?;
        Ok(())
    }
}

pub fn display_secret_option<T>(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<T>,
) -> fmt::Result {
    display_option(f, name, &option.as_ref().map(|_| "SECRET"))
}

pub fn display_option(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<impl Display>,
) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}
