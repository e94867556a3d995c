use {clap::Parser, std::process::ExitCode};

#[tokio::main]
async fn main() -> ExitCode {
    let args = token_deployer::arguments::Arguments::parse();
    observe::tracing::initialize(&args.logging.observe_config());
    tracing::info!("running token deployer with validated arguments:\n{}", args);
    ExitCode::from(token_deployer::main(args).await)
}
