mod instrumentation;

use {
    crate::AlloyProvider,
    alloy::{
        network::{EthereumWallet, TxSigner},
        primitives::Signature,
        providers::{Provider, ProviderBuilder},
        rpc::client::ClientBuilder,
    },
    instrumentation::{InstrumentationLayer, LabelingLayer},
    url::Url,
};

#[cfg(any(test, feature = "test-util"))]
use alloy::providers::mock;

/// Creates a read-only provider whose requests are tagged with `label` in the
/// RPC logs.
pub fn provider(url: &Url, label: &str) -> AlloyProvider {
    let rpc = ClientBuilder::default()
        .layer(LabelingLayer {
            label: label.into(),
        })
        .layer(InstrumentationLayer)
        .http(url.clone());
    ProviderBuilder::new().connect_client(rpc).erased()
}

/// Creates a provider that fills and signs transactions with `signer` before
/// sending them.
pub fn provider_with_signer<S>(url: &Url, label: &str, signer: S) -> AlloyProvider
where
    S: TxSigner<Signature> + Send + Sync + 'static,
{
    let rpc = ClientBuilder::default()
        .layer(LabelingLayer {
            label: label.into(),
        })
        .layer(InstrumentationLayer)
        .http(url.clone());
    let wallet = EthereumWallet::new(signer);

    ProviderBuilder::new()
        .wallet(wallet)
        .connect_client(rpc)
        .erased()
}

#[cfg(any(test, feature = "test-util"))]
/// Provider backed by an [`mock::Asserter`] instead of a node. Responses have
/// to be pushed onto the asserter in the order the requests are made.
///
/// Transactions are sent as they are, without gas, nonce or chain id
/// filling, so every provider call maps to exactly one JSON-RPC request.
pub fn mocked_provider(asserter: mock::Asserter) -> AlloyProvider {
    ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_mocked_client(asserter)
        .erased()
}
