//! PicaFund browser front end.
//!
//! Rust + WASM shell around `pf-dapp-core`: binds the page, bridges the
//! injected wallet, and renders whatever the core reports.

pub mod dom;
pub mod ethereum;
pub mod events;
pub mod fetch;
pub mod logging;
pub mod render;
pub mod state;
pub mod storage;
pub mod toast;

use pf_dapp_core::{Dapp, DappConfig};
use pf_rpc_client::RpcClient;
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::prelude::*;

/// WASM entry point, called when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    logging::init();

    init().await
}

async fn init() -> Result<(), JsValue> {
    let els = dom::Elements::bind()?;
    let config = load_config();

    let provider = ethereum::Eip1193::detect().map(Rc::new);
    let wallet = provider.as_ref().map(|provider| {
        Rc::new(ethereum::InjectedWallet::new(
            Rc::clone(provider),
            config.contracts.clone(),
            config.event_poll_interval_ms,
        )) as Rc<dyn pf_contract_client::WalletProvider>
    });
    let read_only = config.public_rpc_url.as_ref().map(|endpoint| {
        Rc::new(RpcClient::new(
            fetch::FetchTransport::new(endpoint),
            config.contracts.clone(),
        )) as Rc<dyn pf_contract_client::ContractReader>
    });
    if wallet.is_none() {
        info!("no injected wallet found; running read-only");
    }

    let store = Rc::new(storage::LocalStorageFlagStore::new(&config.disconnect_flag_key));
    let (dapp, channels) = Dapp::new(config, wallet, read_only, store, Rc::new(dom::now_ms));
    let dapp = Rc::new(dapp);
    state::set_dapp(Rc::clone(&dapp));

    render::reset(&els);
    events::spawn_pumps(&els, channels);
    events::bind_events(&els);
    if let Some(provider) = provider {
        events::bind_wallet_signals(&provider);
    }

    dapp.init().await;
    Ok(())
}

/// Page-embedded `<script id="dappConfig" type="application/json">` block.
fn load_config() -> DappConfig {
    let Some(raw) = dom::by_id("dappConfig").and_then(|el| el.text_content()) else {
        return DappConfig::default();
    };
    DappConfig::from_json(&raw).unwrap_or_else(|err| {
        warn!(error = %err, "invalid dappConfig block; using defaults");
        DappConfig::default()
    })
}
