//! Startup wiring and a full block-to-transfer run against local mocks.

use std::io::Write;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use zeroize::Zeroizing;

use balance_sweeper::chain::encoding::{self, Alphabet, TX_PREFIX};
use balance_sweeper::chain::types::TxHash;
use balance_sweeper::chain::{Address, ValidationError, Wallet};
use balance_sweeper::lifecycle::startup::{self, StartupArgs, StartupError};
use balance_sweeper::lifecycle::Shutdown;
use balance_sweeper::listener::ListenerExit;

mod common;
use common::{
    address, key_block_frame, start_mock_node, start_ws_server, wait_until, RecordedRequest,
    PHRASE,
};

fn args(recipient: &str) -> StartupArgs {
    StartupArgs {
        network: "testnet".to_string(),
        mnemonic: Zeroizing::new(PHRASE.to_string()),
        recipient: recipient.to_string(),
        config_path: None,
        node_url: None,
        ws_url: None,
    }
}

fn sender_address() -> &'static str {
    static SENDER: OnceLock<String> = OnceLock::new();
    SENDER.get_or_init(|| Wallet::from_mnemonic(PHRASE, 0).unwrap().address().to_string())
}

fn node(request: RecordedRequest) -> (u16, String) {
    let path = request.path.as_str();
    if path == "/v3/status" {
        (200, r#"{"network_id":"ae_uat"}"#.to_string())
    } else if path.ends_with("/next-nonce") {
        (200, r#"{"next_nonce":1}"#.to_string())
    } else if path.ends_with("/transactions/pending") {
        (200, r#"{"transactions":[]}"#.to_string())
    } else if path.starts_with("/v3/accounts/") {
        if path.ends_with(sender_address()) {
            (200, r#"{"balance":1000000000000000000,"nonce":0}"#.to_string())
        } else {
            (404, r#"{"reason":"Account not found"}"#.to_string())
        }
    } else if path == "/v3/transactions" {
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        let tx = body["tx"].as_str().unwrap();
        let bytes = encoding::decode_prefixed(TX_PREFIX, tx, Alphabet::Base64).unwrap();
        let hash = TxHash::from_signed_tx(&bytes);
        (200, serde_json::json!({ "tx_hash": hash.as_str() }).to_string())
    } else {
        (404, "{}".to_string())
    }
}

#[test]
fn test_malformed_recipient_fails_before_any_connection() {
    let args = args("ak_1111");
    let config = startup::load_settings(&args).unwrap();
    let err = startup::prepare(config, &args).unwrap_err();
    assert!(matches!(
        err,
        StartupError::Validation(ValidationError::Address { .. })
    ));
}

#[test]
fn test_inputs_rejected_before_config_is_read() {
    // the config file does not exist, so reaching it would be a Config error
    let mut bad_recipient = args("ak_1111");
    bad_recipient.config_path = Some("/nonexistent/sweeper.toml".into());
    assert!(matches!(
        startup::check_inputs(&bad_recipient),
        Err(StartupError::Validation(ValidationError::Address { .. }))
    ));

    let mut bad_phrase = args(address(2).as_str());
    bad_phrase.config_path = Some("/nonexistent/sweeper.toml".into());
    bad_phrase.mnemonic = Zeroizing::new("abandon abandon".to_string());
    assert!(matches!(
        startup::check_inputs(&bad_phrase),
        Err(StartupError::Validation(ValidationError::Mnemonic(_)))
    ));
}

#[test]
fn test_config_file_with_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[network]
name = "mainnet"
node_url = "http://127.0.0.1:3013"
ttl_blocks = 50

[listener.reconnect]
max_attempts = 3
"#
    )
    .unwrap();

    let mut args = args(address(2).as_str());
    args.network = "testnet".to_string();
    args.config_path = Some(file.path().to_path_buf());
    args.ws_url = Some("ws://127.0.0.1:4000/mdw/websocket".to_string());

    let config = startup::load_settings(&args).unwrap();
    // the command line network wins over the file
    assert_eq!(config.network.name, "testnet");
    assert_eq!(config.network.node_url(), "http://127.0.0.1:3013");
    assert_eq!(config.network.ws_url(), "ws://127.0.0.1:4000/mdw/websocket");
    assert_eq!(config.network.ttl_blocks, 50);
    assert_eq!(config.listener.reconnect.max_attempts, 3);
}

#[test]
fn test_missing_config_file_is_an_error() {
    let mut args = args(address(2).as_str());
    args.config_path = Some("/nonexistent/sweeper.toml".into());
    assert!(matches!(
        startup::load_settings(&args),
        Err(StartupError::Config(_))
    ));
}

#[tokio::test]
async fn test_key_block_sweeps_to_recipient() {
    let (node_url, requests) = start_mock_node(|r| async move { node(r) }).await;
    let (ws_url, ws_log) = start_ws_server(vec![vec![
        r#"["KeyBlocks"]"#.to_string(),
        key_block_frame(500),
    ]])
    .await;

    let recipient: Address = address(2);
    let mut args = args(recipient.as_str());
    args.node_url = Some(node_url);
    args.ws_url = Some(ws_url);
    let mut config = startup::load_settings(&args).unwrap();
    config.network.confirm_timeout_secs = 0;
    config.listener.reconnect.enabled = false;

    let prepared = startup::prepare(config, &args).unwrap();
    let executor = Arc::new(startup::build_executor(&prepared).unwrap());
    let shutdown = Shutdown::new();

    let run = tokio::spawn({
        let config = prepared.config.clone();
        let shutdown = shutdown.clone();
        async move { startup::run_agent(&config, executor, &shutdown).await }
    });

    assert!(
        wait_until(|| requests
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.method == "POST"))
        .await
    );
    assert_eq!(ws_log.connections(), 1);

    shutdown.trigger();
    let exit = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, ListenerExit::Shutdown);

    // one transfer, and nothing read the recipient before the sender
    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.iter().filter(|r| r.method == "POST").count(), 1);
    let first_account = requests
        .iter()
        .find(|r| {
            r.path.starts_with("/v3/accounts/")
                && !r.path.ends_with("/pending")
                && !r.path.ends_with("/next-nonce")
        })
        .unwrap();
    assert!(first_account.path.ends_with(prepared.wallet.address().as_str()));
}
