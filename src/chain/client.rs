//! æternity node client with timeout and failover handling.
//!
//! # Responsibilities
//! - Query account state (balance, nonce, pending transactions)
//! - Build spend templates so callers can learn the fee
//! - Sign and broadcast transfers, then poll for inclusion
//! - Handle timeouts and network errors gracefully

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use url::Url;

use crate::chain::amount::{self, Amount};
use crate::chain::transaction::{self, SpendTx};
use crate::chain::types::{
    Address, ChainError, ChainResult, ConfirmationStatus, TransactionReceipt,
    TransactionTemplate, TxHash,
};
use crate::chain::wallet::Wallet;

/// Operations the sweep loop needs from the chain.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Spendable balance; an account the node has never seen holds zero.
    async fn get_balance(&self, address: &Address) -> ChainResult<Amount>;

    /// Number of transactions from `address` waiting in the mempool.
    async fn pending_transactions(&self, address: &Address) -> ChainResult<usize>;

    /// Builds (but never submits) a spend so its fee can be read.
    async fn build_unsigned_transfer(
        &self,
        sender: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> ChainResult<TransactionTemplate>;

    /// Reads the fee field of a template.
    fn extract_fee(&self, template: &TransactionTemplate) -> ChainResult<Amount> {
        SpendTx::from_template(template).map(|tx| tx.fee)
    }

    /// Signs a spend of `amount` with the registered key and broadcasts it.
    async fn submit_transfer(
        &self,
        amount: Amount,
        recipient: &Address,
    ) -> ChainResult<TransactionReceipt>;
}

/// Connection settings for [`NodeClient`].
#[derive(Debug, Clone)]
pub struct NodeClientConfig {
    pub node_url: String,
    pub failover_urls: Vec<String>,
    pub request_timeout_secs: u64,
    /// Relative TTL in key blocks; 0 submits spends without expiry.
    pub ttl_blocks: u64,
    /// How long to wait for inclusion after broadcast; 0 skips polling.
    pub confirm_timeout_secs: u64,
    pub confirm_poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    network_id: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(deserialize_with = "amount::deserialize_json_number")]
    balance: Amount,
}

#[derive(Debug, Deserialize)]
struct NextNonceResponse {
    next_nonce: u64,
}

#[derive(Debug, Deserialize)]
struct PendingResponse {
    transactions: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct HeightResponse {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct PostTxResponse {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct TxInfoResponse {
    block_height: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    reason: String,
}

/// HTTP client for an æternity node with failover support.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    /// Primary node first, then failovers.
    endpoints: Vec<Url>,
    config: NodeClientConfig,
    timeout_duration: Duration,
    wallet: Option<Wallet>,
    network_id: OnceCell<String>,
}

impl NodeClient {
    /// Creates a client. No request is made until the first call.
    pub fn new(config: NodeClientConfig) -> ChainResult<Self> {
        let mut endpoints = vec![parse_endpoint(&config.node_url)?];
        for url_str in &config.failover_urls {
            match parse_endpoint(url_str) {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover node URL"),
            }
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ChainError::Network(format!("HTTP client init failed: {}", e)))?;

        tracing::info!(
            node_url = %config.node_url,
            failovers = endpoints.len() - 1,
            "Node client initialized"
        );

        Ok(Self {
            http,
            endpoints,
            timeout_duration: Duration::from_secs(config.request_timeout_secs),
            config,
            wallet: None,
            network_id: OnceCell::new(),
        })
    }

    /// Registers the key used by [`ChainClient::submit_transfer`].
    pub fn with_wallet(mut self, wallet: Wallet) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn config(&self) -> &NodeClientConfig {
        &self.config
    }

    /// Network id reported by the node, fetched once.
    pub async fn network_id(&self) -> ChainResult<&str> {
        let id = self
            .network_id
            .get_or_try_init(|| async {
                let status: StatusResponse = self.get_required("v3/status").await?;
                tracing::info!(network_id = %status.network_id, "Connected to node");
                Ok::<_, ChainError>(status.network_id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Current key block height.
    pub async fn current_height(&self) -> ChainResult<u64> {
        let reply: HeightResponse = self.get_required("v3/key-blocks/current/height").await?;
        Ok(reply.height)
    }

    /// Block height of a transaction, `None` while it is still pending.
    pub async fn transaction_height(&self, tx_hash: &TxHash) -> ChainResult<Option<u64>> {
        let path = format!("v3/transactions/{}", tx_hash);
        let info: Option<TxInfoResponse> = self.request(Method::GET, &path, None).await?;
        Ok(info.and_then(|i| u64::try_from(i.block_height).ok()))
    }

    async fn account_balance(&self, address: &Address) -> ChainResult<Amount> {
        let path = format!("v3/accounts/{}", address);
        let account: Option<AccountResponse> = self.request(Method::GET, &path, None).await?;
        Ok(account.map_or(Amount::ZERO, |a| a.balance))
    }

    /// Nonce for the next transaction, counting ones still in the mempool.
    async fn next_nonce(&self, address: &Address) -> ChainResult<u64> {
        let path = format!("v3/accounts/{}/next-nonce", address);
        let reply: Option<NextNonceResponse> = self.request(Method::GET, &path, None).await?;
        Ok(reply.map_or(1, |r| r.next_nonce))
    }

    async fn ttl(&self) -> ChainResult<u64> {
        if self.config.ttl_blocks == 0 {
            return Ok(0);
        }
        Ok(self.current_height().await? + self.config.ttl_blocks)
    }

    async fn spend_for(
        &self,
        sender: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> ChainResult<SpendTx> {
        let nonce = self.next_nonce(sender).await?;
        let ttl = self.ttl().await?;
        Ok(SpendTx::new(sender.clone(), recipient.clone(), amount, ttl, nonce))
    }

    async fn broadcast(&self, encoded: &str) -> ChainResult<TxHash> {
        let body = serde_json::json!({ "tx": encoded });
        let reply: Option<PostTxResponse> =
            self.request(Method::POST, "v3/transactions", Some(&body)).await?;
        let reply = reply
            .ok_or_else(|| ChainError::Submission("node has no transaction endpoint".to_string()))?;
        TxHash::parse(&reply.tx_hash)
    }

    async fn get_required<T: DeserializeOwned>(&self, path: &str) -> ChainResult<T> {
        self.request(Method::GET, path, None)
            .await?
            .ok_or_else(|| ChainError::Network(format!("node returned 404 for {}", path)))
    }

    /// Sends one request, trying each endpoint in turn.
    ///
    /// 404 yields `Ok(None)`. Other 4xx replies are final; transport errors,
    /// timeouts and 5xx move on to the next endpoint.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> ChainResult<Option<T>> {
        let mut last_error = ChainError::Network("no node endpoints configured".to_string());

        for (i, base) in self.endpoints.iter().enumerate() {
            let url = base
                .join(path)
                .map_err(|e| ChainError::Network(format!("invalid request path '{}': {}", path, e)))?;
            let mut request = self.http.request(method.clone(), url);
            if let Some(body) = body {
                request = request.json(body);
            }
            let exchange = async {
                let response = request.send().await?;
                let status = response.status();
                let text = response.text().await?;
                Ok::<_, reqwest::Error>((status, text))
            };

            match timeout(self.timeout_duration, exchange).await {
                Ok(Ok((status, text))) if status.is_success() => {
                    return serde_json::from_str(&text).map(Some).map_err(|e| {
                        ChainError::Decode(format!("unexpected reply from {}: {}", path, e))
                    });
                }
                Ok(Ok((status, _))) if status == StatusCode::NOT_FOUND => return Ok(None),
                Ok(Ok((status, text))) if status.is_client_error() => {
                    let reason = error_reason(&text);
                    return Err(if method == Method::POST {
                        ChainError::Submission(reason)
                    } else {
                        ChainError::Network(format!("{} {}: {}", status, path, reason))
                    });
                }
                Ok(Ok((status, text))) => {
                    tracing::warn!(provider_idx = i, status = %status, path = path, "Node error, trying next endpoint");
                    last_error = ChainError::Network(format!("{} {}: {}", status, path, error_reason(&text)));
                }
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, error = %e, path = path, "Node request failed, trying next endpoint");
                    last_error = ChainError::Network(e.to_string());
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, path = path, "Node timeout, trying next endpoint");
                    last_error = ChainError::Timeout(self.config.request_timeout_secs);
                }
            }
        }

        Err(last_error)
    }
}

fn parse_endpoint(url_str: &str) -> ChainResult<Url> {
    let mut url: Url = url_str
        .parse()
        .map_err(|e| ChainError::Network(format!("Invalid node URL '{}': {}", url_str, e)))?;
    // Url::join drops the last segment unless the base ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn error_reason(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.reason)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl ChainClient for NodeClient {
    async fn get_balance(&self, address: &Address) -> ChainResult<Amount> {
        let balance = self.account_balance(address).await?;
        Ok(balance)
    }

    async fn pending_transactions(&self, address: &Address) -> ChainResult<usize> {
        let path = format!("v3/accounts/{}/transactions/pending", address);
        let reply: Option<PendingResponse> = self.request(Method::GET, &path, None).await?;
        Ok(reply.map_or(0, |r| r.transactions.len()))
    }

    async fn build_unsigned_transfer(
        &self,
        sender: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> ChainResult<TransactionTemplate> {
        Ok(self.spend_for(sender, recipient, amount).await?.to_template())
    }

    async fn submit_transfer(
        &self,
        amount: Amount,
        recipient: &Address,
    ) -> ChainResult<TransactionReceipt> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| ChainError::NotAvailable("no signing key registered".to_string()))?;

        let spend = self.spend_for(wallet.address(), recipient, amount).await?;
        let network_id = self.network_id().await?;
        let signed = transaction::sign_spend(wallet, network_id, spend)?;

        let tx_hash = self.broadcast(&signed.encoded).await?;
        if tx_hash != signed.hash {
            tracing::warn!(
                local = %signed.hash,
                node = %tx_hash,
                "Node reported a different transaction hash"
            );
        }
        tracing::info!(
            tx_hash = %tx_hash,
            nonce = signed.tx.nonce,
            fee = %signed.tx.fee,
            "Transfer broadcast"
        );

        let status = match transaction::wait_for_confirmation(
            self,
            &tx_hash,
            self.config.confirm_timeout_secs,
            Duration::from_millis(self.config.confirm_poll_interval_ms),
        )
        .await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(tx_hash = %tx_hash, error = %e, "Confirmation polling failed");
                ConfirmationStatus::Pending
            }
        };

        Ok(TransactionReceipt {
            tx_hash,
            recipient: recipient.clone(),
            amount: signed.tx.amount,
            fee: signed.tx.fee,
            nonce: signed.tx.nonce,
            status,
        })
    }
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("node_url", &self.config.node_url)
            .field("endpoints", &self.endpoints.len())
            .field("timeout_secs", &self.config.request_timeout_secs)
            .field("sender", &self.wallet.as_ref().map(|w| w.address().as_str()))
            .finish()
    }
}
