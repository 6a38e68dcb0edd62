//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use balance_sweeper::chain::encoding::{self, Alphabet, KEY_BLOCK_HASH_PREFIX};
use balance_sweeper::chain::transaction::SpendTx;
use balance_sweeper::chain::types::{
    ConfirmationStatus, TransactionReceipt, TransactionTemplate, TxHash,
};
use balance_sweeper::chain::{Address, Amount, ChainClient, ChainError, ChainResult};

pub const PHRASE: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub fn address(seed: u8) -> Address {
    Address::from_public_key([seed; 32])
}

pub fn key_block_frame(height: u64) -> String {
    let hash = encoding::encode_prefixed(
        KEY_BLOCK_HASH_PREFIX,
        &[(height % 251) as u8; 32],
        Alphabet::Base58,
    );
    serde_json::json!({
        "subscription": "KeyBlocks",
        "source": "node",
        "payload": { "height": height, "hash": hash }
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// In-memory chain
// ---------------------------------------------------------------------------

/// A transfer accepted by [`ScriptedChainClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub amount: Amount,
    pub recipient: Address,
}

/// Chain with one sender and fixed fee; submitted transfers debit the sender.
pub struct ScriptedChainClient {
    sender: Address,
    sender_balance: Mutex<Amount>,
    recipient_balance: Mutex<Amount>,
    fee: Amount,
    submissions: Mutex<Vec<Submission>>,
    balance_failures: Mutex<VecDeque<ChainError>>,
    reject_submissions: AtomicBool,
    fail_recipient_balance: AtomicBool,
    submit_delay: Mutex<Duration>,
    balance_calls: AtomicUsize,
}

impl ScriptedChainClient {
    pub fn new(sender: Address, balance: u64, fee: u64) -> Self {
        Self {
            sender,
            sender_balance: Mutex::new(Amount::from(balance)),
            recipient_balance: Mutex::new(Amount::ZERO),
            fee: Amount::from(fee),
            submissions: Mutex::new(Vec::new()),
            balance_failures: Mutex::new(VecDeque::new()),
            reject_submissions: AtomicBool::new(false),
            fail_recipient_balance: AtomicBool::new(false),
            submit_delay: Mutex::new(Duration::ZERO),
            balance_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_sender_balance(&self, balance: Amount) {
        *self.sender_balance.lock().unwrap() = balance;
    }

    pub fn credit_sender(&self, amount: u64) {
        let mut balance = self.sender_balance.lock().unwrap();
        *balance = balance.checked_add(Amount::from(amount)).unwrap();
    }

    pub fn fail_next_balance(&self, error: ChainError) {
        self.balance_failures.lock().unwrap().push_back(error);
    }

    pub fn reject_submissions(&self) {
        self.reject_submissions.store(true, Ordering::SeqCst);
    }

    /// Every read of an account other than the sender fails.
    pub fn fail_recipient_balance(&self) {
        self.fail_recipient_balance.store(true, Ordering::SeqCst);
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn sender_balance(&self) -> Amount {
        *self.sender_balance.lock().unwrap()
    }

    pub fn recipient_balance(&self) -> Amount {
        *self.recipient_balance.lock().unwrap()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for ScriptedChainClient {
    async fn get_balance(&self, address: &Address) -> ChainResult<Amount> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.balance_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        if address == &self.sender {
            Ok(self.sender_balance())
        } else if self.fail_recipient_balance.load(Ordering::SeqCst) {
            Err(ChainError::Network("503 v3/accounts: unavailable".to_string()))
        } else {
            Ok(self.recipient_balance())
        }
    }

    async fn pending_transactions(&self, _address: &Address) -> ChainResult<usize> {
        Ok(0)
    }

    async fn build_unsigned_transfer(
        &self,
        sender: &Address,
        recipient: &Address,
        amount: Amount,
    ) -> ChainResult<TransactionTemplate> {
        let mut tx = SpendTx::new(sender.clone(), recipient.clone(), amount, 0, 1);
        tx.fee = self.fee;
        Ok(tx.to_template())
    }

    async fn submit_transfer(
        &self,
        amount: Amount,
        recipient: &Address,
    ) -> ChainResult<TransactionReceipt> {
        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(ChainError::Submission("insufficient balance".to_string()));
        }

        let total = amount.checked_add(self.fee)?;
        {
            let mut balance = self.sender_balance.lock().unwrap();
            *balance = balance.checked_sub(total)?;
        }
        {
            let mut balance = self.recipient_balance.lock().unwrap();
            *balance = balance.checked_add(amount)?;
        }

        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(Submission {
            amount,
            recipient: recipient.clone(),
        });
        Ok(TransactionReceipt {
            tx_hash: TxHash::from_signed_tx(&(submissions.len() as u64).to_be_bytes()),
            recipient: recipient.clone(),
            amount,
            fee: self.fee,
            nonce: submissions.len() as u64,
            status: ConfirmationStatus::Mined { block_height: 1 },
        })
    }
}

// ---------------------------------------------------------------------------
// Middleware WebSocket
// ---------------------------------------------------------------------------

/// What the mock middleware saw.
#[derive(Default)]
pub struct WsServerLog {
    pub connections: AtomicUsize,
    pub received: Mutex<Vec<String>>,
}

impl WsServerLog {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

/// Starts a WebSocket server on an ephemeral port.
///
/// Connection `i` waits for one client frame, then gets `scripts[i]`. Every
/// connection but the last is closed after its script; the last one stays
/// open until the client leaves. Connections beyond the scripts are dropped
/// before the handshake.
pub async fn start_ws_server(scripts: Vec<Vec<String>>) -> (String, Arc<WsServerLog>) {
    start_ws_server_with(scripts, true).await
}

/// Like [`start_ws_server`] but every scripted connection is closed.
pub async fn start_closing_ws_server(scripts: Vec<Vec<String>>) -> (String, Arc<WsServerLog>) {
    start_ws_server_with(scripts, false).await
}

async fn start_ws_server_with(
    scripts: Vec<Vec<String>>,
    keep_last_open: bool,
) -> (String, Arc<WsServerLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = Arc::new(WsServerLog::default());
    let server_log = log.clone();

    tokio::spawn(async move {
        let total = scripts.len();
        let mut scripts = scripts.into_iter().enumerate();
        while let Ok((socket, _)) = listener.accept().await {
            server_log.connections.fetch_add(1, Ordering::SeqCst);
            let Some((index, script)) = scripts.next() else {
                drop(socket);
                continue;
            };
            let log = server_log.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                    return;
                };
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    log.received.lock().unwrap().push(text.as_str().to_string());
                }
                for frame in script {
                    if ws.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }
                if !keep_last_open || index + 1 < total {
                    let _ = ws.close(None).await;
                    return;
                }
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                }
            });
        }
    });

    (format!("ws://{}", addr), log)
}

// ---------------------------------------------------------------------------
// Node HTTP API
// ---------------------------------------------------------------------------

/// A request received by the mock node.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Starts a minimal HTTP/1.1 server answering every request with `handler`.
pub async fn start_mock_node<F, Fut>(handler: F) -> (String, Arc<Mutex<Vec<RecordedRequest>>>)
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = handler.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                recorded.lock().unwrap().push(request.clone());
                let (status, body) = handler(request).await;
                let status_text = match status {
                    200 => "200 OK",
                    400 => "400 Bad Request",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), requests)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buffer[header_end..]).to_string();

    Some(RecordedRequest { method, path, body })
}

/// Polls `condition` every 10ms for up to two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
