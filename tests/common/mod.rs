#![allow(clippy::unwrap_used, dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};
use lnurld::core::services::DollarRate;
use lnurld::core::{
    Collaborators, FlowSettings, Ledger, LedgerEntry, LnurlCore, MakeInvoiceArgs,
    MemoryReplyCache, Notification, Notifier, Wallet,
};
use lnurld::events::EventBus;
use lnurld::lnurl::{Invoice, LnurlClient};
use lnurld::types::{MessageId, UserId};

pub const SERVER_SECRET: &str = "integration-test-secret";
pub const CLEARING_ACCOUNT: &str = "lightning.proxy";
pub const USER: UserId = 42;

/// First message id handed out by the recording notifier
pub const FIRST_MESSAGE_ID: MessageId = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub user: UserId,
    pub notification: Notification,
    pub reply_to: Option<MessageId>,
    pub message_id: MessageId,
}

/// Chat transport double: records every notification and numbers them
pub struct RecordingNotifier {
    next_id: AtomicI64,
    sent: Mutex<Vec<Sent>>,
    retracted: Mutex<Vec<MessageId>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(FIRST_MESSAGE_ID),
            sent: Mutex::new(Vec::new()),
            retracted: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.sent()
            .iter()
            .map(|sent| sent.notification.kind())
            .collect()
    }

    pub fn retracted(&self) -> Vec<MessageId> {
        self.retracted.lock().unwrap().clone()
    }

    pub fn find(&self, kind: &str) -> Option<Sent> {
        self.sent()
            .into_iter()
            .find(|sent| sent.notification.kind() == kind)
    }

    /// Poll until a notification of `kind` shows up; confirmation runs in a
    /// background task
    pub async fn wait_for(&self, kind: &str) -> Sent {
        for _ in 0..200 {
            if let Some(sent) = self.find(kind) {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no '{}' notification, got {:?}", kind, self.kinds());
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user: UserId,
        notification: Notification,
        reply_to: Option<MessageId>,
    ) -> anyhow::Result<Option<MessageId>> {
        let message_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(Sent {
            user,
            notification,
            reply_to,
            message_id,
        });
        Ok(Some(message_id))
    }

    async fn retract(&self, _user: UserId, message_id: MessageId) -> anyhow::Result<()> {
        self.retracted.lock().unwrap().push(message_id);
        Ok(())
    }
}

/// Wallet double. Payments are accepted and reported in flight under the
/// invoice's own payment hash.
pub struct MockWallet {
    pub invoice: Mutex<String>,
    pub invoice_requests: Mutex<Vec<(UserId, MakeInvoiceArgs)>>,
    pub payments: Mutex<Vec<String>>,
    pub fail_payments: AtomicBool,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            invoice: Mutex::new("lnbc1withdraw".to_string()),
            invoice_requests: Mutex::new(Vec::new()),
            payments: Mutex::new(Vec::new()),
            fail_payments: AtomicBool::new(false),
        }
    }

    pub fn payments(&self) -> Vec<String> {
        self.payments.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    async fn make_invoice(&self, user: UserId, args: MakeInvoiceArgs) -> anyhow::Result<String> {
        self.invoice_requests.lock().unwrap().push((user, args));
        Ok(self.invoice.lock().unwrap().clone())
    }

    async fn pay_invoice(
        &self,
        _user: UserId,
        bolt11: &str,
        _reply_to: MessageId,
    ) -> anyhow::Result<String> {
        if self.fail_payments.load(Ordering::SeqCst) {
            return Err(anyhow!("insufficient balance"));
        }
        self.payments.lock().unwrap().push(bolt11.to_string());
        Ok(Invoice::decode(bolt11)?.payment_hash)
    }
}

pub struct MockLedger {
    pub entries: Mutex<Vec<LedgerEntry>>,
}

impl MockLedger {
    pub fn balanced() -> Self {
        Self {
            entries: Mutex::new(vec![
                LedgerEntry {
                    amount: 100,
                    fees: 40,
                },
                LedgerEntry {
                    amount: -60,
                    fees: 0,
                },
            ]),
        }
    }

    pub fn unbalance(&self) {
        self.entries.lock().unwrap().push(LedgerEntry {
            amount: 1,
            fees: 0,
        });
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn clearing_entries(&self, account: &str) -> anyhow::Result<Vec<LedgerEntry>> {
        assert_eq!(account, CLEARING_ACCOUNT);
        Ok(self.entries.lock().unwrap().clone())
    }
}

pub struct TestHarness {
    pub core: LnurlCore,
    pub notifier: Arc<RecordingNotifier>,
    pub wallet: Arc<MockWallet>,
    pub ledger: Arc<MockLedger>,
    pub cache: Arc<MemoryReplyCache>,
}

/// Rate source nobody listens on; prompts carry the placeholder estimate
pub const UNREACHABLE_RATE_SOURCE: &str = "http://127.0.0.1:9/ticker";

impl TestHarness {
    pub fn new() -> Self {
        Self::with_rate_source(UNREACHABLE_RATE_SOURCE)
    }

    pub fn with_rate_source(rate_source_url: &str) -> Self {
        let notifier = Arc::new(RecordingNotifier::new());
        let wallet = Arc::new(MockWallet::new());
        let ledger = Arc::new(MockLedger::balanced());
        let cache = Arc::new(MemoryReplyCache::new());

        let core = build_core(
            Collaborators {
                notifier: notifier.clone(),
                wallet: wallet.clone(),
                cache: cache.clone(),
                ledger: ledger.clone(),
            },
            rate_source_url,
        );

        Self {
            core,
            notifier,
            wallet,
            ledger,
            cache,
        }
    }
}

/// Core over arbitrary collaborators with test-friendly settings
pub fn build_core(collaborators: Collaborators, rate_source_url: &str) -> LnurlCore {
    let settings = FlowSettings {
        server_secret: SERVER_SECRET.to_string(),
        clearing_account: CLEARING_ACCOUNT.to_string(),
        pending_reply_ttl: Duration::from_secs(60),
        success_action_delay: Duration::ZERO,
        confirmation_timeout: Duration::from_secs(5),
    };
    let rate = DollarRate::new(
        reqwest::Client::new(),
        rate_source_url,
        Duration::from_secs(3600),
    );

    LnurlCore::new(
        settings,
        LnurlClient::new(Duration::from_secs(5)).unwrap(),
        rate,
        collaborators,
        Arc::new(EventBus::new(100)),
    )
}

/// Preimage used by [`build_invoice`]
pub const PREIMAGE: [u8; 32] = [0x07; 32];

pub fn preimage_hex() -> String {
    hex::encode(PREIMAGE)
}

pub fn payment_hash_hex() -> String {
    hex::encode(sha256::Hash::hash(&PREIMAGE).to_byte_array())
}

/// A signed invoice committing to `metadata` for `msat`, payable with
/// [`PREIMAGE`]
pub fn build_invoice(metadata: &str, msat: u64) -> String {
    let secp = Secp256k1::new();
    let key = SecretKey::from_slice(&[0x11; 32]).unwrap();

    InvoiceBuilder::new(Currency::Bitcoin)
        .description_hash(sha256::Hash::hash(metadata.as_bytes()))
        .payment_hash(sha256::Hash::hash(&PREIMAGE))
        .payment_secret(PaymentSecret([42; 32]))
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .amount_milli_satoshis(msat)
        .build_signed(|hash| secp.sign_ecdsa_recoverable(hash, &key))
        .unwrap()
        .to_string()
}
