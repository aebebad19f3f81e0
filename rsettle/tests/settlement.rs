//! End-to-end settlement scenarios against in-memory collaborators.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, TxHash, U256};
use rsettle::allowance::AllowanceState;
use rsettle::currency::{CurrencyInfo, CurrencyKind, CurrencyRegistry};
use rsettle::error::{
    ApprovalError, ClassificationError, ConversionError, ExecutionError, NetworkError,
    SettlementErrorKind, SettlementStep,
};
use rsettle::executor::{
    ApprovalAmount, ConversionSettings, PaymentExecutor, PendingTransaction, TransactionReceipt,
};
use rsettle::oracle::RateOracle;
use rsettle::payment_network::{PAYMENT_NETWORK_TYPE, ids};
use rsettle::request::{Extension, RequestCurrency};
use rsettle::wallet::{CHAIN_NOT_ADDED, USER_REJECTED, Wallet, WalletError, WalletRequest};
use rsettle::{
    ChainId, NetworkGateway, NetworkInfo, NetworkRegistry, Request, SettlementConfig,
    SettlementOrchestrator,
};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use url::Url;

const PAYER: Address = Address::repeat_byte(0x11);
const PAYEE: &str = "0x2222222222222222222222222222222222222222";
const DAI_MATIC: &str = "0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063";
const USDC_MATIC: &str = "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174";
const DAI_MAINNET: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";
const PAYMENT_TX: TxHash = TxHash::repeat_byte(0xbb);
const APPROVAL_TX: TxHash = TxHash::repeat_byte(0xaa);

/// Ordered record of every side-effecting call, shared by all fakes.
type Journal = Arc<Mutex<Vec<String>>>;

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FakeError(&'static str);

struct FakeWallet {
    chain: Arc<Mutex<u64>>,
    accounts: Vec<Address>,
    switch_answers: Mutex<VecDeque<WalletError>>,
    add_answer: Option<WalletError>,
    journal: Journal,
}

impl FakeWallet {
    fn on(chain: u64, journal: &Journal) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            accounts: vec![PAYER],
            switch_answers: Mutex::new(VecDeque::new()),
            add_answer: None,
            journal: journal.clone(),
        }
    }

    fn failing_switch(self, error: WalletError) -> Self {
        self.switch_answers.lock().unwrap().push_back(error);
        self
    }

    fn target_chain(request: &WalletRequest) -> u64 {
        request.params[0]["chainId"]
            .as_str()
            .unwrap()
            .parse::<ChainId>()
            .unwrap()
            .as_u64()
    }
}

impl Wallet for FakeWallet {
    async fn chain_id(&self) -> Result<ChainId, WalletError> {
        Ok(ChainId::new(*self.chain.lock().unwrap()))
    }

    async fn request(&self, request: WalletRequest) -> Result<Value, WalletError> {
        self.journal.lock().unwrap().push(request.method.to_string());
        match &*request.method {
            "eth_accounts" => Ok(json!(self.accounts)),
            "wallet_switchEthereumChain" => {
                if let Some(error) = self.switch_answers.lock().unwrap().pop_front() {
                    return Err(error);
                }
                *self.chain.lock().unwrap() = Self::target_chain(&request);
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                if let Some(error) = &self.add_answer {
                    return Err(error.clone());
                }
                *self.chain.lock().unwrap() = Self::target_chain(&request);
                Ok(Value::Null)
            }
            other => Err(WalletError::new(format!("unexpected method {other}"))),
        }
    }
}

struct FakeOracle {
    rate: Option<Decimal>,
    queries: Mutex<Vec<(String, String)>>,
}

impl FakeOracle {
    fn with_rate(rate: &str) -> Self {
        Self {
            rate: Some(rate.parse().unwrap()),
            queries: Mutex::new(Vec::new()),
        }
    }
}

impl RateOracle for FakeOracle {
    type Error = FakeError;

    async fn rate(&self, from: &str, to: &str) -> Result<Option<Decimal>, FakeError> {
        self.queries
            .lock()
            .unwrap()
            .push((from.to_owned(), to.to_owned()));
        Ok(self.rate)
    }
}

struct FakeRegistry(Vec<CurrencyInfo>);

impl CurrencyRegistry for FakeRegistry {
    type Error = FakeError;

    async fn currency(&self, id: &str) -> Result<Option<CurrencyInfo>, FakeError> {
        Ok(self
            .0
            .iter()
            .find(|c| c.id == id || c.matches_value(id))
            .cloned())
    }

    async fn currencies(&self) -> Result<Vec<CurrencyInfo>, FakeError> {
        Ok(self.0.clone())
    }
}

struct FakePending {
    hash: TxHash,
    status: bool,
}

impl PendingTransaction for FakePending {
    type Error = FakeError;

    fn tx_hash(&self) -> TxHash {
        self.hash
    }

    async fn wait(self, confirmations: u64) -> Result<TransactionReceipt, FakeError> {
        assert_eq!(confirmations, 1);
        Ok(TransactionReceipt {
            transaction_hash: self.hash,
            status: self.status,
            block_number: Some(42),
        })
    }
}

/// Executor recording each call together with the wallet's chain at that time.
struct FakeExecutor {
    solvent: bool,
    allowance: Mutex<U256>,
    reject_approval: bool,
    payment_reverts: bool,
    /// Chain the wallet lands on while an approval is being signed.
    chain_after_approval: Option<u64>,
    wallet_chain: Arc<Mutex<u64>>,
    journal: Journal,
    solvency_amounts: Mutex<Vec<U256>>,
    approvals: Mutex<Vec<ApprovalAmount>>,
    payments: Mutex<Vec<Option<ConversionSettings>>>,
}

impl FakeExecutor {
    fn new(wallet: &FakeWallet, journal: &Journal) -> Self {
        Self {
            solvent: true,
            allowance: Mutex::new(U256::ZERO),
            reject_approval: false,
            payment_reverts: false,
            chain_after_approval: None,
            wallet_chain: wallet.chain.clone(),
            journal: journal.clone(),
            solvency_amounts: Mutex::new(Vec::new()),
            approvals: Mutex::new(Vec::new()),
            payments: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, operation: &str) {
        let chain = *self.wallet_chain.lock().unwrap();
        self.journal
            .lock()
            .unwrap()
            .push(format!("{operation}@{chain:#x}"));
    }
}

impl PaymentExecutor for FakeExecutor {
    type Error = FakeError;
    type Pending = FakePending;

    async fn is_solvent(
        &self,
        payer: Address,
        _currency: &CurrencyInfo,
        amount: U256,
    ) -> Result<bool, FakeError> {
        assert_eq!(payer, PAYER);
        self.record("is_solvent");
        self.solvency_amounts.lock().unwrap().push(amount);
        Ok(self.solvent)
    }

    async fn has_sufficient_funds(&self, _: &Request, _: Address) -> Result<bool, FakeError> {
        self.record("has_sufficient_funds");
        Ok(self.solvent)
    }

    async fn check_token_allowance(
        &self,
        _: &Request,
        _: Address,
        _: Option<&ConversionSettings>,
    ) -> Result<U256, FakeError> {
        self.record("check_token_allowance");
        Ok(*self.allowance.lock().unwrap())
    }

    async fn approve_token(
        &self,
        _: &Request,
        _: Address,
        _: Option<&ConversionSettings>,
        amount: ApprovalAmount,
    ) -> Result<FakePending, FakeError> {
        self.record("approve_token");
        self.approvals.lock().unwrap().push(amount);
        if self.reject_approval {
            return Err(FakeError("User denied transaction signature"));
        }
        *self.allowance.lock().unwrap() = amount.amount();
        if let Some(chain) = self.chain_after_approval {
            *self.wallet_chain.lock().unwrap() = chain;
        }
        Ok(FakePending {
            hash: APPROVAL_TX,
            status: true,
        })
    }

    async fn pay_request(
        &self,
        _: &Request,
        _: Address,
        settings: Option<&ConversionSettings>,
    ) -> Result<FakePending, FakeError> {
        self.record("pay_request");
        self.payments.lock().unwrap().push(settings.cloned());
        Ok(FakePending {
            hash: PAYMENT_TX,
            status: !self.payment_reverts,
        })
    }
}

fn registry() -> NetworkRegistry {
    NetworkRegistry::new()
        .with_network(
            "mainnet",
            NetworkInfo::new(ChainId::new(1), Url::parse("https://cloudflare-eth.com/").unwrap()),
        )
        .with_network(
            "matic",
            NetworkInfo::new(ChainId::new(0x89), Url::parse("https://polygon-rpc.com/").unwrap())
                .with_chain_name("Polygon Mainnet"),
        )
}

fn token(id: &str, symbol: &str, address: &str, network: &str, decimals: u8) -> CurrencyInfo {
    CurrencyInfo {
        id: id.into(),
        symbol: symbol.into(),
        kind: CurrencyKind::Erc20,
        value: address.into(),
        network: Some(network.into()),
        decimals,
        exchange_code: None,
    }
}

fn currencies() -> FakeRegistry {
    FakeRegistry(vec![
        token("DAI-matic", "DAI", DAI_MATIC, "matic", 18),
        token("USDC-matic", "USDC", USDC_MATIC, "matic", 6),
        token("DAI-mainnet", "DAI", DAI_MAINNET, "mainnet", 18),
        token("FAN-fantom", "FAN", "0x3333333333333333333333333333333333333333", "fantom", 18),
        CurrencyInfo {
            id: "ETH".into(),
            symbol: "ETH".into(),
            kind: CurrencyKind::Native,
            value: "ETH".into(),
            network: Some("mainnet".into()),
            decimals: 18,
            exchange_code: None,
        },
    ])
}

fn payment_network(id: &str, values: Value) -> Extension {
    let Value::Object(values) = values else {
        unreachable!()
    };
    Extension {
        kind: PAYMENT_NETWORK_TYPE.into(),
        id: id.into(),
        values,
        version: Some("0.1.0".into()),
    }
}

/// A 100 EUR invoice payable in DAI or USDC on Polygon.
fn conversion_request(currency: &str) -> Request {
    Request::new("conversion", currency, "100")
        .with_currency_info(RequestCurrency {
            kind: "ISO4217".into(),
            value: currency.into(),
            network: None,
        })
        .with_extension(
            ids::ANY_TO_ERC20_PROXY,
            payment_network(
                ids::ANY_TO_ERC20_PROXY,
                json!({
                    "network": "matic",
                    "acceptedTokens": [DAI_MATIC, USDC_MATIC],
                    "paymentAddress": PAYEE,
                    "feeAmount": "0",
                }),
            ),
        )
}

fn eth_request() -> Request {
    Request::new("native", "ETH", "1000000000000000000")
        .with_currency_info(RequestCurrency {
            kind: "ETH".into(),
            value: "ETH".into(),
            network: Some("mainnet".into()),
        })
        .with_extension(
            ids::ETH_FEE_PROXY,
            payment_network(
                ids::ETH_FEE_PROXY,
                json!({ "paymentAddress": PAYEE, "feeAmount": "1000" }),
            ),
        )
}

fn usdc_request() -> Request {
    Request::new("direct", "USDC-matic", "2500000")
        .with_currency_info(RequestCurrency {
            kind: "ERC20".into(),
            value: USDC_MATIC.into(),
            network: Some("matic".into()),
        })
        .with_extension(
            ids::ERC20_FEE_PROXY,
            payment_network(
                ids::ERC20_FEE_PROXY,
                json!({ "paymentAddress": PAYEE, "feeAddress": PAYEE, "feeAmount": 500 }),
            ),
        )
}

struct Harness {
    journal: Journal,
    wallet: FakeWallet,
    oracle: Arc<FakeOracle>,
    executor: Arc<FakeExecutor>,
}

impl Harness {
    fn on(chain: u64) -> Self {
        let journal = Journal::default();
        let wallet = FakeWallet::on(chain, &journal);
        let executor = Arc::new(FakeExecutor::new(&wallet, &journal));
        Self {
            journal,
            wallet,
            oracle: Arc::new(FakeOracle::with_rate("0.02")),
            executor,
        }
    }

    fn orchestrator(
        &self,
    ) -> SettlementOrchestrator<Arc<FakeOracle>, FakeRegistry, Arc<FakeExecutor>> {
        SettlementOrchestrator::new(
            NetworkGateway::new(registry()),
            self.oracle.clone(),
            currencies(),
            self.executor.clone(),
        )
    }

    fn journal(&self) -> Vec<String> {
        entries(&self.journal)
    }
}

fn executor_with(harness: &mut Harness, configure: impl FnOnce(&mut FakeExecutor)) {
    let mut executor = FakeExecutor::new(&harness.wallet, &harness.journal);
    configure(&mut executor);
    harness.executor = Arc::new(executor);
}

#[tokio::test]
async fn scenario_a_conversion_pays_with_spend_ceiling() {
    let harness = Harness::on(0x89);
    let tx_hash = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap();

    assert_eq!(tx_hash, PAYMENT_TX);
    let ceiling = U256::from(20_000_000_000_000_000_u64);
    assert_eq!(*harness.executor.solvency_amounts.lock().unwrap(), [ceiling]);
    assert_eq!(
        *harness.oracle.queries.lock().unwrap(),
        [("EUR".to_owned(), "DAI".to_owned())]
    );
    assert_eq!(
        *harness.executor.approvals.lock().unwrap(),
        [ApprovalAmount::Unlimited]
    );
    let payments = harness.executor.payments.lock().unwrap();
    let settings = payments[0].as_ref().unwrap();
    assert_eq!(settings.max_to_spend.amount(), ceiling);
    assert_eq!(settings.currency.id, "DAI-matic");
    assert_eq!(
        harness.journal(),
        [
            "eth_accounts",
            "is_solvent@0x89",
            "check_token_allowance@0x89",
            "approve_token@0x89",
            "check_token_allowance@0x89",
            "pay_request@0x89",
        ]
    );
}

#[tokio::test]
async fn scenario_b_already_on_target_chain_sends_no_request() {
    let journal = Journal::default();
    let wallet = FakeWallet::on(0x89, &journal);
    let gateway = NetworkGateway::new(registry());
    gateway.ensure_network("matic", &wallet).await.unwrap();
    gateway.ensure_network("matic", &wallet).await.unwrap();
    assert!(entries(&journal).is_empty());
}

#[tokio::test]
async fn scenario_c_unknown_chain_is_switched_then_added() {
    let journal = Journal::default();
    let wallet = FakeWallet::on(1, &journal)
        .failing_switch(WalletError::with_code(CHAIN_NOT_ADDED, "Unrecognized chain ID"));
    let gateway = NetworkGateway::new(registry());
    let chain = gateway.ensure_network("matic", &wallet).await.unwrap();
    assert_eq!(chain, ChainId::new(0x89));
    assert_eq!(
        entries(&journal),
        ["wallet_switchEthereumChain", "wallet_addEthereumChain"]
    );
}

#[tokio::test]
async fn scenario_d_rejected_approval_never_pays() {
    let mut harness = Harness::on(0x89);
    executor_with(&mut harness, |e| e.reject_approval = true);
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap_err();

    assert!(err.is_approval());
    assert_eq!(err.step, SettlementStep::Allowance);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Execution(ExecutionError::Approval(ApprovalError::Rejected { .. }))
    ));
    assert!(harness.executor.payments.lock().unwrap().is_empty());
    assert_eq!(harness.executor.approvals.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_e_insolvent_payer_never_approves_or_pays() {
    let mut harness = Harness::on(0x89);
    executor_with(&mut harness, |e| e.solvent = false);
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "USDC-matic")
        .await
        .unwrap_err();

    assert!(err.is_insufficient_funds());
    assert_eq!(err.step, SettlementStep::Solvency);
    assert_eq!(harness.journal(), ["eth_accounts", "is_solvent@0x89"]);
}

#[tokio::test]
async fn conversion_switches_network_before_any_executor_call() {
    let harness = Harness::on(1);
    harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "USDC-matic")
        .await
        .unwrap();

    let journal = harness.journal();
    assert_eq!(journal[..2], ["eth_accounts", "wallet_switchEthereumChain"]);
    assert!(journal[2..].iter().all(|entry| entry.ends_with("@0x89")));
}

#[tokio::test]
async fn sufficient_allowance_skips_approval() {
    let mut harness = Harness::on(0x89);
    executor_with(&mut harness, |e| *e.allowance.get_mut().unwrap() = U256::MAX);
    harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap();
    assert!(harness.executor.approvals.lock().unwrap().is_empty());
}

#[tokio::test]
async fn native_payment_skips_allowance_and_conversion() {
    let harness = Harness::on(1);
    let tx_hash = harness
        .orchestrator()
        .settle(&eth_request(), &harness.wallet, "ETH")
        .await
        .unwrap();

    assert_eq!(tx_hash, PAYMENT_TX);
    assert!(harness.oracle.queries.lock().unwrap().is_empty());
    assert_eq!(
        harness.journal(),
        ["eth_accounts", "has_sufficient_funds@0x1", "pay_request@0x1"]
    );
    assert_eq!(*harness.executor.payments.lock().unwrap(), [None]);
}

#[tokio::test]
async fn fee_proxy_approves_amount_plus_fee() {
    let harness = Harness::on(0x89);
    harness
        .orchestrator()
        .settle(&usdc_request(), &harness.wallet, USDC_MATIC)
        .await
        .unwrap();
    assert_eq!(
        *harness.executor.approvals.lock().unwrap(),
        [ApprovalAmount::Exact(U256::from(2_500_500))]
    );
}

#[tokio::test]
async fn direct_payment_in_another_token_is_rejected() {
    let harness = Harness::on(0x89);
    let err = harness
        .orchestrator()
        .settle(&usdc_request(), &harness.wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveCurrency);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Conversion(ConversionError::CurrencyResolution { .. })
    ));
}

#[tokio::test]
async fn conversion_rejects_tokens_on_other_networks() {
    let harness = Harness::on(0x89);
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "FAN-fantom")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveCurrency);
    assert_eq!(harness.journal(), ["eth_accounts"]);
}

#[tokio::test]
async fn unknown_currency_fails_resolution() {
    let harness = Harness::on(0x89);
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "WBTC-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveCurrency);
}

#[tokio::test]
async fn unregistered_network_is_unsupported() {
    let harness = Harness::on(0x89);
    let request = Request::new("fantom", "FAN-fantom", "10")
        .with_extension(
            ids::ERC20_PROXY,
            payment_network(ids::ERC20_PROXY, json!({ "paymentAddress": PAYEE })),
        );
    let err = harness
        .orchestrator()
        .settle(&request, &harness.wallet, "FAN-fantom")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::EnsureNetwork);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Network(NetworkError::UnsupportedNetwork { .. })
    ));
}

#[tokio::test]
async fn refused_chain_add_requires_manual_install() {
    let journal = Journal::default();
    let mut wallet = FakeWallet::on(1, &journal)
        .failing_switch(WalletError::with_code(CHAIN_NOT_ADDED, "Unrecognized chain ID"));
    wallet.add_answer = Some(WalletError::with_code(USER_REJECTED, "User rejected the request"));
    let executor = Arc::new(FakeExecutor::new(&wallet, &journal));
    let orchestrator = SettlementOrchestrator::new(
        NetworkGateway::new(registry()),
        Arc::new(FakeOracle::with_rate("0.02")),
        currencies(),
        executor.clone(),
    );
    let err = orchestrator
        .settle(&conversion_request("EUR"), &wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert!(err.is_manual_install_required());
    assert_eq!(err.step, SettlementStep::EnsureNetwork);
    assert!(executor.payments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_rate_fails_quote() {
    let harness = Harness {
        oracle: Arc::new(FakeOracle {
            rate: None,
            queries: Mutex::new(Vec::new()),
        }),
        ..Harness::on(0x89)
    };
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::Quote);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Conversion(ConversionError::RateUnavailable { .. })
    ));
    assert_eq!(harness.journal(), ["eth_accounts"]);
}

#[tokio::test]
async fn aliased_invoice_currency_is_quoted_under_its_symbol() {
    let harness = Harness::on(0x89);
    harness
        .orchestrator()
        .settle(&conversion_request("jEUR-matic"), &harness.wallet, "DAI-matic")
        .await
        .unwrap();
    assert_eq!(harness.oracle.queries.lock().unwrap()[0].0, "EUR");
}

#[tokio::test]
async fn reverted_payment_is_reported() {
    let mut harness = Harness::on(0x89);
    executor_with(&mut harness, |e| e.payment_reverts = true);
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::Confirm);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Execution(ExecutionError::TransactionReverted { tx_hash }) if tx_hash == PAYMENT_TX
    ));
}

#[tokio::test]
async fn wallet_without_accounts_fails_first() {
    let mut harness = Harness::on(0x89);
    harness.wallet.accounts.clear();
    let err = harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveWallet);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::NoWalletAddress { source: None }
    ));
}

#[tokio::test]
async fn several_payment_networks_are_ambiguous() {
    let harness = Harness::on(0x89);
    let request = conversion_request("EUR").with_extension(
        ids::ERC20_PROXY,
        payment_network(ids::ERC20_PROXY, json!({ "paymentAddress": PAYEE })),
    );
    let err = harness
        .orchestrator()
        .settle(&request, &harness.wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::Classify);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Classification(ClassificationError::AmbiguousPaymentNetwork { .. })
    ));
}

#[tokio::test]
async fn unknown_payment_network_is_rejected() {
    let harness = Harness::on(0x89);
    let request = Request::new("btc", "BTC", "1").with_extension(
        "pn-bitcoin-address-based",
        payment_network("pn-bitcoin-address-based", json!({})),
    );
    let err = harness
        .orchestrator()
        .settle(&request, &harness.wallet, "BTC")
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Classification(ClassificationError::UnsupportedPaymentNetwork { .. })
    ));
}

#[tokio::test]
async fn custom_slippage_changes_the_ceiling() {
    let harness = Harness::on(0x89);
    let orchestrator = harness
        .orchestrator()
        .with_config(SettlementConfig::default().with_slippage_percent(Decimal::from(50)));
    orchestrator
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap();
    // 0.02 + 50% = 0.03
    assert_eq!(
        *harness.executor.solvency_amounts.lock().unwrap(),
        [U256::from(30_000_000_000_000_000_u64)]
    );
}

#[tokio::test]
async fn allowance_manager_starts_unknown() {
    let harness = Harness::on(0x89);
    let gateway = NetworkGateway::new(registry());
    let manager = rsettle::allowance::AllowanceManager::new(&harness.executor, &gateway, 1);
    assert_eq!(manager.state(), AllowanceState::Unknown);
}

#[tokio::test]
async fn direct_request_without_currency_info_is_matched_by_identifier() {
    let harness = Harness::on(0x89);
    let mut request = usdc_request();
    request.currency = "usdc-MATIC".into();
    request.currency_info = None;
    harness
        .orchestrator()
        .settle(&request, &harness.wallet, "USDC-matic")
        .await
        .unwrap();
    assert_eq!(harness.journal().last().unwrap(), "pay_request@0x89");
}

#[tokio::test]
async fn direct_request_is_never_paid_on_another_network() {
    let harness = Harness::on(0x89);
    let mut request = usdc_request();
    request.currency_info = None;
    let err = harness
        .orchestrator()
        .settle(&request, &harness.wallet, "DAI-mainnet")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveCurrency);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Conversion(ConversionError::CurrencyResolution { .. })
    ));
    assert_eq!(harness.journal(), ["eth_accounts"]);
}

#[tokio::test]
async fn direct_request_pinned_to_a_network_rejects_same_token_elsewhere() {
    let harness = Harness::on(0x89);
    let mut request = usdc_request();
    request.currency_info = Some(RequestCurrency {
        kind: "ERC20".into(),
        value: DAI_MAINNET.into(),
        network: Some("matic".into()),
    });
    let err = harness
        .orchestrator()
        .settle(&request, &harness.wallet, "DAI-mainnet")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveCurrency);
    assert_eq!(harness.journal(), ["eth_accounts"]);
}

#[tokio::test]
async fn direct_request_naming_no_currency_is_rejected() {
    let harness = Harness::on(0x89);
    let mut request = usdc_request();
    request.currency = String::new();
    request.currency_info = None;
    let err = harness
        .orchestrator()
        .settle(&request, &harness.wallet, "USDC-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::ResolveCurrency);
    assert!(harness.executor.payments.lock().unwrap().is_empty());
}

#[tokio::test]
async fn network_is_restored_before_payment_after_approval() {
    let mut harness = Harness::on(0x89);
    executor_with(&mut harness, |e| e.chain_after_approval = Some(1));
    harness
        .orchestrator()
        .settle(&conversion_request("EUR"), &harness.wallet, "DAI-matic")
        .await
        .unwrap();
    assert_eq!(
        harness.journal(),
        [
            "eth_accounts",
            "is_solvent@0x89",
            "check_token_allowance@0x89",
            "approve_token@0x89",
            "check_token_allowance@0x1",
            "wallet_switchEthereumChain",
            "pay_request@0x89",
        ]
    );
}

#[tokio::test]
async fn refused_switch_before_payment_fails_submission() {
    let journal = Journal::default();
    let wallet = FakeWallet::on(0x89, &journal)
        .failing_switch(WalletError::with_code(USER_REJECTED, "User rejected the request"));
    let mut executor = FakeExecutor::new(&wallet, &journal);
    executor.chain_after_approval = Some(1);
    let executor = Arc::new(executor);
    let orchestrator = SettlementOrchestrator::new(
        NetworkGateway::new(registry()),
        Arc::new(FakeOracle::with_rate("0.02")),
        currencies(),
        executor.clone(),
    );
    let err = orchestrator
        .settle(&conversion_request("EUR"), &wallet, "DAI-matic")
        .await
        .unwrap_err();
    assert_eq!(err.step, SettlementStep::Submit);
    assert!(matches!(
        err.kind,
        SettlementErrorKind::Network(NetworkError::NetworkSwitch { .. })
    ));
    assert!(executor.payments.lock().unwrap().is_empty());
    assert!(!entries(&journal).iter().any(|e| e.starts_with("pay_request")));
}
