//! Shared test doubles: a key-backed wallet manager, a card session that
//! really signs, and a scripted backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U256};

use saltpay_activation::api::{
    AttestationResponse, CardVerifyItem, CheckRegistrationRequest, PaymentologyApi,
    RegisterKycRequest, RegisterKycResponse, RegisterWalletRequest, RegisterWalletResponse,
    RegistrationResponse,
};
use saltpay_activation::card::{
    AttestWalletKeyResponse, AttestationMode, CardSession, GenerateOtpResponse,
};
use saltpay_activation::eth::compile_legacy;
use saltpay_activation::{
    Amount, Blockchain, CompiledTransaction, RawSignature, RegistrationItem, Result,
    SignedTransaction, Token, TransactionData, TransactionSigner, WalletInfo, WalletManager,
    WalletSnapshot,
};

pub const CARD_ID: &str = "CB79000000001234";
pub const WALLET_PUBLIC_KEY: [u8; 33] = [0xAA; 33];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn test_wallet() -> LocalWallet {
    let key_bytes = [0x42u8; 32];
    let signing_key = SigningKey::from_bytes((&key_bytes).into()).unwrap();
    LocalWallet::from(signing_key)
}

fn raw_from_hash(wallet: &LocalWallet, hash: H256) -> RawSignature {
    let signature = wallet.sign_hash(hash).unwrap();
    let mut raw = [0u8; 64];
    signature.r.to_big_endian(&mut raw[..32]);
    signature.s.to_big_endian(&mut raw[32..]);
    RawSignature(raw)
}

/// Wallet manager over an in-memory account, signing-key backed so recovered
/// signatures match the reported address.
pub struct MockWalletManager {
    info: WalletInfo,
    pub transaction_count: u64,
    pub coin_balance: U256,
    pub token_balance: Mutex<U256>,
    pub allowance: Mutex<U256>,
    pub fail_send_on: Option<usize>,
    pub sent: Mutex<Vec<H256>>,
}

impl MockWalletManager {
    pub fn new() -> Self {
        let wallet = test_wallet();
        Self {
            info: WalletInfo {
                blockchain: Blockchain::SaltPay,
                public_key: WALLET_PUBLIC_KEY.to_vec(),
                address: wallet.address(),
                token: Some(Token::wrapped_xdai()),
            },
            transaction_count: 4,
            coin_balance: U256::from(1_000_000_000u64),
            token_balance: Mutex::new(U256::zero()),
            allowance: Mutex::new(U256::zero()),
            fail_send_on: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletManager for MockWalletManager {
    fn info(&self) -> &WalletInfo {
        &self.info
    }

    async fn update(&self) -> Result<WalletSnapshot> {
        let token_balance = *self.token_balance.lock().unwrap();
        Ok(WalletSnapshot {
            coin_balance: Amount::coin(self.info.blockchain, self.coin_balance),
            token_balance: self
                .info
                .token
                .as_ref()
                .map(|token| token.amount(token_balance)),
            transaction_count: self.transaction_count,
        })
    }

    async fn estimate_fee(
        &self,
        _amount: &Amount,
        _destination: Address,
        _calldata: Option<&Bytes>,
    ) -> Result<Vec<Amount>> {
        Ok([300_000_000u64, 600_000_000, 900_000_000]
            .iter()
            .map(|value| Amount::coin(self.info.blockchain, U256::from(*value)))
            .collect())
    }

    fn compile_transaction(&self, data: &TransactionData) -> Result<Option<CompiledTransaction>> {
        Ok(Some(compile_legacy(data, self.info.blockchain)))
    }

    async fn send_raw(&self, transaction: &SignedTransaction) -> Result<String> {
        let mut sent = self.sent.lock().unwrap();
        if self.fail_send_on == Some(sent.len()) {
            return Err(saltpay_activation::Error::Blockchain(
                "underpriced".to_string(),
            ));
        }
        sent.push(transaction.hash);
        Ok(format!("{:#x}", transaction.hash))
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> Result<Amount> {
        let token = self.info.token.clone().unwrap();
        Ok(token.amount(*self.allowance.lock().unwrap()))
    }
}

/// Card session backed by the test signing key
pub struct MockCardSession {
    wallet: LocalWallet,
    pub active_key: Option<Vec<u8>>,
    pub sign_calls: usize,
}

impl MockCardSession {
    pub fn new() -> Self {
        Self {
            wallet: test_wallet(),
            active_key: Some(WALLET_PUBLIC_KEY.to_vec()),
            sign_calls: 0,
        }
    }
}

#[async_trait]
impl CardSession for MockCardSession {
    fn active_wallet_public_key(&self) -> Option<Vec<u8>> {
        self.active_key.clone()
    }

    async fn generate_otp(&mut self) -> Result<GenerateOtpResponse> {
        Ok(GenerateOtpResponse {
            root_otp: vec![0x5a; 16],
            root_otp_counter: 1,
        })
    }

    async fn attest_wallet_key(
        &mut self,
        _wallet_public_key: &[u8],
        challenge: &[u8],
        _mode: AttestationMode,
    ) -> Result<AttestWalletKeyResponse> {
        Ok(AttestWalletKeyResponse {
            salt: challenge.to_vec(),
            wallet_signature: vec![0x01; 64],
            public_key_salt: Some(vec![0x02; 16]),
            card_signature: Some(vec![0x03; 64]),
        })
    }

    async fn sign_hashes(
        &mut self,
        hashes: &[H256],
        _wallet_public_key: &[u8],
    ) -> Result<Vec<RawSignature>> {
        self.sign_calls += 1;
        Ok(hashes
            .iter()
            .map(|hash| raw_from_hash(&self.wallet, *hash))
            .collect())
    }
}

/// Standalone signer for the claim flow, same key as the card session
pub struct MockSigner {
    wallet: LocalWallet,
}

impl MockSigner {
    pub fn new() -> Self {
        Self {
            wallet: test_wallet(),
        }
    }
}

#[async_trait]
impl TransactionSigner for MockSigner {
    async fn sign_hashes(
        &self,
        hashes: &[H256],
        _wallet_public_key: &[u8],
    ) -> Result<Vec<RawSignature>> {
        Ok(hashes
            .iter()
            .map(|hash| raw_from_hash(&self.wallet, *hash))
            .collect())
    }
}

/// Scripted backend: fixed challenge, configurable registration item
pub struct MockApi {
    pub challenge: Vec<u8>,
    pub item: Mutex<RegistrationItem>,
    pub wallet_registrations: Mutex<usize>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            challenge: vec![0xC4; 16],
            item: Mutex::new(RegistrationItem {
                passed: Some(true),
                ..Default::default()
            }),
            wallet_registrations: Mutex::new(0),
        }
    }

    pub fn set_item(&self, item: RegistrationItem) {
        *self.item.lock().unwrap() = item;
    }
}

#[async_trait]
impl PaymentologyApi for MockApi {
    async fn check_registration(
        &self,
        _request: &CheckRegistrationRequest,
    ) -> Result<RegistrationResponse> {
        Ok(RegistrationResponse {
            results: vec![self.item.lock().unwrap().clone()],
            success: Some(true),
            ..Default::default()
        })
    }

    async fn request_attestation_challenge(
        &self,
        _request: &CardVerifyItem,
    ) -> Result<AttestationResponse> {
        Ok(AttestationResponse {
            challenge: Some(self.challenge.clone()),
            success: Some(true),
            ..Default::default()
        })
    }

    async fn register_kyc(&self, _request: &RegisterKycRequest) -> Result<RegisterKycResponse> {
        Ok(RegisterKycResponse {
            success: Some(true),
            ..Default::default()
        })
    }

    async fn register_wallet(
        &self,
        _request: &RegisterWalletRequest,
    ) -> Result<RegisterWalletResponse> {
        *self.wallet_registrations.lock().unwrap() += 1;
        Ok(RegisterWalletResponse {
            success: Some(true),
            ..Default::default()
        })
    }
}

pub fn make_activation_manager(
    wallet_manager: Arc<MockWalletManager>,
    api: Arc<MockApi>,
) -> Arc<saltpay_activation::SaltPayActivationManager> {
    let registrar = Arc::new(saltpay_activation::GnosisRegistrator::new(wallet_manager).unwrap());
    Arc::new(
        saltpay_activation::SaltPayActivationManager::new(
            CARD_ID.to_string(),
            vec![0x04; 65],
            saltpay_activation::SaltPayConfig::stub().kyc_provider,
            api,
            registrar,
        )
        .unwrap(),
    )
}
