//! End-to-end activation flow over mocked card, chain and backend

mod common;

use std::sync::Arc;

use ethers::types::U256;

use common::{
    init_logging, make_activation_manager, test_wallet, MockApi, MockCardSession, MockSigner,
    MockWalletManager,
};
use ethers::signers::Signer;
use saltpay_activation::{
    ActivationStep, Error, MemoryActivationStorage, RegistrationItem, SaltPayRegistrationManager,
    Token,
};

fn registration_manager(
    wallet_manager: Arc<MockWalletManager>,
    api: Arc<MockApi>,
) -> SaltPayRegistrationManager {
    let manager = make_activation_manager(wallet_manager, api);
    SaltPayRegistrationManager::new(manager, Arc::new(MemoryActivationStorage::new()))
}

#[tokio::test]
async fn registration_task_produces_four_sequential_transactions() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = make_activation_manager(wallet_manager, api);

    let task = manager.make_registration_task(vec![0xC4; 16]);
    let mut session = MockCardSession::new();
    let response = task.run(&mut session).await.unwrap();

    let nonces: Vec<u64> = response
        .signed_transactions
        .iter()
        .map(|signed| signed.transaction.nonce())
        .collect();
    assert_eq!(nonces, vec![4, 5, 6, 7]);

    // Approval targets the token contract, the rest the OTP processor
    let destinations: Vec<_> = response
        .signed_transactions
        .iter()
        .map(|signed| signed.transaction.destination().unwrap())
        .collect();
    let token_contract = Token::wrapped_xdai().contract_address;
    assert_eq!(destinations[0], token_contract);
    assert_ne!(destinations[1], token_contract);
    assert_eq!(destinations[1], destinations[2]);
    assert_eq!(destinations[2], destinations[3]);

    // One batched signing round, every signature recovers to the wallet
    assert_eq!(session.sign_calls, 1);
    let sender = test_wallet().address();
    for signed in &response.signed_transactions {
        let recovered = signed.signature.recover(signed.transaction.sighash()).unwrap();
        assert_eq!(recovered, sender);
    }
}

#[tokio::test]
async fn registration_task_rejects_foreign_wallet() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = make_activation_manager(wallet_manager, api);

    let task = manager.make_registration_task(vec![0xC4; 16]);
    let mut session = MockCardSession::new();
    session.active_key = Some(vec![0xBB; 33]);

    let result = task.run(&mut session).await;
    assert!(matches!(result, Err(Error::WalletNotFound)));
}

#[tokio::test]
async fn send_transactions_surfaces_first_failure() {
    init_logging();
    let mut failing = MockWalletManager::new();
    failing.fail_send_on = Some(1);
    let wallet_manager = Arc::new(failing);
    let api = Arc::new(MockApi::new());
    let manager = make_activation_manager(wallet_manager.clone(), api);

    let task = manager.make_registration_task(vec![0xC4; 16]);
    let mut session = MockCardSession::new();
    let response = task.run(&mut session).await.unwrap();

    let result = manager.send_transactions(&response.signed_transactions).await;
    assert!(matches!(result, Err(Error::Blockchain(_))));
    assert_eq!(wallet_manager.sent_count(), 1);
}

#[tokio::test]
async fn register_card_happy_path_checkpoints_submission() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager.clone(), api.clone());

    let mut session = MockCardSession::new();
    manager.register_card(&mut session, "1234").await.unwrap();

    assert_eq!(wallet_manager.sent_count(), 4);
    assert_eq!(*api.wallet_registrations.lock().unwrap(), 1);

    // A rerun redoes the card task but never resubmits the batch
    let mut session = MockCardSession::new();
    manager.register_card(&mut session, "1234").await.unwrap();
    assert_eq!(wallet_manager.sent_count(), 4);
    assert_eq!(*api.wallet_registrations.lock().unwrap(), 2);
}

#[tokio::test]
async fn register_card_rejects_weak_pin_before_touching_the_card() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager.clone(), api);

    let mut session = MockCardSession::new();
    let result = manager.register_card(&mut session, "7777").await;
    assert!(matches!(result, Err(Error::WeakPin)));
    assert_eq!(session.sign_calls, 0);
    assert_eq!(wallet_manager.sent_count(), 0);
}

#[tokio::test]
async fn register_card_requires_gas() {
    init_logging();
    let mut broke = MockWalletManager::new();
    broke.coin_balance = U256::zero();
    let wallet_manager = Arc::new(broke);
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager, api);

    let mut session = MockCardSession::new();
    let result = manager.register_card(&mut session, "1234").await;
    assert!(matches!(result, Err(Error::NoGas)));
}

#[tokio::test]
async fn update_maps_backend_status_to_steps() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager.clone(), api.clone());

    // Fresh card with nothing claimable heads to the KYC intro
    let (step, amount) = manager.update(ActivationStep::None, None).await.unwrap();
    assert_eq!(step, ActivationStep::KycIntro);
    assert!(amount.is_none());

    // An activated card with an outstanding allowance goes to claim
    *wallet_manager.allowance.lock().unwrap() = U256::from(5u64);
    api.set_item(RegistrationItem {
        passed: Some(true),
        active: Some(true),
        ..Default::default()
    });
    let (step, amount) = manager.update(ActivationStep::None, None).await.unwrap();
    assert_eq!(step, ActivationStep::Claim);
    assert_eq!(amount.unwrap().value, U256::from(5u64));
}

#[tokio::test]
async fn update_gates_early_steps_on_gas() {
    init_logging();
    let mut broke = MockWalletManager::new();
    broke.coin_balance = U256::zero();
    let wallet_manager = Arc::new(broke);
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager, api.clone());

    api.set_item(RegistrationItem {
        passed: Some(true),
        pin_set: Some(false),
        ..Default::default()
    });
    let result = manager.update(ActivationStep::None, None).await;
    assert!(matches!(result, Err(Error::NoGas)));
}

#[tokio::test]
async fn claim_then_refresh_reaches_claim_success() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager.clone(), api);

    *wallet_manager.allowance.lock().unwrap() = U256::from(7u64);
    let signer = MockSigner::new();
    let claimed = manager.claim(&signer).await.unwrap();
    assert_eq!(claimed.value, U256::from(7u64));
    assert_eq!(wallet_manager.sent_count(), 1);

    // Funds still pending: allowance not consumed yet
    assert_eq!(
        manager.refresh_claim().await.unwrap(),
        ActivationStep::ClaimInProgress
    );

    // Funds arrived and the allowance is spent
    *wallet_manager.allowance.lock().unwrap() = U256::zero();
    *wallet_manager.token_balance.lock().unwrap() = U256::from(7u64);
    assert_eq!(
        manager.refresh_claim().await.unwrap(),
        ActivationStep::ClaimSuccess
    );
}

#[tokio::test]
async fn claim_with_nothing_outstanding_fails() {
    init_logging();
    let wallet_manager = Arc::new(MockWalletManager::new());
    let api = Arc::new(MockApi::new());
    let manager = registration_manager(wallet_manager, api);

    let signer = MockSigner::new();
    let result = manager.claim(&signer).await;
    assert!(matches!(result, Err(Error::NoFundsToClaim)));
}
