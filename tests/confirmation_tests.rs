mod common;

use common::{Harness, admin_grant, confirm_grant, staff_grant};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wallet_ledger::application::config::{EngineConfig, NegativeBalancePolicy};
use wallet_ledger::domain::actor::{Actor, Role, Scope};
use wallet_ledger::domain::audit::AuditAction;
use wallet_ledger::domain::customer::Customer;
use wallet_ledger::domain::ids::TransactionId;
use wallet_ledger::domain::money::Amount;
use wallet_ledger::domain::ports::LedgerStore;
use wallet_ledger::domain::transaction::{NewWalletTransaction, TransactionStatus, TransactionType};
use wallet_ledger::error::LedgerError;

#[tokio::test]
async fn test_rejection_leaves_balance_untouched() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Deposit, dec!(100)).await;

    let rejected = h
        .engine
        .reject(&confirm_grant(), id, "  cash was short  ")
        .await
        .unwrap();

    assert_eq!(rejected.status, TransactionStatus::Rejected);
    assert_eq!(rejected.rejected_reason.as_deref(), Some("cash was short"));
    assert_eq!(h.balance("c1").await, Decimal::ZERO);

    let stored = h.store.transaction(id).await.unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Rejected);
    assert!(matches!(
        h.engine.confirm(&confirm_grant(), id).await,
        Err(LedgerError::AlreadyProcessed(_))
    ));
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Deposit, dec!(10)).await;

    let result = h.engine.reject(&confirm_grant(), id, "   ").await;
    assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    assert!(h.store.transaction(id).await.unwrap().unwrap().is_pending());
}

#[tokio::test]
async fn test_sequential_double_confirmation() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Deposit, dec!(30)).await;

    h.engine.confirm(&confirm_grant(), id).await.unwrap();
    let second = h.engine.confirm(&confirm_grant(), id).await;

    assert!(matches!(second, Err(LedgerError::AlreadyProcessed(_))));
    assert!(second.unwrap_err().is_benign());
    assert_eq!(h.balance("c1").await, dec!(30));
}

#[tokio::test]
async fn test_concurrent_double_confirmation() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Deposit, dec!(30)).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.confirm(&confirm_grant(), id).await })
        })
        .collect();

    let mut confirmed = 0;
    let mut already = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(LedgerError::AlreadyProcessed(_)) => already += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(already, 7);
    assert_eq!(h.balance("c1").await, dec!(30));

    let confirmations = h
        .audit
        .events()
        .await
        .into_iter()
        .filter(|e| matches!(e.action, AuditAction::TransactionConfirmed { .. }))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_confirm_and_reject_race() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Deposit, dec!(30)).await;

    let confirm = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.confirm(&confirm_grant(), id).await.is_ok() })
    };
    let reject = {
        let engine = h.engine.clone();
        tokio::spawn(async move { engine.reject(&confirm_grant(), id, "dup").await.is_ok() })
    };
    let confirmed = confirm.await.unwrap();
    let rejected = reject.await.unwrap();

    assert!(confirmed ^ rejected);
    let expected = if confirmed { dec!(30) } else { Decimal::ZERO };
    assert_eq!(h.balance("c1").await, expected);
}

#[tokio::test]
async fn test_purchase_entry_debits_wallet() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Purchase, dec!(12.50)).await;

    let confirmation = h.engine.confirm(&confirm_grant(), id).await.unwrap();

    assert!(confirmation.settlement.receipts.is_empty());
    assert_eq!(confirmation.transaction.balance_before.unwrap().value(), Decimal::ZERO);
    assert_eq!(confirmation.transaction.balance_after.unwrap().value(), dec!(-12.50));
    assert_eq!(h.balance("c1").await, dec!(-12.50));
}

#[tokio::test]
async fn test_reject_policy_blocks_overdraft() {
    let h = Harness::with_config(EngineConfig {
        negative_balance: NegativeBalancePolicy::Reject,
        ..EngineConfig::default()
    });
    h.add_customer("c1").await;
    h.engine
        .adjust_balance(&admin_grant(), &"c1".into(), dec!(20), "opening credit", true)
        .await
        .unwrap();

    let overdraft = h
        .engine
        .adjust_balance(&admin_grant(), &"c1".into(), dec!(20.01), "fee", false)
        .await;
    assert!(matches!(overdraft, Err(LedgerError::ValidationError(_))));

    let id = h.submit("c1", TransactionType::Purchase, dec!(25)).await;
    assert!(matches!(
        h.engine.confirm(&confirm_grant(), id).await,
        Err(LedgerError::ValidationError(_))
    ));
    assert!(h.store.transaction(id).await.unwrap().unwrap().is_pending());

    h.engine
        .adjust_balance(&admin_grant(), &"c1".into(), dec!(20), "fee", false)
        .await
        .unwrap();
    assert_eq!(h.balance("c1").await, Decimal::ZERO);
}

#[tokio::test]
async fn test_adjustment_validation() {
    let h = Harness::new();
    h.add_customer("c1").await;

    for amount in [Decimal::ZERO, dec!(-5)] {
        let result = h
            .engine
            .adjust_balance(&admin_grant(), &"c1".into(), amount, "fix", true)
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }
    let blank = h
        .engine
        .adjust_balance(&admin_grant(), &"c1".into(), dec!(5), " ", true)
        .await;
    assert!(matches!(blank, Err(LedgerError::ValidationError(_))));

    let missing = h
        .engine
        .adjust_balance(&admin_grant(), &"nobody".into(), dec!(5), "fix", true)
        .await;
    assert!(matches!(missing, Err(LedgerError::NotFound(_))));
    assert_eq!(h.balance("c1").await, Decimal::ZERO);
}

#[tokio::test]
async fn test_out_of_scope_entries_look_missing() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let id = h.submit("c1", TransactionType::Deposit, dec!(10)).await;

    let other_shop_admin = Actor {
        id: "admin-2".into(),
        name: "Nana".to_string(),
        role: Role::ShopAdmin,
        business_id: Some("b1".into()),
        shop_id: Some("s2".into()),
    };
    let grant = other_shop_admin
        .confirm_grant(Scope::Shop {
            business_id: "b1".into(),
            shop_id: "s2".into(),
        })
        .unwrap();

    assert!(matches!(
        h.engine.confirm(&grant, id).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        h.engine.confirm(&confirm_grant(), TransactionId::generate()).await,
        Err(LedgerError::NotFound(_))
    ));
    assert_eq!(h.balance("c1").await, Decimal::ZERO);
}

#[tokio::test]
async fn test_bulk_confirmation_isolates_failures() {
    let h = Harness::with_config(EngineConfig {
        negative_balance: NegativeBalancePolicy::Reject,
        ..EngineConfig::default()
    });
    h.add_customer("c1").await;
    h.add_customer("c2").await;

    let first = h.submit("c1", TransactionType::Deposit, dec!(10)).await;
    let overdraft = h.submit("c2", TransactionType::Purchase, dec!(99)).await;
    let second = h.submit("c1", TransactionType::Refund, dec!(5)).await;
    let rejected = h.submit("c1", TransactionType::Deposit, dec!(1)).await;
    h.engine
        .reject(&confirm_grant(), rejected, "duplicate slip")
        .await
        .unwrap();

    let outcome = h
        .engine
        .confirm_all_for_actor(&admin_grant(), "kofi mensah")
        .await
        .unwrap();

    assert_eq!(outcome.confirmed_count, 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].transaction_id, overdraft);
    assert_eq!(h.balance("c1").await, dec!(15));
    assert_eq!(h.balance("c2").await, Decimal::ZERO);
    for id in [first, second] {
        let tx = h.store.transaction(id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Confirmed);
    }

    let rerun = h
        .engine
        .confirm_all_for_actor(&admin_grant(), "Kofi Mensah")
        .await
        .unwrap();
    assert_eq!(rerun.confirmed_count, 0);
    assert_eq!(rerun.failures.len(), 1);
}

#[tokio::test]
async fn test_bulk_confirmation_skips_other_collectors_and_businesses() {
    let h = Harness::new();
    h.add_customer("c1").await;
    let foreign = Customer::new("x1".into(), "b2".into(), "s9".into(), "Kwame");
    let mut uow = h.store.begin().await.unwrap();
    uow.upsert_customer(&foreign).await.unwrap();
    uow.commit().await.unwrap();

    let ours = h.submit("c1", TransactionType::Deposit, dec!(10)).await;

    let namesake = Actor {
        id: "col-9".into(),
        name: "Kofi Mensah".to_string(),
        role: Role::Collector,
        business_id: Some("b2".into()),
        shop_id: Some("s9".into()),
    };
    let foreign_grant = namesake
        .staff_grant(Scope::Shop {
            business_id: "b2".into(),
            shop_id: "s9".into(),
        })
        .unwrap();
    let theirs = h
        .engine
        .submit(
            &foreign_grant,
            NewWalletTransaction {
                customer_id: "x1".into(),
                r#type: TransactionType::Deposit,
                amount: Amount::new(dec!(7)).unwrap(),
                reference: None,
                description: None,
            },
        )
        .await
        .unwrap();

    let outcome = h
        .engine
        .confirm_all_for_actor(&admin_grant(), "Kofi Mensah")
        .await
        .unwrap();

    assert_eq!(outcome.confirmed_count, 1);
    assert!(outcome.failures.is_empty());
    assert!(!h.store.transaction(ours).await.unwrap().unwrap().is_pending());
    assert!(h.store.transaction(theirs.id).await.unwrap().unwrap().is_pending());

    // A collector may not submit outside their own shop.
    assert!(matches!(
        staff_grant().actor.staff_grant(Scope::Business("b2".into())),
        Err(LedgerError::AccessDenied)
    ));
}

#[tokio::test]
async fn test_wallet_overflow_is_reported_not_panicked() {
    let h = Harness::new();
    h.add_customer("c1").await;

    h.engine
        .adjust_balance(&admin_grant(), &"c1".into(), Decimal::MAX, "opening credit", true)
        .await
        .unwrap();
    let again = h
        .engine
        .adjust_balance(&admin_grant(), &"c1".into(), Decimal::MAX, "opening credit", true)
        .await;
    assert!(matches!(again, Err(LedgerError::ValidationError(_))));

    let id = h.submit("c1", TransactionType::Deposit, dec!(1)).await;
    assert!(matches!(
        h.engine.confirm(&confirm_grant(), id).await,
        Err(LedgerError::ValidationError(_))
    ));
    assert!(h.store.transaction(id).await.unwrap().unwrap().is_pending());

    assert_eq!(h.balance("c1").await, Decimal::MAX);
    let confirmed = h
        .store
        .transactions_for_customer(&"c1".into())
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.status == TransactionStatus::Confirmed)
        .count();
    assert_eq!(confirmed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirmations_of_different_deposits() {
    let h = Harness::new();
    h.add_customer("c1").await;

    let mut ids = Vec::new();
    let mut expected = Decimal::ZERO;
    for n in 1..=16 {
        let amount = Decimal::new(n * 125, 2);
        ids.push(h.submit("c1", TransactionType::Deposit, amount).await);
        expected += amount;
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|&id| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.confirm(&confirm_grant(), id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.balance("c1").await, expected);
    for id in ids {
        let tx = h.store.transaction(id).await.unwrap().unwrap();
        assert_eq!(tx.status, TransactionStatus::Confirmed);
    }
}
