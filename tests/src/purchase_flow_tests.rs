//! Purchase flow against the scripted ledger: submission lifecycle, the
//! confirmation re-read, and failure reporting.

use anyhow::Result;
use auction_client::{AuctionSession, Error, PurchaseOutcome, PurchaseState};
use auction_types::{AuctionStatus, BaseUnits, WholeTokens};
use std::time::Duration;

use crate::utils::{buyer, settings, wait_for_status, wait_for_view, AuctionScript, ScriptedLedger};

#[tokio::test(start_paused = true)]
async fn test_confirmation_triggers_refresh_outside_cadence() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.hold_buys = true;
    let ledger = ScriptedLedger::new(script);
    let session = std::sync::Arc::new(AuctionSession::start(ledger.clone(), settings()));
    session.connect_wallet(buyer());
    wait_for_view(&session, |v| v.status == AuctionStatus::Active && v.tokens_purchased.is_some())
        .await?;

    let purchase = {
        let session = session.clone();
        tokio::spawn(async move { session.purchase("10", "").await })
    };
    let mut status = session.purchase_status();
    status
        .wait_for(|s| matches!(s.state, PurchaseState::Submitting { .. }))
        .await?;

    // Let a cadence tick pass while the purchase is pending, then confirm
    // halfway to the next one.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    let reads_before = ledger.info_reads();
    ledger.release_buy.notify_one();
    let receipt = purchase.await??;
    assert_eq!(receipt.quote.quantity, WholeTokens::from_u64(10));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ledger.info_reads(), reads_before + 1);

    // The re-read already shows the purchase.
    let view = session.view();
    assert_eq!(view.tokens_purchased, Some(WholeTokens::from_u64(10)));
    assert_eq!(view.remaining_allowance, Some(WholeTokens::from_u64(90)));
    assert_eq!(view.remaining_tokens, Some(WholeTokens::from_u64(490)));

    match std::sync::Arc::into_inner(session) {
        Some(session) => session.shutdown().await,
        None => anyhow::bail!("session still shared"),
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_overpay_is_attached_to_value() -> Result<()> {
    let ledger = ScriptedLedger::new(AuctionScript::half_sold());
    let session = AuctionSession::start(ledger.clone(), settings());
    wait_for_status(&session, AuctionStatus::Active).await?;

    let receipt = session.purchase("5", "0.01").await?;
    // 5 × 0.02 + 0.01
    assert_eq!(receipt.quote.cost, BaseUnits::from_u128(100_000_000_000_000_000));
    assert_eq!(receipt.overpay, BaseUnits::from_u128(10_000_000_000_000_000));
    assert_eq!(receipt.value, BaseUnits::from_u128(110_000_000_000_000_000));

    let status = session.purchase_status().borrow().clone();
    assert_eq!(status.state, PurchaseState::Idle);
    assert_eq!(status.last_outcome, Some(PurchaseOutcome::Confirmed(receipt)));

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_revert_is_surfaced_verbatim() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.revert_reason = Some("execution reverted: Auction not active".into());
    let ledger = ScriptedLedger::new(script);
    let session = AuctionSession::start(ledger.clone(), settings());
    wait_for_status(&session, AuctionStatus::Active).await?;

    let err = session.purchase("1", "").await.unwrap_err();
    assert_eq!(
        err,
        Error::Submission("execution reverted: Auction not active".into())
    );
    assert_eq!(session.purchase_status().borrow().state, PurchaseState::Idle);
    assert_eq!(ledger.script().sold, WholeTokens::from_u64(500));

    // Nothing retried on its own; a new attempt goes through once fixed.
    ledger.script().revert_reason = None;
    session.purchase("1", "").await?;
    assert_eq!(ledger.script().sold, WholeTokens::from_u64(501));

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_second_purchase_refused_while_submitting() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.hold_buys = true;
    let ledger = ScriptedLedger::new(script);
    let session = std::sync::Arc::new(AuctionSession::start(ledger.clone(), settings()));
    wait_for_status(&session, AuctionStatus::Active).await?;

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.purchase("1", "").await })
    };
    session
        .purchase_status()
        .wait_for(|s| s.state != PurchaseState::Idle)
        .await?;

    assert_eq!(session.purchase("1", "").await, Err(Error::PurchaseInFlight));

    ledger.release_buy.notify_one();
    first.await??;
    assert_eq!(ledger.script().sold, WholeTokens::from_u64(501));
    Ok(())
}
