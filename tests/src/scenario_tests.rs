//! End-to-end scenarios: scripted ledger → session → derived view.
//!
//! Each test runs a full session (aggregator + countdown ticker) on paused
//! Tokio time, so cadence and countdown are deterministic.

use anyhow::Result;
use auction_client::AuctionSession;
use auction_types::{
    AuctionStatus, BaseUnits, ConsistencyFault, PurchaseInfo, Rejection, WholeTokens,
};
use std::time::Duration;

use crate::utils::{
    buyer, settings, tokens, wait_for_status, wait_for_view, AuctionScript, ScriptedLedger,
};

// ── Status and supply ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_half_sold_auction_is_active() -> Result<()> {
    let ledger = ScriptedLedger::new(AuctionScript::half_sold());
    let session = AuctionSession::start(ledger.clone(), settings());

    let view = wait_for_status(&session, AuctionStatus::Active).await?;
    assert_eq!(view.sold_percentage.map(|p| p.to_string()).as_deref(), Some("50.0000"));
    assert_eq!(view.remaining_tokens, Some(WholeTokens::from_u64(500)));
    assert_eq!(view.total_tokens, Some(WholeTokens::from_u64(1000)));
    assert_eq!(view.max_purchasable, Some(WholeTokens::from_u64(100)));
    assert!(view.faults.is_empty());
    assert!(!view.stale);

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_paused_wins_over_active() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.paused = true;
    let ledger = ScriptedLedger::new(script);
    let session = AuctionSession::start(ledger.clone(), settings());

    let view = wait_for_status(&session, AuctionStatus::Paused).await?;
    assert_eq!(
        session.quote("1"),
        Err(Rejection::AuctionNotActive {
            status: AuctionStatus::Paused
        })
    );
    assert!(view.max_purchasable.is_some());

    // Unpausing is picked up on the next cadence read.
    ledger.script().paused = false;
    wait_for_status(&session, AuctionStatus::Active).await?;

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_wins_over_everything() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.cancelled = true;
    script.paused = true;
    script.started = false;
    let session = AuctionSession::start(ScriptedLedger::new(script), settings());

    wait_for_status(&session, AuctionStatus::Cancelled).await?;
    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_remaining_above_total_is_reported_and_clamped() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.remaining = tokens(1200);
    let session = AuctionSession::start(ScriptedLedger::new(script), settings());

    let view = wait_for_view(&session, |v| !v.faults.is_empty()).await?;
    assert!(matches!(
        view.faults[0],
        ConsistencyFault::RemainingExceedsTotal { .. }
    ));
    assert_eq!(view.remaining_tokens, Some(WholeTokens::from_u64(1000)));

    session.shutdown().await;
    Ok(())
}

// ── Per-address allowance ───────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_allowance_after_previous_purchases() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.purchases.insert(
        buyer(),
        PurchaseInfo {
            tokens_purchased: WholeTokens::from_u64(30),
            total_paid: tokens(3),
            remaining_allowance: tokens(70),
        },
    );
    let session = AuctionSession::start(ScriptedLedger::new(script), settings());
    session.connect_wallet(buyer());

    let view = wait_for_view(&session, |v| v.tokens_purchased.is_some()).await?;
    assert_eq!(view.remaining_allowance, Some(WholeTokens::from_u64(70)));
    assert_eq!(view.max_purchasable, Some(WholeTokens::from_u64(70)));
    assert_eq!(view.total_paid, Some(tokens(3)));
    assert!(matches!(
        session.quote("71"),
        Err(Rejection::ExceedsMaximum { .. })
    ));
    assert!(session.quote("70").is_ok());

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_falls_back_to_cap() -> Result<()> {
    let mut script = AuctionScript::half_sold();
    script.purchases.insert(
        buyer(),
        PurchaseInfo {
            tokens_purchased: WholeTokens::from_u64(30),
            total_paid: tokens(3),
            remaining_allowance: tokens(70),
        },
    );
    let session = AuctionSession::start(ScriptedLedger::new(script), settings());
    session.connect_wallet(buyer());
    wait_for_view(&session, |v| v.tokens_purchased.is_some()).await?;

    session.disconnect_wallet();
    let view = wait_for_view(&session, |v| v.tokens_purchased.is_none()).await?;
    assert_eq!(view.remaining_allowance, Some(WholeTokens::from_u64(100)));
    assert_eq!(view.total_paid, None);

    session.shutdown().await;
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_fractional_quantity_rejected() -> Result<()> {
    let ledger = ScriptedLedger::new(AuctionScript::half_sold());
    let session = AuctionSession::start(ledger.clone(), settings());
    wait_for_status(&session, AuctionStatus::Active).await?;

    assert_eq!(session.quote("2.5"), Err(Rejection::NotWholeNumber));
    let err = session.purchase("2.5", "").await.unwrap_err();
    assert_eq!(
        err,
        auction_client::Error::Rejected(Rejection::NotWholeNumber)
    );
    assert_eq!(ledger.script().sold, WholeTokens::from_u64(500));

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_quote_cost_is_exact() -> Result<()> {
    let session = AuctionSession::start(
        ScriptedLedger::new(AuctionScript::half_sold()),
        settings(),
    );
    wait_for_status(&session, AuctionStatus::Active).await?;

    let quote = session.quote("7")?;
    assert_eq!(quote.cost, BaseUnits::from_u128(140_000_000_000_000_000));
    assert_eq!(quote.quantity, WholeTokens::from_u64(7));

    session.shutdown().await;
    Ok(())
}

// ── Stale reads and countdown ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_failing_read_keeps_value_and_flags_stale() -> Result<()> {
    let ledger = ScriptedLedger::new(AuctionScript::half_sold());
    let session = AuctionSession::start(ledger.clone(), settings());
    let before = wait_for_status(&session, AuctionStatus::Active).await?;

    ledger
        .script()
        .failing
        .insert("getCurrentPrice", "connection refused".into());
    let view = wait_for_view(&session, |v| v.stale).await?;
    assert_eq!(view.current_price, before.current_price);
    assert_eq!(view.status, AuctionStatus::Active);

    ledger.script().failing.clear();
    wait_for_view(&session, |v| !v.stale).await?;

    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_countdown_between_failed_reads() -> Result<()> {
    let ledger = ScriptedLedger::new(AuctionScript::half_sold());
    let session = AuctionSession::start(ledger.clone(), settings());
    wait_for_status(&session, AuctionStatus::Active).await?;

    // With auction info failing, only the local clock moves the countdown.
    ledger
        .script()
        .failing
        .insert("getAuctionInfo", "node unavailable".into());
    let mut views = session.subscribe();
    let mut last = 3_600;
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let view = views.borrow_and_update().clone();
        let remaining = view.time_remaining_secs.unwrap_or(0);
        assert!(remaining <= last, "{remaining} > {last}");
        last = remaining;
    }
    assert!(last <= 3_591);
    assert!(session.view().stale);

    session.shutdown().await;
    Ok(())
}
