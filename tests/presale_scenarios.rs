//! End-to-end presale scenarios
//!
//! Exercises the full stack: encrypted bids through the input gateway,
//! confidential custody transfers, finalize branching, pro-rata settlement,
//! and the one-shot claim/refund actions.

use once_cell::sync::Lazy;
use veilraise::prelude::*;
use veilraise::config::WEI_PER_UNIT;

// Key generation dominates test cost; every scenario shares one key pair.
static KEYS: Lazy<(ClientKey, ServerKey)> = Lazy::new(|| {
    let client_key = ClientKey::generate(&FheConfig::default()).expect("keygen");
    let server_key = client_key.derive_server_key();
    (client_key, server_key)
});

const OPERATOR: Address = [0x0A; 32];
const POOL: Address = [0xAA; 32];
const PAYMENT_ASSET: Address = [0xE0; 32];
const SALE_ASSET: Address = [0xE1; 32];
const ALICE: Address = [0x01; 32];
const BOB: Address = [0x02; 32];
const CHARLIE: Address = [0x03; 32];

const START: u64 = 100;
const END: u64 = 200;
const AFTER_END: u64 = 300;

struct Fixture {
    vault: HandleVault,
    payment: ConfidentialToken,
    sale_token: ConfidentialToken,
    presale: Presale,
}

/// Pool with hard cap 10, soft cap 6, reserve 10_000_000 (rate 1000
/// wrapped sale-token units per payment unit).
fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt::try_init();
    let mut vault = HandleVault::with_keys(KEYS.0.clone(), KEYS.1.clone());
    let payment = ConfidentialToken::new(PAYMENT_ASSET, WEI_PER_UNIT);
    let sale_token = ConfidentialToken::new(SALE_ASSET, 1_000);
    let options = PresaleOptions::new(10_000_000, 10, 6, START, END);
    let presale = Presale::new(&mut vault, OPERATOR, POOL, options).expect("pool construction");
    Fixture {
        vault,
        payment,
        sale_token,
        presale,
    }
}

/// Fund a participant with `units` payment units and bid them all.
fn fund_and_bid(fx: &mut Fixture, who: Address, units: u64) {
    fx.payment
        .wrap(&mut fx.vault, &who, units * WEI_PER_UNIT)
        .expect("wrap payment");
    let (encoded, proof) = fx.vault.encode_input(units, &who).expect("encode bid");
    fx.presale
        .place_bid(&mut fx.vault, &mut fx.payment, START + 10, who, &encoded, &proof)
        .expect("place bid");
}

fn payment_balance(fx: &Fixture, who: &Address) -> u64 {
    let handle = fx.payment.balance_of(who).expect("payment balance");
    fx.vault.decrypt(handle, who).expect("decrypt balance")
}

fn sale_balance(fx: &Fixture, who: &Address) -> u64 {
    let handle = fx.sale_token.balance_of(who).expect("sale balance");
    fx.vault.decrypt(handle, who).expect("decrypt balance")
}

fn allocation(fx: &Fixture, who: &Address) -> u64 {
    let handle = fx.presale.claimable_of(who).expect("allocation");
    fx.vault.decrypt(handle, who).expect("decrypt allocation")
}

// ============================================================================
// Happy path: exact hard cap, fill ratio 1, everyone fully served
// ============================================================================

#[test]
fn happy_path_full_fill() {
    let mut fx = fixture();

    fund_and_bid(&mut fx, ALICE, 4);
    fund_and_bid(&mut fx, BOB, 4);
    fund_and_bid(&mut fx, CHARLIE, 2);

    // Bidding after the window always fails, even before finalize
    let (encoded, proof) = fx.vault.encode_input(1, &ALICE).unwrap();
    assert!(matches!(
        fx.presale
            .place_bid(&mut fx.vault, &mut fx.payment, END + 1, ALICE, &encoded, &proof),
        Err(PresaleError::BiddingClosed { .. })
    ));

    // Aggregate equals the hard cap: fill ratio 1, sold = 10 * rate
    let outcome = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            10,
            10_000,
            1,
            1,
        )
        .unwrap();
    assert_eq!(outcome, SaleOutcome::Success);
    assert_eq!(fx.presale.state(), PoolState::Finalized);
    assert_eq!(fx.presale.fill_ratio(), Some((1, 1)));
    assert_eq!(fx.presale.wei_raised(), 10 * WEI_PER_UNIT as u128);
    assert_eq!(fx.presale.tokens_sold(), 10_000_000);

    // Operator received and unwrapped the full raise
    assert_eq!(payment_balance(&fx, &OPERATOR), 0);

    // Claims consume what settlement writes; nothing settled yet
    assert_eq!(
        fx.presale
            .claim_tokens(&mut fx.vault, &mut fx.sale_token, ALICE)
            .unwrap_err(),
        PresaleError::NothingToClaim
    );

    for (who, bid) in [(ALICE, 4u64), (BOB, 4), (CHARLIE, 2)] {
        fx.presale
            .settle_bid(&mut fx.vault, &mut fx.payment, who)
            .unwrap();
        // Fill ratio 1: used == contribution, refund == 0
        assert_eq!(allocation(&fx, &who), bid * 1_000);
        assert_eq!(payment_balance(&fx, &who), 0);
    }

    // Settlement is one-shot
    assert_eq!(
        fx.presale
            .settle_bid(&mut fx.vault, &mut fx.payment, ALICE)
            .unwrap_err(),
        PresaleError::AlreadySettled
    );

    for (who, bid) in [(ALICE, 4u64), (BOB, 4), (CHARLIE, 2)] {
        fx.presale
            .claim_tokens(&mut fx.vault, &mut fx.sale_token, who)
            .unwrap();
        assert_eq!(sale_balance(&fx, &who), bid * 1_000);
    }

    // Claiming is one-shot
    assert_eq!(
        fx.presale
            .claim_tokens(&mut fx.vault, &mut fx.sale_token, BOB)
            .unwrap_err(),
        PresaleError::AlreadyClaimed
    );

    // Refunds belong to the failure path
    assert!(matches!(
        fx.presale.refund(&mut fx.vault, &mut fx.payment, ALICE),
        Err(PresaleError::StateViolation { .. })
    ));

    assert!(fx.presale.events().iter().any(|e| matches!(
        e,
        PresaleEvent::PoolResolved {
            outcome: SaleOutcome::Success,
            ..
        }
    )));
}

// ============================================================================
// Failure path: soft cap missed, full refunds
// ============================================================================

#[test]
fn failure_path_full_refund() {
    let mut fx = fixture();

    fund_and_bid(&mut fx, ALICE, 4);

    let outcome = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            4,
            0,
            1,
            1,
        )
        .unwrap();
    assert_eq!(outcome, SaleOutcome::Failure);
    assert_eq!(fx.presale.state(), PoolState::Cancelled);
    // The whole reserve went back to the operator
    assert_eq!(fx.presale.token_balance(), 0);
    assert!(fx.presale.events().iter().any(|e| matches!(
        e,
        PresaleEvent::PoolResolved {
            outcome: SaleOutcome::Failure,
            tokens_returned: 10_000_000,
            ..
        }
    )));

    // No claims on a cancelled pool
    assert!(matches!(
        fx.presale
            .claim_tokens(&mut fx.vault, &mut fx.sale_token, ALICE),
        Err(PresaleError::StateViolation { .. })
    ));
    assert!(matches!(
        fx.presale.settle_bid(&mut fx.vault, &mut fx.payment, ALICE),
        Err(PresaleError::StateViolation { .. })
    ));

    // Full contribution comes back, exactly once
    assert_eq!(payment_balance(&fx, &ALICE), 0);
    fx.presale
        .refund(&mut fx.vault, &mut fx.payment, ALICE)
        .unwrap();
    assert_eq!(payment_balance(&fx, &ALICE), 4);
    assert_eq!(
        fx.presale
            .refund(&mut fx.vault, &mut fx.payment, ALICE)
            .unwrap_err(),
        PresaleError::AlreadyRefunded
    );

    // A bystander with no contribution cannot refund
    assert_eq!(
        fx.presale
            .refund(&mut fx.vault, &mut fx.payment, BOB)
            .unwrap_err(),
        PresaleError::NoContribution
    );

    // Terminal: a second finalize is rejected
    assert!(matches!(
        fx.presale.finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            4,
            0,
            1,
            1,
        ),
        Err(PresaleError::StateViolation { .. })
    ));
}

// ============================================================================
// Oversubscription: pro-rata fill with truncating division
// ============================================================================

#[test]
fn oversubscribed_pro_rata_settlement() {
    let mut fx = fixture();

    fund_and_bid(&mut fx, ALICE, 6);
    fund_and_bid(&mut fx, BOB, 5);
    fund_and_bid(&mut fx, CHARLIE, 4);

    // 15 raised against a hard cap of 10: accepted aggregate capped at 10,
    // fill ratio 10/15
    let outcome = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            10,
            10_000,
            10,
            15,
        )
        .unwrap();
    assert_eq!(outcome, SaleOutcome::Success);
    assert_eq!(payment_balance(&fx, &OPERATOR), 0);

    for who in [ALICE, BOB, CHARLIE] {
        fx.presale
            .settle_bid(&mut fx.vault, &mut fx.payment, who)
            .unwrap();
    }

    // used = contribution * 10 / 15, truncating
    assert_eq!(allocation(&fx, &ALICE), 4 * 1_000);
    assert_eq!(allocation(&fx, &BOB), 3 * 1_000);
    assert_eq!(allocation(&fx, &CHARLIE), 2 * 1_000);

    // Alice: used 4, refund 2; Bob: used 3, refund 2
    assert_eq!(payment_balance(&fx, &ALICE), 2);
    assert_eq!(payment_balance(&fx, &BOB), 2);

    // The operator withdrawal takes floor(15 * 10/15) = 10, leaving 5 in
    // the pool against 6 units of requested refunds. Min-semantics short
    // the last settler by the truncation dust: Charlie receives 1, not 2.
    assert_eq!(payment_balance(&fx, &CHARLIE), 1);

    // Conservation: the truncated used amounts never exceed the accepted
    // aggregate (residual dust is a designed consequence of truncation)
    let used_sum: u64 = [ALICE, BOB, CHARLIE]
        .iter()
        .map(|who| allocation(&fx, who) / 1_000)
        .sum();
    assert!(used_sum <= 10);

    // Allocations are claimable in full out of the wrapped inventory
    for who in [ALICE, BOB, CHARLIE] {
        fx.presale
            .claim_tokens(&mut fx.vault, &mut fx.sale_token, who)
            .unwrap();
    }
    assert_eq!(sale_balance(&fx, &ALICE), 4_000);
    assert_eq!(sale_balance(&fx, &CHARLIE), 2_000);
}

// ============================================================================
// Finalize retry: a failed attempt leaves collaborator state untouched
// ============================================================================

#[test]
fn finalize_retry_after_inconsistent_figures() {
    let mut fx = fixture();

    fund_and_bid(&mut fx, ALICE, 6);
    fund_and_bid(&mut fx, BOB, 5);
    fund_and_bid(&mut fx, CHARLIE, 4);

    // Fill 9/15 moves only floor(15 * 9/15) = 9 units to the operator,
    // which cannot fund the claimed 10-unit release
    let err = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            10,
            10_000,
            9,
            15,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PresaleError::Token(TokenError::InsufficientBalance { .. })
    ));

    // Only the retry marker survives the failure: no inventory wrapped,
    // no payment moved, no fill ratio recorded
    assert_eq!(fx.presale.state(), PoolState::AwaitingFinalize);
    assert_eq!(fx.sale_token.total_wrapped(), 0);
    assert_eq!(payment_balance(&fx, &POOL), 15);
    assert!(fx.payment.balance_of(&OPERATOR).is_none());
    assert_eq!(fx.presale.fill_ratio(), None);

    // Corrected figures finalize cleanly from the marker
    let outcome = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            10,
            10_000,
            10,
            15,
        )
        .unwrap();
    assert_eq!(outcome, SaleOutcome::Success);
    assert_eq!(fx.presale.state(), PoolState::Finalized);
    // Inventory was wrapped exactly once
    assert_eq!(fx.sale_token.total_wrapped(), 10_000);
    assert_eq!(payment_balance(&fx, &POOL), 5);

    for who in [ALICE, BOB, CHARLIE] {
        fx.presale
            .settle_bid(&mut fx.vault, &mut fx.payment, who)
            .unwrap();
        fx.presale
            .claim_tokens(&mut fx.vault, &mut fx.sale_token, who)
            .unwrap();
    }
    assert_eq!(sale_balance(&fx, &ALICE), 4_000);
    assert_eq!(sale_balance(&fx, &BOB), 3_000);
    assert_eq!(sale_balance(&fx, &CHARLIE), 2_000);
}

// ============================================================================
// Soft-cap boundary
// ============================================================================

#[test]
fn boundary_exactly_soft_cap_succeeds() {
    let mut fx = fixture();
    fund_and_bid(&mut fx, ALICE, 6);

    let outcome = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            6,
            6_000,
            1,
            1,
        )
        .unwrap();
    assert_eq!(outcome, SaleOutcome::Success);
    assert_eq!(fx.presale.state(), PoolState::Finalized);
    // Unsold surplus went back to the operator
    assert!(fx.presale.events().iter().any(|e| matches!(
        e,
        PresaleEvent::PoolResolved {
            outcome: SaleOutcome::Success,
            tokens_returned: 4_000_000,
            ..
        }
    )));
}

#[test]
fn boundary_one_below_soft_cap_cancels() {
    let mut fx = fixture();
    fund_and_bid(&mut fx, ALICE, 5);

    let outcome = fx
        .presale
        .finalize_pre_sale(
            &mut fx.vault,
            &mut fx.payment,
            &mut fx.sale_token,
            OPERATOR,
            AFTER_END,
            5,
            0,
            1,
            1,
        )
        .unwrap();
    assert_eq!(outcome, SaleOutcome::Failure);
    assert_eq!(fx.presale.state(), PoolState::Cancelled);
}
