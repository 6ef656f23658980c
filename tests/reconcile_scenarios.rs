// tests/reconcile_scenarios.rs
//
// Hand-computed reconciliation scenarios against the public API.

use criteria_weight_balancer::{
    reconcile, reconcile_parallel, CriterionInput, DivergenceCause, GrandTotal,
};

const EPS: f64 = 1e-9;

fn approx(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

#[test]
fn two_row_balance_hits_target_exactly() {
    // U = 50*4 = 200; denom = 0.75; T = 266.67; w0 = 0.25*T/100 = 0.667.
    let r = reconcile_parallel(&[100.0, 50.0], &[true, false], &[0.25, 0.0], &[0.0, 4.0])
        .expect("equal lengths");

    let total = r.total.value().expect("feasible");
    assert!(approx(total, 800.0 / 3.0, 1e-9));
    assert!(approx(r.solved_total.unwrap(), 800.0 / 3.0, 1e-9));
    assert!(approx(r.rows[0].effective_weight, 2.0 / 3.0, 1e-9));
    assert!(approx(r.rows[0].weighted_score, 200.0 / 3.0, 1e-9));
    assert!(approx(r.rows[1].weighted_score, 200.0, EPS));
    assert!(approx(r.rows[0].share_of_total, 0.25, EPS));
    assert!(approx(r.rows[1].share_of_total, 0.75, EPS));
    assert!(r.divergences().is_empty());
}

#[test]
fn over_claimed_locks_are_infeasible() {
    let r = reconcile_parallel(&[100.0, 80.0], &[true, true], &[0.6, 0.5], &[1.0, 1.0]).unwrap();

    assert!(!r.total.is_feasible());
    assert!(!r.total.as_f64().is_finite());
    match r.total {
        GrandTotal::Infeasible { claimed } => assert!(approx(claimed, 1.1, EPS)),
        other => panic!("expected infeasible, got {other:?}"),
    }
    assert_eq!(r.effective_weights(), vec![0.0, 0.0]);
    assert_eq!(r.shares(), vec![0.0, 0.0]);
}

#[test]
fn exactly_full_claim_is_infeasible() {
    let r = reconcile(&[
        CriterionInput::locked(10.0, 0.5),
        CriterionInput::locked(10.0, 0.5),
        CriterionInput::free(10.0, 3.0),
    ]);
    assert!(!r.total.is_feasible());
    assert_eq!(r.solved_total, None);
    // Unlocked rows keep their clamped free weight.
    assert_eq!(r.rows[2].effective_weight, 3.0);
}

#[test]
fn zero_score_lock_surfaces_unmet_target() {
    let r = reconcile(&[
        CriterionInput::locked(0.0, 0.2),
        CriterionInput::free(50.0, 2.0),
    ]);

    assert_eq!(r.rows[0].effective_weight, 0.0);
    assert_eq!(r.rows[0].weighted_score, 0.0);
    assert!(approx(r.rows[1].weighted_score, 100.0, EPS));
    // Back-solved total assumes the lock holds; realized total does not.
    assert!(approx(r.solved_total.unwrap(), 125.0, EPS));
    assert_eq!(r.total, GrandTotal::Feasible { total: 100.0 });
    assert_eq!(r.rows[0].share_of_total, 0.0);
    assert_eq!(r.rows[1].share_of_total, 1.0);

    let d = r.divergences();
    assert_eq!(d.len(), 1);
    assert_eq!(d[0].index, 0);
    assert_eq!(d[0].cause, DivergenceCause::ZeroScore);
    assert!(approx(d[0].requested, 0.2, EPS));
    assert_eq!(d[0].realized, 0.0);
}

#[test]
fn free_weight_outside_range_is_clamped() {
    let r = reconcile(&[
        CriterionInput::free(10.0, 15.0),
        CriterionInput::free(10.0, -4.0),
        CriterionInput::free(10.0, 7.5),
    ]);
    assert_eq!(r.effective_weights(), vec![10.0, 0.0, 7.5]);
    assert_eq!(r.total, GrandTotal::Feasible { total: 175.0 });
}

#[test]
fn clamped_free_weight_feeds_the_back_solve() {
    // U uses the clamped 10, not 15: T = 10*10 / 0.5 = 200.
    let r = reconcile(&[
        CriterionInput::locked(20.0, 0.5),
        CriterionInput::free(10.0, 15.0),
    ]);
    assert!(approx(r.solved_total.unwrap(), 200.0, EPS));
    assert!(approx(r.rows[0].effective_weight, 5.0, EPS));
    assert!(approx(r.rows[0].share_of_total, 0.5, EPS));
}

#[test]
fn saturated_lock_reports_clamp_and_keeps_conservation() {
    let r = reconcile(&[
        CriterionInput::locked(1.0, 0.9),
        CriterionInput::free(200.0, 10.0),
    ]);
    assert_eq!(r.rows[0].effective_weight, 10.0);
    let total = r.total.value().unwrap();
    assert!(approx(total, 2010.0, EPS));
    let sum: f64 = r.shares().iter().sum();
    assert!(approx(sum, 1.0, EPS));
    assert_eq!(r.divergences()[0].cause, DivergenceCause::ClampedHigh);
}

#[test]
fn only_locked_rows_with_room_left_collapse_to_zero_total() {
    // No unlocked contribution: T = 0, so every locked weight solves to 0.
    let r = reconcile(&[CriterionInput::locked(10.0, 0.3), CriterionInput::locked(20.0, 0.3)]);
    assert_eq!(r.total, GrandTotal::Feasible { total: 0.0 });
    assert_eq!(r.shares(), vec![0.0, 0.0]);
    assert!(r
        .divergences()
        .iter()
        .all(|d| d.cause == DivergenceCause::KnockOn));
}

#[test]
fn locked_share_ignored_for_unlocked_rows() {
    let a = reconcile_parallel(&[10.0, 20.0], &[false, false], &[0.9, 0.9], &[1.0, 2.0]).unwrap();
    let b = reconcile_parallel(&[10.0, 20.0], &[false, false], &[0.0, 0.0], &[1.0, 2.0]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.claimed_share, 0.0);
}
