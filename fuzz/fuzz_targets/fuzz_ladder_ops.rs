#![no_main]

use arbitrary::Arbitrary;
use darwin_ladder::{LadderConfig, LadderCoordinator, LevelTable, PromotionPolicy};
use libfuzzer_sys::fuzz_target;

/// One externally triggerable ladder operation.
#[derive(Arbitrary, Debug)]
enum Op {
    /// Request a match for a player.
    Request(u8),
    /// Withdraw a queued player.
    Withdraw(u8),
    /// Acknowledge match start.
    Confirm(u8, u8),
    /// Report an outcome for a player's current match.
    Report(u8),
    /// Deactivate a player.
    Deactivate(u8),
    /// Move a player to a level directly.
    Transition(u8, u8),
}

/// Structured input: an operation sequence over a small player pool.
#[derive(Arbitrary, Debug)]
struct LadderInput {
    /// Operations to apply in order.
    ops: Vec<Op>,
}

fuzz_target!(|input: LadderInput| {
    let Ok(table) = LevelTable::new(vec![8, 4, 2]) else {
        return;
    };
    let config = LadderConfig {
        initial_genes: 300,
        ..LadderConfig::default()
    };
    let coordinator = LadderCoordinator::new(table, config, PromotionPolicy::default());

    let name = |p: u8| format!("p{}", p % 8);
    for op in input.ops.iter().take(256) {
        match op {
            Op::Request(p) => {
                let _ = coordinator.request_match(&name(*p));
            }
            Op::Withdraw(p) => {
                let _ = coordinator.withdraw(&name(*p));
            }
            Op::Confirm(p, m) => {
                let _ = coordinator.confirm_start(u64::from(*m), &name(*p));
            }
            Op::Report(p) => {
                let player = name(*p);
                if let Ok(Some(match_id)) = coordinator.current_match(&player) {
                    let _ = coordinator.report_outcome(match_id, &player);
                }
            }
            Op::Deactivate(p) => {
                let _ = coordinator.deactivate(&name(*p));
            }
            Op::Transition(p, level) => {
                let _ = coordinator
                    .registry()
                    .transition_level(&name(*p), level % 4);
            }
        }
    }

    let violations = coordinator
        .check_invariants()
        .expect("state must stay readable");
    assert!(violations.is_empty(), "violations: {violations:?}");
});
