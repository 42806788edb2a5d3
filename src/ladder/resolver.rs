//! Encounter resolution: outcome -> genes, counters, rank.
//!
//! The economic steps are the durable source of truth. Once the entry
//! debits have been applied, nothing rolls them back: a promotion or
//! demotion blocked by capacity is logged and surfaced as a
//! partial-success `ResolvedWithRankUnchanged`, never as a failure,
//! since re-running the resolution would double-charge.
//!
//! Resolution holds the match lock end to end, which is what makes a
//! match resolve at most once: a concurrent second report observes
//! `Completed` and fails with `InvalidOutcome`, side-effect free.

use std::time::SystemTime;

use log::{debug, warn};

use crate::error::{LadderError, LadderResult};
use crate::ladder::{
    Genes, LadderConfig, Match, MatchId, MatchPairingEngine, MatchState, MatchStatus, PlayerId,
    PlayerRegistry, PromotionPolicy, Standing,
};

/// One participant's post-resolution view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOutcome {
    /// The participant.
    pub id: PlayerId,
    /// Level occupied when the match was played.
    pub prior_level: u8,
    /// Standing after resolution; `standing.level != prior_level`
    /// means the player moved.
    pub standing: Standing,
}

/// Post-resolution view of both participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// The resolved match.
    pub match_id: MatchId,
    /// The declared winner.
    pub winner: PlayerOutcome,
    /// The other participant.
    pub loser: PlayerOutcome,
}

/// Outcome of a resolution attempt that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Economic and rank effects fully applied.
    Resolved(MatchResult),
    /// Economic effects applied; a promotion or demotion was blocked
    /// (typically `LevelFull`). Partial success, not an error.
    ResolvedWithRankUnchanged(MatchResult),
    /// The defensive entry-cost re-check failed: the match completed
    /// with no winner and no economic effect.
    Voided {
        /// The voided match.
        match_id: MatchId,
    },
}

/// Negated debit delta for a gene amount.
fn debit(amount: Genes) -> i64 {
    -i64::try_from(amount).unwrap_or(i64::MAX)
}

/// Credit delta for a gene amount.
fn credit(amount: Genes) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

/// Apply a completed encounter's outcome exactly once.
///
/// Steps, per the resolution algorithm: validate, debit both entries
/// (voiding on an unaffordable entry), credit the winner and penalize
/// the loser, bump counters, evaluate promotion/demotion under the
/// policy, then complete the match and return both players to `Idle`.
///
/// # Errors
///
/// Returns `InvalidOutcome` for an unknown match, a match that is not
/// `Active`, a declared winner who did not participate, or a repeated
/// resolution. Capacity-blocked rank moves are not errors; they yield
/// `Resolution::ResolvedWithRankUnchanged`.
pub fn resolve_outcome(
    registry: &PlayerRegistry,
    pairing: &MatchPairingEngine,
    config: &LadderConfig,
    policy: &PromotionPolicy,
    match_id: MatchId,
    winner_id: &str,
) -> LadderResult<Resolution> {
    let handle = pairing.match_handle(match_id).map_err(|e| match e {
        LadderError::UnknownMatch(id) => {
            LadderError::InvalidOutcome(format!("no such match {id}"))
        }
        other => other,
    })?;
    let mut m = handle.lock().map_err(|_| LadderError::Poisoned)?;

    match m.status {
        MatchStatus::Completed => {
            return Err(LadderError::InvalidOutcome(format!(
                "match {match_id} already resolved"
            )));
        }
        MatchStatus::Pending => {
            return Err(LadderError::InvalidOutcome(format!(
                "match {match_id} has not started"
            )));
        }
        MatchStatus::Active => {}
    }
    if !m.involves(winner_id) {
        return Err(LadderError::InvalidOutcome(format!(
            "player {winner_id} is not in match {match_id}"
        )));
    }
    let winner = winner_id.to_owned();
    let loser = m
        .opponent_of(winner_id)
        .cloned()
        .ok_or_else(|| LadderError::InvalidOutcome(format!("match {match_id} has no opponent")))?;

    // Entry cost is re-checked defensively at resolution time. Either
    // side failing voids the match with zero net economic effect.
    match registry.adjust_genes(&winner, debit(config.entry_cost)) {
        Ok(_) => {}
        Err(LadderError::InsufficientFunds { .. }) => {
            return void(registry, pairing, &mut m);
        }
        Err(e) => return Err(e),
    }
    match registry.adjust_genes(&loser, debit(config.entry_cost)) {
        Ok(_) => {}
        Err(LadderError::InsufficientFunds { .. }) => {
            registry.adjust_genes(&winner, credit(config.entry_cost))?;
            return void(registry, pairing, &mut m);
        }
        Err(e) => return Err(e),
    }

    // Economic effects: durable from here on.
    registry.adjust_genes(&winner, credit(config.winner_reward))?;
    registry.apply_penalty(&loser, config.loser_penalty)?;

    let win_streak = registry.record_win(&winner)?;
    let loss_streak = registry.record_loss(&loser)?;

    let level = m.level;
    let mut rank_unchanged = false;

    if win_streak >= policy.promote_streak && registry.levels().is_valid_level(level + 1) {
        match registry.transition_level(&winner, level + 1) {
            Ok(_) => {
                registry.reset_streaks(&winner)?;
                debug!("match {match_id}: {winner} promoted to level {}", level + 1);
            }
            Err(e) => {
                warn!("match {match_id}: promotion of {winner} blocked: {e}");
                rank_unchanged = true;
            }
        }
    }
    if loss_streak >= policy.demote_streak && level > 1 {
        match registry.transition_level(&loser, level - 1) {
            Ok(_) => {
                registry.reset_streaks(&loser)?;
                debug!("match {match_id}: {loser} demoted to level {}", level - 1);
            }
            Err(e) => {
                warn!("match {match_id}: demotion of {loser} blocked: {e}");
                rank_unchanged = true;
            }
        }
    }

    m.status = MatchStatus::Completed;
    m.winner = Some(winner.clone());
    m.end_time = Some(SystemTime::now());
    registry.set_match_state(&winner, MatchState::Idle)?;
    registry.set_match_state(&loser, MatchState::Idle)?;
    pairing.detach(match_id)?;

    let result = MatchResult {
        match_id,
        winner: PlayerOutcome {
            standing: registry.standing(&winner)?,
            id: winner,
            prior_level: level,
        },
        loser: PlayerOutcome {
            standing: registry.standing(&loser)?,
            id: loser,
            prior_level: level,
        },
    };
    Ok(if rank_unchanged {
        Resolution::ResolvedWithRankUnchanged(result)
    } else {
        Resolution::Resolved(result)
    })
}

/// Complete a match with no winner and no economic effect.
fn void(
    registry: &PlayerRegistry,
    pairing: &MatchPairingEngine,
    m: &mut Match,
) -> LadderResult<Resolution> {
    warn!("match {} voided: entry cost unaffordable", m.id);
    m.status = MatchStatus::Completed;
    m.winner = None;
    m.end_time = Some(SystemTime::now());
    registry.set_match_state(&m.player1, MatchState::Idle)?;
    registry.set_match_state(&m.player2, MatchState::Idle)?;
    pairing.detach(m.id)?;
    Ok(Resolution::Voided { match_id: m.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::{LevelTable, MatchRequest};

    fn config() -> LadderConfig {
        LadderConfig {
            entry_cost: 100,
            winner_reward: 75,
            loser_penalty: 100,
            initial_genes: 1000,
        }
    }

    fn setup(capacities: Vec<u32>) -> (PlayerRegistry, MatchPairingEngine) {
        let table = LevelTable::new(capacities).unwrap();
        let engine = MatchPairingEngine::new(table.level_count());
        let registry = PlayerRegistry::new(table, config().initial_genes);
        (registry, engine)
    }

    fn play(registry: &PlayerRegistry, engine: &MatchPairingEngine, a: &str, b: &str) -> MatchId {
        engine.request(registry, a).unwrap();
        let MatchRequest::Paired(id) = engine.request(registry, b).unwrap() else {
            panic!("expected pairing");
        };
        engine.confirm_start(id, a).unwrap();
        engine.confirm_start(id, b).unwrap();
        id
    }

    #[test]
    fn test_worked_scenario() {
        // A and B at level 1 with 1000 genes each, cost 100, reward 75,
        // penalty 100: A ends at 975, B at 800.
        let (registry, engine) = setup(vec![8, 4]);
        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        let id = play(&registry, &engine, "a", "b");

        let resolution =
            resolve_outcome(&registry, &engine, &config(), &PromotionPolicy::default(), id, "a")
                .unwrap();
        let Resolution::Resolved(result) = resolution else {
            panic!("expected full resolution");
        };
        assert_eq!(result.winner.standing.genes, 975);
        assert_eq!(result.loser.standing.genes, 800);
        assert_eq!(result.winner.standing.wins, 1);
        assert_eq!(result.loser.standing.losses, 1);

        let a = registry.standing("a").unwrap();
        let b = registry.standing("b").unwrap();
        assert_eq!((a.genes, a.wins), (975, 1));
        assert_eq!((b.genes, b.losses), (800, 1));

        // Both returned to Idle: they can queue again
        engine.request(&registry, "a").unwrap();
        engine.request(&registry, "b").unwrap();
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (registry, engine) = setup(vec![8, 4]);
        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        let id = play(&registry, &engine, "a", "b");

        let policy = PromotionPolicy::default();
        resolve_outcome(&registry, &engine, &config(), &policy, id, "a").unwrap();
        let second = resolve_outcome(&registry, &engine, &config(), &policy, id, "a");
        assert!(matches!(second, Err(LadderError::InvalidOutcome(_))));

        // No additional economic effect
        assert_eq!(registry.standing("a").unwrap().genes, 975);
        assert_eq!(registry.standing("b").unwrap().genes, 800);
    }

    #[test]
    fn test_rejects_non_participant_and_pending() {
        let (registry, engine) = setup(vec![8, 4]);
        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        engine.request(&registry, "a").unwrap();
        let MatchRequest::Paired(id) = engine.request(&registry, "b").unwrap() else {
            panic!("expected pairing");
        };

        let policy = PromotionPolicy::default();
        // Not yet active
        assert!(matches!(
            resolve_outcome(&registry, &engine, &config(), &policy, id, "a"),
            Err(LadderError::InvalidOutcome(_))
        ));
        engine.confirm_start(id, "a").unwrap();
        engine.confirm_start(id, "b").unwrap();
        // Outsider declared as winner
        assert!(matches!(
            resolve_outcome(&registry, &engine, &config(), &policy, id, "c"),
            Err(LadderError::InvalidOutcome(_))
        ));
        // Unknown match
        assert!(matches!(
            resolve_outcome(&registry, &engine, &config(), &policy, 999, "a"),
            Err(LadderError::InvalidOutcome(_))
        ));
    }

    #[test]
    fn test_unaffordable_entry_voids() {
        let (registry, engine) = setup(vec![8, 4]);
        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        // Drain B below the entry cost after pairing
        let id = play(&registry, &engine, "a", "b");
        registry.adjust_genes("b", -950).unwrap();

        let resolution =
            resolve_outcome(&registry, &engine, &config(), &PromotionPolicy::default(), id, "a")
                .unwrap();
        assert_eq!(resolution, Resolution::Voided { match_id: id });

        // Zero net economic effect: A was refunded, B untouched
        assert_eq!(registry.standing("a").unwrap().genes, 1000);
        assert_eq!(registry.standing("b").unwrap().genes, 50);
        assert_eq!(registry.standing("a").unwrap().wins, 0);

        let m = engine.match_handle(id).unwrap();
        let m = m.lock().unwrap();
        assert_eq!(m.status, MatchStatus::Completed);
        assert_eq!(m.winner, None);
    }

    #[test]
    fn test_promotion_on_streak() {
        let (registry, engine) = setup(vec![8, 4]);
        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        let policy = PromotionPolicy {
            promote_streak: 3,
            demote_streak: 3,
        };

        for round in 1..=3 {
            let id = play(&registry, &engine, "a", "b");
            let resolution =
                resolve_outcome(&registry, &engine, &config(), &policy, id, "a").unwrap();
            let Resolution::Resolved(result) = resolution else {
                panic!("expected full resolution in round {round}");
            };
            let expected_level = if round == 3 { 2 } else { 1 };
            assert_eq!(result.winner.standing.level, expected_level);
        }

        // initial - 3*entry + 3*reward
        let a = registry.standing("a").unwrap();
        assert_eq!(a.genes, 1000 - 3 * 100 + 3 * 75);
        assert_eq!(a.level, 2);
        // B stayed on the level-1 floor despite the loss streak
        assert_eq!(registry.standing("b").unwrap().level, 1);
    }

    #[test]
    fn test_blocked_promotion_is_partial_success() {
        // Levels 8 / 2: saturate level 2, then earn a promotion into it.
        let (registry, engine) = setup(vec![8, 2]);
        for id in ["a", "b", "c", "d"] {
            registry.get_or_create(id).unwrap();
        }
        registry.transition_level("c", 2).unwrap();
        registry.transition_level("d", 2).unwrap();

        let policy = PromotionPolicy {
            promote_streak: 1,
            demote_streak: u32::MAX,
        };
        let id = play(&registry, &engine, "a", "b");
        let resolution =
            resolve_outcome(&registry, &engine, &config(), &policy, id, "a").unwrap();
        let Resolution::ResolvedWithRankUnchanged(result) = resolution else {
            panic!("expected partial success");
        };
        // Held at the prior level, economics fully applied
        assert_eq!(result.winner.standing.level, 1);
        assert_eq!(result.winner.standing.genes, 975);
        assert_eq!(registry.occupancy(2).unwrap(), 2);
        // The streak survives a blocked promotion, so the next win retries
        let id = play(&registry, &engine, "a", "b");
        let resolution =
            resolve_outcome(&registry, &engine, &config(), &policy, id, "a").unwrap();
        assert!(matches!(resolution, Resolution::ResolvedWithRankUnchanged(_)));
    }

    #[test]
    fn test_full_top_level_holds_winner_at_nine() {
        // Production table: level 10 holds two players. A third player
        // earning promotion at level 9 stays there.
        let table = LevelTable::default();
        let engine = MatchPairingEngine::new(table.level_count());
        let registry = PlayerRegistry::new(table, 100_000);
        for id in ["a", "b", "top1", "top2"] {
            registry.get_or_create(id).unwrap();
        }
        registry.transition_level("top1", 10).unwrap();
        registry.transition_level("top2", 10).unwrap();
        registry.transition_level("a", 9).unwrap();
        registry.transition_level("b", 9).unwrap();

        let policy = PromotionPolicy {
            promote_streak: 1,
            demote_streak: u32::MAX,
        };
        let id = play(&registry, &engine, "a", "b");
        let resolution =
            resolve_outcome(&registry, &engine, &config(), &policy, id, "a").unwrap();
        assert!(matches!(resolution, Resolution::ResolvedWithRankUnchanged(_)));
        assert_eq!(registry.standing("a").unwrap().level, 9);
        assert_eq!(registry.occupancy(10).unwrap(), 2);
    }

    #[test]
    fn test_demotion_on_streak() {
        let (registry, engine) = setup(vec![8, 4]);
        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        registry.transition_level("a", 2).unwrap();
        registry.transition_level("b", 2).unwrap();

        let policy = PromotionPolicy {
            promote_streak: u32::MAX,
            demote_streak: 2,
        };
        for _ in 0..2 {
            let id = play(&registry, &engine, "a", "b");
            resolve_outcome(&registry, &engine, &config(), &policy, id, "a").unwrap();
        }
        assert_eq!(registry.standing("b").unwrap().level, 1);
        assert_eq!(registry.standing("a").unwrap().level, 2);
        assert_eq!(registry.occupancy(1).unwrap(), 1);
        assert_eq!(registry.occupancy(2).unwrap(), 1);
    }
}
