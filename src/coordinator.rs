//! Ladder coordinator: the external operation surface.
//!
//! Composes the registry, pairing engine and resolver behind the
//! locking discipline they implement: per-level mutexes around pairing
//! and per-player mutexes around record mutation. Requests for
//! different levels proceed fully in parallel; requests for the same
//! level serialize only around the queue. No operation blocks waiting
//! for another client.

use crate::error::LadderResult;
use crate::ladder::{
    Encounter, InvariantViolation, LadderConfig, LevelTable, MatchId, MatchPairingEngine,
    MatchRequest, MatchState, MatchStatus, PlayerRegistry, PromotionPolicy, Resolution, Standing,
    check_invariants, resolve_outcome,
};
use crate::snapshot::LadderSnapshot;

/// Orchestrates the ladder: admission, pairing, resolution, queries.
#[derive(Debug)]
pub struct LadderCoordinator {
    /// Player records and level occupancy.
    registry: PlayerRegistry,
    /// Wait queues and the match store.
    pairing: MatchPairingEngine,
    /// Gene-economy constants.
    config: LadderConfig,
    /// Promotion/demotion rule.
    policy: PromotionPolicy,
}

impl Default for LadderCoordinator {
    fn default() -> Self {
        Self::new(
            LevelTable::default(),
            LadderConfig::default(),
            PromotionPolicy::default(),
        )
    }
}

impl LadderCoordinator {
    /// Create a coordinator over the given table, economy and policy.
    #[must_use]
    pub fn new(levels: LevelTable, config: LadderConfig, policy: PromotionPolicy) -> Self {
        let pairing = MatchPairingEngine::new(levels.level_count());
        let registry = PlayerRegistry::new(levels, config.initial_genes);
        Self {
            registry,
            pairing,
            config,
            policy,
        }
    }

    /// Rebuild a coordinator from a snapshot.
    ///
    /// Queue membership is not persisted: players recorded as `Queued`
    /// come back `Idle`, as do `InMatch` players whose match is no
    /// longer live.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchLevel` or `LevelFull` if the snapshot's player
    /// records do not fit its level table.
    pub fn from_snapshot(
        snapshot: LadderSnapshot,
        config: LadderConfig,
        policy: PromotionPolicy,
    ) -> LadderResult<Self> {
        let levels = LevelTable::new(snapshot.capacities)?;
        let pairing = MatchPairingEngine::from_matches(levels.level_count(), snapshot.matches)?;

        let mut players = snapshot.players;
        for player in &mut players {
            let live = pairing.current_match(&player.id)?.is_some();
            match player.match_state {
                MatchState::Queued => player.match_state = MatchState::Idle,
                MatchState::InMatch if !live => player.match_state = MatchState::Idle,
                MatchState::InMatch | MatchState::Idle => {}
            }
        }
        let registry = PlayerRegistry::from_players(levels, config.initial_genes, players)?;
        Ok(Self {
            registry,
            pairing,
            config,
            policy,
        })
    }

    /// Admit a player (idempotent), returning their standing.
    ///
    /// # Errors
    ///
    /// Returns `LevelFull` if the admission's level slot is saturated.
    pub fn enroll(&self, player_id: &str) -> LadderResult<Standing> {
        self.registry.get_or_create(player_id)
    }

    /// Request a match for a player at their current level.
    ///
    /// Admits unseen players first. Returns `Paired` with the new match
    /// or `Queued` if no partner is waiting; never blocks.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyQueued`/`AlreadyInMatch` for repeated requests
    /// and `LevelFull` if first admission fails.
    pub fn request_match(&self, player_id: &str) -> LadderResult<MatchRequest> {
        self.registry.get_or_create(player_id)?;
        self.pairing.request(&self.registry, player_id)
    }

    /// Withdraw a queued player before pairing completes.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPairing` (naming the match) if pairing won the
    /// race, and `InvalidStateTransition` if the player was not queued.
    pub fn withdraw(&self, player_id: &str) -> LadderResult<()> {
        self.pairing.withdraw(&self.registry, player_id)
    }

    /// Record one participant's start acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMatch` or `InvalidOutcome` for structural
    /// violations.
    pub fn confirm_start(&self, match_id: MatchId, player_id: &str) -> LadderResult<MatchStatus> {
        self.pairing.confirm_start(match_id, player_id)
    }

    /// Attach an external encounter to a match.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMatch` or `InvalidOutcome` for structural
    /// violations.
    pub fn assign_encounter(&self, match_id: MatchId, encounter: &Encounter) -> LadderResult<()> {
        self.pairing.assign_encounter(match_id, encounter)
    }

    /// Resolve a completed encounter's outcome exactly once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOutcome` for unknown, unstarted, repeated or
    /// structurally invalid reports. Capacity-blocked rank moves yield
    /// `Resolution::ResolvedWithRankUnchanged`, not an error.
    pub fn report_outcome(
        &self,
        match_id: MatchId,
        winner_id: &str,
    ) -> LadderResult<Resolution> {
        resolve_outcome(
            &self.registry,
            &self.pairing,
            &self.config,
            &self.policy,
            match_id,
            winner_id,
        )
    }

    /// A player's current standing.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for identifiers never admitted.
    pub fn standing(&self, player_id: &str) -> LadderResult<Standing> {
        self.registry.standing(player_id)
    }

    /// The live match a player is part of, if any.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if an internal lock was poisoned.
    pub fn current_match(&self, player_id: &str) -> LadderResult<Option<MatchId>> {
        self.pairing.current_match(player_id)
    }

    /// Deactivate a player, keeping the record and freeing the slot.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyQueued`/`AlreadyInMatch` if the player is not
    /// `Idle`.
    pub fn deactivate(&self, player_id: &str) -> LadderResult<()> {
        self.registry.deactivate(player_id)
    }

    /// The underlying registry.
    #[must_use]
    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    /// The underlying pairing engine.
    #[must_use]
    pub fn pairing(&self) -> &MatchPairingEngine {
        &self.pairing
    }

    /// The economy configuration in force.
    #[must_use]
    pub fn config(&self) -> &LadderConfig {
        &self.config
    }

    /// The promotion policy in force.
    #[must_use]
    pub fn policy(&self) -> &PromotionPolicy {
        &self.policy
    }

    /// A consistent, serializable copy of the ladder state.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if an internal lock was poisoned.
    pub fn snapshot(&self) -> LadderResult<LadderSnapshot> {
        Ok(LadderSnapshot {
            capacities: (1..=self.registry.levels().level_count())
                .map(|level| self.registry.levels().capacity_of(level))
                .collect::<LadderResult<Vec<u32>>>()?,
            players: self.registry.snapshot_players()?,
            matches: self.pairing.snapshot_matches()?,
        })
    }

    /// Run the sanity checks over a snapshot of the current state.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if an internal lock was poisoned.
    pub fn check_invariants(&self) -> LadderResult<Vec<InvariantViolation>> {
        let snapshot = self.snapshot()?;
        Ok(check_invariants(
            self.registry.levels(),
            &snapshot.players,
            &snapshot.matches,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LadderError;

    fn coordinator() -> LadderCoordinator {
        let table = LevelTable::new(vec![8, 4, 2]).unwrap();
        let config = LadderConfig {
            initial_genes: 1000,
            ..LadderConfig::default()
        };
        LadderCoordinator::new(table, config, PromotionPolicy::default())
    }

    fn pair(coordinator: &LadderCoordinator, a: &str, b: &str) -> MatchId {
        coordinator.request_match(a).unwrap();
        let MatchRequest::Paired(id) = coordinator.request_match(b).unwrap() else {
            panic!("expected pairing");
        };
        coordinator.confirm_start(id, a).unwrap();
        coordinator.confirm_start(id, b).unwrap();
        id
    }

    #[test]
    fn test_full_match_lifecycle() {
        let coordinator = coordinator();
        let id = pair(&coordinator, "a", "b");
        assert_eq!(coordinator.current_match("a").unwrap(), Some(id));

        let resolution = coordinator.report_outcome(id, "a").unwrap();
        assert!(matches!(resolution, Resolution::Resolved(_)));
        assert_eq!(coordinator.current_match("a").unwrap(), None);

        let a = coordinator.standing("a").unwrap();
        let b = coordinator.standing("b").unwrap();
        assert_eq!(a.genes, 975);
        assert_eq!(b.genes, 800);
        assert!(coordinator.check_invariants().unwrap().is_empty());
    }

    #[test]
    fn test_request_match_admits_unseen_players() {
        let coordinator = coordinator();
        assert_eq!(
            coordinator.request_match("new").unwrap(),
            MatchRequest::Queued
        );
        let standing = coordinator.standing("new").unwrap();
        assert_eq!(standing.level, 1);
        assert_eq!(standing.genes, 1000);
    }

    #[test]
    fn test_standing_requires_admission() {
        let coordinator = coordinator();
        assert_eq!(
            coordinator.standing("ghost"),
            Err(LadderError::UnknownPlayer("ghost".to_owned()))
        );
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let coordinator = coordinator();
        let id = pair(&coordinator, "a", "b");
        coordinator.report_outcome(id, "a").unwrap();
        // One queued player and one fresh pairing left behind
        coordinator.request_match("c").unwrap();
        pair(&coordinator, "d", "e");

        let snapshot = coordinator.snapshot().unwrap();
        let restored = LadderCoordinator::from_snapshot(
            snapshot,
            *coordinator.config(),
            *coordinator.policy(),
        )
        .unwrap();

        // Standings survive
        assert_eq!(
            restored.standing("a").unwrap(),
            coordinator.standing("a").unwrap()
        );
        // The queued player came back Idle and can re-request
        assert_eq!(
            restored.request_match("c").unwrap(),
            MatchRequest::Queued
        );
        // The live match survives and resolves
        let id = restored.current_match("d").unwrap().expect("live match");
        let resolution = restored.report_outcome(id, "e").unwrap();
        assert!(matches!(resolution, Resolution::Resolved(_)));
        assert!(restored.check_invariants().unwrap().is_empty());
    }

    #[test]
    fn test_occupancy_query_via_registry() {
        let coordinator = coordinator();
        coordinator.enroll("a").unwrap();
        coordinator.enroll("b").unwrap();
        assert_eq!(coordinator.registry().occupancy(1).unwrap(), 2);
        assert_eq!(
            coordinator.registry().occupancy(9),
            Err(LadderError::NoSuchLevel(9))
        );
    }
}
