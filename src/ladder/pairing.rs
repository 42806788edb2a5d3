//! Match pairing: per-level FIFO wait queues and the match store.
//!
//! Pairing is first-eligible-first-served: each level keeps its waiting
//! players in arrival order and always pairs the two longest-waiting
//! eligible ones, so nobody starves behind later arrivals. A request
//! never blocks waiting for a partner; with no partner available it
//! stays queued.
//!
//! All queue manipulation for one level happens under that level's
//! mutex. Capturing a player into a match (queue removal plus the
//! `Queued -> InMatch` transition) is done under the same lock, which
//! is what lets a racing withdrawal observe a clean `AlreadyPairing`
//! instead of tearing a half-formed match.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::debug;

use crate::error::{LadderError, LadderResult};
use crate::ladder::{Encounter, Match, MatchId, MatchState, MatchStatus, PlayerId, PlayerRegistry};

/// Outcome of a match request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRequest {
    /// A partner was available; the caller is in this match.
    Paired(MatchId),
    /// No partner yet; the caller is waiting in the level queue.
    Queued,
}

/// Pairs eligible same-level players into matches.
#[derive(Debug)]
pub struct MatchPairingEngine {
    /// Waiting players per level in arrival order, index 0 = level 1.
    queues: Vec<Mutex<VecDeque<PlayerId>>>,
    /// All matches ever formed, keyed by id.
    matches: RwLock<HashMap<MatchId, Arc<Mutex<Match>>>>,
    /// Live match per player; entries removed on completion.
    by_player: RwLock<HashMap<PlayerId, MatchId>>,
    /// Next match id.
    next_match_id: AtomicU64,
}

impl MatchPairingEngine {
    /// Create an engine with one empty queue per level.
    #[must_use]
    pub fn new(level_count: u8) -> Self {
        let queues = (0..level_count).map(|_| Mutex::new(VecDeque::new())).collect();
        Self {
            queues,
            matches: RwLock::new(HashMap::new()),
            by_player: RwLock::new(HashMap::new()),
            next_match_id: AtomicU64::new(1),
        }
    }

    /// Rebuild an engine from previously recorded matches.
    ///
    /// Queue membership is not part of the persisted shape, so queues
    /// start empty; live matches are re-indexed by participant.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if an internal lock was poisoned.
    pub fn from_matches(level_count: u8, matches: Vec<Match>) -> LadderResult<Self> {
        let engine = Self::new(level_count);
        {
            let mut store = engine.matches.write().map_err(|_| LadderError::Poisoned)?;
            let mut index = engine.by_player.write().map_err(|_| LadderError::Poisoned)?;
            let mut next_id = 1;
            for m in matches {
                next_id = next_id.max(m.id + 1);
                if m.status != MatchStatus::Completed {
                    index.insert(m.player1.clone(), m.id);
                    index.insert(m.player2.clone(), m.id);
                }
                store.insert(m.id, Arc::new(Mutex::new(m)));
            }
            engine.next_match_id.store(next_id, Ordering::Relaxed);
        }
        Ok(engine)
    }

    /// Request a match for `player_id` at their current level.
    ///
    /// Enqueues the player and pairs the two longest-waiting eligible
    /// players if the level now holds at least two. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyQueued` or `AlreadyInMatch` if the player is not
    /// `Idle`, and `UnknownPlayer` for unseen identifiers.
    pub fn request(
        &self,
        registry: &PlayerRegistry,
        player_id: &str,
    ) -> LadderResult<MatchRequest> {
        loop {
            let level = registry.level_of(player_id)?;
            let mut queue = self.queues[usize::from(level - 1)]
                .lock()
                .map_err(|_| LadderError::Poisoned)?;
            // The Queued mark is only ever set under the level's queue
            // lock, so pairing and withdrawal always see a queue that
            // matches the player states.
            if !registry.begin_queue(player_id, level)? {
                // Lost a race against a level move; requeue there.
                continue;
            }
            queue.push_back(player_id.to_owned());
            debug!("player {player_id} queued at level {level} ({} waiting)", queue.len());
            return self.try_pair(registry, level, &mut queue, player_id);
        }
    }

    /// Form at most one match from the front of a level queue.
    fn try_pair(
        &self,
        registry: &PlayerRegistry,
        level: u8,
        queue: &mut VecDeque<PlayerId>,
        requester: &str,
    ) -> LadderResult<MatchRequest> {
        if queue.len() < 2 {
            return Ok(MatchRequest::Queued);
        }

        // Take the two longest-waiting players that are still queued at
        // this level; stale entries are dropped on the way.
        let mut picked: Vec<PlayerId> = Vec::with_capacity(2);
        while picked.len() < 2 {
            let Some(candidate) = queue.pop_front() else {
                break;
            };
            if Self::eligible(registry, &candidate, level) {
                picked.push(candidate);
            }
        }
        if picked.len() < 2 {
            // Not enough partners; the survivor keeps their seniority.
            if let Some(survivor) = picked.pop() {
                queue.push_front(survivor);
            }
            return Ok(MatchRequest::Queued);
        }

        let second = picked.pop().unwrap_or_default();
        let first = picked.pop().unwrap_or_default();

        // Both were verified `Queued` under this queue's lock, and every
        // `Queued` exit (withdrawal, pairing) takes the same lock, so
        // these transitions only fail if a lock was poisoned.
        registry.set_match_state(&first, MatchState::InMatch)?;
        registry.set_match_state(&second, MatchState::InMatch)?;

        let id = self.next_match_id.fetch_add(1, Ordering::Relaxed);
        let m = Match::new(id, first.clone(), second.clone(), level);
        self.matches
            .write()
            .map_err(|_| LadderError::Poisoned)?
            .insert(id, Arc::new(Mutex::new(m)));
        {
            let mut index = self.by_player.write().map_err(|_| LadderError::Poisoned)?;
            index.insert(first.clone(), id);
            index.insert(second.clone(), id);
        }
        debug!("match {id}: {first} vs {second} at level {level}");

        if first == requester || second == requester {
            Ok(MatchRequest::Paired(id))
        } else {
            Ok(MatchRequest::Queued)
        }
    }

    /// Whether a player is still waiting at `level`.
    fn eligible(registry: &PlayerRegistry, player_id: &str, level: u8) -> bool {
        let Ok(handle) = registry.handle(player_id) else {
            return false;
        };
        let Ok(player) = handle.lock() else {
            return false;
        };
        player.active && player.match_state == MatchState::Queued && player.level == level
    }

    /// Withdraw a queued player before pairing completes.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyPairing` (naming the match) if pairing already
    /// captured the player, `InvalidStateTransition` if the player was
    /// not queued, and `UnknownPlayer` for unseen identifiers.
    pub fn withdraw(&self, registry: &PlayerRegistry, player_id: &str) -> LadderResult<()> {
        let level = registry.level_of(player_id)?;
        {
            let mut queue = self.queues[usize::from(level - 1)]
                .lock()
                .map_err(|_| LadderError::Poisoned)?;
            if let Some(pos) = queue.iter().position(|p| p == player_id) {
                queue.remove(pos);
                registry.set_match_state(player_id, MatchState::Idle)?;
                debug!("player {player_id} withdrew from level {level} queue");
                return Ok(());
            }
        }

        // Not in the queue: pairing won the race, or there was nothing
        // to withdraw from.
        let handle = registry.handle(player_id)?;
        let state = {
            let player = handle.lock().map_err(|_| LadderError::Poisoned)?;
            player.match_state
        };
        match state {
            MatchState::InMatch => match self.current_match(player_id)? {
                Some(match_id) => Err(LadderError::AlreadyPairing { match_id }),
                None => Err(LadderError::AlreadyInMatch),
            },
            from => Err(LadderError::InvalidStateTransition {
                from,
                to: MatchState::Idle,
            }),
        }
    }

    /// The live match a player is currently part of, if any.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if an internal lock was poisoned.
    pub fn current_match(&self, player_id: &str) -> LadderResult<Option<MatchId>> {
        let index = self.by_player.read().map_err(|_| LadderError::Poisoned)?;
        Ok(index.get(player_id).copied())
    }

    /// Record a start acknowledgement from one participant.
    ///
    /// The match turns `Active` on the second acknowledgement; repeated
    /// acknowledgements are idempotent. Returns the resulting status.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMatch` for unseen match ids, and `InvalidOutcome`
    /// if the player is not a participant or the match already
    /// completed.
    pub fn confirm_start(&self, match_id: MatchId, player_id: &str) -> LadderResult<MatchStatus> {
        let handle = self.match_handle(match_id)?;
        let mut m = handle.lock().map_err(|_| LadderError::Poisoned)?;
        if !m.involves(player_id) {
            return Err(LadderError::InvalidOutcome(format!(
                "player {player_id} is not in match {match_id}"
            )));
        }
        match m.status {
            MatchStatus::Completed => Err(LadderError::InvalidOutcome(format!(
                "match {match_id} already completed"
            ))),
            MatchStatus::Active => Ok(MatchStatus::Active),
            MatchStatus::Pending => {
                if m.player1 == player_id {
                    m.ack1 = true;
                } else {
                    m.ack2 = true;
                }
                if m.ack1 && m.ack2 {
                    m.status = MatchStatus::Active;
                    debug!("match {match_id} active");
                }
                Ok(m.status)
            }
        }
    }

    /// Attach an external encounter to a match.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMatch` for unseen match ids, and `InvalidOutcome`
    /// if the match completed, already has an encounter, or sits below
    /// the encounter's level requirement.
    pub fn assign_encounter(&self, match_id: MatchId, encounter: &Encounter) -> LadderResult<()> {
        let handle = self.match_handle(match_id)?;
        let mut m = handle.lock().map_err(|_| LadderError::Poisoned)?;
        if m.status == MatchStatus::Completed {
            return Err(LadderError::InvalidOutcome(format!(
                "match {match_id} already completed"
            )));
        }
        if let Some(existing) = &m.encounter_id {
            return Err(LadderError::InvalidOutcome(format!(
                "match {match_id} already has encounter {existing}"
            )));
        }
        if encounter.level_requirement > m.level {
            return Err(LadderError::InvalidOutcome(format!(
                "encounter {} requires level {}, match is at level {}",
                encounter.id, encounter.level_requirement, m.level
            )));
        }
        m.encounter_id = Some(encounter.id.clone());
        Ok(())
    }

    /// Fetch the lock handle for a match.
    pub(crate) fn match_handle(&self, match_id: MatchId) -> LadderResult<Arc<Mutex<Match>>> {
        let store = self.matches.read().map_err(|_| LadderError::Poisoned)?;
        store
            .get(&match_id)
            .cloned()
            .ok_or(LadderError::UnknownMatch(match_id))
    }

    /// Drop the live-match index entries for a completed match.
    pub(crate) fn detach(&self, match_id: MatchId) -> LadderResult<()> {
        let mut index = self.by_player.write().map_err(|_| LadderError::Poisoned)?;
        index.retain(|_, id| *id != match_id);
        Ok(())
    }

    /// Number of players waiting in a level's queue.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchLevel` for out-of-range levels.
    pub fn waiting(&self, level: u8) -> LadderResult<usize> {
        let queue = self
            .queues
            .get(usize::from(level.wrapping_sub(1)))
            .ok_or(LadderError::NoSuchLevel(level))?;
        Ok(queue.lock().map_err(|_| LadderError::Poisoned)?.len())
    }

    /// Clone every match record, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if an internal lock was poisoned.
    pub fn snapshot_matches(&self) -> LadderResult<Vec<Match>> {
        let store = self.matches.read().map_err(|_| LadderError::Poisoned)?;
        let mut matches = Vec::with_capacity(store.len());
        for handle in store.values() {
            let m = handle.lock().map_err(|_| LadderError::Poisoned)?;
            matches.push(m.clone());
        }
        matches.sort_by_key(|m| m.id);
        Ok(matches)
    }
}
