//! Player registry: the sole writer of player records.
//!
//! All shared mutable ladder state lives here: player records behind
//! per-player mutexes, and per-level occupancy counters updated with a
//! compare-and-set loop so that a level's occupancy can never exceed
//! its capacity, no matter how many movers race for the last slot.
//!
//! Lock order is always registry map before player record, and at most
//! one player record is held per registry call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, info};

use crate::error::{LadderError, LadderResult};
use crate::ladder::{Genes, LevelTable, MatchState, Player, Standing};

/// Tracks every player's level, gene balance, counters and
/// match-availability state, under the locking discipline above.
#[derive(Debug)]
pub struct PlayerRegistry {
    /// Static level configuration.
    levels: LevelTable,
    /// Gene grant applied on first admission.
    initial_genes: Genes,
    /// Player records, keyed by external identifier.
    players: RwLock<HashMap<String, Arc<Mutex<Player>>>>,
    /// Active-player count per level, index 0 = level 1.
    occupancy: Vec<AtomicU32>,
}

impl PlayerRegistry {
    /// Create an empty registry over the given level table.
    #[must_use]
    pub fn new(levels: LevelTable, initial_genes: Genes) -> Self {
        let occupancy = (0..levels.level_count())
            .map(|_| AtomicU32::new(0))
            .collect();
        Self {
            levels,
            initial_genes,
            players: RwLock::new(HashMap::new()),
            occupancy,
        }
    }

    /// Rebuild a registry from previously recorded players.
    ///
    /// Occupancy counters are recomputed from the records.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchLevel` if a record sits outside the table and
    /// `LevelFull` if the records overfill a level.
    pub fn from_players(
        levels: LevelTable,
        initial_genes: Genes,
        players: Vec<Player>,
    ) -> LadderResult<Self> {
        let registry = Self::new(levels, initial_genes);
        {
            let mut map = registry.players.write().map_err(|_| LadderError::Poisoned)?;
            for player in players {
                if !registry.levels.is_valid_level(player.level) {
                    return Err(LadderError::NoSuchLevel(player.level));
                }
                if player.active {
                    registry.try_reserve(player.level)?;
                }
                map.insert(player.id.clone(), Arc::new(Mutex::new(player)));
            }
        }
        Ok(registry)
    }

    /// The level table this registry enforces.
    #[must_use]
    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    /// Fetch the lock handle for a known player.
    pub(crate) fn handle(&self, player_id: &str) -> LadderResult<Arc<Mutex<Player>>> {
        let map = self.players.read().map_err(|_| LadderError::Poisoned)?;
        map.get(player_id)
            .cloned()
            .ok_or_else(|| LadderError::UnknownPlayer(player_id.to_owned()))
    }

    /// Reserve one slot at `level`, or fail with `LevelFull`.
    ///
    /// Compare-and-set loop: the occupancy is re-read and re-checked
    /// against capacity inside the commit, so of N racers for the last
    /// open slot exactly one wins.
    fn try_reserve(&self, level: u8) -> LadderResult<()> {
        let capacity = self.levels.capacity_of(level)?;
        let slot = &self.occupancy[usize::from(level - 1)];
        let mut current = slot.load(Ordering::Acquire);
        loop {
            if current >= capacity {
                return Err(LadderError::LevelFull { level, capacity });
            }
            match slot.compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    /// Release one slot at `level`.
    fn release(&self, level: u8) {
        let slot = &self.occupancy[usize::from(level - 1)];
        let prior = slot.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prior > 0, "released a slot on an empty level");
    }

    /// Admit `player_id`, or return the existing record's standing.
    ///
    /// Idempotent per identifier. First sight admits at level 1 with
    /// the configured initial gene grant. A deactivated player is
    /// re-admitted at their recorded level.
    ///
    /// # Errors
    ///
    /// Returns `LevelFull` if the slot the admission needs (level 1 for
    /// a new player, the recorded level for a returning one) is
    /// saturated.
    pub fn get_or_create(&self, player_id: &str) -> LadderResult<Standing> {
        // Fast path: known player.
        let known = {
            let map = self.players.read().map_err(|_| LadderError::Poisoned)?;
            map.get(player_id).cloned()
        };
        if let Some(handle) = known {
            return self.reactivate(&handle);
        }

        let mut map = self.players.write().map_err(|_| LadderError::Poisoned)?;
        // Another thread may have admitted this id between the read and
        // write lock.
        if let Some(handle) = map.get(player_id).cloned() {
            drop(map);
            return self.reactivate(&handle);
        }

        self.try_reserve(1)?;
        let player = Player::new(player_id.to_owned(), self.initial_genes);
        let standing = player.standing();
        map.insert(player_id.to_owned(), Arc::new(Mutex::new(player)));
        info!("admitted player {player_id} at level 1 with {} genes", self.initial_genes);
        Ok(standing)
    }

    /// Ensure a known player occupies a slot, re-reserving if needed.
    fn reactivate(&self, handle: &Arc<Mutex<Player>>) -> LadderResult<Standing> {
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        if !player.active {
            self.try_reserve(player.level)?;
            player.active = true;
            player.match_state = MatchState::Idle;
            info!("re-admitted player {} at level {}", player.id, player.level);
        }
        Ok(player.standing())
    }

    /// Count of active players currently assigned to `level`.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchLevel` for out-of-range queries.
    pub fn occupancy(&self, level: u8) -> LadderResult<u32> {
        if !self.levels.is_valid_level(level) {
            return Err(LadderError::NoSuchLevel(level));
        }
        Ok(self.occupancy[usize::from(level - 1)].load(Ordering::Acquire))
    }

    /// Apply a match-state transition, enforcing the legal graph.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` for any edge outside
    /// `Idle -> Queued -> InMatch -> Idle` (plus `Queued -> Idle`), and
    /// `UnknownPlayer` for unseen identifiers.
    pub fn set_match_state(&self, player_id: &str, to: MatchState) -> LadderResult<()> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        if !player.match_state.can_transition(to) {
            return Err(LadderError::InvalidStateTransition {
                from: player.match_state,
                to,
            });
        }
        player.match_state = to;
        Ok(())
    }

    /// Mark an idle player queued for pairing at `level`.
    ///
    /// Returns `Ok(false)` without effect if the player's level moved
    /// since the caller read it, so the caller can requeue at the right
    /// level. Must be called under the target level's queue lock: the
    /// `Queued` mark is only ever set there.
    pub(crate) fn begin_queue(&self, player_id: &str, level: u8) -> LadderResult<bool> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        match player.match_state {
            MatchState::Queued => Err(LadderError::AlreadyQueued),
            MatchState::InMatch => Err(LadderError::AlreadyInMatch),
            MatchState::Idle => {
                if !player.active {
                    return Err(LadderError::UnknownPlayer(player_id.to_owned()));
                }
                if player.level != level {
                    return Ok(false);
                }
                player.match_state = MatchState::Queued;
                Ok(true)
            }
        }
    }

    /// Apply a signed gene delta atomically for one player.
    ///
    /// Voluntary spends hard-reject: a delta that would drive the
    /// balance negative fails without effect. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientFunds` if the result would be negative, and
    /// `UnknownPlayer` for unseen identifiers.
    pub fn adjust_genes(&self, player_id: &str, delta: i64) -> LadderResult<Genes> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        let magnitude = delta.unsigned_abs();
        if delta >= 0 {
            player.genes = player.genes.saturating_add(magnitude);
        } else {
            if magnitude > player.genes {
                return Err(LadderError::InsufficientFunds {
                    balance: player.genes,
                    required: magnitude,
                });
            }
            player.genes -= magnitude;
        }
        Ok(player.genes)
    }

    /// Apply an involuntary penalty with clamped semantics.
    ///
    /// Unlike `adjust_genes`, this never fails on balance: the penalty
    /// is `max(0, balance - amount)`. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for unseen identifiers.
    pub fn apply_penalty(&self, player_id: &str, amount: Genes) -> LadderResult<Genes> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        player.genes = player.genes.saturating_sub(amount);
        Ok(player.genes)
    }

    /// Move a player to `new_level`, enforcing capacity atomically.
    ///
    /// The target slot is reserved before the source slot is released,
    /// so occupancy never exceeds capacity at any instant. Moving to
    /// the current level is a no-op. Returns the prior level.
    ///
    /// A queued player cannot move: their queue position is keyed by
    /// level, so they must withdraw first.
    ///
    /// # Errors
    ///
    /// Returns `LevelFull` if `new_level` has no free slot at commit
    /// time, `NoSuchLevel` for an invalid target, `AlreadyQueued` for a
    /// queued player, and `UnknownPlayer` for unseen or deactivated
    /// players.
    pub fn transition_level(&self, player_id: &str, new_level: u8) -> LadderResult<u8> {
        if !self.levels.is_valid_level(new_level) {
            return Err(LadderError::NoSuchLevel(new_level));
        }
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        if !player.active {
            return Err(LadderError::UnknownPlayer(player_id.to_owned()));
        }
        if player.match_state == MatchState::Queued {
            return Err(LadderError::AlreadyQueued);
        }
        let prior = player.level;
        if prior == new_level {
            return Ok(prior);
        }
        self.try_reserve(new_level)?;
        self.release(prior);
        player.level = new_level;
        debug!("player {player_id} moved level {prior} -> {new_level}");
        Ok(prior)
    }

    /// Record a win: increments the win counter and streak, resets the
    /// loss streak. Returns the new win streak.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for unseen identifiers.
    pub fn record_win(&self, player_id: &str) -> LadderResult<u32> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        player.wins += 1;
        player.win_streak += 1;
        player.loss_streak = 0;
        Ok(player.win_streak)
    }

    /// Record a loss: increments the loss counter and streak, resets
    /// the win streak. Returns the new loss streak.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for unseen identifiers.
    pub fn record_loss(&self, player_id: &str) -> LadderResult<u32> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        player.losses += 1;
        player.loss_streak += 1;
        player.win_streak = 0;
        Ok(player.loss_streak)
    }

    /// Reset both streak counters, after a level move consumed them.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for unseen identifiers.
    pub fn reset_streaks(&self, player_id: &str) -> LadderResult<()> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        player.win_streak = 0;
        player.loss_streak = 0;
        Ok(())
    }

    /// Deactivate a player, keeping the record and freeing the slot.
    ///
    /// Idempotent on an already-deactivated player.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyQueued` or `AlreadyInMatch` if the player is not
    /// `Idle` (leave the queue or finish the match first), and
    /// `UnknownPlayer` for unseen identifiers.
    pub fn deactivate(&self, player_id: &str) -> LadderResult<()> {
        let handle = self.handle(player_id)?;
        let mut player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        match player.match_state {
            MatchState::Queued => Err(LadderError::AlreadyQueued),
            MatchState::InMatch => Err(LadderError::AlreadyInMatch),
            MatchState::Idle => {
                if player.active {
                    player.active = false;
                    self.release(player.level);
                    info!("deactivated player {player_id}");
                }
                Ok(())
            }
        }
    }

    /// Read-only standing of a player.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for unseen identifiers.
    pub fn standing(&self, player_id: &str) -> LadderResult<Standing> {
        let handle = self.handle(player_id)?;
        let player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        Ok(player.standing())
    }

    /// Current level of a player.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPlayer` for unseen identifiers.
    pub fn level_of(&self, player_id: &str) -> LadderResult<u8> {
        let handle = self.handle(player_id)?;
        let player = handle.lock().map_err(|_| LadderError::Poisoned)?;
        Ok(player.level)
    }

    /// Clone every player record, sorted by identifier.
    ///
    /// # Errors
    ///
    /// Returns `Poisoned` if a record lock was poisoned.
    pub fn snapshot_players(&self) -> LadderResult<Vec<Player>> {
        let map = self.players.read().map_err(|_| LadderError::Poisoned)?;
        let mut players = Vec::with_capacity(map.len());
        for handle in map.values() {
            let player = handle.lock().map_err(|_| LadderError::Poisoned)?;
            players.push(player.clone());
        }
        players.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(players)
    }
}
