// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    recovery::{
        careful_resume::{Config, State},
        Controller,
    },
    settings::Algorithm,
    time::{Duration, Timestamp},
};
use core::{fmt, net::SocketAddr};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::{collections::hash_map::RandomState, hash::BuildHasher};

// Balance of scan length on lookup and likelihood of evicting a live entry
const SLOT_CAPACITY: usize = 8;

/// A bounded table of careful resume states, shared by the connections of an endpoint
///
/// Storage is allocated once at construction. Entries are hashed by remote endpoint into slots
/// of fixed capacity, each behind its own lock, which is held only while a state is copied in
/// or out. When a slot is full, the entry that expires first is evicted.
pub struct Store<S = RandomState> {
    slots: Box<[Slot]>,
    hash_builder: S,
}

impl Store {
    /// Creates a store holding at least `entries` states
    pub fn with_capacity(entries: usize) -> Self {
        Self::with_capacity_and_hasher(entries, RandomState::new())
    }
}

impl<S: BuildHasher> Store<S> {
    pub fn with_capacity_and_hasher(entries: usize, hash_builder: S) -> Self {
        let slots = entries.div_ceil(SLOT_CAPACITY).max(1).next_power_of_two();
        Self {
            slots: (0..slots).map(|_| Slot::default()).collect(),
            hash_builder,
        }
    }

    /// The maximum number of states the store holds
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len() * SLOT_CAPACITY
    }

    pub fn len(&self) -> usize {
        self.slots.iter().map(Slot::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            *slot.states.write() = Default::default();
        }
    }

    /// Saves the state, replacing any state for the same remote endpoint
    ///
    /// Returns the replaced state, if any.
    pub fn save(&self, state: State) -> Option<State> {
        self.slot(&state.remote_endpoint).save(state)
    }

    /// Returns a copy of the state saved for `remote_endpoint`, without validating it
    pub fn get(&self, remote_endpoint: &SocketAddr) -> Option<State> {
        let states = self.slot(remote_endpoint).states.read();
        states
            .iter()
            .flatten()
            .find(|state| state.remote_endpoint == *remote_endpoint)
            .copied()
    }

    pub fn remove(&self, remote_endpoint: &SocketAddr) -> Option<State> {
        let mut states = self.slot(remote_endpoint).states.write();
        states
            .iter_mut()
            .find(|entry| entry.is_some_and(|state| state.remote_endpoint == *remote_endpoint))
            .and_then(Option::take)
    }

    /// Returns the state saved for `remote_endpoint` if a connection using `algorithm`, with the
    /// given RTT samples, may resume from it
    ///
    /// An expired state, or one whose RTTs show the path changed, is removed. A state saved by
    /// a different algorithm is left in place.
    pub fn lookup(
        &self,
        remote_endpoint: &SocketAddr,
        algorithm: Algorithm,
        smoothed_rtt: Duration,
        min_rtt: Duration,
        now: Timestamp,
        config: &Config,
    ) -> Option<State> {
        let state = self.get(remote_endpoint)?;

        if state.is_expired(now) {
            tracing::trace!(%remote_endpoint, "careful resume state expired");
            self.remove_if_unchanged(&state);
            return None;
        }

        if state.algorithm != algorithm {
            tracing::trace!(
                %remote_endpoint,
                saved = %state.algorithm,
                current = %algorithm,
                "careful resume state saved by another algorithm"
            );
            return None;
        }

        if !config.rtt_matches(&state, smoothed_rtt, min_rtt) {
            tracing::debug!(
                %remote_endpoint,
                saved_smoothed_rtt = ?state.smoothed_rtt,
                saved_min_rtt = ?state.min_rtt,
                ?smoothed_rtt,
                ?min_rtt,
                "careful resume rejected, path rtt changed"
            );
            self.remove_if_unchanged(&state);
            return None;
        }

        Some(state)
    }

    /// Saves the path state of a closing connection if it is stable
    ///
    /// Returns true if the state was saved.
    pub fn on_connection_closed(
        &self,
        controller: &Controller,
        remote_endpoint: SocketAddr,
        now: Timestamp,
    ) -> bool {
        let Some(state) = controller.careful_resume_state(remote_endpoint, now) else {
            return false;
        };

        tracing::debug!(
            %remote_endpoint,
            algorithm = %state.algorithm,
            congestion_window = state.congestion_window,
            "saved careful resume state"
        );
        self.save(state);
        true
    }

    /// Removes every state that has expired as of `now`
    pub fn retain_unexpired(&self, now: Timestamp) {
        for slot in self.slots.iter() {
            for entry in slot.states.write().iter_mut() {
                if entry.is_some_and(|state| state.is_expired(now)) {
                    *entry = None;
                }
            }
        }
    }

    /// Removes `state` unless another connection replaced it since it was read
    fn remove_if_unchanged(&self, state: &State) {
        let mut states = self.slot(&state.remote_endpoint).states.write();
        for entry in states.iter_mut() {
            if entry.as_ref() == Some(state) {
                *entry = None;
            }
        }
    }

    fn slot(&self, remote_endpoint: &SocketAddr) -> &Slot {
        let hash = self.hash_builder.hash_one(remote_endpoint);
        // the slot count is a power of two
        let index = hash as usize & (self.slots.len() - 1);
        &self.slots[index]
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Store")
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[derive(Default)]
struct Slot {
    states: RwLock<[Option<State>; SLOT_CAPACITY]>,
}

impl Slot {
    fn save(&self, new_state: State) -> Option<State> {
        let states = self.states.upgradable_read();

        // overwrite the same endpoint, otherwise fill an empty entry
        let index = states
            .iter()
            .position(|entry| {
                entry.is_some_and(|state| state.remote_endpoint == new_state.remote_endpoint)
            })
            .or_else(|| states.iter().position(Option::is_none));

        let mut states = RwLockUpgradableReadGuard::upgrade(states);

        if let Some(index) = index {
            return states[index].replace(new_state);
        }

        // expired entries have the earliest expirations, so they are evicted first
        let index = states
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| entry.map(|state| state.expiration))
            .map_or(0, |(index, _)| index);

        if let Some(evicted) = states[index].replace(new_state) {
            tracing::trace!(
                remote_endpoint = %evicted.remote_endpoint,
                "evicted careful resume state, slot full"
            );
        }

        None
    }

    fn len(&self) -> usize {
        self.states.read().iter().flatten().count()
    }
}
