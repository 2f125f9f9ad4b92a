//! Pinned context snippets.

use std::time::Duration;
use std::time::Instant;

/// A small, high-priority snippet that survives compaction until its TTL
/// elapses.
#[derive(Debug, Clone)]
pub struct Pin {
    pub id: String,
    pub content: String,
    pub ttl: Option<Duration>,
    pub priority: i32,
    created_at: Instant,
}

impl Pin {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            ttl: None,
            priority: 0,
            created_at: Instant::now(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(self.created_at) >= ttl,
            None => false,
        }
    }
}

/// Insertion-ordered pin storage under a byte budget.
///
/// When an insert would exceed the budget, the lowest-priority pins (newest
/// first within equal priority) are evicted until it fits.
#[derive(Debug)]
pub struct PinStore {
    pins: Vec<Pin>,
    budget_bytes: usize,
}

/// Default byte budget for pinned content.
const DEFAULT_PIN_BUDGET_BYTES: usize = 8 * 1024;

impl Default for PinStore {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_BUDGET_BYTES)
    }
}

impl PinStore {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            pins: Vec::new(),
            budget_bytes,
        }
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    /// Insert or replace a pin by id, evicting lower-priority pins when the
    /// budget would be exceeded. Returns the ids of evicted pins.
    pub fn insert(&mut self, pin: Pin) -> Vec<String> {
        self.pins.retain(|existing| existing.id != pin.id);

        // A pin larger than the whole budget can never be stored.
        if pin.content.len() > self.budget_bytes {
            return vec![pin.id];
        }

        self.pins.push(pin);
        let mut evicted = Vec::new();
        while self.total_bytes() > self.budget_bytes {
            let victim = self
                .pins
                .iter()
                .enumerate()
                .min_by_key(|(index, pin)| (pin.priority, std::cmp::Reverse(*index)))
                .map(|(index, _)| index);
            match victim {
                // The newest insert can evict itself when everything else
                // outranks it.
                Some(index) => evicted.push(self.pins.remove(index).id),
                None => break,
            }
        }
        evicted
    }

    pub fn remove(&mut self, id: &str) -> Option<Pin> {
        let index = self.pins.iter().position(|pin| pin.id == id)?;
        Some(self.pins.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Pin> {
        self.pins.iter().find(|pin| pin.id == id)
    }

    /// Drop TTL-expired pins.
    pub fn expire(&mut self, now: Instant) {
        self.pins.retain(|pin| !pin.is_expired(now));
    }

    /// Live pins ordered by priority (highest first), then insertion order.
    pub fn active_pins(&self, now: Instant) -> Vec<&Pin> {
        let mut pins: Vec<(usize, &Pin)> = self
            .pins
            .iter()
            .enumerate()
            .filter(|(_, pin)| !pin.is_expired(now))
            .collect();
        pins.sort_by_key(|(index, pin)| (std::cmp::Reverse(pin.priority), *index));
        pins.into_iter().map(|(_, pin)| pin).collect()
    }

    pub fn total_bytes(&self) -> usize {
        self.pins.iter().map(|pin| pin.content.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// The text block re-attached to history after a compaction.
    pub fn render(&self, now: Instant) -> Option<String> {
        let pins = self.active_pins(now);
        if pins.is_empty() {
            return None;
        }
        let body = pins
            .iter()
            .map(|pin| format!("[{}] {}", pin.id, pin.content))
            .collect::<Vec<_>>()
            .join("\n");
        Some(body)
    }
}

#[cfg(test)]
#[path = "pins.test.rs"]
mod tests;
