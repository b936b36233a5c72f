//! Arrival-order pairing of accepted connections.
//!
//! The first and second arrivals form room 1, the third and fourth room 2,
//! and so on. Room ids start from 1 and increment for each formed pair.

use log::info;

/// Two arrivals bound for the same room, in arrival order.
#[derive(Debug)]
pub struct Pairing<T> {
    pub room_id: u64,
    pub first: T,
    pub second: T,
}

#[derive(Debug)]
pub struct PairingQueue<T> {
    waiting: Option<T>,
    next_room_id: u64,
}

impl<T> PairingQueue<T> {
    pub fn new() -> Self {
        Self {
            waiting: None,
            next_room_id: 1,
        }
    }

    /// Adds an arrival. Returns a pairing once a partner is already waiting.
    pub fn push(&mut self, arrival: T) -> Option<Pairing<T>> {
        match self.waiting.take() {
            None => {
                self.waiting = Some(arrival);
                None
            }
            Some(first) => {
                let room_id = self.next_room_id;
                self.next_room_id += 1;
                info!("Paired arrivals into room {}", room_id);
                Some(Pairing {
                    room_id,
                    first,
                    second: arrival,
                })
            }
        }
    }

    /// True while an arrival is waiting for a partner
    pub fn has_waiting(&self) -> bool {
        self.waiting.is_some()
    }

    /// Number of pairs formed so far
    pub fn rooms_formed(&self) -> u64 {
        self.next_room_id - 1
    }
}

impl<T> Default for PairingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
