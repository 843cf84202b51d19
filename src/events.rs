//! # Event Queue
//!
//! Bounded FIFO of encoded events between the engine (many producers) and a
//! single consumer.
//!
//! ## Producers
//! `push` never blocks on a full queue: workers and the ticker are time
//! sensitive, so an event that does not fit is dropped whole and counted.
//! Multi-event records (the load report pair) go in with one push so they
//! stay adjacent.
//!
//! ## Consumer
//! Reads are serialized by their own lock, independent of the producer lock,
//! so a push never interleaves with a half-finished drain. A blocking read
//! parks on a condition variable until a push lands or `interrupt` is called.
//! A read notes the interrupt generation before queueing on the reader lock,
//! so an interrupt also reaches readers still waiting for their turn.

use crate::error::QueueError;
use crate::games::tictactoe::Player;
use kxo_shared::{encode_load, encode_move, encode_reset, EVENT_SIZE};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Drops are logged on the first occurrence and then every this many.
const DROP_LOG_INTERVAL: u64 = 1024;

/// Something worth telling the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// `player` wrote `cell` on game `game_id`.
    Move {
        game_id: usize,
        cell: usize,
        player: Player,
    },
    /// Load percentages (0..=200) for both players of a game.
    Load { game_id: usize, a_pct: u8, b_pct: u8 },
    /// Every game was decided and the pool started over.
    Reset,
}

/// Wire bytes of one [`Event`].
#[derive(Debug, Clone, Copy)]
pub struct Encoded {
    buf: [u8; 2 * EVENT_SIZE],
    len: usize,
}

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Event {
    pub fn encode(&self) -> Encoded {
        let mut buf = [0u8; 2 * EVENT_SIZE];
        let len = match *self {
            Event::Move {
                game_id,
                cell,
                player,
            } => {
                buf[..EVENT_SIZE].copy_from_slice(&encode_move(
                    game_id as u8,
                    cell as u8,
                    player == Player::A,
                ));
                EVENT_SIZE
            }
            Event::Load {
                game_id,
                a_pct,
                b_pct,
            } => {
                buf = encode_load(game_id as u8, a_pct, b_pct);
                2 * EVENT_SIZE
            }
            Event::Reset => {
                buf[..EVENT_SIZE].copy_from_slice(&encode_reset());
                EVENT_SIZE
            }
        };
        Encoded { buf, len }
    }
}

/// How a consumer read behaves on an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Park until data arrives or the read is interrupted.
    Blocking,
    /// Fail with [`QueueError::WouldBlock`].
    NonBlocking,
    /// Park for at most the given time, then return zero bytes.
    Timeout(Duration),
}

pub struct EventQueue {
    bytes: Mutex<VecDeque<u8>>,
    readable: Condvar,
    /// Bumped by `interrupt`, under the `bytes` lock, to release readers.
    interrupt_gen: AtomicU64,
    reader: Mutex<()>,
    capacity: usize,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl EventQueue {
    /// Creates a queue holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::with_capacity(capacity)),
            readable: Condvar::new(),
            interrupt_gen: AtomicU64::new(0),
            reader: Mutex::new(()),
            capacity,
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Appends `bytes` as one unit.
    ///
    /// # Returns
    /// true if queued, false if the queue lacked room (nothing was written)
    pub fn push(&self, bytes: &[u8]) -> bool {
        {
            let mut queued = self.bytes.lock();
            if queued.len() + bytes.len() > self.capacity {
                drop(queued);
                let dropped = self.dropped.fetch_add(1, Ordering::AcqRel) + 1;
                if dropped == 1 || dropped % DROP_LOG_INTERVAL == 0 {
                    warn!(len = bytes.len(), dropped, "event queue full, event dropped");
                }
                return false;
            }
            queued.extend(bytes.iter().copied());
        }
        self.pushed.fetch_add(1, Ordering::AcqRel);
        self.readable.notify_all();
        true
    }

    pub fn push_event(&self, event: &Event) -> bool {
        self.push(event.encode().as_ref())
    }

    /// Copies up to `buf.len()` queued bytes into `buf`.
    pub fn read_into(&self, buf: &mut [u8], mode: ReadMode) -> Result<usize, QueueError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let start_gen = self.interrupt_gen.load(Ordering::Acquire);
        let _reader = self.reader.lock();
        let mut queued = self.bytes.lock();
        let mut deadline: Option<Instant> = None;
        while queued.is_empty() {
            if mode == ReadMode::NonBlocking {
                return Err(QueueError::WouldBlock);
            }
            if self.interrupt_gen.load(Ordering::Acquire) != start_gen {
                return Err(QueueError::Interrupted);
            }
            match mode {
                ReadMode::Timeout(limit) => {
                    let deadline = *deadline.get_or_insert_with(|| Instant::now() + limit);
                    if self.readable.wait_until(&mut queued, deadline).timed_out()
                        && queued.is_empty()
                    {
                        return Ok(0);
                    }
                }
                _ => {
                    self.readable.wait(&mut queued);
                }
            }
        }
        let n = buf.len().min(queued.len());
        for (dst, src) in buf.iter_mut().zip(queued.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    /// Drains up to `max` bytes into a fresh buffer.
    pub fn drain(&self, max: usize, mode: ReadMode) -> Result<Vec<u8>, QueueError> {
        let mut buf = vec![0u8; max.min(self.capacity)];
        let n = self.read_into(&mut buf, mode)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Returns whatever is queued right now, possibly nothing.
    pub fn try_drain(&self, max: usize) -> Vec<u8> {
        self.drain(max, ReadMode::NonBlocking).unwrap_or_default()
    }

    /// Fails every read in progress with [`QueueError::Interrupted`],
    /// including reads still waiting for the reader lock. Reads that find
    /// data are unaffected.
    pub fn interrupt(&self) {
        {
            let _queued = self.bytes.lock();
            self.interrupt_gen.fetch_add(1, Ordering::AcqRel);
        }
        self.readable.notify_all();
    }

    /// Bytes currently queued.
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Successful pushes so far.
    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Acquire)
    }

    /// Pushes rejected for lack of room.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_encode_lengths() {
        let mv = Event::Move {
            game_id: 2,
            cell: 4,
            player: Player::B,
        };
        assert_eq!(mv.encode().as_ref(), &[2, 8]);
        assert_eq!(Event::Reset.encode().as_ref(), &[0x80, 0]);
        let load = Event::Load {
            game_id: 1,
            a_pct: 10,
            b_pct: 20,
        };
        assert_eq!(load.encode().as_ref(), &[0x41, 10, 20, 0]);
    }

    #[test]
    fn test_fifo_order() {
        let queue = EventQueue::new(64);
        assert!(queue.push(&[1, 2]));
        assert!(queue.push(&[3, 4]));
        assert_eq!(queue.drain(3, ReadMode::NonBlocking).unwrap(), vec![1, 2, 3]);
        assert_eq!(queue.drain(8, ReadMode::NonBlocking).unwrap(), vec![4]);
    }

    #[test]
    fn test_full_queue_drops_whole_push() {
        let queue = EventQueue::new(4);
        assert!(queue.push(&[1, 2]));
        assert!(queue.push(&[3, 4]));
        assert!(!queue.push(&[5, 6]));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pushed(), 2);
        assert_eq!(queue.drain(8, ReadMode::NonBlocking).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_nonblocking_empty() {
        let queue = EventQueue::new(4);
        assert_eq!(
            queue.drain(2, ReadMode::NonBlocking),
            Err(QueueError::WouldBlock)
        );
        assert!(queue.try_drain(2).is_empty());
        assert_eq!(
            queue.drain(2, ReadMode::Timeout(Duration::from_millis(5))),
            Ok(Vec::new())
        );
    }

    #[test]
    fn test_blocking_read_wakes_on_push() {
        let queue = Arc::new(EventQueue::new(16));
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain(2, ReadMode::Blocking))
        };
        thread::sleep(Duration::from_millis(20));
        queue.push(&[9, 9]);
        assert_eq!(reader.join().unwrap(), Ok(vec![9, 9]));
    }

    #[test]
    fn test_blocking_read_interrupted() {
        let queue = Arc::new(EventQueue::new(16));
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain(2, ReadMode::Blocking))
        };
        while !reader.is_finished() {
            queue.interrupt();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(reader.join().unwrap(), Err(QueueError::Interrupted));
    }

    #[test]
    fn test_interrupt_reaches_queued_reader() {
        let queue = Arc::new(EventQueue::new(16));
        let spawn_reader = || {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.drain(2, ReadMode::Blocking))
        };
        // The first reader parks holding the reader lock, the second waits
        // behind it.
        let first = spawn_reader();
        thread::sleep(Duration::from_millis(50));
        let second = spawn_reader();
        thread::sleep(Duration::from_millis(50));

        queue.interrupt();
        assert_eq!(first.join().unwrap(), Err(QueueError::Interrupted));
        assert_eq!(second.join().unwrap(), Err(QueueError::Interrupted));
    }
}
