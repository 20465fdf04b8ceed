use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tracing::{debug, info};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// One accepted client connection.
///
/// A session owns its socket halves and a FIFO transmit queue. The read loop
/// echoes every received line back through [`Session::send`], the same entry
/// point broadcasters use, so all outbound traffic funnels through one queue
/// and stays ordered per connection.
///
/// Each in-flight loop holds its own `Arc` clone, so the session cannot be
/// reclaimed while a read or write could still complete. Once the loops stop
/// and the last external reference drops, the session is gone and registry
/// entries pointing at it resolve to nothing.
pub struct Session {
    peer: SocketAddr,
    /// Taken by the first `start` call; `None` means the read loop is running
    /// (or has finished).
    reader: Mutex<Option<BufReader<OwnedReadHalf>>>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    /// Front element is the message currently on the wire; it stays in place
    /// until its write completes.
    queue: Mutex<VecDeque<String>>,
    /// Set when a write has failed; later sends are dropped.
    closing: AtomicBool,
}

impl Session {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Arc<Self> {
        let (reader, writer) = stream.into_split();
        Arc::new(Self {
            peer,
            reader: Mutex::new(Some(BufReader::new(reader))),
            writer: tokio::sync::Mutex::new(writer),
            queue: Mutex::new(VecDeque::new()),
            closing: AtomicBool::new(false),
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Spawns the read loop. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>) {
        let reader = self.reader.lock().unwrap().take();
        if let Some(reader) = reader {
            let session = Arc::clone(self);
            tokio::spawn(session.read_loop(reader));
        }
    }

    /// Enqueues `message` for transmission and starts the write loop if no
    /// write is currently in flight.
    ///
    /// With `priority` set the message is placed immediately behind the
    /// in-flight front instead of at the tail; it never preempts the message
    /// already on the wire. Fire-and-forget: delivery failures close the
    /// session but are never surfaced to the caller, and sends after a write
    /// failure are dropped. A read-side EOF does not stop delivery; echoes
    /// already queued still drain to a half-closed client.
    pub fn send(self: &Arc<Self>, message: impl Into<String>, priority: bool) {
        if self.enqueue(message.into(), priority) {
            let session = Arc::clone(self);
            tokio::spawn(session.write_loop());
        }
    }

    /// Returns true when the queue was empty, i.e. the caller must start the
    /// write loop.
    fn enqueue(&self, message: String, priority: bool) -> bool {
        let mut queue = self.queue.lock().unwrap();
        if self.closing.load(Ordering::Acquire) {
            return false;
        }
        if priority && !queue.is_empty() {
            queue.insert(1, message);
        } else {
            queue.push_back(message);
        }
        queue.len() == 1
    }

    /// Removes the just-transmitted front. Returns true while more messages
    /// are pending.
    fn dequeue(&self) -> bool {
        let mut queue = self.queue.lock().unwrap();
        assert!(
            queue.pop_front().is_some(),
            "dequeue with no message in flight"
        );
        !queue.is_empty()
    }

    fn front(&self) -> Option<String> {
        // Cloned so the queue lock is not held across the socket write.
        self.queue.lock().unwrap().front().cloned()
    }

    fn mark_closing(&self) {
        self.closing.store(true, Ordering::Release);
    }

    async fn read_loop(self: Arc<Self>, mut reader: BufReader<OwnedReadHalf>) {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    debug!(peer = %self.peer, "rx: eof");
                    break;
                }
                Ok(bytes) => {
                    debug!(peer = %self.peer, bytes, "rx: complete");
                    if !line.ends_with('\n') {
                        // Partial line at end of stream; the next read
                        // reports eof and ends the loop.
                        continue;
                    }
                    let echo = format!("{}\n", line.trim_end_matches(LINE_ENDINGS));
                    self.send(echo, false);
                }
                Err(error) => {
                    debug!(peer = %self.peer, %error, "rx: failed");
                    break;
                }
            }
        }
        // Queued echoes keep draining; the write loop ends on its own once
        // the queue empties or a write fails.
        info!(peer = %self.peer, "client disconnected");
    }

    async fn write_loop(self: Arc<Self>) {
        loop {
            let Some(message) = self.front() else {
                break;
            };
            let result = self
                .writer
                .lock()
                .await
                .write_all(message.as_bytes())
                .await;
            match result {
                Ok(()) => {
                    debug!(peer = %self.peer, bytes = message.len(), "tx: complete");
                    if !self.dequeue() {
                        break;
                    }
                }
                Err(error) => {
                    debug!(peer = %self.peer, %error, "tx: failed");
                    self.mark_closing();
                    self.queue.lock().unwrap().clear();
                    break;
                }
            }
        }
    }

    #[cfg(test)]
    fn queued(&self) -> Vec<String> {
        self.queue.lock().unwrap().iter().cloned().collect()
    }
}
