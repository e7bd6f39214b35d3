//! Statistics tracking for the multiplexer

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::frames::ClientFrame;

/// Point-in-time multiplexer statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MuxStats {
    pub connect_attempts: u64,
    pub connections_established: u64,
    pub frames_received: u64,
    pub frames_malformed: u64,
    pub subscribe_frames_sent: u64,
    pub unsubscribe_frames_sent: u64,
    pub pings_sent: u64,
}

/// Thread-safe statistics collector
#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    connect_attempts: AtomicU64,
    connections_established: AtomicU64,
    frames_received: AtomicU64,
    frames_malformed: AtomicU64,
    subscribe_frames_sent: AtomicU64,
    unsubscribe_frames_sent: AtomicU64,
    pings_sent: AtomicU64,
}

impl StatsCollector {
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connected(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.frames_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self, frame: &ClientFrame) {
        let counter = match frame {
            ClientFrame::Subscribe { .. } => &self.subscribe_frames_sent,
            ClientFrame::Unsubscribe { .. } => &self.unsubscribe_frames_sent,
            ClientFrame::Ping { .. } => &self.pings_sent,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MuxStats {
        MuxStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_malformed: self.frames_malformed.load(Ordering::Relaxed),
            subscribe_frames_sent: self.subscribe_frames_sent.load(Ordering::Relaxed),
            unsubscribe_frames_sent: self.unsubscribe_frames_sent.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
        }
    }
}
