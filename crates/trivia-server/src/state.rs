use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use trivia_core::question::QuestionBank;

use crate::config::ServerConfig;
use crate::room_manager::RoomManager;

pub type SharedRoomManager = Arc<RwLock<RoomManager>>;
pub type IpConnectionMap = Arc<Mutex<HashMap<IpAddr, usize>>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: SharedRoomManager,
    pub bank: Arc<QuestionBank>,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub ws_per_ip: IpConnectionMap,
}

impl AppState {
    pub fn new(config: ServerConfig, bank: QuestionBank) -> Self {
        let max_players = config.game.max_players;
        Self {
            rooms: Arc::new(RwLock::new(RoomManager::new(max_players))),
            bank: Arc::new(bank),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            ws_per_ip: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// RAII guard counting one open WebSocket connection.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII guard counting open WebSocket connections per client IP.
pub struct IpConnectionGuard {
    ip: IpAddr,
    map: IpConnectionMap,
}

impl IpConnectionGuard {
    /// Acquire a slot for `ip`, or `None` when the per-IP limit is reached.
    pub fn try_acquire(ip: IpAddr, map: IpConnectionMap, max_per_ip: usize) -> Option<Self> {
        let mut counts = map.lock().unwrap();
        let count = counts.entry(ip).or_insert(0);
        if *count >= max_per_ip {
            return None;
        }
        *count += 1;
        drop(counts);
        Some(Self { ip, map })
    }
}

impl Drop for IpConnectionGuard {
    fn drop(&mut self) {
        let mut counts = self.map.lock().unwrap();
        if let Some(count) = counts.get_mut(&self.ip) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.ip);
            }
        }
    }
}
