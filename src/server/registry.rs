//! The active-user registry.
//!
//! One lock guards two indices: `user_id → member` (primary) and
//! `username → user_id`. Insertion is check-and-insert under that single
//! lock, which is what makes a concurrent duplicate login lose cleanly.
//! Broadcast paths take a snapshot and release the lock before any I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::crypto::AeadKey;
use crate::error::{Error, Result};
use crate::protocol::messages::ActiveUser;
use crate::server::connection::Connection;

/// One authenticated participant.
#[derive(Debug)]
pub struct Member {
    /// Server-issued session identifier (primary key).
    pub user_id: String,
    /// Unique username.
    pub username: String,
    /// Shared transport handle.
    pub connection: Arc<Connection>,
    /// This member's AEAD session key.
    pub session_key: AeadKey,
}

#[derive(Default)]
struct Tables {
    by_id: HashMap<String, Arc<Member>>,
    by_name: HashMap<String, String>,
}

/// Registry of all authenticated connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    tables: RwLock<Tables>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a member, enforcing uniqueness of both `user_id` and
    /// `username` atomically.
    pub fn insert(&self, member: Member) -> Result<Arc<Member>> {
        let mut tables = self.tables.write();
        if tables.by_name.contains_key(&member.username) || tables.by_id.contains_key(&member.user_id)
        {
            return Err(Error::DuplicateLogin(member.username));
        }

        let member = Arc::new(member);
        tables
            .by_name
            .insert(member.username.clone(), member.user_id.clone());
        tables.by_id.insert(member.user_id.clone(), Arc::clone(&member));
        Ok(member)
    }

    /// Remove a member, evicting both indices. Removing an absent id is
    /// a no-op. The caller is responsible for closing the connection.
    pub fn remove(&self, user_id: &str) -> Option<Arc<Member>> {
        let mut tables = self.tables.write();
        let member = tables.by_id.remove(user_id)?;
        tables.by_name.remove(&member.username);
        Some(member)
    }

    /// Look up a member by session identifier.
    pub fn get(&self, user_id: &str) -> Option<Arc<Member>> {
        self.tables.read().by_id.get(user_id).cloned()
    }

    /// Look up a member by username.
    pub fn get_by_username(&self, username: &str) -> Option<Arc<Member>> {
        let tables = self.tables.read();
        let user_id = tables.by_name.get(username)?;
        tables.by_id.get(user_id).cloned()
    }

    /// Whether a username is currently active.
    pub fn username_exists(&self, username: &str) -> bool {
        self.tables.read().by_name.contains_key(username)
    }

    /// Snapshot of every member, for fan-out. The lock is released
    /// before the caller performs any sends.
    pub fn members(&self) -> Vec<Arc<Member>> {
        self.tables.read().by_id.values().cloned().collect()
    }

    /// Snapshot of the user list as it appears in `INIT`.
    pub fn active_users(&self) -> Vec<ActiveUser> {
        self.tables
            .read()
            .by_id
            .values()
            .map(|m| ActiveUser {
                username: m.username.clone(),
                user_id: m.user_id.clone(),
            })
            .collect()
    }

    /// Remove and return every member (server shutdown).
    pub fn drain(&self) -> Vec<Arc<Member>> {
        let mut tables = self.tables.write();
        tables.by_name.clear();
        tables.by_id.drain().map(|(_, m)| m).collect()
    }

    /// Number of active members.
    pub fn len(&self) -> usize {
        self.tables.read().by_id.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.read().by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_SIZE;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_connection() -> Arc<Connection> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let peer = client.peer_addr().unwrap();
        let (_read, write) = client.into_split();
        let _ = listener.accept().await.unwrap();
        Arc::new(Connection::new(write, peer))
    }

    fn member(conn: &Arc<Connection>, user_id: &str, username: &str) -> Member {
        Member {
            user_id: user_id.into(),
            username: username.into(),
            connection: Arc::clone(conn),
            session_key: AeadKey::from_bytes([0u8; KEY_SIZE]),
        }
    }

    #[tokio::test]
    async fn test_insert_lookup_remove() {
        let registry = ConnectionRegistry::new();
        let conn = test_connection().await;

        registry
            .insert(member(&conn, "user_00000001", "alice"))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.username_exists("alice"));
        assert_eq!(registry.get("user_00000001").unwrap().username, "alice");
        assert_eq!(
            registry.get_by_username("alice").unwrap().user_id,
            "user_00000001"
        );

        let removed = registry.remove("user_00000001").unwrap();
        assert_eq!(removed.username, "alice");
        assert!(registry.is_empty());
        assert!(!registry.username_exists("alice"));
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        assert!(registry.remove("user_deadbeef").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let registry = ConnectionRegistry::new();
        let conn = test_connection().await;

        registry
            .insert(member(&conn, "user_00000001", "alice"))
            .unwrap();
        let err = registry
            .insert(member(&conn, "user_00000002", "alice"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateLogin(u) if u == "alice"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_user_id_rejected() {
        let registry = ConnectionRegistry::new();
        let conn = test_connection().await;

        registry
            .insert(member(&conn, "user_00000001", "alice"))
            .unwrap();
        let err = registry
            .insert(member(&conn, "user_00000001", "bob"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateLogin(_)));
        assert_eq!(registry.len(), 1);
        assert!(!registry.username_exists("bob"));
    }

    #[tokio::test]
    async fn test_concurrent_inserts_admit_exactly_one() {
        let registry = Arc::new(ConnectionRegistry::new());
        let conn = test_connection().await;

        let mut handles = Vec::new();
        for n in 0..8 {
            let registry = Arc::clone(&registry);
            let conn = Arc::clone(&conn);
            handles.push(std::thread::spawn(move || {
                registry
                    .insert(Member {
                        user_id: format!("user_0000000{}", n),
                        username: "alice".into(),
                        connection: conn,
                        session_key: AeadKey::from_bytes([0u8; KEY_SIZE]),
                    })
                    .is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(registry.len(), 1);
    }
}
