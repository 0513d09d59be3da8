//! Rooms and the room directory
//!
//! A `Room` is a named broadcast domain: members, optional password
//! digest, moderator, ban list, and an optional chat network channel.
//! The `RoomDirectory` owns every room; creation is idempotent and a
//! room is deleted the instant its membership empties.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::types::{ClientId, ConnId, RoomId};

/// Why a join attempt was turned away.
///
/// Checks run in this order and short-circuit: ban before password, and
/// a missing password is distinct from a wrong one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDenied {
    /// Acting client id is on the ban list
    Banned,
    /// The room has a password and none was supplied
    PasswordRequired,
    /// The supplied password does not match the stored digest
    IncorrectPassword,
}

/// Hash a room password for storage (lowercase hex SHA-256)
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// One signaling room
#[derive(Debug)]
pub struct Room {
    /// Room identifier
    pub id: RoomId,
    /// Current members, by connection
    members: HashSet<ConnId>,
    /// Password digest; `None` means the room is open
    password_digest: Option<String>,
    /// Client id holding moderation authority, if any
    pub moderator: Option<ClientId>,
    /// Client ids banned for this room's lifetime
    banned: HashSet<ClientId>,
    /// Bound chat network channel, if any
    pub irc_channel: Option<String>,
}

impl Room {
    /// Create a room, digesting the password if one is given
    pub fn new(
        id: RoomId,
        password: Option<&str>,
        irc_channel: Option<String>,
        moderator: Option<ClientId>,
    ) -> Self {
        Self {
            id,
            members: HashSet::new(),
            password_digest: password.map(hash_password),
            moderator,
            banned: HashSet::new(),
            irc_channel,
        }
    }

    /// Run the ordered admission checks for a prospective member.
    ///
    /// Does not mutate; the caller adds the member only on `Ok`.
    pub fn admit(&self, client_id: &ClientId, password: Option<&str>) -> Result<(), AdmissionDenied> {
        if self.banned.contains(client_id) {
            return Err(AdmissionDenied::Banned);
        }
        if let Some(digest) = &self.password_digest {
            match password {
                None => return Err(AdmissionDenied::PasswordRequired),
                Some(supplied) if &hash_password(supplied) != digest => {
                    return Err(AdmissionDenied::IncorrectPassword)
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn has_password(&self) -> bool {
        self.password_digest.is_some()
    }

    pub fn insert_member(&mut self, conn: ConnId) {
        self.members.insert(conn);
    }

    /// Remove a member; returns true when the room is now empty.
    pub fn remove_member(&mut self, conn: ConnId) -> bool {
        self.members.remove(&conn);
        self.members.is_empty()
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.members.contains(&conn)
    }

    pub fn members(&self) -> &HashSet<ConnId> {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Ban a client id for the room's lifetime. Effective immediately
    /// and regardless of whether that id is currently a member.
    pub fn ban(&mut self, client_id: ClientId) {
        self.banned.insert(client_id);
    }

    pub fn is_banned(&self, client_id: &ClientId) -> bool {
        self.banned.contains(client_id)
    }

    /// Whether the given client id holds moderation authority here
    pub fn is_moderator(&self, client_id: &ClientId) -> bool {
        self.moderator.as_ref() == Some(client_id)
    }
}

/// Directory of all live rooms
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Create a room if the id is free; an existing room is left
    /// untouched (its password, channel, and moderator are kept).
    /// Returns true when a room was actually created.
    pub fn create(
        &mut self,
        id: RoomId,
        password: Option<&str>,
        irc_channel: Option<String>,
        moderator: Option<ClientId>,
    ) -> bool {
        if self.rooms.contains_key(&id) {
            return false;
        }
        let room = Room::new(id.clone(), password, irc_channel, moderator);
        self.rooms.insert(id, room);
        true
    }

    pub fn get(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    pub fn contains(&self, id: &RoomId) -> bool {
        self.rooms.contains_key(id)
    }

    /// Delete a room outright; the ban list dies with it.
    pub fn remove(&mut self, id: &RoomId) -> Option<Room> {
        self.rooms.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &Room)> {
        self.rooms.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_room() -> Room {
        Room::new(RoomId::from("r1"), None, None, None)
    }

    #[test]
    fn test_password_digest_round_trip() {
        let room = Room::new(RoomId::from("r1"), Some("secret"), None, None);
        assert!(room.has_password());
        assert!(room.admit(&ClientId::from("a"), Some("secret")).is_ok());
        assert_eq!(
            room.admit(&ClientId::from("a"), Some("wrong")),
            Err(AdmissionDenied::IncorrectPassword)
        );
    }

    #[test]
    fn test_missing_password_distinct_from_wrong() {
        let room = Room::new(RoomId::from("r1"), Some("secret"), None, None);
        assert_eq!(
            room.admit(&ClientId::from("a"), None),
            Err(AdmissionDenied::PasswordRequired)
        );
    }

    #[test]
    fn test_open_room_admits_without_password() {
        let room = open_room();
        assert!(!room.has_password());
        assert!(room.admit(&ClientId::from("a"), None).is_ok());
        // A superfluous password on an open room is ignored
        assert!(room.admit(&ClientId::from("a"), Some("whatever")).is_ok());
    }

    #[test]
    fn test_ban_checked_before_password() {
        let mut room = Room::new(RoomId::from("r1"), Some("secret"), None, None);
        room.ban(ClientId::from("evil"));
        // No password supplied, but the ban must win
        assert_eq!(
            room.admit(&ClientId::from("evil"), None),
            Err(AdmissionDenied::Banned)
        );
    }

    #[test]
    fn test_ban_applies_to_non_members() {
        let mut room = open_room();
        room.ban(ClientId::from("stranger"));
        assert_eq!(
            room.admit(&ClientId::from("stranger"), None),
            Err(AdmissionDenied::Banned)
        );
        assert!(room.is_banned(&ClientId::from("stranger")));
    }

    #[test]
    fn test_membership_and_emptiness() {
        let mut room = open_room();
        let a = ConnId::new();
        let b = ConnId::new();
        room.insert_member(a);
        room.insert_member(b);
        assert_eq!(room.member_count(), 2);
        assert!(!room.remove_member(a));
        assert!(room.remove_member(b));
        assert!(!room.contains(a));
    }

    #[test]
    fn test_directory_create_is_idempotent() {
        let mut rooms = RoomDirectory::new();
        assert!(rooms.create(
            RoomId::from("r1"),
            Some("secret"),
            Some("#chan".to_string()),
            Some(ClientId::from("alice")),
        ));
        // Second create must not touch password, channel, or moderator
        assert!(!rooms.create(RoomId::from("r1"), None, None, Some(ClientId::from("bob"))));
        let room = rooms.get(&RoomId::from("r1")).unwrap();
        assert!(room.has_password());
        assert_eq!(room.irc_channel.as_deref(), Some("#chan"));
        assert_eq!(room.moderator, Some(ClientId::from("alice")));
    }

    #[test]
    fn test_directory_remove_discards_ban_list() {
        let mut rooms = RoomDirectory::new();
        rooms.create(RoomId::from("r1"), None, None, None);
        rooms
            .get_mut(&RoomId::from("r1"))
            .unwrap()
            .ban(ClientId::from("evil"));
        rooms.remove(&RoomId::from("r1"));
        assert!(rooms.is_empty());

        // A recreated room starts with a fresh ban list
        rooms.create(RoomId::from("r1"), None, None, None);
        let room = rooms.get(&RoomId::from("r1")).unwrap();
        assert!(room.admit(&ClientId::from("evil"), None).is_ok());
    }

    #[test]
    fn test_hash_password_is_hex_sha256() {
        // sha256("secret")
        assert_eq!(
            hash_password("secret"),
            "2bb80d537b1da3e38bd30361aa855686bde0eacd7162fef6a25fe97bf527a25b"
        );
    }
}
