//! Bonding database
//!
//! Records are kept in insertion order and looked up either by peer
//! address (resolving private addresses against each record's IRK) or by
//! the master identification of a stored LTK. Persistence is delegated to a
//! [`BondDbLoader`]; the on-disk format is the loader's business.

use super::crypto::private_address_resolves;
use super::keys::{BondingData, MasterId};
use crate::error::SmpResult;
use crate::gap::{AddressType, PeerAddress};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Stable identifier of a record within a [`BondDatabase`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BondRecordId(u64);

/// A bonded peer and the keys negotiated with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondRecord {
    id: BondRecordId,
    pub peer_addr: PeerAddress,
    /// Bonding records are scoped to the role the peer played
    pub peer_is_client: bool,
    pub bonding_data: BondingData,
}

impl BondRecord {
    pub fn id(&self) -> BondRecordId {
        self.id
    }

    /// Whether this record belongs to the peer currently using `peer_address`
    pub fn matches_address(&self, peer_address: &PeerAddress) -> bool {
        match peer_address.addr_type {
            AddressType::Public | AddressType::RandomStatic => self.peer_addr == *peer_address,
            AddressType::RandomPrivateResolvable => match &self.bonding_data.peer_id {
                Some(id_key) => private_address_resolves(peer_address, &id_key.irk),
                None => false,
            },
            AddressType::RandomPrivateNonResolvable => false,
        }
    }
}

/// Which of a record's LTKs matched a master id lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoundReason {
    OwnMasterId,
    PeerMasterId,
}

/// Collection of bond records shared by all sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondDatabase {
    records: Vec<BondRecord>,
    next_id: u64,
}

impl BondDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record that is not yet part of the database
    pub fn create(&mut self, peer_addr: PeerAddress, peer_is_client: bool, bonding_data: BondingData) -> BondRecord {
        let id = BondRecordId(self.next_id);
        self.next_id += 1;
        BondRecord {
            id,
            peer_addr,
            peer_is_client,
            bonding_data,
        }
    }

    /// Add a record, replacing any record with the same id
    pub fn add(&mut self, record: BondRecord) -> BondRecordId {
        let id = record.id;
        if id.0 >= self.next_id {
            self.next_id = id.0 + 1;
        }
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        id
    }

    pub fn get(&self, id: BondRecordId) -> Option<&BondRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: BondRecordId) -> Option<&mut BondRecord> {
        self.records.iter_mut().find(|r| r.id == id)
    }

    pub fn delete(&mut self, id: BondRecordId) -> Option<BondRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    pub fn delete_all(&mut self) {
        self.records.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &BondRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the record for a peer address in the given role.
    ///
    /// Identity addresses match byte for byte, resolvable private addresses
    /// are resolved against each record's IRK, and non-resolvable addresses
    /// never match. The first match in insertion order wins.
    pub fn find_record(&self, peer_address: &PeerAddress, peer_is_client: bool) -> Option<&BondRecord> {
        if peer_address.addr_type == AddressType::RandomPrivateNonResolvable {
            return None;
        }

        let found = self
            .records
            .iter()
            .filter(|r| r.peer_is_client == peer_is_client)
            .find(|r| r.matches_address(peer_address));

        if let Some(record) = found {
            if peer_address.addr_type == AddressType::RandomPrivateResolvable {
                info!(peer = %peer_address, identity = %record.peer_addr, "Resolved peer identity");
            }
        }
        found
    }

    /// Find the record holding an LTK with the given master id.
    ///
    /// The record's own LTK is checked before the peer's.
    pub fn find_record_by_master_id(
        &self,
        master_id: &MasterId,
        peer_is_client: bool,
    ) -> Option<(&BondRecord, FoundReason)> {
        for record in self.records.iter().filter(|r| r.peer_is_client == peer_is_client) {
            if record.bonding_data.own_ltk.master_id == *master_id {
                debug!(record = ?record.id, "Found record by own master id");
                return Some((record, FoundReason::OwnMasterId));
            }
            if record.bonding_data.peer_ltk.master_id == *master_id {
                debug!(record = ?record.id, "Found record by peer master id");
                return Some((record, FoundReason::PeerMasterId));
            }
        }
        None
    }

    /// Remove every other record in the same role that carries `keep`'s
    /// identity address. Returns the number of records removed.
    pub fn dedupe_identity(&mut self, keep: BondRecordId) -> usize {
        let Some(kept) = self.get(keep).cloned() else {
            return 0;
        };
        let before = self.records.len();
        self.records.retain(|r| {
            r.id == keep || r.peer_is_client != kept.peer_is_client || r.peer_addr != kept.peer_addr
        });
        before - self.records.len()
    }
}

/// Loads and persists a [`BondDatabase`]
pub trait BondDbLoader: Send + Sync {
    fn load(&self) -> SmpResult<BondDatabase>;

    fn save(&self, db: &BondDatabase) -> SmpResult<()>;
}

/// Loader that keeps the last saved database in memory
#[derive(Debug, Default)]
pub struct MemoryBondDbLoader {
    saved: Mutex<Option<BondDatabase>>,
    save_count: Mutex<usize>,
}

impl MemoryBondDbLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing database
    pub fn with_database(db: BondDatabase) -> Self {
        Self {
            saved: Mutex::new(Some(db)),
            save_count: Mutex::new(0),
        }
    }

    pub fn saved(&self) -> Option<BondDatabase> {
        self.saved.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.save_count.lock()
    }
}

impl BondDbLoader for MemoryBondDbLoader {
    fn load(&self) -> SmpResult<BondDatabase> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save(&self, db: &BondDatabase) -> SmpResult<()> {
        *self.saved.lock() = Some(db.clone());
        *self.save_count.lock() += 1;
        Ok(())
    }
}
