use crate::error::{DinoError, Result};
use async_trait::async_trait;
use crate::peers::{LeaveOutcome, PeerRecord};
use sled::transaction::TransactionResult;
use std::path::Path;
use tracing::{debug, error, info};

const PEERS_TREE: &str = "users";

/// Port through which accepted peers are handed to whoever keeps membership.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Returns `true` when the peer was not known before.
    async fn register(&self, address: &str) -> Result<bool>;
}

#[derive(Clone)]
pub struct MembershipStore {
    db: sled::Db,
    peers: sled::Tree,
}

impl MembershipStore {
    pub fn open(path: &Path) -> Result<Self> {
        debug!("opening membership store at {}", path.display());
        Self::from_db(sled::open(path)?)
    }

    /// A store that lives only as long as the process.
    pub fn open_temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let peers = db.open_tree(PEERS_TREE)?;
        Ok(Self { db, peers })
    }

    /// Insert an active peer unless one with the same address exists.
    pub fn add(&self, address: &str) -> Result<bool> {
        let value = serde_json::to_vec(&PeerRecord::active(address))?;
        let inserted: TransactionResult<bool, DinoError> = self.peers.transaction(|tx| {
            if tx.get(address.as_bytes())?.is_some() {
                return Ok(false);
            }
            tx.insert(address.as_bytes(), value.as_slice())?;
            Ok(true)
        });
        let inserted = inserted?;

        if inserted {
            self.peers.flush()?;
        }
        Ok(inserted)
    }

    pub fn remove(&self, address: &str) -> Result<bool> {
        let removed: TransactionResult<bool, DinoError> = self
            .peers
            .transaction(|tx| Ok(tx.remove(address.as_bytes())?.is_some()));
        let removed = removed?;

        self.peers.flush()?;
        Ok(removed)
    }

    pub fn contains(&self, address: &str) -> Result<bool> {
        Ok(self.peers.contains_key(address.as_bytes())?)
    }

    /// All members, ordered by address.
    pub fn list(&self) -> Result<Vec<PeerRecord>> {
        self.peers
            .iter()
            .values()
            .map(|value| -> Result<PeerRecord> { Ok(serde_json::from_slice(&value?)?) })
            .collect()
    }

    pub fn addresses(&self) -> Result<Vec<String>> {
        Ok(self.list()?.into_iter().map(|peer| peer.address).collect())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Remove `address` from the membership.
    ///
    /// The local table is authoritative; `listing` is what the discovery
    /// service currently reports. A peer absent from both is not connected
    /// and nothing is touched.
    pub fn leave(&self, address: &str, listing: &[String]) -> LeaveOutcome {
        self.leave_with(address, listing, MembershipStore::remove)
    }

    fn leave_with<F>(&self, address: &str, listing: &[String], remove: F) -> LeaveOutcome
    where
        F: FnOnce(&MembershipStore, &str) -> Result<bool>,
    {
        let listed = listing.iter().any(|member| member == address);
        let stored = match self.contains(address) {
            Ok(stored) => stored,
            Err(e) => {
                return LeaveOutcome::ErrorDeleting {
                    address: address.to_string(),
                    detail: e.to_string(),
                }
            }
        };

        if !listed && !stored {
            return LeaveOutcome::NotConnected(address.to_string());
        }

        match remove(self, address) {
            Ok(_) => {
                info!("{} left the network", address);
                LeaveOutcome::Left(address.to_string())
            }
            Err(e) => {
                error!("failed to delete {}: {}", address, e);
                LeaveOutcome::ErrorDeleting {
                    address: address.to_string(),
                    detail: e.to_string(),
                }
            }
        }
    }

    /// Flush everything, including trees other than the peer table.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[async_trait]
impl Registrar for MembershipStore {
    async fn register(&self, address: &str) -> Result<bool> {
        self.add(address)
    }
}
