//! In-process leases on `(private_org, repo_name)`.
//!
//! Two sagas in the same process cannot race on one repository name. Sagas in
//! different processes still can; the remote create call is the final arbiter.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type LeaseKey = (String, String);

#[derive(Clone, Debug, Default)]
pub struct NameLeases {
    held: Arc<Mutex<HashSet<LeaseKey>>>,
}

impl NameLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lease, or returns `None` while another holder has it.
    pub fn try_acquire(&self, org: &str, name: &str) -> Option<NameLease> {
        // Org and repository names are case-insensitive on GitHub.
        let key = (org.to_lowercase(), name.to_lowercase());
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());

        if !held.insert(key.clone()) {
            return None;
        }

        Some(NameLease {
            held: Arc::clone(&self.held),
            key,
        })
    }
}

/// Released on drop.
#[derive(Debug)]
pub struct NameLease {
    held: Arc<Mutex<HashSet<LeaseKey>>>,
    key: LeaseKey,
}

impl Drop for NameLease {
    fn drop(&mut self) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.remove(&self.key);
    }
}
