//! Process-scoped one-time user ids.
//!
//! Some partners expect a stable pseudo-random id per page view when no
//! identity module supplied one. The cache owns both the ids and the random
//! source, so tests can seed it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

const ONE_TIME_ID_LEN: usize = 20;

static GLOBAL: Lazy<Arc<IdentityCache>> = Lazy::new(|| Arc::new(IdentityCache::from_entropy()));

pub struct IdentityCache<R: RngCore + Send = StdRng> {
    ids: Mutex<HashMap<String, String>>,
    rng: Mutex<R>,
}

impl IdentityCache<StdRng> {
    #[must_use]
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Cache shared by every adapter in the process.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }
}

impl<R: RngCore + Send> IdentityCache<R> {
    pub fn new(rng: R) -> Self {
        Self {
            ids: Mutex::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: &str, id: String) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), id);
    }

    /// Return the cached id for `key`, generating and storing one on first use.
    pub fn get_or_generate(&self, key: &str) -> String {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = ids.get(key) {
            return id.clone();
        }

        let id = self.generate();
        log::debug!("Generated one-time user id for {key}: {id}");
        ids.insert(key.to_string(), id.clone());
        id
    }

    /// Four random `u32`s in base 36, concatenated and cut to 20 characters.
    fn generate(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut id: String = (0..4).map(|_| to_base36(rng.next_u32())).collect();
        id.truncate(ONE_TIME_ID_LEN);
        id
    }
}

fn to_base36(mut value: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
