use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-user attributes persisted across sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Attributes {
    #[serde(rename = "faveStop")]
    pub fave_stop: Option<String>,
}

impl Attributes {
    pub fn is_empty(&self) -> bool {
        self.fave_stop.is_none()
    }
}

pub trait AttributeStore {
    type Error;

    /// Returns the stored attributes, or an empty set when nothing is stored.
    fn get(&self, user_id: &str) -> Result<Attributes, Self::Error>;

    /// Overwrites everything stored for the user.
    fn set(&self, user_id: &str, attributes: Attributes) -> Result<(), Self::Error>;

    /// Removes everything stored for the user. Deleting nothing is not an error.
    fn delete(&self, user_id: &str) -> Result<(), Self::Error>;
}

pub fn favourite_stop<S: AttributeStore>(
    store: &S,
    user_id: &str,
) -> Result<Option<String>, S::Error> {
    Ok(store.get(user_id)?.fave_stop)
}

pub fn save_favourite_stop<S: AttributeStore>(
    store: &S,
    user_id: &str,
    stop: &str,
) -> Result<(), S::Error> {
    let mut attributes = store.get(user_id)?;
    attributes.fave_stop = Some(stop.to_string());
    store.set(user_id, attributes)
}

pub fn delete_favourite_stop<S: AttributeStore>(store: &S, user_id: &str) -> Result<(), S::Error> {
    let mut attributes = store.get(user_id)?;
    attributes.fave_stop = None;

    if attributes.is_empty() {
        store.delete(user_id)
    } else {
        store.set(user_id, attributes)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, Attributes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }
}

impl AttributeStore for MemoryStore {
    type Error = anyhow::Error;

    fn get(&self, user_id: &str) -> Result<Attributes> {
        let users = self.users.lock().map_err(|_| anyhow!("attribute store poisoned"))?;
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }

    fn set(&self, user_id: &str, attributes: Attributes) -> Result<()> {
        let mut users = self.users.lock().map_err(|_| anyhow!("attribute store poisoned"))?;
        users.insert(user_id.to_string(), attributes);
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        let mut users = self.users.lock().map_err(|_| anyhow!("attribute store poisoned"))?;
        users.remove(user_id);
        Ok(())
    }
}

/// Keeps every user's attributes in one postcard-encoded file, rewritten on
/// each change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    users: Mutex<HashMap<String, Attributes>>,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let users = if path.exists() {
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading attributes from {path:?}"))?;
            postcard::from_bytes(&bytes)
                .with_context(|| format!("decoding attributes from {path:?}"))?
        } else {
            debug!("no attribute file at {path:?}, starting empty");
            HashMap::new()
        };

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    fn save(&self, users: &HashMap<String, Attributes>) -> Result<()> {
        let bytes = postcard::to_stdvec(users)?;
        std::fs::write(&self.path, &bytes)
            .with_context(|| format!("writing attributes to {:?}", self.path))?;
        Ok(())
    }
}

impl AttributeStore for FileStore {
    type Error = anyhow::Error;

    fn get(&self, user_id: &str) -> Result<Attributes> {
        let users = self.users.lock().map_err(|_| anyhow!("attribute store poisoned"))?;
        Ok(users.get(user_id).cloned().unwrap_or_default())
    }

    fn set(&self, user_id: &str, attributes: Attributes) -> Result<()> {
        let mut users = self.users.lock().map_err(|_| anyhow!("attribute store poisoned"))?;
        users.insert(user_id.to_string(), attributes);
        self.save(&users)
    }

    fn delete(&self, user_id: &str) -> Result<()> {
        let mut users = self.users.lock().map_err(|_| anyhow!("attribute store poisoned"))?;
        if users.remove(user_id).is_some() {
            self.save(&users)?;
        }
        Ok(())
    }
}
