use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("mapping is not a JSON object of id -> name: {0}")]
    InvalidJson(String),
    #[error("mapping key '{0}' is not a non-negative integer")]
    BadId(String),
    #[error("mapping ids are not contiguous: expected {expected}, found {found}")]
    Gap { expected: usize, found: usize },
    #[error("node '{0}' is mapped to more than one id")]
    DuplicateName(String),
}

/// Dense id <-> node name bijection, ids handed out in first-seen order
/// starting at `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIndexMapping {
    base: usize,
    names: IndexSet<String>,
}

impl NodeIndexMapping {
    pub fn new(base: usize) -> Self {
        Self { base, names: IndexSet::new() }
    }

    /// Id for `name`, assigning the next one on first use.
    pub fn insert(&mut self, name: &str) -> usize {
        match self.names.get_index_of(name) {
            Some(i) => self.base + i,
            None => {
                self.names.insert(name.to_string());
                self.base + self.names.len() - 1
            }
        }
    }

    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.names.get_index_of(name).map(|i| self.base + i)
    }

    pub fn name_of(&self, id: usize) -> Option<&str> {
        id.checked_sub(self.base)
            .and_then(|i| self.names.get_index(i))
            .map(String::as_str)
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// (id, name) in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(move |(i, n)| (self.base + i, n.as_str()))
    }

    /// `{"<id>": "<name>", ...}` in id order.
    pub fn to_json_string(&self) -> String {
        let obj: IndexMap<String, &str> = self.iter().map(|(id, n)| (id.to_string(), n)).collect();
        serde_json::to_string(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parse a side file. Keys may come in any order but must form one
    /// contiguous range; the base is the smallest id (1 when empty).
    pub fn from_json_str(s: &str) -> Result<Self, MappingError> {
        let obj: IndexMap<String, String> =
            serde_json::from_str(s).map_err(|e| MappingError::InvalidJson(e.to_string()))?;
        let mut pairs = Vec::with_capacity(obj.len());
        for (k, v) in obj {
            let id: usize = k.trim().parse().map_err(|_| MappingError::BadId(k.clone()))?;
            pairs.push((id, v));
        }
        pairs.sort_by_key(|(id, _)| *id);
        let base = pairs.first().map(|(id, _)| *id).unwrap_or(1);
        let mut m = Self::new(base);
        for (i, (id, name)) in pairs.into_iter().enumerate() {
            if id != base + i {
                return Err(MappingError::Gap { expected: base + i, found: id });
            }
            if !m.names.insert(name.clone()) {
                return Err(MappingError::DuplicateName(name));
            }
        }
        Ok(m)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json_string()).with_context(|| format!("cannot write {}", path.display()))
    }

    pub fn read_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let m = Self::from_json_str(&s).with_context(|| format!("invalid mapping file {}", path.display()))?;
        Ok(m)
    }
}

/// `<graph file>.mapping.json`
pub fn mapping_path_for(graph_path: &Path) -> PathBuf {
    let mut s = graph_path.as_os_str().to_owned();
    s.push(".mapping.json");
    PathBuf::from(s)
}
