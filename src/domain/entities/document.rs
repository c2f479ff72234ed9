use std::collections::{BTreeMap, HashSet};

use crate::domain::capability::CapabilityTable;
use crate::domain::codec::MultipartPart;
use crate::domain::root_version::compute_root_version;
use crate::domain::value_objects::DeploymentState;

use super::{RootDocument, SubDocument};

/// Pseudo sub-document name carrying the whole-bundle root version in a version map.
pub const ROOT_VERSION_KEY: &str = "root";

/// `sub-document name -> version`, ordered by name.
pub type VersionMap = BTreeMap<String, String>;

/// All sub-documents of one device plus its root metadata.
///
/// Sub-documents are kept ordered by name so the root version derived from
/// them is reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    root: Option<RootDocument>,
    sub_documents: BTreeMap<String, SubDocument>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, root: RootDocument) -> Self {
        self.root = Some(root);
        self
    }

    pub fn root(&self) -> Option<&RootDocument> {
        self.root.as_ref()
    }

    pub fn set_root(&mut self, root: Option<RootDocument>) {
        self.root = root;
    }

    /// Stored root version, empty when the device was never synchronized.
    pub fn root_version(&self) -> &str {
        self.root.as_ref().map(|r| r.version.as_str()).unwrap_or("")
    }

    pub fn insert(&mut self, name: impl Into<String>, sub_document: SubDocument) {
        self.sub_documents.insert(name.into(), sub_document);
    }

    pub fn get(&self, name: &str) -> Option<&SubDocument> {
        self.sub_documents.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<SubDocument> {
        self.sub_documents.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sub_documents.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.sub_documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_documents.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.sub_documents.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SubDocument)> {
        self.sub_documents.iter()
    }

    /// Versions of every sub-document that has one.
    pub fn version_map(&self) -> VersionMap {
        self.sub_documents
            .iter()
            .filter_map(|(name, sub)| sub.version().map(|v| (name.clone(), v.to_string())))
            .collect()
    }

    /// Root version derived from the current sub-document versions.
    pub fn compute_root_version(&self) -> String {
        compute_root_version(&self.version_map())
    }

    /// Sub-documents whose version differs from what the device reports having.
    pub fn filter_for_get(&self, device_versions: &VersionMap) -> Document {
        let sub_documents = self
            .sub_documents
            .iter()
            .filter(|(name, sub)| sub.version() != device_versions.get(*name).map(String::as_str))
            .map(|(name, sub)| (name.clone(), sub.clone()))
            .collect();

        Document {
            root: self.root.clone(),
            sub_documents,
        }
    }

    pub fn without_blocked(mut self, blocked: &HashSet<String>) -> Self {
        if !blocked.is_empty() {
            self.sub_documents.retain(|name, _| !blocked.contains(name));
        }
        self
    }

    pub fn without_expired(mut self, now_ms: i64) -> Self {
        self.sub_documents.retain(|_, sub| !sub.is_expired(now_ms));
        self
    }

    /// Drop known features the device does not advertise. A zero bitmap means
    /// the device sent no capabilities and nothing is dropped.
    pub fn supported_by(mut self, cpe_bitmap: i64, table: &CapabilityTable) -> Self {
        if cpe_bitmap != 0 {
            self.sub_documents.retain(|name, _| {
                !table.is_known_feature(name) || table.is_feature_supported(cpe_bitmap, name)
            });
        }
        self
    }

    /// Overwrite the named sub-documents with the content of `incoming`.
    ///
    /// This is an authoritative replacement per name, not a merge: payload and
    /// version come from `incoming` while lifecycle fields of a stored entry are
    /// kept. Returns the names whose content changed, payload or version.
    pub fn replace_sub_documents(&mut self, incoming: &Document) -> Vec<String> {
        let mut changed = Vec::new();
        for (name, sub) in &incoming.sub_documents {
            let entry = self.sub_documents.entry(name.clone()).or_default();
            if entry.version() != sub.version() || entry.payload() != sub.payload() {
                changed.push(name.clone());
            }
            entry.payload = sub.payload.clone();
            entry.version = sub.version.clone();
        }
        changed
    }

    pub fn names_in_state(&self, state: DeploymentState) -> Vec<String> {
        self.sub_documents
            .iter()
            .filter(|(_, sub)| sub.state == Some(state))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn to_parts(&self) -> Vec<MultipartPart> {
        self.sub_documents
            .iter()
            .map(|(name, sub)| MultipartPart {
                name: name.clone(),
                version: sub.version().unwrap_or_default().to_string(),
                payload: sub.payload.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub fn from_parts(parts: Vec<MultipartPart>) -> Self {
        let sub_documents = parts
            .into_iter()
            .map(|part| (part.name, SubDocument::new(part.payload, part.version)))
            .collect();
        Self {
            root: None,
            sub_documents,
        }
    }
}

impl FromIterator<(String, SubDocument)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, SubDocument)>>(iter: T) -> Self {
        Self {
            root: None,
            sub_documents: iter.into_iter().collect(),
        }
    }
}
