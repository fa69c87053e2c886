use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::Arc;

use crate::proto::Document;
use crate::proto::Timestamp;
use crate::ProtocolError;

const DOCUMENTS_SEGMENT: &str = "/documents/";

/// Slash separated document path relative to the database documents root,
/// e.g. `users/alice`.
///
/// Keys order segment by segment, so `a/b` sorts before `a-c`.
#[derive(Clone)]
pub struct DocumentKey {
    path: Arc<str>,
}

impl DocumentKey {
    pub fn new(path: impl AsRef<str>) -> std::result::Result<Self, ProtocolError> {
        let path = path.as_ref().trim_matches('/');
        if path.is_empty() || path.split('/').any(str::is_empty) {
            return Err(ProtocolError::InvalidDocumentName(path.to_string()));
        }
        Ok(Self { path: Arc::from(path) })
    }

    /// Parses `projects/{p}/databases/{d}/documents/{path}`.
    pub fn from_resource_name(name: &str) -> std::result::Result<Self, ProtocolError> {
        match name.find(DOCUMENTS_SEGMENT) {
            Some(pos) => Self::new(&name[pos + DOCUMENTS_SEGMENT.len()..])
                .map_err(|_| ProtocolError::InvalidDocumentName(name.to_string())),
            None => Err(ProtocolError::InvalidDocumentName(name.to_string())),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/')
    }

    pub fn to_resource_name(
        &self,
        documents_root: &str,
    ) -> String {
        format!("{}/{}", documents_root, self.path)
    }
}

impl PartialEq for DocumentKey {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.path == other.path
    }
}

impl Eq for DocumentKey {}

impl Hash for DocumentKey {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.path.hash(state);
    }
}

impl Ord for DocumentKey {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.segments().cmp(other.segments())
    }
}

impl PartialOrd for DocumentKey {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for DocumentKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "DocumentKey({})", self.path)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Immutable view of one document at a point in time.
///
/// Clones share the encoded field payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    create_time: Timestamp,
    update_time: Timestamp,
    /// Stamped when the snapshot containing this document is delivered
    read_time: Option<Timestamp>,
    fields: Arc<Vec<Vec<u8>>>,
}

impl DocumentSnapshot {
    pub fn new(
        key: DocumentKey,
        create_time: Timestamp,
        update_time: Timestamp,
        fields: Vec<Vec<u8>>,
    ) -> Self {
        Self {
            key,
            create_time,
            update_time,
            read_time: None,
            fields: Arc::new(fields),
        }
    }

    /// Decodes a wire document. Both timestamps are mandatory for documents
    /// carried by a listen stream.
    pub fn from_proto(document: Document) -> std::result::Result<Self, ProtocolError> {
        let key = DocumentKey::from_resource_name(&document.name)?;
        let create_time = document.create_time.ok_or(ProtocolError::MissingField {
            message: "Document",
            field: "create_time",
        })?;
        let update_time = document.update_time.ok_or(ProtocolError::MissingField {
            message: "Document",
            field: "update_time",
        })?;

        Ok(Self::new(key, create_time, update_time, document.fields))
    }

    pub fn with_read_time(
        mut self,
        read_time: Timestamp,
    ) -> Self {
        self.read_time = Some(read_time);
        self
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn create_time(&self) -> Timestamp {
        self.create_time
    }

    pub fn update_time(&self) -> Timestamp {
        self.update_time
    }

    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }

    /// Encoded `map<string, Value>` entries as received
    pub fn fields(&self) -> &[Vec<u8>] {
        &self.fields
    }
}
