use crate::document::DocumentComparator;
use crate::document::DocumentKey;
use crate::proto::target::TargetType;
use crate::proto::DocumentsTarget;
use crate::proto::QueryTarget;
use crate::proto::Target;
use crate::DatabaseConfig;

/// What a subscription watches.
///
/// Both kinds run through the same engine; they differ only in the target
/// registered on the stream and in document order.
#[derive(Debug, Clone)]
pub enum WatchTarget {
    /// A single document. Order is irrelevant with at most one document.
    Document { key: DocumentKey },
    /// A structured query under `parent`.
    Query {
        /// Path of the parent document relative to the documents root, empty
        /// for root collections
        parent: String,
        /// Encoded `StructuredQuery`
        structured_query: Vec<u8>,
        comparator: DocumentComparator,
    },
}

impl WatchTarget {
    pub fn document(key: DocumentKey) -> Self {
        WatchTarget::Document { key }
    }

    /// Query target ordered by document key until
    /// [`with_comparator`](Self::with_comparator) supplies the query's order.
    pub fn query(
        parent: impl Into<String>,
        structured_query: impl Into<Vec<u8>>,
    ) -> Self {
        WatchTarget::Query {
            parent: parent.into(),
            structured_query: structured_query.into(),
            comparator: DocumentComparator::by_key(),
        }
    }

    /// Sets the document order of a query target. Document targets keep key order.
    pub fn with_comparator(
        self,
        comparator: DocumentComparator,
    ) -> Self {
        match self {
            WatchTarget::Query {
                parent,
                structured_query,
                ..
            } => WatchTarget::Query {
                parent,
                structured_query,
                comparator,
            },
            document => document,
        }
    }

    pub fn comparator(&self) -> DocumentComparator {
        match self {
            WatchTarget::Document { .. } => DocumentComparator::by_key(),
            WatchTarget::Query { comparator, .. } => comparator.clone(),
        }
    }

    /// Target registered by an add-target request
    pub fn to_proto(
        &self,
        database: &DatabaseConfig,
        target_id: i32,
        resume_token: Option<&[u8]>,
    ) -> Target {
        let documents_root = database.documents_root();
        let target_type = match self {
            WatchTarget::Document { key } => TargetType::Documents(DocumentsTarget {
                documents: vec![key.to_resource_name(&documents_root)],
            }),
            WatchTarget::Query {
                parent,
                structured_query,
                ..
            } => {
                let parent = parent.trim_matches('/');
                TargetType::Query(QueryTarget {
                    parent: if parent.is_empty() {
                        documents_root
                    } else {
                        format!("{}/{}", documents_root, parent)
                    },
                    structured_query: structured_query.clone(),
                })
            }
        };

        Target {
            target_type: Some(target_type),
            resume_token: resume_token.map(<[u8]>::to_vec).unwrap_or_default(),
            target_id,
            once: false,
        }
    }
}
