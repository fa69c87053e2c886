use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use super::DocumentSnapshot;

type OrderFn = dyn Fn(&DocumentSnapshot, &DocumentSnapshot) -> Ordering + Send + Sync;

/// Total order over the documents of one watch target.
///
/// The optional order function mirrors the query's `order_by` clauses. Ties,
/// and targets without an order function, fall back to key order so that no
/// two distinct documents ever compare equal.
#[derive(Clone, Default)]
pub struct DocumentComparator {
    order: Option<Arc<OrderFn>>,
}

impl DocumentComparator {
    pub fn by_key() -> Self {
        Self { order: None }
    }

    pub fn with_order<F>(order: F) -> Self
    where
        F: Fn(&DocumentSnapshot, &DocumentSnapshot) -> Ordering + Send + Sync + 'static,
    {
        Self {
            order: Some(Arc::new(order)),
        }
    }

    pub fn compare(
        &self,
        a: &DocumentSnapshot,
        b: &DocumentSnapshot,
    ) -> Ordering {
        let primary = match &self.order {
            Some(order) => order(a, b),
            None => Ordering::Equal,
        };
        primary.then_with(|| a.key().cmp(b.key()))
    }
}

impl fmt::Debug for DocumentComparator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DocumentComparator")
            .field("custom_order", &self.order.is_some())
            .finish()
    }
}
