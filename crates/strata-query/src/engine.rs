//! The child query engine.
//!
//! Both retrieval modes traverse the closure index joined against the
//! objects table, scoped to `parent = root AND min_depth < depth`:
//!
//! - **Simple mode** pages in ascending id order with a last-seen-id
//!   cursor and optional field projection.
//! - **Filtered mode** evaluates an ordered predicate list against
//!   extracted payload fields, applies a single user ordering, and
//!   paginates with opaque keyset cursors. The total count covers the
//!   whole filtered set and is constant across pages.
//!
//! Counting an arbitrary user-defined selection is inherently a full scan
//! over the subtree; objects are immutable, so a future optimization could
//! cache the count of a query after its first page.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{Map, Value};
use strata_store::{ObjectRecord, ObjectStore};
use strata_types::{ObjectId, StreamId};

use crate::cursor::CursorToken;
use crate::error::QueryResult;
use crate::path;
use crate::predicate::{compare_values, eval_all, Direction, OrderBy, Operator, Predicate};

/// Default page size when the client does not ask for one.
pub const DEFAULT_LIMIT: usize = 50;
/// Default depth bound (effectively unbounded for real models).
pub const DEFAULT_DEPTH: u32 = 1000;
/// How many closure rows are pulled per scan chunk in filtered mode.
pub const SCAN_CHUNK: usize = 1000;

/// Simple-mode request.
#[derive(Clone, Debug, Default)]
pub struct SimpleChildQuery {
    pub limit: Option<usize>,
    pub depth: Option<u32>,
    /// Dotted payload paths to project instead of full payloads.
    pub select: Option<Vec<String>>,
    /// Last-seen object id from the previous page.
    pub cursor: Option<ObjectId>,
}

/// Simple-mode response page.
#[derive(Clone, Debug)]
pub struct SimplePage {
    pub objects: Vec<ObjectRecord>,
    pub cursor: Option<ObjectId>,
}

/// Filtered-mode request.
#[derive(Clone, Debug, Default)]
pub struct FilteredChildQuery {
    pub limit: Option<usize>,
    pub depth: Option<u32>,
    pub select: Option<Vec<String>>,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    /// Opaque token from the previous page.
    pub cursor: Option<String>,
}

/// Filtered-mode response page.
#[derive(Clone, Debug)]
pub struct FilteredPage {
    /// Size of the whole filtered set (constant across pages).
    pub total_count: usize,
    pub objects: Vec<ObjectRecord>,
    pub cursor: Option<String>,
}

/// Paginated, depth-bounded subtree retrieval over a closure-indexed store.
pub struct ChildQueryEngine {
    store: Arc<dyn ObjectStore>,
}

impl ChildQueryEngine {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Simple mode: ascending id order, last-seen-id cursor.
    pub fn children(
        &self,
        stream: &StreamId,
        root: &ObjectId,
        query: &SimpleChildQuery,
    ) -> QueryResult<SimplePage> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
        let depth = query.depth.unwrap_or(DEFAULT_DEPTH);

        let page = self
            .store
            .children(stream, root, depth, query.cursor.as_ref(), limit)?;
        if page.records.is_empty() {
            return Ok(SimplePage {
                objects: Vec::new(),
                cursor: None,
            });
        }

        let cursor = page.records.last().map(|r| r.id.clone());
        let objects = match &query.select {
            Some(select) => page.records.into_iter().map(|r| project(r, select)).collect(),
            None => page.records,
        };
        Ok(SimplePage { objects, cursor })
    }

    /// Filtered/ordered mode with opaque keyset cursors.
    pub fn children_filtered(
        &self,
        stream: &StreamId,
        root: &ObjectId,
        query: &FilteredChildQuery,
    ) -> QueryResult<FilteredPage> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);
        let depth = query.depth.unwrap_or(DEFAULT_DEPTH);
        let order = query.order_by.clone().unwrap_or_default();
        let token = query.cursor.as_deref().map(CursorToken::decode).transpose()?;

        // If we order by a field we do not select, select it anyway so the
        // client can resume from the returned cursor value.
        let select = query.select.clone().map(|mut fields| {
            if order.field != "id" && !fields.contains(&order.field) {
                fields.push(order.field.clone());
            }
            fields
        });

        // Full scan of the subtree: the total count covers an arbitrary
        // user-defined selection, so every candidate row is visited.
        let mut rows: Vec<ObjectRecord> = Vec::new();
        let mut scan_after: Option<ObjectId> = None;
        loop {
            let page = self
                .store
                .children(stream, root, depth, scan_after.as_ref(), SCAN_CHUNK)?;
            let fetched = page.records.len();
            scan_after = page.records.last().map(|r| r.id.clone());
            rows.extend(
                page.records
                    .into_iter()
                    .filter(|r| eval_all(&query.predicates, &r.data)),
            );
            if fetched < SCAN_CHUNK {
                break;
            }
        }

        let total_count = rows.len();
        // Return early: never attempt to read "the last row" of an empty set.
        if total_count == 0 {
            return Ok(FilteredPage {
                total_count,
                objects: Vec::new(),
                cursor: None,
            });
        }

        sort_rows(&mut rows, &order);

        let page_rows: Vec<ObjectRecord> = match &token {
            Some(token) => rows
                .into_iter()
                .filter(|r| passes_cursor(r, token))
                .take(limit)
                .collect(),
            None => rows.into_iter().take(limit).collect(),
        };

        let cursor = if page_rows.len() == limit {
            let last = &page_rows[page_rows.len() - 1];
            let value = if order.field == "id" {
                Value::String(last.id.as_str().to_owned())
            } else {
                path::get(&last.data, &order.field)
                    .cloned()
                    .unwrap_or(Value::Null)
            };
            let next = CursorToken {
                field: token
                    .as_ref()
                    .map_or_else(|| order.field.clone(), |t| t.field.clone()),
                operator: token.as_ref().map_or_else(
                    || match order.direction {
                        Direction::Asc => Operator::Gt,
                        Direction::Desc => Operator::Lt,
                    },
                    |t| t.operator,
                ),
                value,
                last_seen_id: (order.field != "id").then(|| last.id.clone()),
            };
            Some(next.encode()?)
        } else {
            None
        };

        let objects = match &select {
            Some(select) => page_rows.into_iter().map(|r| project(r, select)).collect(),
            None => page_rows,
        };

        Ok(FilteredPage {
            total_count,
            objects,
            cursor,
        })
    }
}

impl std::fmt::Debug for ChildQueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildQueryEngine").finish()
    }
}

/// Replace a record's payload with just the selected dotted paths.
fn project(mut record: ObjectRecord, select: &[String]) -> ObjectRecord {
    let mut data = Map::new();
    for field in select {
        if let Some(value) = path::get(&record.data, field) {
            let value = value.clone();
            path::set(&mut data, field, value);
        }
    }
    record.data = data;
    record
}

/// Sort by the requested field (direction applied), tie-broken by
/// ascending id. Rows missing the field sort after rows that have it.
fn sort_rows(rows: &mut [ObjectRecord], order: &OrderBy) {
    let desc = order.direction == Direction::Desc;
    if order.field == "id" {
        rows.sort_by(|a, b| {
            let ord = a.id.cmp(&b.id);
            if desc {
                ord.reverse()
            } else {
                ord
            }
        });
        return;
    }
    rows.sort_by(|a, b| {
        let va = path::get(&a.data, &order.field);
        let vb = path::get(&b.data, &order.field);
        let ord = match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        };
        let ord = if desc { ord.reverse() } else { ord };
        ord.then_with(|| a.id.cmp(&b.id))
    });
}

/// Keyset test: is this row strictly past the cursor position?
///
/// Unwraps the tuple comparison `(order_field, id) > (cursor_value,
/// last_seen_id)`: strictly past on the order field, or equal on it and
/// past on the tie-breaking id.
fn passes_cursor(record: &ObjectRecord, token: &CursorToken) -> bool {
    if token.field == "id" {
        let Value::String(threshold) = &token.value else {
            return false;
        };
        let ord = record.id.as_str().cmp(threshold.as_str());
        return token.operator.strict().matches(Some(ord));
    }

    let Some(actual) = path::get(&record.data, &token.field) else {
        return false;
    };
    let Some(ord) = compare_values(actual, &token.value) else {
        return false;
    };
    if token.operator.strict().matches(Some(ord)) {
        return true;
    }
    if ord == Ordering::Equal {
        if let Some(last_seen) = &token.last_seen_id {
            return record.id > *last_seen;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strata_store::{prepare, MemoryStore, PrepareOptions};
    use strata_types::StreamId;

    /// Seed a root with `n` children at depth 1 carrying a `height` field.
    fn seed(n: usize) -> (ChildQueryEngine, StreamId, ObjectId) {
        let store = Arc::new(MemoryStore::new());
        let stream = StreamId::parse("s1").unwrap();
        let opts = PrepareOptions::default();

        let mut closure = serde_json::Map::new();
        for i in 0..n {
            let child = prepare(
                json!({"name": format!("child-{i}"), "height": i as f64, "even": i % 2 == 0}),
                &opts,
            )
            .unwrap();
            closure.insert(child.id().as_str().to_owned(), json!(1));
            store.put(&stream, child).unwrap();
        }
        let root = prepare(json!({"name": "root", "__closure": closure}), &opts).unwrap();
        let root_id = store.put(&stream, root).unwrap();
        (ChildQueryEngine::new(store), stream, root_id)
    }

    #[test]
    fn simple_mode_pages_in_id_order() {
        let (engine, stream, root) = seed(7);
        let mut query = SimpleChildQuery {
            limit: Some(3),
            ..SimpleChildQuery::default()
        };
        let mut seen = Vec::new();
        loop {
            let page = engine.children(&stream, &root, &query).unwrap();
            if page.objects.is_empty() {
                break;
            }
            seen.extend(page.objects.iter().map(|o| o.id.clone()));
            query.cursor = page.cursor;
        }
        assert_eq!(seen.len(), 7);
        for w in seen.windows(2) {
            assert!(w[0] < w[1], "ids must be strictly ascending");
        }
    }

    #[test]
    fn simple_mode_empty_root_returns_null_cursor() {
        let (engine, stream, _) = seed(1);
        let page = engine
            .children(
                &stream,
                &ObjectId::from_data(b"nothing here"),
                &SimpleChildQuery::default(),
            )
            .unwrap();
        assert!(page.objects.is_empty());
        assert!(page.cursor.is_none());
    }

    #[test]
    fn simple_mode_projection() {
        let (engine, stream, root) = seed(2);
        let query = SimpleChildQuery {
            select: Some(vec!["height".into()]),
            ..SimpleChildQuery::default()
        };
        let page = engine.children(&stream, &root, &query).unwrap();
        for object in &page.objects {
            assert!(object.data.contains_key("height"));
            assert!(!object.data.contains_key("name")); // not selected
        }
    }

    #[test]
    fn depth_bound_filters_edges() {
        let store = Arc::new(MemoryStore::new());
        let stream = StreamId::parse("s1").unwrap();
        let opts = PrepareOptions::default();
        let a = store.put(&stream, prepare(json!({"n": "a"}), &opts).unwrap()).unwrap();
        let b = store.put(&stream, prepare(json!({"n": "b"}), &opts).unwrap()).unwrap();
        let root = store
            .put(
                &stream,
                prepare(
                    json!({"n": "root", "__closure": { a.as_str(): 1, b.as_str(): 2 }}),
                    &opts,
                )
                .unwrap(),
            )
            .unwrap();
        let engine = ChildQueryEngine::new(store);

        let at = |depth: u32| {
            let query = SimpleChildQuery {
                depth: Some(depth),
                limit: Some(100),
                ..SimpleChildQuery::default()
            };
            engine
                .children(&stream, &root, &query)
                .unwrap()
                .objects
                .into_iter()
                .map(|o| o.id)
                .collect::<Vec<_>>()
        };

        // min_depth < 2 keeps only the depth-1 child
        assert_eq!(at(2), vec![a.clone()]);
        // min_depth < 3 keeps both
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(at(3), expected);
    }

    #[test]
    fn filtered_zero_matches_short_circuits() {
        let (engine, stream, root) = seed(5);
        let query = FilteredChildQuery {
            predicates: vec![Predicate {
                field: "height".into(),
                operator: Operator::Gt,
                value: json!(1e9),
                verb: Default::default(),
            }],
            ..FilteredChildQuery::default()
        };
        let page = engine.children_filtered(&stream, &root, &query).unwrap();
        assert_eq!(page.total_count, 0);
        assert!(page.objects.is_empty());
        assert!(page.cursor.is_none());
    }

    #[test]
    fn filtered_pagination_yields_exactly_total_count_rows() {
        let (engine, stream, root) = seed(23);
        let mut query = FilteredChildQuery {
            limit: Some(4),
            predicates: vec![Predicate {
                field: "even".into(),
                operator: Operator::Eq,
                value: json!(true),
                verb: Default::default(),
            }],
            order_by: Some(OrderBy {
                field: "height".into(),
                direction: Direction::Asc,
            }),
            ..FilteredChildQuery::default()
        };

        let first = engine.children_filtered(&stream, &root, &query).unwrap();
        let total = first.total_count;
        assert_eq!(total, 12); // 0,2,..,22

        let mut heights = Vec::new();
        let mut ids = std::collections::BTreeSet::new();
        query.cursor = None;
        loop {
            let page = engine.children_filtered(&stream, &root, &query).unwrap();
            assert_eq!(page.total_count, total, "count is constant across pages");
            for object in &page.objects {
                heights.push(object.data["height"].as_f64().unwrap());
                assert!(ids.insert(object.id.clone()), "no duplicates across pages");
            }
            match page.cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }
        assert_eq!(ids.len(), total, "no omissions");
        for w in heights.windows(2) {
            assert!(w[0] <= w[1], "requested order is respected");
        }
    }

    #[test]
    fn filtered_descending_order() {
        let (engine, stream, root) = seed(6);
        let query = FilteredChildQuery {
            limit: Some(100),
            order_by: Some(OrderBy {
                field: "height".into(),
                direction: Direction::Desc,
            }),
            ..FilteredChildQuery::default()
        };
        let page = engine.children_filtered(&stream, &root, &query).unwrap();
        let heights: Vec<f64> = page
            .objects
            .iter()
            .map(|o| o.data["height"].as_f64().unwrap())
            .collect();
        for w in heights.windows(2) {
            assert!(w[0] >= w[1]);
        }
    }

    #[test]
    fn filtered_projection_includes_order_field() {
        let (engine, stream, root) = seed(3);
        let query = FilteredChildQuery {
            select: Some(vec!["name".into()]),
            order_by: Some(OrderBy {
                field: "height".into(),
                direction: Direction::Asc,
            }),
            ..FilteredChildQuery::default()
        };
        let page = engine.children_filtered(&stream, &root, &query).unwrap();
        for object in &page.objects {
            // order field force-selected so the cursor value is resumable
            assert!(object.data.contains_key("height"));
            assert!(object.data.contains_key("name"));
        }
    }

    #[test]
    fn filtered_rejects_malformed_cursor() {
        let (engine, stream, root) = seed(2);
        let query = FilteredChildQuery {
            cursor: Some("definitely-not-a-token".into()),
            ..FilteredChildQuery::default()
        };
        let err = engine.children_filtered(&stream, &root, &query).unwrap_err();
        assert!(matches!(err, crate::error::QueryError::InvalidCursor(_)));
    }

    #[test]
    fn filtered_last_page_has_null_cursor() {
        let (engine, stream, root) = seed(3);
        let query = FilteredChildQuery {
            limit: Some(100),
            ..FilteredChildQuery::default()
        };
        let page = engine.children_filtered(&stream, &root, &query).unwrap();
        assert_eq!(page.objects.len(), 3);
        assert!(page.cursor.is_none());
    }
}
