//! Bounded table of in-flight spans.

use std::collections::{HashMap, VecDeque};

use crate::model::{Span, SpanId};

/// Active spans in start order. Removal is lazy on the order queue.
#[derive(Debug)]
pub struct ActiveSpans {
    spans: HashMap<SpanId, Span>,
    order: VecDeque<SpanId>,
    max_spans: usize,
}

impl ActiveSpans {
    pub fn new(max_spans: usize) -> Self {
        Self {
            spans: HashMap::new(),
            order: VecDeque::new(),
            max_spans: max_spans.max(1),
        }
    }

    /// Insert `span`, returning the spans evicted to make room.
    pub fn insert(&mut self, span: Span) -> Vec<Span> {
        let mut evicted = Vec::new();
        while self.spans.len() >= self.max_spans {
            match self.order.pop_front() {
                Some(oldest) => {
                    if let Some(span) = self.spans.remove(&oldest) {
                        evicted.push(span);
                    }
                }
                None => break,
            }
        }

        self.order.push_back(span.id.clone());
        self.spans.insert(span.id.clone(), span);
        self.compact();
        evicted
    }

    pub fn remove(&mut self, id: &SpanId) -> Option<Span> {
        let span = self.spans.remove(id)?;
        if self.order.front() == Some(id) {
            self.order.pop_front();
        }
        Some(span)
    }

    pub fn get(&self, id: &SpanId) -> Option<&Span> {
        self.spans.get(id)
    }

    pub fn get_mut(&mut self, id: &SpanId) -> Option<&mut Span> {
        self.spans.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Drop ids of spans that already ended once they dominate the queue.
    fn compact(&mut self) {
        if self.order.len() > self.spans.len() * 2 + 64 {
            let spans = &self.spans;
            self.order.retain(|id| spans.contains_key(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn span(id: &str, start: u64) -> Span {
        Span {
            id: SpanId::from(id),
            name: "op".into(),
            start_time: start,
            end_time: None,
            parent_id: None,
            attributes: BTreeMap::new(),
            handle: None,
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut table = ActiveSpans::new(2);
        assert!(table.insert(span("a", 1)).is_empty());
        assert!(table.insert(span("b", 2)).is_empty());

        let evicted = table.insert(span("c", 3));
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, SpanId::from("a"));
        assert_eq!(table.len(), 2);
        assert!(table.get(&SpanId::from("b")).is_some());
    }

    #[test]
    fn test_ended_spans_are_skipped_on_eviction() {
        let mut table = ActiveSpans::new(2);
        table.insert(span("a", 1));
        table.insert(span("b", 2));
        assert!(table.remove(&SpanId::from("b")).is_some());

        assert!(table.insert(span("c", 3)).is_empty());
        let evicted = table.insert(span("d", 4));
        assert_eq!(evicted[0].id, SpanId::from("a"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_order_queue_stays_bounded() {
        let mut table = ActiveSpans::new(10);
        table.insert(span("keep", 0));
        for i in 0..10_000 {
            let id = format!("s{}", i);
            table.insert(span(&id, i));
            table.remove(&SpanId::from(id.as_str()));
        }
        assert_eq!(table.len(), 1);
        assert!(table.order.len() <= 68);
    }
}
