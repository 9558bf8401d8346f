//! Per-stage response collection.
//!
//! `ResponseAggregator` opens one window per stage, accepts responses in any
//! order at their issuance positions, and drains them as a `ResponseSet` in
//! issuance order once every position is filled.

use std::ops::Index;

use crate::types::Response;

use super::error::{EngineError, Result};

/// Ordered responses handed to a stage.
///
/// Only the aggregator constructs non-empty sets, so the length always equals
/// the number of calls queued by the previous stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSet {
    responses: Vec<Response>,
}

impl ResponseSet {
    /// The empty set passed to the entry stage.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Response> {
        self.responses.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Response> {
        self.responses.iter()
    }

    /// True if every response succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.responses.iter().all(Response::is_success)
    }
}

impl Index<usize> for ResponseSet {
    type Output = Response;

    fn index(&self, position: usize) -> &Response {
        &self.responses[position]
    }
}

impl<'a> IntoIterator for &'a ResponseSet {
    type Item = &'a Response;
    type IntoIter = std::slice::Iter<'a, Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.responses.iter()
    }
}

#[derive(Debug)]
struct Window {
    stage: usize,
    slots: Vec<Option<Response>>,
    filled: usize,
}

/// Collects the responses for the calls issued by the current stage.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    window: Option<Window>,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a window of `expected` positions for `stage`.
    pub fn expect(&mut self, stage: usize, expected: usize) -> Result<()> {
        if let Some(open) = &self.window {
            return Err(EngineError::UnexpectedDelivery {
                stage,
                position: 0,
                reason: format!("window for stage {} is still open", open.stage),
            });
        }
        self.window = Some(Window {
            stage,
            slots: vec![None; expected],
            filled: 0,
        });
        Ok(())
    }

    /// Store `response` at `position`. Each position accepts exactly one response.
    pub fn deliver(&mut self, stage: usize, position: usize, response: Response) -> Result<()> {
        let window = self
            .window
            .as_mut()
            .ok_or_else(|| EngineError::UnexpectedDelivery {
                stage,
                position,
                reason: "no open window".to_string(),
            })?;

        if window.stage != stage {
            // Windows are strictly sequential, so an older stage was already drained.
            if stage < window.stage {
                return Err(EngineError::DuplicateDelivery { stage, position });
            }
            return Err(EngineError::UnexpectedDelivery {
                stage,
                position,
                reason: format!("open window belongs to stage {}", window.stage),
            });
        }

        let expected = window.slots.len();
        let slot = window
            .slots
            .get_mut(position)
            .ok_or_else(|| EngineError::UnexpectedDelivery {
                stage,
                position,
                reason: format!("window holds {expected} positions"),
            })?;

        if slot.is_some() {
            return Err(EngineError::DuplicateDelivery { stage, position });
        }
        *slot = Some(response);
        window.filled += 1;
        Ok(())
    }

    /// True once every position of the open window is filled.
    pub fn is_complete(&self) -> bool {
        self.window
            .as_ref()
            .map(|w| w.filled == w.slots.len())
            .unwrap_or(false)
    }

    /// Number of positions still waiting for a response.
    pub fn pending(&self) -> usize {
        self.window
            .as_ref()
            .map(|w| w.slots.len() - w.filled)
            .unwrap_or(0)
    }

    /// Stage index of the open window, if any.
    pub fn open_stage(&self) -> Option<usize> {
        self.window.as_ref().map(|w| w.stage)
    }

    /// Close the window and return its responses in issuance order.
    pub fn drain(&mut self) -> Result<ResponseSet> {
        let window = self.window.take().ok_or_else(|| EngineError::UnexpectedDelivery {
            stage: 0,
            position: 0,
            reason: "drain without an open window".to_string(),
        })?;

        if window.filled != window.slots.len() {
            let stage = window.stage;
            let missing = window.slots.iter().position(Option::is_none).unwrap_or(0);
            self.window = Some(window);
            return Err(EngineError::UnexpectedDelivery {
                stage,
                position: missing,
                reason: "drain before every response arrived".to_string(),
            });
        }

        Ok(ResponseSet {
            responses: window.slots.into_iter().flatten().collect(),
        })
    }

    /// Drop any open window without draining it.
    pub fn close(&mut self) {
        self.window = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnType, Table, Value};

    fn tagged(tag: &str) -> Response {
        Response::success(vec![Table::single("TAG", ColumnType::String, Value::from(tag))])
    }

    #[test]
    fn test_drain_preserves_issuance_order() {
        let mut agg = ResponseAggregator::new();
        agg.expect(0, 3).unwrap();

        agg.deliver(0, 2, tagged("C")).unwrap();
        assert!(!agg.is_complete());
        agg.deliver(0, 0, tagged("A")).unwrap();
        agg.deliver(0, 1, tagged("B")).unwrap();
        assert!(agg.is_complete());

        let set = agg.drain().unwrap();
        let tags: Vec<_> = set
            .iter()
            .map(|r| r.scalar().and_then(Value::as_str).unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["A", "B", "C"]);
        assert_eq!(agg.open_stage(), None);
    }

    #[test]
    fn test_duplicate_delivery_rejected() {
        let mut agg = ResponseAggregator::new();
        agg.expect(1, 2).unwrap();
        agg.deliver(1, 0, tagged("A")).unwrap();

        let err = agg.deliver(1, 0, tagged("A again")).unwrap_err();
        assert_eq!(
            err,
            EngineError::DuplicateDelivery {
                stage: 1,
                position: 0
            }
        );
        assert_eq!(agg.pending(), 1);
    }

    #[test]
    fn test_delivery_for_drained_stage_is_duplicate() {
        let mut agg = ResponseAggregator::new();
        agg.expect(0, 1).unwrap();
        agg.deliver(0, 0, tagged("A")).unwrap();
        agg.drain().unwrap();
        agg.expect(1, 1).unwrap();

        let err = agg.deliver(0, 0, tagged("late")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateDelivery { stage: 0, .. }));
    }

    #[test]
    fn test_position_out_of_range() {
        let mut agg = ResponseAggregator::new();
        agg.expect(0, 1).unwrap();
        let err = agg.deliver(0, 5, tagged("X")).unwrap_err();
        assert!(matches!(err, EngineError::UnexpectedDelivery { position: 5, .. }));
    }

    #[test]
    fn test_deliver_without_window() {
        let mut agg = ResponseAggregator::new();
        assert!(agg.deliver(0, 0, tagged("X")).is_err());
    }

    #[test]
    fn test_drain_incomplete_keeps_window() {
        let mut agg = ResponseAggregator::new();
        agg.expect(0, 2).unwrap();
        agg.deliver(0, 1, tagged("B")).unwrap();

        assert!(agg.drain().is_err());
        assert_eq!(agg.open_stage(), Some(0));
        assert_eq!(agg.pending(), 1);
    }

    #[test]
    fn test_expect_while_open_rejected() {
        let mut agg = ResponseAggregator::new();
        agg.expect(0, 1).unwrap();
        assert!(agg.expect(1, 1).is_err());
    }
}
