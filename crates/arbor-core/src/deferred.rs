//! Work postponed until the current update pass has finished.

use std::mem;

use crate::composer::ComposerId;
use crate::queue::ActionFn;

/// Work queued with `defer`, held until the end of the cycle.
pub struct Deferred {
    pub(crate) source: Option<ComposerId>,
    pub(crate) function: ActionFn,
}

impl Deferred {
    /// The component the work runs for, if any.
    pub fn source(&self) -> Option<ComposerId> {
        self.source
    }
}

/// FIFO of deferred work. Appended to while a cycle runs, taken as a whole at
/// the end of it.
pub struct DeferredList<T = Deferred> {
    items: Vec<T>,
}

impl<T> Default for DeferredList<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> DeferredList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Empties the list, returning its items in submission order.
    pub fn take(&mut self) -> Vec<T> {
        mem::take(&mut self.items)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_submission_order_and_clears() {
        let mut list = DeferredList::new();
        list.push("first");
        list.push("second");
        list.push("third");
        assert_eq!(list.len(), 3);

        assert_eq!(list.take(), vec!["first", "second", "third"]);
        assert!(list.is_empty());
        assert!(list.take().is_empty());
    }

    #[test]
    fn default_list_holds_deferred_work() {
        let mut list: crate::DeferredList = DeferredList::new();
        list.push(crate::Deferred {
            source: None,
            function: Box::new(|_| {}),
        });

        let batch = list.take();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].source(), None);
    }

    #[test]
    fn items_pushed_after_take_wait_for_the_next_take() {
        let mut list = DeferredList::new();
        list.push(1);
        let batch = list.take();
        list.push(2);

        assert_eq!(batch, vec![1]);
        assert_eq!(list.take(), vec![2]);
    }
}
