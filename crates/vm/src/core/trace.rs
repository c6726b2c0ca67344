//! The call-context trace: an ordered forest recording every nested call,
//! creation, and log in the order they occurred.
//!
//! Nodes live in a flat arena and point at their parent by index, with a
//! cursor marking the frame currently being executed. Entering a call or
//! creation appends a context node and descends into it; leaving ascends to
//! the parent, after which new siblings are appended behind the closed
//! subtree. Logs are appended in place without descending.

use super::{log::Log, vm::FrameContext};

/// One recorded event in the trace.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceEntry {
    /// A log emitted at this position.
    Log(Log),

    /// A nested call or creation entered at this position; its children are
    /// the events that occurred inside it.
    Context(FrameContext),
}

#[derive(Clone, Debug, PartialEq)]
struct TraceNode {
    entry: TraceEntry,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// The arena-backed trace forest with its cursor.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextTrace {
    nodes: Vec<TraceNode>,
    roots: Vec<usize>,
    cursor: Option<usize>,
}

impl ContextTrace {
    /// Creates an empty trace with the cursor at the top level.
    pub fn new() -> ContextTrace {
        ContextTrace::default()
    }

    fn insert(&mut self, entry: TraceEntry) -> usize {
        let ix = self.nodes.len();
        self.nodes.push(TraceNode { entry, parent: self.cursor, children: Vec::new() });
        match self.cursor {
            Some(parent) => self.nodes[parent].children.push(ix),
            None => self.roots.push(ix),
        }
        ix
    }

    /// Record a log at the current position without moving the cursor.
    pub fn record_log(&mut self, log: Log) {
        self.insert(TraceEntry::Log(log));
    }

    /// Record a nested call or creation and descend into it.
    pub fn enter(&mut self, context: FrameContext) {
        let ix = self.insert(TraceEntry::Context(context));
        self.cursor = Some(ix);
    }

    /// Ascend out of the current frame.
    ///
    /// Leaving with the cursor already at the top level is a bug in the
    /// interpreter, not contract behavior, and aborts.
    pub fn leave(&mut self) {
        let ix = self.cursor.expect("context trace: leave with no open frame");
        self.cursor = self.nodes[ix].parent;
    }

    /// The indexes of the top-level trace entries, in execution order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// The child indexes of the given node, in execution order.
    pub fn children(&self, ix: usize) -> &[usize] {
        &self.nodes[ix].children
    }

    /// The entry stored at the given node.
    pub fn entry(&self, ix: usize) -> &TraceEntry {
        &self.nodes[ix].entry
    }

    /// Total number of recorded entries.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};

    use super::*;

    fn log(tag: u64) -> Log {
        Log::new(Address::ZERO, vec![U256::from(tag)], &[])
    }

    fn context() -> FrameContext {
        FrameContext::Creation { codehash: U256::ZERO }
    }

    #[test]
    fn test_logs_insert_in_place() {
        let mut trace = ContextTrace::new();
        trace.record_log(log(1));
        trace.record_log(log(2));
        assert_eq!(trace.roots().len(), 2);
        assert_eq!(trace.entry(trace.roots()[0]), &TraceEntry::Log(log(1)));
        assert_eq!(trace.entry(trace.roots()[1]), &TraceEntry::Log(log(2)));
    }

    #[test]
    fn test_enter_descends_and_leave_ascends() {
        let mut trace = ContextTrace::new();
        trace.enter(context());
        trace.record_log(log(1));
        trace.leave();
        trace.record_log(log(2));

        assert_eq!(trace.roots().len(), 2);
        let frame = trace.roots()[0];
        assert!(matches!(trace.entry(frame), TraceEntry::Context(_)));
        assert_eq!(trace.children(frame), &[1]);
        assert_eq!(trace.entry(trace.roots()[1]), &TraceEntry::Log(log(2)));
    }

    #[test]
    fn test_nested_frames() {
        let mut trace = ContextTrace::new();
        trace.enter(context());
        trace.enter(context());
        trace.record_log(log(1));
        trace.leave();
        trace.record_log(log(2));
        trace.leave();

        let outer = trace.roots()[0];
        let inner = trace.children(outer)[0];
        assert!(matches!(trace.entry(inner), TraceEntry::Context(_)));
        assert_eq!(trace.children(outer).len(), 2);
        assert_eq!(trace.entry(trace.children(inner)[0]), &TraceEntry::Log(log(1)));
        assert_eq!(trace.entry(trace.children(outer)[1]), &TraceEntry::Log(log(2)));
    }

    #[test]
    #[should_panic(expected = "no open frame")]
    fn test_leave_at_top_level_panics() {
        let mut trace = ContextTrace::new();
        trace.leave();
    }
}
