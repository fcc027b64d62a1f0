//! Streaming Text Accumulator
//!
//! The HTML tokenizer may split one text node (a `<script>` body, say) at
//! any byte, so a rule can straddle two fragments. The accumulator holds
//! every fragment of the node and only releases output once the terminal
//! fragment arrives: nothing for intermediate fragments, the whole rewritten
//! node for the last one.
//!
//! One accumulator serves exactly one text node. [`TextNodeSlot`] creates a
//! fresh one for each node and drops it on flush.

use std::rc::Rc;

use super::ruleset::Ruleset;

/// What to do with the fragment that was just delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// Drop the fragment, output comes later
    Suppress,
    /// Replace the fragment with already-valid markup
    Replace(String),
}

/// Buffer for one text node
pub struct TextAccumulator {
    ruleset: Rc<Ruleset>,
    buffer: String,
}

impl TextAccumulator {
    pub fn new(ruleset: Rc<Ruleset>) -> Self {
        Self {
            ruleset,
            buffer: String::new(),
        }
    }

    /// Accept the next fragment of the node
    pub fn push(&mut self, fragment: &str, last_in_node: bool) -> Emission {
        self.buffer.push_str(fragment);

        if !last_in_node {
            return Emission::Suppress;
        }

        let rewritten = self.ruleset.rewrite(&self.buffer);
        self.buffer.clear();
        Emission::Replace(rewritten)
    }
}

/// Holds the accumulator of the text node currently being delivered
pub struct TextNodeSlot {
    ruleset: Rc<Ruleset>,
    current: Option<TextAccumulator>,
}

impl TextNodeSlot {
    pub fn new(ruleset: Rc<Ruleset>) -> Self {
        Self {
            ruleset,
            current: None,
        }
    }

    /// Route a fragment to the open node, opening one if needed
    pub fn push(&mut self, fragment: &str, last_in_node: bool) -> Emission {
        let ruleset = &self.ruleset;
        let accumulator = self
            .current
            .get_or_insert_with(|| TextAccumulator::new(Rc::clone(ruleset)));

        let emission = accumulator.push(fragment, last_in_node);
        if last_in_node {
            self.current = None;
        }
        emission
    }
}
