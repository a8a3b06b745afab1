//! The role-alternating conversation thread and its trimming routine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::message::{Message, Role};
use crate::identifier::ThreadId;
use crate::tokens::TokenCounter;

/// Options for [`Thread::trim`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimOptions {
    /// Never evict the first IN/OUT exchange (e.g. a few-shot example).
    pub keep_first_exchange: bool,
    /// Never evict the message at this index or anything after it.
    pub protect_from: Option<usize>,
}

impl TrimOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the first exchange.
    #[must_use]
    pub fn keep_first_exchange(mut self, keep: bool) -> Self {
        self.keep_first_exchange = keep;
        self
    }

    /// Pin the message at `index` and everything after it.
    ///
    /// When called twice the earlier index wins.
    #[must_use]
    pub fn protect_from(mut self, index: usize) -> Self {
        self.protect_from = Some(self.protect_from.map_or(index, |at| at.min(index)));
        self
    }
}

/// What a trim pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Number of messages evicted.
    pub removed: usize,
    /// Token length after trimming, instruction included.
    pub token_len: usize,
    /// Whether the thread now fits the budget.
    pub within_budget: bool,
}

/// An ordered, role-alternating conversation plus an optional standing
/// instruction.
///
/// Outside the instruction, messages alternate IN, OUT, IN, ... and
/// appending the role already at the tail concatenates into the tail.
/// A thread has a single writer; share it across tasks only behind external
/// synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ThreadRepr")]
pub struct Thread {
    id: ThreadId,
    #[serde(skip_serializing_if = "Option::is_none")]
    inst: Option<Message>,
    messages: Vec<Message>,
}

impl Default for Thread {
    fn default() -> Self {
        Self::new()
    }
}

impl Thread {
    /// Create an empty thread.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ThreadId::new(),
            inst: None,
            messages: Vec::new(),
        }
    }

    /// Create a thread with a standing instruction.
    #[must_use]
    pub fn with_inst(text: impl Into<String>) -> Self {
        let mut thread = Self::new();
        thread.append(Role::Inst, text);
        thread
    }

    /// Build a thread by appending each message in order.
    ///
    /// Consecutive messages of one role are merged, so any list is accepted.
    #[must_use]
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let mut thread = Self::new();
        for msg in messages {
            thread.push(msg);
        }
        thread
    }

    /// Set the thread ID.
    #[must_use]
    pub fn with_id(mut self, id: ThreadId) -> Self {
        self.id = id;
        self
    }

    /// Thread ID.
    #[must_use]
    pub fn id(&self) -> &ThreadId {
        &self.id
    }

    /// Standing instruction text, if any.
    #[must_use]
    pub fn inst(&self) -> Option<&str> {
        self.inst.as_ref().map(|m| m.text.as_str())
    }

    /// Replace the standing instruction.
    pub fn set_inst(&mut self, text: impl Into<String>) {
        self.inst = Some(Message::inst(text));
    }

    /// Remove the standing instruction.
    pub fn clear_inst(&mut self) -> Option<Message> {
        self.inst.take()
    }

    /// Append text with the given role.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.push(Message::new(role, text));
    }

    /// Append a message.
    ///
    /// INST messages extend the standing instruction. A message whose role
    /// matches the tail is concatenated into the tail.
    pub fn push(&mut self, message: Message) {
        if message.role == Role::Inst {
            match &mut self.inst {
                Some(inst) => inst.absorb(message),
                None => self.inst = Some(message),
            }
            return;
        }

        match self.messages.last_mut() {
            Some(tail) if tail.role == message.role => tail.absorb(message),
            _ => self.messages.push(message),
        }
    }

    /// Non-instruction messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of non-instruction messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no non-instruction messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Role of the most recent message.
    #[must_use]
    pub fn last_role(&self) -> Option<Role> {
        self.messages.last().map(|m| m.role)
    }

    /// Remove all non-instruction messages.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Ordered messages for prompting, instruction first.
    #[must_use]
    pub fn render(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if let Some(inst) = &self.inst {
            out.push(inst.clone());
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    /// Counted length of the rendered thread.
    pub fn token_len(&self, counter: &dyn TokenCounter) -> usize {
        self.inst
            .iter()
            .chain(self.messages.iter())
            .map(|m| counter.count(&m.text))
            .sum()
    }

    /// Evict the oldest exchanges until the thread fits `budget` tokens.
    ///
    /// Messages go oldest first, one IN with its OUT together. A leading OUT
    /// with no IN before it goes alone. The most recent IN and everything
    /// after it are never evicted, nor is anything from
    /// [`TrimOptions::protect_from`] on, so the result may still exceed the
    /// budget.
    pub fn trim(
        &mut self,
        budget: usize,
        counter: &dyn TokenCounter,
        options: TrimOptions,
    ) -> TrimOutcome {
        let before = self.token_len(counter);
        let mut len = before;
        let mut removed = 0;

        let pinned = if options.keep_first_exchange
            && self.messages.len() >= 2
            && self.messages[0].role == Role::In
            && self.messages[1].role == Role::Out
        {
            2
        } else {
            0
        };

        while len > budget {
            let Some(last_in) = self.messages.iter().rposition(|m| m.role == Role::In) else {
                break;
            };
            let floor = options
                .protect_from
                .map_or(last_in, |at| at.saturating_sub(removed).min(last_in));
            if pinned >= floor {
                break;
            }

            let end = if self.messages[pinned].role == Role::Out {
                pinned + 1
            } else {
                pinned + 2
            };
            if end > floor {
                break;
            }
            removed += self.messages.drain(pinned..end).count();
            len = self.token_len(counter);
        }

        if removed > 0 {
            debug!(
                thread = %self.id,
                removed,
                tokens_before = before,
                tokens_after = len,
                budget,
                "Trimmed thread"
            );
        }

        TrimOutcome {
            removed,
            token_len: len,
            within_budget: len <= budget,
        }
    }
}

#[derive(Deserialize)]
struct ThreadRepr {
    #[serde(default)]
    id: Option<ThreadId>,
    #[serde(default)]
    inst: Option<Message>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl From<ThreadRepr> for Thread {
    fn from(repr: ThreadRepr) -> Self {
        let mut thread = Thread::new();
        if let Some(id) = repr.id {
            thread.id = id;
        }
        if let Some(mut inst) = repr.inst {
            inst.role = Role::Inst;
            thread.push(inst);
        }
        for msg in repr.messages {
            thread.push(msg);
        }
        thread
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{CharRatioCounter, FnCounter};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn alternates(thread: &Thread) -> bool {
        thread
            .messages()
            .windows(2)
            .all(|w| w[0].role != w[1].role)
            && thread.messages().iter().all(|m| m.role != Role::Inst)
    }

    fn words() -> FnCounter<impl Fn(&str) -> usize + Send + Sync> {
        FnCounter(|t: &str| t.split_whitespace().count())
    }

    #[test]
    fn test_same_role_append_concatenates() {
        let mut thread = Thread::new();
        thread.append(Role::In, "a");
        thread.append(Role::In, "b");

        assert_eq!(thread.len(), 1);
        assert_eq!(thread.messages()[0].text, "a\nb");
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    #[case(8)]
    fn test_alternating_appends_one_entry_each(#[case] n: usize) {
        let mut thread = Thread::new();
        for i in 0..n {
            let role = if i % 2 == 0 { Role::In } else { Role::Out };
            thread.append(role, format!("m{i}"));
        }
        assert_eq!(thread.len(), n);
        assert!(alternates(&thread));
    }

    #[test]
    fn test_inst_is_kept_apart() {
        let mut thread = Thread::with_inst("be brief");
        thread.append(Role::In, "hi");
        thread.append(Role::Inst, "answer in JSON");

        assert_eq!(thread.inst(), Some("be brief\nanswer in JSON"));
        assert_eq!(thread.len(), 1);

        let rendered = thread.render();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[0].role, Role::Inst);
        assert_eq!(rendered[1].role, Role::In);
    }

    #[test]
    fn test_from_messages_normalizes() {
        let thread = Thread::from_messages(vec![
            Message::inst("sys"),
            Message::input("a"),
            Message::input("b"),
            Message::output("c"),
        ]);
        assert_eq!(thread.inst(), Some("sys"));
        assert_eq!(thread.len(), 2);
        assert!(alternates(&thread));
    }

    #[test]
    fn test_trim_removes_oldest_pairs() {
        let mut thread = Thread::with_inst("one two");
        for i in 0..4 {
            thread.append(Role::In, format!("question {i}"));
            thread.append(Role::Out, format!("answer {i}"));
        }
        thread.append(Role::In, "final question");

        // 2 + 4 * 4 + 2 = 20 words
        assert_eq!(thread.token_len(&words()), 20);

        let outcome = thread.trim(12, &words(), TrimOptions::default());

        assert_eq!(outcome.removed, 4);
        assert_eq!(outcome.token_len, 12);
        assert!(outcome.within_budget);
        assert_eq!(thread.messages()[0].text, "question 2");
        assert!(alternates(&thread));
    }

    #[test]
    fn test_trim_never_evicts_last_input() {
        let mut thread = Thread::with_inst("instruction");
        thread.append(Role::In, "old");
        thread.append(Role::Out, "reply");
        thread.append(Role::In, "a very long current request that is over budget");

        let outcome = thread.trim(1, &CharRatioCounter::default(), TrimOptions::default());

        assert_eq!(outcome.removed, 2);
        assert!(!outcome.within_budget);
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.last_role(), Some(Role::In));
        assert_eq!(thread.inst(), Some("instruction"));
    }

    #[test]
    fn test_trim_keeps_trailing_output_with_last_input() {
        let mut thread = Thread::new();
        thread.append(Role::In, "a b");
        thread.append(Role::Out, "c d");
        thread.append(Role::In, "e f");
        thread.append(Role::Out, "g h");

        let outcome = thread.trim(0, &words(), TrimOptions::default());

        assert_eq!(outcome.removed, 2);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread.messages()[0].text, "e f");
        assert_eq!(thread.messages()[1].text, "g h");
    }

    #[test]
    fn test_trim_leading_output_removed_alone() {
        let mut thread = Thread::new();
        thread.append(Role::Out, "greeting");
        thread.append(Role::In, "q1");
        thread.append(Role::Out, "a1");
        thread.append(Role::In, "q2");

        let outcome = thread.trim(2, &words(), TrimOptions::default());

        assert_eq!(outcome.removed, 3);
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.messages()[0].role, Role::In);
    }

    #[test]
    fn test_trim_keep_first_exchange() {
        let mut thread = Thread::new();
        for i in 0..3 {
            thread.append(Role::In, format!("q{i}"));
            thread.append(Role::Out, format!("a{i}"));
        }
        thread.append(Role::In, "q3");

        let options = TrimOptions::new().keep_first_exchange(true);
        let outcome = thread.trim(0, &words(), options);

        assert_eq!(outcome.removed, 4);
        let texts: Vec<_> = thread.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["q0", "a0", "q3"]);
        assert!(alternates(&thread));
    }

    #[test]
    fn test_trim_protect_from_pins_tail() {
        let mut thread = Thread::new();
        thread.append(Role::In, "old q");
        thread.append(Role::Out, "old a");
        thread.append(Role::In, "real request");
        thread.append(Role::Out, "bad reply");
        thread.append(Role::In, "please fix");

        let options = TrimOptions::new().protect_from(2);
        let outcome = thread.trim(0, &words(), options);

        assert_eq!(outcome.removed, 2);
        assert!(!outcome.within_budget);
        let texts: Vec<_> = thread.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["real request", "bad reply", "please fix"]);
    }

    #[test]
    fn test_trim_protect_from_never_splits_exchange() {
        let mut thread = Thread::new();
        thread.append(Role::In, "q0");
        thread.append(Role::Out, "a0");
        thread.append(Role::In, "q1");

        let outcome = thread.trim(0, &words(), TrimOptions::new().protect_from(1));

        assert_eq!(outcome.removed, 0);
        assert_eq!(thread.len(), 3);
    }

    #[test]
    fn test_trim_within_budget_is_noop() {
        let mut thread = Thread::with_inst("x");
        thread.append(Role::In, "y");
        let outcome = thread.trim(100, &words(), TrimOptions::default());
        assert_eq!(outcome.removed, 0);
        assert!(outcome.within_budget);
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn test_trim_without_input_does_nothing() {
        let mut thread = Thread::new();
        thread.append(Role::Out, "lonely output");
        let outcome = thread.trim(0, &words(), TrimOptions::default());
        assert_eq!(outcome.removed, 0);
        assert_eq!(thread.len(), 1);
    }

    #[test]
    fn test_serde_roundtrip_and_normalization() {
        let mut thread = Thread::with_inst("sys");
        thread.append(Role::In, "hello");
        thread.append(Role::Out, "hi");

        let json = serde_json::to_string(&thread).unwrap();
        let back: Thread = serde_json::from_str(&json).unwrap();
        assert_eq!(back, thread);

        let raw = serde_json::json!({
            "messages": [
                {"role": "inst", "text": "sys"},
                {"role": "in", "text": "a"},
                {"role": "in", "text": "b"}
            ]
        });
        let parsed: Thread = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.inst(), Some("sys"));
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.messages()[0].text, "a\nb");
    }
}
