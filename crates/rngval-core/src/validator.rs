//! The public façade (§6 "External Interfaces"): [`Validator`] ties together
//! traversal, the walker cache, the cooperative scheduler, reset, and the
//! query layer behind the small surface a host actually calls.

use std::time::{Duration, Instant};

use log::{debug, trace, warn};
use rngval_grammar::walker::{Grammar, PossibleEvent, Walker};
use rngval_tree::{Document, NodeId, ParsingError};

use crate::annotations::{Annotations, PropertyValue};
use crate::cache::{Phase, WalkerCache};
use crate::errors::{EngineError, ValidationError};
use crate::events::{EventBus, EventName, EventPayload, ListenerAction, ListenerId};
use crate::index::EventIndex;
use crate::progress::{Progress, WorkingState};
use crate::query::{self, FragmentQueryError};
use crate::reset;
use crate::scheduler::{Cycler, RunState};
use crate::traversal::{StepOutcome, Traversal};

/// Tunables for one [`Validator`] instance (§2 "Ambient stack"). Hosts that
/// load configuration from a file can deserialize this directly with
/// `serde_json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ValidatorOptions {
    /// Minimum `EventIndex` gap between two walker cache insertions for the
    /// same `(node, phase)` key.
    pub walker_cache_gap: u64,
    /// Upper bound on live walker cache entries before the oldest is evicted.
    pub walker_cache_max: usize,
    /// Upper bound on `step()` calls a single `cycle()` may take.
    pub max_timespan: usize,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            walker_cache_gap: 64,
            walker_cache_max: 512,
            max_timespan: 256,
        }
    }
}

/// The incremental validator itself. Generic over the grammar walker so a
/// host can back it with something other than `rngval-grammar`'s reference
/// engine.
pub struct Validator<W: Walker + Clone> {
    grammar: Grammar,
    new_walker: Box<dyn Fn() -> W>,
    walker: W,
    traversal: Traversal,
    index: EventIndex,
    cache: WalkerCache<W>,
    annotations: Annotations,
    errors: Vec<ValidationError>,
    events: EventBus,
    cycler: Cycler,
    options: ValidatorOptions,
}

impl<W: Walker + Clone + 'static> Validator<W> {
    pub fn new(doc: &Document, grammar: Grammar, options: ValidatorOptions) -> Self {
        let new_walker: Box<dyn Fn() -> W> = {
            let g = grammar.clone();
            Box::new(move || g.new_walker())
        };
        let walker = (new_walker)();
        Self {
            traversal: Traversal::new(doc),
            walker,
            grammar,
            cache: WalkerCache::new(options.walker_cache_gap, options.walker_cache_max),
            annotations: Annotations::new(),
            errors: Vec::new(),
            events: EventBus::new(),
            cycler: Cycler::new(),
            new_walker,
            index: EventIndex::ZERO,
            options,
        }
    }

    pub fn on<F>(&mut self, name: EventName, f: F) -> ListenerId
    where
        F: FnMut(&EventPayload) -> ListenerAction + 'static,
    {
        self.events.on(name, f)
    }

    pub fn off(&mut self, id: ListenerId) {
        self.events.off(id)
    }

    pub fn start(&mut self) {
        self.cycler.start();
        debug!("validator started");
    }

    pub fn stop(&mut self) {
        self.cycler.stop();
        debug!("validator stopped");
    }

    pub fn run_state(&self) -> RunState {
        self.cycler.run_state()
    }

    /// Runs a bounded slice of traversal work: up to `max_timespan` steps, or
    /// until `timeout` elapses, or until the document finishes — whichever
    /// comes first. Returns `Err(EngineError::Reentrant)` if called while
    /// stopped or while already inside a `cycle()`. The caller decides
    /// whether to call `cycle()` again (immediately, or via its own
    /// `Scheduler`, which this method never invokes itself) based on
    /// [`Validator::working_state`] afterward.
    pub fn cycle(&mut self, doc: &Document, timeout: Duration) -> Result<(), EngineError> {
        self.cycler.try_begin_cycle()?;

        let deadline = Instant::now() + timeout;
        let max_steps = self.options.max_timespan;
        let suppress_updates = self.cycler.is_resetting();
        let mut steps = 0usize;
        loop {
            if self.traversal.is_finished() || steps >= max_steps || Instant::now() >= deadline {
                break;
            }
            self.take_one_step(doc);
            steps += 1;
        }

        self.cycler.end_cycle();
        trace!("cycle advanced {steps} steps");

        if !suppress_updates {
            self.emit_state_update();
        }
        Ok(())
    }

    fn take_one_step(&mut self, doc: &Document) {
        let before_node = self.traversal.current_node();
        let before_phase = self.traversal.current_phase();
        match self
            .traversal
            .step(doc, &mut self.walker, &mut self.index, &mut self.annotations)
        {
            Ok(StepOutcome::Progressed) | Ok(StepOutcome::Finished) => {}
            Err(grammar_errors) => {
                for err in grammar_errors {
                    let node = before_node;
                    let validation_error = ValidationError::new(err, node, None, self.index);
                    self.events
                        .emit(EventPayload::Error(validation_error.clone()));
                    if let Some(node) = node {
                        self.annotations.add_error_id(node, self.errors.len());
                    }
                    self.errors.push(validation_error);
                }
            }
        }
        if let Some(node) = self.traversal.take_wildcard_change() {
            self.events
                .emit(EventPayload::PossibleDueToWildcardChange { node });
        }
        self.maybe_snapshot_cache(before_node, before_phase);
    }

    fn maybe_snapshot_cache(
        &mut self,
        before_node: Option<NodeId>,
        before_phase: Option<crate::traversal::CurrentPhase>,
    ) {
        use crate::traversal::CurrentPhase;
        let Some(node) = before_node else { return };
        let after_phase = self.traversal.current_phase();
        match (before_phase, after_phase) {
            (Some(CurrentPhase::StartTagAndAttributes), Some(CurrentPhase::Contents))
                if self.traversal.current_node() == Some(node) =>
            {
                self.cache
                    .maybe_insert(node, Phase::AfterAttributes, self.index, &self.walker);
            }
            (Some(CurrentPhase::Contents), _) if self.traversal.current_node() != Some(node) => {
                self.cache
                    .maybe_insert(node, Phase::AfterEnd, self.index, &self.walker);
            }
            _ => {}
        }
    }

    fn emit_state_update(&mut self) {
        let state = self.working_state();
        self.events.emit(EventPayload::StateUpdate(state));
    }

    /// §6: `{state, part_done}`. §4.4: a validator stopped before traversal
    /// finishes reports `Incomplete` regardless of how far it got — `stop()`
    /// means the host gave up on this run, not that it merely paused between
    /// timeslices.
    pub fn working_state(&self) -> Progress {
        let part_done = self.traversal.progress_fraction();
        let state = if !self.traversal.is_finished() {
            if self.index == EventIndex::ZERO || self.cycler.run_state() == RunState::Stopped {
                WorkingState::Incomplete
            } else {
                WorkingState::Working
            }
        } else if self.errors.is_empty() {
            WorkingState::Valid
        } else {
            WorkingState::Invalid
        };
        Progress { state, part_done }
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn errors_for(&self, node: NodeId) -> Vec<&ValidationError> {
        query::errors_for(&self.errors, node)
    }

    pub fn node_property(&self, node: NodeId, key: &str) -> Option<PropertyValue> {
        self.annotations.property(node, key)
    }

    pub fn schema_namespaces(&self) -> Vec<String> {
        self.grammar.schema_namespaces()
    }

    /// A fresh scan of `doc`'s `xmlns`/`xmlns:*` declarations, never cached —
    /// unlike schema namespaces these can change on every mutation.
    pub fn document_namespaces(&self, doc: &Document) -> std::collections::HashMap<String, Vec<String>> {
        query::document_namespaces(doc)
    }

    /// §4.5: discard everything learned at or after `node`'s own start tag,
    /// then replay from the document root up to that point so the live
    /// walker and traversal position are consistent again.
    pub fn reset_to(&mut self, doc: &Document, node: NodeId) {
        let at = reset::target_index(doc, &self.annotations, node);
        let reported_at =
            reset::first_dropped_index(doc, &self.annotations, node).unwrap_or(at);
        self.cycler.begin_reset();
        let invalidated =
            reset::invalidate_from(&mut self.cache, &mut self.annotations, &mut self.errors, at);
        for dropped in &invalidated.dropped_errors {
            warn!("reset_to discarded a stale error at {}", dropped.at);
        }
        self.events.emit(EventPayload::ResetErrors { at: reported_at });

        self.walker = (self.new_walker)();
        self.traversal = Traversal::new(doc);
        self.index = EventIndex::ZERO;
        let mut steps = 0usize;
        let budget = doc.children(doc.document_node()).len().saturating_add(1) * 16 + 1024;
        loop {
            if self.traversal.is_finished()
                || self.traversal.peek_next_content_child(doc) == Some(node)
            {
                break;
            }
            self.replay_one_step_quietly(doc);
            steps += 1;
            if steps > budget {
                warn!("reset_to catch-up replay exceeded its step budget; node may be unreachable");
                break;
            }
        }
        self.cycler.end_reset();
    }

    /// Re-derives walker and traversal state for a node that was already
    /// validated before the reset target, without touching `self.errors` or
    /// emitting anything — those errors are already sitting in `self.errors`,
    /// kept there by `reset::invalidate_from`, and replaying the same events
    /// again would duplicate them.
    fn replay_one_step_quietly(&mut self, doc: &Document) {
        let before_node = self.traversal.current_node();
        let before_phase = self.traversal.current_phase();
        let _ = self
            .traversal
            .step(doc, &mut self.walker, &mut self.index, &mut self.annotations);
        let _ = self.traversal.take_wildcard_change();
        self.maybe_snapshot_cache(before_node, before_phase);
    }

    /// §4.5: equivalent to `reset_to`, named separately in the external
    /// interface for hosts that conceptually "restart from node" rather than
    /// "invalidate at node" — both share the same implementation here since
    /// this engine always replays from the root regardless.
    pub fn restart_at(&mut self, doc: &Document, node: NodeId) {
        self.reset_to(doc, node);
    }

    /// §4.6 `possibleWhere`: every content index inside `container` where
    /// firing `name(params)` would be accepted. See [`query::possible_where`]
    /// for the supported `name`s and `params` shape.
    pub fn possible_where(
        &self,
        doc: &Document,
        container: NodeId,
        name: &str,
        params: &[String],
    ) -> Result<Vec<usize>, EngineError> {
        let new_walker = &self.new_walker;
        query::possible_where(doc, || (new_walker)(), container, name, params)
    }

    pub fn possible_at(&self, doc: &Document, node: NodeId) -> Result<Vec<PossibleEvent>, EngineError> {
        let new_walker = &self.new_walker;
        query::possible_at(doc, || (new_walker)(), node)
    }

    pub fn speculatively_validate(
        &self,
        doc: &Document,
        node: NodeId,
        fragment: &Document,
    ) -> Result<Vec<ValidationError>, EngineError> {
        let new_walker = &self.new_walker;
        query::speculatively_validate(doc, || (new_walker)(), node, fragment)
    }

    pub fn speculatively_validate_fragment(
        &self,
        doc: &Document,
        node: NodeId,
        source: &str,
    ) -> Result<Vec<ValidationError>, FragmentQueryError> {
        let new_walker = &self.new_walker;
        query::speculatively_validate_fragment(doc, || (new_walker)(), node, source)
    }

    pub fn resolve_name_at(&self, node: NodeId, prefix: &str) -> Option<String> {
        query::resolve_name_at(&self.grammar, node, prefix)
    }

    pub fn unresolve_name_at(&self, node: NodeId, uri: &str) -> Option<String> {
        query::unresolve_name_at(&self.grammar, node, uri)
    }
}

/// Parses `source` into a standalone fragment document, for callers building
/// their own `speculatively_validate` inputs instead of going through
/// [`Validator::speculatively_validate_fragment`].
pub fn parse_fragment(source: &str) -> Result<Document, ParsingError> {
    crate::fragment::parse_standalone_fragment(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rngval_grammar::name::{Name, NameTest};
    use rngval_grammar::pattern::{self, ElementDef};
    use rngval_grammar::walker::DerivativeWalker;
    use rngval_tree::QName;
    use std::time::Duration;

    fn grammar() -> Grammar {
        let leaf = pattern::element(NameTest::Name(Name::local("leaf")), pattern::empty(), pattern::empty());
        Grammar::new(
            NameTest::Name(Name::local("root")),
            ElementDef {
                attrs: pattern::empty(),
                content: pattern::zero_or_more(leaf),
            },
        )
    }

    fn document_with_leaves(n: usize) -> Document {
        let mut doc = Document::new();
        let root = doc.create_element(QName::local("root"));
        doc.append_child(doc.document_node(), root);
        for _ in 0..n {
            let leaf = doc.create_element(QName::local("leaf"));
            doc.append_child(root, leaf);
        }
        doc
    }

    #[test]
    fn validates_a_well_formed_document_to_valid() {
        let doc = document_with_leaves(3);
        let mut v: Validator<DerivativeWalker> =
            Validator::new(&doc, grammar(), ValidatorOptions::default());
        v.start();
        v.cycle(&doc, Duration::from_secs(1)).unwrap();
        assert_eq!(v.working_state().state, WorkingState::Valid);
        assert!(v.errors().is_empty());
    }

    #[test]
    fn invalid_child_is_reported_and_traversal_still_completes() {
        let mut doc = Document::new();
        let root = doc.create_element(QName::local("root"));
        doc.append_child(doc.document_node(), root);
        let bogus = doc.create_element(QName::local("bogus"));
        doc.append_child(root, bogus);

        let mut v: Validator<DerivativeWalker> =
            Validator::new(&doc, grammar(), ValidatorOptions::default());
        v.start();
        v.cycle(&doc, Duration::from_secs(1)).unwrap();
        assert_eq!(v.working_state().state, WorkingState::Invalid);
        assert_eq!(v.errors().len(), 1);
        assert_eq!(v.errors_for(bogus).len(), 1);
    }

    #[test]
    fn options_round_trip_through_json_with_partial_overrides() {
        let parsed: ValidatorOptions = serde_json::from_str(r#"{"max_timespan": 16}"#).unwrap();
        assert_eq!(parsed.max_timespan, 16);
        assert_eq!(parsed.walker_cache_gap, ValidatorOptions::default().walker_cache_gap);

        let serialized = serde_json::to_string(&ValidatorOptions::default()).unwrap();
        let round_tripped: ValidatorOptions = serde_json::from_str(&serialized).unwrap();
        assert_eq!(round_tripped.walker_cache_max, ValidatorOptions::default().walker_cache_max);
    }

    #[test]
    fn cycle_while_stopped_is_rejected() {
        let doc = document_with_leaves(1);
        let mut v: Validator<DerivativeWalker> =
            Validator::new(&doc, grammar(), ValidatorOptions::default());
        let result = v.cycle(&doc, Duration::from_secs(1));
        assert!(result.is_err());
    }

    #[test]
    fn stop_before_traversal_finishes_reports_incomplete() {
        let doc = document_with_leaves(3);
        let mut v: Validator<DerivativeWalker> =
            Validator::new(&doc, grammar(), ValidatorOptions {
                max_timespan: 1,
                ..ValidatorOptions::default()
            });
        v.start();
        v.cycle(&doc, Duration::from_secs(1)).unwrap();
        assert_eq!(v.working_state().state, WorkingState::Working);

        v.stop();
        assert_eq!(v.working_state().state, WorkingState::Incomplete);
    }

    #[test]
    fn reset_to_clears_errors_from_a_reprocessed_node() {
        let mut doc = Document::new();
        let root = doc.create_element(QName::local("root"));
        doc.append_child(doc.document_node(), root);
        let bogus = doc.create_element(QName::local("bogus"));
        doc.append_child(root, bogus);

        let mut v: Validator<DerivativeWalker> =
            Validator::new(&doc, grammar(), ValidatorOptions::default());
        v.start();
        v.cycle(&doc, Duration::from_secs(1)).unwrap();
        assert_eq!(v.errors().len(), 1);

        v.reset_to(&doc, bogus);
        assert!(v.errors().is_empty());
        v.cycle(&doc, Duration::from_secs(1)).unwrap();
        assert_eq!(v.errors().len(), 1); // re-derives the same error
    }
}
