//! Derivation hooks: calculator calls fired when trigger tasks are
//! selected, with results cached per trigger task.
//!
//! Each dispatch gets a ticket from a monotonic counter. A completion is
//! accepted only if its ticket is still the current one for that task, so a
//! late response for a task that was deselected (or reselected since) is
//! discarded instead of resurrecting stale values.
//!
//! Calls run as tasks in a [`JoinSet`] owned by the hooks; the owner drains
//! finished calls with [`DerivationHooks::poll`] or waits for all of them
//! with [`DerivationHooks::settle`]. A call whose task panics or is cancelled
//! counts as an unavailable calculator. The cache is only ever mutated by
//! the owner.

use incarforge_core::{Calculator, CalculatorError, CalculatorKind, ParamMap};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::rules::RuleSet;

struct Completion {
    task: String,
    ticket: u64,
    outcome: Result<ParamMap, CalculatorError>,
}

pub struct DerivationHooks {
    triggers: IndexMap<String, CalculatorKind>,
    calculators: HashMap<CalculatorKind, Arc<dyn Calculator>>,
    current: HashMap<String, u64>,
    next_ticket: u64,
    cache: HashMap<String, ParamMap>,
    calls: JoinSet<Completion>,
    /// Task and ticket of every unfinished call, for calls that never
    /// produce a completion.
    pending: HashMap<Id, (String, u64, CalculatorKind)>,
}

impl DerivationHooks {
    /// Hooks for every trigger in `rules`, with no calculators attached.
    pub fn new(rules: &RuleSet) -> Self {
        Self {
            triggers: rules
                .triggers()
                .map(|(task, kind)| (task.to_string(), kind))
                .collect(),
            calculators: HashMap::new(),
            current: HashMap::new(),
            next_ticket: 0,
            cache: HashMap::new(),
            calls: JoinSet::new(),
            pending: HashMap::new(),
        }
    }

    /// Attach a calculator. Replaces an existing one of the same kind.
    pub fn with_calculator(mut self, calculator: Arc<dyn Calculator>) -> Self {
        self.calculators.insert(calculator.kind(), calculator);
        self
    }

    pub fn with_calculators(self, calculators: impl IntoIterator<Item = Arc<dyn Calculator>>) -> Self {
        calculators
            .into_iter()
            .fold(self, |hooks, calc| hooks.with_calculator(calc))
    }

    pub fn is_trigger(&self, task: &str) -> bool {
        self.triggers.contains_key(task)
    }

    /// `task` entered the selection. Fires its calculator if it is a
    /// trigger with an attached calculator; returns whether a call was
    /// dispatched. Must be called from within a tokio runtime.
    pub fn on_select(&mut self, task: &str) -> bool {
        let Some(kind) = self.triggers.get(task).copied() else {
            return false;
        };
        let Some(calculator) = self.calculators.get(&kind).cloned() else {
            debug!(task = %task, calculator = %kind, "No calculator attached, skipping derivation");
            return false;
        };

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.current.insert(task.to_string(), ticket);

        let task_key = task.to_string();
        info!(task = %task, calculator = %kind, ticket, "Dispatching calculator");
        let handle = self.calls.spawn(async move {
            let outcome = calculator.calculate().await;
            Completion {
                task: task_key,
                ticket,
                outcome,
            }
        });
        self.pending.insert(handle.id(), (task.to_string(), ticket, kind));
        true
    }

    /// `task` left the selection. Drops its cached result and invalidates
    /// any in-flight call.
    pub fn on_deselect(&mut self, task: &str) {
        let had_ticket = self.current.remove(task).is_some();
        let had_value = self.cache.remove(task).is_some();
        if had_ticket || had_value {
            debug!(task = %task, "Derived parameters dropped");
        }
    }

    /// Apply every completion that has already arrived. Never blocks.
    /// Returns how many completions were processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        while let Some(joined) = self.calls.try_join_next_with_id() {
            self.finish(joined);
            processed += 1;
        }
        processed
    }

    /// Wait until every dispatched call has finished and been applied.
    pub async fn settle(&mut self) {
        while let Some(joined) = self.calls.join_next_with_id().await {
            self.finish(joined);
        }
    }

    fn finish(&mut self, joined: Result<(Id, Completion), JoinError>) {
        match joined {
            Ok((id, completion)) => {
                self.pending.remove(&id);
                self.apply(completion);
            }
            Err(e) => {
                let Some((task, ticket, kind)) = self.pending.remove(&e.id()) else {
                    return;
                };
                let reason = if e.is_panic() {
                    "calculator task panicked"
                } else {
                    "calculator task was cancelled"
                };
                self.apply(Completion {
                    task,
                    ticket,
                    outcome: Err(CalculatorError::Unavailable {
                        calculator: kind.to_string(),
                        reason: reason.into(),
                    }),
                });
            }
        }
    }

    fn apply(&mut self, completion: Completion) {
        let Completion {
            task,
            ticket,
            outcome,
        } = completion;

        if self.current.get(&task) != Some(&ticket) {
            debug!(task = %task, ticket, "Discarding stale calculator result");
            return;
        }

        match outcome {
            Ok(params) => {
                info!(task = %task, keys = params.len(), "Derived parameters available");
                self.cache.insert(task, params);
            }
            Err(e) => {
                warn!(task = %task, error = %e, "Calculator unavailable, no derived value");
                self.cache.remove(&task);
            }
        }
    }

    /// Calls dispatched but not yet applied.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    /// The completed result for `task`, if any.
    pub fn derived(&self, task: &str) -> Option<&ParamMap> {
        self.cache.get(task)
    }

    /// Completed results for the selected tasks, in the order given.
    pub fn derived_for<'a, I>(&'a self, selection: I) -> Vec<(&'a str, &'a ParamMap)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        selection
            .into_iter()
            .filter_map(|task| self.cache.get(task).map(|params| (task, params)))
            .collect()
    }

    /// Forget every cached value and invalidate in-flight calls.
    pub fn clear(&mut self) {
        self.current.clear();
        self.cache.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Returns a fixed result; optionally waits for a notify first.
    pub(crate) struct ScriptedCalculator {
        kind: CalculatorKind,
        result: Result<ParamMap, CalculatorError>,
        gate: Option<Arc<Notify>>,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedCalculator {
        pub(crate) fn ok(kind: CalculatorKind, pairs: &[(&str, &str)]) -> Self {
            Self {
                kind,
                result: Ok(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn failing(kind: CalculatorKind) -> Self {
            Self {
                kind,
                result: Err(CalculatorError::Unavailable {
                    calculator: kind.to_string(),
                    reason: "POSCAR file not found".into(),
                }),
                gate: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }
    }

    #[async_trait]
    impl Calculator for ScriptedCalculator {
        fn kind(&self) -> CalculatorKind {
            self.kind
        }

        async fn calculate(&self) -> Result<ParamMap, CalculatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.result.clone()
        }
    }

    fn rules() -> RuleSet {
        RuleSet::new()
            .with_trigger("DFT+U", CalculatorKind::DftU)
            .with_trigger("ISPIN", CalculatorKind::Magmom)
            .with_trigger("NEB", CalculatorKind::NebImages)
    }

    #[tokio::test]
    async fn successful_result_is_cached() {
        let calc = Arc::new(ScriptedCalculator::ok(CalculatorKind::Magmom, &[("MAGMOM", "2*5.0")]));
        let mut hooks = DerivationHooks::new(&rules()).with_calculator(calc.clone());

        assert!(hooks.on_select("ISPIN"));
        hooks.settle().await;

        assert_eq!(hooks.derived("ISPIN").unwrap()["MAGMOM"], "2*5.0");
        assert_eq!(calc.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.in_flight(), 0);
    }

    #[tokio::test]
    async fn non_trigger_and_missing_calculator_do_not_dispatch() {
        let mut hooks = DerivationHooks::new(&rules());
        assert!(!hooks.on_select("Opt"));
        assert!(!hooks.on_select("NEB"));
        assert_eq!(hooks.in_flight(), 0);
    }

    #[tokio::test]
    async fn failure_yields_no_value() {
        let calc = Arc::new(ScriptedCalculator::failing(CalculatorKind::DftU));
        let mut hooks = DerivationHooks::new(&rules()).with_calculator(calc);

        hooks.on_select("DFT+U");
        hooks.settle().await;
        assert!(hooks.derived("DFT+U").is_none());
    }

    struct PanickingCalculator;

    #[async_trait]
    impl Calculator for PanickingCalculator {
        fn kind(&self) -> CalculatorKind {
            CalculatorKind::DftU
        }

        async fn calculate(&self) -> Result<ParamMap, CalculatorError> {
            panic!("structure parser crashed");
        }
    }

    #[tokio::test]
    async fn panicking_calculator_yields_no_value_and_settles() {
        let mut hooks = DerivationHooks::new(&rules())
            .with_calculator(Arc::new(PanickingCalculator))
            .with_calculator(Arc::new(ScriptedCalculator::ok(CalculatorKind::Magmom, &[("MAGMOM", "2*5.0")])));

        assert!(hooks.on_select("DFT+U"));
        assert!(hooks.on_select("ISPIN"));

        tokio::time::timeout(std::time::Duration::from_secs(5), hooks.settle())
            .await
            .expect("settle returns after a calculator task panics");

        assert!(hooks.derived("DFT+U").is_none());
        assert_eq!(hooks.derived("ISPIN").unwrap()["MAGMOM"], "2*5.0");
        assert_eq!(hooks.in_flight(), 0);

        // The trigger can fire again afterwards
        hooks.on_deselect("DFT+U");
        assert!(hooks.on_select("DFT+U"));
        hooks.settle().await;
        assert_eq!(hooks.in_flight(), 0);
    }

    #[tokio::test]
    async fn late_result_after_deselect_is_discarded() {
        let gate = Arc::new(Notify::new());
        let calc = Arc::new(
            ScriptedCalculator::ok(CalculatorKind::NebImages, &[("IMAGES", "5")]).gated(gate.clone()),
        );
        let mut hooks = DerivationHooks::new(&rules()).with_calculator(calc);

        hooks.on_select("NEB");
        hooks.on_deselect("NEB");
        gate.notify_one();
        hooks.settle().await;

        assert!(hooks.derived("NEB").is_none());
    }

    #[tokio::test]
    async fn reselect_supersedes_earlier_call() {
        let gate = Arc::new(Notify::new());
        let calc = Arc::new(
            ScriptedCalculator::ok(CalculatorKind::NebImages, &[("IMAGES", "3")]).gated(gate.clone()),
        );
        let mut hooks = DerivationHooks::new(&rules()).with_calculator(calc.clone());

        hooks.on_select("NEB");
        hooks.on_deselect("NEB");
        hooks.on_select("NEB");
        assert_eq!(hooks.in_flight(), 2);

        // Release one permit at a time until both calls have reported.
        while hooks.in_flight() > 0 {
            gate.notify_one();
            tokio::task::yield_now().await;
            hooks.poll();
        }

        assert_eq!(hooks.derived("NEB").unwrap()["IMAGES"], "3");
        assert_eq!(calc.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn derived_for_follows_selection_order() {
        let mut hooks = DerivationHooks::new(&rules())
            .with_calculator(Arc::new(ScriptedCalculator::ok(CalculatorKind::Magmom, &[("MAGMOM", "1*0.6")])))
            .with_calculator(Arc::new(ScriptedCalculator::ok(CalculatorKind::DftU, &[("LDAUU", "4.0")])));

        hooks.on_select("ISPIN");
        hooks.on_select("DFT+U");
        hooks.settle().await;

        let layer = hooks.derived_for(["DFT+U", "Opt", "ISPIN"]);
        let tasks: Vec<_> = layer.iter().map(|(t, _)| *t).collect();
        assert_eq!(tasks, vec!["DFT+U", "ISPIN"]);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let mut hooks = DerivationHooks::new(&rules())
            .with_calculator(Arc::new(ScriptedCalculator::ok(CalculatorKind::Magmom, &[("MAGMOM", "1*0.6")])));
        hooks.on_select("ISPIN");
        hooks.settle().await;
        hooks.clear();
        assert!(hooks.derived("ISPIN").is_none());
    }
}
