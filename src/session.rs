//! Analysis configuration and memoizing analysis sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::circuits::analysis::{analyze_with, transfer_function_with, Solution, Unknown};
use crate::circuits::graph::Circuit;
use crate::circuits::network::{one_port_with, OnePort};
use crate::circuits::solver::{SolverStrategy, DEFAULT_ADJUGATE_LIMIT};
use crate::circuits::twoport::{two_port_with, ParameterSet, TwoPort};
use crate::domain::{Domain, TransformConfig, Transformer};
use crate::errors::Result;
use crate::symbolic::RatFunc;

/// Settings shared by every analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalysisConfig {
    /// Linear solver selection.
    pub solver: SolverStrategy,
    /// Largest system solved by the adjugate method under
    /// [`SolverStrategy::Auto`].
    pub adjugate_limit: usize,
    /// Solve islands without the reference node against a local reference
    /// instead of failing with `FloatingSubcircuit`.
    pub allow_floating: bool,
    /// Transform rules used for source values and results.
    pub transform: TransformConfig,
    /// Memoize transforms in the process-wide cache.
    pub cache_transforms: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            solver: SolverStrategy::Auto,
            adjugate_limit: DEFAULT_ADJUGATE_LIMIT,
            allow_floating: false,
            transform: TransformConfig::default(),
            cache_transforms: true,
        }
    }
}

impl AnalysisConfig {
    /// Uses `solver` for every system.
    #[must_use]
    pub const fn with_solver(mut self, solver: SolverStrategy) -> Self {
        self.solver = solver;
        self
    }

    /// Sets the adjugate size threshold.
    #[must_use]
    pub const fn with_adjugate_limit(mut self, limit: usize) -> Self {
        self.adjugate_limit = limit;
        self
    }

    /// Enables or disables independent analysis of floating islands.
    #[must_use]
    pub const fn allow_floating(mut self, allow: bool) -> Self {
        self.allow_floating = allow;
        self
    }

    /// Replaces the transform configuration.
    #[must_use]
    pub fn with_transform(mut self, transform: TransformConfig) -> Self {
        self.transform = transform;
        self
    }

    /// Bypasses the process-wide transform cache.
    #[must_use]
    pub const fn without_transform_cache(mut self) -> Self {
        self.cache_transforms = false;
        self
    }

    /// Transformer for this configuration.
    #[must_use]
    pub fn transformer(&self) -> Transformer {
        if self.cache_transforms {
            Transformer::cached(self.transform.clone())
        } else {
            Transformer::new(self.transform.clone())
        }
    }
}

type CacheKey = (Circuit, Vec<Unknown>, Domain);

/// Memoized solutions keyed by circuit, targets and domain.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<CacheKey, Solution>>,
    hits: AtomicU64,
}

impl AnalysisCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &CacheKey) -> Option<Solution> {
        let hit = self.entries.lock().ok()?.get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert(&self, key: CacheKey, value: Solution) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, value);
        }
    }

    /// Drops every entry and resets the hit counter.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
    }

    /// Number of memoized solutions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing is memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups served from the cache since the last clear.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Analysis session: one configuration plus a solution cache.
///
/// Circuits are immutable, so entries never go stale; the cache only grows
/// until [`Analyzer::clear_cache`] is called.
#[derive(Debug, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
    cache: AnalysisCache,
}

impl Analyzer {
    /// Session with `config`.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            cache: AnalysisCache::new(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Solution cache.
    #[must_use]
    pub const fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    /// Empties the solution cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Solves `circuit` for `targets` in `domain`, reusing an earlier result
    /// for the same inputs.
    pub fn analyze(&self, circuit: &Circuit, targets: &[Unknown], domain: Domain) -> Result<Solution> {
        let key = (circuit.clone(), targets.to_vec(), domain);
        if let Some(hit) = self.cache.get(&key) {
            debug!(?domain, targets = targets.len(), "analysis cache hit");
            return Ok(hit);
        }
        let solution = analyze_with(circuit, targets, domain, &self.config)?;
        self.cache.insert(key, solution.clone());
        Ok(solution)
    }

    /// Thevenin/Norton equivalent between `p` and `n` under the session
    /// configuration.
    pub fn one_port(&self, circuit: &Circuit, p: &str, n: &str) -> Result<OnePort> {
        one_port_with(circuit, p, n, &self.config)
    }

    /// Two-port parameters between `port1` and `port2`.
    pub fn two_port(
        &self,
        circuit: &Circuit,
        port1: (&str, &str),
        port2: (&str, &str),
        set: ParameterSet,
    ) -> Result<TwoPort> {
        two_port_with(circuit, port1, port2, set, &self.config)
    }

    /// Zero-state transfer function from `input_source` to `output_node`.
    pub fn transfer_function(&self, circuit: &Circuit, input_source: &str, output_node: &str) -> Result<RatFunc> {
        transfer_function_with(circuit, input_source, output_node, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::component::{element, ComponentKind, ComponentRecord};
    use crate::domain::{DomainExpr, LaplaceConvention, Signal};
    use crate::errors::CircuitError;

    fn divider() -> Circuit {
        Circuit::build([
            element("V1", ComponentKind::VoltageSource, ["1", "0"], "5").unwrap(),
            element("Ra", ComponentKind::Resistor, ["1", "2"], "Ra").unwrap(),
            element("Rb", ComponentKind::Resistor, ["2", "0"], "Rb").unwrap(),
        ])
        .unwrap()
    }

    fn dc_divider() -> Circuit {
        let dc = DomainExpr::time(Signal::constant("5".parse().unwrap()));
        Circuit::build([
            ComponentRecord::new("V1", ComponentKind::VoltageSource, ["1", "0"]).with_value(dc),
            element("Ra", ComponentKind::Resistor, ["1", "2"], "Ra").unwrap(),
            element("Rb", ComponentKind::Resistor, ["2", "0"], "Rb").unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn port_requests_follow_session_config() {
        let circuit = dc_divider();
        let bilateral = Analyzer::new(AnalysisConfig::default().with_transform(TransformConfig::bilateral()));
        let targets = [Unknown::voltage("2")];
        assert!(matches!(
            bilateral.analyze(&circuit, &targets, Domain::Laplace),
            Err(CircuitError::Transform { .. })
        ));
        assert!(matches!(
            bilateral.one_port(&circuit, "2", "0"),
            Err(CircuitError::Transform { .. })
        ));
        // Port parameters come from the dead network, so no source is transformed.
        assert_eq!(
            bilateral.two_port(&circuit, ("2", "0"), ("1", "2"), ParameterSet::Z).unwrap(),
            Analyzer::default().two_port(&circuit, ("2", "0"), ("1", "2"), ParameterSet::Z).unwrap()
        );
        let gain: RatFunc = "Rb/(Ra + Rb)".parse().unwrap();
        assert_eq!(bilateral.transfer_function(&circuit, "V1", "2").unwrap(), gain);

        let unilateral = Analyzer::default();
        let port = unilateral.one_port(&circuit, "2", "0").unwrap();
        let voc: RatFunc = "5*Rb/((Ra + Rb)*s)".parse().unwrap();
        assert_eq!(port.open_circuit_voltage(), Some(&voc));
    }

    #[test]
    fn default_config_values() {
        let config = AnalysisConfig::default();
        assert_eq!(config.solver, SolverStrategy::Auto);
        assert_eq!(config.adjugate_limit, 4);
        assert!(!config.allow_floating);
        assert_eq!(config.transform.convention, LaplaceConvention::Unilateral);
    }

    #[test]
    fn builders_compose() {
        let config = AnalysisConfig::default()
            .with_solver(SolverStrategy::Gaussian)
            .with_adjugate_limit(2)
            .allow_floating(true)
            .without_transform_cache();
        assert_eq!(config.solver, SolverStrategy::Gaussian);
        assert_eq!(config.adjugate_limit, 2);
        assert!(config.allow_floating);
        assert!(!config.cache_transforms);
    }

    #[test]
    fn repeated_request_hits_cache() {
        let analyzer = Analyzer::new(AnalysisConfig::default().without_transform_cache());
        let circuit = divider();
        let targets = [Unknown::voltage("2")];
        let first = analyzer.analyze(&circuit, &targets, Domain::Laplace).unwrap();
        let second = analyzer.analyze(&circuit, &targets, Domain::Laplace).unwrap();
        assert_eq!(first, second);
        assert_eq!(analyzer.cache().len(), 1);
        assert_eq!(analyzer.cache().hits(), 1);
        let expected: RatFunc = "5*Rb/((Ra + Rb)*s)".parse().unwrap();
        assert_eq!(first.get(&targets[0]).and_then(|e| e.as_ratfunc()), Some(&expected));
    }

    #[test]
    fn cache_keys_include_component_values() {
        let analyzer = Analyzer::default();
        let targets = [Unknown::voltage("2")];
        let circuit = divider();
        let matched = circuit.substitute("Rb", &RatFunc::symbol("Ra")).unwrap();
        let a = analyzer.analyze(&circuit, &targets, Domain::Laplace).unwrap();
        let b = analyzer.analyze(&matched, &targets, Domain::Laplace).unwrap();
        assert_ne!(a, b);
        assert_eq!(analyzer.cache().hits(), 0);
        analyzer.clear_cache();
        assert!(analyzer.cache().is_empty());
    }
}
