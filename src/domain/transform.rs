//! Transform rules between domains.
//!
//! The Laplace domain is the hub: time signals reach it through a transform
//! table, the frequency domains through substitutions of the Laplace variable,
//! and the z domain through the bilinear map `s = (2/dt)(z - 1)/(z + 1)`.
//! Phasors are reached through the time domain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::errors::{CircuitError, Result};
use crate::symbolic::{Poly, RatFunc};

use super::partial::inverse_laplace;
use super::signal::{Signal, Support, Wave};
use super::{Domain, DomainExpr, Phasor, Value, FREQ_VAR, LAPLACE_VAR, OMEGA_VAR, PI_SYMBOL, Z_VAR};

/// How two-sided time signals are treated by the Laplace transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaplaceConvention {
    /// One-sided transform: every signal is taken as zero before `t = 0⁻`.
    #[default]
    Unilateral,
    /// Two-sided transform: terms that are non-zero for all `t` have no
    /// transform and are rejected.
    Bilateral,
}

/// Settings that change the result of a transform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformConfig {
    /// Laplace convention.
    pub convention: LaplaceConvention,
    /// Symbol for the sample period of the bilinear s↔z mapping.
    pub sample_symbol: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            convention: LaplaceConvention::Unilateral,
            sample_symbol: "dt".to_string(),
        }
    }
}

impl TransformConfig {
    /// Bilateral configuration.
    #[must_use]
    pub fn bilateral() -> Self {
        Self::default().with_convention(LaplaceConvention::Bilateral)
    }

    /// Overrides the Laplace convention.
    #[must_use]
    pub fn with_convention(mut self, convention: LaplaceConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Overrides the sample-period symbol.
    #[must_use]
    pub fn with_sample_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.sample_symbol = symbol.into();
        self
    }
}

type CacheKey = (TransformConfig, DomainExpr, Domain);

/// Memoized transform results. Purely an optimization: a cold cache and a warm
/// cache produce identical results.
#[derive(Debug, Default)]
pub struct TransformCache {
    entries: Mutex<HashMap<CacheKey, DomainExpr>>,
    hits: AtomicU64,
}

impl TransformCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<TransformCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    fn get(&self, key: &CacheKey) -> Option<DomainExpr> {
        let hit = self.entries.lock().ok()?.get(key).cloned();
        if hit.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    fn insert(&self, key: CacheKey, value: DomainExpr) {
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

    /// Number of cached transforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of lookups served from the cache since the last clear.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Applies transform rules under a fixed configuration, optionally memoizing
/// through a [`TransformCache`].
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    config: TransformConfig,
    cache: Option<Arc<TransformCache>>,
}

impl Transformer {
    /// Transformer without a cache.
    #[must_use]
    pub fn new(config: TransformConfig) -> Self {
        Self {
            config,
            cache: None,
        }
    }

    /// Transformer backed by the process-wide cache.
    #[must_use]
    pub fn cached(config: TransformConfig) -> Self {
        Self::new(config).with_cache(TransformCache::global())
    }

    /// Uses `cache` for memoization.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<TransformCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Disables memoization.
    #[must_use]
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Converts `expr` into `target`.
    pub fn convert(&self, expr: &DomainExpr, target: Domain) -> Result<DomainExpr> {
        if expr.domain() == target {
            return Ok(expr.clone());
        }
        let Some(cache) = &self.cache else {
            return self.convert_uncached(expr, target);
        };
        let key = (self.config.clone(), expr.clone(), target);
        if let Some(hit) = cache.get(&key) {
            debug!(from = %expr.domain(), to = %target, "transform cache hit");
            return Ok(hit);
        }
        let result = self.convert_uncached(expr, target)?;
        cache.insert(key, result.clone());
        Ok(result)
    }

    fn convert_uncached(&self, expr: &DomainExpr, target: Domain) -> Result<DomainExpr> {
        use Domain::{AngularFrequency, Constant, Discrete, Fourier, Laplace, Phasor as Ph, Time};
        let from = expr.domain();
        match (from, &expr.value, target) {
            (_, _, Constant) => self.to_constant(expr),
            (Constant, Value::Rational(c), Time) => Ok(DomainExpr::time(Signal::constant(c.clone()))),
            (Constant, _, Ph) => Err(transform_error(
                from,
                target,
                "a constant has no single-frequency phasor",
            )),
            (Constant, Value::Rational(c), _) => DomainExpr::from_ratfunc(target, c.clone()),
            (Time, Value::Signal(x), Laplace) => Ok(DomainExpr::laplace(self.laplace(x)?)),
            (Laplace, Value::Rational(f), Time) => Ok(DomainExpr::time(self.inverse_laplace(f)?)),
            (Laplace, Value::Rational(f), AngularFrequency) => {
                let jw = &RatFunc::j() * &RatFunc::symbol(OMEGA_VAR);
                retag(f, LAPLACE_VAR, &jw, from, target)
            }
            (AngularFrequency, Value::Rational(f), Laplace) => {
                let minus_js = -(&RatFunc::j() * &RatFunc::symbol(LAPLACE_VAR));
                retag(f, OMEGA_VAR, &minus_js, from, target)
            }
            (AngularFrequency, Value::Rational(f), Fourier) => {
                let two_pi_f = &RatFunc::integer(2)
                    * &(&RatFunc::symbol(PI_SYMBOL) * &RatFunc::symbol(FREQ_VAR));
                retag(f, OMEGA_VAR, &two_pi_f, from, target)
            }
            (Fourier, Value::Rational(f), AngularFrequency) => {
                let two_pi = &RatFunc::integer(2) * &RatFunc::symbol(PI_SYMBOL);
                let w = RatFunc::symbol(OMEGA_VAR)
                    .checked_div(&two_pi)
                    .ok_or_else(|| transform_error(from, target, "degenerate 2*pi"))?;
                retag(f, FREQ_VAR, &w, from, target)
            }
            (Laplace, Value::Rational(f), Discrete) => {
                let s_of_z = self.bilinear_s_of_z(from, target)?;
                retag(f, LAPLACE_VAR, &s_of_z, from, target)
            }
            (Discrete, Value::Rational(f), Laplace) => {
                let z_of_s = self.bilinear_z_of_s(from, target)?;
                retag(f, Z_VAR, &z_of_s, from, target)
            }
            (Time, Value::Signal(x), Ph) => Ok(DomainExpr::phasor(signal_to_phasor(x)?)),
            (Ph, Value::Phasor(p), Time) => Ok(DomainExpr::time(phasor_to_signal(p))),
            (Ph, _, _) | (_, _, Ph) => self.convert(&self.convert(expr, Time)?, target),
            (Time, _, _) | (AngularFrequency, _, _) | (Discrete, _, _) => {
                self.convert(&self.convert(expr, Laplace)?, target)
            }
            (Fourier, _, _) => self.convert(&self.convert(expr, AngularFrequency)?, target),
            (Laplace, _, Fourier) => self.convert(&self.convert(expr, AngularFrequency)?, target),
            _ => Err(transform_error(from, target, "no transform rule applies")),
        }
    }

    fn to_constant(&self, expr: &DomainExpr) -> Result<DomainExpr> {
        let from = expr.domain();
        let value = match (&expr.value, from.variable()) {
            (Value::Signal(x), _) => x.as_constant(),
            (Value::Rational(r), Some(var)) if !r.contains(var) => Some(r.clone()),
            (Value::Rational(r), None) => Some(r.clone()),
            _ => None,
        };
        value.map(DomainExpr::constant).ok_or_else(|| {
            transform_error(from, Domain::Constant, "value depends on the domain variable")
        })
    }

    fn sample_period(&self) -> RatFunc {
        RatFunc::symbol(&self.config.sample_symbol)
    }

    /// `s = (2/dt)(z - 1)/(z + 1)`.
    fn bilinear_s_of_z(&self, from: Domain, to: Domain) -> Result<RatFunc> {
        let z = RatFunc::symbol(Z_VAR);
        let num = &RatFunc::integer(2) * &(&z - &RatFunc::one());
        let den = &self.sample_period() * &(&z + &RatFunc::one());
        num.checked_div(&den)
            .ok_or_else(|| transform_error(from, to, "zero sample period"))
    }

    /// `z = (1 + s·dt/2)/(1 - s·dt/2)`.
    fn bilinear_z_of_s(&self, from: Domain, to: Domain) -> Result<RatFunc> {
        let half_sdt = &(&RatFunc::symbol(LAPLACE_VAR) * &self.sample_period()) * &RatFunc::rational(1, 2);
        let num = &RatFunc::one() + &half_sdt;
        let den = &RatFunc::one() - &half_sdt;
        num.checked_div(&den)
            .ok_or_else(|| transform_error(from, to, "degenerate bilinear map"))
    }

    /// Laplace transform of a time signal under the configured convention.
    pub fn laplace(&self, x: &Signal) -> Result<RatFunc> {
        if x.is_two_sided() && self.config.convention == LaplaceConvention::Bilateral {
            return Err(transform_error(
                Domain::Time,
                Domain::Laplace,
                &format!("'{x}' is non-zero for all t and has no bilateral transform"),
            ));
        }
        let mut total = RatFunc::zero();
        for (shape, c) in x.terms() {
            let term = laplace_term(shape.power, &shape.rate, &shape.wave, shape.support)
                .ok_or_else(|| {
                    transform_error(Domain::Time, Domain::Laplace, &format!("term {shape}"))
                })?;
            total = &total + &(&term * c);
        }
        Ok(total)
    }

    /// Inverse Laplace transform; the result is causal.
    pub fn inverse_laplace(&self, f: &RatFunc) -> Result<Signal> {
        inverse_laplace(f)
    }

    /// `∫_{0⁻}^{t} x(τ) dτ + initial`.
    pub fn integrate_signal(&self, x: &Signal, initial: &RatFunc) -> Result<Signal> {
        let xs = self.laplace(x)?;
        let ys = xs
            .checked_div(&RatFunc::symbol(LAPLACE_VAR))
            .ok_or_else(|| transform_error(Domain::Time, Domain::Laplace, "division by s"))?;
        Ok(self.inverse_laplace(&ys)?.add(&Signal::step(initial.clone())))
    }
}

fn transform_error(from: Domain, to: Domain, reason: &str) -> CircuitError {
    CircuitError::Transform {
        from,
        to,
        reason: reason.to_string(),
    }
}

fn retag(f: &RatFunc, var: &str, value: &RatFunc, from: Domain, to: Domain) -> Result<DomainExpr> {
    let g = f.subs(var, value).ok_or_else(|| {
        transform_error(from, to, &format!("substitution {var} = {value} is singular"))
    })?;
    DomainExpr::from_ratfunc(to, g)
}

/// Table entry for one term, built as `(-1)^n dⁿ/dsⁿ W(s)` shifted by the
/// exponential rate.
fn laplace_term(power: u32, rate: &RatFunc, wave: &Wave, support: Support) -> Option<RatFunc> {
    let s = RatFunc::symbol(LAPLACE_VAR);
    if let Support::Impulse(k) = support {
        return Some(RatFunc::from_poly(Poly::var_pow(LAPLACE_VAR, k)));
    }
    let mut base = match wave {
        Wave::One => s.recip()?,
        Wave::Cos(w2) => s.checked_div(&(&(&s * &s) + w2))?,
        Wave::SinOverOmega(w2) => (&(&s * &s) + w2).recip()?,
    };
    for _ in 0..power {
        base = -base.derivative(LAPLACE_VAR);
    }
    if rate.is_zero() {
        Some(base)
    } else {
        base.subs(LAPLACE_VAR, &(&s - rate))
    }
}

/// Single-frequency steady-state amplitude of a pure sinusoid.
fn signal_to_phasor(x: &Signal) -> Result<Phasor> {
    let fail = |reason: String| transform_error(Domain::Time, Domain::Phasor, &reason);
    let mut w2: Option<RatFunc> = None;
    let mut cos_part = RatFunc::zero();
    let mut sin_part = RatFunc::zero();
    for (shape, c) in x.terms() {
        if shape.power != 0 || !shape.rate.is_zero() || matches!(shape.support, Support::Impulse(_)) {
            return Err(fail(format!("'{x}' is not a steady-state sinusoid")));
        }
        let (freq, is_cos) = match &shape.wave {
            Wave::One => return Err(fail(format!("'{x}' has a constant component"))),
            Wave::Cos(q) => (q, true),
            Wave::SinOverOmega(q) => (q, false),
        };
        match &w2 {
            Some(prev) if prev != freq => {
                return Err(fail(format!("'{x}' mixes several frequencies")));
            }
            _ => w2 = Some(freq.clone()),
        }
        if is_cos {
            cos_part = &cos_part + c;
        } else {
            sin_part = &sin_part + c;
        }
    }
    let w2 = w2.ok_or_else(|| fail("the zero signal has no frequency".to_string()))?;
    let omega = w2
        .sqrt()
        .ok_or_else(|| fail(format!("frequency sqrt({w2}) has no closed form")))?;
    // c·sin(ωt)/ω = Re(-j c/ω · e^{jωt})
    let sin_amplitude = (&RatFunc::j() * &sin_part)
        .checked_div(&omega)
        .ok_or_else(|| fail("zero frequency".to_string()))?;
    Ok(Phasor::new(&cos_part - &sin_amplitude, omega))
}

fn phasor_to_signal(p: &Phasor) -> Signal {
    let re = p.amplitude().re();
    let im = p.amplitude().im();
    Signal::cos(re, p.omega()).add(&Signal::sin(-im, p.omega()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf(text: &str) -> RatFunc {
        text.parse().unwrap()
    }

    fn plain() -> Transformer {
        Transformer::new(TransformConfig::default())
    }

    #[test]
    fn table_transforms() {
        let t = plain();
        assert_eq!(t.laplace(&Signal::step(rf("V"))).unwrap(), rf("V/s"));
        assert_eq!(t.laplace(&Signal::ramp(rf("1"))).unwrap(), rf("1/s^2"));
        assert_eq!(
            t.laplace(&Signal::exponential(rf("1"), rf("-a"))).unwrap(),
            rf("1/(s + a)")
        );
        let cos = Signal::cos(rf("1"), &rf("w")).causal_part();
        assert_eq!(t.laplace(&cos).unwrap(), rf("s/(s^2 + w^2)"));
        let damped_ramp = Signal::term(rf("1"), 1, rf("-a"), Wave::One, Support::Causal);
        assert_eq!(t.laplace(&damped_ramp).unwrap(), rf("1/(s + a)^2"));
        assert_eq!(t.laplace(&Signal::impulse(rf("k"))).unwrap(), rf("k"));
    }

    #[test]
    fn bilateral_rejects_two_sided_terms() {
        let t = Transformer::new(TransformConfig::bilateral());
        let dc = Signal::constant(rf("5"));
        assert!(matches!(t.laplace(&dc), Err(CircuitError::Transform { .. })));
        assert_eq!(plain().laplace(&dc).unwrap(), rf("5/s"));
    }

    #[test]
    fn laplace_and_time_round_trip() {
        let t = plain();
        for text in [
            "1/(s + a)",
            "(2*s + 3)/(s^2 + 3*s + 2)",
            "1/(s^2 + 4)",
            "(s + 1)/(s^2 + 2*s + 5)",
            "1/(s*(s*L + R))",
            "1/(s + 2)^3",
            "s/(s^2 + w^2)",
        ] {
            let f = DomainExpr::laplace(rf(text));
            let x = t.convert(&f, Domain::Time).unwrap();
            assert_eq!(x.domain(), Domain::Time);
            let back = t.convert(&x, Domain::Laplace).unwrap();
            assert_eq!(back, f, "round trip of {text}");
        }
    }

    #[test]
    fn frequency_domains_round_trip() {
        let t = plain();
        let f = DomainExpr::laplace(rf("1/(s*R*C + 1)"));
        let w = t.convert(&f, Domain::AngularFrequency).unwrap();
        assert_eq!(w.as_ratfunc(), Some(&rf("1/(j*omega*R*C + 1)")));
        let hz = t.convert(&w, Domain::Fourier).unwrap();
        assert_eq!(t.convert(&hz, Domain::AngularFrequency).unwrap(), w);
        assert_eq!(t.convert(&hz, Domain::Laplace).unwrap(), f);
        let zd = t.convert(&f, Domain::Discrete).unwrap();
        assert_eq!(t.convert(&zd, Domain::Laplace).unwrap(), f);
    }

    #[test]
    fn phasor_extraction() {
        let t = plain();
        let x = Signal::cos(rf("3"), &rf("w")).add(&Signal::sin(rf("4"), &rf("w")));
        let p = t.convert(&DomainExpr::time(x.clone()), Domain::Phasor).unwrap();
        let phasor = p.as_phasor().unwrap();
        assert_eq!(phasor.amplitude(), &rf("3 - 4*j"));
        assert_eq!(phasor.omega(), &rf("w"));
        assert_eq!(phasor.magnitude_squared(), rf("25"));
        assert_eq!(t.convert(&p, Domain::Time).unwrap(), DomainExpr::time(x));
        let decaying = Signal::exponential(rf("1"), rf("-1"));
        assert!(t.convert(&DomainExpr::time(decaying), Domain::Phasor).is_err());
    }

    #[test]
    fn cache_is_transparent_and_clearable() {
        let cache = Arc::new(TransformCache::new());
        let t = plain().with_cache(Arc::clone(&cache));
        let f = DomainExpr::laplace(rf("1/(s + 1)"));
        let cold = t.convert(&f, Domain::Time).unwrap();
        let warm = t.convert(&f, Domain::Time).unwrap();
        assert_eq!(cold, warm);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(plain().convert(&f, Domain::Time).unwrap(), cold);
    }
}
