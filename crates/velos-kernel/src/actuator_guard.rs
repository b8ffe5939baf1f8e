//! [`ActuatorGuard`] – last line of defense before commands reach the vehicle.
//!
//! Every registered [`ActuatorRule`] gets to inspect and repair the command
//! in order. Unlike a validator that rejects, the guard always produces a
//! usable command: violations are corrected in place and reported back so the
//! caller can log them.
//!
//! Two built-in rules are provided:
//! - [`FiniteRule`] – replaces NaN or infinite fields with the neutral value.
//! - [`RangeRule`] – clamps steering and acceleration into fixed bounds.

use velos_types::Actuators;

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single repair applied to every actuator command.
pub trait ActuatorRule: Send + Sync {
    /// Human-readable name used in log messages.
    fn name(&self) -> &str;

    /// Repair `actuators` in place. Returns the names of the fields changed.
    fn apply(&self, actuators: &mut Actuators) -> Vec<&'static str>;
}

// ────────────────────────────────────────────────────────────────────────────
// ActuatorGuard
// ────────────────────────────────────────────────────────────────────────────

/// One correction made by the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub rule: String,
    pub field: &'static str,
}

/// Rule engine applied to every actuator command.
///
/// # Example
///
/// ```
/// use velos_kernel::actuator_guard::ActuatorGuard;
/// use velos_types::Actuators;
///
/// let guard = ActuatorGuard::standard();
/// let mut cmd = Actuators { accel: f32::NAN, steer: 3.0, ..Actuators::neutral() };
/// let fixes = guard.sanitize(&mut cmd);
///
/// assert_eq!(cmd.accel, 0.0);
/// assert_eq!(cmd.steer, 1.0);
/// assert_eq!(fixes.len(), 2);
/// ```
#[derive(Default)]
pub struct ActuatorGuard {
    rules: Vec<Box<dyn ActuatorRule>>,
}

impl ActuatorGuard {
    /// Create an empty guard with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finite check followed by the default bounds.
    pub fn standard() -> Self {
        let mut guard = Self::new();
        guard.add_rule(Box::new(FiniteRule));
        guard.add_rule(Box::new(RangeRule::default()));
        guard
    }

    /// Register a new rule. Rules run in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn ActuatorRule>) {
        self.rules.push(rule);
    }

    /// Run every rule over `actuators`, returning what was corrected.
    pub fn sanitize(&self, actuators: &mut Actuators) -> Vec<Correction> {
        let mut corrections = Vec::new();
        for rule in &self.rules {
            for field in rule.apply(actuators) {
                corrections.push(Correction {
                    rule: rule.name().to_string(),
                    field,
                });
            }
        }
        corrections
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Replaces non-finite fields with zero.
pub struct FiniteRule;

impl ActuatorRule for FiniteRule {
    fn name(&self) -> &str {
        "finite"
    }

    fn apply(&self, actuators: &mut Actuators) -> Vec<&'static str> {
        let mut fixed = Vec::new();
        let fields: [(&'static str, &mut f32); 4] = [
            ("accel", &mut actuators.accel),
            ("steer", &mut actuators.steer),
            ("steering_angle_deg", &mut actuators.steering_angle_deg),
            ("curvature", &mut actuators.curvature),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                *value = 0.0;
                fixed.push(name);
            }
        }
        fixed
    }
}

/// Clamps steering torque and acceleration.
pub struct RangeRule {
    pub max_steer: f32,
    pub min_accel: f32,
    pub max_accel: f32,
}

impl Default for RangeRule {
    fn default() -> Self {
        Self {
            max_steer: 1.0,
            min_accel: -4.0,
            max_accel: 2.0,
        }
    }
}

impl ActuatorRule for RangeRule {
    fn name(&self) -> &str {
        "range"
    }

    fn apply(&self, actuators: &mut Actuators) -> Vec<&'static str> {
        let mut fixed = Vec::new();
        let steer = actuators.steer.clamp(-self.max_steer, self.max_steer);
        if steer != actuators.steer {
            actuators.steer = steer;
            fixed.push("steer");
        }
        let accel = actuators.accel.clamp(self.min_accel, self.max_accel);
        if accel != actuators.accel {
            actuators.accel = accel;
            fixed.push("accel");
        }
        fixed
    }
}
