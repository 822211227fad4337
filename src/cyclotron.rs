use serde::Deserialize;
use std::f64::consts::PI;
use std::fmt;

/// Physical inputs of the simulation. Loaded from `parameters.json`;
/// any missing field falls back to the reference scenario below.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Inputs {
    /// Particle charge in Coulombs.
    pub charge: f64,
    /// Particle mass in kilograms.
    pub mass: f64,
    /// Out-of-plane magnetic field in Tesla; the sign picks the rotation direction.
    pub b_field: f64,
    /// Accelerating potential in Volts, applied once before injection.
    pub voltage: f64,
    /// Radius of the reference orbit in meters.
    pub radius: f64,
    /// Euler integration step in seconds.
    pub time_step: f64,
    /// Number of points sampled over one period of the reference orbit.
    pub samples: usize,
}

impl Default for Inputs {
    fn default() -> Self {
        Inputs {
            charge: 1.6e-19,
            mass: 1.67e-27,
            b_field: 1.2,
            voltage: 1e6,
            radius: 1.0,
            time_step: 1e-9,
            samples: 100,
        }
    }
}

/// A physical input that would produce a degenerate trajectory or a
/// NaN/infinite integration step.
#[derive(Clone, Debug, PartialEq)]
pub enum DomainError {
    /// Charge must be finite and strictly positive.
    InvalidCharge(f64),
    /// Mass must be finite and strictly positive.
    InvalidMass(f64),
    /// A zero (or non-finite) field has no cyclotron period.
    InvalidField(f64),
    /// Voltage must be finite and non-negative.
    InvalidVoltage(f64),
    /// Orbit radius must be finite and strictly positive.
    InvalidRadius(f64),
    /// Time step must be finite and strictly positive.
    InvalidTimeStep(f64),
    /// At least two samples are needed to trace an orbit.
    TooFewSamples(usize),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::InvalidCharge(q) => {
                write!(f, "charge must be finite and positive, got {} C", q)
            }
            DomainError::InvalidMass(m) => {
                write!(f, "mass must be finite and positive, got {} kg", m)
            }
            DomainError::InvalidField(b) => {
                write!(f, "field must be finite and non-zero, got {} T", b)
            }
            DomainError::InvalidVoltage(v) => {
                write!(f, "voltage must be finite and non-negative, got {} V", v)
            }
            DomainError::InvalidRadius(r) => {
                write!(f, "orbit radius must be finite and positive, got {} m", r)
            }
            DomainError::InvalidTimeStep(dt) => {
                write!(f, "time step must be finite and positive, got {} s", dt)
            }
            DomainError::TooFewSamples(n) => {
                write!(f, "at least 2 orbit samples are needed, got {}", n)
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Validated inputs plus the scalars derived from them. Built once per
/// configuration; the engine only ever reads it.
#[derive(Clone, Debug)]
pub struct Physics {
    pub charge: f64,
    pub mass: f64,
    pub b_field: f64,
    pub voltage: f64,
    pub radius: f64,
    pub time_step: f64,
    /// Injection speed from the accelerating gap, sqrt(2qV/m).
    pub speed: f64,
    /// Cyclotron angular frequency qB/m; negative for a negative field.
    pub omega: f64,
    /// One revolution, 2*pi/omega. Carries the sign of omega.
    pub period: f64,
}

impl Physics {
    pub fn new(inputs: &Inputs) -> Result<Physics, DomainError> {
        if !inputs.charge.is_finite() || inputs.charge <= 0.0 {
            return Err(DomainError::InvalidCharge(inputs.charge));
        }
        if !inputs.mass.is_finite() || inputs.mass <= 0.0 {
            return Err(DomainError::InvalidMass(inputs.mass));
        }
        if !inputs.b_field.is_finite() || inputs.b_field == 0.0 {
            return Err(DomainError::InvalidField(inputs.b_field));
        }
        if !inputs.voltage.is_finite() || inputs.voltage < 0.0 {
            return Err(DomainError::InvalidVoltage(inputs.voltage));
        }
        if !inputs.radius.is_finite() || inputs.radius <= 0.0 {
            return Err(DomainError::InvalidRadius(inputs.radius));
        }
        if !inputs.time_step.is_finite() || inputs.time_step <= 0.0 {
            return Err(DomainError::InvalidTimeStep(inputs.time_step));
        }
        if inputs.samples < 2 {
            return Err(DomainError::TooFewSamples(inputs.samples));
        }

        Ok(Physics::derive(inputs))
    }

    // scalar derivation, shared with the known-valid default scenario
    fn derive(inputs: &Inputs) -> Physics {
        let speed = (2.0 * inputs.charge * inputs.voltage / inputs.mass).sqrt();
        let omega = inputs.charge * inputs.b_field / inputs.mass;

        Physics {
            charge: inputs.charge,
            mass: inputs.mass,
            b_field: inputs.b_field,
            voltage: inputs.voltage,
            radius: inputs.radius,
            time_step: inputs.time_step,
            speed,
            omega,
            period: 2.0 * PI / omega,
        }
    }

    /// Half-width of the square display region, 1.2x the orbit radius.
    pub fn view_extent(&self) -> f64 {
        1.2 * self.radius
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// One Euler step of the reduced Lorentz force: only vx couples to the
/// field, producing a y-directed force. The position moves with the
/// already-updated velocity.
fn euler_step(particle: &mut Particle, charge: f64, b_field: f64, mass: f64, dt: f64) {
    let force_y = charge * b_field * particle.vx;
    particle.vy += force_y / mass * dt;
    particle.x += particle.vx * dt;
    particle.y += particle.vy * dt;
}

/// Owns the particle collection and advances it one frame at a time.
/// Index 0 is the reference particle and follows the precomputed orbit;
/// every later particle was spawned by the user and is integrated.
pub struct Engine {
    physics: Physics,
    orbit: Vec<[f64; 2]>,
    particles: Vec<Particle>,
}

impl Default for Engine {
    /// The reference scenario; its inputs always validate.
    fn default() -> Self {
        let inputs = Inputs::default();
        Engine::with_physics(Physics::derive(&inputs), inputs.samples)
    }
}

impl Engine {
    pub fn new(inputs: &Inputs) -> Result<Engine, DomainError> {
        let physics = Physics::new(inputs)?;
        Ok(Engine::with_physics(physics, inputs.samples))
    }

    fn with_physics(physics: Physics, samples: usize) -> Engine {
        // samples over [0, period), so index (frame % samples) wraps cleanly;
        // the signed omega below keeps the rotation direction of the field
        let orbit: Vec<[f64; 2]> = (0..samples)
            .map(|k| {
                let t = physics.period.abs() * k as f64 / samples as f64;
                let angle = physics.omega * t;
                [physics.radius * angle.cos(), physics.radius * angle.sin()]
            })
            .collect();

        let reference = Particle {
            x: orbit[0][0],
            y: orbit[0][1],
            vx: physics.speed,
            vy: 0.0,
        };

        Engine {
            physics,
            orbit,
            particles: vec![reference],
        }
    }

    pub fn physics(&self) -> &Physics {
        &self.physics
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn samples(&self) -> usize {
        self.orbit.len()
    }

    /// Advance every particle by one frame and return the updated
    /// collection. The reference particle is a pure table lookup;
    /// spawned particles get one Euler step each.
    pub fn advance_frame(&mut self, frame: usize) -> &[Particle] {
        let [x, y] = self.orbit[frame % self.orbit.len()];
        self.particles[0].x = x;
        self.particles[0].y = y;

        let charge = self.physics.charge;
        let b_field = self.physics.b_field;
        let mass = self.physics.mass;
        let time_step = self.physics.time_step;

        for particle in &mut self.particles[1..] {
            euler_step(particle, charge, b_field, mass, time_step);
        }

        &self.particles
    }

    /// Append a particle at the given position, moving with the same
    /// initial velocity as the reference particle. Clicks that carry no
    /// usable coordinates are dropped; returns whether a particle was added.
    pub fn spawn(&mut self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        self.particles.push(Particle {
            x,
            y,
            vx: self.physics.speed,
            vy: 0.0,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn engine() -> Engine {
        Engine::new(&Inputs::default()).unwrap()
    }

    #[test]
    fn derived_scalars_match_reference_scenario() {
        let physics = Physics::new(&Inputs::default()).unwrap();
        // proton at 1 MV in a 1.2 T field
        assert_relative_eq!(physics.speed, 1.384e7, max_relative = 1e-3);
        assert_relative_eq!(physics.omega, 1.1497e8, max_relative = 1e-3);
        assert_relative_eq!(physics.period, 5.465e-8, max_relative = 1e-3);
    }

    #[test]
    fn omega_is_exactly_charge_field_over_mass() {
        let inputs = Inputs {
            charge: 3.0,
            mass: 2.0,
            b_field: 5.0,
            ..Inputs::default()
        };
        let physics = Physics::new(&inputs).unwrap();
        assert_eq!(physics.omega, 3.0 * 5.0 / 2.0);
        assert_relative_eq!(physics.period, 2.0 * PI / 7.5);
    }

    #[test]
    fn orbit_points_lie_on_the_circle() {
        let engine = engine();
        let radius = engine.physics().radius;
        for point in &engine.orbit {
            assert_relative_eq!(
                point[0] * point[0] + point[1] * point[1],
                radius * radius,
                max_relative = 1e-12
            );
        }
    }

    #[test]
    fn orbit_wraps_after_one_period() {
        let mut engine = engine();
        let samples = engine.samples();

        engine.advance_frame(0);
        let first = (engine.particles()[0].x, engine.particles()[0].y);

        engine.advance_frame(samples);
        let wrapped = (engine.particles()[0].x, engine.particles()[0].y);

        assert_eq!(first, wrapped);
    }

    #[test]
    fn reference_lookup_is_idempotent() {
        let mut engine = engine();

        engine.advance_frame(5);
        let once = (engine.particles()[0].x, engine.particles()[0].y);

        engine.advance_frame(5);
        let twice = (engine.particles()[0].x, engine.particles()[0].y);

        assert_eq!(once, twice);
    }

    #[test]
    fn zero_field_step_moves_in_a_straight_line() {
        let mut particle = Particle {
            x: 0.25,
            y: -0.5,
            vx: 3.0,
            vy: -2.0,
        };
        let dt = 0.125;

        for _ in 0..40 {
            euler_step(&mut particle, 1.6e-19, 0.0, 1.67e-27, dt);
        }

        assert_relative_eq!(particle.vx, 3.0);
        assert_relative_eq!(particle.vy, -2.0);
        assert_relative_eq!(particle.x, 0.25 + 40.0 * dt * 3.0, max_relative = 1e-12);
        assert_relative_eq!(particle.y, -0.5 + 40.0 * dt * -2.0, max_relative = 1e-12);
    }

    #[test]
    fn reduced_force_only_couples_vx_into_vy() {
        let mut particle = Particle {
            x: 0.0,
            y: 0.0,
            vx: 2.0,
            vy: 0.0,
        };
        let (q, b, m, dt) = (2.0, 3.0, 4.0, 0.5);

        euler_step(&mut particle, q, b, m, dt);

        let expected_vy = q * b * 2.0 / m * dt;
        assert_relative_eq!(particle.vx, 2.0);
        assert_relative_eq!(particle.vy, expected_vy);
        assert_relative_eq!(particle.x, 2.0 * dt);
        assert_relative_eq!(particle.y, expected_vy * dt);
    }

    #[test]
    fn advance_frame_steps_spawned_particles() {
        let mut engine = engine();
        let physics = engine.physics().clone();
        assert!(engine.spawn(0.5, 0.5));

        engine.advance_frame(1);

        // the reference particle is a pure lookup
        let reference = engine.particles()[0];
        assert_eq!((reference.x, reference.y), (engine.orbit[1][0], engine.orbit[1][1]));

        // the spawned particle gets one reduced-force Euler step, with the
        // position moved by the already-updated velocity
        let dt = physics.time_step;
        let expected_vy = physics.charge * physics.b_field * physics.speed / physics.mass * dt;
        let spawned = engine.particles()[1];
        assert_relative_eq!(spawned.vx, physics.speed);
        assert_relative_eq!(spawned.vy, expected_vy);
        assert_relative_eq!(spawned.x, 0.5 + physics.speed * dt);
        assert_relative_eq!(spawned.y, 0.5 + expected_vy * dt);
    }

    #[test]
    fn spawn_appends_one_particle_and_leaves_the_rest_alone() {
        let mut engine = engine();
        let speed = engine.physics().speed;
        let reference_before = engine.particles()[0];

        assert!(engine.spawn(0.5, 0.5));

        assert_eq!(engine.particle_count(), 2);
        let spawned = engine.particles()[1];
        assert_eq!((spawned.x, spawned.y), (0.5, 0.5));
        assert_eq!((spawned.vx, spawned.vy), (speed, 0.0));

        let reference_after = engine.particles()[0];
        assert_eq!(reference_before.x, reference_after.x);
        assert_eq!(reference_before.y, reference_after.y);
    }

    #[test]
    fn spawn_rejects_clicks_without_coordinates() {
        let mut engine = engine();
        assert!(!engine.spawn(f64::NAN, 0.0));
        assert!(!engine.spawn(0.0, f64::INFINITY));
        assert_eq!(engine.particle_count(), 1);
    }

    #[test]
    fn degenerate_inputs_fail_fast() {
        let cases = vec![
            (
                Inputs {
                    charge: 0.0,
                    ..Inputs::default()
                },
                DomainError::InvalidCharge(0.0),
            ),
            (
                Inputs {
                    mass: 0.0,
                    ..Inputs::default()
                },
                DomainError::InvalidMass(0.0),
            ),
            (
                Inputs {
                    b_field: 0.0,
                    ..Inputs::default()
                },
                DomainError::InvalidField(0.0),
            ),
            (
                Inputs {
                    voltage: -1.0,
                    ..Inputs::default()
                },
                DomainError::InvalidVoltage(-1.0),
            ),
            (
                Inputs {
                    radius: -2.0,
                    ..Inputs::default()
                },
                DomainError::InvalidRadius(-2.0),
            ),
            (
                Inputs {
                    time_step: 0.0,
                    ..Inputs::default()
                },
                DomainError::InvalidTimeStep(0.0),
            ),
            (
                Inputs {
                    samples: 1,
                    ..Inputs::default()
                },
                DomainError::TooFewSamples(1),
            ),
        ];

        for (inputs, expected) in cases {
            assert_eq!(Physics::new(&inputs).unwrap_err(), expected);
        }
    }

    #[test]
    fn negative_field_reverses_the_rotation() {
        let reversed = Inputs {
            b_field: -1.2,
            ..Inputs::default()
        };
        let mut engine = Engine::new(&reversed).unwrap();
        assert!(engine.physics().omega < 0.0);

        // one step along the orbit should move clockwise: y goes negative
        engine.advance_frame(1);
        assert!(engine.particles()[0].y < 0.0);
    }

    #[test]
    fn default_engine_matches_validated_construction() {
        let default = Engine::default();
        let validated = Engine::new(&Inputs::default()).unwrap();

        assert_eq!(default.physics().speed, validated.physics().speed);
        assert_eq!(default.physics().omega, validated.physics().omega);
        assert_eq!(default.samples(), validated.samples());
        assert_eq!(default.particle_count(), 1);
        assert_eq!(
            (default.particles()[0].x, default.particles()[0].y),
            (validated.particles()[0].x, validated.particles()[0].y)
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let inputs: Inputs = serde_json::from_str(r#"{ "b_field": 2.4 }"#).unwrap();
        assert_eq!(inputs.b_field, 2.4);
        assert_eq!(inputs.charge, Inputs::default().charge);
        assert_eq!(inputs.samples, 100);
    }
}
