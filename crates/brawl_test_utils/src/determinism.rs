//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and batch statistics are only meaningful if a match is a pure
//! function of its seed, roster and manual actions. Sources of
//! non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`brawl_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The roster is kept sorted by combatant id and per-combatant maps are
//!   `BTreeMap`s.
//!
//! - **System randomness**: Decision jitter draws from a `ChaCha8Rng`
//!   seeded by the simulation seed.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (physics, collision, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full matches are reproducible
//! 4. **Parallel tests**: Running N simulations on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use brawl_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use brawl_test_utils::determinism::verify_determinism;
/// use brawl_test_utils::fixtures::duel;
///
/// let result = verify_determinism(
///     3,   // Run 3 times
///     120, // 120 ticks each
///     || duel(7, 200),
///     |sim| { sim.step(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run `setup_fn` twice for `num_ticks` and compare final state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.step();
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// or memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.step();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two simulation runs tick-by-tick, finding first divergence.
///
/// # Returns
///
/// `None` if simulations are deterministic, `Some(tick)` if they diverge
/// at that tick.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.step();
        sim2.step();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialization round-trip preserves simulation state exactly.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        sim.step();
    }

    let hash_before = sim.state_hash();

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(restored) = Simulation::deserialize(&bytes) else {
        return false;
    };

    hash_before == restored.state_hash()
}

/// Serialize a simulation after `warmup_ticks`, then step the original
/// and the restored copy side by side for `follow_ticks`.
///
/// # Returns
///
/// `None` if both stay identical, `Some(n)` if their hashes first differ
/// `n` ticks after the restore (`Some(0)` when the round-trip itself
/// loses state).
pub fn find_restore_divergence<F>(setup_fn: F, warmup_ticks: u64, follow_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut original = setup_fn();
    for _ in 0..warmup_ticks {
        original.step();
    }

    let restored = original
        .serialize()
        .ok()
        .and_then(|bytes| Simulation::deserialize(&bytes).ok());
    let Some(mut restored) = restored else {
        return Some(0);
    };
    if original.state_hash() != restored.state_hash() {
        return Some(0);
    }

    for tick in 1..=follow_ticks {
        let a = original.step();
        let b = restored.step();
        if a != b || original.state_hash() != restored.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use brawl_core::collision::Shape;
    use brawl_core::decision::{Action, BehaviorProfile, Personality};
    use brawl_core::math::{Fixed, Vec2Fixed};
    use proptest::prelude::*;

    /// A coordinate inside the default arena.
    pub fn arb_arena_coord() -> impl Strategy<Value = Fixed> {
        (300i32..980i32).prop_map(Fixed::from_num)
    }

    /// A fixed-point number in a range wide enough for any position.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-2000i32..2000i32).prop_map(Fixed::from_num)
    }

    /// A position anywhere in a wide square.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// A unit heading.
    pub fn arb_heading() -> impl Strategy<Value = Vec2Fixed> {
        (-100i32..=100i32, -100i32..=100i32)
            .prop_filter("heading needs a direction", |(x, y)| *x != 0 || *y != 0)
            .prop_map(|(x, y)| Vec2Fixed::from_ints(x, y).normalize())
    }

    /// A positive length.
    pub fn arb_extent() -> impl Strategy<Value = Fixed> {
        (1i32..150i32).prop_map(Fixed::from_num)
    }

    /// A circle.
    pub fn arb_circle() -> impl Strategy<Value = Shape> {
        (arb_vec2_position(), arb_extent())
            .prop_map(|(center, radius)| Shape::Circle { center, radius })
    }

    /// An oriented rectangle.
    pub fn arb_rect() -> impl Strategy<Value = Shape> {
        (arb_vec2_position(), arb_extent(), arb_extent(), arb_heading()).prop_map(
            |(center, hw, hh, heading)| Shape::Rect {
                center,
                half_extents: Vec2Fixed::new(hw, hh),
                heading,
            },
        )
    }

    /// Any shape.
    pub fn arb_shape() -> impl Strategy<Value = Shape> {
        prop_oneof![arb_circle(), arb_rect()]
    }

    /// Any action.
    pub fn arb_action() -> impl Strategy<Value = Action> {
        proptest::sample::select(Action::ALL.to_vec())
    }

    /// A sequence of actions.
    pub fn arb_action_sequence(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
        proptest::collection::vec(arb_action(), 0..max_len)
    }

    /// Any behavior profile.
    pub fn arb_profile() -> impl Strategy<Value = BehaviorProfile> {
        prop_oneof![
            Just(BehaviorProfile::Aggressive),
            Just(BehaviorProfile::Defensive),
            Just(BehaviorProfile::Random),
            (0u8..=10, 0u8..=10, 0u8..=10, 0u8..=10, 0u8..=10).prop_map(
                |(aggression, teamplay, risk_taking, positioning, energy_management)| {
                    BehaviorProfile::Personality(Personality {
                        aggression,
                        teamplay,
                        risk_taking,
                        positioning,
                        energy_management,
                    })
                }
            ),
        ]
    }
}
