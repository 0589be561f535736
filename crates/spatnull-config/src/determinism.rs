use rand::{rngs::StdRng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Process-wide seeding policy for the permutation and randomization engines.
#[derive(Clone, Debug)]
pub struct DeterminismConfig {
    /// Whether unseeded calls should derive their seed from `base_seed`.
    pub enabled: bool,
    /// Base seed used to derive per-component seeds.
    pub base_seed: u64,
    /// If true, null-distribution reductions run sequentially.
    pub fix_reduction: bool,
}

fn flag(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "True" | "on" | "ON")
}

impl DeterminismConfig {
    /// Builds a configuration snapshot from environment variables.
    fn from_env() -> Self {
        let enabled = std::env::var("SPATNULL_DETERMINISTIC")
            .ok()
            .map(|v| !matches!(v.as_str(), "0" | "false" | "False" | "off" | "OFF"))
            .unwrap_or(false);

        let base_seed = std::env::var("SPATNULL_DETERMINISTIC_SEED")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(42);

        let fix_reduction = std::env::var("SPATNULL_DETERMINISTIC_REDUCTION")
            .ok()
            .map(|v| flag(v.as_str()))
            .unwrap_or(enabled);

        Self {
            enabled,
            base_seed,
            fix_reduction,
        }
    }

    /// Derives a stable seed for a component label.
    pub fn seed_for<L: Hash>(&self, label: L) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.base_seed.hash(&mut hasher);
        label.hash(&mut hasher);
        hasher.finish()
    }
}

static CONFIG: OnceLock<DeterminismConfig> = OnceLock::new();

/// Returns the lazily initialised configuration.
pub fn config() -> &'static DeterminismConfig {
    CONFIG.get_or_init(|| {
        let cfg = DeterminismConfig::from_env();
        apply_process_hints(&cfg);
        cfg
    })
}

fn apply_process_hints(cfg: &DeterminismConfig) {
    if cfg.enabled && cfg.fix_reduction {
        // Only effective if no rayon pool has been built yet.
        std::env::set_var("RAYON_NUM_THREADS", "1");
    }
}

/// Returns an RNG derived from `label`, or from OS entropy when determinism is off.
pub fn rng_from_label(label: &str) -> StdRng {
    let cfg = config();
    if cfg.enabled {
        StdRng::seed_from_u64(cfg.seed_for(label))
    } else {
        StdRng::from_entropy()
    }
}

/// Explicit seeds always win; otherwise falls back to [`rng_from_label`].
pub fn rng_from_optional(seed: Option<u64>, label: &str) -> StdRng {
    match seed {
        Some(value) => StdRng::seed_from_u64(value),
        None => rng_from_label(label),
    }
}

/// Returns whether reductions over permutation columns must run sequentially.
pub fn lock_reduction_order() -> bool {
    config().enabled && config().fix_reduction
}
