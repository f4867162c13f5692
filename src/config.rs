use clap::Parser;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use thiserror::Error;

/// Parse hex address strings to u64 values
fn parse_hex(s: &str) -> Result<u64, String> {
    let cleaned = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(cleaned, 16).map_err(|e| format!("'{}' is not a valid hex number: {}", s, e))
}

/// Custom deserializer for addresses that can handle both hex strings and numbers
fn deserialize_addr<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => parse_hex(&s).map_err(de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom("address must be a positive integer")),
        _ => Err(de::Error::custom("address must be a string or number")),
    }
}

/// Custom deserializer for bit masks. Older configuration files carry the
/// mask as a binary string ("00000101", optional "0b" prefix), newer ones
/// as a plain number. Both are normalized to the integer form.
fn deserialize_bit_mask<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| de::Error::custom("bit mask must be a positive integer")),
        serde_json::Value::String(s) => {
            let cleaned = s.strip_prefix("0b").unwrap_or(&s);
            u64::from_str_radix(cleaned, 2)
                .map_err(|e| de::Error::custom(format!("'{}' is not a valid binary mask: {}", s, e)))
        }
        _ => Err(de::Error::custom("bit mask must be a string or number")),
    }
}

/// Type of alteration applied to the bits of a fault target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FaultTypeConfig {
    BitFlip,
    StuckAtZero,
    StuckAtOne,
    /// Pick one of the three models per event, weighted by
    /// `bitFlipProb` / `stuckAtZeroProb` / `stuckAtOneProb`.
    #[default]
    Random,
}

/// Register class filter for the register injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegTargetClass {
    Integer,
    FloatingPoint,
    #[default]
    Both,
}

/// Kind of instruction that allows an access to reach the register injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstTarget {
    #[default]
    All,
    Nop,
    Load,
    Store,
    Atomic,
    Integer,
    Floating,
    Vector,
    Control,
    Call,
    Return,
    Syscall,
}

/// Fatal configuration errors, reported once at injector construction.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),
    #[error("corruption size {0} is outside 1..=8 bytes")]
    CorruptionSizeOutOfRange(usize),
    #[error("bit mask {mask:#b} does not fit a {bits}-bit corruption unit")]
    MaskWidthMismatch { mask: u64, bits: u32 },
    #[error("tick to clock ratio must be greater than zero")]
    TickRatioZero,
    #[error("permanent fault check cadence must be at least one cycle")]
    PermanentCheckCadenceZero,
    #[error("fault model weights must not be negative")]
    NegativeModelWeight,
}

/// Configuration of one injector instance.
///
/// The field names follow the historical parameter surface
/// (`numBitsToChange`, `firstClock`, `tickToClockRatio`, ...); the legacy
/// spellings `bitsToChange`, `faultMask`, `cyclesPermamentFaultCheck`,
/// `PCTarget`, `addr_start` and `addr_end` are accepted as aliases.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaultConfig {
    /// Probability (between 0 and 1) of injecting a fault on a matching access.
    pub probability: f64,

    /// Type of alteration to apply to the target bits.
    pub fault_type: FaultTypeConfig,

    /// Number of distinct bits to corrupt when no explicit mask is given.
    /// Negative means every bit of the corruption unit.
    #[serde(alias = "bitsToChange")]
    pub num_bits_to_change: i32,

    /// Explicit bit mask; when non-zero it overrides random bit selection.
    #[serde(alias = "faultMask", deserialize_with = "deserialize_bit_mask")]
    pub bit_mask: u64,

    /// Bytes affected per injection event (the corruption unit, 1..=8).
    pub corruption_size: usize,

    /// Clock cycle after which the injector is enabled.
    pub first_clock: u64,

    /// Clock cycle after which the injector is disabled. 0 means no upper bound.
    pub last_clock: u64,

    /// Ratio between simulator ticks and clock cycles (ticks per cycle).
    pub tick_to_clock_ratio: u64,

    /// Weight of the bit-flip model for the `random` fault type.
    pub bit_flip_prob: f64,
    /// Weight of the stuck-at-zero model for the `random` fault type.
    pub stuck_at_zero_prob: f64,
    /// Weight of the stuck-at-one model for the `random` fault type.
    pub stuck_at_one_prob: f64,

    /// Cycles between periodic reapplications of permanent faults.
    #[serde(alias = "cyclesPermamentFaultCheck")]
    pub cycles_permanent_fault_check: u64,

    /// Write every injection event to the shared log file.
    pub write_log: bool,

    /// Seed of the injector's private PRNG stream. A fixed seed reproduces
    /// the identical fault sequence.
    pub seed: u64,

    /// Inject on read accesses.
    pub inject_on_read: bool,
    /// Inject on write accesses.
    pub inject_on_write: bool,

    /// Instruction kind that allows register accesses through.
    pub inst_target: InstTarget,

    /// Register class filter for the register injector.
    pub reg_target_class: RegTargetClass,

    /// Program counter value that triggers injection regardless of
    /// `instTarget`. 0 disables the PC trigger.
    #[serde(alias = "PCTarget", deserialize_with = "deserialize_addr")]
    pub pc_target: u64,

    /// Start of the address range filter for memory and cache targets.
    #[serde(alias = "addr_start", deserialize_with = "deserialize_addr")]
    pub addr_start: u64,

    /// End (exclusive) of the address range filter. 0 leaves the range open.
    #[serde(alias = "addr_end", deserialize_with = "deserialize_addr")]
    pub addr_end: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            probability: 0.0,
            fault_type: FaultTypeConfig::Random,
            num_bits_to_change: -1,
            bit_mask: 0,
            corruption_size: 1,
            first_clock: 0,
            last_clock: 0,
            tick_to_clock_ratio: 1000,
            bit_flip_prob: 0.9,
            stuck_at_zero_prob: 0.05,
            stuck_at_one_prob: 0.05,
            cycles_permanent_fault_check: 1,
            write_log: true,
            seed: 0,
            inject_on_read: true,
            inject_on_write: true,
            inst_target: InstTarget::All,
            reg_target_class: RegTargetClass::Both,
            pc_target: 0,
            addr_start: 0,
            addr_end: 0,
        }
    }
}

impl FaultConfig {
    /// Validate the configuration. Called once at injector construction;
    /// after this the runtime paths never fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::ProbabilityOutOfRange(self.probability));
        }
        if !(1..=8).contains(&self.corruption_size) {
            return Err(ConfigError::CorruptionSizeOutOfRange(self.corruption_size));
        }
        let bits = (self.corruption_size * 8) as u32;
        if bits < 64 && self.bit_mask >> bits != 0 {
            return Err(ConfigError::MaskWidthMismatch {
                mask: self.bit_mask,
                bits,
            });
        }
        if self.tick_to_clock_ratio == 0 {
            return Err(ConfigError::TickRatioZero);
        }
        if self.cycles_permanent_fault_check == 0 {
            return Err(ConfigError::PermanentCheckCadenceZero);
        }
        if self.bit_flip_prob < 0.0 || self.stuck_at_zero_prob < 0.0 || self.stuck_at_one_prob < 0.0
        {
            return Err(ConfigError::NegativeModelWeight);
        }
        Ok(())
    }

    /// Address range filter for memory and cache targets, `[addr_start,
    /// addr_end)`. `addr_end == 0` leaves the range open above.
    pub fn addr_in_range(&self, address: u64) -> bool {
        address >= self.addr_start && (self.addr_end == 0 || address < self.addr_end)
    }

    /// Bit width of the corruption unit.
    pub fn corruption_bits(&self) -> u32 {
        (self.corruption_size * 8) as u32
    }
}

/// Simulation run configuration: one optional injector per site.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimConfig {
    /// Number of simulator ticks to run.
    pub ticks: u64,
    /// Path of the shared injection log file.
    pub log_file: Option<PathBuf>,
    /// Register file injector.
    pub register: Option<FaultConfig>,
    /// Cache controller injector.
    pub cache: Option<FaultConfig>,
    /// Main memory injector.
    pub memory: Option<FaultConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: 100_000,
            log_file: None,
            register: None,
            cache: None,
            memory: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from JSON5 file
    pub fn from_file(path: &PathBuf) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        json5::from_str(&content).map_err(|e| format!("Failed to parse JSON5 config: {}", e))
    }

    /// Override config values with command line arguments
    pub fn override_with_args(&mut self, args: &Args) {
        if let Some(ticks) = args.ticks {
            self.ticks = ticks;
        }
        if let Some(path) = &args.log {
            self.log_file = Some(path.clone());
        }
        // A CLI seed overrides the seed of every configured injector
        if let Some(seed) = args.seed {
            for section in [
                self.register.as_mut(),
                self.cache.as_mut(),
                self.memory.as_mut(),
            ]
            .into_iter()
            .flatten()
            {
                section.seed = seed;
            }
        }
    }
}

/// Command line parameter structure
///
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Load configuration from JSON5 file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of simulator ticks to run
    #[arg(short, long)]
    pub ticks: Option<u64>,

    /// Override the PRNG seed of every configured injector
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Path of the injection log file
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Suppress per-event console output
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}
