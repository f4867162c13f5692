use clap::Parser;
use colored::Colorize;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fault_injector::prelude::*;

const MEMORY_SIZE: usize = 0x1_0000;
const WORD_SIZE: usize = 4;
const CACHE_BLOCKS: usize = 16;
const BLOCK_SIZE: usize = 64;

/// A toy machine standing in for the host simulator: an integer register
/// file, a small direct-mapped cache and a flat memory.
struct Machine {
    int_regs: [u64; 16],
    memory: Vec<u8>,
    cache: Vec<CacheBlock>,
}

struct CacheBlock {
    address: u64,
    data: [u8; BLOCK_SIZE],
}

impl Machine {
    fn new() -> Self {
        let cache = (0..CACHE_BLOCKS)
            .map(|index| CacheBlock {
                address: (index * BLOCK_SIZE) as u64,
                data: [0; BLOCK_SIZE],
            })
            .collect();
        Self {
            int_regs: [0; 16],
            memory: vec![0; MEMORY_SIZE],
            cache,
        }
    }
}

/// Built-in demo setup used when no config file is given: a transient
/// bit-flip injector on the register file, a mixed-model injector on the
/// cache and a stuck-at-one injector on memory.
fn demo_config() -> SimConfig {
    SimConfig {
        ticks: 100_000,
        register: Some(FaultConfig {
            probability: 0.001,
            fault_type: FaultTypeConfig::BitFlip,
            num_bits_to_change: 1,
            corruption_size: 4,
            tick_to_clock_ratio: 10,
            seed: 1,
            ..Default::default()
        }),
        cache: Some(FaultConfig {
            probability: 0.0005,
            fault_type: FaultTypeConfig::Random,
            num_bits_to_change: 2,
            corruption_size: 1,
            tick_to_clock_ratio: 10,
            seed: 2,
            ..Default::default()
        }),
        memory: Some(FaultConfig {
            probability: 0.0002,
            fault_type: FaultTypeConfig::StuckAtOne,
            num_bits_to_change: 1,
            corruption_size: 1,
            tick_to_clock_ratio: 10,
            cycles_permanent_fault_check: 100,
            seed: 3,
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Program to exercise the fault injection engine against a toy machine
///
fn main() -> Result<(), String> {
    // Get parameter from command line
    let args = Args::parse();
    env_logger::init(); // Switch on with: RUST_LOG=debug cargo run

    println!("--- Probabilistic fault injection demo ---\n");

    let mut sim_config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => demo_config(),
    };
    sim_config.override_with_args(&args);

    // One shared log for the whole run, opened once and closed at teardown
    let wants_log = [&sim_config.register, &sim_config.cache, &sim_config.memory]
        .iter()
        .any(|section| section.as_ref().map_or(false, |config| config.write_log));
    let event_log = if wants_log {
        let path = sim_config
            .log_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("fault_injections.log"));
        println!("Writing injection log to {}\n", path.display());
        Some(Arc::new(Mutex::new(EventLog::create(&path).map_err(
            |e| format!("Could not open log file {}: {}", path.display(), e),
        )?)))
    } else {
        None
    };

    let mut reg_injector = build_injector(&sim_config.register, &event_log)?;
    let mut cache_injector = build_injector(&sim_config.cache, &event_log)?;
    let mut mem_injector = build_injector(&sim_config.memory, &event_log)?;

    let mut machine = Machine::new();
    // Deterministic synthetic traffic, on a stream separate from the injectors
    let mut traffic = ChaCha8Rng::seed_from_u64(args.seed.unwrap_or(42) ^ 0x5EED);
    let mut events: u64 = 0;

    for tick in 0..sim_config.ticks {
        // Register file access
        if let Some(injector) = reg_injector.as_mut() {
            let index = traffic.gen_range(0..16);
            let pc = 0x8000_0000u64 + tick * 4;
            let kind = [
                InstKind::Integer,
                InstKind::Load,
                InstKind::Store,
                InstKind::Control,
            ][traffic.gen_range(0..4)];
            let direction = if traffic.gen_bool(0.5) {
                AccessKind::Read
            } else {
                AccessKind::Write
            };
            let mut target =
                RegisterTarget::new(&mut machine.int_regs[index], RegisterClass::Integer, index as u16)
                    .with_context(pc, kind);
            if let Some(event) = injector.notify_access(&mut target, tick, direction) {
                report_event(&event, args.quiet);
                events += 1;
            }
        }

        // Cache block access
        if let Some(injector) = cache_injector.as_mut() {
            let block = &mut machine.cache[traffic.gen_range(0..CACHE_BLOCKS)];
            let offset = traffic.gen_range(0..BLOCK_SIZE - 8);
            let mut target = CacheLineTarget::new(block.address, offset, &mut block.data);
            if let Some(event) = injector.notify_access(&mut target, tick, AccessKind::Read) {
                report_event(&event, args.quiet);
                events += 1;
            }
        }

        // Memory word access (word aligned)
        if let Some(injector) = mem_injector.as_mut() {
            let address = (traffic.gen_range(0..MEMORY_SIZE / WORD_SIZE) * WORD_SIZE) as u64;
            let word = &mut machine.memory[address as usize..address as usize + WORD_SIZE];
            let mut target = MemoryWordTarget::new(address, word);
            if let Some(event) = injector.notify_access(&mut target, tick, AccessKind::Write) {
                report_event(&event, args.quiet);
                events += 1;
            }
        }

        // Periodic reapplication of standing faults
        if let Some(injector) = reg_injector.as_mut() {
            if injector.permanent_check_due(tick) {
                for (index, value) in machine.int_regs.iter_mut().enumerate() {
                    let mut target =
                        RegisterTarget::new(value, RegisterClass::Integer, index as u16);
                    injector.reapply_permanent(&mut target);
                }
            }
        }
        if let Some(injector) = cache_injector.as_mut() {
            if injector.permanent_check_due(tick) {
                let windows: Vec<(u64, u32)> = injector
                    .permanent_records()
                    .iter()
                    .filter_map(|record| match record.target {
                        TargetId::CacheBlock { address, offset } => Some((address, offset)),
                        _ => None,
                    })
                    .collect();
                for (address, offset) in windows {
                    if let Some(block) =
                        machine.cache.iter_mut().find(|block| block.address == address)
                    {
                        let mut target =
                            CacheLineTarget::new(address, offset as usize, &mut block.data);
                        injector.reapply_permanent(&mut target);
                    }
                }
            }
        }
        if let Some(injector) = mem_injector.as_mut() {
            if injector.permanent_check_due(tick) {
                let addresses: Vec<u64> = injector
                    .permanent_records()
                    .iter()
                    .filter_map(|record| match record.target {
                        TargetId::Memory { address } => Some(address),
                        _ => None,
                    })
                    .collect();
                for address in addresses {
                    let start = address as usize;
                    if start + WORD_SIZE > machine.memory.len() {
                        continue;
                    }
                    let word = &mut machine.memory[start..start + WORD_SIZE];
                    let mut target = MemoryWordTarget::new(address, word);
                    injector.reapply_permanent(&mut target);
                }
            }
        }
    }

    println!("\n{}", "Injection summary:".bold());
    print_stats("register", reg_injector.as_ref());
    print_stats("cache", cache_injector.as_ref());
    print_stats("memory", mem_injector.as_ref());
    println!("\nOverall events recorded: {}", events);

    Ok(())
}

fn build_injector(
    config: &Option<FaultConfig>,
    event_log: &Option<Arc<Mutex<EventLog>>>,
) -> Result<Option<FaultInjector>, String> {
    match config {
        Some(config) => FaultInjector::new(config.clone(), event_log.clone())
            .map(Some)
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

fn report_event(event: &InjectionEvent, quiet: bool) {
    if !quiet {
        println!("{}", event.log_line());
    }
}

fn print_stats(name: &str, injector: Option<&FaultInjector>) {
    let Some(injector) = injector else {
        println!("  {:<10} {}", name, "disabled".dimmed());
        return;
    };
    let stats = injector.stats();
    let line = format!(
        "{} faults ({} bit flips, {} stuck-at-0, {} stuck-at-1, {} permanent)",
        stats.faults_injected,
        stats.bit_flips,
        stats.stuck_at_zero,
        stats.stuck_at_one,
        stats.permanent_faults,
    );
    let line = if stats.faults_injected > 0 {
        line.red()
    } else {
        line.green()
    };
    println!("  {:<10} {}", name.bold(), line);
}
