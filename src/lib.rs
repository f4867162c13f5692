mod config;
mod injection;

pub mod prelude {
    pub use crate::config::{
        Args, ConfigError, FaultConfig, FaultTypeConfig, InstTarget, RegTargetClass, SimConfig,
    };
    pub use crate::injection::clock::ClockWindow;
    pub use crate::injection::corruptor::{
        apply_mask, mask_positions, random_mask, CorruptionOutcome,
    };
    pub use crate::injection::event_log::EventLog;
    pub use crate::injection::faults::{FaultModel, ModelSelector};
    pub use crate::injection::permanent::PermanentFaultTracker;
    pub use crate::injection::record::{InjectionEvent, PermanentFaultRecord, TargetId};
    pub use crate::injection::stats::InjectionStats;
    pub use crate::injection::target::{
        AccessKind, CacheLineTarget, FaultTarget, InstKind, MemoryWordTarget, RegisterClass,
        RegisterTarget,
    };
    pub use crate::injection::FaultInjector;
}
