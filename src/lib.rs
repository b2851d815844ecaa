pub mod automation;
pub mod batch;
pub mod boards;
pub mod browser;
pub mod core;
pub mod storage;

// --- Primary core exports ---
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::AutomationEngine;
pub use self::core::AutomationError;

pub use self::batch::BatchManager;
pub use self::boards::{
    BoardRegistry, CaptchaLikelihood, JobBoardProfile, LocatorStrategy, NavigationStyle,
    RateLimit, SelectorSet, StrategyKind, GENERIC_BOARD_ID,
};
pub use self::browser::{BrowserDriver, DriverError, ElementInfo};
pub use self::storage::{JobStore, MemoryJobStore, StoreError};
