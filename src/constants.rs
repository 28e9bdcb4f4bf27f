//! # System Constants
//!
//! Constants that form persisted or externally visible contracts. The cached
//! entity state bit positions in particular are stored alongside execution
//! rows and must never be renumbered once data exists.

/// Bit positions of the execution cached entity state (1-based)
pub mod cached_state_bits {
    pub const EVENT_SUBSCRIPTIONS_STATE_BIT: u8 = 1;
    pub const TASKS_STATE_BIT: u8 = 2;
    pub const JOBS_STATE_BIT: u8 = 3;
    pub const VARIABLES_STATE_BIT: u8 = 4;
}

/// Hard ceiling on rows fetched for the process-instance-with-variables query,
/// which is paginated in memory because the variable outer join multiplies rows
pub const PROCESS_INSTANCE_VARIABLES_LIMIT: usize = 20_000;

/// Entity names used in log fields and error messages
pub mod entities {
    pub const EXECUTION: &str = "execution";
    pub const PROCESS_INSTANCE: &str = "process instance";
}

/// Table names of the PostgreSQL store
pub mod tables {
    pub const EXECUTIONS: &str = "exec_executions";
    pub const VARIABLES: &str = "exec_variables";
    pub const PROCESS_DEFINITIONS: &str = "exec_process_definitions";
}
