// config.rs - Generator and simulator settings

/// Code generation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenConfig {
    /// Width of every datapath register, including the return register
    pub data_width: u32,
    /// Width of the FSM state register
    pub state_width: u32,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            data_width: 32,
            state_width: 32,
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// Give up if the finish flag is not raised after this many clock edges
    pub max_cycles: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig { max_cycles: 10_000 }
    }
}
