pub struct DefaultsConfig {
    pub run_dir: &'static str,
    pub optimizer_mode: &'static str,
    pub charge: i32,
    pub spin: u32,
    pub irc_enabled: bool,
    pub single_point_enabled: bool,
    pub profiling: bool,
    pub snapshot_interval_steps: i64,
    pub snapshot_mode: &'static str,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            run_dir: "dftflow-run",
            optimizer_mode: "minimum",
            charge: 0,
            spin: 0,
            irc_enabled: false,
            single_point_enabled: false,
            profiling: false,
            snapshot_interval_steps: 1,
            snapshot_mode: "all",
        }
    }
}
