use log::LevelFilter;

/// Initialize logging using env_logger.
/// `level` is the default; the RUST_LOG environment variable overrides it,
/// e.g. `RUST_LOG=tunnel_core=debug tunnel-rs up home`.
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init();
}
