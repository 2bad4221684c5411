use env_logger::{Env, Target};

/// Installs the process logger. `RUST_LOG` takes precedence over `level`.
///
/// Logs always go to stderr; a worker's stdout carries nothing but its result message.
pub fn init(level: &str) {
    let env = Env::default().default_filter_or(level.trim().to_ascii_lowercase());
    let _ = env_logger::Builder::from_env(env)
        .target(Target::Stderr)
        .format_timestamp_millis()
        .try_init();
}
