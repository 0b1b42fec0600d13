use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "MPS_HOST",
        "MPS_PORT",
        "MPS_DATABASE_URL",
        "MPS_RUN_MIGRATIONS",
        "MPS_INSTANCE_ID",
        "MPS_SWEEP_INTERVAL_SECS",
        "MPS_REMINDER_LEASE_SECS",
        "MPS_SWEEP_BATCH_SIZE",
        "MPS_DELIVERY_CONCURRENCY",
        "MPS_DELIVERY_TIMEOUT_SECS",
        "MPS_STORE_RETRY_ATTEMPTS",
        "MPS_STORE_RETRY_BASE_MS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    });
    let webhook = if env::var("MPS_NOTIFY_WEBHOOK_URL").is_ok() { "Set" } else { "Not set" };
    println!("  {:<35} {webhook:<15}", "MPS_NOTIFY_WEBHOOK_URL");
}
