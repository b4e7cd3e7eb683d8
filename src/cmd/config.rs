//! Configuration validation: `maintainer check-config`.

use std::path::Path;

use anyhow::{Context, Result};

use maintainer::config::{DEFAULT_CONFIG_FILE, MaintainerConfig};

pub fn cmd_check_config(config: &MaintainerConfig, explicit: Option<&Path>) -> Result<()> {
    config.validate().context("Configuration is incomplete")?;

    let source = match explicit {
        Some(path) => path.display().to_string(),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => DEFAULT_CONFIG_FILE.to_string(),
        None => "(built-in defaults)".to_string(),
    };

    println!();
    println!("Maintainer Configuration");
    println!("========================");
    println!();
    println!("Config file: {}", source);
    println!();
    println!("[github]");
    println!("  api_url = \"{}\"", config.github.api_url);
    println!("  user = \"{}\"", config.user()?);
    println!("  token = <set>");
    println!();
    println!("[git]");
    println!("  branch = \"{}\"", config.git.branch);
    match &config.git.base_branch {
        Some(base) => println!("  base_branch = \"{}\"", base),
        None => println!("  base_branch = (upstream default)"),
    }
    println!("  commit_message = \"{}\"", config.git.commit_message);
    println!(
        "  author = \"{} <{}>\"",
        config.git.author_name, config.git.author_email
    );
    println!("  command_timeout_secs = {}", config.git.command_timeout_secs);
    if !config.git.config.is_empty() {
        let keys: Vec<&str> = config.git.config.keys().map(String::as_str).collect();
        println!("  config = [{}]", keys.join(", "));
    }
    println!();
    println!("[fix_engine]");
    println!("  program = \"{}\"", config.fix_engine.program);
    println!("  image = \"{}\"", config.fix_engine.image);
    println!("  prebuilt = {}", config.fix_engine.prebuilt);
    match &config.fix_engine.build_context {
        Some(ctx) => println!("  build_context = \"{}\"", ctx.display()),
        None => println!("  build_context = (working tree)"),
    }
    println!("  mount_path = \"{}\"", config.fix_engine.mount_path);
    println!("  timeout_secs = {}", config.fix_engine.timeout_secs);
    if !config.fix_engine.env.is_empty() {
        let keys: Vec<&str> = config.fix_engine.env.keys().map(String::as_str).collect();
        println!("  env = [{}]", keys.join(", "));
    }
    println!();
    println!("[workspace]");
    println!("  root = \"{}\"", config.workspace.root.display());
    println!("  retain = {}", config.workspace.retain);
    println!();
    println!("[server]");
    println!("  listen = {}:{}", config.server.host, config.server.port);
    println!();
    println!("Configuration OK");

    Ok(())
}
