//! Environment readiness check.

use super::output;
use crate::config::{DeployMode, ExtractorConfig};
use crate::renderer::chromium::{launch_args, ChromiumLauncher};
use crate::renderer::BrowserLauncher;
use anyhow::Result;
use std::process::Command;
use std::time::Instant;

/// Check browser availability, deploy mode and available memory.
///
/// With `launch`, also start and stop the browser once.
pub async fn run(config: &ExtractorConfig, launch: bool) -> Result<()> {
    let launcher = ChromiumLauncher::from_config(config);
    let executable = launcher.executable();
    let mem_mb = get_available_memory_mb();

    let remote = launcher.remote().map(str::to_string);
    let ready = executable.is_some() || remote.is_some();

    let launch_result = if launch && ready {
        let started = Instant::now();
        let outcome = match launcher.launch().await {
            Ok(browser) => browser.shutdown().await.map(|_| started.elapsed().as_millis()),
            Err(e) => Err(e),
        };
        Some(outcome)
    } else {
        None
    };

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "deploy_mode": format!("{:?}", config.deploy_mode),
            "chromium": executable.as_ref().map(|p| p.display().to_string()),
            "remote_browser": remote,
            "available_memory_mb": mem_mb,
            "launch_ms": launch_result.as_ref().and_then(|r| r.as_ref().ok()),
            "launch_error": launch_result.as_ref().and_then(|r| r.as_ref().err()).map(|e| format!("{e:#}")),
            "ready": ready,
        }));
        return Ok(());
    }

    println!("Pitchkit Doctor");
    println!("===============");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!("Mode: {:?} ({})", config.deploy_mode, launch_args(config.deploy_mode).join(" "));
    println!();

    if let Some(ws_url) = &remote {
        println!("[OK] Remote browser: {ws_url}");
    }
    match &executable {
        Some(path) => println!("[OK] Browser found: {}", path.display()),
        None => match config.deploy_mode {
            DeployMode::Serverless => println!(
                "[!!] Headless shell NOT found. Set PITCHKIT_CHROMIUM_PATH to the bundled binary."
            ),
            DeployMode::Local => println!(
                "[!!] Chromium NOT found. Install Google Chrome or set PITCHKIT_CHROMIUM_PATH."
            ),
        },
    }

    match mem_mb {
        Some(mb) if mb >= 256 => println!("[OK] Available memory: {mb}MB (>= 256MB required)"),
        Some(mb) => println!("[!!] Available memory: {mb}MB (< 256MB, may be insufficient)"),
        None => println!("[??] Could not determine available memory"),
    }

    match &launch_result {
        Some(Ok(ms)) => println!("[OK] Browser launched and closed in {ms}ms"),
        Some(Err(e)) => println!("[!!] Browser launch failed: {e:#}"),
        None => {}
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: STATIC ONLY");
        println!("  Pages that need rendering will fall back to their static HTML.");
    }

    Ok(())
}

/// Get available memory in MB (platform-specific).
fn get_available_memory_mb() -> Option<u64> {
    #[cfg(target_os = "macos")]
    {
        let output = Command::new("sysctl")
            .args(["-n", "hw.memsize"])
            .output()
            .ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        let bytes: u64 = s.trim().parse().ok()?;
        Some(bytes / 1_048_576)
    }
    #[cfg(target_os = "linux")]
    {
        let output = Command::new("free").args(["-m"]).output().ok()?;
        let s = String::from_utf8_lossy(&output.stdout);
        s.lines()
            .find(|line| line.starts_with("Mem:"))
            .and_then(|line| line.split_whitespace().nth(6))
            .and_then(|avail| avail.parse().ok())
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
