// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Result};
use build_util::{flags_expr, MemoryConfig};
use serde::Deserialize;

/// Names accepted in `bringup.power-domains`, as they appear in `app.toml`.
const POWER_DOMAINS: &[&str] = &[
    "sys",
    "proc0",
    "proc1",
    "sio",
    "vreg-and-chip-reset",
    "xip",
    "sram",
];

/// Names accepted in `bringup.resets`.
const RESETS: &[&str] = &["dma", "trng", "syscfg"];

/// The Pico 2 brings out GPIO 0 through 29.
const GPIO_COUNT: u8 = 30;

/// SysTick's reload register is 24 bits wide.
const SYST_RELOAD_MAX: u64 = 0x00FF_FFFF;

/// This represents our _subset_ of the app config and _must not_ be marked
/// with `deny_unknown_fields`!
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AppConfig {
    memory: MemoryConfig,
    bringup: BringupConfig,
    core0: Core0Config,
    core1: Core1Config,
    clocks: ClocksConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct BringupConfig {
    power_domains: Vec<String>,
    resets: Vec<String>,
    stabilization_spins: u32,
    /// Bounds every boot path wait when present. Absent means wait forever.
    wait_polls: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Core0Config {
    led_pin: u8,
    indication_spins: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct Core1Config {
    launch_attempts: u32,
    launch_response_polls: u32,
    tick_ms: u32,
    heartbeat_divider: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct ClocksConfig {
    rosc_cycles_per_ms: u32,
    pll_cycles_per_ms: u32,
}

fn main() -> Result<()> {
    let config: AppConfig = build_util::app_config()?;
    check(&config)?;

    build_util::write_linker_script(&config.memory)?;

    let out = build_util::out_dir()?;
    std::fs::write(out.join("config.rs"), generate(&config)?)?;

    Ok(())
}

fn check(config: &AppConfig) -> Result<()> {
    for name in &config.bringup.power_domains {
        if !POWER_DOMAINS.contains(&name.as_str()) {
            bail!(
                "unknown power domain {name:?}; expected one of \
                 {POWER_DOMAINS:?}"
            );
        }
    }
    for name in &config.bringup.resets {
        if !RESETS.contains(&name.as_str()) {
            bail!("unknown reset {name:?}; expected one of {RESETS:?}");
        }
    }
    if config.core0.led_pin >= GPIO_COUNT {
        bail!("led-pin {} is not a GPIO on this board", config.core0.led_pin);
    }
    let core1 = &config.core1;
    if core1.launch_attempts == 0 {
        bail!("launch-attempts must be at least 1");
    }
    if core1.tick_ms == 0 {
        bail!("tick-ms must be at least 1");
    }
    let clocks = &config.clocks;
    for cycles_per_ms in [clocks.rosc_cycles_per_ms, clocks.pll_cycles_per_ms] {
        let reload = u64::from(cycles_per_ms) * u64::from(core1.tick_ms);
        if reload == 0 || reload - 1 > SYST_RELOAD_MAX {
            bail!(
                "tick-ms {} at {cycles_per_ms} cycles/ms doesn't fit SysTick",
                core1.tick_ms
            );
        }
    }
    Ok(())
}

fn generate(config: &AppConfig) -> Result<String> {
    let bringup = &config.bringup;
    let patience = match bringup.wait_polls {
        Some(n) => format!("Patience::Polls({n})"),
        None => "Patience::Forever".to_string(),
    };

    Ok(format!(
        r#"// Generated by build.rs from the app config.

use drv_rp2350_bringup::dispatch::{{Pin, TickPeriod}};
use drv_rp2350_bringup::launch::LaunchConfig;
use drv_rp2350_bringup::sequencer::{{BringupConfig, PowerDomains, Resets}};
use drv_rp2350_bringup::wait::Patience;
use drv_rp2350_bringup::{{BootConfig, Core0Config, Core1Config}};

pub const BOOT_CONFIG: BootConfig = BootConfig {{
    bringup: BringupConfig {{
        power_domains: {power_domains},
        resets: {resets},
        patience: {patience},
        stabilization_spins: {stabilization_spins},
    }},
    core0: Core0Config {{
        led: Pin({led_pin}),
        indication_spins: {indication_spins},
    }},
    core1: Core1Config {{
        tick: TickPeriod::from_ms({tick_ms}),
        heartbeat_divider: {heartbeat_divider},
    }},
}};

pub const LAUNCH: LaunchConfig = LaunchConfig {{
    attempts: {launch_attempts},
    response_polls: {launch_response_polls},
}};

pub const ROSC_CYCLES_PER_MS: u32 = {rosc_cycles_per_ms};
pub const PLL_CYCLES_PER_MS: u32 = {pll_cycles_per_ms};
"#,
        power_domains = flags_expr("PowerDomains", &bringup.power_domains)?,
        resets = flags_expr("Resets", &bringup.resets)?,
        stabilization_spins = bringup.stabilization_spins,
        led_pin = config.core0.led_pin,
        indication_spins = config.core0.indication_spins,
        tick_ms = config.core1.tick_ms,
        heartbeat_divider = config.core1.heartbeat_divider,
        launch_attempts = config.core1.launch_attempts,
        launch_response_polls = config.core1.launch_response_polls,
        rosc_cycles_per_ms = config.clocks.rosc_cycles_per_ms,
        pll_cycles_per_ms = config.clocks.pll_cycles_per_ms,
    ))
}
