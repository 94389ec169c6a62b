// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use heck::ToShoutySnakeCase;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Environment variable that, when set, replaces the app's `app.toml` with
/// the TOML text it holds.
pub const APP_CONFIG_VAR: &str = "PICO2_ETM_APP_CONFIG";

///
/// Pulls the app configuration for purposes of a build script: the text of
/// `$PICO2_ETM_APP_CONFIG` if that is set, the package's `app.toml`
/// otherwise. Fails if neither exists or the text doesn't parse.
///
/// As with any serde target, `T` need only describe the parts of the file the
/// caller cares about. Don't set `deny_unknown_fields` on `T` itself; do set
/// it on the section types inside it.
///
pub fn app_config<T: DeserializeOwned>() -> Result<T> {
    // Emitted whether or not the variable is present, so that we'll be re-run
    // if it becomes present.
    println!("cargo:rerun-if-env-changed={APP_CONFIG_VAR}");

    let text = match env::var(APP_CONFIG_VAR) {
        Ok(text) => {
            println!("--- toml for ${APP_CONFIG_VAR} ---");
            text
        }
        Err(_) => {
            let path = manifest_dir()?.join("app.toml");
            println!("cargo:rerun-if-changed={}", path.display());
            println!("--- toml from {} ---", path.display());
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?
        }
    };
    println!("{text}");
    parse_config(&text)
}

/// Parses app configuration text.
pub fn parse_config<T: DeserializeOwned>(text: &str) -> Result<T> {
    toml::from_str(text).context("parsing app configuration")
}

pub fn out_dir() -> Result<PathBuf> {
    Ok(PathBuf::from(env::var_os("OUT_DIR").context("OUT_DIR not set")?))
}

fn manifest_dir() -> Result<PathBuf> {
    let dir = env::var_os("CARGO_MANIFEST_DIR")
        .context("CARGO_MANIFEST_DIR not set")?;
    Ok(PathBuf::from(dir))
}

/// Renders a `bitflags` constant expression that unions the flags named in
/// `app.toml` (kebab-case) on type `ty`, e.g. `PowerDomains::empty()
/// .union(PowerDomains::SYS)`.
pub fn flags_expr(ty: &str, names: &[String]) -> Result<String> {
    let mut s = format!("{ty}::empty()");
    for name in names {
        let flag = name.to_shouty_snake_case();
        write!(s, "\n            .union({ty}::{flag})")?;
    }
    Ok(s)
}

/// A span of the address map.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Region {
    pub start: u32,
    pub size: u32,
}

impl Region {
    fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.size)
    }

    fn overlaps(&self, other: &Region) -> bool {
        u64::from(self.start) < other.end()
            && u64::from(other.start) < self.end()
    }
}

/// The `[memory]` section of `app.toml`.
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    pub flash: Region,
    pub ram: Region,
    /// Reserved for the trace capture buffer. Must be aligned to its own
    /// size, and hold nothing else.
    pub trace: Region,
}

/// Renders the `memory.x` that `cortex-m-rt`'s `link.x` includes.
///
/// Besides the memory map, this places the RP2350 image definition block at
/// the very start of flash (the bootrom only looks at the first 4 KiB) and
/// gives the trace buffer its own `NOLOAD` section in the trace region.
pub fn linker_script(memory: &MemoryConfig) -> Result<String> {
    let trace = memory.trace;
    if !trace.size.is_power_of_two() {
        bail!("trace region size {:#x} is not a power of two", trace.size);
    }
    if trace.start % trace.size != 0 {
        bail!(
            "trace region at {:#010x} is not aligned to its size {:#x}",
            trace.start,
            trace.size
        );
    }
    if trace.overlaps(&memory.ram) {
        bail!("trace region overlaps RAM");
    }

    let mut s = String::new();
    writeln!(s, "MEMORY\n{{")?;
    for (name, attrs, r) in [
        ("FLASH", "rx", memory.flash),
        ("RAM", "rwx", memory.ram),
        ("TRACE", "rw", memory.trace),
    ] {
        writeln!(
            s,
            "    {name} ({attrs}) : ORIGIN = {:#010x}, LENGTH = {:#010x}",
            r.start, r.size
        )?;
    }
    writeln!(s, "}}")?;
    writeln!(s)?;
    writeln!(s, "SECTIONS {{")?;
    writeln!(s, "  .start_block : ALIGN(4) {{")?;
    writeln!(s, "    __start_block_addr = .;")?;
    writeln!(s, "    KEEP(*(.image_def));")?;
    writeln!(s, "  }} > FLASH")?;
    writeln!(s, "}} INSERT AFTER .vector_table;")?;
    writeln!(s, "_stext = ADDR(.start_block) + SIZEOF(.start_block);")?;
    writeln!(s)?;
    writeln!(s, "SECTIONS {{")?;
    writeln!(s, "  .etm_buffer (NOLOAD) : ALIGN({:#x}) {{", trace.size)?;
    writeln!(s, "    KEEP(*(.etm_buffer .etm_buffer.*));")?;
    writeln!(s, "  }} > TRACE")?;
    writeln!(s, "}} INSERT AFTER .uninit;")?;
    Ok(s)
}

/// Writes `memory.x` into `OUT_DIR` and puts it on the linker search path.
pub fn write_linker_script(memory: &MemoryConfig) -> Result<()> {
    let out = out_dir()?;
    std::fs::write(out.join("memory.x"), linker_script(memory)?)?;
    println!("cargo:rustc-link-search={}", out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PICO2: MemoryConfig = MemoryConfig {
        flash: Region {
            start: 0x1000_0000,
            size: 0x0040_0000,
        },
        ram: Region {
            start: 0x2000_0000,
            size: 0x0007_8000,
        },
        trace: Region {
            start: 0x2007_8000,
            size: 0x0000_8000,
        },
    };

    #[derive(Deserialize)]
    struct Partial {
        memory: MemoryConfig,
    }

    #[test]
    fn parses_memory_section_ignoring_the_rest() {
        let text = r#"
            name = "whatever"

            [memory]
            flash = { start = 0x10000000, size = 0x400000 }
            ram = { start = 0x20000000, size = 0x78000 }
            trace = { start = 0x20078000, size = 0x8000 }

            [core0]
            led-pin = 25
        "#;
        let p: Partial = parse_config(text).unwrap();
        assert_eq!(p.memory, PICO2);
    }

    #[test]
    fn unknown_region_key_is_rejected() {
        let text = r#"
            [memory]
            flash = { start = 0, size = 1, speed = 3 }
            ram = { start = 0, size = 1 }
            trace = { start = 0, size = 1 }
        "#;
        assert!(parse_config::<Partial>(text).is_err());
    }

    #[test]
    fn flag_names_become_constants() {
        let names = ["sys".to_string(), "vreg-and-chip-reset".to_string()];
        let s = flags_expr("PowerDomains", &names).unwrap();
        assert_eq!(
            s,
            concat!(
                "PowerDomains::empty()\n",
                "            .union(PowerDomains::SYS)\n",
                "            .union(PowerDomains::VREG_AND_CHIP_RESET)",
            )
        );
        assert_eq!(flags_expr("Resets", &[]).unwrap(), "Resets::empty()");
    }

    #[test]
    fn script_places_buffer_and_image_def() {
        let s = linker_script(&PICO2).unwrap();
        assert!(s.contains(
            "TRACE (rw) : ORIGIN = 0x20078000, LENGTH = 0x00008000"
        ));
        assert!(s.contains(".etm_buffer (NOLOAD) : ALIGN(0x8000)"));
        assert!(s.contains("KEEP(*(.image_def));"));
        assert!(s.contains("INSERT AFTER .vector_table;"));
    }

    #[test]
    fn misaligned_trace_region_is_rejected() {
        let mut m = PICO2;
        m.trace.start = 0x2007_A000;
        assert!(linker_script(&m).is_err());

        let mut m = PICO2;
        m.trace.size = 0x6000;
        assert!(linker_script(&m).is_err());
    }

    #[test]
    fn trace_region_inside_ram_is_rejected() {
        let mut m = PICO2;
        m.trace.start = 0x2007_0000;
        assert!(linker_script(&m).is_err());
    }
}
