//! Build script for picoled-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates bridge.toml at compile time
//! - Generates `bridge_config.rs` (constants and pin-selection macros)

use std::env;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use picoled_limits::config::MAX_LED_COUNT;

/// RP2040 pin table, shared with the HAL crate
#[path = "../hal/picoled-hal-rp2040/src/pins.rs"]
mod pins;

/// UART index whose TX function is routed to `gpio`
fn uart_index(gpio: i64) -> Option<u8> {
    u8::try_from(gpio)
        .ok()
        .and_then(pins::gpio_to_uart)
        .map(pins::UartId::index)
}

fn main() {
    setup_linker();
    let config = validate_config();
    generate_config(&config);
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let memory_x = include_bytes!("memory.x");
    let mut f = File::create(out_dir.join("memory.x")).unwrap();
    f.write_all(memory_x).unwrap();

    println!("cargo:rustc-link-search={}", out_dir.display());

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../hal/picoled-hal-rp2040/src/pins.rs");
}

/// Validated contents of bridge.toml
struct Bridge {
    led_pin: i64,
    dmx_pin: i64,
    rs485_pin: i64,
    rs485_enable: Option<i64>,
    num_pixels: i64,
    grid_width: i64,
    grid_height: i64,
    format: &'static str,
    dmx_baud: i64,
    dmx_continuous: bool,
    rs485_baud: i64,
    data_bits: &'static str,
    parity: &'static str,
    stop_bits: &'static str,
    pre_delay_us: i64,
    post_delay_us: i64,
    auto_direction: bool,
}

/// Validate bridge.toml configuration at compile time
fn validate_config() -> Bridge {
    println!("cargo:rerun-if-changed=bridge.toml");

    let config_path = Path::new("bridge.toml");

    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: bridge.toml not found!                                   ║\n\
            ║                                                                  ║\n\
            ║  The firmware requires a bridge.toml configuration file.         ║\n\
            ║  Please create one in the picoled-firmware directory.            ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read bridge.toml                               ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            let error_msg = e.to_string();
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in bridge.toml                       ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                ║                                                                  ║\n\
                {}\n\
                ║                                                                  ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&error_msg)
            );
        }
    };

    validate_required_sections(&config);

    let (led_pin, dmx_pin, rs485_pin, rs485_enable) = validate_pins(&config);
    let (num_pixels, grid_width, grid_height, format) = validate_led(&config);
    let (dmx_baud, dmx_continuous) = validate_dmx(&config);
    let rs485 = validate_rs485(&config);

    println!("cargo:warning=bridge.toml validated successfully");

    Bridge {
        led_pin,
        dmx_pin,
        rs485_pin,
        rs485_enable,
        num_pixels,
        grid_width,
        grid_height,
        format,
        dmx_baud,
        dmx_continuous,
        rs485_baud: rs485.0,
        data_bits: rs485.1,
        parity: rs485.2,
        stop_bits: rs485.3,
        pre_delay_us: rs485.4,
        post_delay_us: rs485.5,
        auto_direction: rs485.6,
    }
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Abort the build with a boxed list of problems
fn report_errors(title: &str, errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    panic!(
        "\n\
        ╔══════════════════════════════════════════════════════════════════╗\n\
        ║  ERROR: {:<56} ║\n\
        ╠══════════════════════════════════════════════════════════════════╣\n\
        {}\n\
        ╚══════════════════════════════════════════════════════════════════╝\n",
        title,
        errors
            .iter()
            .map(|e| format!("║  • {:<62} ║", e))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

/// Validate that required sections exist
fn validate_required_sections(config: &toml::Value) {
    let mut errors = Vec::new();

    for section in ["pins", "led"] {
        match config.get(section) {
            Some(toml::Value::Table(_)) => {}
            Some(_) => errors.push(format!("[{}] must be a table", section)),
            None => errors.push(format!("Missing [{}] section", section)),
        }
    }
    for section in ["dmx", "rs485"] {
        if let Some(value) = config.get(section) {
            if !value.is_table() {
                errors.push(format!("[{}] must be a table", section));
            }
        }
    }

    report_errors("Missing required sections in bridge.toml", &errors);
}

fn section<'a>(config: &'a toml::Value, name: &str) -> Option<&'a toml::value::Table> {
    config.get(name).and_then(|s| s.as_table())
}

/// Integer field; `default` applies when the key is absent
fn integer(
    table: Option<&toml::value::Table>,
    section: &str,
    key: &str,
    default: Option<i64>,
    errors: &mut Vec<String>,
) -> i64 {
    match table.and_then(|t| t.get(key)) {
        Some(toml::Value::Integer(v)) => *v,
        Some(_) => {
            errors.push(format!("[{}] {} must be an integer", section, key));
            0
        }
        None => match default {
            Some(v) => v,
            None => {
                errors.push(format!("[{}] missing '{}'", section, key));
                0
            }
        },
    }
}

fn boolean(
    table: Option<&toml::value::Table>,
    section: &str,
    key: &str,
    default: bool,
    errors: &mut Vec<String>,
) -> bool {
    match table.and_then(|t| t.get(key)) {
        Some(toml::Value::Boolean(v)) => *v,
        Some(_) => {
            errors.push(format!("[{}] {} must be true or false", section, key));
            default
        }
        None => default,
    }
}

/// Validate pin assignments
fn validate_pins(config: &toml::Value) -> (i64, i64, i64, Option<i64>) {
    let pins = section(config, "pins");
    let mut errors = Vec::new();

    let led = integer(pins, "pins", "led_panel", None, &mut errors);
    let dmx = integer(pins, "pins", "dmx512", None, &mut errors);
    let rs485 = integer(pins, "pins", "rs485_data", None, &mut errors);
    let enable = match pins.and_then(|t| t.get("rs485_enable")) {
        Some(toml::Value::Integer(v)) => Some(*v),
        Some(_) => {
            errors.push("[pins] rs485_enable must be an integer".to_string());
            None
        }
        None => None,
    };

    let mut assigned = vec![("led_panel", led), ("dmx512", dmx), ("rs485_data", rs485)];
    if let Some(pin) = enable {
        assigned.push(("rs485_enable", pin));
    }

    for (name, pin) in &assigned {
        if !u8::try_from(*pin).is_ok_and(pins::is_valid_gpio) {
            errors.push(format!(
                "[pins] {} must be GPIO 0-{}",
                name,
                pins::GPIO_COUNT - 1
            ));
        }
    }
    for (i, (name, pin)) in assigned.iter().enumerate() {
        for (other, other_pin) in &assigned[i + 1..] {
            if pin == other_pin {
                errors.push(format!("[pins] {} and {} share GPIO {}", name, other, pin));
            }
        }
    }

    let dmx_uart = uart_index(dmx);
    let rs485_uart = uart_index(rs485);
    if dmx_uart.is_none() {
        errors.push(format!("[pins] dmx512 GPIO {} is not a UART TX pin", dmx));
    }
    if rs485_uart.is_none() {
        errors.push(format!("[pins] rs485_data GPIO {} is not a UART TX pin", rs485));
    }
    if dmx_uart.is_some() && dmx_uart == rs485_uart {
        errors.push("[pins] dmx512 and rs485_data need different UARTs".to_string());
    }

    report_errors("Invalid pin configuration", &errors);
    (led, dmx, rs485, enable)
}

/// Validate LED panel geometry
fn validate_led(config: &toml::Value) -> (i64, i64, i64, &'static str) {
    let led = section(config, "led");
    let mut errors = Vec::new();

    let num_pixels = integer(led, "led", "num_pixels", None, &mut errors);
    let width = integer(led, "led", "grid_width", Some(num_pixels), &mut errors);
    let height = integer(led, "led", "grid_height", Some(1), &mut errors);

    if num_pixels < 1 || num_pixels > MAX_LED_COUNT as i64 {
        errors.push(format!("[led] num_pixels must be 1-{}", MAX_LED_COUNT));
    }
    if width < 1 || height < 1 {
        errors.push("[led] grid_width and grid_height must be at least 1".to_string());
    } else if width * height < num_pixels {
        errors.push(format!(
            "[led] {}x{} grid cannot hold {} pixels",
            width, height, num_pixels
        ));
    }

    let format = match led.and_then(|t| t.get("format")) {
        None => "Grb",
        Some(toml::Value::String(f)) => match f.as_str() {
            "grb" => "Grb",
            "rgb" => "Rgb",
            "rgbw" => "Rgbw",
            _ => {
                errors.push("[led] format must be 'grb', 'rgb', or 'rgbw'".to_string());
                "Grb"
            }
        },
        Some(_) => {
            errors.push("[led] format must be a string".to_string());
            "Grb"
        }
    };

    report_errors("Invalid LED configuration", &errors);
    (num_pixels, width, height, format)
}

/// Validate DMX512 options
fn validate_dmx(config: &toml::Value) -> (i64, bool) {
    let dmx = section(config, "dmx");
    let mut errors = Vec::new();

    let baud = integer(dmx, "dmx", "baudrate", Some(250_000), &mut errors);
    let continuous = boolean(dmx, "dmx", "continuous", false, &mut errors);

    if baud <= 0 {
        errors.push("[dmx] baudrate must be positive".to_string());
    }

    report_errors("Invalid DMX configuration", &errors);
    (baud, continuous)
}

/// Validate RS485 framing and turnaround
#[allow(clippy::type_complexity)]
fn validate_rs485(
    config: &toml::Value,
) -> (i64, &'static str, &'static str, &'static str, i64, i64, bool) {
    let rs485 = section(config, "rs485");
    let mut errors = Vec::new();

    let baud = integer(rs485, "rs485", "baudrate", Some(115_200), &mut errors);
    let data_bits = integer(rs485, "rs485", "data_bits", Some(8), &mut errors);
    let stop_bits = integer(rs485, "rs485", "stop_bits", Some(1), &mut errors);
    let pre = integer(rs485, "rs485", "pre_delay_us", Some(50), &mut errors);
    let post = integer(rs485, "rs485", "post_delay_us", Some(50), &mut errors);
    let auto_direction = boolean(rs485, "rs485", "auto_direction", true, &mut errors);

    if baud <= 0 {
        errors.push("[rs485] baudrate must be positive".to_string());
    }
    let data_bits = match data_bits {
        7 => "Seven",
        8 => "Eight",
        _ => {
            errors.push("[rs485] data_bits must be 7 or 8".to_string());
            "Eight"
        }
    };
    let stop_bits = match stop_bits {
        1 => "One",
        2 => "Two",
        _ => {
            errors.push("[rs485] stop_bits must be 1 or 2".to_string());
            "One"
        }
    };
    if pre < 0 || post < 0 {
        errors.push("[rs485] turnaround delays cannot be negative".to_string());
    }

    let parity = match rs485.and_then(|t| t.get("parity")) {
        None => "None",
        Some(toml::Value::String(p)) => match p.as_str() {
            "none" => "None",
            "even" => "Even",
            "odd" => "Odd",
            _ => {
                errors.push("[rs485] parity must be 'none', 'even', or 'odd'".to_string());
                "None"
            }
        },
        Some(_) => {
            errors.push("[rs485] parity must be a string".to_string());
            "None"
        }
    };

    report_errors("Invalid RS485 configuration", &errors);
    (baud, data_bits, parity, stop_bits, pre, post, auto_direction)
}

/// Write `bridge_config.rs` into OUT_DIR
fn generate_config(bridge: &Bridge) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let mut out = String::new();

    // Validation above guarantees both pins map to a UART
    let dmx_uart = uart_index(bridge.dmx_pin).unwrap();
    let rs485_uart = uart_index(bridge.rs485_pin).unwrap();
    let enable = match bridge.rs485_enable {
        Some(pin) => format!("Some({})", pin),
        None => "None".to_string(),
    };

    writeln!(out, "// Generated by build.rs from bridge.toml").unwrap();
    writeln!(out).unwrap();
    writeln!(
        out,
        "pub const BRIDGE_CONFIG: ::picoled_core::config::BridgeConfig = \
         ::picoled_core::config::BridgeConfig {{"
    )
    .unwrap();
    writeln!(
        out,
        "    pins: ::picoled_core::config::PinConfig {{ led_panel_pin: {}, dmx512_pin: {}, \
         rs485_data_pin: {}, rs485_enable_pin: {} }},",
        bridge.led_pin, bridge.dmx_pin, bridge.rs485_pin, enable
    )
    .unwrap();
    writeln!(
        out,
        "    led: ::picoled_core::config::LedConfig {{ num_pixels: {}, grid_width: {}, \
         grid_height: {}, format: ::picoled_core::ColorFormat::{}, use_dma: false }},",
        bridge.num_pixels, bridge.grid_width, bridge.grid_height, bridge.format
    )
    .unwrap();
    writeln!(
        out,
        "    dmx: ::picoled_core::config::DmxConfig {{ baudrate: {}, continuous: {} }},",
        bridge.dmx_baud, bridge.dmx_continuous
    )
    .unwrap();
    writeln!(
        out,
        "    rs485: ::picoled_core::config::Rs485Config {{\n        \
         serial: ::picoled_hal::UartConfig {{ baudrate: {}, \
         data_bits: ::picoled_hal::DataBits::{}, parity: ::picoled_hal::Parity::{}, \
         stop_bits: ::picoled_hal::StopBits::{} }},\n        \
         buffer_size: ::picoled_core::config::RS485_MAX_FRAME_SIZE,\n        \
         use_dma: false,\n        \
         pre_delay_us: {},\n        \
         post_delay_us: {},\n        \
         auto_direction: {},\n    }},",
        bridge.rs485_baud,
        bridge.data_bits,
        bridge.parity,
        bridge.stop_bits,
        bridge.pre_delay_us,
        bridge.post_delay_us,
        bridge.auto_direction
    )
    .unwrap();
    writeln!(out, "}};").unwrap();
    writeln!(out).unwrap();

    writeln!(
        out,
        "pub const DMX_UART: ::picoled_hal_rp2040::UartId = ::picoled_hal_rp2040::UartId::Uart{};",
        dmx_uart
    )
    .unwrap();
    writeln!(
        out,
        "pub const RS485_UART: ::picoled_hal_rp2040::UartId = ::picoled_hal_rp2040::UartId::Uart{};",
        rs485_uart
    )
    .unwrap();
    writeln!(out).unwrap();

    // Peripheral selection must be resolved to concrete fields at compile
    // time so embassy-rp can check pin functions by type
    let selectors = [
        ("led_pin", format!("PIN_{}", bridge.led_pin)),
        ("dmx_uart", format!("UART{}", dmx_uart)),
        ("dmx_tx_pin", format!("PIN_{}", bridge.dmx_pin)),
        ("rs485_uart", format!("UART{}", rs485_uart)),
        ("rs485_tx_pin", format!("PIN_{}", bridge.rs485_pin)),
    ];
    for (name, field) in selectors {
        writeln!(
            out,
            "macro_rules! {} {{ ($p:ident) => {{ $p.{} }}; }}",
            name, field
        )
        .unwrap();
    }
    match bridge.rs485_enable {
        Some(pin) => writeln!(
            out,
            "macro_rules! rs485_enable_pin {{ ($p:ident) => {{ \
             Some(::picoled_hal_rp2040::RpOutputPin::new(::embassy_rp::gpio::Output::new(\
             $p.PIN_{}, ::embassy_rp::gpio::Level::Low))) }}; }}",
            pin
        )
        .unwrap(),
        None => writeln!(
            out,
            "macro_rules! rs485_enable_pin {{ ($p:ident) => {{ None }}; }}"
        )
        .unwrap(),
    }

    fs::write(out_dir.join("bridge_config.rs"), out).unwrap();
}
