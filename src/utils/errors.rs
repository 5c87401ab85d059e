//! User-Friendly Error Formatting
//!
//! Turns errors surfaced by the replay tool into messages with
//! troubleshooting hints.

use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Format error for user consumption
///
/// Takes technical error and produces user-friendly message with
/// troubleshooting steps and context.
pub fn format_user_error(error: &anyhow::Error) -> String {
    let mut output = String::new();

    writeln!(output).ok();
    writeln!(
        output,
        "╔════════════════════════════════════════════════════════════╗"
    )
    .ok();
    writeln!(
        output,
        "║                     ERROR                                  ║"
    )
    .ok();
    writeln!(
        output,
        "╚════════════════════════════════════════════════════════════╝"
    )
    .ok();
    writeln!(output).ok();

    // Match on the whole chain, context messages included
    let error_msg = format!("{:#}", error);

    if error_msg.contains("Keymap") || error_msg.contains("keymap") {
        format_keymap_error(&mut output);
    } else if error_msg.contains("trace") {
        format_trace_error(&mut output);
    } else if error_msg.contains("config") {
        format_config_error(&mut output);
    } else if error_msg.contains("backend") {
        format_backend_error(&mut output);
    } else {
        format_generic_error(&mut output, &error.to_string());
    }

    writeln!(output).ok();
    writeln!(output, "{}", RULE).ok();
    writeln!(output, "Technical Details:").ok();
    writeln!(output).ok();
    writeln!(output, "{:#}", error).ok();
    writeln!(output).ok();

    writeln!(output, "{}", RULE).ok();
    writeln!(output, "Need Help?").ok();
    writeln!(
        output,
        "  - Run with --verbose for detailed logs: lamco-rdp-keyboard -vvv"
    )
    .ok();
    writeln!(
        output,
        "  - Log every emitted action: RUST_LOG=lamco_rdp_keyboard=trace"
    )
    .ok();

    output
}

fn format_keymap_error(output: &mut String) {
    writeln!(output, "Keymap Error").ok();
    writeln!(output).ok();
    writeln!(output, "The keyboard layout could not be compiled.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Unknown layout or variant name").ok();
    writeln!(output, "     → List layouts: localectl list-x11-keymap-layouts").ok();
    writeln!(
        output,
        "     → List variants: localectl list-x11-keymap-variants <layout>"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. XKB data files not installed").ok();
    writeln!(output, "     → Install xkeyboard-config (xkb-data on Debian)").ok();
    writeln!(output, "     → Check: ls /usr/share/X11/xkb/rules/evdev").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Invalid XKB options").ok();
    writeln!(
        output,
        "     → Options are comma separated, e.g. ctrl:nocaps,compose:ralt"
    )
    .ok();
}

fn format_trace_error(output: &mut String) {
    writeln!(output, "Trace Error").ok();
    writeln!(output).ok();
    writeln!(output, "The input trace could not be read.").ok();
    writeln!(output).ok();
    writeln!(output, "Expected Format:").ok();
    writeln!(output).ok();
    writeln!(output, "  One JSON object per line, for example:").ok();
    writeln!(
        output,
        "     {{\"type\":\"key\",\"down\":true,\"scancode\":30}}"
    )
    .ok();
    writeln!(
        output,
        "     {{\"type\":\"sync\",\"caps\":false,\"num\":true,\"scroll\":false}}"
    )
    .ok();
    writeln!(output, "     {{\"type\":\"layout\",\"layout\":\"de\"}}").ok();
    writeln!(output, "     {{\"type\":\"control\",\"auto_repeat\":true}}").ok();
    writeln!(output).ok();
    writeln!(output, "  Blank lines and lines starting with # are skipped.").ok();
}

fn format_config_error(output: &mut String) {
    writeln!(output, "Configuration Error").ok();
    writeln!(output).ok();
    writeln!(output, "Problem with configuration file.").ok();
    writeln!(output).ok();
    writeln!(output, "Common Causes:").ok();
    writeln!(output).ok();
    writeln!(output, "  1. Configuration file not found").ok();
    writeln!(
        output,
        "     → Specify: lamco-rdp-keyboard -c /path/to/config.toml"
    )
    .ok();
    writeln!(output).ok();
    writeln!(output, "  2. Invalid TOML syntax").ok();
    writeln!(output, "     → Check for typos, missing quotes, etc.").ok();
    writeln!(output).ok();
    writeln!(output, "  3. Invalid values").ok();
    writeln!(output, "     → Lock keycodes must be distinct and in 8..=255").ok();
    writeln!(output, "     → auto_repeat_off_delay_ms must be positive").ok();
}

fn format_backend_error(output: &mut String) {
    writeln!(output, "Backend Error").ok();
    writeln!(output).ok();
    writeln!(output, "The requested input backend is not available.").ok();
    writeln!(output).ok();
    writeln!(output, "  → The xkb backend needs a build with --features xkb").ok();
    writeln!(output, "  → The memory backend is always available").ok();
}

fn format_generic_error(output: &mut String, error: &str) {
    writeln!(output, "Replay Error").ok();
    writeln!(output).ok();
    writeln!(output, "Error: {}", error).ok();
}
