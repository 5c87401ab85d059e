//! Trace Replay
//!
//! Drives an [`RdpKeyboard`] from a recorded input trace and writes every
//! action posted to the host as a line of text.
//!
//! # Trace format
//!
//! One JSON object per line, tagged by `"type"`:
//!
//! ```text
//! {"type":"key","down":true,"scancode":30}
//! {"type":"key","down":true,"scancode":29,"flags":256,"delay_ms":20}
//! {"type":"sync","caps":false,"num":true,"scroll":false}
//! {"type":"layout","layout":"de","variant":"nodeadkeys"}
//! {"type":"layout"}
//! {"type":"control","auto_repeat":true}
//! ```
//!
//! `scancode` and `flags` are the TS_KEYBOARD_EVENT keyCode and
//! keyboardFlags. Without an explicit `keycode` the local keycode is looked
//! up in the built-in X11 table. A `layout` line with no fields selects the
//! built-in defaults. Lock keycodes missing from a non-empty `layout` line
//! come from the keyboard configuration. Blank lines and lines starting with `#` are skipped.

use crate::input::error::{KeyboardError, Result};
use crate::input::host::{DeviceId, DeviceRegistry, KeyAction, KeyboardHost};
use crate::input::keymap::{KeycodeLookup, X11Keycodes};
use crate::input::layout::LayoutOverride;
use crate::input::normalizer::KeyEvent;
use crate::input::scancode::Scancode;
use crate::input::state::LockKeycodes;
use crate::input::sync::SyncRequest;
use crate::input::{KeyboardInput, KeyboardStats, RdpKeyboard};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Core keyboard of the replay registry
pub const CORE_KEYBOARD: DeviceId = DeviceId(3);
/// RDP keyboard driven by the replay
pub const RDP_KEYBOARD: DeviceId = DeviceId(6);

/// Layout record as written in a trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRecord {
    /// XKB rules
    pub rules: Option<String>,
    /// Model
    pub model: Option<String>,
    /// Layout
    pub layout: Option<String>,
    /// Variant
    pub variant: Option<String>,
    /// Options
    pub options: Option<String>,
    /// Caps Lock keycode
    pub caps_keycode: Option<u32>,
    /// Num Lock keycode
    pub num_keycode: Option<u32>,
    /// Scroll Lock keycode
    pub scroll_keycode: Option<u32>,
}

impl LayoutRecord {
    /// Client override, or `None` when the record is empty
    ///
    /// Missing lock keycodes are taken from `defaults`.
    pub fn to_override(&self, defaults: LockKeycodes) -> Option<LayoutOverride> {
        if *self == LayoutRecord::default() {
            return None;
        }
        Some(LayoutOverride {
            rules: self.rules.clone().unwrap_or_default(),
            model: self.model.clone().unwrap_or_default(),
            layout: self.layout.clone().unwrap_or_default(),
            variant: self.variant.clone().unwrap_or_default(),
            options: self.options.clone().unwrap_or_default(),
            lock_keycodes: LockKeycodes {
                caps: self.caps_keycode.unwrap_or(defaults.caps),
                num: self.num_keycode.unwrap_or(defaults.num),
                scroll: self.scroll_keycode.unwrap_or(defaults.scroll),
            },
        })
    }
}

/// One trace line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// TS_KEYBOARD_EVENT
    Key {
        /// Pressed or released
        down: bool,
        /// keyCode
        scancode: u16,
        /// keyboardFlags
        #[serde(default)]
        flags: u16,
        /// Local keycode override
        #[serde(default)]
        keycode: Option<u32>,
        /// Pause before the event
        #[serde(default)]
        delay_ms: u64,
    },
    /// TS_SYNC_EVENT
    Sync {
        /// Caps Lock on
        #[serde(default)]
        caps: bool,
        /// Num Lock on
        #[serde(default)]
        num: bool,
        /// Scroll Lock on
        #[serde(default)]
        scroll: bool,
    },
    /// Client layout change
    Layout(LayoutRecord),
    /// Keyboard control change from a local client
    Control {
        /// Auto-repeat switched on or off
        auto_repeat: bool,
        /// Pause before the event
        #[serde(default)]
        delay_ms: u64,
    },
}

impl TraceEvent {
    /// Pause before the event
    pub fn delay(&self) -> Duration {
        match self {
            TraceEvent::Key { delay_ms, .. } | TraceEvent::Control { delay_ms, .. } => {
                Duration::from_millis(*delay_ms)
            }
            TraceEvent::Sync { .. } | TraceEvent::Layout(_) => Duration::ZERO,
        }
    }

    /// Keyboard input for this event; `None` for control changes
    pub fn to_input(
        &self,
        lookup: &dyn KeycodeLookup,
        lock_defaults: LockKeycodes,
    ) -> Option<KeyboardInput> {
        match self {
            TraceEvent::Key {
                down,
                scancode,
                flags,
                keycode,
                ..
            } => {
                let local_keycode = keycode
                    .or_else(|| lookup.keycode(Scancode::from_kbd_event(*scancode, *flags)))
                    .unwrap_or(0);
                Some(KeyboardInput::Key(KeyEvent {
                    down: *down,
                    local_keycode,
                    protocol_keycode: *scancode,
                    protocol_flags: *flags,
                }))
            }
            TraceEvent::Sync { caps, num, scroll } => Some(KeyboardInput::Sync(
                SyncRequest::new(*caps, *num, *scroll),
            )),
            TraceEvent::Layout(record) => Some(KeyboardInput::LayoutChange(
                record.to_override(lock_defaults),
            )),
            TraceEvent::Control { .. } => None,
        }
    }
}

/// Parse a JSON-lines trace
pub fn parse_trace<B: BufRead>(reader: B) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|e| KeyboardError::InvalidTrace {
            line: index + 1,
            reason: e.to_string(),
        })?;
        events.push(event);
    }
    debug!("Parsed {} trace events", events.len());
    Ok(events)
}

/// Replay results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Trace events processed
    pub events: usize,
    /// Devices on which auto-repeat was switched off
    pub repeat_offs: usize,
    /// Final keyboard statistics
    pub stats: KeyboardStats,
}

/// Replay `events` against `keyboard`, writing posted actions to `out`
///
/// Deferred tasks are run after every event. If any are still pending at the
/// end, the replay waits for them.
pub async fn replay<H, R, W>(
    keyboard: &mut RdpKeyboard,
    events: &[TraceEvent],
    host: &mut H,
    registry: &R,
    out: &mut W,
) -> Result<ReplaySummary>
where
    H: KeyboardHost + ?Sized,
    R: DeviceRegistry + ?Sized,
    W: Write,
{
    let lookup = X11Keycodes;
    let lock_defaults = keyboard.default_lock_keycodes();
    let mut summary = ReplaySummary::default();

    for event in events {
        let delay = event.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match event.to_input(&lookup, lock_defaults) {
            Some(input) => match keyboard.handle(input, host, registry) {
                Ok(actions) => write_actions(&actions, out)?,
                Err(e) => warn!("Continuing after failed input: {}", e),
            },
            None => {
                if let TraceEvent::Control { auto_repeat, .. } = event {
                    keyboard.keyboard_control_changed(
                        keyboard.device(),
                        *auto_repeat,
                        Instant::now(),
                    );
                }
            }
        }

        summary.events += 1;
        summary.repeat_offs += keyboard
            .run_deferred(Instant::now(), host, registry)
            .len();
    }

    if let Some(deadline) = keyboard.deferred().next_deadline() {
        debug!("Waiting for deferred tasks");
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
        summary.repeat_offs += keyboard
            .run_deferred(deadline.max(Instant::now()), host, registry)
            .len();
    }

    summary.stats = keyboard.stats();
    info!(
        "Replayed {} events: {} actions, {} repeat-off",
        summary.events, summary.stats.actions_emitted, summary.repeat_offs
    );
    Ok(summary)
}

fn write_actions<W: Write>(actions: &[KeyAction], out: &mut W) -> Result<()> {
    for action in actions {
        writeln!(out, "{}", action)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyboardConfig;
    use crate::input::memory::{MemoryHost, MemoryRegistry};

    fn setup() -> (RdpKeyboard, MemoryHost, MemoryRegistry) {
        let mut host = MemoryHost::new();
        let mut registry = MemoryRegistry::new(CORE_KEYBOARD);
        registry.register_keyboard(RDP_KEYBOARD);
        let keyboard = RdpKeyboard::attach(
            RDP_KEYBOARD,
            &KeyboardConfig::default(),
            &mut host,
            &registry,
        );
        (keyboard, host, registry)
    }

    #[test]
    fn test_parse_all_event_types() {
        let trace = r#"
# comment
{"type":"key","down":true,"scancode":30}
{"type":"key","down":false,"scancode":29,"flags":256,"keycode":105,"delay_ms":5}
{"type":"sync","caps":true}
{"type":"layout","layout":"de","num_keycode":80}
{"type":"layout"}
{"type":"control","auto_repeat":true}
"#;
        let events = parse_trace(trace.as_bytes()).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(
            events[1],
            TraceEvent::Key {
                down: false,
                scancode: 29,
                flags: 256,
                keycode: Some(105),
                delay_ms: 5,
            }
        );
        assert_eq!(events[1].delay(), Duration::from_millis(5));
        assert_eq!(
            events[2],
            TraceEvent::Sync {
                caps: true,
                num: false,
                scroll: false,
            }
        );
        assert_eq!(events[4], TraceEvent::Layout(LayoutRecord::default()));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let trace = "{\"type\":\"key\",\"down\":true,\"scancode\":30}\n\n{\"type\":\"bogus\"}\n";
        match parse_trace(trace.as_bytes()) {
            Err(KeyboardError::InvalidTrace { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_keycode_lookup_when_absent() {
        let event = TraceEvent::Key {
            down: true,
            scancode: 0x1D,
            flags: 0x0100,
            keycode: None,
            delay_ms: 0,
        };
        let Some(KeyboardInput::Key(key)) = event.to_input(&X11Keycodes, LockKeycodes::default()) else {
            panic!("expected key input");
        };
        assert_eq!(key.local_keycode, 105);
    }

    #[test]
    fn test_layout_record_to_override() {
        assert!(LayoutRecord::default()
            .to_override(LockKeycodes::default())
            .is_none());

        let record = LayoutRecord {
            layout: Some("fr".to_string()),
            scroll_keycode: Some(90),
            ..LayoutRecord::default()
        };
        let client = record.to_override(LockKeycodes::default()).unwrap();
        assert_eq!(client.layout, "fr");
        assert_eq!(client.rules, "");
        assert_eq!(client.lock_keycodes.caps, 66);
        assert_eq!(client.lock_keycodes.scroll, 90);
    }

    #[tokio::test]
    async fn test_partial_layout_record_uses_configured_lock_keycodes() {
        let config = KeyboardConfig {
            caps_lock_keycode: 60,
            num_lock_keycode: 61,
            scroll_lock_keycode: 62,
            ..KeyboardConfig::default()
        };
        let mut host = MemoryHost::with_lock_keycodes(config.lock_keycodes());
        let mut registry = MemoryRegistry::new(CORE_KEYBOARD);
        registry.register_keyboard(RDP_KEYBOARD);
        let mut keyboard = RdpKeyboard::attach(RDP_KEYBOARD, &config, &mut host, &registry);

        let trace = "{\"type\":\"layout\",\"layout\":\"de\",\"scroll_keycode\":90}\n";
        let events = parse_trace(trace.as_bytes()).unwrap();
        let mut out = Vec::new();
        replay(&mut keyboard, &events, &mut host, &registry, &mut out)
            .await
            .unwrap();

        assert_eq!(
            keyboard.state().lock_keycodes,
            LockKeycodes {
                caps: 60,
                num: 61,
                scroll: 90,
            }
        );
        assert_eq!(host.lock_keycodes_of(RDP_KEYBOARD).caps, 60);
    }

    #[tokio::test]
    async fn test_replay_writes_actions() {
        let (mut keyboard, mut host, registry) = setup();
        let events = parse_trace(
            "{\"type\":\"key\",\"down\":true,\"scancode\":30}\n{\"type\":\"key\",\"down\":false,\"scancode\":30}\n"
                .as_bytes(),
        )
        .unwrap();

        let mut out = Vec::new();
        let summary = replay(&mut keyboard, &events, &mut host, &registry, &mut out)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "up 38\ndown 38\nup 38\n");
        assert_eq!(summary.events, 2);
        assert_eq!(summary.stats.actions_emitted, 3);
    }

    #[tokio::test]
    async fn test_replay_waits_for_deferred_repeat_off() {
        let (mut keyboard, mut host, registry) = setup();
        let events = vec![TraceEvent::Control {
            auto_repeat: true,
            delay_ms: 0,
        }];

        let mut out = Vec::new();
        let summary = replay(&mut keyboard, &events, &mut host, &registry, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.repeat_offs, 1);
        assert!(!host.auto_repeat(RDP_KEYBOARD));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_replay_continues_after_layout_failure() {
        let (mut keyboard, mut host, registry) = setup();
        host.fail_layout("zz");
        let events = parse_trace(
            "{\"type\":\"layout\",\"layout\":\"zz\"}\n{\"type\":\"key\",\"down\":true,\"scancode\":16}\n"
                .as_bytes(),
        )
        .unwrap();

        let mut out = Vec::new();
        let summary = replay(&mut keyboard, &events, &mut host, &registry, &mut out)
            .await
            .unwrap();

        assert_eq!(summary.stats.layout_failures, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "up 24\ndown 24\n");
    }
}
