//! Property tests for the normalizer and lock synchronizer

use lamco_rdp_keyboard::input::scancode::codes;
use lamco_rdp_keyboard::input::{
    normalize, synchronize, DeviceId, KeyAction, KeyEvent, KeyboardHost, KeyboardState,
    KeycodeLookup, LockModifiers, MemoryHost, Scancode, SyncRequest, X11Keycodes,
};
use proptest::prelude::*;

// Letter row q..p: default category keys
fn default_scancode() -> impl Strategy<Value = Scancode> {
    (0x10u16..=0x19).prop_map(Scancode::new)
}

fn key_event(down: bool, scancode: Scancode) -> KeyEvent {
    let keycode = X11Keycodes.keycode(scancode).unwrap_or(0);
    if down {
        KeyEvent::press(keycode, scancode)
    } else {
        KeyEvent::release(keycode, scancode)
    }
}

proptest! {
    #[test]
    fn default_keys_never_press_twice_without_release(
        events in prop::collection::vec((any::<bool>(), default_scancode()), 0..64)
    ) {
        let mut state = KeyboardState::default();
        let mut out = Vec::new();
        for (down, scancode) in &events {
            normalize(&mut state, &key_event(*down, *scancode), &mut out);
        }

        let mut held = std::collections::HashSet::new();
        for action in &out {
            if action.down {
                prop_assert!(held.insert(action.keycode), "double press of {}", action.keycode);
            } else {
                held.remove(&action.keycode);
            }
        }
    }

    #[test]
    fn every_default_press_is_preceded_by_its_release(
        scancode in default_scancode(),
        presses in 1usize..10
    ) {
        let mut state = KeyboardState::default();
        let mut out = Vec::new();
        for _ in 0..presses {
            normalize(&mut state, &key_event(true, scancode), &mut out);
        }
        let keycode = X11Keycodes.keycode(scancode).unwrap_or(0);
        let expected: Vec<KeyAction> = (0..presses)
            .flat_map(|_| [KeyAction::release(keycode), KeyAction::press(keycode)])
            .collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn scroll_lock_toggles_once_per_press_edge(downs in prop::collection::vec(any::<bool>(), 0..64)) {
        let mut state = KeyboardState::default();
        let mut out = Vec::new();
        let mut held = false;
        let mut edges = 0usize;
        for down in &downs {
            if *down && !held {
                edges += 1;
            }
            held = *down;
            normalize(&mut state, &key_event(*down, codes::SCROLL_LOCK), &mut out);
        }
        prop_assert_eq!(state.scroll_lock_state, edges % 2 == 1);
        // Raw transitions are always forwarded
        prop_assert_eq!(out.len(), downs.len());
    }

    #[test]
    fn sync_twice_only_releases_second_time(
        caps in any::<bool>(),
        num in any::<bool>(),
        scroll in any::<bool>(),
        local_caps in any::<bool>(),
        local_num in any::<bool>(),
        tracked_scroll in any::<bool>()
    ) {
        let device = DeviceId(1);
        let mut host = MemoryHost::new();
        host.set_lock_modifiers(device, LockModifiers { caps_lock: local_caps, num_lock: local_num });
        let mut state = KeyboardState { scroll_lock_state: tracked_scroll, ..KeyboardState::default() };
        let request = SyncRequest::new(caps, num, scroll);

        let mut first = Vec::new();
        synchronize(&mut state, request, host.lock_modifiers(device), &mut first);
        for action in &first {
            host.post_key(device, *action);
        }
        prop_assert_eq!(
            host.lock_modifiers(device),
            LockModifiers { caps_lock: caps, num_lock: num }
        );
        prop_assert_eq!(state.scroll_lock_state, scroll);

        let mut second = Vec::new();
        synchronize(&mut state, request, host.lock_modifiers(device), &mut second);
        prop_assert_eq!(
            second,
            vec![KeyAction::release(66), KeyAction::release(77), KeyAction::release(78)]
        );
    }

    #[test]
    fn sync_flags_decode_ignores_unknown_bits(flags in any::<u32>()) {
        let request = SyncRequest::from_flags(flags);
        prop_assert_eq!(request.to_flags(), flags & 0x7);
    }
}
