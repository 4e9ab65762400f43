use rdev::Key;

const KEY_NAMES: &[(Key, &str)] = &[
    (Key::F1, "f1"),
    (Key::F2, "f2"),
    (Key::F3, "f3"),
    (Key::F4, "f4"),
    (Key::F5, "f5"),
    (Key::F6, "f6"),
    (Key::F7, "f7"),
    (Key::F8, "f8"),
    (Key::F9, "f9"),
    (Key::F10, "f10"),
    (Key::F11, "f11"),
    (Key::F12, "f12"),
    (Key::KeyA, "a"),
    (Key::KeyB, "b"),
    (Key::KeyC, "c"),
    (Key::KeyD, "d"),
    (Key::KeyE, "e"),
    (Key::KeyF, "f"),
    (Key::KeyG, "g"),
    (Key::KeyH, "h"),
    (Key::KeyI, "i"),
    (Key::KeyJ, "j"),
    (Key::KeyK, "k"),
    (Key::KeyL, "l"),
    (Key::KeyM, "m"),
    (Key::KeyN, "n"),
    (Key::KeyO, "o"),
    (Key::KeyP, "p"),
    (Key::KeyQ, "q"),
    (Key::KeyR, "r"),
    (Key::KeyS, "s"),
    (Key::KeyT, "t"),
    (Key::KeyU, "u"),
    (Key::KeyV, "v"),
    (Key::KeyW, "w"),
    (Key::KeyX, "x"),
    (Key::KeyY, "y"),
    (Key::KeyZ, "z"),
    (Key::Num0, "0"),
    (Key::Num1, "1"),
    (Key::Num2, "2"),
    (Key::Num3, "3"),
    (Key::Num4, "4"),
    (Key::Num5, "5"),
    (Key::Num6, "6"),
    (Key::Num7, "7"),
    (Key::Num8, "8"),
    (Key::Num9, "9"),
    (Key::Space, "space"),
    (Key::Return, "enter"),
    (Key::Escape, "esc"),
    (Key::Tab, "tab"),
    (Key::Backspace, "backspace"),
    (Key::CapsLock, "caps_lock"),
    (Key::ShiftLeft, "shift"),
    (Key::ShiftRight, "shift_r"),
    (Key::ControlLeft, "ctrl_l"),
    (Key::ControlRight, "ctrl_r"),
    (Key::Alt, "alt_l"),
    (Key::AltGr, "alt_gr"),
    (Key::MetaLeft, "cmd"),
    (Key::MetaRight, "cmd_r"),
    (Key::Home, "home"),
    (Key::End, "end"),
    (Key::PageUp, "page_up"),
    (Key::PageDown, "page_down"),
    (Key::Insert, "insert"),
    (Key::Delete, "delete"),
    (Key::UpArrow, "up"),
    (Key::DownArrow, "down"),
    (Key::LeftArrow, "left"),
    (Key::RightArrow, "right"),
    (Key::PrintScreen, "print_screen"),
    (Key::ScrollLock, "scroll_lock"),
    (Key::Pause, "pause"),
    (Key::NumLock, "num_lock"),
    (Key::Minus, "-"),
    (Key::Equal, "="),
    (Key::LeftBracket, "["),
    (Key::RightBracket, "]"),
    (Key::SemiColon, ";"),
    (Key::Quote, "'"),
    (Key::BackQuote, "`"),
    (Key::BackSlash, "\\"),
    (Key::Comma, ","),
    (Key::Dot, "."),
    (Key::Slash, "/"),
];

// Spellings accepted when reading settings written by hand or by older builds.
const ALIASES: &[(&str, Key)] = &[
    ("return", Key::Return),
    ("escape", Key::Escape),
    ("shift_l", Key::ShiftLeft),
    ("ctrl", Key::ControlLeft),
    ("control_l", Key::ControlLeft),
    ("control_r", Key::ControlRight),
    ("alt", Key::Alt),
    ("cmd_l", Key::MetaLeft),
    ("prior", Key::PageUp),
    ("next", Key::PageDown),
];

pub fn key_name(key: Key) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, name)| *name)
}

pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim().to_lowercase();
    KEY_NAMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(k, _)| *k)
        .or_else(|| ALIASES.iter().find(|(n, _)| *n == name).map(|(_, k)| *k))
}

/// Label text for a key, e.g. `F8` or `PAGE_UP`.
pub fn display_name(key: Key) -> String {
    match key_name(key) {
        Some(name) => name.to_uppercase(),
        None => format!("{:?}", key),
    }
}
