//! Key naming and config token parsing

use evdev::KeyCode;

/// Name for a code the driver has no name for.
/// Alphanumeric ASCII codes are shown as the character itself, anything else
/// as an escaped hex byte (`\x1B`).
pub fn fallback_key_name(code: u32) -> String {
    match char::from_u32(code) {
        Some(c) if c.is_ascii_alphanumeric() => c.to_string(),
        _ => format!("\\x{:02X}", code),
    }
}

/// Parse a literal escaped code (`\x1B`).
///
/// Returns `None` when `token` isn't an escape, `Some(None)` when it is one
/// but the digits don't parse.
pub fn parse_escaped_code(token: &str) -> Option<Option<u32>> {
    let digits = token.strip_prefix("\\x")?;
    Some(u32::from_str_radix(digits, 16).ok())
}

/// Resolve a config key token to a code.
///
/// Tries the escaped form, then the driver lookup `lookup`, then a single
/// printable ASCII character as its raw code.
pub fn resolve_key_token(token: &str, lookup: impl FnOnce(&str) -> Option<u32>) -> Option<u32> {
    if let Some(code) = parse_escaped_code(token) {
        return code;
    }

    if let Some(code) = lookup(token) {
        return Some(code);
    }

    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_graphic() => Some(c as u32),
        _ => None,
    }
}

/// Human-readable name for an evdev key code (for UI display)
pub fn key_code_to_name(code: u16) -> String {
    // Linux key name from evdev (e.g., "KEY_TAB", "BTN_SOUTH")
    let linux_name = format!("{:?}", KeyCode(code));

    let name = linux_name
        .strip_prefix("KEY_")
        .or_else(|| linux_name.strip_prefix("BTN_"))
        .unwrap_or(&linux_name);

    match name {
        "LEFTCTRL" => "Left Ctrl".to_string(),
        "RIGHTCTRL" => "Right Ctrl".to_string(),
        "LEFTSHIFT" => "Left Shift".to_string(),
        "RIGHTSHIFT" => "Right Shift".to_string(),
        "LEFTALT" => "Left Alt".to_string(),
        "RIGHTALT" => "Right Alt".to_string(),
        "LEFTMETA" => "Left Super".to_string(),
        "RIGHTMETA" => "Right Super".to_string(),

        "ESC" => "Esc".to_string(),
        "BACKSPACE" => "Backspace".to_string(),
        "ENTER" => "Enter".to_string(),
        "SPACE" => "Space".to_string(),
        "PAGEUP" => "Page Up".to_string(),
        "PAGEDOWN" => "Page Down".to_string(),

        // Gamepad face buttons
        "SOUTH" => "Pad South".to_string(),
        "EAST" => "Pad East".to_string(),
        "NORTH" => "Pad North".to_string(),
        "WEST" => "Pad West".to_string(),

        s if s.len() == 1 => s.to_string(),
        s if s.starts_with('F') && s.len() <= 3 => s.to_string(),

        // Everything else - underscores to spaces, title case
        s => s
            .replace('_', " ")
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.as_str().to_lowercase().chars())
                        .collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}
