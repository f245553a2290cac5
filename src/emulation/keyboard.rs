use bitflags::bitflags;

bitflags! {
    /// Keyboard modifiers in xterm parameter order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const META  = 1 << 3;
    }
}

impl Modifiers {
    /// The `;m` parameter of modified CSI sequences (2 = shift, 3 = alt...).
    fn xterm_param(self) -> u8 {
        1 + self.bits()
    }
}

/// Keys the core knows how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
}

/// Modes that influence key translation, snapshotted by the emulation at
/// the time of the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyContext {
    pub application_cursor_keys: bool,
    pub application_keypad: bool,
    /// LNM: Enter sends CR LF.
    pub newline_mode: bool,
    /// DECBKM: Backspace sends BS instead of DEL.
    pub backarrow_sends_bs: bool,
}

/// Host-supplied key-binding table. A binding that returns `None` falls
/// through to the built-in xterm encoding.
pub trait KeyBindingTable {
    fn lookup(&self, key: KeyCode, modifiers: Modifiers, context: &KeyContext) -> Option<Vec<u8>>;
}

/// The empty table: everything falls through to [`encode_key`].
#[derive(Debug, Default)]
pub struct DefaultKeyTable;

impl KeyBindingTable for DefaultKeyTable {
    fn lookup(&self, _: KeyCode, _: Modifiers, _: &KeyContext) -> Option<Vec<u8>> {
        None
    }
}

/// Built-in xterm-compatible key encoding.
pub fn encode_key(key: KeyCode, modifiers: Modifiers, context: &KeyContext) -> Vec<u8> {
    let modified = !modifiers.is_empty();
    match key {
        KeyCode::Char(c) => encode_char(c, modifiers),
        KeyCode::Enter => {
            let base: &[u8] = if context.newline_mode { b"\r\n" } else { b"\r" };
            with_alt_prefix(base.to_vec(), modifiers)
        }
        KeyCode::Tab => {
            if modifiers.contains(Modifiers::SHIFT) {
                b"\x1b[Z".to_vec()
            } else {
                with_alt_prefix(b"\t".to_vec(), modifiers)
            }
        }
        KeyCode::Backspace => {
            let byte = if context.backarrow_sends_bs { 0x08 } else { 0x7f };
            with_alt_prefix(vec![byte], modifiers)
        }
        KeyCode::Escape => with_alt_prefix(vec![0x1b], modifiers),
        KeyCode::Up => cursor_key(b'A', modifiers, context),
        KeyCode::Down => cursor_key(b'B', modifiers, context),
        KeyCode::Right => cursor_key(b'C', modifiers, context),
        KeyCode::Left => cursor_key(b'D', modifiers, context),
        KeyCode::Home => cursor_key(b'H', modifiers, context),
        KeyCode::End => cursor_key(b'F', modifiers, context),
        KeyCode::Insert => tilde_key(2, modifiers),
        KeyCode::Delete => tilde_key(3, modifiers),
        KeyCode::PageUp => tilde_key(5, modifiers),
        KeyCode::PageDown => tilde_key(6, modifiers),
        KeyCode::F(n @ 1..=4) => {
            let final_byte = b'P' + (n - 1);
            if modified {
                format!("\x1b[1;{}{}", modifiers.xterm_param(), final_byte as char).into_bytes()
            } else {
                format!("\x1bO{}", final_byte as char).into_bytes()
            }
        }
        KeyCode::F(n @ 5..=12) => {
            let code = match n {
                5 => 15,
                6 => 17,
                7 => 18,
                8 => 19,
                9 => 20,
                10 => 21,
                11 => 23,
                _ => 24,
            };
            tilde_key(code, modifiers)
        }
        KeyCode::F(_) => Vec::new(),
    }
}

fn encode_char(c: char, modifiers: Modifiers) -> Vec<u8> {
    let mut bytes = if modifiers.contains(Modifiers::CTRL) {
        match c {
            'a'..='z' => vec![c as u8 - b'a' + 1],
            'A'..='Z' => vec![c as u8 - b'A' + 1],
            '@' | ' ' => vec![0],
            '[' => vec![0x1b],
            '\\' => vec![0x1c],
            ']' => vec![0x1d],
            '^' => vec![0x1e],
            '_' | '/' => vec![0x1f],
            '?' => vec![0x7f],
            _ => c.to_string().into_bytes(),
        }
    } else {
        c.to_string().into_bytes()
    };
    if modifiers.contains(Modifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    bytes
}

fn with_alt_prefix(mut bytes: Vec<u8>, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.contains(Modifiers::ALT) {
        bytes.insert(0, 0x1b);
    }
    bytes
}

fn cursor_key(final_byte: u8, modifiers: Modifiers, context: &KeyContext) -> Vec<u8> {
    if !modifiers.is_empty() {
        format!("\x1b[1;{}{}", modifiers.xterm_param(), final_byte as char).into_bytes()
    } else if context.application_cursor_keys {
        format!("\x1bO{}", final_byte as char).into_bytes()
    } else {
        format!("\x1b[{}", final_byte as char).into_bytes()
    }
}

fn tilde_key(code: u8, modifiers: Modifiers) -> Vec<u8> {
    if modifiers.is_empty() {
        format!("\x1b[{code}~").into_bytes()
    } else {
        format!("\x1b[{code};{}~", modifiers.xterm_param()).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_keys_switch_with_application_mode() {
        let normal = KeyContext::default();
        let app = KeyContext {
            application_cursor_keys: true,
            ..KeyContext::default()
        };
        assert_eq!(encode_key(KeyCode::Up, Modifiers::empty(), &normal), b"\x1b[A");
        assert_eq!(encode_key(KeyCode::Up, Modifiers::empty(), &app), b"\x1bOA");
    }

    #[test]
    fn modified_cursor_keys_use_csi_with_parameter() {
        let ctx = KeyContext {
            application_cursor_keys: true,
            ..KeyContext::default()
        };
        // Modifiers force CSI form even in application mode.
        assert_eq!(
            encode_key(KeyCode::Right, Modifiers::CTRL, &ctx),
            b"\x1b[1;5C"
        );
        assert_eq!(
            encode_key(KeyCode::Up, Modifiers::SHIFT | Modifiers::ALT, &ctx),
            b"\x1b[1;4A"
        );
    }

    #[test]
    fn control_characters_and_alt_prefix() {
        assert_eq!(encode_key(KeyCode::Char('c'), Modifiers::CTRL, &KeyContext::default()), vec![3]);
        assert_eq!(
            encode_key(KeyCode::Char('x'), Modifiers::ALT, &KeyContext::default()),
            vec![0x1b, b'x']
        );
        assert_eq!(
            encode_key(KeyCode::Char('c'), Modifiers::CTRL | Modifiers::ALT, &KeyContext::default()),
            vec![0x1b, 3]
        );
    }

    #[test]
    fn function_keys_encode_ss3_and_tilde_forms() {
        let ctx = KeyContext::default();
        assert_eq!(encode_key(KeyCode::F(1), Modifiers::empty(), &ctx), b"\x1bOP");
        assert_eq!(encode_key(KeyCode::F(5), Modifiers::empty(), &ctx), b"\x1b[15~");
        assert_eq!(encode_key(KeyCode::F(12), Modifiers::SHIFT, &ctx), b"\x1b[24;2~");
    }

    #[test]
    fn backspace_honours_backarrow_mode() {
        let del = KeyContext::default();
        let bs = KeyContext {
            backarrow_sends_bs: true,
            ..KeyContext::default()
        };
        assert_eq!(encode_key(KeyCode::Backspace, Modifiers::empty(), &del), vec![0x7f]);
        assert_eq!(encode_key(KeyCode::Backspace, Modifiers::empty(), &bs), vec![0x08]);
    }

    #[test]
    fn enter_sends_crlf_in_newline_mode() {
        let ctx = KeyContext {
            newline_mode: true,
            ..KeyContext::default()
        };
        assert_eq!(encode_key(KeyCode::Enter, Modifiers::empty(), &ctx), b"\r\n");
    }
}
