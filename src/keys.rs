//! Named-key translation table for `send_key`.

use crate::error::{DaemonError, Result};

/// Translate a named key (`Enter`, `C-c`, `Up`, ...) to the byte sequence
/// written to the PTY. Unknown names are rejected rather than silently
/// passed through as text (that's what `send_keys` is for).
pub fn translate(name: &str) -> Result<&'static [u8]> {
    let bytes: &'static [u8] = match name {
        "Enter" => b"\r",
        "Escape" => b"\x1b",
        "BSpace" => b"\x7f",
        "Tab" => b"\t",
        "Space" => b" ",
        "C-c" => b"\x03",
        "C-d" => b"\x04",
        "C-z" => b"\x1a",
        "Up" => b"\x1b[A",
        "Down" => b"\x1b[B",
        "Right" => b"\x1b[C",
        "Left" => b"\x1b[D",
        "Home" => b"\x1b[H",
        "End" => b"\x1b[F",
        "DC" => b"\x1b[3~",
        "PageUp" => b"\x1b[5~",
        "PageDown" => b"\x1b[6~",
        other => return Err(DaemonError::ActionRejected(format!("unknown key: {}", other))),
    };
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_every_documented_key() {
        for name in [
            "Enter", "Escape", "BSpace", "Tab", "Space", "C-c", "C-d", "C-z", "Up", "Down",
            "Right", "Left", "Home", "End", "DC", "PageUp", "PageDown",
        ] {
            assert!(translate(name).is_ok(), "{} should translate", name);
        }
    }

    #[test]
    fn enter_is_carriage_return() {
        assert_eq!(translate("Enter").unwrap(), b"\r");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = translate("F13").unwrap_err();
        assert!(matches!(err, DaemonError::ActionRejected(_)));
    }
}
