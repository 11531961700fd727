//! Terminal output helpers shared by the commands.

use std::io::Write;

pub fn write_error(err: &mut dyn Write, msg: &str) -> std::io::Result<()> {
    writeln!(err, "Error: {}", msg)
}

/// Display a warning message to stderr with "WARNING:" prefix
pub fn display_warning(err: &mut dyn Write, message: &str) -> std::io::Result<()> {
    writeln!(err, "WARNING: {}", message)
}

/// Card codes joined by single spaces, e.g. `"AS KD 7C"`.
pub fn card_line<C: std::fmt::Display>(cards: &[C]) -> String {
    cards
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_prefix() {
        let mut err = Vec::new();
        write_error(&mut err, "boom").unwrap();
        assert_eq!(String::from_utf8(err).unwrap(), "Error: boom\n");
    }

    #[test]
    fn test_display_warning_prefix() {
        let mut err = Vec::new();
        display_warning(&mut err, "careful").unwrap();
        assert_eq!(String::from_utf8(err).unwrap(), "WARNING: careful\n");
    }

    #[test]
    fn test_card_line() {
        let cards: Vec<cardtable_engine::cards::Card> =
            ["AS", "TD"].iter().map(|c| c.parse().unwrap()).collect();
        assert_eq!(card_line(&cards), "AS TD");
        assert_eq!(card_line::<String>(&[]), "");
    }
}
