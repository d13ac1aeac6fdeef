/// Renders a record key or payload for display.
/// UTF-8 is shown as-is, anything else as `0x`-prefixed hex.
pub fn payload_to_text(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", hex::encode(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_and_binary() {
        assert_eq!(payload_to_text(b"{\"a\":1}"), "{\"a\":1}");
        assert_eq!(payload_to_text(&[0xff, 0x00, 0x10]), "0xff0010");
        assert_eq!(payload_to_text(b""), "");
    }
}
