/// Hex blake3 digest of serialized DOM content.
pub fn content_hash(dom: &str) -> String {
    blake3::hash(dom.as_bytes()).to_hex().to_string()
}
