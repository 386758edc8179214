use std::path::PathBuf;

const DIR_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

/// Relative path of the overflow file for a message.
///
/// Messages are spread over directories of 8192 files. The directory name
/// is `id >> 13` written in base 32, least significant digit first.
pub fn message_path(message_id: i64) -> PathBuf {
    let mut v = message_id >> 13;
    let mut dir = String::new();
    loop {
        dir.push(DIR_ALPHABET[(v & 0x1f) as usize] as char);
        v >>= 5;
        if v == 0 {
            break;
        }
    }
    PathBuf::from(dir).join(message_id.to_string())
}
