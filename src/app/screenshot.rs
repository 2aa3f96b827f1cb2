use std::fs::File;
use std::io::Read;
use std::path::Path;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

pub fn check_png_header(bytes: &[u8]) -> Result<(), String> {
    if bytes.is_empty() {
        return Err("Screenshot data is empty".to_string());
    }
    if bytes.len() < PNG_SIGNATURE.len() || !bytes.starts_with(PNG_SIGNATURE) {
        return Err("Screenshot data is not a PNG".to_string());
    }
    Ok(())
}

/// Confirms a screenshot written by `screencap -p` landed on disk as a PNG
/// and returns its size in bytes.
pub fn verify_png_file(path: &Path) -> Result<u64, String> {
    let mut file = File::open(path)
        .map_err(|err| format!("Screenshot {} not readable: {err}", path.display()))?;
    let size = file
        .metadata()
        .map_err(|err| format!("Screenshot {} not readable: {err}", path.display()))?
        .len();
    let mut header = Vec::with_capacity(PNG_SIGNATURE.len());
    file.by_ref()
        .take(PNG_SIGNATURE.len() as u64)
        .read_to_end(&mut header)
        .map_err(|err| format!("Failed to read screenshot {}: {err}", path.display()))?;
    check_png_header(&header).map_err(|err| format!("{err}: {}", path.display()))?;
    Ok(size)
}
