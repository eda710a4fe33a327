use super::CsqError;

pub const CSQ_COMMAND: &[u8] = b"AT+CSQ\r\n";
const CSQ_PREFIX: &str = "+CSQ:";

/// Whether `line` is a final result code that ends an AT response.
pub fn is_final_line(line: &str) -> bool {
    line.contains("OK") || line.contains("ERROR")
}

/// Extract `(rssi, rsrq)` from the lines of an `AT+CSQ` response.
///
/// Only the first `+CSQ:` line is considered.
pub fn parse_csq<S: AsRef<str>>(lines: &[S]) -> Result<(i32, i32), CsqError> {
    let payload = lines
        .iter()
        .map(|line| line.as_ref().trim())
        .find_map(|line| line.strip_prefix(CSQ_PREFIX))
        .ok_or(CsqError::NoResponse)?;

    let malformed = || CsqError::Malformed(payload.trim().to_string());

    let mut fields = payload.split(',').map(|field| field.trim().parse::<i32>());
    match (fields.next(), fields.next(), fields.next()) {
        (Some(Ok(rssi)), Some(Ok(rsrq)), None) => Ok((rssi, rsrq)),
        _ => Err(malformed()),
    }
}
