//! Cellular signal quality from the modem's `AT+CSQ` response.

pub mod csq;
pub mod error;
pub mod modem;
pub mod monitor;

use serde::{Deserialize, Serialize};

pub use self::error::{CsqError, ModemError};
pub use self::modem::{ModemTransport, SerialModem};
pub use self::monitor::{SignalMonitor, SignalMonitorHandle};

/// Six-level signal indicator shown next to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Excellent,
    Good,
    Ok,
    Weak,
    None,
    /// The modem gave no usable answer.
    Error,
}

impl SignalQuality {
    pub fn icon(self) -> &'static str {
        match self {
            Self::Excellent => "excellent.png",
            Self::Good => "good.png",
            Self::Ok => "ok.png",
            Self::Weak => "weak.png",
            Self::None => "offline.png",
            Self::Error => "error.png",
        }
    }

    pub fn tooltip(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent Signal",
            Self::Good => "Good Signal",
            Self::Ok => "OK Signal",
            Self::Weak => "Weak Signal",
            Self::None => "No Signal",
            Self::Error => "Error: No CSQ or unexpected value",
        }
    }
}

/// Classify raw `(rssi, rsrq)` readings. Missing values classify as [`SignalQuality::Error`].
pub fn classify(rssi: Option<i32>, rsrq: Option<i32>) -> SignalQuality {
    let (Some(rssi), Some(rsrq)) = (rssi, rsrq) else {
        return SignalQuality::Error;
    };

    match (rssi, rsrq) {
        (31.., ..=3) => SignalQuality::Excellent,
        (22.., ..=3) => SignalQuality::Good,
        (12.., ..=6) => SignalQuality::Ok,
        (2.., ..=7) => SignalQuality::Weak,
        _ => SignalQuality::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_table() {
        assert_eq!(classify(Some(31), Some(2)), SignalQuality::Excellent);
        assert_eq!(classify(Some(22), Some(3)), SignalQuality::Good);
        assert_eq!(classify(Some(12), Some(6)), SignalQuality::Ok);
        assert_eq!(classify(Some(2), Some(7)), SignalQuality::Weak);
        assert_eq!(classify(Some(1), Some(8)), SignalQuality::None);
        assert_eq!(classify(None, Some(3)), SignalQuality::Error);
        assert_eq!(classify(Some(20), None), SignalQuality::Error);
    }

    #[test]
    fn test_classify_falls_through_on_rsrq() {
        // Strong rssi does not help if rsrq is poor.
        assert_eq!(classify(Some(31), Some(4)), SignalQuality::Ok);
        assert_eq!(classify(Some(31), Some(7)), SignalQuality::Weak);
        assert_eq!(classify(Some(31), Some(8)), SignalQuality::None);
    }

    #[test]
    fn test_classify_unknown_rssi() {
        // 99 is the modem's "not known or not detectable" rssi.
        assert_eq!(classify(Some(99), Some(99)), SignalQuality::None);
    }
}
