use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::time::{Duration, Instant};

use bon::Builder;
use serialport::SerialPort;
use tracing::{debug, info};

use super::ModemError;
use super::csq::is_final_line;

/// Serial settings for the cellular modem's AT command port.
#[derive(Debug, Clone, Builder)]
pub struct ModemConfig {
    #[builder(default = "/dev/ttyUSB2".to_string())]
    pub port: String,

    #[builder(default = 9600)]
    pub baud_rate: u32,

    /// Per-read timeout on the serial line.
    #[builder(default = Duration::from_secs(1))]
    pub read_timeout: Duration,

    /// Upper bound on collecting one whole response.
    #[builder(default = Duration::from_secs(3))]
    pub response_timeout: Duration,
}

/// A line-oriented AT command channel to the modem.
///
/// Blocking; the signal monitor owns its transport on a dedicated thread.
pub trait ModemTransport: Send {
    /// Send `command` and collect response lines up to and including the final result code.
    ///
    /// A read timeout, the response deadline or the line cap ends the response early; whatever
    /// was read so far is returned.
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<String>, ModemError>;
}

/// Most lines accepted for one response, unsolicited result codes included.
const MAX_RESPONSE_LINES: usize = 32;

/// [`ModemTransport`] over a serial port.
pub struct SerialModem {
    reader: BufReader<Box<dyn SerialPort>>,
    response_timeout: Duration,
}

impl SerialModem {
    pub fn open(config: &ModemConfig) -> Result<Self, ModemError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| ModemError::Open {
                port: config.port.clone(),
                source,
            })?;

        info!(port = %config.port, baud = config.baud_rate, "Opened modem port");

        Ok(Self {
            reader: BufReader::new(port),
            response_timeout: config.response_timeout,
        })
    }
}

impl ModemTransport for SerialModem {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<String>, ModemError> {
        self.reader.get_mut().write_all(command)?;
        let deadline = Instant::now() + self.response_timeout;
        read_response(&mut self.reader, MAX_RESPONSE_LINES, deadline)
    }
}

/// Read response lines until a final result code, a read timeout, EOF, `max_lines` lines or
/// `deadline`, whichever comes first.
fn read_response<R: BufRead>(
    reader: &mut R,
    max_lines: usize,
    deadline: Instant,
) -> Result<Vec<String>, ModemError> {
    let mut lines = Vec::new();
    while lines.len() < max_lines {
        if Instant::now() >= deadline {
            debug!(lines = lines.len(), "Modem response deadline passed");
            break;
        }

        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let done = is_final_line(&line);
                lines.push(line);
                if done {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                debug!(lines = lines.len(), "Modem read timed out");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(lines)
}
