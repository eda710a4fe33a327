use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info};

use super::{FixQuality, GpsError, Position, PositionSource};

pub const DEFAULT_GPSD_ADDR: &str = "127.0.0.1:2947";

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true};\n";
const POLL_COMMAND: &[u8] = b"?POLL;\n";

/// Client for the gpsd JSON socket protocol using the `?POLL;` request/response cycle.
pub struct GpsdClient {
    addr: String,
    timeout: Duration,
    conn: Option<Connection>,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl GpsdClient {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
            conn: None,
        }
    }

    async fn open(&self) -> Result<Connection, GpsError> {
        let stream = TcpStream::connect(&self.addr).await?;
        let (read, write) = stream.into_split();
        let mut conn = Connection {
            reader: BufReader::new(read),
            writer: write,
        };

        // gpsd greets with a VERSION object before accepting commands.
        let banner = conn.read_line().await?;
        debug!(banner = %banner.trim(), "gpsd greeting");

        conn.writer.write_all(WATCH_COMMAND).await?;
        Ok(conn)
    }

    async fn poll(conn: &mut Connection) -> Result<Position, GpsError> {
        conn.writer.write_all(POLL_COMMAND).await?;
        loop {
            let line = conn.read_line().await?;
            if let Some(position) = parse_poll(&line)? {
                return Ok(position);
            }
        }
    }
}

impl Connection {
    async fn read_line(&mut self) -> Result<String, GpsError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(GpsError::Closed);
        }
        Ok(line)
    }
}

impl PositionSource for GpsdClient {
    async fn connect(&mut self) -> Result<(), GpsError> {
        let conn = tokio::time::timeout(self.timeout, self.open()).await??;
        info!(addr = %self.addr, "Connected to gpsd");
        self.conn = Some(conn);
        Ok(())
    }

    async fn get_current(&mut self) -> Result<Position, GpsError> {
        let conn = self.conn.as_mut().ok_or(GpsError::NotConnected)?;
        match tokio::time::timeout(self.timeout, Self::poll(conn)).await {
            Ok(Ok(position)) => Ok(position),
            Ok(Err(e)) => {
                // The socket is in an unknown state; reconnect on the next poll.
                self.conn = None;
                Err(e)
            }
            Err(elapsed) => {
                self.conn = None;
                Err(elapsed.into())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    class: String,
    #[serde(default)]
    tpv: Vec<Tpv>,
}

#[derive(Debug, Deserialize)]
struct Tpv {
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    track: Option<f64>,
}

/// Parse one line of gpsd output, returning a position only for `POLL` responses.
///
/// Other report classes (`TPV`, `SKY`, `DEVICES`, `WATCH`) are skipped with `Ok(None)`.
fn parse_poll(line: &str) -> Result<Option<Position>, serde_json::Error> {
    let report: Report = serde_json::from_str(line.trim())?;
    if report.class != "POLL" {
        return Ok(None);
    }

    let position = report
        .tpv
        .first()
        .and_then(|tpv| {
            let fix = FixQuality::from_mode(tpv.mode);
            match (tpv.lat, tpv.lon) {
                (Some(latitude), Some(longitude)) => Some(Position {
                    latitude,
                    longitude,
                    heading: tpv.track,
                    fix,
                }),
                // A fix without coordinates is no fix at all.
                _ => None,
            }
        })
        .unwrap_or_else(Position::no_fix);

    Ok(Some(position))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poll_with_3d_fix() {
        let line = r#"{"class":"POLL","time":"2024-05-01T12:00:00.000Z","active":1,"tpv":[{"class":"TPV","device":"/dev/ttyACM0","mode":3,"lat":47.643753,"lon":-122.386807,"track":181.5}],"sky":[]}"#;

        let position = parse_poll(line).unwrap().unwrap();
        assert_eq!(position.fix, FixQuality::Fix3d);
        assert_eq!(position.latitude, 47.643753);
        assert_eq!(position.longitude, -122.386807);
        assert_eq!(position.heading, Some(181.5));
    }

    #[test]
    fn test_parse_poll_without_fix() {
        let line = r#"{"class":"POLL","active":1,"tpv":[{"class":"TPV","mode":1}]}"#;

        let position = parse_poll(line).unwrap().unwrap();
        assert_eq!(position.fix, FixQuality::NoFix);
        assert!(!position.fix.has_fix());
    }

    #[test]
    fn test_parse_poll_empty_tpv() {
        let line = r#"{"class":"POLL","active":0,"tpv":[],"sky":[]}"#;
        assert_eq!(parse_poll(line).unwrap(), Some(Position::no_fix()));
    }

    #[test]
    fn test_other_classes_skipped() {
        let line = r#"{"class":"TPV","mode":3,"lat":1.0,"lon":2.0}"#;
        assert_eq!(parse_poll(line).unwrap(), None);

        let line = r#"{"class":"WATCH","enable":true}"#;
        assert_eq!(parse_poll(line).unwrap(), None);
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(parse_poll("not json").is_err());
    }

    #[tokio::test]
    async fn test_get_current_before_connect() {
        let mut client = GpsdClient::new(DEFAULT_GPSD_ADDR, Duration::from_secs(1));
        let result = client.get_current().await;
        assert!(matches!(result, Err(GpsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_poll_against_fake_daemon() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut socket) = socket.into_split();
            socket
                .write_all(b"{\"class\":\"VERSION\",\"release\":\"3.25\"}\n")
                .await
                .unwrap();
            let mut lines = BufReader::new(read).lines();
            while let Some(line) = lines.next_line().await.unwrap() {
                if line.starts_with("?POLL;") {
                    break;
                }
            }
            socket
                .write_all(b"{\"class\":\"TPV\",\"mode\":2}\n{\"class\":\"POLL\",\"tpv\":[{\"mode\":2,\"lat\":10.5,\"lon\":20.25}]}\n")
                .await
                .unwrap();
        });

        let mut client = GpsdClient::new(addr.to_string(), Duration::from_secs(5));
        client.connect().await.unwrap();
        let position = client.get_current().await.unwrap();
        assert_eq!(position.fix, FixQuality::Fix2d);
        assert_eq!(position.latitude, 10.5);
        assert_eq!(position.longitude, 20.25);
        assert_eq!(position.heading, None);
    }
}
