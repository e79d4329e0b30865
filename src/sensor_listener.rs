use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::engine::EngineHandle;
use crate::error::EngineError;
use crate::position::PositionSample;

/// JSON datagram sent by the positioning driver
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SensorMessage {
    Fix {
        latitude: f64,
        longitude: f64,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        heading: Option<f64>,
        #[serde(default)]
        timestamp: Option<DateTime<Utc>>,
    },
    Error {
        message: String,
    },
}

/// What a datagram turned into once decoded
#[derive(Debug, PartialEq)]
pub enum SensorInput {
    Sample(PositionSample),
    Unavailable(String),
}

/// Decode one datagram. Missing speed/heading become 0 and a missing
/// timestamp becomes `received_at`.
pub fn parse_datagram(payload: &[u8], received_at: DateTime<Utc>) -> Result<SensorInput, EngineError> {
    let message: SensorMessage = serde_json::from_slice(payload)
        .map_err(|e| EngineError::InvalidSample(format!("malformed datagram: {}", e)))?;

    match message {
        SensorMessage::Fix { latitude, longitude, speed, heading, timestamp } => {
            let sample = PositionSample::new(latitude, longitude, speed, heading, timestamp.unwrap_or(received_at))?;
            Ok(SensorInput::Sample(sample))
        }
        SensorMessage::Error { message } => Ok(SensorInput::Unavailable(message)),
    }
}

/// Receive sensor datagrams until the engine goes away
pub async fn run_sensor_listener(bind_address: String, engine: EngineHandle) -> std::io::Result<()> {
    let socket = UdpSocket::bind(&bind_address).await?;
    info!("Listening for position datagrams on udp://{}", socket.local_addr()?);

    let mut buf = [0u8; 2048];
    let mut bad_datagrams: u64 = 0;

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("Error receiving sensor datagram: {}", e);
                continue;
            }
        };

        let delivered = match parse_datagram(&buf[..len], Utc::now()) {
            Ok(SensorInput::Sample(sample)) => engine.submit_sample(sample),
            Ok(SensorInput::Unavailable(message)) => engine.report_sensor_error(message),
            Err(e) => {
                bad_datagrams += 1;
                if bad_datagrams <= 10 || bad_datagrams % 100 == 0 {
                    warn!("Ignoring datagram from {} ({} so far): {}", peer, bad_datagrams, e);
                } else {
                    debug!("Ignoring datagram from {}: {}", peer, e);
                }
                Ok(())
            }
        };

        if let Err(EngineError::EngineStopped) = delivered {
            info!("Engine stopped, closing sensor listener");
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::Engine;
    use std::time::Duration;

    #[test]
    fn test_parse_fix_with_defaults() {
        let now = Utc::now();
        let input = parse_datagram(br#"{"type":"fix","latitude":47.0,"longitude":8.0}"#, now).unwrap();
        match input {
            SensorInput::Sample(sample) => {
                assert_eq!(sample.latitude, 47.0);
                assert_eq!(sample.speed_mps, 0.0);
                assert_eq!(sample.heading_deg, 0.0);
                assert_eq!(sample.observed_at, now);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_fix_with_all_fields() {
        let json = br#"{"type":"fix","latitude":-33.5,"longitude":151.2,"speed":3.5,"heading":182.0,"timestamp":"2024-06-01T10:00:00Z"}"#;
        let SensorInput::Sample(sample) = parse_datagram(json, Utc::now()).unwrap() else {
            panic!("expected a sample");
        };
        assert_eq!(sample.speed_mps, 3.5);
        assert_eq!(sample.heading_deg, 182.0);
        assert_eq!(sample.observed_at.to_rfc3339(), "2024-06-01T10:00:00+00:00");
    }

    #[test]
    fn test_parse_error_notification() {
        let input = parse_datagram(br#"{"type":"error","message":"no fix"}"#, Utc::now()).unwrap();
        assert_eq!(input, SensorInput::Unavailable("no fix".to_string()));
    }

    #[test]
    fn test_parse_rejects_garbage_and_out_of_range() {
        assert!(parse_datagram(b"not json", Utc::now()).is_err());
        assert!(parse_datagram(br#"{"type":"fix","latitude":91.0,"longitude":8.0}"#, Utc::now()).is_err());
        assert!(parse_datagram(br#"{"type":"unknown"}"#, Utc::now()).is_err());
    }

    #[tokio::test]
    async fn test_listener_feeds_engine() {
        let mut config = Config::default();
        config.sensor.enabled = false;
        let (engine, _task) = Engine::spawn(&config);

        // Reserve a free port, then hand it to the listener
        let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let address = probe.local_addr().unwrap();
        drop(probe);

        tokio::spawn(run_sensor_listener(address.to_string(), engine.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"garbage", address).await.unwrap();
        sender
            .send_to(br#"{"type":"fix","latitude":47.0,"longitude":8.0,"speed":1.0}"#, address)
            .await
            .unwrap();

        let mut received = false;
        for _ in 0..50 {
            if engine.status().await.unwrap().latest_position.is_some() {
                received = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(received);
    }
}
