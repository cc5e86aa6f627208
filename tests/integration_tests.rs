//! Integration Tests for the GeoCom Library
//!
//! This module contains integration tests that exercise the library
//! components working together in realistic scenarios: full session
//! handshakes, measurement exchanges and line recovery, all against a
//! scripted byte channel standing in for the instrument.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use geocom::*;

/// Scripted instrument channel for testing without serial hardware
///
/// Each expectation pairs a request line with the reply the "instrument"
/// sends back. Replies are released only after the matching request has
/// been written; an exhausted or mismatched script reads as a quiet line,
/// which is exactly how a confused instrument behaves.
pub struct ScriptedInstrument {
    expectations: VecDeque<(String, String)>,
    pending: VecDeque<u8>,
    line_buf: Vec<u8>,
    timeout: Duration,
}

impl ScriptedInstrument {
    pub fn new() -> Self {
        Self {
            expectations: VecDeque::new(),
            pending: VecDeque::new(),
            line_buf: Vec::new(),
            timeout: Duration::from_millis(25),
        }
    }

    /// Queue an expected request line (no terminator) and its reply
    pub fn expect(mut self, request: &str, reply: &str) -> Self {
        self.expectations
            .push_back((request.to_string(), reply.to_string()));
        self
    }
}

impl ByteChannel for ScriptedInstrument {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.pending.pop_front() {
            Some(b) => {
                buf[0] = b;
                Ok(1)
            }
            None => Err(io::Error::new(io::ErrorKind::TimedOut, "line is quiet")),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        for &b in data {
            self.line_buf.push(b);
            if self.line_buf.ends_with(b"\r\n") {
                let line = String::from_utf8_lossy(&self.line_buf[..self.line_buf.len() - 2])
                    .into_owned();
                self.line_buf.clear();
                if let Some((expected, reply)) = self.expectations.front() {
                    if *expected == line {
                        self.pending.extend(reply.as_bytes());
                        self.pending.extend(b"\r\n");
                        self.expectations.pop_front();
                    }
                }
            }
        }
        // A lone buffer-clear newline never matches an expectation.
        if self.line_buf == b"\n" {
            self.line_buf.clear();
        }
        Ok(())
    }

    fn clear_input(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn fast_config() -> GeoComConfig {
    GeoComConfig {
        retry_delay: Duration::from_millis(1),
        ..GeoComConfig::default()
    }
}

fn handshake_script() -> ScriptedInstrument {
    ScriptedInstrument::new()
        .expect("%R1Q,0:", "%R1P,0,0:0")
        .expect("%R1Q,108:", "%R1P,0,0:0,15")
}

/// Full GeoCom session: handshake, a date/time query, a measurement with
/// angles, and an instrument-side rejection
#[test]
fn test_geocom_session_flow() {
    let instrument = handshake_script()
        // CSV_GetDateTime
        .expect(
            "%R1Q,5008:",
            "%R1P,0,0:0,1996,'07','19','10','13','2f'",
        )
        // TMC_GetAngle5
        .expect("%R1Q,2107:0", "%R1P,0,0:0,1.5707963,0.7853981")
        // TMC_DoMeasure with an unsupported program
        .expect("%R1Q,2008:99,0", "%R1P,0,0:2");

    let mut client = GeoComClient::connect(instrument, fast_config()).unwrap();
    assert_eq!(client.precision(), 15);

    let date_fields = [
        FieldKind::Int,
        FieldKind::Byte,
        FieldKind::Byte,
        FieldKind::Byte,
        FieldKind::Byte,
        FieldKind::Byte,
    ];
    let resp = client.request(5008, &[], &date_fields);
    assert!(resp.status_ok());
    assert_eq!(resp.int(0).unwrap(), 1996);
    assert_eq!(resp.byte(1).unwrap(), 7);
    assert_eq!(resp.byte(5).unwrap(), 0x2F);

    let resp = client.request(2107, &[0i64.into()], &[FieldKind::Angle, FieldKind::Angle]);
    assert!(resp.status_ok());
    assert!((resp.angle(0).unwrap().degrees() - 90.0).abs() < 1e-4);
    assert!((resp.angle(1).unwrap().degrees() - 45.0).abs() < 1e-4);

    let resp = client.request(2008, &[99i64.into(), false.into()], &[]);
    assert!(!resp.status_ok());
    assert_eq!(resp.com_status, GeoComCode::Ok);
    assert_eq!(resp.rpc_status, GeoComCode::IvParam);

    let stats = client.stats();
    assert_eq!(stats.lines_sent, 5);
    assert_eq!(stats.lines_received, 5);
    assert_eq!(stats.timeouts, 0);
    client.close();
}

/// A quiet instrument turns into timeouts, then into a line resync, and
/// the session keeps working once the instrument comes back
#[test]
fn test_geocom_timeout_recovery() {
    let instrument = handshake_script();
    let mut client = GeoComClient::connect(instrument, fast_config()).unwrap();

    for _ in 0..4 {
        let resp = client.request(2008, &[], &[]);
        assert_eq!(resp.com_status, GeoComCode::ComTimedOut);
        assert_eq!(resp.rpc_status, GeoComCode::Undefined);
    }
    let stats = client.stats();
    assert_eq!(stats.timeouts, 4);
    assert_eq!(stats.resyncs, 1);
}

/// Precision negotiation reshapes the floats the client puts on the wire
#[test]
fn test_geocom_precision_negotiation() {
    let instrument = ScriptedInstrument::new()
        .expect("%R1Q,0:", "%R1P,0,0:0")
        .expect("%R1Q,108:", "%R1P,0,0:0,3")
        // The encoded parameter must already be at 3 digits.
        .expect("%R1Q,2024:0.333", "%R1P,0,0:0");

    let mut client = GeoComClient::connect(instrument, fast_config()).unwrap();
    assert_eq!(client.precision(), 3);

    let resp = client.request(2024, &[Param::from(1.0f64 / 3.0)], &[]);
    assert!(resp.status_ok());
}

/// An instrument that never answers the probe fails construction after
/// the configured number of attempts
#[test]
fn test_geocom_connect_exhaustion() {
    let config = GeoComConfig {
        retries: 3,
        retry_delay: Duration::from_millis(1),
        ..GeoComConfig::default()
    };
    match GeoComClient::connect(ScriptedInstrument::new(), config) {
        Err(GeoComError::Connection { message }) => {
            assert!(message.contains("3 attempts"), "message: {message}")
        }
        Err(other) => panic!("expected connection error, got {other:?}"),
        Ok(_) => panic!("connect succeeded against a silent instrument"),
    }
}

/// VivaTPS replies carry a checksum field the other generations lack
#[test]
fn test_geocom_viva_dialect() {
    let instrument = ScriptedInstrument::new()
        .expect("%R1Q,0:", "%R1P,0,1,52445:0")
        .expect("%R1Q,108:", "%R1P,0,2,193:0,15")
        .expect("%R1Q,5003:", "%R1P,0,3,7:0,350433");

    let config = GeoComConfig {
        dialect: GeoComDialect::VivaTps,
        retry_delay: Duration::from_millis(1),
        ..GeoComConfig::default()
    };
    let mut client = GeoComClient::connect(instrument, config).unwrap();

    let resp = client.request(5003, &[], &[FieldKind::Int]);
    assert!(resp.status_ok());
    assert_eq!(resp.checksum, Some(7));
    assert_eq!(resp.transaction, 3);
    assert_eq!(resp.int(0).unwrap(), 350433);
}

fn fast_gsi_config() -> GsiOnlineConfig {
    GsiOnlineConfig {
        retry_delay: Duration::from_millis(1),
        ..GsiOnlineConfig::default()
    }
}

/// Full GSI Online session against a digital level: probe, configure,
/// measure in GSI8 and push a point id
#[test]
fn test_gsi_session_flow() {
    let instrument = ScriptedInstrument::new()
        .expect("CONF/137", "0137/2")
        .expect("SET/95/0", "?")
        .expect("GET/M/WI330", "330...+00017220 ")
        .expect("PUT/11....+00000042 ", "?");

    let mut client = GsiOnlineClient::connect(instrument, fast_gsi_config()).unwrap();

    let resp = client.set_param(95, "0");
    assert!(resp.status_ok());

    let resp = client.get_word(GsiMode::Measure, 330);
    assert!(resp.status_ok());
    let word = resp.value.unwrap();
    assert_eq!(word.index, 330);
    assert_eq!(word.value(), Some(17220));

    let resp = client.put_word(&GsiWord::numeric(11, 42)).unwrap();
    assert!(resp.status_ok());

    let stats = client.stats();
    assert_eq!(stats.lines_sent, 4);
    assert_eq!(stats.lines_received, 4);
}

/// GSI16 instruments answer with star-prefixed words
#[test]
fn test_gsi16_measurement() {
    let instrument = ScriptedInstrument::new()
        .expect("CONF/137", "0137/2")
        .expect("GET/I/WI11", "*110001+0000000000000123 ");

    let config = GsiOnlineConfig {
        format: GsiFormat::Gsi16,
        retry_delay: Duration::from_millis(1),
        ..GsiOnlineConfig::default()
    };
    let mut client = GsiOnlineClient::connect(instrument, config).unwrap();

    let resp = client.get_word(GsiMode::Instant, 11);
    assert!(resp.status_ok());
    let word = resp.value.unwrap();
    assert_eq!(word.index, 11);
    assert_eq!(word.info, "0001");
    assert_eq!(word.value(), Some(123));
}

/// Instrument-side failures come back on the status axes, not as errors
#[test]
fn test_gsi_error_reporting() {
    let instrument = ScriptedInstrument::new()
        .expect("CONF/137", "0137/2")
        .expect("SET/900/1", "@E117")
        .expect("CONF/30", "@W100");

    let mut client = GsiOnlineClient::connect(instrument, fast_gsi_config()).unwrap();

    let resp = client.set_param(900, "1");
    assert_eq!(resp.com_status, GsiComStatus::Ok);
    assert_eq!(resp.status, GsiStatus::Error(117));

    let resp = client.conf_param(30);
    assert_eq!(resp.status, GsiStatus::Warning(100));
    assert!(resp.value.is_none());
}

/// The two checksum engines agree across the protocol alphabet
#[test]
fn test_checksum_engines_agree() {
    use rand::{Rng, SeedableRng};

    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let alphabet: Vec<u8> =
        b"%R1QP,:'0123456789ABCDEFabcdef\"+-./*@WESETCONFGETPUT ".to_vec();
    for _ in 0..500 {
        let len = rng.gen_range(0..64);
        let data: Vec<u8> = (0..len)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        assert_eq!(
            checksum::checksum(&data),
            checksum::checksum_bitwise(&data)
        );
    }
    assert_eq!(checksum::checksum(b"123456789"), 0xBB3D);
}

/// Blocks survive a full encode/parse cycle in both widths
#[test]
fn test_gsi_block_cycle() {
    let block = GsiBlock::new(vec![
        GsiWord::text(11, "A17"),
        GsiWord::numeric(32, -2250),
        GsiWord {
            index: 21,
            info: ".322".to_string(),
            negative: false,
            data: "17220828".to_string(),
        },
    ]);

    for format in [GsiFormat::Gsi8, GsiFormat::Gsi16] {
        let line = block.encode(format).unwrap();
        let (parsed_format, parsed) = GsiBlock::parse(&line).unwrap();
        assert_eq!(parsed_format, format);
        assert_eq!(parsed.words.len(), 3);
        assert_eq!(parsed.words[0].data, "A17");
        assert_eq!(parsed.words[1].value(), Some(-2250));
        assert_eq!(parsed.words[2].info, ".322");
    }
}
