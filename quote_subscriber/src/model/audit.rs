//! CSV audit trail of received quotes.
//!
//! When enabled (`LoggingPrice=Y`), every `Quote` whose symbol equals the
//! configured asset is appended as one row:
//!
//! ```text
//! ,time,exchange,qty,sellprice,buyprice
//! 0,2024-05-01 09:30:00.000000,EXCH,120,120.000000,100.000000
//! ```
//!
//! The first column is a row counter starting at 0. Rows are flushed as they
//! are written. Quotes for other symbols, and any quote while the logger is
//! closed, are ignored.
use chrono::{DateTime, Utc};
use log::info;
use quote_common::message::{MessageReject, Quote};
use quote_common::settings::Settings;
use quote_common::{Result, SessionError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filename template used when `LoggingFileName` is absent or empty.
pub const DEFAULT_FILE_NAME: &str = "price_{asset}_{time}.csv";
/// Symbol filter used when `LoggingAsset` is absent.
pub const DEFAULT_ASSET: &str = "BTC/JPY";

const HEADER: [&str; 6] = ["", "time", "exchange", "qty", "sellprice", "buyprice"];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const FILE_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Quote audit logger. Owned by one thread at a time; the subscriber keeps
/// it behind a `Mutex`.
pub struct AuditLogger {
    enabled: bool,
    file_name: PathBuf,
    asset: String,
    exchange: String,
    sink: Option<Box<dyn Write + Send>>,
    count: u64,
}

impl AuditLogger {
    /// Create a closed logger. `template` may contain `{asset}` and `{time}`
    /// placeholders; `created` fills `{time}`.
    pub fn new(enabled: bool, template: &str, asset: &str, exchange: &str, created: DateTime<Utc>) -> Self {
        AuditLogger {
            enabled,
            file_name: PathBuf::from(render_file_name(template, asset, created)),
            asset: String::from(asset),
            exchange: String::from(exchange),
            sink: None,
            count: 0,
        }
    }

    /// Read the `Logging*` keys of the global section.
    pub fn from_settings(settings: &Settings) -> Self {
        let global = settings.global_settings();
        let enabled = global.bool_setting("LoggingPrice").unwrap_or(false);
        let asset = global.setting("LoggingAsset").unwrap_or(DEFAULT_ASSET);
        let exchange = global.setting("LoggingExchangeName").unwrap_or("");
        let template = global
            .setting("LoggingFileName")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME);
        AuditLogger::new(enabled, template, asset, exchange, Utc::now())
    }

    /// Path of the audit file.
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// Whether a file is currently open.
    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Create or truncate the file and write the header. No-op when disabled.
    pub fn open(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut file = File::create(&self.file_name)?;
        file.write_all(&encode_row(HEADER)?)?;
        file.flush()?;
        info!("Quote audit file opened: {}", self.file_name.display());
        self.sink = Some(Box::new(file));
        Ok(())
    }

    /// Append one row for `quote` if it matches the asset filter.
    ///
    /// A quote missing its symbol, bid size, bid or offer is not written and
    /// the counter does not move. The counter also stays put when the file
    /// write fails, so the next row reuses the number.
    pub fn write(&mut self, quote: &Quote) -> Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let symbol = quote.symbol().map_err(missing_field)?;
        if symbol != self.asset {
            return Ok(());
        }
        let qty = quote.bid_size().map_err(missing_field)?;
        let bid = quote.bid_px().map_err(missing_field)?;
        let offer = quote.offer_px().map_err(missing_field)?;
        let time = quote.transact_time.unwrap_or_else(Utc::now);

        let row = encode_row([
            self.count.to_string(),
            time.format(TIME_FORMAT).to_string(),
            self.exchange.clone(),
            format_g(to_float(qty)),
            format!("{:.6}", to_float(bid)),
            format!("{:.6}", to_float(offer)),
        ])?;
        sink.write_all(&row)?;
        sink.flush()?;

        self.count = if self.count == u64::MAX { 0 } else { self.count + 1 };
        Ok(())
    }

    /// Flush and release the file. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush()?;
            info!("Quote audit file closed: {}", self.file_name.display());
        }
        Ok(())
    }
}

impl Drop for AuditLogger {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn render_file_name(template: &str, asset: &str, created: DateTime<Utc>) -> String {
    let mut name = String::from(template);
    if !name.contains(".csv") {
        name.push_str(".csv");
    }
    name.replace("{asset}", &asset.replace('/', "_"))
        .replace("{time}", &created.format(FILE_TIME_FORMAT).to_string())
}

// Whole rows only reach the sink, never a partial or stale buffer.
fn encode_row<I, T>(record: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(Vec::new());
    writer.write_record(record)?;
    writer.into_inner().map_err(|e| SessionError::Io(e.into_error()))
}

/// Shortest representation, switching to exponent form (`1e-05`, `1.5e+07`)
/// below 1e-4 or from 1e6 up.
fn format_g(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let sci = format!("{:e}", value);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return value.to_string();
    };
    let exp: i32 = exp.parse().unwrap_or_default();
    if (-4..6).contains(&exp) {
        return value.to_string();
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exp.abs())
}

// Display only; prices stay decimal everywhere else.
fn to_float(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn missing_field(reject: MessageReject) -> SessionError {
    SessionError::Format(format!("quote not logged: {}", reject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quote_common::settings::SettingsParser;
    use std::fs;
    use std::io::{self, Cursor};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn quote(symbol: &str) -> Quote {
        Quote {
            quote_id: String::from("1"),
            symbol: Some(String::from(symbol)),
            transact_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()),
            bid_px: Some(Decimal::from(120)),
            offer_px: Some(Decimal::from(100)),
            bid_size: Some(Decimal::new(15, 1)),
            offer_size: Some(Decimal::from(100)),
            ..Quote::default()
        }
    }

    fn open_logger(dir: &TempDir) -> AuditLogger {
        let template = dir.path().join("audit.csv");
        let mut logger = AuditLogger::new(true, &template.to_string_lossy(), "BTC/JPY", "EXCH", Utc::now());
        logger.open().unwrap();
        logger
    }

    fn lines(logger: &AuditLogger) -> Vec<String> {
        fs::read_to_string(logger.file_name())
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn only_the_configured_asset_is_written() {
        let dir = TempDir::new().unwrap();
        let mut logger = open_logger(&dir);
        logger.write(&quote("BTC/JPY")).unwrap();
        logger.write(&quote("ETH/JPY")).unwrap();
        logger.close().unwrap();

        assert_eq!(
            lines(&logger),
            vec![
                ",time,exchange,qty,sellprice,buyprice",
                "0,2024-05-01 09:30:00.000000,EXCH,1.5,120.000000,100.000000",
            ]
        );
    }

    #[test]
    fn rows_are_numbered_from_zero() {
        let dir = TempDir::new().unwrap();
        let mut logger = open_logger(&dir);
        for _ in 0..3 {
            logger.write(&quote("BTC/JPY")).unwrap();
        }
        let rows = lines(&logger);
        let counters: Vec<&str> = rows[1..].iter().map(|row| &row[..1]).collect();
        assert_eq!(counters, vec!["0", "1", "2"]);
    }

    /// Fails the first write it sees, then records everything.
    struct FlakySink {
        out: Arc<Mutex<Vec<u8>>>,
        fail_next: bool,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_next {
                self.fail_next = false;
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.out.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_keeps_counter_and_leaves_no_row() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let mut logger = AuditLogger::new(true, "unused.csv", "BTC/JPY", "EXCH", Utc::now());
        logger.sink = Some(Box::new(FlakySink { out: Arc::clone(&out), fail_next: true }));

        assert!(logger.write(&quote("BTC/JPY")).is_err());
        logger.write(&quote("BTC/JPY")).unwrap();

        let text = String::from_utf8(out.lock().unwrap().clone()).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![
            "0,2024-05-01 09:30:00.000000,EXCH,1.5,120.000000,100.000000"
        ]);
    }

    #[test]
    fn qty_switches_to_exponent_form_at_the_extremes() {
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(0.000015), "1.5e-05");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(1.5), "1.5");
        assert_eq!(format_g(120.0), "120");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1000000.0), "1e+06");
        assert_eq!(format_g(15000000.0), "1.5e+07");
        assert_eq!(format_g(0.0), "0");
    }

    #[test]
    fn tiny_qty_is_written_in_exponent_form() {
        let dir = TempDir::new().unwrap();
        let mut logger = open_logger(&dir);
        let mut small = quote("BTC/JPY");
        small.bid_size = Some(Decimal::new(1, 5));
        logger.write(&small).unwrap();
        assert!(lines(&logger)[1].contains(",EXCH,1e-05,"));
    }

    #[test]
    fn counter_wraps_after_max() {
        let dir = TempDir::new().unwrap();
        let mut logger = open_logger(&dir);
        logger.count = u64::MAX;
        logger.write(&quote("BTC/JPY")).unwrap();
        logger.write(&quote("BTC/JPY")).unwrap();

        let rows = lines(&logger);
        assert!(rows[1].starts_with(&format!("{},", u64::MAX)));
        assert!(rows[2].starts_with("0,"));
    }

    #[test]
    fn incomplete_quote_is_dropped() {
        let dir = TempDir::new().unwrap();
        let mut logger = open_logger(&dir);
        let mut incomplete = quote("BTC/JPY");
        incomplete.offer_px = None;

        assert!(logger.write(&incomplete).is_err());
        logger.write(&quote("BTC/JPY")).unwrap();
        let rows = lines(&logger);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("0,"));
    }

    #[test]
    fn missing_transact_time_uses_receive_time() {
        let dir = TempDir::new().unwrap();
        let mut logger = open_logger(&dir);
        let mut untimed = quote("BTC/JPY");
        untimed.transact_time = None;
        logger.write(&untimed).unwrap();

        let year = Utc::now().format("%Y").to_string();
        assert!(lines(&logger)[1].starts_with(&format!("0,{}-", year)));
    }

    #[test]
    fn disabled_logger_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("audit.csv");
        let mut logger = AuditLogger::new(false, &template.to_string_lossy(), "BTC/JPY", "", Utc::now());
        logger.open().unwrap();
        logger.write(&quote("BTC/JPY")).unwrap();
        assert!(!logger.is_open());
        assert!(!template.exists());
    }

    #[test]
    fn default_file_name_carries_asset_and_time() {
        let settings = Settings::parse_from_reader(Cursor::new("[DEFAULT]\nLoggingPrice=Y\n")).unwrap();
        let logger = AuditLogger::from_settings(&settings);
        let name = logger.file_name().to_string_lossy().into_owned();

        let digits = name
            .strip_prefix("price_BTC_JPY_")
            .and_then(|rest| rest.strip_suffix(".csv"))
            .unwrap();
        assert_eq!(digits.len(), 14);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn template_without_extension_gets_csv() {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(
            render_file_name("quotes_{asset}", "ETH/JPY", created),
            "quotes_ETH_JPY.csv"
        );
        assert_eq!(
            render_file_name("{time}.csv", "BTC/JPY", created),
            "20240501093000.csv"
        );
    }
}
