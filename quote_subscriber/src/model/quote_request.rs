//! Quote requests offered by the operator menu.
use quote_common::settings::Settings;

/// Request id of the quote request sent right after logon.
pub const BOOT_QUOTE_REQ_ID: &str = "CG001";
/// Symbol of the boot quote request.
pub const BOOT_SYMBOL: &str = "BTC/JPY";
/// Account of the boot quote request.
pub const BOOT_ACCOUNT: &str = "BTC-1-00000000";

/// Highest menu index read from the settings.
pub const MAX_INDEX: usize = 8;

/// One configured quote request, selectable by its menu index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequestSpec {
    /// Menu index, 1 to 8.
    pub index: usize,
    /// QuoteReqID to send.
    pub quote_req_id: String,
    /// Requested symbol.
    pub symbol: String,
    /// Account put on the related-symbol entry.
    pub account: String,
}

impl QuoteRequestSpec {
    /// Read `QuoteReqId{n}`, `Symbol{n}` and `Account{n}` for n in 1..=8.
    /// An index missing any of the three keys is left out.
    pub fn from_settings(settings: &Settings) -> Vec<QuoteRequestSpec> {
        let global = settings.global_settings();
        (1..=MAX_INDEX)
            .filter_map(|index| {
                let quote_req_id = global.setting(&format!("QuoteReqId{}", index)).ok()?;
                let symbol = global.setting(&format!("Symbol{}", index)).ok()?;
                let account = global.setting(&format!("Account{}", index)).ok()?;
                Some(QuoteRequestSpec {
                    index,
                    quote_req_id: String::from(quote_req_id),
                    symbol: String::from(symbol),
                    account: String::from(account),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_common::settings::SettingsParser;
    use std::io::Cursor;

    #[test]
    fn incomplete_indices_are_skipped() {
        let text = "\
[DEFAULT]
QuoteReqId1=Q1
Symbol1=BTC/JPY
Account1=A1
QuoteReqId2=Q2
Symbol2=ETH/JPY
QuoteReqId3=Q3
Symbol3=XRP/JPY
Account3=A3
QuoteReqId9=Q9
Symbol9=LTC/JPY
Account9=A9
";
        let settings = Settings::parse_from_reader(Cursor::new(text)).unwrap();
        let specs = QuoteRequestSpec::from_settings(&settings);
        let indices: Vec<usize> = specs.iter().map(|spec| spec.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert_eq!(specs[1].symbol, "XRP/JPY");
        assert_eq!(specs[1].account, "A3");
    }
}
