use super::{QuoteDecoder, RawQuote};
use crate::error::ParseError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt::Display;

/// Streaming decoder for the default markup responses:
///
/// ```xml
/// <query yahoo:count="1">
///   <results>
///     <rate id="USDCAD"><Name>USD/CAD</Name><Rate>1.2283</Rate></rate>
///   </results>
/// </query>
/// ```
///
/// Elements other than `rate` and its `Rate` child are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDecoder;

fn xml_error(e: impl Display) -> ParseError {
    ParseError::Xml(e.to_string())
}

fn id_attribute(element: &BytesStart<'_>) -> Result<String, ParseError> {
    match element.try_get_attribute("id").map_err(xml_error)? {
        Some(attr) => Ok(attr.unescape_value().map_err(xml_error)?.into_owned()),
        None => Ok(String::new()),
    }
}

impl QuoteDecoder for XmlDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<RawQuote>, ParseError> {
        let mut reader = Reader::from_reader(body);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut quotes = Vec::new();
        let mut in_results = false;
        let mut in_rate_value = false;
        let mut current: Option<RawQuote> = None;

        loop {
            match reader.read_event_into(&mut buf).map_err(xml_error)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"results" => in_results = true,
                    b"rate" if in_results && current.is_none() => {
                        current = Some(RawQuote::new(id_attribute(&e)?, ""));
                    }
                    b"Rate" if current.is_some() => in_rate_value = true,
                    _ => {}
                },
                Event::Empty(e) => {
                    // <rate id="USDXXX"/> carries no value; keep it so it is
                    // reported as malformed.
                    if in_results && current.is_none() && e.local_name().as_ref() == b"rate" {
                        quotes.push(RawQuote::new(id_attribute(&e)?, ""));
                    }
                }
                Event::Text(t) if in_rate_value => {
                    if let Some(quote) = current.as_mut() {
                        quote.rate.push_str(&t.unescape().map_err(xml_error)?);
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"Rate" => in_rate_value = false,
                    b"rate" => {
                        if let Some(quote) = current.take() {
                            quotes.push(quote);
                        }
                    }
                    b"results" => in_results = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_several_rates() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<query xmlns:yahoo="http://www.yahooapis.com/v1/base.rng" yahoo:count="2" yahoo:lang="en-US">
  <results>
    <rate id="USDEUR">
      <Name>USD/EUR</Name>
      <Rate>0.9192</Rate>
      <Date>3/1/2016</Date>
      <Ask>0.9193</Ask>
      <Bid>0.9192</Bid>
    </rate>
    <rate id="USDJPY"><Name>USD/JPY</Name><Rate>113.5600</Rate></rate>
  </results>
</query>
<!-- total: 12 -->"#;
        let quotes = XmlDecoder.decode(body.as_bytes()).unwrap();
        assert_eq!(
            quotes,
            vec![
                RawQuote::new("USDEUR", "0.9192"),
                RawQuote::new("USDJPY", "113.5600"),
            ]
        );
    }

    #[test]
    fn test_empty_results() {
        let body = r#"<query yahoo:count="0"><results/></query>"#;
        assert!(XmlDecoder.decode(body.as_bytes()).unwrap().is_empty());

        let body = r#"<query><results></results></query>"#;
        assert!(XmlDecoder.decode(body.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_rate_without_value_or_id() {
        let body = r#"<query><results><rate id="USDEUR"/><rate><Rate>1.5</Rate></rate></results></query>"#;
        let quotes = XmlDecoder.decode(body.as_bytes()).unwrap();
        assert_eq!(
            quotes,
            vec![RawQuote::new("USDEUR", ""), RawQuote::new("", "1.5")]
        );
    }

    #[test]
    fn test_rate_outside_results_is_ignored() {
        let body = r#"<query><diagnostics><rate id="USDEUR"><Rate>2.0</Rate></rate></diagnostics><results/></query>"#;
        assert!(XmlDecoder.decode(body.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_tags_are_an_error() {
        let body = r#"<query><results><rate id="USDEUR"><Rate>1.0</Name></rate></results></query>"#;
        assert!(matches!(
            XmlDecoder.decode(body.as_bytes()),
            Err(ParseError::Xml(_))
        ));
    }
}
