use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use scrape_logging::scrape_warn;

/// Decodes a fetched body into markup.
///
/// Order of precedence: byte-order mark, then the Content-Type charset, then
/// byte sniffing. Malformed sequences become U+FFFD so the rest of the page
/// stays usable.
pub fn decode_markup(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(encoding, _)| encoding)
        .or_else(|| {
            content_type
                .and_then(charset_label)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or_else(|| sniff(bytes));

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        scrape_warn!(
            "body is not valid {}; malformed bytes replaced",
            encoding.name()
        );
    }
    text.into_owned()
}

fn sniff(bytes: &[u8]) -> &'static Encoding {
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches(['"', '\'']))
        } else {
            None
        }
    })
}
