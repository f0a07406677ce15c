//! Conversions between the textual forms an LNURL can take and the HTTPS
//! endpoint it designates.
//!
//! Accepted inputs: bech32 `lnurl1...` strings (optionally behind a
//! `lightning:` URI prefix), LUD-17 `lnurlp://`, `lnurlw://` and `keyauth://`
//! URLs, lightning addresses (`user@domain`), and plain `https://` URLs
//! (including LUD-01 fallback links carrying `?lightning=lnurl1...`).

use bech32::{Bech32, Hrp};
use url::Url;

use crate::error::AppError;

const LNURL_HRP: Hrp = Hrp::parse_unchecked("lnurl");
const LIGHTNING_PREFIX: &str = "lightning:";
const LUD17_SCHEMES: [&str; 3] = ["lnurlp", "lnurlw", "keyauth"];

/// Decode a bech32 LNURL into the URL it encodes
pub fn decode_lnurl(text: &str) -> Result<Url, AppError> {
    let text = strip_lightning_prefix(text.trim());

    let (hrp, data) = bech32::decode(text)
        .map_err(|e| AppError::invalid_lnurl(format!("invalid bech32 lnurl: {}", e)))?;

    if !hrp.as_str().eq_ignore_ascii_case(LNURL_HRP.as_str()) {
        return Err(AppError::invalid_lnurl(format!(
            "unexpected bech32 prefix '{}'",
            hrp
        )));
    }

    let decoded = String::from_utf8(data)
        .map_err(|_| AppError::invalid_lnurl("lnurl does not encode a utf-8 url"))?;

    Url::parse(&decoded).map_err(|e| AppError::invalid_lnurl(format!("invalid lnurl url: {}", e)))
}

/// Encode a URL as an uppercase bech32 LNURL
pub fn encode_lnurl(url: &str) -> Result<String, AppError> {
    bech32::encode::<Bech32>(LNURL_HRP, url.as_bytes())
        .map(|encoded| encoded.to_ascii_uppercase())
        .map_err(|e| AppError::invalid_lnurl(format!("cannot encode lnurl: {}", e)))
}

/// Canonical bech32 form of any accepted LNURL text. Already-encoded input is
/// only case-normalized.
pub fn normalize_lnurl(text: &str) -> Result<String, AppError> {
    let trimmed = strip_lightning_prefix(text.trim());

    if is_bech32_lnurl(trimmed) {
        // Validate the checksum before trusting it
        decode_lnurl(trimmed)?;
        return Ok(trimmed.to_ascii_uppercase());
    }

    encode_lnurl(lnurl_to_url(trimmed)?.as_str())
}

/// Resolve any accepted LNURL text to the endpoint it designates
pub fn lnurl_to_url(text: &str) -> Result<Url, AppError> {
    let text = strip_lightning_prefix(text.trim());

    if is_bech32_lnurl(text) {
        return decode_lnurl(text);
    }

    if let Some((scheme, rest)) = text.split_once("://") {
        let scheme = scheme.to_ascii_lowercase();

        if LUD17_SCHEMES.contains(&scheme.as_str()) {
            return parse_with_onion_scheme(rest);
        }

        if scheme == "https" || scheme == "http" {
            let url = Url::parse(text)
                .map_err(|e| AppError::invalid_lnurl(format!("invalid url: {}", e)))?;

            // LUD-01 fallback scheme
            if let Some((_, embedded)) = url.query_pairs().find(|(k, _)| k == "lightning") {
                if is_bech32_lnurl(&embedded) {
                    return decode_lnurl(&embedded);
                }
            }

            if scheme == "http" && !is_onion(&url) {
                return Err(AppError::invalid_lnurl(
                    "lnurl endpoints must use https unless they are onion services",
                ));
            }

            return Ok(url);
        }

        return Err(AppError::invalid_lnurl(format!(
            "unsupported lnurl scheme '{}'",
            scheme
        )));
    }

    if let Some(url) = lightning_address_url(text) {
        return Ok(url);
    }

    Err(AppError::invalid_lnurl(format!(
        "'{}' is not an lnurl",
        text
    )))
}

/// LUD-16: `user@domain` resolves to `https://domain/.well-known/lnurlp/user`
pub fn lightning_address_url(address: &str) -> Option<Url> {
    let (user, domain) = address.trim().split_once('@')?;

    if user.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || !user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'))
    {
        return None;
    }

    let scheme = if domain.ends_with(".onion") {
        "http"
    } else {
        "https"
    };

    Url::parse(&format!(
        "{}://{}/.well-known/lnurlp/{}",
        scheme,
        domain,
        user.to_ascii_lowercase()
    ))
    .ok()
}

/// Find the first LNURL-looking token in free text (chat messages, decoded QR
/// codes). Returns the token as written.
pub fn find_lnurl_in_text(text: &str) -> Option<String> {
    text.split(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | ','))
        .map(|token| token.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '.' | '!' | '?')))
        .filter(|token| !token.is_empty())
        .find(|token| looks_like_lnurl(token))
        .map(|token| token.to_string())
}

fn looks_like_lnurl(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    let bare = lower.strip_prefix(LIGHTNING_PREFIX).unwrap_or(&lower);

    if is_bech32_lnurl(bare) {
        return decode_lnurl(bare).is_ok();
    }

    if LUD17_SCHEMES
        .iter()
        .any(|scheme| bare.starts_with(&format!("{}://", scheme)))
    {
        return true;
    }

    if bare.starts_with("https://") || bare.starts_with("http://") {
        return Url::parse(token).map_or(false, |url| {
            url.query_pairs()
                .any(|(k, v)| k == "lightning" && is_bech32_lnurl(&v))
        });
    }

    // Bare addresses only count in plain text, never inside URIs
    !bare.contains('/') && lightning_address_url(bare).is_some()
}

fn strip_lightning_prefix(text: &str) -> &str {
    match text.get(..LIGHTNING_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LIGHTNING_PREFIX) => {
            &text[LIGHTNING_PREFIX.len()..]
        }
        _ => text,
    }
}

fn is_bech32_lnurl(text: &str) -> bool {
    text.len() > 6
        && text
            .get(..6)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("lnurl1"))
}

fn is_onion(url: &Url) -> bool {
    url.host_str().map_or(false, |host| host.ends_with(".onion"))
}

// LUD-17 schemes resolve to https, or http for onion services
fn parse_with_onion_scheme(rest: &str) -> Result<Url, AppError> {
    let host = rest.split(|c| matches!(c, '/' | '?' | ':')).next().unwrap_or("");
    let scheme = if host.ends_with(".onion") {
        "http"
    } else {
        "https"
    };

    Url::parse(&format!("{}://{}", scheme, rest))
        .map_err(|e| AppError::invalid_lnurl(format!("invalid url: {}", e)))
}
